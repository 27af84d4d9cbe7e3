//! Deterministic checks on resolved cart lines.
//!
//! The prompt asks the model to respect these rules; this layer enforces them again on
//! whatever the model actually emitted, against live ingredient rows.

use tracing::{info, warn};

use mesero_core::domain::ingredient::Ingredient;
use mesero_core::menu::{best_match, normalize, tokenize};

use crate::cart::ResolvedCartLine;

pub const REASON_PRINCIPAL_INGREDIENT: &str = "principal_ingredient_removal";
pub const REASON_COMBO_BEVERAGE: &str = "combo_includes_beverage";
pub const REASON_INSUFFICIENT_STOCK: &str = "insufficient_stock";
pub const REASON_ADDITION_UNAVAILABLE: &str = "addition_unavailable";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow,
    Adjust { reason_code: &'static str, quantity: u32 },
    Deny { reason_code: &'static str, user_message: String },
}

/// A line the guardrails removed or changed, with the text shown to the customer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardrailNotice {
    pub reason_code: &'static str,
    pub product_name: String,
    pub user_message: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GuardrailOutcome {
    pub lines: Vec<ResolvedCartLine>,
    pub notices: Vec<GuardrailNotice>,
}

impl GuardrailOutcome {
    pub fn user_messages(&self) -> impl Iterator<Item = &str> {
        self.notices.iter().filter_map(|notice| notice.user_message.as_deref())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardrailPolicy {
    pub protect_principal_ingredient: bool,
    pub collapse_combo_beverages: bool,
    pub enforce_stock: bool,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self { protect_principal_ingredient: true, collapse_combo_beverages: true, enforce_stock: true }
    }
}

impl GuardrailPolicy {
    /// Runs every check over one response's lines: principal ingredient, then combo
    /// beverages, then stock.
    pub fn apply(
        &self,
        lines: Vec<ResolvedCartLine>,
        ingredients: &[Ingredient],
        session_id: &str,
    ) -> GuardrailOutcome {
        let mut outcome = GuardrailOutcome::default();

        let mut kept = Vec::with_capacity(lines.len());
        for line in lines {
            match self.evaluate_removals(&line) {
                GuardrailDecision::Deny { reason_code, user_message } => {
                    outcome.deny(&line, reason_code, user_message, session_id)
                }
                _ => kept.push(line),
            }
        }

        if self.collapse_combo_beverages {
            kept = collapse_combo_beverages(self, kept, &mut outcome, session_id);
        }

        for line in kept {
            match self.evaluate_stock(&line, ingredients) {
                GuardrailDecision::Deny { reason_code, user_message } => {
                    outcome.deny(&line, reason_code, user_message, session_id)
                }
                _ => outcome.lines.push(line),
            }
        }

        outcome
    }

    pub fn evaluate_removals(&self, line: &ResolvedCartLine) -> GuardrailDecision {
        if !self.protect_principal_ingredient {
            return GuardrailDecision::Allow;
        }
        let (Some(principal), Some(customizations)) =
            (line.catalog_item.principal_ingredient.as_deref(), line.customizations.as_ref())
        else {
            return GuardrailDecision::Allow;
        };

        match customizations.removals.iter().find(|removal| same_ingredient(removal, principal)) {
            Some(removal) => GuardrailDecision::Deny {
                reason_code: REASON_PRINCIPAL_INGREDIENT,
                user_message: format!(
                    "No puedo preparar {} sin {}: es su ingrediente principal. ¿Quieres elegir otra opción?",
                    line.catalog_item.name, removal
                ),
            },
            None => GuardrailDecision::Allow,
        }
    }

    /// Beverage units already covered by `combo_units` pending combo units.
    pub fn evaluate_combo_share(&self, line: &ResolvedCartLine, combo_units: u32) -> GuardrailDecision {
        if !self.collapse_combo_beverages
            || combo_units == 0
            || line.catalog_item.is_combo
            || !line.catalog_item.is_beverage()
        {
            return GuardrailDecision::Allow;
        }

        GuardrailDecision::Adjust {
            reason_code: REASON_COMBO_BEVERAGE,
            quantity: line.quantity - combo_units.min(line.quantity),
        }
    }

    pub fn evaluate_stock(&self, line: &ResolvedCartLine, ingredients: &[Ingredient]) -> GuardrailDecision {
        if !self.enforce_stock {
            return GuardrailDecision::Allow;
        }

        let requested = i64::from(line.quantity);
        if let Some(stock) = line.catalog_item.stock {
            if stock <= 0 {
                return GuardrailDecision::Deny {
                    reason_code: REASON_INSUFFICIENT_STOCK,
                    user_message: format!("{} está agotado por ahora.", line.catalog_item.name),
                };
            }
            if requested > stock {
                return GuardrailDecision::Deny {
                    reason_code: REASON_INSUFFICIENT_STOCK,
                    user_message: format!(
                        "Solo quedan {stock} de {}. ¿Te parece bien llevar {stock}?",
                        line.catalog_item.name
                    ),
                };
            }
        }

        let additions = line.customizations.iter().flat_map(|customizations| &customizations.additions);
        for addition in additions {
            let Some((ingredient, _)) = best_match(addition, ingredients, |item| item.name.as_str())
            else {
                continue;
            };
            if !ingredient.is_available || ingredient.stock_quantity <= 0 {
                return GuardrailDecision::Deny {
                    reason_code: REASON_ADDITION_UNAVAILABLE,
                    user_message: format!(
                        "Por ahora no tenemos {}, así que no puedo agregarlo a {}.",
                        ingredient.name, line.catalog_item.name
                    ),
                };
            }
            if requested > ingredient.stock_quantity {
                return GuardrailDecision::Deny {
                    reason_code: REASON_INSUFFICIENT_STOCK,
                    user_message: format!(
                        "Solo quedan {} {} de {} para agregar. ¿Te parece bien con esa cantidad?",
                        ingredient.stock_quantity, ingredient.unit, ingredient.name
                    ),
                };
            }
        }

        GuardrailDecision::Allow
    }
}

impl GuardrailOutcome {
    fn deny(
        &mut self,
        line: &ResolvedCartLine,
        reason_code: &'static str,
        user_message: String,
        session_id: &str,
    ) {
        warn!(
            event_name = "agent.customer.guardrail_denied",
            correlation_id = session_id,
            reason_code,
            product_id = %line.catalog_item.id,
            quantity = line.quantity,
            "cart line rejected by guardrail"
        );
        self.notices.push(GuardrailNotice {
            reason_code,
            product_name: line.catalog_item.name.clone(),
            user_message: Some(user_message),
        });
    }
}

fn same_ingredient(removal: &str, principal: &str) -> bool {
    let removal = normalize(removal);
    let principal = normalize(principal);
    let removal_tokens = tokenize(&removal);
    let principal_tokens = tokenize(&principal);
    if removal_tokens.is_empty() || principal_tokens.is_empty() {
        return false;
    }

    removal_tokens.iter().all(|token| principal_tokens.contains(token))
        || principal_tokens.iter().all(|token| removal_tokens.contains(token))
}

fn collapse_combo_beverages(
    policy: &GuardrailPolicy,
    lines: Vec<ResolvedCartLine>,
    outcome: &mut GuardrailOutcome,
    session_id: &str,
) -> Vec<ResolvedCartLine> {
    let mut combo_units: u32 = lines
        .iter()
        .filter(|line| line.catalog_item.is_combo)
        .map(|line| line.quantity)
        .fold(0, u32::saturating_add);

    let mut kept = Vec::with_capacity(lines.len());
    for mut line in lines {
        let GuardrailDecision::Adjust { reason_code, quantity } =
            policy.evaluate_combo_share(&line, combo_units)
        else {
            kept.push(line);
            continue;
        };

        combo_units = combo_units.saturating_sub(line.quantity - quantity);
        info!(
            event_name = "agent.customer.guardrail_adjusted",
            correlation_id = session_id,
            reason_code,
            product_id = %line.catalog_item.id,
            from_quantity = line.quantity,
            to_quantity = quantity,
            "beverage already included in combo"
        );
        outcome.notices.push(GuardrailNotice {
            reason_code,
            product_name: line.catalog_item.name.clone(),
            user_message: None,
        });

        if quantity > 0 {
            line.quantity = quantity;
            kept.push(line);
        }
    }
    kept
}
