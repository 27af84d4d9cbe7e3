use serde::{Deserialize, Serialize};
use tracing::warn;

use mesero_core::domain::order::Customizations;
use mesero_core::menu::{resolve, Catalog, CatalogItem};

use crate::protocol::CartAction;

/// Largest quantity a single marker may place on one line.
pub const MAX_LINE_QUANTITY: u32 = 99;

/// A cart action matched to a live catalog entry, ready for the caller's cart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedCartLine {
    pub catalog_item: CatalogItem,
    pub quantity: u32,
    pub customizations: Option<Customizations>,
    pub match_score: u8,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CartResolution {
    pub lines: Vec<ResolvedCartLine>,
    pub unresolved: Vec<String>,
}

/// Resolves each action against `catalog`, preserving marker order. Unknown names are
/// dropped and logged.
pub fn resolve_actions(actions: &[CartAction], catalog: &Catalog, session_id: &str) -> CartResolution {
    let mut resolution = CartResolution::default();

    for action in actions {
        let Some(found) = resolve(&action.product_name, catalog) else {
            warn!(
                event_name = "agent.customer.action_unresolved",
                correlation_id = session_id,
                product_name = %action.product_name,
                "cart action did not match any catalog item"
            );
            resolution.unresolved.push(action.product_name.clone());
            continue;
        };

        resolution.lines.push(ResolvedCartLine {
            catalog_item: found.item.clone(),
            quantity: clamp_quantity(action, session_id),
            customizations: customizations_for(action),
            match_score: found.score,
        });
    }

    resolution
}

fn clamp_quantity(action: &CartAction, session_id: &str) -> u32 {
    if action.quantity <= 0 {
        warn!(
            event_name = "agent.customer.quantity_clamped",
            correlation_id = session_id,
            product_name = %action.product_name,
            original_quantity = action.quantity,
            "non-positive cart quantity clamped to 1"
        );
        return 1;
    }
    let quantity = u32::try_from(action.quantity).unwrap_or(u32::MAX);
    if quantity > MAX_LINE_QUANTITY {
        warn!(
            event_name = "agent.customer.quantity_clamped",
            correlation_id = session_id,
            product_name = %action.product_name,
            original_quantity = action.quantity,
            "cart quantity above line maximum clamped"
        );
        return MAX_LINE_QUANTITY;
    }
    quantity
}

fn customizations_for(action: &CartAction) -> Option<Customizations> {
    let customizations = Customizations {
        additions: action.additions.clone().unwrap_or_default(),
        removals: action.removals.clone().unwrap_or_default(),
        notes: action.notes.clone(),
    };
    (!customizations.is_empty()).then_some(customizations)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use mesero_core::menu::{Catalog, CatalogItem, CatalogSource};

    use super::{resolve_actions, MAX_LINE_QUANTITY};
    use crate::protocol::{parse, CartAction};

    fn item(id: &str, name: &str, price: i64, source: CatalogSource) -> CatalogItem {
        CatalogItem {
            id: id.to_string(),
            name: name.to_string(),
            price: Decimal::new(price, 2),
            source,
            active: true,
            category: None,
            is_combo: false,
            principal_ingredient: None,
            stock: None,
        }
    }

    fn catalog() -> Catalog {
        Catalog::from_items(vec![
            item("prod-coca-cola", "Coca-Cola 500ml", 199, CatalogSource::Product),
            item("prod-papas-fritas", "Papas Fritas", 299, CatalogSource::Product),
            item("ing-queso", "Queso cheddar", 100, CatalogSource::Ingredient),
        ])
    }

    #[test]
    fn coca_and_papas_resolve_to_two_lines() {
        let parsed = parse("[ADD_TO_CART:coca:1:::][ADD_TO_CART:papas:1:::]");
        let resolution = resolve_actions(&parsed.actions, &catalog(), "s-1");

        let ids = resolution
            .lines
            .iter()
            .map(|line| line.catalog_item.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["prod-coca-cola", "prod-papas-fritas"]);
        assert!(resolution.lines.iter().all(|line| line.match_score >= 60));
    }

    #[test]
    fn unknown_items_are_dropped_not_guessed() {
        let parsed = parse("[ADD_TO_CART:pizza hawaiana:1:::][ADD_TO_CART:Papas Fritas:1:::]");
        let resolution = resolve_actions(&parsed.actions, &catalog(), "s-1");

        assert_eq!(resolution.lines.len(), 1);
        assert_eq!(resolution.unresolved, vec!["pizza hawaiana".to_string()]);
    }

    #[test]
    fn non_positive_quantity_is_clamped_to_one() {
        let action = CartAction {
            product_name: "Papas Fritas".to_string(),
            quantity: -2,
            additions: None,
            removals: None,
            notes: None,
        };
        let resolution = resolve_actions(&[action], &catalog(), "s-1");
        assert_eq!(resolution.lines[0].quantity, 1);
        assert!(resolution.lines[0].customizations.is_none());
    }

    #[test]
    fn oversized_quantity_is_clamped_to_the_line_maximum() {
        let parsed = parse("[ADD_TO_CART:Papas Fritas:4294967295:::][ADD_TO_CART:coca:120:::]");
        let resolution = resolve_actions(&parsed.actions, &catalog(), "s-1");

        let quantities = resolution.lines.iter().map(|line| line.quantity).collect::<Vec<_>>();
        assert_eq!(quantities, vec![MAX_LINE_QUANTITY, MAX_LINE_QUANTITY]);
    }

    #[test]
    fn customizations_survive_resolution() {
        let parsed = parse("[ADD_TO_CART:Papas Fritas:2:queso::bien doradas]");
        let line = &resolve_actions(&parsed.actions, &catalog(), "s-1").lines[0];
        let customizations = line.customizations.as_ref().expect("customizations");
        assert_eq!(customizations.additions, vec!["queso".to_string()]);
        assert_eq!(customizations.notes.as_deref(), Some("bien doradas"));
    }
}
