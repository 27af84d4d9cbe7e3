//! Stock alerts over a live snapshot of products and ingredients.
//!
//! Everything here is pure: callers fetch fresh rows and pass them in, so
//! the builder can be polled as often as needed.

use serde::{Deserialize, Serialize};

use crate::domain::ingredient::Ingredient;
use crate::domain::product::Product;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAlert {
    pub id: String,
    pub name: String,
    pub quantity: i64,
    pub threshold: i64,
    pub unit: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertSnapshot {
    pub out_of_stock_products: Vec<StockAlert>,
    pub low_stock_products: Vec<StockAlert>,
    pub out_of_stock_ingredients: Vec<StockAlert>,
    pub low_stock_ingredients: Vec<StockAlert>,
    pub total_count: usize,
}

impl AlertSnapshot {
    /// Partitions live rows into the four alert buckets. Per-item `min_stock_alert`
    /// wins over `default_threshold`.
    pub fn compute(products: &[Product], ingredients: &[Ingredient], default_threshold: i64) -> Self {
        let mut snapshot = Self::default();

        for product in products.iter().filter(|product| product.is_active) {
            let Some(quantity) = product.stock_quantity else {
                continue;
            };
            let threshold = product.min_stock_alert.unwrap_or(default_threshold);
            let alert = StockAlert {
                id: product.id.0.clone(),
                name: product.name.clone(),
                quantity,
                threshold,
                unit: None,
            };

            if quantity <= 0 {
                snapshot.out_of_stock_products.push(alert);
            } else if quantity <= threshold {
                snapshot.low_stock_products.push(alert);
            }
        }

        for ingredient in ingredients {
            let threshold = ingredient.min_stock_alert.unwrap_or(default_threshold);
            let quantity = ingredient.stock_quantity;
            let alert = StockAlert {
                id: ingredient.id.0.clone(),
                name: ingredient.name.clone(),
                quantity,
                threshold,
                unit: Some(ingredient.unit.clone()),
            };

            if quantity <= 0 || !ingredient.is_available {
                snapshot.out_of_stock_ingredients.push(alert);
            } else if quantity <= threshold {
                snapshot.low_stock_ingredients.push(alert);
            }
        }

        snapshot.total_count = snapshot.out_of_stock_products.len()
            + snapshot.low_stock_products.len()
            + snapshot.out_of_stock_ingredients.len()
            + snapshot.low_stock_ingredients.len();
        snapshot
    }

    pub fn has_alerts(&self) -> bool {
        self.total_count > 0
    }

    pub fn critical_counts(&self) -> CriticalCounts {
        CriticalCounts {
            prod_agotados: self.out_of_stock_products.len(),
            prod_bajos: self.low_stock_products.len(),
            ing_agotados: self.out_of_stock_ingredients.len(),
            ing_bajos: self.low_stock_ingredients.len(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriticalCounts {
    pub prod_agotados: usize,
    pub prod_bajos: usize,
    pub ing_agotados: usize,
    pub ing_bajos: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertReport {
    pub has_alerts: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critical: Option<CriticalCounts>,
}

impl AlertReport {
    pub fn from_snapshot(snapshot: &AlertSnapshot) -> Self {
        if !snapshot.has_alerts() {
            return Self { has_alerts: false, message: None, critical: None };
        }

        Self {
            has_alerts: true,
            message: Some(render_message(snapshot)),
            critical: Some(snapshot.critical_counts()),
        }
    }
}

pub fn render_message(snapshot: &AlertSnapshot) -> String {
    let mut sections = vec![format!("Alertas de inventario ({}):", snapshot.total_count)];

    push_section(
        &mut sections,
        "Productos agotados",
        &snapshot.out_of_stock_products,
        |alert| format!("- {}", alert.name),
    );
    push_section(&mut sections, "Productos con stock bajo", &snapshot.low_stock_products, |alert| {
        format!("- {}: quedan {} (mínimo {})", alert.name, alert.quantity, alert.threshold)
    });
    push_section(
        &mut sections,
        "Ingredientes agotados o no disponibles",
        &snapshot.out_of_stock_ingredients,
        |alert| {
            if alert.quantity <= 0 {
                format!("- {}: sin existencias", alert.name)
            } else {
                format!("- {}: marcado como no disponible", alert.name)
            }
        },
    );
    push_section(&mut sections, "Ingredientes con stock bajo", &snapshot.low_stock_ingredients, |alert| {
        format!(
            "- {}: quedan {} {} (mínimo {})",
            alert.name,
            alert.quantity,
            alert.unit.as_deref().unwrap_or("unidades"),
            alert.threshold
        )
    });

    sections.join("\n\n")
}

fn push_section<F>(sections: &mut Vec<String>, title: &str, alerts: &[StockAlert], line: F)
where
    F: Fn(&StockAlert) -> String,
{
    if alerts.is_empty() {
        return;
    }
    let mut lines = vec![format!("{title}:")];
    lines.extend(alerts.iter().map(line));
    sections.push(lines.join("\n"));
}

/// Turn-to-turn comparison used by pollers to announce recoveries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertTransition {
    AllClear,
    PartialImprovement,
    Worsened,
    Unchanged,
}

impl AlertTransition {
    pub fn between(previous: &AlertSnapshot, current: &AlertSnapshot) -> Self {
        if previous.has_alerts() && !current.has_alerts() {
            return Self::AllClear;
        }

        let previous_critical =
            previous.out_of_stock_products.len() + previous.out_of_stock_ingredients.len();
        let current_critical =
            current.out_of_stock_products.len() + current.out_of_stock_ingredients.len();

        if current.total_count > previous.total_count || current_critical > previous_critical {
            return Self::Worsened;
        }
        if current.total_count < previous.total_count || current_critical < previous_critical {
            return Self::PartialImprovement;
        }
        Self::Unchanged
    }
}
