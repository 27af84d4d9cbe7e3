use mesero_core::alerts::{AlertReport, AlertSnapshot};
use mesero_db::repositories::{SqlIngredientRepository, SqlProductRepository};
use mesero_db::{IngredientRepository, ProductRepository};

use crate::commands::{with_database, CommandResult};

const ALL_CLEAR: &str = "Todo el inventario está en niveles normales.";

/// Prints the proactive inventory alert for the configured database.
///
/// The JSON form is the same body `GET /admin/alerts` answers with.
pub fn run(json: bool) -> CommandResult {
    with_database(
        "alerts",
        |config, pool| async move {
            let products = SqlProductRepository::new(pool.clone())
                .list_all()
                .await
                .map_err(|error| ("inventory_read", error.to_string(), 6u8))?;
            let ingredients = SqlIngredientRepository::new(pool)
                .list_all()
                .await
                .map_err(|error| ("inventory_read", error.to_string(), 6u8))?;
            let snapshot = AlertSnapshot::compute(
                &products,
                &ingredients,
                config.inventory.default_low_stock_threshold,
            );
            Ok(AlertReport::from_snapshot(&snapshot))
        },
        move |report| render(&report, json),
    )
}

fn render(report: &AlertReport, json: bool) -> String {
    if json {
        return serde_json::to_string(report)
            .unwrap_or_else(|error| format!("alert report serialization failed: {error}"));
    }
    report.message.clone().unwrap_or_else(|| ALL_CLEAR.to_string())
}

#[cfg(test)]
mod tests {
    use mesero_core::alerts::{AlertReport, CriticalCounts};

    use super::render;

    #[test]
    fn quiet_inventory_renders_the_all_clear_line() {
        let report = AlertReport { has_alerts: false, message: None, critical: None };
        assert_eq!(render(&report, false), "Todo el inventario está en niveles normales.");
        assert_eq!(render(&report, true), r#"{"hasAlerts":false}"#);
    }

    #[test]
    fn json_form_carries_the_critical_counts() {
        let report = AlertReport {
            has_alerts: true,
            message: Some("Alertas de inventario (1):".to_string()),
            critical: Some(CriticalCounts { ing_agotados: 1, ..CriticalCounts::default() }),
        };
        let rendered = render(&report, true);
        assert!(rendered.contains(r#""ingAgotados":1"#));
        assert!(rendered.contains(r#""hasAlerts":true"#));
    }
}
