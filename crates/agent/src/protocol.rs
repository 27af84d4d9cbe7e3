//! Inline cart markers emitted by the ordering agent.
//!
//! ```text
//! [ADD_TO_CART:<name>:<quantity>:<additions,csv>:<removals,csv>:<notes>]
//! [CONFIRM_ORDER]
//! ```
//!
//! The first four fields cannot contain `:` or `]`; notes run up to the closing bracket
//! and may contain colons. Markers that do not fit the grammar are left in the prose.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const ADD_TO_CART_OPEN: &str = "[ADD_TO_CART";
pub const CONFIRM_ORDER_MARKER: &str = "[CONFIRM_ORDER]";

const ADD_TO_CART_PATTERN: &str =
    r"\[ADD_TO_CART:([^:\]]*?):(-?\d+):([^:\]]*?):([^:\]]*?):([^\]]*)\]";

fn add_to_cart_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(ADD_TO_CART_PATTERN).expect("marker pattern compiles"))
}

/// One `ADD_TO_CART` marker. `quantity` is kept as written; the cart mapper decides what
/// to do with non-positive values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartAction {
    pub product_name: String,
    pub quantity: i64,
    pub additions: Option<Vec<String>>,
    pub removals: Option<Vec<String>>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedResponse {
    pub display_text: String,
    pub actions: Vec<CartAction>,
    pub confirm_order: bool,
    /// `[ADD_TO_CART` openings that did not match the grammar.
    pub malformed_markers: usize,
}

pub fn parse(raw: &str) -> ParsedResponse {
    let pattern = add_to_cart_regex();
    let mut actions = Vec::new();
    let mut matched = 0;

    for captures in pattern.captures_iter(raw) {
        matched += 1;
        let field = |index: usize| captures.get(index).map_or("", |value| value.as_str());

        let Ok(quantity) = field(2).parse::<i64>() else {
            warn!(
                event_name = "agent.customer.marker_malformed",
                marker = field(0),
                "cart marker quantity out of range"
            );
            continue;
        };

        actions.push(CartAction {
            product_name: field(1).trim().to_string(),
            quantity,
            additions: comma_list(field(3)),
            removals: comma_list(field(4)),
            notes: Some(field(5).trim()).filter(|notes| !notes.is_empty()).map(str::to_string),
        });
    }

    let malformed_markers = raw.matches(ADD_TO_CART_OPEN).count().saturating_sub(matched);
    if malformed_markers > 0 {
        warn!(
            event_name = "agent.customer.marker_malformed",
            malformed_markers, "cart markers did not match the grammar and were ignored"
        );
    }

    let confirm_order = raw.contains(CONFIRM_ORDER_MARKER);
    let display_text =
        pattern.replace_all(raw, "").replace(CONFIRM_ORDER_MARKER, "").trim().to_string();

    ParsedResponse { display_text, actions, confirm_order, malformed_markers }
}

fn comma_list(field: &str) -> Option<Vec<String>> {
    let entries = field
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();
    (!entries.is_empty()).then_some(entries)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{parse, CartAction};

    #[test]
    fn combo_with_confirmation_strips_to_empty_text() {
        let parsed = parse("[ADD_TO_CART:Combo Deluxe:2:::][CONFIRM_ORDER]");

        assert_eq!(
            parsed.actions,
            vec![CartAction {
                product_name: "Combo Deluxe".to_string(),
                quantity: 2,
                additions: None,
                removals: None,
                notes: None,
            }]
        );
        assert!(parsed.confirm_order);
        assert_eq!(parsed.display_text, "");
    }

    #[test]
    fn confirmation_is_detected_without_additions() {
        let parsed = parse("¡Perfecto! Tu pedido va en camino. [CONFIRM_ORDER]");
        assert!(parsed.actions.is_empty());
        assert!(parsed.confirm_order);
        assert_eq!(parsed.display_text, "¡Perfecto! Tu pedido va en camino.");
    }

    #[test]
    fn notes_may_contain_colons() {
        let parsed =
            parse("[ADD_TO_CART:Hot Dog:1:jalapeños:cebolla:entregar a las 14:30, sin prisa]");
        let action = &parsed.actions[0];
        assert_eq!(action.notes.as_deref(), Some("entregar a las 14:30, sin prisa"));
        assert_eq!(action.additions, Some(vec!["jalapeños".to_string()]));
        assert_eq!(action.removals, Some(vec!["cebolla".to_string()]));
    }

    #[test]
    fn comma_lists_are_trimmed_and_blank_entries_dropped() {
        let parsed = parse("[ADD_TO_CART:Hamburguesa Clásica:1: tocino , ,queso :  :]");
        let action = &parsed.actions[0];
        assert_eq!(action.additions, Some(vec!["tocino".to_string(), "queso".to_string()]));
        assert_eq!(action.removals, None);
    }

    #[test]
    fn several_markers_keep_their_order() {
        let parsed = parse(
            "Va: [ADD_TO_CART:Coca-Cola 500ml:1:::] y [ADD_TO_CART:Papas Fritas:2:::] ¿algo más?",
        );
        let names =
            parsed.actions.iter().map(|action| action.product_name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["Coca-Cola 500ml", "Papas Fritas"]);
        assert_eq!(parsed.display_text, "Va:  y  ¿algo más?");
        assert!(!parsed.confirm_order);
    }

    #[test]
    fn malformed_markers_degrade_to_no_action() {
        let parsed = parse("Claro [ADD_TO_CART:Hot Dog:dos] enseguida");
        assert!(parsed.actions.is_empty());
        assert_eq!(parsed.malformed_markers, 1);
        assert_eq!(parsed.display_text, "Claro [ADD_TO_CART:Hot Dog:dos] enseguida");
    }

    #[test]
    fn non_positive_quantities_are_kept_raw() {
        let parsed = parse("[ADD_TO_CART:Sundae de Chocolate:0:::][ADD_TO_CART:Hot Dog:-3:::]");
        let quantities = parsed.actions.iter().map(|action| action.quantity).collect::<Vec<_>>();
        assert_eq!(quantities, vec![0, -3]);
    }

    #[test]
    fn oversized_quantity_is_ignored_without_panicking() {
        let parsed = parse("[ADD_TO_CART:Hot Dog:99999999999999999999999:::]");
        assert!(parsed.actions.is_empty());
    }

    fn field() -> impl Strategy<Value = String> {
        "[a-zA-Z ]{1,12}".prop_map(|value| value.trim().to_string()).prop_filter("non-empty", |v| !v.is_empty())
    }

    proptest! {
        #[test]
        fn markers_in_prose_round_trip(
            prefix in "[a-zA-Z ,.!?]{0,20}",
            suffix in "[a-zA-Z ,.!?]{0,20}",
            names in proptest::collection::vec(field(), 1..4),
            quantity in 1i64..20,
            notes in "[a-zA-Z :]{0,15}",
        ) {
            let markers = names
                .iter()
                .map(|name| format!("[ADD_TO_CART:{name}:{quantity}:::{notes}]"))
                .collect::<String>();
            let raw = format!("{prefix}{markers}{suffix}");
            let parsed = parse(&raw);

            let parsed_names = parsed.actions.iter().map(|action| action.product_name.clone()).collect::<Vec<_>>();
            prop_assert_eq!(parsed_names, names);
            prop_assert!(parsed.actions.iter().all(|action| action.quantity == quantity));
            prop_assert_eq!(parsed.display_text, format!("{prefix}{suffix}").trim().to_string());
        }
    }
}
