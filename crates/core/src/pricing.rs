use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::order::OrderItem;
use crate::domain::promotion::{DiscountType, Promotion, PromotionId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTraceStep {
    pub stage: String,
    pub detail: String,
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedPromotion {
    pub id: PromotionId,
    pub name: String,
    pub discount_type: DiscountType,
    pub discount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingResult {
    pub subtotal: Decimal,
    pub discount_total: Decimal,
    pub total: Decimal,
    pub applied_promotion: Option<AppliedPromotion>,
    pub trace: Vec<PricingTraceStep>,
}

pub fn subtotal(items: &[OrderItem]) -> Decimal {
    items.iter().map(OrderItem::line_total).sum()
}

/// Single promotion granting the largest discount on `subtotal`.
///
/// A percentage promotion only beats a fixed one when strictly larger; remaining ties keep
/// the earlier promotion.
pub fn select_promotion<'a>(
    promotions: &'a [Promotion],
    subtotal: Decimal,
    now: DateTime<Utc>,
) -> Option<(&'a Promotion, Decimal)> {
    let mut best: Option<(&'a Promotion, Decimal)> = None;

    for promotion in promotions.iter().filter(|promotion| promotion.is_running_at(now)) {
        let Some(discount) = promotion.discount_for(subtotal) else {
            continue;
        };

        let replaces = match best {
            None => true,
            Some((current, current_discount)) => {
                discount > current_discount
                    || (discount == current_discount
                        && current.discount_type == DiscountType::Percentage
                        && promotion.discount_type == DiscountType::Fixed)
            }
        };
        if replaces {
            best = Some((promotion, discount));
        }
    }

    best
}

pub fn price_order(
    items: &[OrderItem],
    promotions: &[Promotion],
    now: DateTime<Utc>,
) -> PricingResult {
    let subtotal = subtotal(items);
    let mut trace = vec![PricingTraceStep {
        stage: "subtotal".to_string(),
        detail: "sum(unit_price * quantity)".to_string(),
        amount: subtotal,
    }];

    let applied_promotion =
        select_promotion(promotions, subtotal, now).map(|(promotion, discount)| {
            AppliedPromotion {
                id: promotion.id.clone(),
                name: promotion.name.clone(),
                discount_type: promotion.discount_type,
                discount,
            }
        });

    let discount_total =
        applied_promotion.as_ref().map_or(Decimal::ZERO, |applied| applied.discount);
    if let Some(applied) = &applied_promotion {
        trace.push(PricingTraceStep {
            stage: "promotion".to_string(),
            detail: format!("{} ({})", applied.name, applied.discount_type.as_str()),
            amount: -applied.discount,
        });
    }

    let total = (subtotal - discount_total).max(Decimal::ZERO);
    trace.push(PricingTraceStep {
        stage: "total".to_string(),
        detail: "subtotal - discount".to_string(),
        amount: total,
    });

    PricingResult { subtotal, discount_total, total, applied_promotion, trace }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::{price_order, select_promotion};
    use crate::domain::order::OrderItem;
    use crate::domain::promotion::{DiscountType, Promotion, PromotionId};

    fn promotion(id: &str, discount_type: DiscountType, value: i64, min_purchase: i64) -> Promotion {
        Promotion {
            id: PromotionId(id.to_string()),
            name: id.to_string(),
            description: String::new(),
            discount_type,
            discount_value: Decimal::from(value),
            min_purchase: Decimal::from(min_purchase),
            is_active: true,
            starts_at: None,
            ends_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn line(price_cents: i64, quantity: u32) -> OrderItem {
        OrderItem {
            item_id: "prod-1".to_string(),
            item_name: "Hamburguesa".to_string(),
            quantity,
            unit_price: Decimal::new(price_cents, 2),
            customizations: None,
        }
    }

    #[test]
    fn larger_percentage_discount_beats_fixed() {
        let promotions = vec![
            promotion("fixed-3", DiscountType::Fixed, 3, 0),
            promotion("ten-percent", DiscountType::Percentage, 10, 20),
        ];

        let (chosen, discount) =
            select_promotion(&promotions, Decimal::from(50), Utc::now()).expect("promotion");
        assert_eq!(chosen.id.0, "ten-percent");
        assert_eq!(discount, Decimal::from(5));
    }

    #[test]
    fn equal_discounts_prefer_fixed_promotion() {
        let promotions = vec![
            promotion("ten-percent", DiscountType::Percentage, 10, 0),
            promotion("fixed-5", DiscountType::Fixed, 5, 0),
        ];

        let (chosen, _) =
            select_promotion(&promotions, Decimal::from(50), Utc::now()).expect("promotion");
        assert_eq!(chosen.id.0, "fixed-5");
    }

    #[test]
    fn inactive_and_unmet_minimum_promotions_are_skipped() {
        let mut inactive = promotion("inactive", DiscountType::Fixed, 20, 0);
        inactive.is_active = false;
        let promotions = vec![inactive, promotion("big-min", DiscountType::Fixed, 10, 100)];

        assert!(select_promotion(&promotions, Decimal::from(50), Utc::now()).is_none());
    }

    #[test]
    fn price_order_traces_subtotal_promotion_and_total() {
        let promotions = vec![promotion("ten-percent", DiscountType::Percentage, 10, 20)];
        let result = price_order(&[line(1000, 5)], &promotions, Utc::now());

        assert_eq!(result.subtotal, Decimal::from(50));
        assert_eq!(result.discount_total, Decimal::from(5));
        assert_eq!(result.total, Decimal::from(45));
        assert_eq!(result.trace.len(), 3);
        assert_eq!(result.applied_promotion.map(|applied| applied.id.0), Some("ten-percent".into()));
    }

    #[test]
    fn no_promotion_leaves_total_equal_to_subtotal() {
        let result = price_order(&[line(299, 2)], &[], Utc::now());
        assert_eq!(result.total, Decimal::new(598, 2));
        assert!(result.applied_promotion.is_none());
        assert_eq!(result.trace.len(), 2);
    }
}
