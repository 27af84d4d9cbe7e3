use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PromotionId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Percentage => "percentage",
            Self::Fixed => "fixed",
        }
    }
}

impl std::str::FromStr for DiscountType {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "percentage" | "percent" | "porcentaje" | "%" => Ok(Self::Percentage),
            "fixed" | "fijo" | "monto" | "amount" => Ok(Self::Fixed),
            other => Err(DomainError::InvariantViolation(format!(
                "unsupported discount type `{other}` (expected percentage|fixed)"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promotion {
    pub id: PromotionId,
    pub name: String,
    pub description: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub min_purchase: Decimal,
    pub is_active: bool,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Promotion {
    pub fn is_running_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.starts_at.map_or(true, |starts_at| starts_at <= now)
            && self.ends_at.map_or(true, |ends_at| now <= ends_at)
    }

    /// Discount this promotion would grant on `subtotal`, or `None` when the minimum is not met.
    pub fn discount_for(&self, subtotal: Decimal) -> Option<Decimal> {
        if subtotal < self.min_purchase || subtotal <= Decimal::ZERO {
            return None;
        }

        let discount = match self.discount_type {
            DiscountType::Percentage => {
                (subtotal * self.discount_value / Decimal::ONE_HUNDRED).round_dp(2)
            }
            DiscountType::Fixed => self.discount_value.min(subtotal),
        };

        (discount > Decimal::ZERO).then_some(discount)
    }

    pub fn describe_discount(&self) -> String {
        match self.discount_type {
            DiscountType::Percentage => format!("{}% de descuento", self.discount_value.normalize()),
            DiscountType::Fixed => format!("${} de descuento", self.discount_value.round_dp(2)),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub discount_type: Option<DiscountType>,
    pub discount_value: Option<Decimal>,
    pub min_purchase: Option<Decimal>,
    pub is_active: Option<bool>,
}

impl PromotionPatch {
    pub fn apply(&self, promotion: &mut Promotion, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            promotion.name = name.clone();
        }
        if let Some(description) = &self.description {
            promotion.description = description.clone();
        }
        if let Some(discount_type) = self.discount_type {
            promotion.discount_type = discount_type;
        }
        if let Some(discount_value) = self.discount_value {
            promotion.discount_value = discount_value;
        }
        if let Some(min_purchase) = self.min_purchase {
            promotion.min_purchase = min_purchase;
        }
        if let Some(is_active) = self.is_active {
            promotion.is_active = is_active;
        }
        promotion.updated_at = now;
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPromotion {
    pub name: String,
    pub description: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub min_purchase: Decimal,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

/// Rejects values the pricing engine cannot apply.
pub fn validate_discount(discount_type: DiscountType, value: Decimal) -> Result<(), DomainError> {
    if value <= Decimal::ZERO {
        return Err(DomainError::InvariantViolation(
            "el valor del descuento debe ser mayor que cero".to_string(),
        ));
    }
    if discount_type == DiscountType::Percentage && value > Decimal::ONE_HUNDRED {
        return Err(DomainError::InvariantViolation(
            "un descuento porcentual no puede superar el 100%".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use super::{validate_discount, DiscountType, Promotion, PromotionId};

    fn promotion(discount_type: DiscountType, value: i64, min_purchase: i64) -> Promotion {
        Promotion {
            id: PromotionId("promo-1".to_string()),
            name: "Promo".to_string(),
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

    #[test]
    fn percentage_discount_respects_minimum_purchase() {
        let promo = promotion(DiscountType::Percentage, 10, 20);
        assert_eq!(promo.discount_for(Decimal::from(50)), Some(Decimal::from(5)));
        assert_eq!(promo.discount_for(Decimal::from(19)), None);
    }

    #[test]
    fn fixed_discount_never_exceeds_subtotal() {
        let promo = promotion(DiscountType::Fixed, 10, 0);
        assert_eq!(promo.discount_for(Decimal::from(4)), Some(Decimal::from(4)));
    }

    #[test]
    fn expired_promotions_are_not_running() {
        let mut promo = promotion(DiscountType::Fixed, 3, 0);
        promo.ends_at = Some(Utc::now() - Duration::days(1));
        assert!(!promo.is_running_at(Utc::now()));
    }

    #[test]
    fn discount_type_accepts_spanish_names() {
        assert_eq!("porcentaje".parse::<DiscountType>().ok(), Some(DiscountType::Percentage));
        assert_eq!("fijo".parse::<DiscountType>().ok(), Some(DiscountType::Fixed));
        assert!("bogo".parse::<DiscountType>().is_err());
    }

    #[test]
    fn validation_rejects_out_of_range_values() {
        assert!(validate_discount(DiscountType::Percentage, Decimal::from(120)).is_err());
        assert!(validate_discount(DiscountType::Fixed, Decimal::ZERO).is_err());
        assert!(validate_discount(DiscountType::Fixed, Decimal::from(120)).is_ok());
    }
}
