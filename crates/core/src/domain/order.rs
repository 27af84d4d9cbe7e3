use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::promotion::PromotionId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ACTIVE: [OrderStatus; 4] =
        [Self::Pending, Self::Confirmed, Self::Preparing, Self::Ready];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Preparing => "preparing",
            Self::Ready => "ready",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn label_es(&self) -> &'static str {
        match self {
            Self::Pending => "pendiente",
            Self::Confirmed => "confirmado",
            Self::Preparing => "en preparación",
            Self::Ready => "listo",
            Self::Delivered => "entregado",
            Self::Cancelled => "cancelado",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed)
                | (Self::Pending, Self::Preparing)
                | (Self::Confirmed, Self::Preparing)
                | (Self::Preparing, Self::Ready)
                | (Self::Ready, Self::Delivered)
        ) || (!self.is_terminal() && next == Self::Cancelled)
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "pending" | "pendiente" => Ok(Self::Pending),
            "confirmed" | "confirmado" | "confirmada" => Ok(Self::Confirmed),
            "preparing" | "preparando" | "en preparación" | "en preparacion" => {
                Ok(Self::Preparing)
            }
            "ready" | "listo" | "lista" => Ok(Self::Ready),
            "delivered" | "entregado" | "entregada" => Ok(Self::Delivered),
            "cancelled" | "canceled" | "cancelado" | "cancelada" => Ok(Self::Cancelled),
            other => Err(DomainError::InvariantViolation(format!("unknown order status `{other}`"))),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customizations {
    pub additions: Vec<String>,
    pub removals: Vec<String>,
    pub notes: Option<String>,
}

impl Customizations {
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty() && self.notes.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub item_id: String,
    pub item_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub customizations: Option<Customizations>,
}

impl OrderItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub customer: CustomerInfo,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub applied_promotion: Option<PromotionId>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn transition_to(&mut self, next: OrderStatus) -> Result<(), DomainError> {
        if self.status.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidOrderTransition { from: self.status, to: next })
    }

    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

pub fn order_number_for(created_at: DateTime<Utc>, id: &OrderId) -> String {
    let suffix: String =
        id.0.chars().filter(|c| c.is_ascii_alphanumeric()).take(4).collect::<String>();
    format!("ORD-{}-{}", created_at.format("%Y%m%d"), suffix.to_ascii_uppercase())
}
