use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IngredientId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: IngredientId,
    pub name: String,
    pub unit: String,
    pub stock_quantity: i64,
    pub min_stock_alert: Option<i64>,
    pub is_available: bool,
    /// Sellable ingredients can be ordered as extras on their own.
    pub is_sellable: bool,
    pub extra_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ingredient {
    pub fn in_stock(&self) -> bool {
        self.stock_quantity > 0
    }

    pub fn is_orderable_extra(&self) -> bool {
        self.is_sellable && self.is_available && self.in_stock()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientPatch {
    pub name: Option<String>,
    pub unit: Option<String>,
    pub stock_quantity: Option<i64>,
    pub min_stock_alert: Option<i64>,
    pub is_available: Option<bool>,
    pub is_sellable: Option<bool>,
    pub extra_price: Option<Decimal>,
}

impl IngredientPatch {
    pub fn stock(quantity: i64) -> Self {
        Self { stock_quantity: Some(quantity), ..Self::default() }
    }

    pub fn availability(is_available: bool) -> Self {
        Self { is_available: Some(is_available), ..Self::default() }
    }

    pub fn apply(&self, ingredient: &mut Ingredient, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            ingredient.name = name.clone();
        }
        if let Some(unit) = &self.unit {
            ingredient.unit = unit.clone();
        }
        if let Some(stock_quantity) = self.stock_quantity {
            ingredient.stock_quantity = stock_quantity;
        }
        if let Some(min_stock_alert) = self.min_stock_alert {
            ingredient.min_stock_alert = Some(min_stock_alert);
        }
        if let Some(is_available) = self.is_available {
            ingredient.is_available = is_available;
        }
        if let Some(is_sellable) = self.is_sellable {
            ingredient.is_sellable = is_sellable;
        }
        if let Some(extra_price) = self.extra_price {
            ingredient.extra_price = extra_price;
        }
        ingredient.updated_at = now;
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIngredient {
    pub name: String,
    pub unit: String,
    pub stock_quantity: i64,
    pub min_stock_alert: Option<i64>,
    pub is_sellable: bool,
    pub extra_price: Decimal,
}
