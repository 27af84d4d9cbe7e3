use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const BEVERAGE_CATEGORY: &str = "bebidas";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: Decimal,
    pub is_active: bool,
    pub is_featured: bool,
    pub is_combo: bool,
    /// Ingredient that defines the item ("cebolla" for onion rings). Removing it is refused.
    pub principal_ingredient: Option<String>,
    /// `None` for made-to-order items that do not track stock.
    pub stock_quantity: Option<i64>,
    pub min_stock_alert: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_beverage(&self) -> bool {
        self.category.trim().eq_ignore_ascii_case(BEVERAGE_CATEGORY)
    }

    pub fn tracks_stock(&self) -> bool {
        self.stock_quantity.is_some()
    }

    pub fn is_out_of_stock(&self) -> bool {
        matches!(self.stock_quantity, Some(quantity) if quantity <= 0)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<Decimal>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
    pub stock_quantity: Option<i64>,
    pub min_stock_alert: Option<i64>,
}

impl ProductPatch {
    pub fn apply(&self, product: &mut Product, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            product.name = name.clone();
        }
        if let Some(description) = &self.description {
            product.description = description.clone();
        }
        if let Some(category) = &self.category {
            product.category = category.clone();
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(is_active) = self.is_active {
            product.is_active = is_active;
        }
        if let Some(is_featured) = self.is_featured {
            product.is_featured = is_featured;
        }
        if let Some(stock_quantity) = self.stock_quantity {
            product.stock_quantity = Some(stock_quantity);
        }
        if let Some(min_stock_alert) = self.min_stock_alert {
            product.min_stock_alert = Some(min_stock_alert);
        }
        product.updated_at = now;
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: Decimal,
    pub is_combo: bool,
    pub principal_ingredient: Option<String>,
    pub stock_quantity: Option<i64>,
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::{Product, ProductId, ProductPatch};

    fn product() -> Product {
        Product {
            id: ProductId("prod-1".to_string()),
            name: "Coca-Cola 500ml".to_string(),
            description: String::new(),
            category: "Bebidas".to_string(),
            price: Decimal::new(199, 2),
            is_active: true,
            is_featured: false,
            is_combo: false,
            principal_ingredient: None,
            stock_quantity: Some(0),
            min_stock_alert: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn beverage_category_is_case_insensitive() {
        assert!(product().is_beverage());
    }

    #[test]
    fn zero_tracked_stock_is_out_of_stock() {
        let mut product = product();
        assert!(product.is_out_of_stock());
        product.stock_quantity = None;
        assert!(!product.is_out_of_stock());
        assert!(!product.tracks_stock());
    }

    #[test]
    fn patch_only_touches_present_fields() {
        let mut product = product();
        let patch = ProductPatch { price: Some(Decimal::new(250, 2)), ..ProductPatch::default() };
        patch.apply(&mut product, Utc::now());

        assert_eq!(product.price, Decimal::new(250, 2));
        assert_eq!(product.name, "Coca-Cola 500ml");
        assert!(product.is_active);
    }
}
