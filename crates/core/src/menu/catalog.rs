use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::resolver::{normalize, tokenize};
use crate::domain::ingredient::Ingredient;
use crate::domain::product::Product;

/// Ingredient names that must resolve to their bottled product form, never the raw ingredient.
pub const BEVERAGE_DENYLIST: &[&str] = &[
    "coca",
    "coca cola",
    "cocacola",
    "pepsi",
    "sprite",
    "fanta",
    "agua",
    "jugo",
    "refresco",
    "soda",
    "cerveza",
    "te",
    "cafe",
    "limonada",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogSource {
    Product,
    Ingredient,
}

impl CatalogSource {
    pub fn is_product(&self) -> bool {
        matches!(self, Self::Product)
    }
}

/// Per-request view over one orderable thing. Never cached across requests.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    pub source: CatalogSource,
    pub active: bool,
    pub category: Option<String>,
    pub is_combo: bool,
    pub principal_ingredient: Option<String>,
    /// Remaining units when stock is tracked.
    pub stock: Option<i64>,
}

impl CatalogItem {
    pub fn from_product(product: &Product) -> Self {
        Self {
            id: product.id.0.clone(),
            name: product.name.clone(),
            price: product.price,
            source: CatalogSource::Product,
            active: product.is_active,
            category: Some(product.category.clone()),
            is_combo: product.is_combo,
            principal_ingredient: product.principal_ingredient.clone(),
            stock: product.stock_quantity,
        }
    }

    pub fn from_ingredient(ingredient: &Ingredient) -> Self {
        Self {
            id: ingredient.id.0.clone(),
            name: ingredient.name.clone(),
            price: ingredient.extra_price,
            source: CatalogSource::Ingredient,
            active: ingredient.is_available,
            category: None,
            is_combo: false,
            principal_ingredient: None,
            stock: Some(ingredient.stock_quantity),
        }
    }

    pub fn is_beverage(&self) -> bool {
        self.category
            .as_deref()
            .is_some_and(|category| normalize(category) == crate::domain::product::BEVERAGE_CATEGORY)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Catalog {
    items: Vec<CatalogItem>,
}

impl Catalog {
    /// Merges active products with orderable extras, products first.
    pub fn build(products: &[Product], ingredients: &[Ingredient]) -> Self {
        let mut items = products
            .iter()
            .filter(|product| product.is_active)
            .map(CatalogItem::from_product)
            .collect::<Vec<_>>();

        items.extend(
            ingredients
                .iter()
                .filter(|ingredient| ingredient.is_orderable_extra())
                .filter(|ingredient| !is_denylisted_beverage(&ingredient.name))
                .map(CatalogItem::from_ingredient),
        );

        Self { items }
    }

    pub fn from_items(items: Vec<CatalogItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn find(&self, id: &str) -> Option<&CatalogItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

pub fn is_denylisted_beverage(name: &str) -> bool {
    let normalized = normalize(name);
    let name_tokens = tokenize(&normalized);

    BEVERAGE_DENYLIST.iter().any(|entry| {
        let entry_tokens = tokenize(entry);
        entry_tokens.iter().all(|entry_token| name_tokens.contains(entry_token))
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::{is_denylisted_beverage, Catalog, CatalogSource};
    use crate::domain::ingredient::{Ingredient, IngredientId};
    use crate::domain::product::{Product, ProductId};

    fn product(id: &str, name: &str, active: bool) -> Product {
        Product {
            id: ProductId(id.to_string()),
            name: name.to_string(),
            description: String::new(),
            category: "hamburguesas".to_string(),
            price: Decimal::new(899, 2),
            is_active: active,
            is_featured: false,
            is_combo: false,
            principal_ingredient: None,
            stock_quantity: None,
            min_stock_alert: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn ingredient(id: &str, name: &str, stock: i64, sellable: bool) -> Ingredient {
        Ingredient {
            id: IngredientId(id.to_string()),
            name: name.to_string(),
            unit: "porción".to_string(),
            stock_quantity: stock,
            min_stock_alert: None,
            is_available: true,
            is_sellable: sellable,
            extra_price: Decimal::new(150, 2),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn build_merges_active_products_and_orderable_extras() {
        let catalog = Catalog::build(
            &[product("p1", "Hamburguesa Clásica", true), product("p2", "Hot Dog", false)],
            &[
                ingredient("i1", "Tocino", 10, true),
                ingredient("i2", "Lechuga", 10, false),
                ingredient("i3", "Aguacate", 0, true),
                ingredient("i4", "Agua natural", 30, true),
            ],
        );

        let ids = catalog.items().iter().map(|item| item.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["p1", "i1"]);
        assert_eq!(catalog.items()[0].source, CatalogSource::Product);
        assert_eq!(catalog.items()[1].price, Decimal::new(150, 2));
    }

    #[test]
    fn denylist_matches_whole_tokens_only() {
        assert!(is_denylisted_beverage("Coca Cola"));
        assert!(is_denylisted_beverage("Café de olla"));
        assert!(is_denylisted_beverage("Té helado"));
        assert!(!is_denylisted_beverage("Tomate"));
        assert!(!is_denylisted_beverage("Aguacate"));
    }
}
