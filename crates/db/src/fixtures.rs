use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

const SEED_PRODUCT_IDS: &[&str] = &[
    "prod-hamburguesa-clasica",
    "prod-hamburguesa-doble",
    "prod-aros-cebolla",
    "prod-papas-fritas",
    "prod-coca-cola",
    "prod-sprite",
    "prod-agua",
    "prod-combo-deluxe",
    "prod-hot-dog",
    "prod-sundae",
];

const SEED_INGREDIENT_IDS: &[&str] = &[
    "ing-carne-res",
    "ing-queso",
    "ing-tocino",
    "ing-aguacate",
    "ing-jalapenos",
    "ing-cebolla",
    "ing-lechuga",
    "ing-tomate",
    "ing-papa",
    "ing-salchicha",
    "ing-agua",
];

const SEED_PROMOTION_IDS: &[&str] = &["promo-diez", "promo-tres"];

/// Demo restaurant menu: products, ingredients and two competing promotions.
///
/// Includes low stock rows (`prod-sprite`, `ing-aguacate`), an exhausted ingredient
/// (`ing-tomate`) and a sellable beverage ingredient (`ing-agua`).
pub struct DemoMenuDataset;

impl DemoMenuDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_menu.sql");

    /// Idempotent: rerunning leaves existing rows untouched.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            products: SEED_PRODUCT_IDS.len(),
            ingredients: SEED_INGREDIENT_IDS.len(),
            promotions: SEED_PROMOTION_IDS.len(),
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for (label, table, ids) in [
            ("products", "products", SEED_PRODUCT_IDS),
            ("ingredients", "ingredients", SEED_INGREDIENT_IDS),
            ("promotions", "promotions", SEED_PROMOTION_IDS),
        ] {
            let quoted = sql_array_from_ids(ids);
            let present: i64 =
                sqlx::query_scalar(&format!("SELECT COUNT(1) FROM {table} WHERE id IN {quoted}"))
                    .fetch_one(pool)
                    .await?;
            checks.push((label, present == ids.len() as i64));
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{id}'")).collect::<Vec<_>>().join(", ");
    format!("({quoted})")
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedResult {
    pub products: usize,
    pub ingredients: usize,
    pub promotions: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
