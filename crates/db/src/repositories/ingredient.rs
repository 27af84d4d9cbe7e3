use chrono::Utc;
use sqlx::Row;

use mesero_core::domain::ingredient::{Ingredient, IngredientId, IngredientPatch, NewIngredient};

use super::{
    decode_error, new_id, parse_decimal, parse_timestamp, IngredientRepository, RepositoryError,
};
use crate::DbPool;

const INGREDIENT_COLUMNS: &str = "id, name, unit, stock_quantity, min_stock_alert, is_available,
    is_sellable, extra_price, created_at, updated_at";

pub struct SqlIngredientRepository {
    pool: DbPool,
}

impl SqlIngredientRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn write(&self, ingredient: &Ingredient) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO ingredients (id, name, unit, stock_quantity, min_stock_alert, is_available,
                                      is_sellable, extra_price, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 unit = excluded.unit,
                 stock_quantity = excluded.stock_quantity,
                 min_stock_alert = excluded.min_stock_alert,
                 is_available = excluded.is_available,
                 is_sellable = excluded.is_sellable,
                 extra_price = excluded.extra_price,
                 updated_at = excluded.updated_at",
        )
        .bind(&ingredient.id.0)
        .bind(&ingredient.name)
        .bind(&ingredient.unit)
        .bind(ingredient.stock_quantity)
        .bind(ingredient.min_stock_alert)
        .bind(ingredient.is_available)
        .bind(ingredient.is_sellable)
        .bind(ingredient.extra_price.to_string())
        .bind(ingredient.created_at.to_rfc3339())
        .bind(ingredient.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn row_to_ingredient(row: &sqlx::sqlite::SqliteRow) -> Result<Ingredient, RepositoryError> {
    let extra_price: String = row.try_get("extra_price").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_error)?;

    Ok(Ingredient {
        id: IngredientId(row.try_get("id").map_err(decode_error)?),
        name: row.try_get("name").map_err(decode_error)?,
        unit: row.try_get("unit").map_err(decode_error)?,
        stock_quantity: row.try_get("stock_quantity").map_err(decode_error)?,
        min_stock_alert: row.try_get("min_stock_alert").map_err(decode_error)?,
        is_available: row.try_get("is_available").map_err(decode_error)?,
        is_sellable: row.try_get("is_sellable").map_err(decode_error)?,
        extra_price: parse_decimal(&extra_price)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

#[async_trait::async_trait]
impl IngredientRepository for SqlIngredientRepository {
    async fn list_all(&self) -> Result<Vec<Ingredient>, RepositoryError> {
        let rows = sqlx::query(&format!("SELECT {INGREDIENT_COLUMNS} FROM ingredients ORDER BY name"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_ingredient).collect()
    }

    async fn list_available(&self) -> Result<Vec<Ingredient>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {INGREDIENT_COLUMNS} FROM ingredients
             WHERE is_available = 1 AND stock_quantity > 0
             ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_ingredient).collect()
    }

    async fn find_by_id(&self, id: &IngredientId) -> Result<Option<Ingredient>, RepositoryError> {
        let row =
            sqlx::query(&format!("SELECT {INGREDIENT_COLUMNS} FROM ingredients WHERE id = ?"))
                .bind(&id.0)
                .fetch_optional(&self.pool)
                .await?;

        row.as_ref().map(row_to_ingredient).transpose()
    }

    async fn create(&self, ingredient: NewIngredient) -> Result<Ingredient, RepositoryError> {
        let now = Utc::now();
        let ingredient = Ingredient {
            id: IngredientId(new_id()),
            name: ingredient.name,
            unit: ingredient.unit,
            stock_quantity: ingredient.stock_quantity,
            min_stock_alert: ingredient.min_stock_alert,
            is_available: true,
            is_sellable: ingredient.is_sellable,
            extra_price: ingredient.extra_price,
            created_at: now,
            updated_at: now,
        };

        self.write(&ingredient).await?;
        Ok(ingredient)
    }

    async fn update(
        &self,
        id: &IngredientId,
        patch: &IngredientPatch,
    ) -> Result<Ingredient, RepositoryError> {
        let mut ingredient = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound { entity: "ingredient", id: id.0.clone() })?;

        patch.apply(&mut ingredient, Utc::now());
        self.write(&ingredient).await?;
        Ok(ingredient)
    }
}
