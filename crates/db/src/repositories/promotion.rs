use chrono::Utc;
use sqlx::Row;

use mesero_core::domain::promotion::{
    DiscountType, NewPromotion, Promotion, PromotionId, PromotionPatch,
};

use super::{
    decode_error, new_id, parse_decimal, parse_optional_timestamp, parse_timestamp,
    PromotionRepository, RepositoryError,
};
use crate::DbPool;

const PROMOTION_COLUMNS: &str = "id, name, description, discount_type, discount_value,
    min_purchase, is_active, starts_at, ends_at, created_at, updated_at";

pub struct SqlPromotionRepository {
    pool: DbPool,
}

impl SqlPromotionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn find_by_id(&self, id: &PromotionId) -> Result<Option<Promotion>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {PROMOTION_COLUMNS} FROM promotions WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_promotion).transpose()
    }

    async fn write(&self, promotion: &Promotion) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO promotions (id, name, description, discount_type, discount_value,
                                     min_purchase, is_active, starts_at, ends_at, created_at,
                                     updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 description = excluded.description,
                 discount_type = excluded.discount_type,
                 discount_value = excluded.discount_value,
                 min_purchase = excluded.min_purchase,
                 is_active = excluded.is_active,
                 starts_at = excluded.starts_at,
                 ends_at = excluded.ends_at,
                 updated_at = excluded.updated_at",
        )
        .bind(&promotion.id.0)
        .bind(&promotion.name)
        .bind(&promotion.description)
        .bind(promotion.discount_type.as_str())
        .bind(promotion.discount_value.to_string())
        .bind(promotion.min_purchase.to_string())
        .bind(promotion.is_active)
        .bind(promotion.starts_at.map(|value| value.to_rfc3339()))
        .bind(promotion.ends_at.map(|value| value.to_rfc3339()))
        .bind(promotion.created_at.to_rfc3339())
        .bind(promotion.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn row_to_promotion(row: &sqlx::sqlite::SqliteRow) -> Result<Promotion, RepositoryError> {
    let discount_type: String = row.try_get("discount_type").map_err(decode_error)?;
    let discount_value: String = row.try_get("discount_value").map_err(decode_error)?;
    let min_purchase: String = row.try_get("min_purchase").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_error)?;

    Ok(Promotion {
        id: PromotionId(row.try_get("id").map_err(decode_error)?),
        name: row.try_get("name").map_err(decode_error)?,
        description: row.try_get("description").map_err(decode_error)?,
        discount_type: discount_type.parse::<DiscountType>().map_err(decode_error)?,
        discount_value: parse_decimal(&discount_value)?,
        min_purchase: parse_decimal(&min_purchase)?,
        is_active: row.try_get("is_active").map_err(decode_error)?,
        starts_at: parse_optional_timestamp(row.try_get("starts_at").map_err(decode_error)?)?,
        ends_at: parse_optional_timestamp(row.try_get("ends_at").map_err(decode_error)?)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

#[async_trait::async_trait]
impl PromotionRepository for SqlPromotionRepository {
    async fn list_all(&self) -> Result<Vec<Promotion>, RepositoryError> {
        let rows =
            sqlx::query(&format!("SELECT {PROMOTION_COLUMNS} FROM promotions ORDER BY created_at"))
                .fetch_all(&self.pool)
                .await?;

        rows.iter().map(row_to_promotion).collect()
    }

    async fn list_active(&self) -> Result<Vec<Promotion>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {PROMOTION_COLUMNS} FROM promotions WHERE is_active = 1 ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_promotion).collect()
    }

    async fn create(&self, promotion: NewPromotion) -> Result<Promotion, RepositoryError> {
        let now = Utc::now();
        let promotion = Promotion {
            id: PromotionId(new_id()),
            name: promotion.name,
            description: promotion.description,
            discount_type: promotion.discount_type,
            discount_value: promotion.discount_value,
            min_purchase: promotion.min_purchase,
            is_active: true,
            starts_at: promotion.starts_at,
            ends_at: promotion.ends_at,
            created_at: now,
            updated_at: now,
        };

        self.write(&promotion).await?;
        Ok(promotion)
    }

    async fn update(
        &self,
        id: &PromotionId,
        patch: &PromotionPatch,
    ) -> Result<Promotion, RepositoryError> {
        let mut promotion = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound { entity: "promotion", id: id.0.clone() })?;

        patch.apply(&mut promotion, Utc::now());
        self.write(&promotion).await?;
        Ok(promotion)
    }

    async fn delete(&self, id: &PromotionId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM promotions WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
