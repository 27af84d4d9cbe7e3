use chrono::Utc;
use sqlx::Row;

use mesero_core::domain::product::{NewProduct, Product, ProductId, ProductPatch};

use super::{decode_error, new_id, parse_decimal, parse_timestamp, ProductRepository, RepositoryError};
use crate::DbPool;

const PRODUCT_COLUMNS: &str = "id, name, description, category, price, is_active, is_featured,
    is_combo, principal_ingredient, stock_quantity, min_stock_alert, created_at, updated_at";

pub struct SqlProductRepository {
    pool: DbPool,
}

impl SqlProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn write(&self, product: &Product) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO products (id, name, description, category, price, is_active, is_featured,
                                   is_combo, principal_ingredient, stock_quantity, min_stock_alert,
                                   created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 description = excluded.description,
                 category = excluded.category,
                 price = excluded.price,
                 is_active = excluded.is_active,
                 is_featured = excluded.is_featured,
                 is_combo = excluded.is_combo,
                 principal_ingredient = excluded.principal_ingredient,
                 stock_quantity = excluded.stock_quantity,
                 min_stock_alert = excluded.min_stock_alert,
                 updated_at = excluded.updated_at",
        )
        .bind(&product.id.0)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.category)
        .bind(product.price.to_string())
        .bind(product.is_active)
        .bind(product.is_featured)
        .bind(product.is_combo)
        .bind(&product.principal_ingredient)
        .bind(product.stock_quantity)
        .bind(product.min_stock_alert)
        .bind(product.created_at.to_rfc3339())
        .bind(product.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn row_to_product(row: &sqlx::sqlite::SqliteRow) -> Result<Product, RepositoryError> {
    let price: String = row.try_get("price").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_error)?;

    Ok(Product {
        id: ProductId(row.try_get("id").map_err(decode_error)?),
        name: row.try_get("name").map_err(decode_error)?,
        description: row.try_get("description").map_err(decode_error)?,
        category: row.try_get("category").map_err(decode_error)?,
        price: parse_decimal(&price)?,
        is_active: row.try_get("is_active").map_err(decode_error)?,
        is_featured: row.try_get("is_featured").map_err(decode_error)?,
        is_combo: row.try_get("is_combo").map_err(decode_error)?,
        principal_ingredient: row.try_get("principal_ingredient").map_err(decode_error)?,
        stock_quantity: row.try_get("stock_quantity").map_err(decode_error)?,
        min_stock_alert: row.try_get("min_stock_alert").map_err(decode_error)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

#[async_trait::async_trait]
impl ProductRepository for SqlProductRepository {
    async fn list_active(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = 1 ORDER BY category, name"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_product).collect()
    }

    async fn list_all(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows =
            sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY category, name"))
                .fetch_all(&self.pool)
                .await?;

        rows.iter().map(row_to_product).collect()
    }

    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn create(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        let now = Utc::now();
        let product = Product {
            id: ProductId(new_id()),
            name: product.name,
            description: product.description,
            category: product.category,
            price: product.price,
            is_active: true,
            is_featured: false,
            is_combo: product.is_combo,
            principal_ingredient: product.principal_ingredient,
            stock_quantity: product.stock_quantity,
            min_stock_alert: None,
            created_at: now,
            updated_at: now,
        };

        self.write(&product).await?;
        Ok(product)
    }

    async fn update(
        &self,
        id: &ProductId,
        patch: &ProductPatch,
    ) -> Result<Product, RepositoryError> {
        let mut product = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound { entity: "product", id: id.0.clone() })?;

        patch.apply(&mut product, Utc::now());
        self.write(&product).await?;
        Ok(product)
    }

    async fn delete(&self, id: &ProductId) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM products WHERE id = ?").bind(&id.0).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use mesero_core::domain::product::{NewProduct, ProductPatch};

    use super::SqlProductRepository;
    use crate::repositories::ProductRepository;
    use crate::{connect_with_settings, migrations};

    async fn repository() -> SqlProductRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlProductRepository::new(pool)
    }

    fn new_product(name: &str) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            description: "Con queso".to_string(),
            category: "hamburguesas".to_string(),
            price: Decimal::new(899, 2),
            is_combo: false,
            principal_ingredient: Some("carne de res".to_string()),
            stock_quantity: None,
        }
    }

    #[tokio::test]
    async fn create_then_find_round_trip() {
        let repo = repository().await;
        let created = repo.create(new_product("Hamburguesa Clásica")).await.expect("create");

        let found = repo.find_by_id(&created.id).await.expect("find").expect("present");
        assert_eq!(found.name, "Hamburguesa Clásica");
        assert_eq!(found.price, Decimal::new(899, 2));
        assert_eq!(found.principal_ingredient.as_deref(), Some("carne de res"));
        assert!(found.is_active);
    }

    #[tokio::test]
    async fn deactivated_products_leave_the_active_listing() {
        let repo = repository().await;
        let first = repo.create(new_product("Hamburguesa Clásica")).await.expect("create");
        repo.create(new_product("Hamburguesa Doble")).await.expect("create");

        let patch = ProductPatch { is_active: Some(false), ..ProductPatch::default() };
        let updated = repo.update(&first.id, &patch).await.expect("update");
        assert!(!updated.is_active);
        assert!(updated.updated_at >= first.updated_at);

        let active = repo.list_active().await.expect("list active");
        assert_eq!(active.len(), 1);
        assert_eq!(repo.list_all().await.expect("list all").len(), 2);
    }

    #[tokio::test]
    async fn delete_reports_whether_a_row_was_removed() {
        let repo = repository().await;
        let created = repo.create(new_product("Hot Dog")).await.expect("create");

        assert!(repo.delete(&created.id).await.expect("delete"));
        assert!(!repo.delete(&created.id).await.expect("delete again"));
    }
}
