use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Tables the baseline migration creates.
pub const MANAGED_TABLES: &[&str] =
    &["products", "ingredients", "promotions", "orders", "order_items", "chat_turns"];

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

/// Managed tables absent from the connected database, in declaration order.
pub async fn missing_tables(pool: &DbPool) -> Result<Vec<&'static str>, sqlx::Error> {
    let present: Vec<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table'")
            .fetch_all(pool)
            .await?;
    Ok(MANAGED_TABLES
        .iter()
        .copied()
        .filter(|table| !present.iter().any(|name| name == table))
        .collect())
}
