use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use mesero_core::domain::chat::ChatTurn;
use mesero_core::domain::ingredient::{Ingredient, IngredientId, IngredientPatch, NewIngredient};
use mesero_core::domain::order::{Order, OrderId, OrderStatus};
use mesero_core::domain::product::{NewProduct, Product, ProductId, ProductPatch};
use mesero_core::domain::promotion::{NewPromotion, Promotion, PromotionId, PromotionPatch};

pub mod chat;
pub mod ingredient;
pub mod memory;
pub mod order;
pub mod product;
pub mod promotion;

pub use chat::SqlChatRepository;
pub use ingredient::SqlIngredientRepository;
pub use memory::{
    InMemoryChatRepository, InMemoryIngredientRepository, InMemoryOrderRepository,
    InMemoryProductRepository, InMemoryPromotionRepository,
};
pub use order::SqlOrderRepository;
pub use product::SqlProductRepository;
pub use promotion::SqlPromotionRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn list_active(&self) -> Result<Vec<Product>, RepositoryError>;
    async fn list_all(&self) -> Result<Vec<Product>, RepositoryError>;
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError>;
    async fn create(&self, product: NewProduct) -> Result<Product, RepositoryError>;
    async fn update(&self, id: &ProductId, patch: &ProductPatch)
        -> Result<Product, RepositoryError>;
    async fn delete(&self, id: &ProductId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait IngredientRepository: Send + Sync {
    async fn list_all(&self) -> Result<Vec<Ingredient>, RepositoryError>;
    /// Available and in stock.
    async fn list_available(&self) -> Result<Vec<Ingredient>, RepositoryError>;
    async fn find_by_id(&self, id: &IngredientId) -> Result<Option<Ingredient>, RepositoryError>;
    async fn create(&self, ingredient: NewIngredient) -> Result<Ingredient, RepositoryError>;
    async fn update(
        &self,
        id: &IngredientId,
        patch: &IngredientPatch,
    ) -> Result<Ingredient, RepositoryError>;
}

#[async_trait]
pub trait PromotionRepository: Send + Sync {
    async fn list_all(&self) -> Result<Vec<Promotion>, RepositoryError>;
    async fn list_active(&self) -> Result<Vec<Promotion>, RepositoryError>;
    async fn create(&self, promotion: NewPromotion) -> Result<Promotion, RepositoryError>;
    async fn update(
        &self,
        id: &PromotionId,
        patch: &PromotionPatch,
    ) -> Result<Promotion, RepositoryError>;
    async fn delete(&self, id: &PromotionId) -> Result<bool, RepositoryError>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub statuses: Vec<OrderStatus>,
    pub since: Option<DateTime<Utc>>,
    pub customer_email: Option<String>,
    pub limit: Option<u32>,
}

impl OrderFilter {
    pub fn active() -> Self {
        Self { statuses: OrderStatus::ACTIVE.to_vec(), ..Self::default() }
    }

    pub fn since(since: DateTime<Utc>) -> Self {
        Self { since: Some(since), ..Self::default() }
    }

    pub fn for_customer(email: impl Into<String>) -> Self {
        Self { customer_email: Some(email.into()), ..Self::default() }
    }

    pub fn matches(&self, order: &Order) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&order.status))
            && self.since.map_or(true, |since| order.created_at >= since)
            && self.customer_email.as_deref().map_or(true, |email| {
                order
                    .customer
                    .email
                    .as_deref()
                    .is_some_and(|candidate| candidate.eq_ignore_ascii_case(email))
            })
    }
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Newest first.
    async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, RepositoryError>;
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError>;
    async fn create(&self, order: &Order) -> Result<(), RepositoryError>;
    async fn update_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ChatRepository: Send + Sync {
    async fn append_turn(&self, session_id: &str, turn: &ChatTurn) -> Result<(), RepositoryError>;
    async fn list_session(&self, session_id: &str) -> Result<Vec<ChatTurn>, RepositoryError>;
}

pub(crate) fn decode_error(error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("invalid timestamp `{value}`: {error}")))
}

/// Fixed-width UTC form so stored timestamps sort lexicographically.
pub(crate) fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_optional_timestamp(
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.as_deref().map(parse_timestamp).transpose()
}

pub(crate) fn parse_decimal(value: &str) -> Result<Decimal, RepositoryError> {
    value
        .parse::<Decimal>()
        .map_err(|error| RepositoryError::Decode(format!("invalid decimal `{value}`: {error}")))
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
