pub mod alerts;
pub mod cache;
pub mod config;
pub mod domain;
pub mod errors;
pub mod insights;
pub mod menu;
pub mod metrics;
pub mod pricing;

pub use alerts::{AlertReport, AlertSnapshot, AlertTransition, CriticalCounts, StockAlert};
pub use cache::{Clock, ManualClock, StaleTolerant, SystemClock, TtlCache};
pub use domain::chat::{ChatRole, ChatTurn};
pub use domain::ingredient::{Ingredient, IngredientId, IngredientPatch, NewIngredient};
pub use domain::order::{
    CustomerInfo, Customizations, Order, OrderId, OrderItem, OrderStatus,
};
pub use domain::product::{NewProduct, Product, ProductId, ProductPatch};
pub use domain::promotion::{DiscountType, NewPromotion, Promotion, PromotionId, PromotionPatch};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use insights::{BestSellers, DayPart, ItemTally, PreferenceProfile, SalesPeriod, SalesSummary};
pub use menu::{Catalog, CatalogItem, CatalogMatch, CatalogSource};
pub use metrics::{InMemoryMetricsSink, MetricsSink, TokenUsage, TracingMetricsSink};
pub use pricing::{AppliedPromotion, PricingResult, PricingTraceStep};
