use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use mesero_core::cache::Clock;
use mesero_core::domain::ingredient::{Ingredient, IngredientId};
use mesero_core::domain::order::{
    order_number_for, CustomerInfo, Customizations, Order, OrderId, OrderItem, OrderStatus,
};
use mesero_core::domain::product::{Product, ProductId};
use mesero_core::errors::{ApplicationError, DomainError};
use mesero_core::pricing::{price_order, AppliedPromotion, PricingTraceStep};
use mesero_db::RepositoryError;

use crate::api::AppState;
use crate::error::ApiError;

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub customer: CustomerInfo,
    #[serde(default)]
    pub items: Vec<OrderLineRequest>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineRequest {
    pub item_id: String,
    pub quantity: u32,
    #[serde(default)]
    pub customizations: Option<Customizations>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineView {
    pub item_id: String,
    pub item_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customizations: Option<Customizations>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: String,
    pub order_number: String,
    pub customer: CustomerInfo,
    pub status: OrderStatus,
    pub items: Vec<OrderLineView>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub applied_promotion: Option<AppliedPromotion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub pricing_trace: Vec<PricingTraceStep>,
    pub created_at: DateTime<Utc>,
}

impl OrderView {
    fn new(order: &Order, applied_promotion: Option<AppliedPromotion>, trace: Vec<PricingTraceStep>) -> Self {
        Self {
            id: order.id.0.clone(),
            order_number: order.order_number.clone(),
            customer: order.customer.clone(),
            status: order.status,
            items: order
                .items
                .iter()
                .map(|item| OrderLineView {
                    item_id: item.item_id.clone(),
                    item_name: item.item_name.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    line_total: item.line_total(),
                    customizations: item.customizations.clone().filter(|c| !c.is_empty()),
                })
                .collect(),
            subtotal: order.subtotal,
            discount: order.discount,
            total: order.total,
            applied_promotion,
            notes: order.notes.clone(),
            pricing_trace: trace,
            created_at: order.created_at,
        }
    }
}

/// `POST /orders`: re-prices every line from the live catalog, applies the best promotion
/// and stores the order as pending.
pub async fn create_order(
    State(state): State<AppState>,
    Json(body): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderView>), ApiError> {
    let correlation_id = Uuid::new_v4().to_string();

    if body.customer.name.trim().is_empty() {
        return Err(ApiError::bad_request("customer.name is required", correlation_id));
    }
    if body.items.is_empty() {
        return Err(ApiError::bad_request("an order needs at least one item", correlation_id));
    }

    let persistence = |error: RepositoryError| {
        ApiError::from_application(ApplicationError::Persistence(error.to_string()), &correlation_id)
    };

    let mut items = Vec::with_capacity(body.items.len());
    for line in &body.items {
        let item = price_line(&state, line).await.map_err(|error| match error {
            LineError::Repository(error) => persistence(error),
            LineError::Domain(error) => ApiError::from_application(error, &correlation_id),
        })?;
        items.push(item);
    }

    let promotions = state.repositories.promotions.list_active().await.map_err(persistence)?;
    let now = state.clock.now();
    let pricing = price_order(&items, &promotions, now);

    let id = OrderId(Uuid::new_v4().to_string());
    let order = Order {
        order_number: order_number_for(now, &id),
        id,
        customer: body.customer,
        status: OrderStatus::Pending,
        items,
        subtotal: pricing.subtotal,
        discount: pricing.discount_total,
        total: pricing.total,
        applied_promotion: pricing.applied_promotion.as_ref().map(|applied| applied.id.clone()),
        notes: body.notes.filter(|notes| !notes.trim().is_empty()),
        created_at: now,
        updated_at: now,
    };
    state.repositories.orders.create(&order).await.map_err(persistence)?;

    info!(
        event_name = "orders.created",
        correlation_id = %correlation_id,
        order_number = %order.order_number,
        items = order.item_count(),
        total = %order.total,
        promotion = pricing.applied_promotion.as_ref().map_or("none", |applied| applied.name.as_str()),
        "order created"
    );

    Ok((StatusCode::CREATED, Json(OrderView::new(&order, pricing.applied_promotion, pricing.trace))))
}

enum LineError {
    Repository(RepositoryError),
    Domain(DomainError),
}

impl From<RepositoryError> for LineError {
    fn from(error: RepositoryError) -> Self {
        Self::Repository(error)
    }
}

async fn price_line(state: &AppState, line: &OrderLineRequest) -> Result<OrderItem, LineError> {
    if line.quantity == 0 {
        return Err(LineError::Domain(DomainError::InvariantViolation(format!(
            "quantity for `{}` must be at least 1",
            line.item_id
        ))));
    }

    let product = state.repositories.products.find_by_id(&ProductId(line.item_id.clone())).await?;
    if let Some(product) = product {
        check_product(&product, line.quantity)?;
        return Ok(order_item(line, product.name, product.price));
    }

    let ingredient =
        state.repositories.ingredients.find_by_id(&IngredientId(line.item_id.clone())).await?;
    match ingredient {
        Some(ingredient) if ingredient.is_sellable => {
            check_ingredient(&ingredient, line.quantity)?;
            Ok(order_item(line, ingredient.name, ingredient.extra_price))
        }
        _ => Err(LineError::Domain(DomainError::NotFound {
            entity: "menu item",
            reference: line.item_id.clone(),
        })),
    }
}

fn check_product(product: &Product, quantity: u32) -> Result<(), LineError> {
    let short = product.stock_quantity.is_some_and(|stock| stock < i64::from(quantity));
    if !product.is_active || short {
        return Err(LineError::Domain(DomainError::OutOfStock { item: product.name.clone() }));
    }
    Ok(())
}

fn check_ingredient(ingredient: &Ingredient, quantity: u32) -> Result<(), LineError> {
    if !ingredient.is_available || ingredient.stock_quantity < i64::from(quantity) {
        return Err(LineError::Domain(DomainError::OutOfStock { item: ingredient.name.clone() }));
    }
    Ok(())
}

fn order_item(line: &OrderLineRequest, name: String, unit_price: Decimal) -> OrderItem {
    OrderItem {
        item_id: line.item_id.clone(),
        item_name: name,
        quantity: line.quantity,
        unit_price,
        customizations: line.customizations.clone(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use axum::Router;
    use serde_json::{json, Value};

    use mesero_agent::{
        AdminAgent, AdminAgentSettings, CustomerAgent, CustomerAgentSettings, DisabledClient,
        PromptRenderer, Repositories,
    };
    use mesero_core::cache::SystemClock;
    use mesero_core::metrics::InMemoryMetricsSink;
    use mesero_db::repositories::{
        SqlChatRepository, SqlIngredientRepository, SqlOrderRepository, SqlProductRepository,
        SqlPromotionRepository,
    };
    use mesero_db::{connect_with_settings, migrations, DbPool, DemoMenuDataset, OrderFilter};

    use crate::api::tests::post_json;
    use crate::api::{router, AppState};

    async fn seeded_app() -> (Router, Repositories, DbPool) {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool connects");
        migrations::run_pending(&pool).await.expect("migrations apply");
        DemoMenuDataset::load(&pool).await.expect("demo menu loads");

        let repositories = Repositories {
            products: Arc::new(SqlProductRepository::new(pool.clone())),
            ingredients: Arc::new(SqlIngredientRepository::new(pool.clone())),
            promotions: Arc::new(SqlPromotionRepository::new(pool.clone())),
            orders: Arc::new(SqlOrderRepository::new(pool.clone())),
            chat: Arc::new(SqlChatRepository::new(pool.clone())),
        };
        let prompts = Arc::new(PromptRenderer::new().expect("templates parse"));
        let metrics = Arc::new(InMemoryMetricsSink::default());
        let clock = Arc::new(SystemClock);
        let state = AppState {
            customer_agent: Arc::new(CustomerAgent::new(
                Arc::new(DisabledClient),
                repositories.clone(),
                prompts.clone(),
                metrics.clone(),
                clock.clone(),
                CustomerAgentSettings::default(),
            )),
            admin_agent: Arc::new(AdminAgent::new(
                Arc::new(DisabledClient),
                repositories.clone(),
                prompts,
                metrics,
                clock.clone(),
                AdminAgentSettings::default(),
            )),
            repositories: repositories.clone(),
            clock,
            low_stock_threshold: 5,
            llm_configured: false,
        };
        (router(state), repositories, pool)
    }

    fn order_body(items: Value) -> Value {
        json!({
            "customer": { "name": "Ana", "email": "ana@example.com", "phone": null },
            "items": items,
            "notes": "sin prisa"
        })
    }

    #[tokio::test]
    async fn percentage_promotion_wins_when_it_is_larger() {
        let (router, repositories, pool) = seeded_app().await;
        let (status, body) = post_json(
            &router,
            "/orders",
            order_body(json!([{ "itemId": "prod-combo-deluxe", "quantity": 3 }])),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["subtotal"], "44.97");
        assert_eq!(body["discount"], "4.50");
        assert_eq!(body["total"], "40.47");
        assert_eq!(body["appliedPromotion"]["id"], "promo-diez");
        assert_eq!(body["status"], "pending");
        assert!(body["orderNumber"].as_str().expect("order number").starts_with("ORD-"));
        assert_eq!(body["pricingTrace"].as_array().expect("trace").len(), 3);

        let stored = repositories.orders.list(&OrderFilter::default()).await.expect("orders list");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].items[0].item_name, "Combo Deluxe");
        pool.close().await;
    }

    #[tokio::test]
    async fn fixed_promotion_wins_when_percentage_is_smaller() {
        let (router, _, pool) = seeded_app().await;
        let (status, body) = post_json(
            &router,
            "/orders",
            order_body(json!([{ "itemId": "prod-combo-deluxe", "quantity": 2 }])),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["subtotal"], "29.98");
        assert_eq!(body["appliedPromotion"]["id"], "promo-tres");
        assert_eq!(body["total"], "26.98");
        pool.close().await;
    }

    #[tokio::test]
    async fn sellable_ingredients_are_priced_as_extras() {
        let (router, _, pool) = seeded_app().await;
        let (status, body) = post_json(
            &router,
            "/orders",
            order_body(json!([
                { "itemId": "prod-hot-dog", "quantity": 1,
                  "customizations": { "additions": ["jalapeños"], "removals": [], "notes": null } },
                { "itemId": "ing-tocino", "quantity": 2 }
            ])),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["items"][1]["itemName"], "Tocino");
        assert_eq!(body["items"][1]["lineTotal"], "3.00");
        assert_eq!(body["items"][0]["customizations"]["additions"][0], "jalapeños");
        pool.close().await;
    }

    #[tokio::test]
    async fn short_stock_is_a_conflict() {
        let (router, repositories, pool) = seeded_app().await;
        let (status, body) = post_json(
            &router,
            "/orders",
            order_body(json!([{ "itemId": "prod-sprite", "quantity": 5 }])),
        )
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["detail"].as_str().expect("detail").contains("Sprite"));
        let stored = repositories.orders.list(&OrderFilter::default()).await.expect("orders list");
        assert!(stored.is_empty());
        pool.close().await;
    }

    #[tokio::test]
    async fn unknown_items_and_empty_orders_are_bad_requests() {
        let (router, _, pool) = seeded_app().await;

        let (status, _) =
            post_json(&router, "/orders", order_body(json!([{ "itemId": "nope", "quantity": 1 }])))
                .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = post_json(&router, "/orders", order_body(json!([]))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = post_json(
            &router,
            "/orders",
            order_body(json!([{ "itemId": "prod-hot-dog", "quantity": 0 }])),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = post_json(
            &router,
            "/orders",
            order_body(json!([{ "itemId": "ing-carne-res", "quantity": 1 }])),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "non-sellable ingredients are not menu items");
        pool.close().await;
    }
}
