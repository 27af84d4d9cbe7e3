//! JSON routes for the two assistants and the inventory alerts.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use mesero_agent::cart::ResolvedCartLine;
use mesero_agent::{AdminAgent, AdminTurnOutcome, CustomerAgent, CustomerTurnRequest, Repositories};
use mesero_core::alerts::{AlertReport, AlertSnapshot};
use mesero_core::cache::Clock;
use mesero_core::domain::chat::ChatTurn;
use mesero_core::errors::ApplicationError;

use crate::error::ApiError;
use crate::orders;

#[derive(Clone)]
pub struct AppState {
    pub customer_agent: Arc<CustomerAgent>,
    pub admin_agent: Arc<AdminAgent>,
    pub repositories: Repositories,
    pub clock: Arc<dyn Clock>,
    pub low_stock_threshold: i64,
    /// False when no provider credentials were configured.
    pub llm_configured: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(customer_chat))
        .route("/admin/chat", post(admin_chat))
        .route("/admin/alerts", get(admin_alerts))
        .route("/orders", post(orders::create_order))
        .with_state(state)
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerChatRequest {
    #[serde(default)]
    pub messages: Vec<ChatTurn>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub user_email: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerChatResponse {
    pub message: String,
    pub cart_actions: Vec<ResolvedCartLine>,
    pub confirm_order: bool,
    pub timestamp: DateTime<Utc>,
}

pub async fn customer_chat(
    State(state): State<AppState>,
    Json(body): Json<CustomerChatRequest>,
) -> Result<Json<CustomerChatResponse>, ApiError> {
    let Some(session_id) = body.session_id.filter(|id| !id.trim().is_empty()) else {
        return Err(ApiError::bad_request("sessionId is required", Uuid::new_v4().to_string()));
    };
    if !state.llm_configured {
        return Err(ApiError::internal("llm provider credentials are missing", session_id));
    }

    let outcome = state
        .customer_agent
        .handle_turn(CustomerTurnRequest {
            session_id: session_id.clone(),
            history: body.messages,
            user_email: body.user_email.filter(|email| !email.trim().is_empty()),
        })
        .await
        .map_err(|error| ApiError::from_application(ApplicationError::from(error), &session_id))?;

    Ok(Json(CustomerChatResponse {
        message: outcome.display_text,
        cart_actions: outcome.lines,
        confirm_order: outcome.confirm_order,
        timestamp: state.clock.now(),
    }))
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

pub async fn admin_chat(
    State(state): State<AppState>,
    Json(body): Json<AdminChatRequest>,
) -> Result<Json<AdminTurnOutcome>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let message = body.message.trim();
    if message.is_empty() {
        return Err(ApiError::bad_request("message must not be empty", correlation_id));
    }

    let outcome = state.admin_agent.handle_turn(message, &body.history, &correlation_id).await;
    info!(
        event_name = "http.admin_chat.completed",
        correlation_id = %correlation_id,
        actions = outcome.actions.len(),
        mock = outcome.mock,
        "admin chat answered"
    );
    Ok(Json(outcome))
}

pub async fn admin_alerts(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<AlertReport>), ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let products = state.repositories.products.list_all().await.map_err(|error| {
        ApiError::from_application(ApplicationError::Persistence(error.to_string()), &correlation_id)
    })?;
    let ingredients = state.repositories.ingredients.list_all().await.map_err(|error| {
        ApiError::from_application(ApplicationError::Persistence(error.to_string()), &correlation_id)
    })?;

    let snapshot = AlertSnapshot::compute(&products, &ingredients, state.low_stock_threshold);
    Ok((StatusCode::OK, Json(AlertReport::from_snapshot(&snapshot))))
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use mesero_agent::llm::{LlmClient, ToolCallingClient};
    use mesero_agent::testing::{
        sample_ingredient, sample_product, ScriptedCompletionClient, ScriptedToolClient,
    };
    use mesero_agent::{
        AdminAgent, AdminAgentSettings, CustomerAgent, CustomerAgentSettings, DisabledClient,
        PromptRenderer, Repositories,
    };
    use mesero_core::cache::SystemClock;
    use mesero_core::domain::ingredient::Ingredient;
    use mesero_core::domain::product::Product;
    use mesero_core::metrics::InMemoryMetricsSink;
    use mesero_db::repositories::{
        InMemoryChatRepository, InMemoryIngredientRepository, InMemoryOrderRepository,
        InMemoryProductRepository, InMemoryPromotionRepository,
    };

    use super::{router, AppState};

    pub(crate) struct TestApp {
        pub router: Router,
        pub repositories: Repositories,
    }

    pub(crate) fn test_app(
        products: Vec<Product>,
        ingredients: Vec<Ingredient>,
        completion: Option<Arc<dyn LlmClient>>,
        tools: Arc<dyn ToolCallingClient>,
    ) -> TestApp {
        let repositories = Repositories {
            products: Arc::new(InMemoryProductRepository::with_products(products)),
            ingredients: Arc::new(InMemoryIngredientRepository::with_ingredients(ingredients)),
            promotions: Arc::new(InMemoryPromotionRepository::default()),
            orders: Arc::new(InMemoryOrderRepository::default()),
            chat: Arc::new(InMemoryChatRepository::default()),
        };
        let prompts = Arc::new(PromptRenderer::new().expect("templates parse"));
        let metrics = Arc::new(InMemoryMetricsSink::default());
        let clock = Arc::new(SystemClock);
        let llm_configured = completion.is_some();

        let customer_agent = CustomerAgent::new(
            completion.unwrap_or_else(|| Arc::new(DisabledClient) as Arc<dyn LlmClient>),
            repositories.clone(),
            prompts.clone(),
            metrics.clone(),
            clock.clone(),
            CustomerAgentSettings::default(),
        );
        let admin_agent = AdminAgent::new(
            tools,
            repositories.clone(),
            prompts,
            metrics,
            clock.clone(),
            AdminAgentSettings::default(),
        );

        let state = AppState {
            customer_agent: Arc::new(customer_agent),
            admin_agent: Arc::new(admin_agent),
            repositories: repositories.clone(),
            clock,
            low_stock_threshold: 5,
            llm_configured,
        };
        TestApp { router: router(state), repositories }
    }

    pub(crate) async fn post_json(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request builds");
        send(router, request).await
    }

    pub(crate) async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.expect("router responds");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body reads");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, body)
    }

    fn menu() -> Vec<Product> {
        vec![
            sample_product("prod-coca", "Coca-Cola 500ml", "bebidas", 199),
            sample_product("prod-papas", "Papas Fritas", "acompañamientos", 299),
        ]
    }

    #[tokio::test]
    async fn chat_requires_a_session_id() {
        let app = test_app(
            menu(),
            Vec::new(),
            Some(Arc::new(ScriptedCompletionClient::replying(["hola"]))),
            Arc::new(DisabledClient),
        );
        let (status, body) =
            post_json(&app.router, "/chat", json!({ "messages": [{ "role": "user", "content": "hola" }] }))
                .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "sessionId is required");
    }

    #[tokio::test]
    async fn chat_without_credentials_is_a_safe_server_error() {
        let app = test_app(menu(), Vec::new(), None, Arc::new(DisabledClient));
        let (status, body) = post_json(
            &app.router,
            "/chat",
            json!({ "sessionId": "s-1", "messages": [{ "role": "user", "content": "hola" }] }),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.get("detail").is_none());
        assert_eq!(body["correlationId"], "s-1");
    }

    #[tokio::test]
    async fn chat_resolves_marker_lines_into_cart_actions() {
        let reply = "¡Va! [ADD_TO_CART:coca:1:::][ADD_TO_CART:papas:1:::] ¿Algo más?";
        let app = test_app(
            menu(),
            vec![sample_ingredient("ing-queso", "Queso", 20)],
            Some(Arc::new(ScriptedCompletionClient::replying([reply]))),
            Arc::new(DisabledClient),
        );
        let (status, body) = post_json(
            &app.router,
            "/chat",
            json!({
                "sessionId": "s-2",
                "messages": [{ "role": "user", "content": "quiero una coca y unas papas" }]
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let actions = body["cartActions"].as_array().expect("cart actions");
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0]["catalogItem"]["name"], "Coca-Cola 500ml");
        assert_eq!(actions[1]["catalogItem"]["name"], "Papas Fritas");
        assert_eq!(body["confirmOrder"], false);
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn provider_failures_on_chat_are_service_unavailable() {
        let app = test_app(
            menu(),
            Vec::new(),
            Some(Arc::new(ScriptedCompletionClient::failing(
                mesero_agent::LlmError::RateLimited("quota".to_string()),
            ))),
            Arc::new(DisabledClient),
        );
        let (status, _) = post_json(
            &app.router,
            "/chat",
            json!({ "sessionId": "s-3", "messages": [{ "role": "user", "content": "hola" }] }),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn admin_chat_rejects_blank_messages_and_flags_basic_mode() {
        let app = test_app(menu(), Vec::new(), None, Arc::new(DisabledClient));

        let (status, _) = post_json(&app.router, "/admin/chat", json!({ "message": "   " })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) =
            post_json(&app.router, "/admin/chat", json!({ "message": "hola", "history": [] })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mock"], true);
        assert_eq!(body["quotaError"], false);
        assert_eq!(body["actions"], json!([]));
    }

    #[tokio::test]
    async fn admin_chat_runs_tools_through_the_loop() {
        let tools = Arc::new(ScriptedToolClient::with_turns([
            mesero_agent::testing::call_turn(
                "update_ingredient_stock",
                json!({ "ingredient_name": "queso", "quantity": 50 }),
            ),
            mesero_agent::testing::text_turn("Queso en 50."),
        ]));
        let app = test_app(menu(), vec![sample_ingredient("ing-queso", "Queso", 20)], None, tools);

        let (status, body) = post_json(
            &app.router,
            "/admin/chat",
            json!({ "message": "sube el stock de queso a 50" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mock"], false);
        assert_eq!(body["actions"][0]["type"], "update_ingredient_stock");
        assert_eq!(body["actions"][0]["success"], true);
        assert!(body["message"].as_str().expect("message").contains("50"));
    }

    #[tokio::test]
    async fn alerts_are_silent_when_everything_is_stocked() {
        let app = test_app(
            menu(),
            vec![sample_ingredient("ing-queso", "Queso", 20)],
            None,
            Arc::new(DisabledClient),
        );
        let request = Request::builder()
            .uri("/admin/alerts")
            .body(Body::empty())
            .expect("request builds");
        let (status, body) = send(&app.router, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "hasAlerts": false }));
    }

    #[tokio::test]
    async fn alerts_report_counts_when_stock_runs_out() {
        let app = test_app(
            menu(),
            vec![sample_ingredient("ing-queso", "Queso", 0), sample_ingredient("ing-pan", "Pan", 2)],
            None,
            Arc::new(DisabledClient),
        );
        let request = Request::builder()
            .uri("/admin/alerts")
            .body(Body::empty())
            .expect("request builds");
        let (_, body) = send(&app.router, request).await;

        assert_eq!(body["hasAlerts"], true);
        assert_eq!(body["critical"]["ingAgotados"], 1);
        assert_eq!(body["critical"]["ingBajos"], 1);
        assert!(body["message"].as_str().expect("message").contains("Queso"));
    }
}
