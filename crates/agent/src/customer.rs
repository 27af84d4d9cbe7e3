//! One ordering turn: live menu into the prompt, markers out of the reply, cart lines back.

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use mesero_core::cache::{Clock, TtlCache};
use mesero_core::config::AppConfig;
use mesero_core::domain::chat::{last_user_message, ChatTurn};
use mesero_core::domain::product::Product;
use mesero_core::insights::{BestSellers, DayPart, PreferenceProfile};
use mesero_core::menu::Catalog;
use mesero_core::metrics::{MetricsSink, TokenUsage};
use mesero_db::{ChatRepository, OrderFilter};

use crate::cart::{resolve_actions, ResolvedCartLine};
use crate::error::{AgentError, LlmError};
use crate::guardrails::GuardrailPolicy;
use crate::llm::LlmClient;
use crate::prompt::{CustomerPromptContext, IngredientPartition, PromptRenderer};
use crate::protocol;
use crate::Repositories;

const AGENT_NAME: &str = "customer";
const BEST_SELLERS_KEY: &str = "best_sellers_30d";
const BEST_SELLERS_WINDOW_DAYS: i64 = 30;

#[derive(Clone, Debug)]
pub struct CustomerAgentSettings {
    pub low_stock_threshold: i64,
    pub best_seller_limit: usize,
    pub cache_ttl: ChronoDuration,
    pub completion_timeout: Duration,
}

impl CustomerAgentSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            low_stock_threshold: config.inventory.default_low_stock_threshold,
            best_seller_limit: config.agent.best_seller_limit,
            cache_ttl: ChronoDuration::seconds(
                i64::try_from(config.agent.preference_cache_ttl_secs).unwrap_or(i64::MAX),
            ),
            completion_timeout: Duration::from_secs(config.agent.turn_timeout_secs),
        }
    }
}

impl Default for CustomerAgentSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerTurnRequest {
    pub session_id: String,
    /// Full transcript, newest user message last.
    pub history: Vec<ChatTurn>,
    pub user_email: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CustomerTurnOutcome {
    pub display_text: String,
    pub lines: Vec<ResolvedCartLine>,
    pub confirm_order: bool,
    pub unresolved: Vec<String>,
    pub usage: TokenUsage,
}

pub struct CustomerAgent {
    llm: Arc<dyn LlmClient>,
    repositories: Repositories,
    prompts: Arc<PromptRenderer>,
    guardrails: GuardrailPolicy,
    metrics: Arc<dyn MetricsSink>,
    clock: Arc<dyn Clock>,
    best_sellers: TtlCache<&'static str, BestSellers>,
    profiles: TtlCache<String, PreferenceProfile>,
    settings: CustomerAgentSettings,
}

impl CustomerAgent {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        repositories: Repositories,
        prompts: Arc<PromptRenderer>,
        metrics: Arc<dyn MetricsSink>,
        clock: Arc<dyn Clock>,
        settings: CustomerAgentSettings,
    ) -> Self {
        Self {
            best_sellers: TtlCache::new(settings.cache_ttl, clock.clone()),
            profiles: TtlCache::new(settings.cache_ttl, clock.clone()),
            llm,
            repositories,
            prompts,
            guardrails: GuardrailPolicy::default(),
            metrics,
            clock,
            settings,
        }
    }

    pub fn with_guardrails(mut self, guardrails: GuardrailPolicy) -> Self {
        self.guardrails = guardrails;
        self
    }

    #[instrument(skip(self, request), fields(correlation_id = %request.session_id))]
    pub async fn handle_turn(
        &self,
        request: CustomerTurnRequest,
    ) -> Result<CustomerTurnOutcome, AgentError> {
        let products = self.repositories.products.list_active().await?;
        let ingredients = self.repositories.ingredients.list_all().await?;
        let partition =
            IngredientPartition::from_ingredients(&ingredients, self.settings.low_stock_threshold);

        let best_sellers = self.best_sellers(&request.session_id).await;
        let profile = match request.user_email.as_deref() {
            Some(email) => self.preference_profile(email, &products, &request.session_id).await,
            None => None,
        };

        let context = CustomerPromptContext::build(
            &products,
            &partition,
            best_sellers.as_ref(),
            profile.as_ref(),
            DayPart::at(self.clock.now()),
            &request.history,
        );
        let prompt = self.prompts.customer(&context)?;

        let completion =
            match tokio::time::timeout(self.settings.completion_timeout, self.llm.complete(&prompt))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(LlmError::Timeout(self.settings.completion_timeout)),
            };
        let completion = completion.map_err(|error| {
            warn!(
                event_name = "agent.customer.provider_failed",
                correlation_id = %request.session_id,
                reason_code = error.reason_code(),
                error = %error,
                "customer completion failed"
            );
            self.metrics.record_fallback(AGENT_NAME, error.reason_code());
            error
        })?;
        self.metrics.record_llm_usage(AGENT_NAME, completion.usage);

        let parsed = protocol::parse(&completion.text);
        let catalog = Catalog::build(&products, &ingredients);
        let resolution = resolve_actions(&parsed.actions, &catalog, &request.session_id);
        let guarded = self.guardrails.apply(resolution.lines, &ingredients, &request.session_id);

        let mut display_text = parsed.display_text;
        for message in guarded.user_messages() {
            if !display_text.is_empty() {
                display_text.push_str("\n\n");
            }
            display_text.push_str(message);
        }

        self.persist_turn(&request, &display_text);

        info!(
            event_name = "agent.customer.turn_completed",
            correlation_id = %request.session_id,
            actions = parsed.actions.len(),
            resolved_lines = guarded.lines.len(),
            unresolved = resolution.unresolved.len(),
            guardrail_notices = guarded.notices.len(),
            confirm_order = parsed.confirm_order,
            "customer turn completed"
        );

        Ok(CustomerTurnOutcome {
            display_text,
            lines: guarded.lines,
            confirm_order: parsed.confirm_order,
            unresolved: resolution.unresolved,
            usage: completion.usage,
        })
    }

    async fn best_sellers(&self, session_id: &str) -> Option<BestSellers> {
        if let Some(cached) = self.best_sellers.get(&BEST_SELLERS_KEY) {
            return Some(cached);
        }

        let since = self.clock.now() - ChronoDuration::days(BEST_SELLERS_WINDOW_DAYS);
        match self.repositories.orders.list(&OrderFilter::since(since)).await {
            Ok(orders) => {
                let sellers =
                    BestSellers::from_orders(&orders, since, self.settings.best_seller_limit);
                self.best_sellers.insert(BEST_SELLERS_KEY, sellers.clone());
                Some(sellers)
            }
            Err(error) => {
                warn!(
                    event_name = "agent.customer.best_sellers_unavailable",
                    correlation_id = session_id,
                    error = %error,
                    "continuing without best sellers"
                );
                None
            }
        }
    }

    async fn preference_profile(
        &self,
        email: &str,
        menu: &[Product],
        session_id: &str,
    ) -> Option<PreferenceProfile> {
        let key = email.trim().to_lowercase();
        if let Some(cached) = self.profiles.get(&key) {
            return Some(cached);
        }

        match self.repositories.orders.list(&OrderFilter::for_customer(key.clone())).await {
            Ok(orders) => {
                let profile = PreferenceProfile::from_orders(&orders, menu);
                self.profiles.insert(key, profile.clone());
                Some(profile)
            }
            Err(error) => {
                warn!(
                    event_name = "agent.customer.profile_unavailable",
                    correlation_id = session_id,
                    error = %error,
                    "continuing without preference profile"
                );
                None
            }
        }
    }

    fn persist_turn(&self, request: &CustomerTurnRequest, display_text: &str) {
        let chat: Arc<dyn ChatRepository> = self.repositories.chat.clone();
        let session_id = request.session_id.clone();
        let user_turn = last_user_message(&request.history).map(ChatTurn::user);
        let assistant_turn = ChatTurn::assistant(display_text);

        tokio::spawn(async move {
            for turn in user_turn.iter().chain(std::iter::once(&assistant_turn)) {
                if let Err(error) = chat.append_turn(&session_id, turn).await {
                    warn!(
                        event_name = "agent.customer.persist_failed",
                        correlation_id = %session_id,
                        role = turn.role.as_str(),
                        error = %error,
                        "chat turn was not persisted"
                    );
                    return;
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;
    use rust_decimal::Decimal;

    use mesero_core::cache::ManualClock;
    use mesero_core::domain::chat::{ChatRole, ChatTurn};
    use mesero_core::domain::ingredient::{IngredientId, IngredientPatch};
    use mesero_core::domain::order::{CustomerInfo, Order, OrderId, OrderItem, OrderStatus};
    use mesero_core::metrics::InMemoryMetricsSink;
    use mesero_db::repositories::{
        InMemoryChatRepository, InMemoryIngredientRepository, InMemoryOrderRepository,
        InMemoryProductRepository, InMemoryPromotionRepository,
    };
    use mesero_db::ChatRepository;

    use super::{CustomerAgent, CustomerAgentSettings, CustomerTurnRequest};
    use crate::error::{AgentError, LlmError};
    use crate::prompt::PromptRenderer;
    use crate::testing::{sample_ingredient, sample_product, ScriptedCompletionClient};
    use crate::Repositories;

    struct Harness {
        agent: CustomerAgent,
        llm: Arc<ScriptedCompletionClient>,
        repositories: Repositories,
        metrics: Arc<InMemoryMetricsSink>,
    }

    fn harness(llm: ScriptedCompletionClient) -> Harness {
        let mut rings = sample_product("prod-aros", "Aros de Cebolla", "acompañamientos", 349);
        rings.principal_ingredient = Some("cebolla".to_string());
        let mut combo = sample_product("prod-combo", "Combo Deluxe", "combos", 999);
        combo.is_combo = true;

        let mut tocino = sample_ingredient("ing-tocino", "Tocino", 3);
        tocino.is_sellable = true;
        tocino.extra_price = Decimal::new(150, 2);

        let repositories = Repositories {
            products: Arc::new(InMemoryProductRepository::with_products([
                sample_product("prod-coca", "Coca-Cola 500ml", "bebidas", 199),
                sample_product("prod-papas", "Papas Fritas", "acompañamientos", 299),
                rings,
                combo,
            ])),
            ingredients: Arc::new(InMemoryIngredientRepository::with_ingredients([
                tocino,
                sample_ingredient("ing-cebolla", "Cebolla", 20),
                sample_ingredient("ing-aguacate", "Aguacate", 0),
            ])),
            promotions: Arc::new(InMemoryPromotionRepository::default()),
            orders: Arc::new(InMemoryOrderRepository::with_orders([delivered_order("o-1", "Papas Fritas")])),
            chat: Arc::new(InMemoryChatRepository::default()),
        };

        let llm = Arc::new(llm);
        let metrics = Arc::new(InMemoryMetricsSink::default());
        let agent = CustomerAgent::new(
            llm.clone(),
            repositories.clone(),
            Arc::new(PromptRenderer::new().expect("templates parse")),
            metrics.clone(),
            Arc::new(ManualClock::new(Utc::now())),
            CustomerAgentSettings::default(),
        );
        Harness { agent, llm, repositories, metrics }
    }

    fn delivered_order(id: &str, item_name: &str) -> Order {
        Order {
            id: OrderId(id.to_string()),
            order_number: format!("ORD-{id}"),
            customer: CustomerInfo {
                name: "Ana".to_string(),
                email: Some("ana@example.com".to_string()),
                phone: None,
            },
            status: OrderStatus::Delivered,
            items: vec![OrderItem {
                item_id: "prod-x".to_string(),
                item_name: item_name.to_string(),
                quantity: 2,
                unit_price: Decimal::new(299, 2),
                customizations: None,
            }],
            subtotal: Decimal::new(598, 2),
            discount: Decimal::ZERO,
            total: Decimal::new(598, 2),
            applied_promotion: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn request(message: &str) -> CustomerTurnRequest {
        CustomerTurnRequest {
            session_id: "session-1".to_string(),
            history: vec![ChatTurn::user(message)],
            user_email: None,
        }
    }

    async fn persisted_turns(chat: &Arc<dyn ChatRepository>, expected: usize) -> Vec<ChatTurn> {
        for _ in 0..50 {
            let turns = chat.list_session("session-1").await.expect("chat read");
            if turns.len() >= expected {
                return turns;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        chat.list_session("session-1").await.expect("chat read")
    }

    #[tokio::test]
    async fn coca_and_papas_become_two_cart_lines() {
        let harness = harness(ScriptedCompletionClient::replying([
            "¡Claro! [ADD_TO_CART:coca:1:::][ADD_TO_CART:papas:1:::] ¿Algo más?",
        ]));

        let outcome =
            harness.agent.handle_turn(request("quiero una coca y unas papas")).await.expect("turn");

        let ids =
            outcome.lines.iter().map(|line| line.catalog_item.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["prod-coca", "prod-papas"]);
        assert_eq!(outcome.display_text, "¡Claro!  ¿Algo más?");
        assert!(!outcome.confirm_order);
        assert_eq!(harness.metrics.snapshot().usage_by_agent["customer"].total(), 120);
    }

    #[tokio::test]
    async fn turn_is_persisted_in_the_background() {
        let harness =
            harness(ScriptedCompletionClient::replying(["Listo [ADD_TO_CART:Papas Fritas:1:::]"]));
        harness.agent.handle_turn(request("unas papas")).await.expect("turn");

        let turns = persisted_turns(&harness.repositories.chat, 2).await;
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, ChatRole::User);
        assert_eq!(turns[0].content, "unas papas");
        assert_eq!(turns[1].content, "Listo");
    }

    #[tokio::test]
    async fn confirmation_without_additions_is_reported() {
        let harness = harness(ScriptedCompletionClient::replying(["¡Perfecto! [CONFIRM_ORDER]"]));
        let outcome = harness.agent.handle_turn(request("eso es todo")).await.expect("turn");
        assert!(outcome.confirm_order);
        assert!(outcome.lines.is_empty());
    }

    #[tokio::test]
    async fn unknown_items_are_dropped_and_reported() {
        let harness = harness(ScriptedCompletionClient::replying([
            "[ADD_TO_CART:pizza hawaiana:1:::][ADD_TO_CART:Papas Fritas:1:::]",
        ]));
        let outcome = harness.agent.handle_turn(request("pizza y papas")).await.expect("turn");
        assert_eq!(outcome.lines.len(), 1);
        assert_eq!(outcome.unresolved, vec!["pizza hawaiana".to_string()]);
    }

    #[tokio::test]
    async fn principal_ingredient_removal_is_refused_in_the_reply() {
        let harness = harness(ScriptedCompletionClient::replying([
            "Va. [ADD_TO_CART:Aros de Cebolla:1::cebolla:]",
        ]));
        let outcome =
            harness.agent.handle_turn(request("aros de cebolla sin cebolla")).await.expect("turn");
        assert!(outcome.lines.is_empty());
        assert!(outcome.display_text.starts_with("Va."));
        assert!(outcome.display_text.contains("ingrediente principal"));
    }

    #[tokio::test]
    async fn combo_does_not_get_a_second_drink() {
        let harness = harness(ScriptedCompletionClient::replying([
            "[ADD_TO_CART:Combo Deluxe:1:::][ADD_TO_CART:Coca-Cola 500ml:1:::]",
        ]));
        let outcome = harness.agent.handle_turn(request("un combo deluxe con coca")).await.expect("turn");
        assert_eq!(outcome.lines.len(), 1);
        assert_eq!(outcome.lines[0].catalog_item.id, "prod-combo");
    }

    #[tokio::test]
    async fn prompt_reflects_live_stock_and_cached_best_sellers() {
        let harness = harness(ScriptedCompletionClient::replying(["Hola", "Hola otra vez"]));
        harness.agent.handle_turn(request("hola")).await.expect("first turn");

        harness
            .repositories
            .ingredients
            .update(&IngredientId("ing-tocino".to_string()), &IngredientPatch::stock(1))
            .await
            .expect("stock update");
        harness
            .repositories
            .orders
            .create(&delivered_order("o-2", "Hot Dog"))
            .await
            .expect("order insert");
        harness.agent.handle_turn(request("hola")).await.expect("second turn");

        let prompts = harness.llm.prompts();
        assert!(prompts[0].contains("Tocino: quedan 3 porciones"));
        assert!(prompts[1].contains("Tocino: quedan 1 porciones"));
        assert!(prompts[0].contains("- Papas Fritas"));
        assert!(prompts[1].contains("Lo más pedido"));
        assert!(!prompts[1].contains("- Hot Dog"));
        assert!(prompts[0].contains("Aguacate"));
    }

    #[tokio::test]
    async fn returning_customer_profile_reaches_the_prompt() {
        let harness = harness(ScriptedCompletionClient::replying(["Hola Ana"]));
        let mut turn = request("hola");
        turn.user_email = Some("ANA@example.com".to_string());
        harness.agent.handle_turn(turn).await.expect("turn");

        assert!(harness.llm.prompts()[0].contains("Suele pedir: Papas Fritas"));
    }

    #[tokio::test]
    async fn provider_failure_surfaces_as_provider_error() {
        let harness =
            harness(ScriptedCompletionClient::failing(LlmError::RateLimited("quota".to_string())));
        let error = harness.agent.handle_turn(request("hola")).await.expect_err("provider down");

        assert!(matches!(error, AgentError::Provider(LlmError::RateLimited(_))));
        assert_eq!(harness.metrics.snapshot().fallbacks.len(), 1);
    }
}
