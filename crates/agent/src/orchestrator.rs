//! Max, the administrative assistant: a bounded tool-calling loop over the admin tools.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::time::{timeout_at, Instant};
use tracing::{info, instrument, warn};

use mesero_core::alerts::{render_message, AlertSnapshot};
use mesero_core::cache::Clock;
use mesero_core::config::AppConfig;
use mesero_core::domain::chat::{ChatRole, ChatTurn};
use mesero_core::insights::DayPart;
use mesero_core::metrics::MetricsSink;

use crate::error::LlmError;
use crate::fallback::FallbackResponder;
use crate::llm::{Content, FunctionResponse, Part, Role, ToolCallingClient, ToolChatRequest};
use crate::prompt::{AdminPromptContext, PromptRenderer};
use crate::tools::{function_declarations, ToolExecutor, ToolResult};
use crate::Repositories;

const AGENT_NAME: &str = "admin";
const EMPTY_REPLY: &str = "Listo.";

#[derive(Clone, Debug)]
pub struct AdminAgentSettings {
    pub max_tool_iterations: u32,
    pub turn_timeout: Duration,
    pub low_stock_threshold: i64,
}

impl AdminAgentSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_tool_iterations: config.agent.max_tool_iterations.max(1),
            turn_timeout: Duration::from_secs(config.agent.turn_timeout_secs.max(1)),
            low_stock_threshold: config.inventory.default_low_stock_threshold,
        }
    }
}

impl Default for AdminAgentSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// What the admin UI receives. `actions` mirrors, in order, every result the model was shown.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminTurnOutcome {
    pub success: bool,
    pub message: String,
    pub actions: Vec<ToolResult>,
    pub mock: bool,
    pub quota_error: bool,
}

pub struct AdminAgent {
    llm: Arc<dyn ToolCallingClient>,
    repositories: Repositories,
    executor: ToolExecutor,
    fallback: FallbackResponder,
    prompts: Arc<PromptRenderer>,
    metrics: Arc<dyn MetricsSink>,
    clock: Arc<dyn Clock>,
    settings: AdminAgentSettings,
}

impl AdminAgent {
    pub fn new(
        llm: Arc<dyn ToolCallingClient>,
        repositories: Repositories,
        prompts: Arc<PromptRenderer>,
        metrics: Arc<dyn MetricsSink>,
        clock: Arc<dyn Clock>,
        settings: AdminAgentSettings,
    ) -> Self {
        let executor = ToolExecutor::new(
            repositories.clone(),
            settings.low_stock_threshold,
            clock.clone(),
            metrics.clone(),
        );
        let fallback =
            FallbackResponder::new(repositories.clone(), settings.low_stock_threshold, clock.clone());
        Self { llm, repositories, executor, fallback, prompts, metrics, clock, settings }
    }

    /// Runs one admin turn. Provider trouble degrades to the keyword responder; this never fails.
    #[instrument(skip(self, message, history), fields(correlation_id = %correlation_id))]
    pub async fn handle_turn(
        &self,
        message: &str,
        history: &[ChatTurn],
        correlation_id: &str,
    ) -> AdminTurnOutcome {
        let deadline = Instant::now() + self.settings.turn_timeout;

        let system = match self.system_prompt(correlation_id).await {
            Ok(system) => system,
            Err(error) => {
                warn!(
                    event_name = "agent.admin.prompt_failed",
                    correlation_id,
                    error = %error,
                    "admin prompt could not be rendered"
                );
                return self.degrade(message, Vec::new(), "prompt_failed", false, correlation_id).await;
            }
        };

        let mut contents = history.iter().map(content_for).collect::<Vec<_>>();
        contents.push(Content::user_text(message));
        let tools = function_declarations();
        let mut actions: Vec<ToolResult> = Vec::new();

        for round in 0..self.settings.max_tool_iterations {
            let request =
                ToolChatRequest { system: system.clone(), contents: contents.clone(), tools: tools.clone() };
            let turn = match timeout_at(deadline, self.llm.generate(&request)).await {
                Ok(Ok(turn)) => turn,
                Ok(Err(error)) => return self.provider_failed(message, actions, error, correlation_id).await,
                Err(_) => {
                    let error = LlmError::Timeout(self.settings.turn_timeout);
                    return self.provider_failed(message, actions, error, correlation_id).await;
                }
            };
            self.metrics.record_llm_usage(AGENT_NAME, turn.usage);

            let calls = turn.function_calls().into_iter().cloned().collect::<Vec<_>>();
            if calls.is_empty() {
                let reply = turn
                    .text()
                    .or_else(|| actions.last().map(|action| action.description.clone()))
                    .unwrap_or_else(|| EMPTY_REPLY.to_string());
                info!(
                    event_name = "agent.admin.turn_completed",
                    correlation_id,
                    rounds = round + 1,
                    actions = actions.len(),
                    "admin turn completed"
                );
                return AdminTurnOutcome {
                    success: true,
                    message: reply,
                    actions,
                    mock: false,
                    quota_error: false,
                };
            }

            contents.push(turn.into_content());
            let mut responses = Vec::with_capacity(calls.len());
            for call in calls {
                let result =
                    match timeout_at(deadline, self.executor.execute_call(&call, correlation_id)).await {
                        Ok(result) => result,
                        Err(_) => {
                            warn!(
                                event_name = "agent.admin.tool_timed_out",
                                correlation_id,
                                tool = %call.name,
                                "tool execution ran past the turn deadline"
                            );
                            self.metrics.record_tool_call(&call.name, false);
                            ToolResult::failed(
                                call.name.clone(),
                                "La acción tardó demasiado y no se pudo confirmar.",
                            )
                        }
                    };
                responses.push(Part::FunctionResponse(FunctionResponse {
                    name: call.name.clone(),
                    response: json!({
                        "type": result.kind,
                        "success": result.success,
                        "description": result.description,
                    }),
                }));
                actions.push(result);
            }
            contents.push(Content { role: Role::User, parts: responses });
        }

        warn!(
            event_name = "agent.admin.iteration_limit_reached",
            correlation_id,
            max_tool_iterations = self.settings.max_tool_iterations,
            actions = actions.len(),
            "tool loop stopped at the iteration bound"
        );
        AdminTurnOutcome {
            success: actions.iter().any(|action| action.success),
            message: summarize(&actions),
            actions,
            mock: false,
            quota_error: false,
        }
    }

    async fn system_prompt(&self, correlation_id: &str) -> Result<String, crate::error::AgentError> {
        let alerts = match self.current_alerts().await {
            Ok(alerts) => alerts,
            Err(error) => {
                warn!(
                    event_name = "agent.admin.alerts_unavailable",
                    correlation_id,
                    error = %error,
                    "inventory alerts left out of the admin prompt"
                );
                None
            }
        };
        self.prompts.admin(&AdminPromptContext {
            day_part: DayPart::at(self.clock.now()).label_es(),
            alerts,
        })
    }

    async fn current_alerts(&self) -> Result<Option<String>, mesero_db::RepositoryError> {
        let products = self.repositories.products.list_all().await?;
        let ingredients = self.repositories.ingredients.list_all().await?;
        let snapshot =
            AlertSnapshot::compute(&products, &ingredients, self.settings.low_stock_threshold);
        Ok(snapshot.has_alerts().then(|| render_message(&snapshot)))
    }

    async fn provider_failed(
        &self,
        message: &str,
        actions: Vec<ToolResult>,
        error: LlmError,
        correlation_id: &str,
    ) -> AdminTurnOutcome {
        warn!(
            event_name = "agent.admin.provider_failed",
            correlation_id,
            reason = error.reason_code(),
            error = %error,
            "tool-calling provider failed; answering in basic mode"
        );
        self.degrade(message, actions, error.reason_code(), error.is_quota(), correlation_id).await
    }

    async fn degrade(
        &self,
        message: &str,
        actions: Vec<ToolResult>,
        reason: &str,
        quota_error: bool,
        correlation_id: &str,
    ) -> AdminTurnOutcome {
        self.metrics.record_fallback(AGENT_NAME, reason);
        let reply = self.fallback.respond(message, correlation_id).await;
        let reply = if actions.is_empty() {
            reply
        } else {
            format!("{}\n\n{reply}", summarize(&actions))
        };
        AdminTurnOutcome { success: true, message: reply, actions, mock: true, quota_error }
    }
}

fn content_for(turn: &ChatTurn) -> Content {
    match turn.role {
        ChatRole::User => Content::user_text(turn.content.clone()),
        ChatRole::Assistant => Content::model_text(turn.content.clone()),
    }
}

fn summarize(actions: &[ToolResult]) -> String {
    if actions.is_empty() {
        return "No alcancé a completar ninguna acción.".to_string();
    }
    let succeeded = actions.iter().filter(|action| action.success).count();
    let mut lines = vec![format!("Realicé {succeeded} de {} acciones:", actions.len())];
    lines.extend(actions.iter().map(|action| {
        format!("- {} {}", if action.success { "OK" } else { "ERROR" }, action.description)
    }));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use mesero_core::cache::SystemClock;
    use mesero_core::domain::chat::ChatTurn;
    use mesero_core::metrics::InMemoryMetricsSink;
    use mesero_db::repositories::{
        InMemoryChatRepository, InMemoryIngredientRepository, InMemoryOrderRepository,
        InMemoryProductRepository, InMemoryPromotionRepository,
    };

    use super::{AdminAgent, AdminAgentSettings};
    use crate::error::LlmError;
    use crate::llm::{Part, Role};
    use crate::prompt::PromptRenderer;
    use crate::testing::{
        call_turn, sample_ingredient, sample_product, text_turn, ScriptedToolClient,
    };
    use crate::Repositories;

    fn repositories() -> Repositories {
        Repositories {
            products: Arc::new(InMemoryProductRepository::with_products([sample_product(
                "prod-hotdog",
                "Hot Dog",
                "comida",
                350,
            )])),
            ingredients: Arc::new(InMemoryIngredientRepository::with_ingredients([
                sample_ingredient("ing-queso", "Queso cheddar", 12),
                sample_ingredient("ing-pan", "Pan de hot dog", 2),
            ])),
            promotions: Arc::new(InMemoryPromotionRepository::default()),
            orders: Arc::new(InMemoryOrderRepository::default()),
            chat: Arc::new(InMemoryChatRepository::default()),
        }
    }

    fn agent(
        client: Arc<ScriptedToolClient>,
        repositories: Repositories,
        settings: AdminAgentSettings,
    ) -> (AdminAgent, Arc<InMemoryMetricsSink>) {
        let metrics = Arc::new(InMemoryMetricsSink::default());
        let agent = AdminAgent::new(
            client,
            repositories,
            Arc::new(PromptRenderer::new().expect("templates parse")),
            metrics.clone(),
            Arc::new(SystemClock),
            settings,
        );
        (agent, metrics)
    }

    fn settings(max_tool_iterations: u32) -> AdminAgentSettings {
        AdminAgentSettings {
            max_tool_iterations,
            turn_timeout: Duration::from_secs(5),
            low_stock_threshold: 5,
        }
    }

    #[tokio::test]
    async fn stock_request_dispatches_the_tool_and_confirms() {
        let client = Arc::new(ScriptedToolClient::with_turns([
            call_turn("update_ingredient_stock", json!({ "ingredient_name": "queso", "quantity": 50 })),
            text_turn("Listo, el queso cheddar ahora tiene 50 porciones."),
        ]));
        let repositories = repositories();
        let (agent, _) = agent(client.clone(), repositories.clone(), settings(10));

        let outcome = agent.handle_turn("sube el stock de queso a 50", &[], "corr-1").await;

        assert!(outcome.success);
        assert!(!outcome.mock);
        assert!(outcome.message.contains("50"));
        assert_eq!(outcome.actions.len(), 1);
        assert_eq!(outcome.actions[0].kind, "update_ingredient_stock");
        assert!(outcome.actions[0].description.contains("12 → 50"));

        let requests = client.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].tools.len(), 21);
        let last = requests[1].contents.last().expect("function response appended");
        assert_eq!(last.role, Role::User);
        assert!(matches!(
            &last.parts[0],
            Part::FunctionResponse(response)
                if response.name == "update_ingredient_stock" && response.response["success"] == true
        ));

        let ingredients = repositories.ingredients.list_all().await.expect("list");
        assert!(ingredients.iter().any(|item| item.name == "Queso cheddar" && item.stock_quantity == 50));
    }

    #[tokio::test]
    async fn runaway_tool_calls_stop_at_the_bound_with_a_summary() {
        let client = Arc::new(ScriptedToolClient::repeating(call_turn("analyze_stock", json!({}))));
        let (agent, _) = agent(client.clone(), repositories(), settings(3));

        let outcome = agent.handle_turn("revisa todo", &[], "corr-2").await;

        assert_eq!(client.requests().len(), 3);
        assert_eq!(outcome.actions.len(), 3);
        assert!(outcome.message.starts_with("Realicé 3 de 3 acciones"));
        assert!(!outcome.mock);
    }

    #[tokio::test]
    async fn unreadable_final_text_falls_back_to_the_last_result() {
        let client = Arc::new(ScriptedToolClient::with_turns([
            call_turn("toggle_product", json!({ "product_name": "hot dog" })),
            text_turn("   "),
        ]));
        let (agent, _) = agent(client, repositories(), settings(10));

        let outcome = agent.handle_turn("apaga el hot dog", &[], "corr-3").await;
        assert_eq!(outcome.message, "Hot Dog: activo → inactivo");
    }

    #[tokio::test]
    async fn quota_errors_switch_to_basic_mode() {
        let client =
            Arc::new(ScriptedToolClient::failing(LlmError::RateLimited("quota exhausted".to_string())));
        let (agent, metrics) = agent(client, repositories(), settings(10));

        let outcome = agent.handle_turn("¿cómo va el stock?", &[], "corr-4").await;

        assert!(outcome.mock);
        assert!(outcome.quota_error);
        assert!(outcome.actions.is_empty());
        assert!(outcome.message.contains("Pan de hot dog"));
        assert_eq!(metrics.snapshot().fallbacks.len(), 1);
    }

    #[tokio::test]
    async fn slow_provider_hits_the_turn_deadline() {
        let client = Arc::new(
            ScriptedToolClient::with_turns([text_turn("tarde")]).with_delay(Duration::from_millis(200)),
        );
        let mut settings = settings(10);
        settings.turn_timeout = Duration::from_millis(20);
        let (agent, _) = agent(client, repositories(), settings);

        let outcome = agent.handle_turn("hola", &[], "corr-5").await;
        assert!(outcome.mock);
        assert!(!outcome.quota_error);
    }

    #[tokio::test]
    async fn prompt_carries_alerts_and_history() {
        let client = Arc::new(ScriptedToolClient::with_turns([text_turn("Hola, ¿qué necesitas?")]));
        let (agent, _) = agent(client.clone(), repositories(), settings(10));

        let history = [ChatTurn::user("hola"), ChatTurn::assistant("¡Hola!")];
        agent.handle_turn("¿algo urgente?", &history, "corr-6").await;

        let request = &client.requests()[0];
        assert!(request.system.contains("Pan de hot dog"));
        assert_eq!(request.contents.len(), 3);
        assert_eq!(request.contents[1].role, Role::Model);
    }
}
