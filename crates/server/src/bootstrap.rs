use std::sync::Arc;

use mesero_agent::{
    AdminAgent, AdminAgentSettings, CustomerAgent, CustomerAgentSettings, DisabledClient,
    GeminiClient, LlmClient, PromptRenderer, Repositories, ToolCallingClient,
};
use mesero_core::cache::SystemClock;
use mesero_core::config::{AppConfig, ConfigError, LoadOptions};
use mesero_core::metrics::TracingMetricsSink;
use mesero_db::repositories::{
    SqlChatRepository, SqlIngredientRepository, SqlOrderRepository, SqlProductRepository,
    SqlPromotionRepository,
};
use mesero_db::{connect_with_settings, migrations, DbPool};
use thiserror::Error;
use tracing::{info, warn};

use crate::api::AppState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("prompt templates failed to load: {0}")]
    Prompts(String),
}

#[allow(dead_code)]
pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let repositories = Repositories {
        products: Arc::new(SqlProductRepository::new(db_pool.clone())),
        ingredients: Arc::new(SqlIngredientRepository::new(db_pool.clone())),
        promotions: Arc::new(SqlPromotionRepository::new(db_pool.clone())),
        orders: Arc::new(SqlOrderRepository::new(db_pool.clone())),
        chat: Arc::new(SqlChatRepository::new(db_pool.clone())),
    };

    let (completion, tools, llm_configured) = llm_clients(&config);
    let prompts =
        Arc::new(PromptRenderer::new().map_err(|error| BootstrapError::Prompts(error.to_string()))?);
    let metrics = Arc::new(TracingMetricsSink);
    let clock = Arc::new(SystemClock);

    let customer_agent = CustomerAgent::new(
        completion,
        repositories.clone(),
        prompts.clone(),
        metrics.clone(),
        clock.clone(),
        CustomerAgentSettings::from_config(&config),
    );
    let admin_agent = AdminAgent::new(
        tools,
        repositories.clone(),
        prompts,
        metrics,
        clock.clone(),
        AdminAgentSettings::from_config(&config),
    );

    let state = AppState {
        customer_agent: Arc::new(customer_agent),
        admin_agent: Arc::new(admin_agent),
        repositories,
        clock,
        low_stock_threshold: config.inventory.default_low_stock_threshold,
        llm_configured,
    };

    Ok(Application { config, db_pool, state })
}

/// Missing credentials start the server in basic mode instead of failing.
fn llm_clients(config: &AppConfig) -> (Arc<dyn LlmClient>, Arc<dyn ToolCallingClient>, bool) {
    if !config.llm.has_credentials() {
        warn!(
            event_name = "system.bootstrap.llm_basic_mode",
            correlation_id = "bootstrap",
            provider = config.llm.provider.as_str(),
            "llm credentials missing; assistants run in basic mode"
        );
        return basic_mode();
    }

    match GeminiClient::new(&config.llm) {
        Ok(client) => {
            info!(
                event_name = "system.bootstrap.llm_configured",
                correlation_id = "bootstrap",
                provider = config.llm.provider.as_str(),
                model = %config.llm.model,
                "llm provider configured"
            );
            let completion: Arc<dyn LlmClient> = Arc::new(client.clone());
            let tools: Arc<dyn ToolCallingClient> = Arc::new(client);
            (completion, tools, true)
        }
        Err(error) => {
            warn!(
                event_name = "system.bootstrap.llm_basic_mode",
                correlation_id = "bootstrap",
                error = %error,
                "llm client could not be built; assistants run in basic mode"
            );
            basic_mode()
        }
    }
}

fn basic_mode() -> (Arc<dyn LlmClient>, Arc<dyn ToolCallingClient>, bool) {
    let completion: Arc<dyn LlmClient> = Arc::new(DisabledClient);
    let tools: Arc<dyn ToolCallingClient> = Arc::new(DisabledClient);
    (completion, tools, false)
}

#[cfg(test)]
mod tests {
    use mesero_core::config::{ConfigOverrides, LlmProvider, LoadOptions};

    use crate::bootstrap::bootstrap;

    fn options(database_url: &str, provider: LlmProvider, api_key: Option<&str>) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                llm_provider: Some(provider),
                llm_api_key: api_key.map(str::to_string),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_applies_migrations_and_starts_in_basic_mode_without_credentials() {
        let app = bootstrap(options("sqlite::memory:", LlmProvider::Disabled, None))
            .await
            .expect("bootstrap should succeed without llm credentials");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN \
             ('products', 'ingredients', 'promotions', 'orders', 'order_items', 'chat_turns')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("tables should exist after bootstrap");
        assert_eq!(table_count, 6);
        assert!(!app.state.llm_configured);

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn bootstrap_enables_the_provider_when_a_key_is_present() {
        let app = bootstrap(options("sqlite::memory:", LlmProvider::Gemini, Some("test-key")))
            .await
            .expect("bootstrap should succeed with a key");

        assert!(app.state.llm_configured);
        assert_eq!(app.state.low_stock_threshold, 5);
        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn bootstrap_rejects_non_sqlite_urls() {
        let result = bootstrap(options("postgres://localhost/mesero", LlmProvider::Disabled, None)).await;

        let message = result.err().expect("non-sqlite url must fail").to_string();
        assert!(message.contains("database.url"));
    }
}
