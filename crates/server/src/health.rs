use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use mesero_db::{migrations, DbPool};
use serde::Serialize;
use tracing::warn;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    llm_configured: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Ready,
    Degraded,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: Readiness,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: Readiness,
    pub database: HealthCheck,
    pub schema: HealthCheck,
    /// `llm` when the assistants reach the provider, `basic` otherwise.
    pub assistant_mode: &'static str,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool, llm_configured: bool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool, llm_configured })
}

/// Ready only when the database answers and every managed table exists. Basic mode is
/// reported but does not degrade readiness.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let (database, schema) = match migrations::missing_tables(&state.db_pool).await {
        Ok(missing) => (
            HealthCheck { status: Readiness::Ready, detail: "database reachable".to_string() },
            schema_check(&missing),
        ),
        Err(error) => {
            warn!(
                event_name = "system.health.database_degraded",
                correlation_id = "health",
                error = %error,
                "health check could not read the schema"
            );
            (
                HealthCheck {
                    status: Readiness::Degraded,
                    detail: format!("database query failed: {error}"),
                },
                HealthCheck { status: Readiness::Degraded, detail: "not checked".to_string() },
            )
        }
    };

    let ready = database.status == Readiness::Ready && schema.status == Readiness::Ready;
    let payload = HealthResponse {
        status: if ready { Readiness::Ready } else { Readiness::Degraded },
        database,
        schema,
        assistant_mode: if state.llm_configured { "llm" } else { "basic" },
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn schema_check(missing: &[&str]) -> HealthCheck {
    if missing.is_empty() {
        return HealthCheck { status: Readiness::Ready, detail: "all tables present".to_string() };
    }
    warn!(
        event_name = "system.health.schema_incomplete",
        correlation_id = "health",
        missing = %missing.join(","),
        "health check found unmigrated tables"
    );
    HealthCheck {
        status: Readiness::Degraded,
        detail: format!("missing tables: {}", missing.join(", ")),
    }
}
