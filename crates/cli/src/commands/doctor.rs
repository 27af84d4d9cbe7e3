use mesero_core::config::{AppConfig, LoadOptions};
use mesero_db::{connect_with_settings, migrations, DbPool};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn new(name: &'static str, status: CheckStatus, details: impl Into<String>) -> Self {
        Self { name, status, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck::new(
                "config_validation",
                CheckStatus::Pass,
                "configuration loaded and validated",
            ));
            checks.push(check_llm_credentials(&config));
            checks.extend(check_database(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::new("config_validation", CheckStatus::Fail, error.to_string()));
            for name in ["llm_credentials", "database_connectivity", "schema_ready"] {
                checks.push(DoctorCheck::new(
                    name,
                    CheckStatus::Skipped,
                    "skipped because configuration did not load",
                ));
            }
        }
    }

    summarize(checks)
}

/// Basic mode is a warning, not a failure: the server still starts.
fn summarize(checks: Vec<DoctorCheck>) -> DoctorReport {
    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let warned = checks.iter().any(|check| check.status == CheckStatus::Warn);
    let (overall_status, summary) = match (failed, warned) {
        (true, _) => (CheckStatus::Fail, "doctor: one or more readiness checks failed"),
        (false, true) => (CheckStatus::Warn, "doctor: ready with warnings"),
        (false, false) => (CheckStatus::Pass, "doctor: all readiness checks passed"),
    };

    DoctorReport { overall_status, summary: summary.to_string(), checks }
}

fn check_llm_credentials(config: &AppConfig) -> DoctorCheck {
    if config.llm.has_credentials() {
        return DoctorCheck::new(
            "llm_credentials",
            CheckStatus::Pass,
            format!("{} model `{}` configured", config.llm.provider.as_str(), config.llm.model),
        );
    }

    DoctorCheck::new(
        "llm_credentials",
        CheckStatus::Warn,
        "no api key configured; /chat answers 500 and /admin/chat runs in basic mode",
    )
}

fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![DoctorCheck::new(
                "database_connectivity",
                CheckStatus::Fail,
                format!("failed to initialize async runtime: {error}"),
            )];
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        {
            Ok(pool) => pool,
            Err(error) => {
                return vec![
                    DoctorCheck::new(
                        "database_connectivity",
                        CheckStatus::Fail,
                        format!("failed to connect to database: {error}"),
                    ),
                    DoctorCheck::new(
                        "schema_ready",
                        CheckStatus::Skipped,
                        "skipped because the database is unreachable",
                    ),
                ];
            }
        };

        let checks = vec![
            DoctorCheck::new(
                "database_connectivity",
                CheckStatus::Pass,
                format!("connected using `{}`", config.database.url),
            ),
            check_schema(&pool).await,
        ];
        pool.close().await;
        checks
    })
}

async fn check_schema(pool: &DbPool) -> DoctorCheck {
    match migrations::missing_tables(pool).await {
        Ok(missing) if missing.is_empty() => {
            DoctorCheck::new("schema_ready", CheckStatus::Pass, "all tables present")
        }
        Ok(missing) => DoctorCheck::new(
            "schema_ready",
            CheckStatus::Warn,
            format!("missing tables: {}; run `mesero migrate`", missing.join(", ")),
        ),
        Err(error) => DoctorCheck::new(
            "schema_ready",
            CheckStatus::Fail,
            format!("schema query failed: {error}"),
        ),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
