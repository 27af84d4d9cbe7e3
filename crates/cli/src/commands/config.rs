use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use mesero_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

/// One inspected setting: dotted key, rendered value and the env vars that can set it.
struct Setting {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for setting in settings(&config) {
        let source = field_source(
            setting.key,
            setting.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(format!("- {} = {} (source: {source})", setting.key, setting.value));
    }

    if !config.llm.has_credentials() {
        lines.push("note: no llm credentials; assistants run in basic mode".to_string());
    }

    lines.join("\n")
}

fn settings(config: &AppConfig) -> Vec<Setting> {
    let api_key = config
        .llm
        .api_key
        .as_ref()
        .map_or_else(|| "<unset>".to_string(), |key| redact_key(key.expose_secret()));

    vec![
        Setting {
            key: "database.url",
            value: config.database.url.clone(),
            env_keys: &["MESERO_DATABASE_URL"],
        },
        Setting {
            key: "database.max_connections",
            value: config.database.max_connections.to_string(),
            env_keys: &["MESERO_DATABASE_MAX_CONNECTIONS"],
        },
        Setting {
            key: "database.timeout_secs",
            value: config.database.timeout_secs.to_string(),
            env_keys: &["MESERO_DATABASE_TIMEOUT_SECS"],
        },
        Setting {
            key: "llm.provider",
            value: config.llm.provider.as_str().to_string(),
            env_keys: &["MESERO_LLM_PROVIDER"],
        },
        Setting {
            key: "llm.model",
            value: config.llm.model.clone(),
            env_keys: &["MESERO_LLM_MODEL"],
        },
        Setting {
            key: "llm.base_url",
            value: config.llm.base_url.clone(),
            env_keys: &["MESERO_LLM_BASE_URL"],
        },
        Setting {
            key: "llm.api_key",
            value: api_key,
            env_keys: &["MESERO_LLM_API_KEY", "GEMINI_API_KEY"],
        },
        Setting {
            key: "llm.timeout_secs",
            value: config.llm.timeout_secs.to_string(),
            env_keys: &["MESERO_LLM_TIMEOUT_SECS"],
        },
        Setting {
            key: "llm.max_retries",
            value: config.llm.max_retries.to_string(),
            env_keys: &["MESERO_LLM_MAX_RETRIES"],
        },
        Setting {
            key: "server.bind_address",
            value: config.server.bind_address.clone(),
            env_keys: &["MESERO_SERVER_BIND_ADDRESS"],
        },
        Setting {
            key: "server.port",
            value: config.server.port.to_string(),
            env_keys: &["MESERO_SERVER_PORT"],
        },
        Setting {
            key: "server.graceful_shutdown_secs",
            value: config.server.graceful_shutdown_secs.to_string(),
            env_keys: &["MESERO_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        },
        Setting {
            key: "agent.max_tool_iterations",
            value: config.agent.max_tool_iterations.to_string(),
            env_keys: &["MESERO_AGENT_MAX_TOOL_ITERATIONS"],
        },
        Setting {
            key: "agent.turn_timeout_secs",
            value: config.agent.turn_timeout_secs.to_string(),
            env_keys: &["MESERO_AGENT_TURN_TIMEOUT_SECS"],
        },
        Setting {
            key: "agent.preference_cache_ttl_secs",
            value: config.agent.preference_cache_ttl_secs.to_string(),
            env_keys: &["MESERO_AGENT_PREFERENCE_CACHE_TTL_SECS"],
        },
        Setting {
            key: "agent.best_seller_limit",
            value: config.agent.best_seller_limit.to_string(),
            env_keys: &["MESERO_AGENT_BEST_SELLER_LIMIT"],
        },
        Setting {
            key: "inventory.default_low_stock_threshold",
            value: config.inventory.default_low_stock_threshold.to_string(),
            env_keys: &["MESERO_INVENTORY_DEFAULT_LOW_STOCK_THRESHOLD"],
        },
        Setting {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["MESERO_LOGGING_LEVEL", "MESERO_LOG_LEVEL"],
        },
        Setting {
            key: "logging.format",
            value: format!("{:?}", config.logging.format).to_ascii_lowercase(),
            env_keys: &["MESERO_LOGGING_FORMAT", "MESERO_LOG_FORMAT"],
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("mesero.toml"), PathBuf::from("config/mesero.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

/// Keeps the last four characters so operators can tell keys apart.
fn redact_key(key: &str) -> String {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let chars: Vec<char> = trimmed.chars().collect();
    if chars.len() <= 8 {
        return "<redacted>".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{tail}")
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, redact_key};

    #[test]
    fn redaction_never_shows_short_keys() {
        assert_eq!(redact_key(""), "<empty>");
        assert_eq!(redact_key("abc123"), "<redacted>");
        assert_eq!(redact_key("AIzaSyExample9876"), "****9876");
    }

    #[test]
    fn dotted_paths_are_found_in_nested_tables() {
        let doc: Value = "[llm]\nmodel = \"gemini-2.0-flash\"\n".parse().expect("toml");
        assert!(contains_path(&doc, "llm.model"));
        assert!(!contains_path(&doc, "llm.api_key"));
        assert!(!contains_path(&doc, "server.port"));
    }
}
