use std::time::Duration;

use thiserror::Error;

use mesero_core::errors::ApplicationError;
use mesero_db::RepositoryError;

/// Failures talking to the language model provider.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider error ({status}): {message}")]
    Api { status: u16, message: String },

    /// HTTP 429 or an exhausted quota.
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("llm provider is not configured")]
    NotConfigured,
}

impl LlmError {
    pub fn is_quota(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }

    /// Transport failures and 5xx answers are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(error) => error.is_timeout() || error.is_connect() || error.is_request(),
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Http(_) => "provider_unreachable",
            Self::Api { .. } => "provider_error",
            Self::RateLimited(_) => "provider_quota",
            Self::Unauthorized(_) => "provider_unauthorized",
            Self::Parse(_) => "provider_malformed_response",
            Self::Timeout(_) => "provider_timeout",
            Self::NotConfigured => "provider_not_configured",
        }
    }
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Provider(#[from] LlmError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("prompt rendering failed: {0}")]
    Prompt(String),
}

impl From<tera::Error> for AgentError {
    fn from(error: tera::Error) -> Self {
        Self::Prompt(error.to_string())
    }
}

impl From<AgentError> for ApplicationError {
    fn from(error: AgentError) -> Self {
        match error {
            AgentError::Provider(error) => Self::Integration(error.to_string()),
            AgentError::Repository(error) => Self::Persistence(error.to_string()),
            AgentError::Prompt(message) => Self::Configuration(message),
        }
    }
}
