//! Provider-neutral language model types.
//!
//! The customer agent only needs [`LlmClient::complete`]; the admin agent drives a
//! multi-turn function-calling session through [`ToolCallingClient::generate`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use mesero_core::metrics::TokenUsage;

use crate::error::LlmError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<Completion, LlmError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    pub response: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Part {
    Text(String),
    FunctionCall(FunctionCall),
    FunctionResponse(FunctionResponse),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self { role: Role::User, parts: vec![Part::Text(text.into())] }
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self { role: Role::Model, parts: vec![Part::Text(text.into())] }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ToolChatRequest {
    pub system: String,
    pub contents: Vec<Content>,
    pub tools: Vec<FunctionDeclaration>,
}

/// One model answer: text and function calls in the order the model produced them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelTurn {
    pub parts: Vec<Part>,
    pub usage: TokenUsage,
}

impl ModelTurn {
    pub fn function_calls(&self) -> Vec<&FunctionCall> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::FunctionCall(call) => Some(call),
                _ => None,
            })
            .collect()
    }

    /// Joined text parts, `None` when the model produced no readable text.
    pub fn text(&self) -> Option<String> {
        let text = self
            .parts
            .iter()
            .filter_map(|part| match part {
                Part::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }

    pub fn into_content(self) -> Content {
        Content { role: Role::Model, parts: self.parts }
    }
}

#[async_trait]
pub trait ToolCallingClient: Send + Sync {
    async fn generate(&self, request: &ToolChatRequest) -> Result<ModelTurn, LlmError>;
}

/// Stands in for a provider without credentials; every call fails with `NotConfigured`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledClient;

#[async_trait]
impl LlmClient for DisabledClient {
    async fn complete(&self, _prompt: &str) -> Result<Completion, LlmError> {
        Err(LlmError::NotConfigured)
    }
}

#[async_trait]
impl ToolCallingClient for DisabledClient {
    async fn generate(&self, _request: &ToolChatRequest) -> Result<ModelTurn, LlmError> {
        Err(LlmError::NotConfigured)
    }
}
