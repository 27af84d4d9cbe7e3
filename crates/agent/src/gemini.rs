//! Gemini `generateContent` client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use mesero_core::config::LlmConfig;
use mesero_core::metrics::TokenUsage;

use crate::error::LlmError;
use crate::llm::{
    Completion, Content, FunctionCall, FunctionDeclaration, FunctionResponse, LlmClient,
    ModelTurn, Part, Role, ToolCallingClient, ToolChatRequest,
};

const API_KEY_HEADER: &str = "x-goog-api-key";
const RETRY_BACKOFF_MS: u64 = 250;

#[derive(Clone)]
pub struct GeminiClient {
    inner: Arc<GeminiClientInner>,
}

struct GeminiClientInner {
    client: reqwest::Client,
    api_key: SecretString,
    endpoint: String,
    model: String,
    max_retries: u32,
}

impl GeminiClient {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        if !config.has_credentials() {
            return Err(LlmError::NotConfigured);
        }
        let api_key = config.api_key.clone().ok_or(LlmError::NotConfigured)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        let endpoint = format!(
            "{}/models/{}:generateContent",
            config.base_url.trim_end_matches('/'),
            config.model
        );

        Ok(Self {
            inner: Arc::new(GeminiClientInner {
                client,
                api_key,
                endpoint,
                model: config.model.clone(),
                max_retries: config.max_retries,
            }),
        })
    }

    async fn post(
        &self,
        body: &GenerateContentRequest<'_>,
    ) -> Result<GenerateContentResponse, LlmError> {
        let mut attempt = 0;
        loop {
            match self.send_once(body).await {
                Err(error) if error.is_retryable() && attempt < self.inner.max_retries => {
                    attempt += 1;
                    warn!(
                        event_name = "agent.llm.retry",
                        model = %self.inner.model,
                        attempt,
                        error = %error,
                        "retrying gemini request"
                    );
                    tokio::time::sleep(Duration::from_millis(RETRY_BACKOFF_MS * u64::from(attempt)))
                        .await;
                }
                result => return result,
            }
        }
    }

    async fn send_once(
        &self,
        body: &GenerateContentRequest<'_>,
    ) -> Result<GenerateContentResponse, LlmError> {
        let response = self
            .inner
            .client
            .post(&self.inner.endpoint)
            .header(API_KEY_HEADER, self.inner.api_key.expose_secret())
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(error_from_status(status, &text));
        }

        serde_json::from_str(&text)
            .map_err(|error| LlmError::Parse(format!("unreadable gemini response: {error}")))
    }
}

fn error_from_status(status: StatusCode, body: &str) -> LlmError {
    let parsed = serde_json::from_str::<ApiErrorEnvelope>(body).ok().map(|envelope| envelope.error);
    let message =
        parsed.as_ref().map(|error| error.message.clone()).unwrap_or_else(|| body.to_string());
    let quota = parsed.as_ref().is_some_and(|error| error.status == "RESOURCE_EXHAUSTED");

    if status == StatusCode::TOO_MANY_REQUESTS || quota {
        return LlmError::RateLimited(message);
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return LlmError::Unauthorized(message);
    }
    LlmError::Api { status: status.as_u16(), message }
}

#[async_trait]
impl LlmClient for GeminiClient {
    #[instrument(skip_all, fields(model = %self.inner.model))]
    async fn complete(&self, prompt: &str) -> Result<Completion, LlmError> {
        let request = GenerateContentRequest {
            system_instruction: None,
            contents: vec![WireContent::from(&Content::user_text(prompt))],
            tools: Vec::new(),
        };

        let turn = self.post(&request).await?.into_model_turn();
        let text = turn
            .text()
            .ok_or_else(|| LlmError::Parse("gemini returned no text candidate".to_string()))?;
        Ok(Completion { text, usage: turn.usage })
    }
}

#[async_trait]
impl ToolCallingClient for GeminiClient {
    #[instrument(skip_all, fields(model = %self.inner.model, contents = request.contents.len()))]
    async fn generate(&self, request: &ToolChatRequest) -> Result<ModelTurn, LlmError> {
        let body = GenerateContentRequest {
            system_instruction: Some(WireContent {
                role: None,
                parts: vec![WirePart::text(&request.system)],
            }),
            contents: request.contents.iter().map(WireContent::from).collect(),
            tools: if request.tools.is_empty() {
                Vec::new()
            } else {
                vec![WireTool { function_declarations: &request.tools }]
            },
        };

        Ok(self.post(&body).await?.into_model_turn())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent>,
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireTool<'a> {
    function_declarations: &'a [FunctionDeclaration],
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct WireContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<WirePart>,
}

impl From<&Content> for WireContent {
    fn from(content: &Content) -> Self {
        let role = match content.role {
            Role::User => "user",
            Role::Model => "model",
        };
        let parts = content
            .parts
            .iter()
            .map(|part| match part {
                Part::Text(text) => WirePart::text(text),
                Part::FunctionCall(call) => {
                    WirePart { function_call: Some(call.clone()), ..WirePart::default() }
                }
                Part::FunctionResponse(response) => {
                    WirePart { function_response: Some(response.clone()), ..WirePart::default() }
                }
            })
            .collect();
        Self { role: Some(role.to_string()), parts }
    }
}

/// Gemini parts carry exactly one populated field; unknown fields are ignored.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

impl WirePart {
    fn text(text: &str) -> Self {
        Self { text: Some(text.to_string()), ..Self::default() }
    }

    fn into_part(self) -> Option<Part> {
        if let Some(call) = self.function_call {
            return Some(Part::FunctionCall(call));
        }
        if let Some(response) = self.function_response {
            return Some(Part::FunctionResponse(response));
        }
        self.text.map(Part::Text)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

impl GenerateContentResponse {
    fn into_model_turn(self) -> ModelTurn {
        let usage = self
            .usage_metadata
            .map(|usage| TokenUsage {
                prompt_tokens: usage.prompt_token_count,
                completion_tokens: usage.candidates_token_count,
            })
            .unwrap_or_default();

        let parts = self
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts.into_iter().filter_map(WirePart::into_part).collect())
            .unwrap_or_default();

        ModelTurn { parts, usage }
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<WireContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}
