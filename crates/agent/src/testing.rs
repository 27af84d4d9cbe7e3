//! In-process stand-ins for the language model, for tests in this crate and its callers.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::Value;

use mesero_core::domain::ingredient::{Ingredient, IngredientId};
use mesero_core::domain::product::{Product, ProductId};
use mesero_core::metrics::TokenUsage;

use crate::error::LlmError;
use crate::llm::{
    Completion, FunctionCall, LlmClient, ModelTurn, Part, ToolCallingClient, ToolChatRequest,
};

/// Replies with queued results in order; an exhausted script answers with a parse error.
#[derive(Default)]
pub struct ScriptedCompletionClient {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedCompletionClient {
    pub fn replying(replies: impl IntoIterator<Item = &'static str>) -> Self {
        let replies = replies.into_iter().map(|reply| Ok(reply.to_string())).collect();
        Self { replies: Mutex::new(replies), prompts: Mutex::default() }
    }

    pub fn failing(error: LlmError) -> Self {
        Self { replies: Mutex::new(VecDeque::from([Err(error)])), prompts: Mutex::default() }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<Completion, LlmError> {
        self.prompts.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).push(prompt.to_string());
        let next = self.replies.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).pop_front();
        let text = next.unwrap_or_else(|| Err(LlmError::Parse("script exhausted".to_string())))?;
        Ok(Completion { text, usage: TokenUsage { prompt_tokens: 100, completion_tokens: 20 } })
    }
}

/// Replies with queued model turns, then keeps repeating `repeat` when one is set.
#[derive(Default)]
pub struct ScriptedToolClient {
    turns: Mutex<VecDeque<Result<ModelTurn, LlmError>>>,
    repeat: Option<ModelTurn>,
    delay: Option<Duration>,
    requests: Mutex<Vec<ToolChatRequest>>,
}

impl ScriptedToolClient {
    pub fn with_turns(turns: impl IntoIterator<Item = ModelTurn>) -> Self {
        Self { turns: Mutex::new(turns.into_iter().map(Ok).collect()), ..Self::default() }
    }

    pub fn repeating(turn: ModelTurn) -> Self {
        Self { repeat: Some(turn), ..Self::default() }
    }

    pub fn failing(error: LlmError) -> Self {
        Self { turns: Mutex::new(VecDeque::from([Err(error)])), ..Self::default() }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<ToolChatRequest> {
        self.requests.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }
}

#[async_trait]
impl ToolCallingClient for ScriptedToolClient {
    async fn generate(&self, request: &ToolChatRequest) -> Result<ModelTurn, LlmError> {
        self.requests.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.turns.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).pop_front();
        match (next, &self.repeat) {
            (Some(turn), _) => turn,
            (None, Some(turn)) => Ok(turn.clone()),
            (None, None) => Err(LlmError::Parse("script exhausted".to_string())),
        }
    }
}

pub fn text_turn(text: &str) -> ModelTurn {
    ModelTurn { parts: vec![Part::Text(text.to_string())], usage: TokenUsage::default() }
}

pub fn call_turn(name: &str, args: Value) -> ModelTurn {
    ModelTurn {
        parts: vec![Part::FunctionCall(FunctionCall { name: name.to_string(), args })],
        usage: TokenUsage::default(),
    }
}

pub fn sample_product(id: &str, name: &str, category: &str, price_cents: i64) -> Product {
    Product {
        id: ProductId(id.to_string()),
        name: name.to_string(),
        description: String::new(),
        category: category.to_string(),
        price: Decimal::new(price_cents, 2),
        is_active: true,
        is_featured: false,
        is_combo: false,
        principal_ingredient: None,
        stock_quantity: None,
        min_stock_alert: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn sample_ingredient(id: &str, name: &str, stock: i64) -> Ingredient {
    Ingredient {
        id: IngredientId(id.to_string()),
        name: name.to_string(),
        unit: "porciones".to_string(),
        stock_quantity: stock,
        min_stock_alert: None,
        is_available: true,
        is_sellable: false,
        extra_price: Decimal::ZERO,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}
