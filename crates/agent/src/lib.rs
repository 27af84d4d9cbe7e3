//! Agent Runtime - the two conversational assistants of Mesero
//!
//! This crate hosts everything that talks to a language model:
//! - María, the customer-facing ordering assistant (`customer`)
//! - Max, the administrative assistant that edits inventory, menu, promotions and orders (`orchestrator`)
//! - The provider abstraction and its Gemini implementation (`llm`, `gemini`)
//!
//! # Architecture
//!
//! The customer turn is a single completion:
//! 1. **Prompt** (`prompt`) - live menu, stock partitions, cached best sellers and profile
//! 2. **Protocol** (`protocol`) - `[ADD_TO_CART:...]` / `[CONFIRM_ORDER]` markers parsed out of the reply
//! 3. **Resolution** (`cart`) - marker names resolved against the catalog
//! 4. **Guardrails** (`guardrails`) - deterministic checks on the resolved lines
//!
//! The admin turn is a bounded tool-calling loop:
//! 1. **Registry** (`tools::registry`) - closed set of tools and their declarations
//! 2. **Executors** (`tools::executor`) - one per tool, always re-reading live data
//! 3. **Fallback** (`fallback`) - keyword responder when the provider is unavailable
//!
//! # Safety Principle
//!
//! The model proposes; deterministic code decides. Prices, stock checks and
//! order transitions never depend on the model following instructions.

use std::sync::Arc;

use mesero_db::{
    ChatRepository, IngredientRepository, OrderRepository, ProductRepository, PromotionRepository,
};

pub mod cart;
pub mod customer;
pub mod error;
pub mod fallback;
pub mod gemini;
pub mod guardrails;
pub mod llm;
pub mod orchestrator;
pub mod prompt;
pub mod protocol;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod tools;

pub use customer::{CustomerAgent, CustomerAgentSettings, CustomerTurnOutcome, CustomerTurnRequest};
pub use error::{AgentError, LlmError};
pub use gemini::GeminiClient;
pub use llm::{DisabledClient, LlmClient, ToolCallingClient};
pub use orchestrator::{AdminAgent, AdminAgentSettings, AdminTurnOutcome};
pub use prompt::PromptRenderer;
pub use tools::ToolResult;

/// Persistence handles shared by both agents.
#[derive(Clone)]
pub struct Repositories {
    pub products: Arc<dyn ProductRepository>,
    pub ingredients: Arc<dyn IngredientRepository>,
    pub promotions: Arc<dyn PromotionRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub chat: Arc<dyn ChatRepository>,
}
