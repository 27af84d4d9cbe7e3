//! Admin tools: the declarative registry handed to the model, and the executors behind it.

pub mod executor;
pub mod registry;

use serde::{Deserialize, Serialize};

pub use executor::ToolExecutor;
pub use registry::{function_declarations, AdminTool, ToolAccess, ToolCallError, ToolSpec, TOOL_SPECS};

/// Uniform outcome of one tool execution, shown to the admin and fed back to the model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub success: bool,
}

impl ToolResult {
    pub fn ok(kind: impl Into<String>, description: impl Into<String>) -> Self {
        Self { kind: kind.into(), description: description.into(), success: true }
    }

    pub fn failed(kind: impl Into<String>, description: impl Into<String>) -> Self {
        Self { kind: kind.into(), description: description.into(), success: false }
    }
}
