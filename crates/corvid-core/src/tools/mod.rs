//! Tool dispatch: named, schema-described side-effecting actions the
//! completion service may request.

pub mod platform;
pub mod registry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use corvid_types::llm::ToolSpec;

/// Result of a tool execution, reported back into the agent loop.
///
/// Failures are values, not errors: a failing tool never aborts sibling
/// calls in the same batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub result: Value,
    pub error: Option<String>,
}

impl ToolOutput {
    /// A successful tool output.
    pub fn success(result: Value) -> Self {
        Self {
            success: true,
            result,
            error: None,
        }
    }

    /// A failed tool output with a descriptive message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            result: Value::Null,
            error: Some(message.into()),
        }
    }

    /// Render for the completion service's tool-result message.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{\"success\":false}".to_string())
    }
}

/// A named side-effecting action with a declared parameter schema.
///
/// The schema is used both for pre-execution validation and for
/// advertising the capability to the completion service.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name (used in completion-service tool calls).
    fn name(&self) -> &str;

    /// Human-readable description for the completion service.
    fn description(&self) -> &str;

    /// JSON Schema for input parameters (object with `properties` and
    /// `required`).
    fn parameters_schema(&self) -> Value;

    /// Execute with validated arguments.
    async fn execute(&self, args: Value) -> ToolOutput;

    /// Build the advertised spec.
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}
