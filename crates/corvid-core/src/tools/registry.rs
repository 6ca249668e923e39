//! Tool registry: catalog advertising and validated dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use corvid_types::llm::ToolSpec;

use super::{Tool, ToolOutput};

/// Registry of named tools invoked on behalf of the completion service.
///
/// `execute` validates arguments against the tool's declared schema before
/// any side effect; validation failures and unknown names come back as
/// structured error outputs, never as panics or aborts.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Later registrations with the same name win.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.push(tool);
        self.by_name.insert(name, self.tools.len() - 1);
    }

    /// The advertised catalog, in registration order.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute one named tool with raw JSON arguments.
    pub async fn execute(&self, name: &str, arguments_json: &str) -> ToolOutput {
        let Some(&index) = self.by_name.get(name) else {
            return ToolOutput::error(format!("unknown tool: '{name}'"));
        };
        let tool = &self.tools[index];

        let args: Value = match serde_json::from_str(arguments_json) {
            Ok(Value::Null) => Value::Object(serde_json::Map::new()),
            Ok(value) => value,
            Err(err) => {
                return ToolOutput::error(format!("malformed arguments for '{name}': {err}"));
            }
        };

        if let Err(reason) = validate_args(&tool.parameters_schema(), &args) {
            return ToolOutput::error(format!("invalid arguments for '{name}': {reason}"));
        }

        debug!(tool = name, "executing tool");
        tool.execute(args).await
    }
}

/// Check the argument object against the schema's `required` list and
/// `properties` types. Rejection happens before any side effect.
fn validate_args(schema: &Value, args: &Value) -> Result<(), String> {
    let Some(object) = args.as_object() else {
        return Err("arguments must be a JSON object".to_string());
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            if !object.contains_key(name) {
                return Err(format!("missing required parameter '{name}'"));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (name, value) in object {
            let Some(declared) = properties.get(name) else {
                continue;
            };
            let Some(expected) = declared.get("type").and_then(Value::as_str) else {
                continue;
            };
            let matches = match expected {
                "string" => value.is_string(),
                "number" => value.is_number(),
                "integer" => value.is_i64() || value.is_u64(),
                "boolean" => value.is_boolean(),
                "object" => value.is_object(),
                "array" => value.is_array(),
                _ => true,
            };
            if !matches {
                return Err(format!("parameter '{name}' must be of type {expected}"));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the given text back"
        }

        fn parameters_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string", "description": "Text to echo" }
                },
                "required": ["text"]
            })
        }

        async fn execute(&self, args: Value) -> ToolOutput {
            ToolOutput::success(json!({ "echoed": args["text"] }))
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        registry
    }

    #[test]
    fn specs_advertise_registered_tools() {
        let specs = registry().specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "echo");
        assert!(specs[0].parameters["required"][0] == json!("text"));
    }

    #[tokio::test]
    async fn execute_happy_path() {
        let output = registry().execute("echo", r#"{"text":"hi"}"#).await;
        assert!(output.success);
        assert_eq!(output.result["echoed"], json!("hi"));
    }

    #[tokio::test]
    async fn unknown_tool_is_structured_error() {
        let output = registry().execute("nope", "{}").await;
        assert!(!output.success);
        assert!(output.error.unwrap().contains("unknown tool"));
    }

    #[tokio::test]
    async fn missing_required_parameter_rejected_before_execution() {
        let output = registry().execute("echo", "{}").await;
        assert!(!output.success);
        assert!(output.error.unwrap().contains("missing required parameter 'text'"));
    }

    #[tokio::test]
    async fn wrong_parameter_type_rejected() {
        let output = registry().execute("echo", r#"{"text":42}"#).await;
        assert!(!output.success);
        assert!(output.error.unwrap().contains("must be of type string"));
    }

    #[tokio::test]
    async fn malformed_json_rejected() {
        let output = registry().execute("echo", "not json").await;
        assert!(!output.success);
        assert!(output.error.unwrap().contains("malformed arguments"));
    }

    #[tokio::test]
    async fn null_arguments_treated_as_empty_object() {
        // A tool with no required params accepts null/absent arguments.
        struct NoArgs;

        #[async_trait]
        impl Tool for NoArgs {
            fn name(&self) -> &str {
                "noop"
            }
            fn description(&self) -> &str {
                "No-op"
            }
            fn parameters_schema(&self) -> Value {
                json!({ "type": "object", "properties": {} })
            }
            async fn execute(&self, _args: Value) -> ToolOutput {
                ToolOutput::success(Value::Null)
            }
        }

        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(NoArgs));
        let output = registry.execute("noop", "null").await;
        assert!(output.success);
    }
}
