//! Tools offered to the language model
//!
//! A tool is a named capability with a description, a JSON schema for its
//! parameters and a handler. Agents own a [`ToolRegistry`] and hand the
//! registry's specs to the model; the model decides when to call them.

pub mod knowledge_base;

pub use knowledge_base::QueryKnowledgeBaseTool;

use anyhow::{Error, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// A tool that can be used by the language model
#[async_trait]
pub trait AiTool: Send + Sync {
    /// The name of the tool
    fn name(&self) -> &str;

    /// A description of what the tool does
    fn description(&self) -> &str;

    /// The JSON schema for the tool's parameters
    fn schema(&self) -> Value;

    /// Execute the tool with the given parameters
    async fn execute(&self, params: Value) -> Result<Value, Error>;

    /// Describe the tool for a model request
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            schema: self.schema(),
        }
    }
}

/// Model-facing description of a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub schema: Value,
}

/// Tools available to one agent, looked up by name
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn AiTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool; names must be unique
    pub fn register(&mut self, tool: Arc<dyn AiTool>) -> Result<(), Error> {
        if self.find(tool.name()).is_some() {
            return Err(anyhow!("Tool already registered: {}", tool.name()));
        }
        self.tools.push(tool);
        Ok(())
    }

    /// Find a tool by name
    pub fn find(&self, tool_name: &str) -> Option<&Arc<dyn AiTool>> {
        self.tools.iter().find(|t| t.name() == tool_name)
    }

    /// List all available tools
    pub fn list_tools(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.list_tools())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl AiTool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes back the input text"
        }

        fn schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": {
                    "text": {
                        "type": "string",
                        "description": "Text to echo back"
                    }
                },
                "required": ["text"]
            })
        }

        async fn execute(&self, params: Value) -> Result<Value, Error> {
            if let Some(text) = params.get("text").and_then(|t| t.as_str()) {
                Ok(json!(text))
            } else {
                Err(anyhow!("Missing 'text' parameter"))
            }
        }
    }

    #[tokio::test]
    async fn test_echo_tool() {
        let tool = EchoTool;
        let result = tool.execute(json!({"text": "Hello, world!"})).await.unwrap();
        assert_eq!(result.as_str().unwrap(), "Hello, world!");
    }

    #[test]
    fn test_registry_rejects_duplicate_names() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();
        assert!(registry.register(Arc::new(EchoTool)).is_err());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.list_tools(), vec!["echo"]);
    }

    #[test]
    fn test_specs_describe_registered_tools() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();

        let specs = registry.specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "echo");
        assert_eq!(specs[0].description, "Echoes back the input text");
        assert_eq!(specs[0].schema["required"], json!(["text"]));
        assert!(registry.find("missing").is_none());
    }
}
