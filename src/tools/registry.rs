//! Tool registry for managing and dispatching available tools.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;

use crate::error::ErrorKind;
use crate::tools::tool::{Tool, ToolDefinition, ToolReply};

/// Registry of available tools.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
        }
    }

    /// Register a tool, replacing any previous tool with the same name.
    pub async fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.write().await.insert(name.clone(), tool).is_some() {
            tracing::warn!(tool = %name, "Replaced existing tool registration");
        }
        tracing::debug!(tool = %name, "Registered tool");
    }

    /// Get a tool by name.
    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().await.get(name).cloned()
    }

    /// Check if a tool exists.
    pub async fn has(&self, name: &str) -> bool {
        self.tools.read().await.contains_key(name)
    }

    /// List all tool names, sorted.
    pub async fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Get the number of registered tools.
    pub fn count(&self) -> usize {
        self.tools.try_read().map(|t| t.len()).unwrap_or(0)
    }

    /// Tool definitions, sorted by name.
    pub async fn tool_definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .read()
            .await
            .values()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Run a tool by name and fold the outcome into a [`ToolReply`].
    pub async fn dispatch(&self, name: &str, params: serde_json::Value) -> ToolReply {
        let Some(tool) = self.get(name).await else {
            tracing::warn!(tool = name, "Unknown tool requested");
            return ToolReply::error(ErrorKind::ToolNotFound, format!("Tool not found: {name}"));
        };

        let start = Instant::now();
        match tool.execute(params).await {
            Ok(output) => {
                tracing::info!(tool = name, elapsed_ms = start.elapsed().as_millis() as u64, "Tool succeeded");
                output.into()
            }
            Err(e) => {
                tracing::warn!(tool = name, kind = %e.kind(), error = %e, "Tool failed");
                e.into()
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::tool::{ToolError, ToolOutput, require_str};
    use async_trait::async_trait;
    use std::time::Duration;

    #[derive(Debug)]
    struct MockTool {
        name: String,
    }

    #[async_trait]
    impl Tool for MockTool {
        fn name(&self) -> &str {
            &self.name
        }
        fn description(&self) -> &str {
            "A mock tool for testing"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {"word": {"type": "string"}}})
        }
        async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
            let word = require_str(&params, "word")?;
            Ok(ToolOutput::text(word, Duration::from_millis(1)))
        }
    }

    fn mock(name: &str) -> Arc<dyn Tool> {
        Arc::new(MockTool {
            name: name.to_string(),
        })
    }

    #[tokio::test]
    async fn test_register_and_get() {
        let registry = ToolRegistry::new();
        registry.register(mock("test_tool")).await;
        assert!(registry.has("test_tool").await);
        assert!(!registry.has("nonexistent").await);
        assert_eq!(registry.get("test_tool").await.unwrap().name(), "test_tool");
    }

    #[tokio::test]
    async fn test_list_and_count() {
        let registry = ToolRegistry::new();
        registry.register(mock("b")).await;
        registry.register(mock("a")).await;
        assert_eq!(registry.count(), 2);
        assert_eq!(registry.list().await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_tool_definitions() {
        let registry = ToolRegistry::new();
        registry.register(mock("my_tool")).await;
        let defs = registry.tool_definitions().await;
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "my_tool");
        assert_eq!(defs[0].parameters["type"], "object");
    }

    #[tokio::test]
    async fn dispatch_folds_outcomes() {
        let registry = ToolRegistry::new();
        registry.register(mock("echo_word")).await;

        let ok = registry
            .dispatch("echo_word", serde_json::json!({"word": "hi"}))
            .await;
        assert_eq!(ok, ToolReply::Text { text: "hi".into() });

        let bad = registry.dispatch("echo_word", serde_json::json!({})).await;
        assert!(matches!(bad, ToolReply::Error { kind: ErrorKind::InvalidParameters, .. }));

        let missing = registry.dispatch("nope", serde_json::json!({})).await;
        assert!(matches!(missing, ToolReply::Error { kind: ErrorKind::ToolNotFound, .. }));
    }
}
