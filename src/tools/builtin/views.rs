//! View tools: resolve resource keys against the current state.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::json;

use crate::engine::Engine;
use crate::tools::tool::{Tool, ToolError, ToolOutput, optional_usize, require_str};

pub struct GetViewTool {
    engine: Arc<Engine>,
}

impl GetViewTool {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for GetViewTool {
    fn name(&self) -> &str {
        "get_view"
    }

    fn description(&self) -> &str {
        "Return a bounded JSON view for a resource key such as email://summary, \
         email://categories, email://category/<name>, email://unread, \
         telegram://summary or telegram://chat/<name>."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "resource_key": {"type": "string", "description": "Resource key to resolve"},
                "limit": {"type": "integer", "minimum": 0, "description": "Maximum items to include"}
            },
            "required": ["resource_key"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let key = require_str(&params, "resource_key")?;
        let limit = optional_usize(&params, "limit")?;
        let view = self.engine.get_view(key, limit).await?;
        Ok(ToolOutput::success(view, start.elapsed()))
    }
}

pub struct ListResourcesTool {
    engine: Arc<Engine>,
}

impl ListResourcesTool {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for ListResourcesTool {
    fn name(&self) -> &str {
        "list_resources"
    }

    fn description(&self) -> &str {
        "List every resource key that currently resolves, with a short description."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let resources = self.engine.list_resources().await;
        Ok(ToolOutput::success(json!(resources), start.elapsed()))
    }
}
