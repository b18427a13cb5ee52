//! Chat tools: record, sync, send.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::json;

use crate::engine::Engine;
use crate::tools::tool::{Tool, ToolError, ToolOutput, optional_str_list, require_str};

pub struct RecordChatTool {
    engine: Arc<Engine>,
}

impl RecordChatTool {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for RecordChatTool {
    fn name(&self) -> &str {
        "record_chat"
    }

    fn description(&self) -> &str {
        "Store the recent messages of one chat (oldest first), replacing any \
         messages previously stored for it. Only the newest few are kept."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "chat_name": {"type": "string"},
                "messages": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["chat_name", "messages"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let chat_name = require_str(&params, "chat_name")?;
        let messages = optional_str_list(&params, "messages")?
            .ok_or_else(|| ToolError::InvalidParameters("missing 'messages' parameter".into()))?;
        self.engine.record_chat(chat_name, messages).await?;
        Ok(ToolOutput::success(json!({"ok": true}), start.elapsed()))
    }
}

pub struct SyncChatsTool {
    engine: Arc<Engine>,
}

impl SyncChatsTool {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for SyncChatsTool {
    fn name(&self) -> &str {
        "sync_chats"
    }

    fn description(&self) -> &str {
        "Fetch the most recent Telegram chats and replace the stored chats with them."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let chats = self.engine.sync_chats().await?;
        Ok(ToolOutput::success(json!({"chats": chats}), start.elapsed()))
    }
}

pub struct SendChatMessageTool {
    engine: Arc<Engine>,
}

impl SendChatMessageTool {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for SendChatMessageTool {
    fn name(&self) -> &str {
        "send_chat_message"
    }

    fn description(&self) -> &str {
        "Send a Telegram message to a chat seen in the last sync (by name) or to a \
         numeric chat id."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "chat_name": {"type": "string"},
                "text": {"type": "string"}
            },
            "required": ["chat_name", "text"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let chat_name = require_str(&params, "chat_name")?;
        let text = require_str(&params, "text")?;
        self.engine.send_chat_message(chat_name, text).await?;
        Ok(ToolOutput::success(json!({"ok": true}), start.elapsed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::tools::builtin::test_support::engine;

    #[tokio::test]
    async fn record_chat_is_visible_in_views() {
        let engine = Arc::new(engine().await);
        let tool = RecordChatTool::new(engine.clone());
        let out = tool
            .execute(json!({"chat_name": "Alice", "messages": ["one", "two", "three", "four"]}))
            .await
            .unwrap();
        assert_eq!(out.result, json!({"ok": true}));

        let view = engine.get_view("telegram://chat/Alice", None).await.unwrap();
        assert_eq!(view["items"], json!(["two", "three", "four"]));
    }

    #[tokio::test]
    async fn record_chat_requires_messages() {
        let tool = RecordChatTool::new(Arc::new(engine().await));
        let err = tool.execute(json!({"chat_name": "Alice"})).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameters);
    }

    #[tokio::test]
    async fn sync_without_provider_is_not_configured() {
        let tool = SyncChatsTool::new(Arc::new(engine().await));
        let err = tool.execute(json!({})).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotConfigured);
    }
}
