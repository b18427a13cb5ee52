//! Completion-backed tools: summarize, ask, draft replies.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::json;

use crate::engine::Engine;
use crate::llm::prompts::ReplyMedium;
use crate::tools::tool::{Tool, ToolError, ToolOutput, optional_str_list, require_str};

pub struct SummarizeTool {
    engine: Arc<Engine>,
}

impl SummarizeTool {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for SummarizeTool {
    fn name(&self) -> &str {
        "summarize"
    }

    fn description(&self) -> &str {
        "Summarize an email body."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {"body": {"type": "string"}},
            "required": ["body"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let body = require_str(&params, "body")?;
        let summary = self.engine.summarize(body).await?;
        Ok(ToolOutput::text(summary, start.elapsed()))
    }
}

pub struct AskTool {
    engine: Arc<Engine>,
}

impl AskTool {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for AskTool {
    fn name(&self) -> &str {
        "ask"
    }

    fn description(&self) -> &str {
        "Answer a question about the stored emails and chats. The named resource \
         views (default: email://summary and telegram://summary) are given to the \
         model as context."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "question": {"type": "string"},
                "resource_keys": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Resource keys to include as context"
                }
            },
            "required": ["question"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let question = require_str(&params, "question")?;
        let keys = optional_str_list(&params, "resource_keys")?;
        let answer = self.engine.ask(question, keys.as_deref()).await?;
        Ok(ToolOutput::text(answer, start.elapsed()))
    }
}

pub struct DraftReplyTool {
    engine: Arc<Engine>,
}

impl DraftReplyTool {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for DraftReplyTool {
    fn name(&self) -> &str {
        "draft_reply"
    }

    fn description(&self) -> &str {
        "Draft a casual reply for an email or a chat message from a prompt. Nothing \
         is sent."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "prompt": {"type": "string", "description": "What the reply should say"},
                "medium": {"type": "string", "enum": ["email", "chat"]}
            },
            "required": ["prompt", "medium"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let prompt = require_str(&params, "prompt")?;
        let medium: ReplyMedium = require_str(&params, "medium")?
            .parse()
            .map_err(ToolError::InvalidParameters)?;
        let draft = self.engine.draft_reply(prompt, medium).await?;
        Ok(ToolOutput::text(draft, start.elapsed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, LlmError};
    use crate::llm::prompts::Sampling;
    use crate::llm::{CompletionProvider, CompletionRequest};
    use crate::tools::builtin::test_support::engine;

    struct StubLlm {
        reply: Result<&'static str, ()>,
    }

    #[async_trait]
    impl CompletionProvider for StubLlm {
        fn model_name(&self) -> &str {
            "stub"
        }

        async fn complete(&self, _request: CompletionRequest) -> Result<String, LlmError> {
            self.reply.map(str::to_string).map_err(|_| LlmError::RequestFailed {
                provider: "stub".into(),
                reason: "overloaded".into(),
            })
        }
    }

    async fn engine_with(reply: Result<&'static str, ()>) -> Arc<Engine> {
        let sampling = Sampling {
            max_tokens: 100,
            temperature: 0.0,
        };
        Arc::new(engine().await.with_completion(Arc::new(StubLlm { reply }), sampling))
    }

    #[tokio::test]
    async fn summarize_returns_model_text() {
        let tool = SummarizeTool::new(engine_with(Ok("Short summary")).await);
        let out = tool.execute(json!({"body": "long email"})).await.unwrap();
        assert_eq!(out.result, json!("Short summary"));
    }

    #[tokio::test]
    async fn llm_failure_is_llm_kind() {
        let tool = AskTool::new(engine_with(Err(())).await);
        let err = tool.execute(json!({"question": "anything new?"})).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Llm);
    }

    #[tokio::test]
    async fn draft_reply_validates_medium() {
        let tool = DraftReplyTool::new(engine_with(Ok("sure, sounds good")).await);
        let out = tool
            .execute(json!({"prompt": "accept the invite", "medium": "chat"}))
            .await
            .unwrap();
        assert_eq!(out.result, json!("sure, sounds good"));

        let err = tool
            .execute(json!({"prompt": "x", "medium": "pigeon"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameters);
    }
}
