//! Email tools: ingest, sync, classify, send.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::json;

use crate::engine::Engine;
use crate::tools::tool::{Tool, ToolError, ToolOutput, require_str};

/// Replace stored emails with a batch of raw records.
pub struct FetchAndStoreTool {
    engine: Arc<Engine>,
}

impl FetchAndStoreTool {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for FetchAndStoreTool {
    fn name(&self) -> &str {
        "fetch_and_store"
    }

    fn description(&self) -> &str {
        "Replace the stored emails with a batch of raw records. Each record has \
         from, subject, body and unread. The whole batch is rejected if any record \
         is malformed. Clears the category index."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "records": {
                    "type": "array",
                    "description": "Email records",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": {"type": "string"},
                            "from": {"type": "string"},
                            "subject": {"type": "string"},
                            "body": {"type": "string"},
                            "unread": {"type": ["boolean", "string"]}
                        }
                    }
                }
            },
            "required": ["records"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let records = params
            .get("records")
            .and_then(|v| v.as_array())
            .ok_or_else(|| ToolError::InvalidParameters("'records' must be an array".into()))?;
        let outcome = self.engine.fetch_and_store(records).await?;
        Ok(ToolOutput::success(json!(outcome), start.elapsed()))
    }
}

/// Fetch the latest emails from the configured mailbox.
pub struct SyncEmailsTool {
    engine: Arc<Engine>,
}

impl SyncEmailsTool {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for SyncEmailsTool {
    fn name(&self) -> &str {
        "sync_emails"
    }

    fn description(&self) -> &str {
        "Fetch the latest emails from the configured mailbox and replace the stored \
         emails with them. Nothing changes if the fetch fails."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let outcome = self.engine.sync_emails().await?;
        Ok(ToolOutput::success(json!(outcome), start.elapsed()))
    }
}

/// Rebuild the category index over every stored subject.
pub struct ClassifyAllTool {
    engine: Arc<Engine>,
}

impl ClassifyAllTool {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for ClassifyAllTool {
    fn name(&self) -> &str {
        "classify_all"
    }

    fn description(&self) -> &str {
        "Classify every stored email subject into the fixed category taxonomy and \
         return category -> subjects. Rebuilt from scratch on every call."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let pass = self.engine.classify_all().await;
        Ok(ToolOutput::success(json!(pass.index), start.elapsed()))
    }
}

pub struct ClassifySubjectTool {
    engine: Arc<Engine>,
}

impl ClassifySubjectTool {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for ClassifySubjectTool {
    fn name(&self) -> &str {
        "classify_subject"
    }

    fn description(&self) -> &str {
        "Classify a single subject line without changing stored state."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "subject": {"type": "string", "description": "Subject line to classify"}
            },
            "required": ["subject"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let subject = require_str(&params, "subject")?;
        let result = self.engine.classify_subject(subject).await;
        Ok(ToolOutput::success(
            json!({"category": result.category, "similarity": result.similarity}),
            start.elapsed(),
        ))
    }
}

pub struct SendEmailTool {
    engine: Arc<Engine>,
}

impl SendEmailTool {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for SendEmailTool {
    fn name(&self) -> &str {
        "send_email"
    }

    fn description(&self) -> &str {
        "Send an email through the configured SMTP account."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "to": {"type": "string", "description": "Recipient address"},
                "subject": {"type": "string"},
                "body": {"type": "string"}
            },
            "required": ["to", "subject", "body"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let to = require_str(&params, "to")?;
        let subject = require_str(&params, "subject")?;
        let body = require_str(&params, "body")?;
        self.engine.send_email(to, subject, body).await?;
        Ok(ToolOutput::success(json!({"ok": true}), start.elapsed()))
    }
}
