//! Tool trait and the result contract at the dispatch boundary.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{EngineError, ErrorKind};

/// Tool execution errors.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ToolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidParameters(_) => ErrorKind::InvalidParameters,
            Self::Engine(e) => e.kind(),
        }
    }
}

/// Successful tool output.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub result: serde_json::Value,
    pub duration: Duration,
}

impl ToolOutput {
    pub fn success(result: serde_json::Value, duration: Duration) -> Self {
        Self { result, duration }
    }

    pub fn text(text: impl Into<String>, duration: Duration) -> Self {
        Self {
            result: serde_json::Value::String(text.into()),
            duration,
        }
    }
}

/// What every tool call returns to its caller: exactly one text case and one
/// error case.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolReply {
    Text { text: String },
    Error { kind: ErrorKind, message: String },
}

impl ToolReply {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            kind,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

impl From<ToolOutput> for ToolReply {
    /// Strings pass through as-is; structured results are serialized as JSON
    /// text.
    fn from(output: ToolOutput) -> Self {
        let text = match output.result {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        Self::Text { text }
    }
}

impl From<ToolError> for ToolReply {
    fn from(err: ToolError) -> Self {
        Self::error(err.kind(), err.to_string())
    }
}

/// Name, description and JSON schema for one registered tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A capability exposed to callers.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters_schema(&self) -> serde_json::Value;

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError>;
}

/// Extract a required string parameter.
pub fn require_str<'a>(params: &'a serde_json::Value, key: &str) -> Result<&'a str, ToolError> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::InvalidParameters(format!("missing '{key}' parameter")))
}

/// Extract an optional non-negative integer parameter.
pub fn optional_usize(params: &serde_json::Value, key: &str) -> Result<Option<usize>, ToolError> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| {
                ToolError::InvalidParameters(format!("'{key}' must be a non-negative integer"))
            }),
    }
}

/// Extract an optional array of strings.
pub fn optional_str_list(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<Vec<String>>, ToolError> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    ToolError::InvalidParameters(format!("'{key}' must contain only strings"))
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(_) => Err(ToolError::InvalidParameters(format!(
            "'{key}' must be an array of strings"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ViewError;
    use serde_json::json;

    #[test]
    fn reply_wire_shape() {
        let text: ToolReply = ToolOutput::success(json!({"count": 2}), Duration::ZERO).into();
        assert_eq!(
            serde_json::to_value(&text).unwrap(),
            json!({"type": "text", "text": "{\"count\":2}"})
        );

        let err: ToolReply = ToolError::Engine(EngineError::View(ViewError::NotFound {
            key: "email://nope".into(),
        }))
        .into();
        let wire = serde_json::to_value(&err).unwrap();
        assert_eq!(wire["type"], "error");
        assert_eq!(wire["kind"], "view_not_found");
        assert!(wire["message"].as_str().unwrap().contains("email://nope"));
    }

    #[test]
    fn plain_text_passes_through() {
        let reply: ToolReply = ToolOutput::text("hello", Duration::ZERO).into();
        assert_eq!(reply, ToolReply::Text { text: "hello".into() });
    }

    #[test]
    fn parameter_helpers() {
        let params = json!({"name": "x", "limit": 3, "keys": ["a", "b"], "bad": -1});
        assert_eq!(require_str(&params, "name").unwrap(), "x");
        assert!(require_str(&params, "missing").is_err());
        assert_eq!(optional_usize(&params, "limit").unwrap(), Some(3));
        assert_eq!(optional_usize(&params, "absent").unwrap(), None);
        assert!(optional_usize(&params, "bad").is_err());
        assert_eq!(
            optional_str_list(&params, "keys").unwrap(),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert!(optional_str_list(&params, "name").is_err());
    }
}
