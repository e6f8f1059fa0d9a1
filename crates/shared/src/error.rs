use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Error body returned by the Order Service. `detail` is usually a string but
/// validation failures carry a structured list instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub detail: Option<Value>,
}

impl ErrorDetail {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: Some(Value::String(detail.into())),
        }
    }

    /// Human-readable detail, if the server sent one as plain text.
    pub fn message(&self) -> Option<&str> {
        match &self.detail {
            Some(Value::String(text)) if !text.is_empty() => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
#[error("unrecognized order timestamp '{raw}'")]
pub struct TimestampError {
    pub raw: String,
}
