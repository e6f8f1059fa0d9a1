use shared::domain::ProductId;
use thiserror::Error;

use crate::controller::ViewState;

#[derive(Debug, Error)]
pub enum OrderServiceError {
    #[error("invalid order service url '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("order service request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("order service returned status {status}: {}", .detail.as_deref().unwrap_or("no detail"))]
    Status { status: u16, detail: Option<String> },
}

impl OrderServiceError {
    /// Server-provided `detail` text, when the failure carried one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Status { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }
}

/// Caller-requested actions the controller refuses in its current state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("{target:?} view requires a signed-in session")]
    SessionRequired { target: ViewState },
    #[error("{target:?} view is only available while signed out")]
    SignedOutOnly { target: ViewState },
    #[error("no product '{0}' on the current menu")]
    UnknownProduct(ProductId),
}
