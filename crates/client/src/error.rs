//! Client errors and user-facing notices.

use serde_json::Value;
use stocktake_core::{CheckError, EndpointError};
use thiserror::Error;

use crate::token::TokenStoreError;

/// Longest raw response body quoted in an error message.
const MAX_BODY_CHARS: usize = 200;

/// Errors returned by the query engine, mutation gateway and check workflow.
///
/// Cloneable: a failed fetch that several callers were waiting on is handed
/// to each of them.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The backend could not be reached.
    #[error("Network error: {0}")]
    Transport(String),

    #[error("Request timed out")]
    Timeout,

    /// 4xx rejection; the message is the server's own.
    #[error("{message}")]
    Validation { status: u16, message: String },

    /// The server refused a transition the entity's current state forbids.
    #[error("{0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The response did not match the expected schema.
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// Rejected by a client-side state guard before any request was sent.
    #[error(transparent)]
    Check(#[from] CheckError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Token storage error: {0}")]
    TokenStore(String),
}

impl ClientError {
    /// Map a non-success HTTP response to an error.
    ///
    /// The message is taken from the body's `message` field, then `error`,
    /// then the raw body itself.
    #[must_use]
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = server_message(body).unwrap_or_else(|| format!("HTTP {status}"));
        match status {
            401 | 403 => Self::Unauthorized(message),
            404 => Self::NotFound(message),
            409 => Self::Conflict(message),
            400..=499 => Self::Validation { status, message },
            _ => Self::Server { status, message },
        }
    }

    /// State conflicts, whether caught locally or reported by the server.
    #[must_use]
    pub const fn is_state_conflict(&self) -> bool {
        match self {
            Self::Conflict(_) => true,
            Self::Check(err) => err.is_state_conflict(),
            _ => false,
        }
    }

    /// Network-level failure; the request may not have reached the server.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout)
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else if err.is_builder() {
            Self::InvalidRequest(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<EndpointError> for ClientError {
    fn from(err: EndpointError) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}

impl From<TokenStoreError> for ClientError {
    fn from(err: TokenStoreError) -> Self {
        Self::TokenStore(err.to_string())
    }
}

fn server_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
        for key in ["message", "error"] {
            if let Some(Value::String(message)) = map.get(key)
                && !message.is_empty()
            {
                return Some(message.clone());
            }
        }
    }
    Some(trimmed.chars().take(MAX_BODY_CHARS).collect())
}

// =============================================================================
// Notices
// =============================================================================

/// The kind of operation a notice reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
    Fetch,
    Other,
}

impl Operation {
    #[must_use]
    pub const fn failure_title(self) -> &'static str {
        match self {
            Self::Create => "Create failed",
            Self::Update => "Update failed",
            Self::Delete => "Delete failed",
            Self::Fetch => "Fetch failed",
            Self::Other => "Operation failed",
        }
    }

    #[must_use]
    pub const fn success_title(self) -> &'static str {
        match self {
            Self::Create => "Created successfully",
            Self::Update => "Updated successfully",
            Self::Delete => "Deleted successfully",
            Self::Fetch => "Loaded",
            Self::Other => "Done",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// A non-blocking, user-facing message about an operation's outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: Option<String>,
}

impl Notice {
    /// Failure notice naming the operation and carrying the error message.
    #[must_use]
    pub fn failure(operation: Operation, err: &ClientError) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: operation.failure_title().to_string(),
            description: Some(err.to_string()),
        }
    }

    #[must_use]
    pub fn success(operation: Operation) -> Self {
        Self {
            level: NoticeLevel::Success,
            title: operation.success_title().to_string(),
            description: None,
        }
    }
}
