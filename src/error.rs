//! Error taxonomy for store operations.
//!
//! Every failure a request can hit is one [`StoreError`] variant, and each
//! variant knows its HTTP status. The server turns any of them into
//! `{"error": "<message>"}` with that status; nothing is retried.

use axum::http::StatusCode;
use thiserror::Error;

/// Upstream bodies are truncated to this many characters in error messages.
const MAX_BODY_CHARS: usize = 500;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The name is not one of the fixed collections.
    #[error("Collection not found")]
    UnknownCollection(String),

    /// The item, or the file backing a collection, does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Missing or incorrect shared secret on a write.
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("{0}")]
    BadRequest(String),

    /// The remote answered a read with a non-success status.
    #[error("Remote read failed ({context}): HTTP {status} {body}")]
    RemoteRead {
        context: String,
        status: u16,
        body: String,
    },

    /// The remote answered a write step with a non-success status.
    #[error("Remote write failed ({context}): HTTP {status} {body}")]
    RemoteWrite {
        context: String,
        status: u16,
        body: String,
    },

    /// The branch moved since the commit was prepared; the ref was not updated.
    #[error("Branch moved during commit, resubmit the change: {0}")]
    Conflict(String),

    /// The request never produced an HTTP status (DNS, TLS, connection reset).
    #[error("Remote request failed ({context}): {message}")]
    Transport { context: String, message: String },

    /// Content could not be decoded (base64, UTF-8 or JSON).
    #[error("Failed to decode content: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl StoreError {
    pub fn item_not_found() -> Self {
        StoreError::NotFound("Item not found".to_string())
    }

    pub fn remote_read(context: impl Into<String>, status: u16, body: &str) -> Self {
        StoreError::RemoteRead {
            context: context.into(),
            status,
            body: truncate(body),
        }
    }

    pub fn remote_write(context: impl Into<String>, status: u16, body: &str) -> Self {
        StoreError::RemoteWrite {
            context: context.into(),
            status,
            body: truncate(body),
        }
    }

    /// A refused ref move, with the upstream answer kept for diagnosis.
    pub fn conflict(context: &str, status: u16, body: &str) -> Self {
        StoreError::Conflict(format!(
            "{} rejected with HTTP {} {}",
            context,
            status,
            truncate(body)
        ))
    }

    pub fn transport(context: impl Into<String>, err: impl std::fmt::Display) -> Self {
        StoreError::Transport {
            context: context.into(),
            message: err.to_string(),
        }
    }

    /// HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            StoreError::UnknownCollection(_) | StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::Unauthorized => StatusCode::UNAUTHORIZED,
            StoreError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            StoreError::BadRequest(_) => StatusCode::BAD_REQUEST,
            StoreError::Conflict(_) => StatusCode::CONFLICT,
            StoreError::RemoteRead { .. }
            | StoreError::RemoteWrite { .. }
            | StoreError::Transport { .. }
            | StoreError::Decode(_)
            | StoreError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_BODY_CHARS).collect()
}
