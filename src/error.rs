//! Error taxonomy for report retrieval.
//!
//! Library code returns [`IqError`]; the binary wraps it in `anyhow`.

/// Failure of a retrieval or resolution operation.
#[derive(Debug, thiserror::Error)]
pub enum IqError {
    /// An application, organization, stage or report identifier had no match.
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    /// The transport failed or the server answered with a non-success status.
    #[error("request to '{path}' failed{}: {reason}", .status.map(|s| format!(" with status {s}")).unwrap_or_default())]
    RequestFailed {
        path: String,
        status: Option<u16>,
        reason: String,
    },

    /// The server answered, but the payload did not match the expected shape.
    #[error("could not decode {what} from '{path}': {source}")]
    DecodeFailed {
        what: &'static str,
        path: String,
        source: serde_json::Error,
    },

    /// The caller cancelled the operation or its deadline elapsed.
    #[error("operation cancelled")]
    Cancelled,
}

impl IqError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        IqError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn request_failed(
        path: impl Into<String>,
        status: Option<u16>,
        reason: impl Into<String>,
    ) -> Self {
        IqError::RequestFailed {
            path: path.into(),
            status,
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, IqError::NotFound { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, IqError::Cancelled)
    }
}

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, IqError>;
