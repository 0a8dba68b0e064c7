//! Client error types.

use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

/// Errors raised by the remote service client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network, auth, or 4xx/5xx failure from the remote service.
    #[error("remote error ({}): {detail}", status.map(|s| s.to_string()).unwrap_or_else(|| "no status".into()))]
    Remote {
        status: Option<u16>,
        detail: String,
    },

    #[error("authentication required")]
    AuthRequired,

    #[error("unexpected response shape: {0}")]
    Malformed(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    pub(crate) fn remote(status: Option<u16>, detail: impl Into<String>) -> Self {
        ClientError::Remote {
            status,
            detail: detail.into(),
        }
    }

    /// The HTTP status carried by a remote error, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Remote { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Remote {
            status: e.status().map(|s| s.as_u16()),
            detail: e.to_string(),
        }
    }
}
