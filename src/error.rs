//! Error taxonomy shared by every studio operation.
use thiserror::Error;

/// Failures surfaced to the user at an operation boundary.
///
/// None of these are retried. The presentation layer logs them and prints a
/// one-line notification, then returns to an interactive state.
#[derive(Debug, Error)]
pub enum StudioError {
    #[error("backend is not configured: set the backend URL and key in settings")]
    Unconfigured,
    #[error("{message}")]
    Backend { message: String },
    #[error("storage upload failed: {message}")]
    Storage { message: String },
    #[error("webhook returned {status}: {body}")]
    Webhook { status: u16, body: String },
    #[error("no webhook endpoint configured")]
    NoEndpointConfigured,
    #[error("webhook response was not valid JSON: {0}")]
    InvalidResponse(String),
    #[error("invalid draft: {0}")]
    InvalidDraft(&'static str),
    #[error("post {0} not found in feed")]
    NotFound(String),
    #[error("post {0} is still processing and has no media yet")]
    Processing(String),
    #[error("local state error: {0}")]
    LocalState(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<sqlx::Error> for StudioError {
    fn from(err: sqlx::Error) -> Self {
        StudioError::LocalState(err.to_string())
    }
}

impl From<serde_json::Error> for StudioError {
    fn from(err: serde_json::Error) -> Self {
        StudioError::LocalState(format!("corrupt record: {err}"))
    }
}

pub type StudioResult<T> = Result<T, StudioError>;

/// Raw failure reported by the BaaS transport, before the repository adds
/// table context to it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct BackendFailure {
    pub status: Option<u16>,
    pub message: String,
}

impl BackendFailure {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Failure that never reached the server.
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::new(None, err.to_string())
    }
}
