//! Error taxonomy for the generation client and controller.

use serde::Serialize;
use thiserror::Error;

/// Failure of a single exchange with the generation service.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JobError {
    /// Connectivity failure, or a non-success status on the progress endpoint.
    #[error("transport error: {0}")]
    Transport(String),

    /// The service rejected the job. `message` is the service's own text.
    #[error("{message}")]
    Service { status: u16, message: String },

    /// The response body was not in the expected format.
    #[error("decode error: {0}")]
    Decode(String),
}

impl JobError {
    pub fn service(status: u16, message: impl Into<String>) -> Self {
        Self::Service {
            status,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) => ErrorKind::Transport,
            Self::Service { .. } => ErrorKind::Service,
            Self::Decode(_) => ErrorKind::Decode,
        }
    }
}

impl From<reqwest::Error> for JobError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transport,
    Service,
    Decode,
}

/// What a failed job exposes to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&JobError> for ErrorInfo {
    fn from(err: &JobError) -> Self {
        let message = match err {
            JobError::Service { message, .. } => message.clone(),
            other => other.to_string(),
        };
        Self {
            kind: err.kind(),
            message,
        }
    }
}

impl From<JobError> for ErrorInfo {
    fn from(err: JobError) -> Self {
        Self::from(&err)
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ControllerError {
    #[error("a job is already in flight")]
    Busy,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid base url: {0}")]
    BaseUrl(#[from] url::ParseError),

    #[error("base url cannot carry endpoint paths: {0}")]
    NotABase(String),

    #[error("failed to build http client: {0}")]
    Http(#[from] reqwest::Error),
}
