pub mod artifact;
pub mod client;
pub mod controller;
pub mod error;
pub mod state;
pub mod utils;
pub mod wire;

use serde::{Deserialize, Serialize};

pub use artifact::{ArtifactHandle, ArtifactStore};
pub use client::{ClientConfig, HttpJobClient, JobClient, DEFAULT_BASE_URL};
pub use controller::{ControllerConfig, JobController, DEFAULT_POLL_INTERVAL};
pub use error::{ConfigError, ControllerError, ErrorInfo, ErrorKind, JobError};
pub use state::{JobResult, JobState};

/// Content type assumed for artifacts the service sends without one.
pub const DEFAULT_AUDIO_CONTENT_TYPE: &str = "audio/mpeg";

/// The text a caller wants turned into audio. Serialized as the body of
/// `POST /generate-sounds`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub text: String,
}

impl JobRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Latest progress reading. Every poll replaces the previous snapshot.
/// Built only through `new` or from a decoded `ProgressBody`, both of which
/// clamp `percent` into `[0, 100]`.
#[derive(Debug, Serialize, Clone, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub percent: u8,
    pub message: String,
}

impl ProgressSnapshot {
    pub fn new(percent: u8, message: impl Into<String>) -> Self {
        Self {
            percent: percent.min(100),
            message: message.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.percent >= 100
    }
}

/// Undecoded artifact bytes as returned by a successful submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawArtifact {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl RawArtifact {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
