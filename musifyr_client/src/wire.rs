//! JSON bodies exchanged with the generation service.

use serde::{Deserialize, Serialize};

use crate::ProgressSnapshot;

pub const GENERATE_SOUNDS_PATH: &str = "/generate-sounds";
pub const PROGRESS_PATH: &str = "/progress";

/// Body of a rejected `POST /generate-sounds`.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
        }
    }
}

/// Body of `GET /progress`.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct ProgressBody {
    pub progress: i64,
    #[serde(default)]
    pub message: Option<String>,
}

impl ProgressBody {
    pub fn new(progress: i64, message: impl Into<String>) -> Self {
        Self {
            progress,
            message: Some(message.into()),
        }
    }
}

impl From<ProgressBody> for ProgressSnapshot {
    fn from(body: ProgressBody) -> Self {
        // clamp(0, 100) keeps the cast lossless
        let percent = body.progress.clamp(0, 100) as u8;
        ProgressSnapshot::new(percent, body.message.unwrap_or_default())
    }
}
