use serde::Serialize;

use crate::artifact::ArtifactHandle;
use crate::error::ErrorInfo;
use crate::ProgressSnapshot;

/// A finished job: a handle onto the artifact plus what is known about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobResult {
    pub handle: ArtifactHandle,
    pub len: usize,
    pub content_type: String,
}

/// Lifecycle of the single job a controller tracks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum JobState {
    #[default]
    Idle,
    /// Submitted, no progress observed yet.
    Submitting,
    Running(ProgressSnapshot),
    Succeeded(JobResult),
    Failed(ErrorInfo),
}

impl JobState {
    /// Submitting or running: a new `start` is refused.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Submitting | Self::Running(_))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded(_) | Self::Failed(_))
    }

    pub fn progress(&self) -> Option<&ProgressSnapshot> {
        match self {
            Self::Running(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    pub fn result(&self) -> Option<&JobResult> {
        match self {
            Self::Succeeded(result) => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        match self {
            Self::Failed(info) => Some(info),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Submitting => "submitting",
            Self::Running(_) => "running",
            Self::Succeeded(_) => "succeeded",
            Self::Failed(_) => "failed",
        }
    }
}
