//! Relay job state: stages, the terminal outcome, and per-job paths.

use std::{
    fmt,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use {
    mediarelay_common::{ChannelId, MediaEvent, MessageRef},
    tracing::debug,
    uuid::Uuid,
};

use crate::error::{Error, Result};

/// One discrete phase of a relay job.
///
/// `Received → Downloading → Uploading → Notifying → CleaningUp → Done`, with
/// `Downloading → Notifying` taken when the download fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Received,
    Downloading,
    Uploading,
    Notifying,
    CleaningUp,
    Done,
}

impl Stage {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Received => "Received",
            Self::Downloading => "Downloading",
            Self::Uploading => "Uploading",
            Self::Notifying => "Notifying",
            Self::CleaningUp => "Cleaning up",
            Self::Done => "Done",
        }
    }

    #[must_use]
    pub fn can_advance_to(self, next: Stage) -> bool {
        use Stage::*;
        matches!(
            (self, next),
            (Received, Downloading)
                | (Downloading, Uploading)
                | (Downloading, Notifying)
                | (Uploading, Notifying)
                | (Notifying, CleaningUp)
                | (CleaningUp, Done)
        )
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == Self::Done
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Terminal result of one relay job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success {
        file_name: String,
        destination: ChannelId,
    },
    Failure {
        stage: Stage,
        error: String,
    },
}

impl Outcome {
    #[must_use]
    pub fn success(file_name: impl Into<String>, destination: ChannelId) -> Self {
        Self::Success {
            file_name: file_name.into(),
            destination,
        }
    }

    #[must_use]
    pub fn failure(stage: Stage, error: impl fmt::Display) -> Self {
        Self::Failure {
            stage,
            error: error.to_string(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Stage a failure is attributed to.
    #[must_use]
    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { stage, .. } => Some(*stage),
        }
    }
}

/// Mutable state of one pipeline run. Never shared between runs.
#[derive(Debug)]
pub struct RelayJob {
    pub id: Uuid,
    pub event: MediaEvent,
    /// Destination file name shown to users.
    pub file_name: String,
    pub download_path: PathBuf,
    pub thumbnail_path: PathBuf,
    pub status_message: Option<MessageRef>,
    stage: Stage,
    outcome: Option<Outcome>,
    started: Instant,
}

impl RelayJob {
    /// Local paths are prefixed with the job id so concurrent jobs never
    /// share a file, even when their destination names collide.
    pub fn new(event: MediaEvent, file_name: String, work_dir: &Path) -> Self {
        let id = Uuid::new_v4();
        Self {
            download_path: work_dir.join(format!("{id}-{file_name}")),
            thumbnail_path: work_dir.join(format!("{id}-thumb.jpg")),
            id,
            event,
            file_name,
            status_message: None,
            stage: Stage::Received,
            outcome: None,
            started: Instant::now(),
        }
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Move to `next`, rejecting transitions the state machine does not have.
    pub fn advance(&mut self, next: Stage) -> Result<()> {
        if !self.stage.can_advance_to(next) {
            return Err(Error::message(format!(
                "invalid stage transition {} -> {}",
                self.stage, next
            )));
        }
        debug!(from = %self.stage, to = %next, "stage");
        self.stage = next;
        Ok(())
    }

    /// Record the terminal outcome. A job has exactly one.
    pub fn record_outcome(&mut self, outcome: Outcome) -> Result<()> {
        if self.outcome.is_some() {
            return Err(Error::message("outcome already recorded"));
        }
        self.outcome = Some(outcome);
        Ok(())
    }

    #[must_use]
    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
