//! Scoped release of everything a relay job leaves behind.

use std::{fmt, io, path::PathBuf, sync::Arc};

use {
    mediarelay_common::MessageRef,
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use mediarelay_metrics::{counter, relay as relay_metrics};

use crate::transport::RelayTransport;

/// Something a job created that must not outlive it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    File(PathBuf),
    Message(MessageRef),
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "file {}", path.display()),
            Self::Message(message) => write!(f, "message {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupFailure {
    pub artifact: Artifact,
    pub error: String,
}

/// What [`CleanupGuard::release`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub attempted: usize,
    pub removed: usize,
    pub failures: Vec<CleanupFailure>,
}

impl CleanupReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Records a job's artifacts as they are created and removes each of them
/// exactly once.
///
/// Call [`release`](Self::release) on every normal exit path. A guard that
/// is dropped unreleased (panic, aborted task) removes its files on the spot
/// and hands message deletions to the current runtime.
pub struct CleanupGuard {
    transport: Arc<dyn RelayTransport>,
    artifacts: Vec<Artifact>,
}

impl CleanupGuard {
    pub fn new(transport: Arc<dyn RelayTransport>) -> Self {
        Self {
            transport,
            artifacts: Vec::new(),
        }
    }

    /// Register an artifact. Registering the same one twice is a no-op.
    pub fn track(&mut self, artifact: Artifact) {
        if self.artifacts.contains(&artifact) {
            debug!(%artifact, "artifact already tracked");
            return;
        }
        self.artifacts.push(artifact);
    }

    pub fn track_file(&mut self, path: impl Into<PathBuf>) {
        self.track(Artifact::File(path.into()));
    }

    pub fn track_message(&mut self, message: MessageRef) {
        self.track(Artifact::Message(message));
    }

    #[must_use]
    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    /// Remove every tracked artifact: files first, then messages newest
    /// first. Each removal is independent of the others.
    pub async fn release(mut self) -> CleanupReport {
        let (files, mut messages): (Vec<_>, Vec<_>) = std::mem::take(&mut self.artifacts)
            .into_iter()
            .partition(|a| matches!(a, Artifact::File(_)));
        messages.reverse();

        let mut report = CleanupReport::default();
        for artifact in files.into_iter().chain(messages) {
            report.attempted += 1;
            let result = match &artifact {
                Artifact::File(path) => match tokio::fs::remove_file(path).await {
                    Ok(()) => Ok(()),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        debug!(path = %path.display(), "already gone");
                        Ok(())
                    },
                    Err(e) => Err(e.to_string()),
                },
                Artifact::Message(message) => self
                    .transport
                    .delete_message(message)
                    .await
                    .map_err(|e| e.to_string()),
            };
            match result {
                Ok(()) => {
                    debug!(%artifact, "released");
                    report.removed += 1;
                },
                Err(error) => {
                    warn!(%artifact, %error, "cleanup failed");
                    #[cfg(feature = "metrics")]
                    counter!(relay_metrics::CLEANUP_FAILURES_TOTAL).increment(1);
                    report.failures.push(CleanupFailure { artifact, error });
                },
            }
        }
        report
    }
}

impl fmt::Debug for CleanupGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CleanupGuard")
            .field("artifacts", &self.artifacts)
            .finish_non_exhaustive()
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if self.artifacts.is_empty() {
            return;
        }
        warn!(
            count = self.artifacts.len(),
            "cleanup guard dropped without release"
        );

        let mut messages = Vec::new();
        for artifact in self.artifacts.drain(..) {
            match artifact {
                Artifact::File(path) => {
                    if let Err(e) = std::fs::remove_file(&path)
                        && e.kind() != io::ErrorKind::NotFound
                    {
                        warn!(path = %path.display(), error = %e, "cleanup failed");
                    }
                },
                Artifact::Message(message) => messages.push(message),
            }
        }
        if messages.is_empty() {
            return;
        }
        messages.reverse();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let transport = Arc::clone(&self.transport);
                handle.spawn(async move {
                    for message in messages {
                        if let Err(e) = transport.delete_message(&message).await {
                            warn!(%message, error = %e, "cleanup failed");
                        }
                    }
                });
            },
            Err(_) => warn!(
                count = messages.len(),
                "no runtime to delete messages from dropped cleanup guard"
            ),
        }
    }
}
