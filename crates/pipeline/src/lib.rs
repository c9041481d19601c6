//! The media relay pipeline.
//!
//! One inbound [`MediaEvent`](mediarelay_common::MediaEvent) becomes one
//! [`RelayJob`](job::RelayJob): derive a destination name, download with
//! progress, fetch a thumbnail, upload with progress, notify the operator,
//! and release every transient artifact whatever happened along the way.
//!
//! The messaging platform is reached only through [`RelayTransport`], so the
//! pipeline runs unchanged against Telegram or an in-memory double.

pub mod cleanup;
pub mod error;
pub mod job;
pub mod naming;
pub mod notify;
pub mod pipeline;
pub mod progress;
pub mod stats;
pub mod transfer;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use {
    cleanup::{Artifact, CleanupFailure, CleanupGuard, CleanupReport},
    error::{Error, Result},
    job::{Outcome, RelayJob, Stage},
    naming::{Clock, NameDeriver, SystemClock, derive_file_name},
    notify::{NotificationSink, escape_html, render_outcome},
    pipeline::{MediaRelayPipeline, PipelineOptions},
    progress::{ProgressHandle, ProgressReporter, TransferProgress, human_readable, render_status},
    stats::{ActiveJob, RelayStats, StatsSnapshot},
    transfer::{ThumbnailPolicy, TransferCoordinator},
    transport::{DocumentUpload, RelayTransport},
};
