//! Per-event orchestration.

use std::{path::PathBuf, sync::Arc, time::Duration};

use {
    mediarelay_common::{ChannelId, MediaEvent},
    mediarelay_media::ThumbnailProvider,
    tokio_util::sync::CancellationToken,
    tracing::{Instrument, debug, info, info_span, warn},
};

#[cfg(feature = "metrics")]
use mediarelay_metrics::{counter, histogram, labels, relay as relay_metrics};

use crate::{
    cleanup::{CleanupGuard, CleanupReport},
    job::{Outcome, RelayJob, Stage},
    naming::{Clock, NameDeriver},
    notify::NotificationSink,
    progress::ProgressReporter,
    stats::RelayStats,
    transfer::{ThumbnailPolicy, TransferCoordinator},
    transport::RelayTransport,
};

pub const STARTING_DOWNLOAD: &str = "📥 Starting download...";

/// Startup settings for a [`MediaRelayPipeline`].
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub destination: ChannelId,
    pub prefix: String,
    pub work_dir: PathBuf,
    pub edit_interval: Duration,
    pub thumbnail_policy: ThumbnailPolicy,
    pub notify_target: Option<ChannelId>,
    pub delete_source: bool,
}

impl PipelineOptions {
    pub fn new(destination: ChannelId) -> Self {
        Self {
            destination,
            prefix: String::new(),
            work_dir: std::env::temp_dir().join("mediarelay"),
            edit_interval: Duration::from_secs(2),
            thumbnail_policy: ThumbnailPolicy::Required,
            notify_target: None,
            delete_source: true,
        }
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    #[must_use]
    pub fn with_edit_interval(mut self, edit_interval: Duration) -> Self {
        self.edit_interval = edit_interval;
        self
    }

    #[must_use]
    pub fn with_thumbnail_policy(mut self, policy: ThumbnailPolicy) -> Self {
        self.thumbnail_policy = policy;
        self
    }

    #[must_use]
    pub fn with_notify_target(mut self, target: Option<ChannelId>) -> Self {
        self.notify_target = target;
        self
    }

    #[must_use]
    pub fn with_delete_source(mut self, delete_source: bool) -> Self {
        self.delete_source = delete_source;
        self
    }
}

/// Turns one [`MediaEvent`] into one delivered document.
///
/// Shared by every concurrent job; all per-job state lives in the
/// [`RelayJob`] created by [`run`](Self::run).
pub struct MediaRelayPipeline {
    transport: Arc<dyn RelayTransport>,
    names: NameDeriver,
    coordinator: TransferCoordinator,
    notifier: NotificationSink,
    stats: Arc<RelayStats>,
    cancel: CancellationToken,
    work_dir: PathBuf,
    edit_interval: Duration,
    delete_source: bool,
}

impl MediaRelayPipeline {
    pub fn new(
        transport: Arc<dyn RelayTransport>,
        thumbnails: Option<Arc<dyn ThumbnailProvider>>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            names: NameDeriver::new(options.prefix),
            coordinator: TransferCoordinator::new(
                Arc::clone(&transport),
                thumbnails,
                options.thumbnail_policy,
                options.destination,
            ),
            notifier: NotificationSink::new(Arc::clone(&transport), options.notify_target),
            transport,
            stats: Arc::new(RelayStats::new()),
            cancel: CancellationToken::new(),
            work_dir: options.work_dir,
            edit_interval: options.edit_interval,
            delete_source: options.delete_source,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.names = NameDeriver::with_clock(self.names.prefix().to_string(), clock);
        self
    }

    #[must_use]
    pub fn with_stats(mut self, stats: Arc<RelayStats>) -> Self {
        self.stats = stats;
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn stats(&self) -> Arc<RelayStats> {
        Arc::clone(&self.stats)
    }

    #[must_use]
    pub fn destination(&self) -> &ChannelId {
        self.coordinator.destination()
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        self.names.prefix()
    }

    /// Relay one event. Never fails: every error ends up in the [`Outcome`].
    pub async fn run(&self, event: MediaEvent) -> Outcome {
        self.relay(event).await.0
    }

    /// [`run`](Self::run), also returning what cleanup released.
    pub(crate) async fn relay(&self, event: MediaEvent) -> (Outcome, CleanupReport) {
        let file_name = self.names.derive(&event);
        let job = RelayJob::new(event, file_name, &self.work_dir);
        let span = info_span!(
            "relay_job",
            job_id = %job.id,
            chat_id = job.event.chat_id,
            message_id = job.event.message_id,
        );
        self.execute(job).instrument(span).await
    }

    async fn execute(&self, mut job: RelayJob) -> (Outcome, CleanupReport) {
        let active = self.stats.begin();

        #[cfg(feature = "metrics")]
        counter!(relay_metrics::JOBS_STARTED_TOTAL).increment(1);

        info!(
            kind = %job.event.kind,
            original = job.event.file_name.as_deref().unwrap_or("-"),
            file_name = %job.file_name,
            size = job.event.size,
            "relay job started"
        );

        let mut cleanup = CleanupGuard::new(Arc::clone(&self.transport));
        if self.delete_source {
            cleanup.track_message(job.event.source_message());
        }

        let source_chat = ChannelId::Id(job.event.chat_id);
        job.status_message = match self
            .transport
            .send_message(&source_chat, STARTING_DOWNLOAD, Some(job.event.message_id))
            .await
        {
            Ok(message) => {
                cleanup.track_message(message);
                Some(message)
            },
            Err(e) => {
                warn!(error = %e, "could not send status message, continuing without progress");
                None
            },
        };
        let mut reporter = ProgressReporter::new(
            Arc::clone(&self.transport),
            job.status_message,
            self.edit_interval,
        );

        let outcome = self
            .coordinator
            .run(&mut job, &mut reporter, &mut cleanup, &self.cancel)
            .await;

        advance(&mut job, Stage::Notifying);
        match &outcome {
            Outcome::Success {
                file_name,
                destination,
            } => info!(%file_name, %destination, elapsed = ?job.elapsed(), "relay succeeded"),
            Outcome::Failure { stage, error } => {
                warn!(%stage, %error, elapsed = ?job.elapsed(), "relay failed")
            },
        }
        if let Err(e) = job.record_outcome(outcome.clone()) {
            warn!(error = %e, "outcome not recorded");
        }
        self.notifier
            .notify(job.event.file_name.as_deref(), &outcome)
            .await;

        advance(&mut job, Stage::CleaningUp);
        let report = cleanup.release().await;
        if report.is_clean() {
            debug!(removed = report.removed, "cleanup complete");
        } else {
            warn!(
                attempted = report.attempted,
                failures = report.failures.len(),
                "cleanup incomplete"
            );
        }
        advance(&mut job, Stage::Done);

        #[cfg(feature = "metrics")]
        {
            histogram!(relay_metrics::JOB_DURATION_SECONDS).record(job.elapsed().as_secs_f64());
            match outcome.failed_stage() {
                None => counter!(relay_metrics::JOBS_SUCCEEDED_TOTAL).increment(1),
                Some(stage) => {
                    counter!(relay_metrics::JOBS_FAILED_TOTAL, labels::STAGE => stage.label())
                        .increment(1)
                },
            }
        }

        active.finish(&outcome);
        (outcome, report)
    }
}

fn advance(job: &mut RelayJob, stage: Stage) {
    if let Err(e) = job.advance(stage) {
        warn!(error = %e, "stage transition rejected");
    }
}

impl std::fmt::Debug for MediaRelayPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaRelayPipeline")
            .field("names", &self.names)
            .field("coordinator", &self.coordinator)
            .field("notifier", &self.notifier)
            .field("work_dir", &self.work_dir)
            .finish_non_exhaustive()
    }
}
