//! Transfer progress rendering and rate-limited status edits.

use std::{
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};

use {
    mediarelay_common::MessageRef,
    tokio::sync::watch,
    tracing::warn,
};

#[cfg(feature = "metrics")]
use mediarelay_metrics::{counter, labels, relay as relay_metrics};

use crate::{job::Stage, transport::RelayTransport};

/// Number of slots in the rendered progress bar.
pub const BAR_WIDTH: usize = 20;

const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

/// Binary-unit size with two decimals, capped at GB.
#[must_use]
pub fn human_readable(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

/// `100 * current / total`, or 0 when the total is unknown.
#[must_use]
pub fn percent(current: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    current as f64 * 100.0 / total as f64
}

/// Filled bar slots: `floor(percent / 5)` clamped to the bar width.
#[must_use]
pub fn filled_slots(current: u64, total: u64) -> usize {
    if total == 0 {
        return 0;
    }
    let filled = u128::from(current) * BAR_WIDTH as u128 / u128::from(total);
    filled.min(BAR_WIDTH as u128) as usize
}

#[must_use]
pub fn render_bar(current: u64, total: u64) -> String {
    let filled = filled_slots(current, total);
    format!("{}{}", "=".repeat(filled), " ".repeat(BAR_WIDTH - filled))
}

/// Status message body for one progress sample.
#[must_use]
pub fn render_status(stage: Stage, current: u64, total: u64) -> String {
    format!(
        "<b>{stage}</b>\n<code>[{}]</code> {:.2}%\n\n{} of {}",
        render_bar(current, total),
        percent(current, total),
        human_readable(current),
        human_readable(total),
    )
}

/// One `(current, total)` byte sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferProgress {
    pub current: u64,
    pub total: u64,
}

impl TransferProgress {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.current >= self.total
    }
}

/// Transport-side end of a progress channel.
///
/// Samples overwrite each other; the reporter only ever sees the latest.
#[derive(Debug)]
pub struct ProgressHandle {
    tx: watch::Sender<TransferProgress>,
}

impl ProgressHandle {
    /// A connected handle and the receiver to pass to
    /// [`ProgressReporter::drive`].
    #[must_use]
    pub fn channel() -> (Self, watch::Receiver<TransferProgress>) {
        let (tx, rx) = watch::channel(TransferProgress::default());
        (Self { tx }, rx)
    }

    /// A handle nobody listens to.
    #[must_use]
    pub fn detached() -> Self {
        Self::channel().0
    }

    pub fn update(&self, current: u64, total: u64) {
        self.tx.send_replace(TransferProgress { current, total });
    }
}

/// Renders progress into one status message per job.
///
/// Edits are spaced at least `min_interval` apart, except the final sample
/// of a transfer, and an edit that would not change the text is skipped.
/// Edit failures are logged and otherwise ignored.
pub struct ProgressReporter {
    transport: Arc<dyn RelayTransport>,
    message: Option<MessageRef>,
    min_interval: Duration,
    last_edit: Option<Instant>,
    last_text: Option<String>,
    last_sample: TransferProgress,
    edits: u64,
}

impl ProgressReporter {
    /// `message` is `None` when the status message could not be sent; the
    /// reporter then does nothing.
    pub fn new(
        transport: Arc<dyn RelayTransport>,
        message: Option<MessageRef>,
        min_interval: Duration,
    ) -> Self {
        Self {
            transport,
            message,
            min_interval,
            last_edit: None,
            last_text: None,
            last_sample: TransferProgress::default(),
            edits: 0,
        }
    }

    #[must_use]
    pub fn message(&self) -> Option<MessageRef> {
        self.message
    }

    /// Successful edits so far.
    #[must_use]
    pub fn edits(&self) -> u64 {
        self.edits
    }

    /// Last sample seen by the current (or just finished) transfer.
    #[must_use]
    pub fn last_sample(&self) -> TransferProgress {
        self.last_sample
    }

    /// Render one sample. Returns whether the status message was edited.
    pub async fn report(&mut self, current: u64, total: u64, stage: Stage) -> bool {
        let sample = TransferProgress { current, total };
        self.last_sample = sample;
        if !sample.is_complete()
            && let Some(last) = self.last_edit
            && last.elapsed() < self.min_interval
        {
            return false;
        }
        let edited = self.edit(render_status(stage, current, total)).await;

        #[cfg(feature = "metrics")]
        if edited {
            counter!(relay_metrics::PROGRESS_EDITS_TOTAL, labels::STAGE => stage.label())
                .increment(1);
        }

        edited
    }

    /// Replace the status text outright, ignoring the rate limit.
    pub async fn set_text(&mut self, text: &str) -> bool {
        self.edit(text.to_string()).await
    }

    /// Run `transfer` while rendering every sample it publishes on `rx`.
    ///
    /// Returns once the transfer has finished and its [`ProgressHandle`] has
    /// been dropped; the last published sample is always rendered.
    pub async fn drive<T>(
        &mut self,
        stage: Stage,
        mut rx: watch::Receiver<TransferProgress>,
        transfer: impl Future<Output = T>,
    ) -> T {
        self.last_sample = TransferProgress::default();
        let watcher = async {
            while rx.changed().await.is_ok() {
                let sample = *rx.borrow_and_update();
                self.report(sample.current, sample.total, stage).await;
            }
        };
        let (output, ()) = tokio::join!(transfer, watcher);
        output
    }

    async fn edit(&mut self, text: String) -> bool {
        let Some(message) = self.message else {
            return false;
        };
        if self.last_text.as_deref() == Some(text.as_str()) {
            return false;
        }
        self.last_edit = Some(Instant::now());
        match self.transport.edit_message(&message, &text).await {
            Ok(()) => {
                self.last_text = Some(text);
                self.edits += 1;
                true
            },
            Err(e) => {
                warn!(%message, error = %e, "status edit failed");
                false
            },
        }
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("message", &self.message)
            .field("min_interval", &self.min_interval)
            .field("edits", &self.edits)
            .finish_non_exhaustive()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::test_support::{Call, MockTransport},
        rstest::rstest,
    };

    const STATUS: MessageRef = MessageRef {
        chat_id: -100,
        message_id: 7,
    };

    fn edits(mock: &MockTransport) -> Vec<String> {
        mock.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Edit { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    #[rstest]
    #[case(0, "0.00 B")]
    #[case(1023, "1023.00 B")]
    #[case(1536, "1.50 KB")]
    #[case(5 * 1024 * 1024, "5.00 MB")]
    #[case(1_073_741_824, "1.00 GB")]
    #[case(2048 * 1_073_741_824, "2048.00 GB")]
    fn human_readable_sizes(#[case] bytes: u64, #[case] expected: &str) {
        assert_eq!(human_readable(bytes), expected);
    }

    #[rstest]
    #[case(0, 100, 0)]
    #[case(4, 100, 0)]
    #[case(5, 100, 1)]
    #[case(99, 100, 19)]
    #[case(100, 100, 20)]
    #[case(1, 3, 6)]
    #[case(250, 100, 20)]
    #[case(10, 0, 0)]
    fn bar_slots(#[case] current: u64, #[case] total: u64, #[case] filled: usize) {
        assert_eq!(filled_slots(current, total), filled);
        let bar = render_bar(current, total);
        assert_eq!(bar.chars().count(), BAR_WIDTH);
        assert_eq!(bar.chars().filter(|c| *c == '=').count(), filled);
    }

    #[test]
    fn bar_matches_percent_floor_for_every_sample() {
        for total in [1_u64, 3, 7, 100, 1023, 4096] {
            for current in 0..=total {
                let expected = ((percent(current, total) / 5.0).floor() as usize).min(BAR_WIDTH);
                // float rounding may land exactly on a boundary from below
                let filled = filled_slots(current, total);
                assert!(
                    filled == expected || filled == expected + 1,
                    "{current}/{total}: {filled} vs {expected}"
                );
                assert_eq!(render_bar(current, total).len(), BAR_WIDTH);
            }
        }
    }

    #[test]
    fn zero_total_is_zero_percent() {
        assert_eq!(percent(10, 0), 0.0);
        let text = render_status(Stage::Downloading, 10, 0);
        assert!(text.contains("0.00%"), "{text}");
    }

    #[test]
    fn status_text_layout() {
        let text = render_status(Stage::Uploading, 1536, 3072);
        assert_eq!(
            text,
            "<b>Uploading</b>\n<code>[==========          ]</code> 50.00%\n\n1.50 KB of 3.00 KB"
        );
    }

    #[tokio::test]
    async fn throttles_intermediate_samples_but_renders_final() {
        let mock = Arc::new(MockTransport::new());
        let mut reporter =
            ProgressReporter::new(mock.clone(), Some(STATUS), Duration::from_secs(60));

        assert!(reporter.report(10, 100, Stage::Downloading).await);
        assert!(!reporter.report(20, 100, Stage::Downloading).await);
        assert!(!reporter.report(30, 100, Stage::Downloading).await);
        assert!(reporter.report(100, 100, Stage::Downloading).await);

        let edits = edits(&mock);
        assert_eq!(edits.len(), 2);
        assert!(edits[0].contains("10.00%"));
        assert!(edits[1].contains("100.00%"));
        assert_eq!(reporter.edits(), 2);
    }

    #[tokio::test]
    async fn identical_text_is_not_resent() {
        let mock = Arc::new(MockTransport::new());
        let mut reporter = ProgressReporter::new(mock.clone(), Some(STATUS), Duration::ZERO);

        assert!(reporter.report(100, 100, Stage::Uploading).await);
        assert!(!reporter.report(100, 100, Stage::Uploading).await);
        assert!(reporter.set_text("done").await);
        assert!(!reporter.set_text("done").await);
        assert_eq!(edits(&mock).len(), 2);
    }

    #[tokio::test]
    async fn edit_failures_are_swallowed() {
        let mock = Arc::new(MockTransport::new().fail_edits());
        let mut reporter = ProgressReporter::new(mock.clone(), Some(STATUS), Duration::ZERO);

        assert!(!reporter.report(50, 100, Stage::Downloading).await);
        assert!(!reporter.set_text("still going").await);
        assert_eq!(reporter.edits(), 0);
    }

    #[tokio::test]
    async fn unbound_reporter_never_edits() {
        let mock = Arc::new(MockTransport::new());
        let mut reporter = ProgressReporter::new(mock.clone(), None, Duration::ZERO);
        assert!(!reporter.report(100, 100, Stage::Downloading).await);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn drive_renders_the_last_sample_after_transfer_ends() {
        let mock = Arc::new(MockTransport::new());
        let mut reporter =
            ProgressReporter::new(mock.clone(), Some(STATUS), Duration::from_secs(60));
        let (handle, rx) = ProgressHandle::channel();

        let transfer = async move {
            for step in 1..=4_u64 {
                handle.update(step * 25, 100);
                tokio::task::yield_now().await;
            }
            "done"
        };
        let output = reporter.drive(Stage::Downloading, rx, transfer).await;

        assert_eq!(output, "done");
        let edits = edits(&mock);
        assert!(!edits.is_empty());
        assert!(edits.last().unwrap().contains("100.00%"));
        // first sample edits, the rest are throttled until the final one
        assert!(edits.len() <= 2, "{edits:?}");
        assert_eq!(reporter.last_sample(), TransferProgress {
            current: 100,
            total: 100
        });
    }

    #[tokio::test]
    async fn each_drive_starts_from_zero() {
        let mock = Arc::new(MockTransport::new());
        let mut reporter = ProgressReporter::new(mock.clone(), Some(STATUS), Duration::ZERO);

        let (handle, rx) = ProgressHandle::channel();
        reporter
            .drive(Stage::Downloading, rx, async move { handle.update(64, 64) })
            .await;
        assert_eq!(reporter.last_sample().current, 64);

        let (handle, rx) = ProgressHandle::channel();
        reporter
            .drive(Stage::Uploading, rx, async move { drop(handle) })
            .await;
        assert_eq!(reporter.last_sample(), TransferProgress::default());
    }

    #[test]
    fn detached_handle_accepts_updates() {
        let handle = ProgressHandle::detached();
        handle.update(1, 2);
    }
}
