//! Metric name and label definitions.
//!
//! Centralizing these keeps names consistent between the recording sites and
//! any dashboards built on top of them.

/// Relay pipeline metrics
pub mod relay {
    /// Relay jobs started
    pub const JOBS_STARTED_TOTAL: &str = "mediarelay_jobs_started_total";
    /// Relay jobs that delivered their file
    pub const JOBS_SUCCEEDED_TOTAL: &str = "mediarelay_jobs_succeeded_total";
    /// Relay jobs that failed, labelled by `stage`
    pub const JOBS_FAILED_TOTAL: &str = "mediarelay_jobs_failed_total";
    /// Jobs currently running
    pub const ACTIVE_JOBS: &str = "mediarelay_active_jobs";
    /// End-to-end job duration in seconds
    pub const JOB_DURATION_SECONDS: &str = "mediarelay_job_duration_seconds";
    /// Bytes pulled from the source channel
    pub const BYTES_DOWNLOADED_TOTAL: &str = "mediarelay_bytes_downloaded_total";
    /// Bytes pushed to the destination channel
    pub const BYTES_UPLOADED_TOTAL: &str = "mediarelay_bytes_uploaded_total";
    /// Status message edits actually sent
    pub const PROGRESS_EDITS_TOTAL: &str = "mediarelay_progress_edits_total";
    /// Artifacts that could not be removed
    pub const CLEANUP_FAILURES_TOTAL: &str = "mediarelay_cleanup_failures_total";
    /// Outcome notifications that could not be delivered
    pub const NOTIFICATION_FAILURES_TOTAL: &str = "mediarelay_notification_failures_total";
}

/// Telegram transport metrics
pub mod telegram {
    /// Updates received from getUpdates
    pub const UPDATES_RECEIVED_TOTAL: &str = "mediarelay_telegram_updates_received_total";
    /// Media events accepted from the source channel
    pub const MEDIA_EVENTS_TOTAL: &str = "mediarelay_telegram_media_events_total";
    /// Commands handled, labelled by `command`
    pub const COMMANDS_TOTAL: &str = "mediarelay_telegram_commands_total";
    /// getUpdates failures
    pub const POLLING_ERRORS_TOTAL: &str = "mediarelay_telegram_polling_errors_total";
    /// Requests retried after a flood wait
    pub const RATE_LIMITED_TOTAL: &str = "mediarelay_telegram_rate_limited_total";
}

/// Common label keys
pub mod labels {
    pub const STAGE: &str = "stage";
    pub const COMMAND: &str = "command";
}

/// Histogram buckets
pub mod buckets {
    /// Relay job duration buckets (in seconds)
    /// Covers 1s to 1h (large uploads are slow)
    pub const JOB_DURATION: &[f64] = &[
        1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1200.0, 1800.0, 3600.0,
    ];
}
