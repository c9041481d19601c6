//! Process-wide relay counters.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};

#[cfg(feature = "metrics")]
use mediarelay_metrics::{gauge, relay as relay_metrics};

use crate::job::Outcome;

/// Counters shared by every job, read by `/status`.
#[derive(Debug)]
pub struct RelayStats {
    started_at: DateTime<Utc>,
    started: Instant,
    active: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl Default for RelayStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayStats {
    #[must_use]
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            started: Instant::now(),
            active: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Count a job as active until the returned guard is dropped, even when
    /// the job's task panics or is aborted.
    pub fn begin(&self) -> ActiveJob<'_> {
        self.active.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        gauge!(relay_metrics::ACTIVE_JOBS).increment(1.0);
        ActiveJob { stats: self }
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            started_at: self.started_at,
            uptime: self.started.elapsed(),
            active: self.active.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// A running job. Dropping it releases the active slot.
#[derive(Debug)]
pub struct ActiveJob<'a> {
    stats: &'a RelayStats,
}

impl ActiveJob<'_> {
    pub fn finish(self, outcome: &Outcome) {
        let counter = if outcome.is_success() {
            &self.stats.succeeded
        } else {
            &self.stats.failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

impl Drop for ActiveJob<'_> {
    fn drop(&mut self) {
        self.stats.active.fetch_sub(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        gauge!(relay_metrics::ACTIVE_JOBS).decrement(1.0);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub started_at: DateTime<Utc>,
    pub uptime: Duration,
    pub active: u64,
    pub succeeded: u64,
    pub failed: u64,
}

impl StatsSnapshot {
    /// Finished jobs.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.succeeded + self.failed
    }
}
