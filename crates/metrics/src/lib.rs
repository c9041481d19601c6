//! Metrics collection and export for mediarelay.
//!
//! This crate provides a unified metrics interface using the `metrics` crate facade.
//! When the `prometheus` feature is enabled, metrics are served in Prometheus
//! format on a configurable listen address.
//!
//! # Usage
//!
//! ```rust,ignore
//! use mediarelay_metrics::{counter, relay};
//!
//! counter!(relay::JOBS_STARTED_TOTAL).increment(1);
//! ```

mod definitions;
pub mod error;
mod recorder;

pub use {
    definitions::*,
    error::{Error, Result},
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};
