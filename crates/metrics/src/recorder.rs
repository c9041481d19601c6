//! Metrics recorder initialization and configuration.

use std::net::SocketAddr;

use tracing::info;

use crate::error::Result;

/// Handle to the installed metrics system.
#[derive(Debug, Clone)]
pub struct MetricsHandle {
    exporting: bool,
}

impl MetricsHandle {
    /// Whether an exporter is serving the recorded metrics.
    #[must_use]
    pub fn is_exporting(&self) -> bool {
        self.exporting
    }
}

/// Configuration for the metrics system.
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorderConfig {
    /// Address for the Prometheus scrape endpoint; `None` disables export.
    pub listen: Option<SocketAddr>,
    /// Global labels to add to all metrics
    pub global_labels: Vec<(String, String)>,
}

/// Initialize the metrics system.
///
/// Must be called from within a Tokio runtime when export is enabled: the
/// Prometheus HTTP listener is spawned onto it. Without the `prometheus`
/// feature or without a listen address, metrics macros are no-ops.
pub fn init_metrics(config: MetricsRecorderConfig) -> Result<MetricsHandle> {
    let Some(listen) = config.listen else {
        info!("metrics export is disabled");
        return Ok(MetricsHandle { exporting: false });
    };

    #[cfg(feature = "prometheus")]
    {
        install_prometheus(listen, config.global_labels)?;
        info!(%listen, "prometheus metrics exporter listening");
        Ok(MetricsHandle { exporting: true })
    }

    #[cfg(not(feature = "prometheus"))]
    {
        let _ = config.global_labels;
        tracing::warn!(
            %listen,
            "metrics.prometheus_listen is set but the prometheus feature is not compiled in"
        );
        Ok(MetricsHandle { exporting: false })
    }
}

#[cfg(feature = "prometheus")]
fn install_prometheus(listen: SocketAddr, global_labels: Vec<(String, String)>) -> Result<()> {
    use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};

    let mut builder = PrometheusBuilder::new()
        .with_http_listener(listen)
        .set_buckets_for_metric(
            Matcher::Full(crate::relay::JOB_DURATION_SECONDS.to_string()),
            crate::buckets::JOB_DURATION,
        )?;

    for (key, value) in global_labels {
        builder = builder.add_global_label(key, value);
    }

    builder.install()?;
    Ok(())
}
