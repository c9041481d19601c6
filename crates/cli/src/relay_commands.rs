//! `mediarelay run`: wire the config into a pipeline and poll until Ctrl-C.

use std::{path::Path, sync::Arc, time::Duration};

use {
    anyhow::{Context, Result},
    mediarelay_config::RelayConfig,
    mediarelay_media::{HttpThumbnailProvider, ThumbnailProvider},
    mediarelay_metrics::MetricsRecorderConfig,
    mediarelay_pipeline::{MediaRelayPipeline, PipelineOptions, ThumbnailPolicy},
    mediarelay_telegram::TelegramTransport,
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
};

const THUMBNAIL_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn handle_run(config_path: Option<&Path>) -> Result<()> {
    let config = mediarelay_config::load(config_path)?;
    for diagnostic in mediarelay_config::validate(&config).into_result()? {
        warn!(path = diagnostic.path, "{}", diagnostic.message);
    }

    mediarelay_metrics::init_metrics(MetricsRecorderConfig {
        listen: config.metrics.prometheus_listen,
        global_labels: Vec::new(),
    })?;

    let work_dir = config.relay.work_dir();
    tokio::fs::create_dir_all(&work_dir)
        .await
        .with_context(|| format!("creating work dir {}", work_dir.display()))?;

    let bot = mediarelay_telegram::build_bot(&config.telegram)?;
    let transport = Arc::new(TelegramTransport::new(
        bot.clone(),
        mediarelay_telegram::build_transfer_client()?,
    )?);

    let cancel = CancellationToken::new();
    let pipeline =
        Arc::new(build_pipeline(&config, transport)?.with_cancellation(cancel.child_token()));
    let (source, _) = config.route()?;

    let handle = mediarelay_telegram::start_polling(bot, source, Arc::clone(&pipeline)).await?;
    info!(work_dir = %work_dir.display(), "relay running, press Ctrl-C to stop");

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("listening for Ctrl-C")?;
            info!("shutdown requested");
        },
        () = handle.stopped() => warn!("polling stopped, shutting down"),
    }

    let jobs = handle.active_jobs();
    if jobs > 0 {
        info!(jobs, "finishing in-flight relay jobs, press Ctrl-C again to abort them");
    }
    let shutdown = handle.shutdown();
    tokio::pin!(shutdown);
    tokio::select! {
        () = &mut shutdown => {},
        _ = tokio::signal::ctrl_c() => {
            warn!("aborting in-flight relay jobs");
            cancel.cancel();
            shutdown.await;
        },
    }

    let stats = pipeline.stats().snapshot();
    info!(
        succeeded = stats.succeeded,
        failed = stats.failed,
        "mediarelay stopped"
    );
    Ok(())
}

/// Map the loaded config onto a pipeline around `transport`.
fn build_pipeline(
    config: &RelayConfig,
    transport: Arc<TelegramTransport>,
) -> Result<MediaRelayPipeline> {
    let (_, destination) = config.route()?;

    let thumbnails = match &config.thumbnail.url {
        Some(url) => {
            let client = reqwest::Client::builder()
                .timeout(THUMBNAIL_FETCH_TIMEOUT)
                .build()?;
            let provider = HttpThumbnailProvider::new(client, url.clone())
                .with_max_dimension(config.thumbnail.max_dimension);
            Some(Arc::new(provider) as Arc<dyn ThumbnailProvider>)
        },
        None => None,
    };

    let options = PipelineOptions::new(destination)
        .with_prefix(config.relay.prefix.clone())
        .with_work_dir(config.relay.work_dir())
        .with_edit_interval(config.progress.edit_interval())
        .with_thumbnail_policy(ThumbnailPolicy::from_required(config.thumbnail.required))
        .with_notify_target(config.notify.target())
        .with_delete_source(config.relay.delete_source);

    Ok(MediaRelayPipeline::new(transport, thumbnails, options))
}
