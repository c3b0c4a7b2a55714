pub mod error;
pub mod models;
pub mod publishers;
pub mod services;
pub mod traits;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::models::types::RunReport;
use crate::publishers::bluesky::BskyClient;
use crate::publishers::console::OfflineApi;
use crate::services::crawler::FeedCrawler;
use crate::services::link_metadata::LinkMetadataResolver;
use crate::services::publisher::Publisher;
use crate::services::settings::{AppConfig, LoggingConfig, load_config};
use crate::services::worker::Worker;
use crate::traits::social_api::SocialApi;

/// High-level entrypoint: load config, init logging, run one sync pass
pub async fn run_with_config_path(path: &str, force_offline: bool) -> Result<RunReport> {
    let mut cfg: AppConfig = load_config(path)?;
    if force_offline {
        cfg.run.get_or_insert_with(Default::default).offline = Some(true);
    }

    // guard flushes the log file on drop
    let _guard = init_logging(&cfg.logging())?;
    run_worker(cfg).await
}

/// Structured logging to stderr and, when `logging.file` is set, to that file.
/// `RUST_LOG` overrides `logging.level` (default `info`).
pub fn init_logging(cfg: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.level.as_deref().unwrap_or("info")));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false).compact();

    let (file_layer, guard) = match cfg.file.as_deref() {
        Some(file) => {
            let path = Path::new(file);
            let name = path
                .file_name()
                .with_context(|| format!("logging.file {} has no file name", file))?;
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false).with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init();
    Ok(guard)
}

/// Wires the feed crawler, resolver, publisher and API client and runs the worker once.
pub async fn run_worker(cfg: AppConfig) -> Result<RunReport> {
    let run = cfg.run();
    let offline = run.is_offline();
    info!(feed = %cfg.feed.url, handle = %cfg.bluesky.handle, offline, "rss2bsky starting");

    let api: Arc<dyn SocialApi> = if offline {
        Arc::new(OfflineApi::new(run.offline_max_chars))
    } else {
        Arc::new(
            BskyClient::builder()
                .maybe_service_url(cfg.bluesky.service_url.clone())
                .maybe_timeline_limit(cfg.bluesky.timeline_limit)
                .timeout(cfg.feed.request_timeout())
                .build()?,
        )
    };
    let password = if offline {
        cfg.bluesky.password().unwrap_or_default()
    } else {
        cfg.bluesky.password()?
    };

    let feed = FeedCrawler::builder()
        .url(cfg.feed.url.clone())
        .timeout(cfg.feed.request_timeout())
        .build()?;
    let resolver = LinkMetadataResolver::builder().timeout(run.metadata_timeout()).build()?;
    let publisher = Publisher::builder()
        .api(api)
        .identifier(cfg.bluesky.identifier())
        .password(password)
        .backoff(cfg.bluesky.login_backoff())
        .image_timeout(run.metadata_timeout())
        .build()?;

    let mut worker = Worker::builder()
        .feed(Arc::new(feed))
        .resolver(resolver)
        .publisher(publisher)
        .handle(cfg.bluesky.handle.clone())
        .settings(run)
        .build()
        .context("invalid run.post_template")?;
    worker.run().await
}
