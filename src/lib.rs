use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Args;
use crate::core::batch::{BatchReport, Coordinator};
use crate::core::events::TracingEmitter;
use crate::core::ffmpeg::{self, FfmpegMuxer};
use crate::core::unit::Services;
use crate::models::settings::DownloadMode;
use crate::platforms::generic_ytdlp::YtdlpExtractor;
use crate::storage::config;

pub mod cli;
pub mod core;
pub mod models;
pub mod platforms;
pub mod storage;

/// `RUST_LOG` wins over `directive` when set.
pub fn init_tracing(directive: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| directive.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

pub async fn run(args: Args) -> anyhow::Result<()> {
    let mut settings = config::load_settings(args.config.as_deref())?;
    args.apply(&mut settings);

    if args.write_config {
        let path = args
            .config
            .clone()
            .unwrap_or_else(config::default_settings_path);
        config::save_settings(&path, &settings)?;
        tracing::info!("Wrote settings to {}", path.display());
        return Ok(());
    }

    if settings.download.mode == DownloadMode::Both && !ffmpeg::is_ffmpeg_available().await {
        tracing::warn!("ffmpeg was not found on PATH; merging streams will fail");
    }

    let settings = Arc::new(settings);
    let services = Services {
        extractor: Arc::new(YtdlpExtractor::new(
            settings.advanced.cookies_file.clone(),
            settings.advanced.extra_ytdlp_flags.clone(),
        )),
        muxer: Arc::new(FfmpegMuxer::new()),
        events: Arc::new(TracingEmitter),
    };

    let mut coordinator = Coordinator::new(settings, services).await?;

    let unresolved = tokio::select! {
        classified = coordinator.classify_all() => classified?,
        _ = shutdown_signal() => {
            tracing::info!("Interrupted while resolving the worklist");
            return Ok(());
        }
    };

    let finished = tokio::select! {
        report = coordinator.run() => Some(report),
        _ = shutdown_signal() => None,
    };

    match finished {
        Some(report) => {
            let mut total = BatchReport {
                failed: unresolved,
                ..Default::default()
            };
            total.absorb(report);
            total.log_summary();
        }
        None => {
            tracing::warn!("Interrupted, cleaning up");
            coordinator.exit().await;
        }
    }

    Ok(())
}
