//! Logwarden - log tailing daemon that reports error blocks to a webhook.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use logwarden::config::{AppConfig, CaptureMode, ConfigLoader};
use logwarden::notifier::{NotificationSink, SlackSink};
use logwarden::watch::{StartPatterns, WatchSettings, WatchSupervisor};

#[derive(Parser)]
#[command(
    name = "logwarden",
    about = "Tail log files and report error blocks to a webhook",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to the configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

fn load_config(path: Option<PathBuf>) -> AppConfig {
    let loader = path.map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    match loader.load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config);

    let endpoint = match config.endpoint_url() {
        Ok(url) => url,
        Err(e) => {
            tracing::error!(error = %e, "Cannot start without a notification endpoint");
            std::process::exit(1);
        }
    };

    let sink: Arc<dyn NotificationSink> =
        match SlackSink::new(endpoint, config.response_timeout()) {
            Ok(sink) => Arc::new(sink),
            Err(e) => {
                tracing::error!(error = %e, "Failed to build notification client");
                std::process::exit(1);
            }
        };

    let patterns = Arc::new(StartPatterns::compile(&config.start_error_patterns));
    if patterns.is_empty() {
        tracing::warn!("No usable start patterns configured, nothing will be reported");
    }

    let watched = config.watched_paths();
    if watched.is_empty() {
        tracing::error!("No log files configured, nothing to watch");
        std::process::exit(1);
    }

    let settings = WatchSettings {
        service: config.service.clone(),
        dispatch: config.dispatch,
        poll_interval: config.poll_interval(),
    };

    let shared_gate = Arc::new(Mutex::new(()));
    let mut watches = JoinSet::new();

    for path in watched {
        let gate = match config.capture_mode {
            CaptureMode::Serialized => Arc::clone(&shared_gate),
            CaptureMode::Parallel => Arc::new(Mutex::new(())),
        };
        let supervisor = WatchSupervisor::new(
            path,
            Arc::clone(&patterns),
            settings.clone(),
            Arc::clone(&sink),
            gate,
        );
        watches.spawn(supervisor.run());
    }

    // Long-running daemon: this only returns once every watch has ended,
    // which under normal operation is never.
    while let Some(result) = watches.join_next().await {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Watch terminated"),
            Err(e) => tracing::error!(error = %e, "Watch task panicked"),
        }
    }
}
