pub mod catalog;
pub mod config;
pub mod console;
pub mod content_log;
pub mod entries;
pub mod library;
pub mod locator;
pub mod logging;
pub mod manifest;
pub mod monitor;
pub mod render;
pub mod vdf;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use catalog::ManifestCatalog;
use config::{AppConfig, ConfigLoader, ConfigOverrides};
use console::ConsoleSink;
use content_log::ContentLogReader;
use library::SteamLibrary;
use locator::{CandidateSource, SteamLocator};
use monitor::{MonitorSettings, SteamDownloadMonitor};

#[derive(Parser, Debug)]
#[command(
    name = "steam-download-monitor",
    version,
    about = "Reports Steam download progress from content_log.txt and app manifests"
)]
struct Args {
    /// Path to the JSON config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Path to a .env file with STEAM_MONITOR_* overrides
    #[arg(long)]
    dotenv: Option<PathBuf>,
    /// Number of samples to take
    #[arg(long)]
    samples: Option<u64>,
    /// Seconds between samples
    #[arg(long)]
    interval_seconds: Option<u64>,
    /// Steam install directory; skips auto-detection
    #[arg(long)]
    steam_root: Option<PathBuf>,
}

impl Args {
    fn overrides(self) -> ConfigOverrides {
        ConfigOverrides {
            config_path: self.config,
            dotenv_path: self.dotenv,
            samples: self.samples,
            interval_seconds: self.interval_seconds,
            steam_root: self.steam_root,
        }
    }
}

fn candidate_sources(config: &AppConfig) -> Vec<CandidateSource> {
    vec![
        CandidateSource::Registry {
            paths: config.registry_paths.clone(),
            values: config.registry_values.clone(),
        },
        CandidateSource::Processes,
        CandidateSource::FixedPaths(config.steam_root_candidates.clone()),
    ]
}

fn resolve_steam_root(config: &AppConfig) -> Option<PathBuf> {
    if let Some(root) = &config.steam_root {
        return Some(root.clone());
    }
    SteamLocator::new(candidate_sources(config), &config.steam_log_rel_path).find_install_path()
}

fn build_monitor(config: &AppConfig, steam_root: PathBuf) -> SteamDownloadMonitor<ConsoleSink> {
    let reader = ContentLogReader::new(
        steam_root.join(&config.steam_log_rel_path),
        config.tail_bytes,
        config.log_encoding,
    );
    let library_vdf = steam_root.join(&config.library_vdf_rel_path);
    let library = SteamLibrary::new(steam_root, library_vdf);
    let catalog = ManifestCatalog::new(&config.manifest_pattern);
    let settings = MonitorSettings {
        interval: Duration::from_secs(config.interval_seconds),
        samples: config.samples,
        timestamp_format: config.timestamp_format.clone(),
    };
    SteamDownloadMonitor::new(reader, library, catalog, ConsoleSink, settings)
}

/// Runs the monitor until all samples are taken or Ctrl-C is pressed
async fn monitor_until_interrupted(mut monitor: SteamDownloadMonitor<ConsoleSink>) {
    let interrupted = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", err);
            std::future::pending::<()>().await;
        }
    };
    tokio::select! {
        _ = monitor.run() => {}
        _ = interrupted => {
            tracing::info!("Interrupted, stopping monitor");
        }
    }
}

pub fn run() -> ExitCode {
    let args = Args::parse();
    let config = match ConfigLoader::default().load(&args.overrides()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    let _log_guard = logging::init_logging(&config);

    let Some(steam_root) = resolve_steam_root(&config) else {
        tracing::error!("Steam install path not found.");
        return ExitCode::FAILURE;
    };
    tracing::info!("Steam root: {}", steam_root.display());

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::error!("Unexpected error: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let monitor = build_monitor(&config, steam_root);
    runtime.block_on(monitor_until_interrupted(monitor));
    ExitCode::SUCCESS
}
