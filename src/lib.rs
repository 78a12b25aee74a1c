pub mod audio;
pub mod cli;
pub mod db;
pub mod export;
pub mod focus;
pub mod settings;
pub mod timeline;
mod utils;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use audio::{default_microphone, AudioSampler};
use cli::Cli;
use db::{Database, SessionRepository};
use focus::FocusController;
use settings::{debug_enabled, resolve_data_dir, SettingsStore};

const DB_FILE: &str = "void.sqlite3";
const SETTINGS_FILE: &str = "settings.json";

/// Logging reads `RUST_LOG`; `VOID_DEBUG=1` lowers the default to debug.
pub fn init_logging() {
    let level = if debug_enabled() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init();
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let data_dir = resolve_data_dir(cli.data_dir.clone())?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;
    info!("void starting up in {}", data_dir.display());

    let settings = SettingsStore::new(data_dir.join(SETTINGS_FILE))?;
    let audio_config = settings.audio();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    runtime.block_on(async move {
        let database = Database::new(data_dir.join(DB_FILE))?;
        let repository = SessionRepository::new(database);
        let bar_count = audio_config.bar_count;
        let sampler = AudioSampler::new(default_microphone(), audio_config);
        let controller = FocusController::new(repository, sampler)?;

        // Sessions still marked active were left by a run that never exited.
        let recovered = controller.recover_abandoned().await;
        if recovered > 0 {
            warn!("Closed {recovered} abandoned session(s)");
        }

        cli::dispatch(cli.command, &controller, bar_count).await
    })
}
