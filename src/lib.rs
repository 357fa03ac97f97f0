mod audio;
mod config;
mod db;
mod gesture;
mod layout;
mod push;
mod replay;
mod session;
mod settings;
mod state;
mod utils;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use log::info;
use tokio::io::BufReader;

pub use config::InteractionConfig;
pub use gesture::{FrameReport, Landmark};
pub use push::PushEvent;
pub use session::MirrorController;
pub use settings::UiConfig;
pub use state::{MirrorEvent, MirrorSnapshot};

use audio::CuePlayer;
use db::Database;

const DATA_DIR_ENV: &str = "SMART_MIRROR_DATA_DIR";
const DEFAULT_DATA_DIR: &str = ".smart-mirror";

pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    info!("Smart mirror starting up...");

    let data_dir = std::env::var_os(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    let config = InteractionConfig::load(&data_dir.join("interaction.json"))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(async move {
        let database = Database::new(data_dir.join("mirror.sqlite3"))?;
        let controller = MirrorController::new(config, database, cue_player()).await?;
        let input = BufReader::new(tokio::io::stdin());
        replay::replay(controller, input, tokio::io::stdout()).await?;
        Ok::<(), anyhow::Error>(())
    })
}

#[cfg(feature = "audio")]
fn cue_player() -> Arc<dyn CuePlayer> {
    Arc::new(audio::ToneEngineHandle::new())
}

#[cfg(not(feature = "audio"))]
fn cue_player() -> Arc<dyn CuePlayer> {
    Arc::new(audio::LogCuePlayer)
}
