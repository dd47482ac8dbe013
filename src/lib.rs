pub mod audio;
pub mod commands;
pub mod db;
pub mod detection;
pub mod focus;
pub mod settings;
pub mod social;
pub mod utils;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
    task::JoinHandle,
};

use audio::Feedback;
use commands::ShellCommand;
use db::{Database, SessionStore};
use detection::{BlankFrameSource, SimulatedDetector};
use focus::{FocusController, FocusServices};
use settings::SettingsStore;

/// Everything the shell needs, wired together.
pub struct App {
    pub controller: FocusController,
    pub detector: Arc<SimulatedDetector>,
    pub settings: SettingsStore,
    actor: JoinHandle<()>,
}

impl App {
    /// Open storage and settings under `data_dir` and spawn the focus
    /// controller. Must be called from within a Tokio runtime context.
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;

        let database = Database::new(data_dir.join("boldfocus.sqlite3"))?;
        let settings = SettingsStore::new(data_dir.join("settings.json"))?;
        let detector = Arc::new(SimulatedDetector::new());

        let services = FocusServices {
            store: SessionStore::new(database),
            detector: detector.clone(),
            frames: Arc::new(BlankFrameSource),
            feedback: default_feedback(),
        };
        let (controller, actor) = FocusController::spawn(services, &settings.get());

        Ok(Self {
            controller,
            detector,
            settings,
            actor,
        })
    }

    pub async fn shutdown(self) -> Result<()> {
        self.controller.shutdown().await?;
        self.actor
            .await
            .map_err(|err| anyhow!("focus controller task failed: {err}"))
    }
}

#[cfg(feature = "sound")]
fn default_feedback() -> Arc<dyn Feedback> {
    Arc::new(audio::AudioEngineHandle::new())
}

#[cfg(not(feature = "sound"))]
fn default_feedback() -> Arc<dyn Feedback> {
    Arc::new(audio::SilentFeedback)
}

fn data_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("BOLDFOCUS_DATA_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::data_dir()
        .map(|dir| dir.join("boldfocus"))
        .ok_or_else(|| anyhow!("no data directory available; set BOLDFOCUS_DATA_DIR"))
}

pub fn run() -> Result<()> {
    let debug_mode = std::env::var("BOLDFOCUS_DEBUG")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::new()
        .filter_level(if debug_mode {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .parse_default_env()
        .init();

    info!("BoldFocus starting up...");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build async runtime")?;

    let data_dir = data_dir()?;
    let app = {
        let _guard = runtime.enter();
        App::open(&data_dir)?
    };

    runtime.block_on(async move {
        repl(&app).await?;
        app.shutdown().await
    })
}

async fn repl(app: &App) -> Result<()> {
    println!("{}", commands::HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut changes = app.controller.subscribe();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let command = match line.parse::<ShellCommand>() {
                    Ok(command) => command,
                    Err(err) => {
                        println!("{err}");
                        continue;
                    }
                };
                if command == ShellCommand::Quit {
                    break;
                }
                match commands::execute(app, command).await {
                    Ok(output) => println!("{output}"),
                    Err(err) => {
                        warn!("Command failed: {err:#}");
                        println!("error: {err}");
                    }
                }
            }
            change = changes.recv() => match change {
                Ok(change) => println!("[{} -> {}]", change.from, change.to),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            },
        }
    }

    Ok(())
}
