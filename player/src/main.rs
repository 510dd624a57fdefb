use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use log::{debug, info};
use serde::Serialize;
use watchsync_core::media::{embed_html, tubi_embed_url};
use watchsync_core::{BackendKind, SyncConfig, VideoKind, VideoSource};

mod app;
mod commands;

use app::{App, SimulationOptions};

#[derive(Parser)]
#[command(name = "watchsync", version, about = "Synchronized watch party playback")]
struct Cli {
    /// Sync settings file (JSON). Defaults to sync.json in the config dir.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show which backend would play a URL
    Classify { url: String },

    /// Print the embedded player page (YouTube) or embed URL (Tubi) for a URL
    Embed {
        url: String,
        /// Status poll interval inside the page, in milliseconds
        #[arg(long)]
        poll_ms: Option<u64>,
    },

    /// Run a host and several guests in-process and report their drift
    Simulate {
        #[arg(long, default_value = "https://archive.org/download/party/feature.mp4")]
        url: String,
        /// Length of the simulated video in seconds
        #[arg(long, default_value_t = 600.0)]
        duration: f64,
        #[arg(long, default_value_t = 2)]
        guests: usize,
        /// How long to run, in seconds
        #[arg(long, default_value_t = 20)]
        seconds: u64,
        /// Delay before each guest joins, in milliseconds
        #[arg(long, default_value_t = 1500)]
        late_join_ms: u64,
        /// Host actions, e.g. "wait 5; seek 300; pause; wait 2; play"
        #[arg(long, default_value = "")]
        script: String,
        /// Playback rate error per guest (0.05 = 5% fast or slow)
        #[arg(long, default_value_t = 0.05)]
        skew: f64,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClassifyReport<'a> {
    url: &'a str,
    kind: VideoKind,
    backend: BackendKind,
    playback_url: String,
    drift_threshold: Option<f64>,
}

fn load_config(path: Option<PathBuf>) -> Result<SyncConfig> {
    if let Some(path) = path {
        return SyncConfig::from_file(&path)
            .with_context(|| format!("Failed to load config {}", path.display()));
    }

    let default_path = ProjectDirs::from("", "", "watchsync")
        .map(|dirs| dirs.config_dir().join("sync.json"));
    match default_path {
        Some(path) if path.exists() => {
            info!("Using config {}", path.display());
            SyncConfig::from_file(&path)
                .with_context(|| format!("Failed to load config {}", path.display()))
        }
        _ => {
            debug!("No config file, using defaults");
            Ok(SyncConfig::default())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = load_config(cli.config)?;

    match cli.command {
        Command::Classify { url } => {
            let source = VideoSource::new(&url);
            let backend = source.kind().backend();
            let report = ClassifyReport {
                url: source.url(),
                kind: source.kind(),
                backend,
                playback_url: source.playback_url(),
                drift_threshold: config.drift_threshold(backend),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Embed { url, poll_ms } => {
            let poll = poll_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| config.youtube_poll_interval());
            match VideoSource::new(&url).kind() {
                VideoKind::YouTube { id } => println!("{}", embed_html(&id, poll)),
                VideoKind::Tubi { id } => println!("{}", tubi_embed_url(&id)),
                other => anyhow::bail!("{} plays natively, there is no embed page", other),
            }
        }
        Command::Simulate {
            url,
            duration,
            guests,
            seconds,
            late_join_ms,
            script,
            skew,
        } => {
            let script = commands::parse_script(&script).context("Invalid host script")?;
            let options = SimulationOptions {
                url,
                duration,
                guests,
                run_for: Duration::from_secs(seconds),
                late_join: Duration::from_millis(late_join_ms),
                skew,
                script,
            };
            App::new(config).run(options).await?;
        }
    }

    Ok(())
}
