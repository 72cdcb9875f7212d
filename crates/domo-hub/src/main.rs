//! # domo-hub
//!
//! Domo hub binary. Wires the device store, media collaborators and the
//! HTTP/WebSocket server, then serves until ctrl+c.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use domo_assistant::{OllamaAssistant, SidecarFaceMatcher, SidecarTranscriber};
use domo_settings::{AssistantSettings, DomoSettings};
use domo_store::{ConnectionConfig, SqliteDeviceStore};
use domo_server::{Collaborators, DomoServer, ServerConfig};

/// Domo hub server.
#[derive(Parser, Debug)]
#[command(name = "domo-hub", about = "Domo home automation hub")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Path to the `SQLite` device database.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Path to the settings file (default `~/.domo/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,
}

impl Cli {
    fn apply(&self, settings: &mut DomoSettings) {
        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(ref path) = self.db_path {
            settings.store.db_path = Some(path.display().to_string());
        }
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

fn build_collaborators(settings: &AssistantSettings) -> Result<Collaborators> {
    let mut collaborators = Collaborators::default();

    if settings.transcription.enabled {
        let transcriber = SidecarTranscriber::new(&settings.transcription)
            .context("Failed to build transcription client")?;
        collaborators.transcriber = Some(Arc::new(transcriber));
        tracing::info!(url = %settings.transcription.base_url, "transcription enabled");
    } else {
        tracing::info!("transcription disabled");
    }

    if settings.face.sidecar.enabled {
        let matcher =
            SidecarFaceMatcher::new(&settings.face).context("Failed to build face client")?;
        collaborators.faces = Some(Arc::new(matcher));
        tracing::info!(url = %settings.face.sidecar.base_url, "face comparison enabled");
    } else {
        tracing::info!("face comparison disabled");
    }

    if settings.chat.enabled {
        let chat = OllamaAssistant::new(&settings.chat).context("Failed to build chat client")?;
        collaborators.chat = Some(Arc::new(chat));
        tracing::info!(model = %settings.chat.model, "chat assistant enabled");
    }

    Ok(collaborators)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings_path = cli.settings.clone().unwrap_or_else(domo_settings::settings_path);
    let mut settings = domo_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings: {}", settings_path.display()))?;
    cli.apply(&mut settings);

    domo_core::logging::init_subscriber(&settings.logging.level, settings.logging.format);
    tracing::info!(path = %settings_path.display(), "settings loaded");

    let metrics = domo_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let db_path = settings
        .store
        .db_path
        .as_ref()
        .map_or_else(|| domo_settings::domo_home().join("domo.db"), PathBuf::from);
    ensure_parent_dir(&db_path)?;
    let store_config = ConnectionConfig {
        pool_size: settings.store.pool_size,
        busy_timeout_ms: settings.store.busy_timeout_ms,
    };
    let store = SqliteDeviceStore::open(&db_path, &store_config)
        .with_context(|| format!("Failed to open device store: {}", db_path.display()))?;
    tracing::info!(path = %db_path.display(), "device store opened");

    let collaborators = build_collaborators(&settings.assistant)?;

    let config = ServerConfig::from(&settings.server);
    let server = DomoServer::new(config, Arc::new(store), collaborators, metrics);
    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!(%addr, "domo hub ready");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl+c")?;

    tracing::info!(
        sessions = server.shutdown().active_sessions(),
        "shutting down"
    );
    let _ = server.shutdown().drain(handle, Duration::from_secs(5)).await;
    Ok(())
}
