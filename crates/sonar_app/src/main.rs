//! # sonar_app — headless presence client
//!
//! Connects to the presence service and shares the local actor's location
//! while it is role-playing.
//!
//! ## Startup Sequence
//!
//! 1. Parse arguments (server URL also read from `SONAR_URL`).
//! 2. Load the game tables JSON, if given.
//! 3. Start the supervisor and read the actor feed from stdin.
//! 4. On Ctrl-C, retract and disconnect.

mod feed;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use sonar_client::engine::DEFAULT_MOVEMENT_THRESHOLD;
use sonar_client::status::indicator_label;
use sonar_client::{BroadcastConfig, ConnectionManager, GameTables, Settings, Supervisor};
use sonar_net::config::{API_VERSION, DEFAULT_HUB_PATH, DEFAULT_SERVER_ADDRESS};
use sonar_net::connection::DEFAULT_MAX_RECONNECTS;
use sonar_net::{ConnectionConfig, NatsChannel, RemoteChannel};
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use feed::{FeedActor, FeedContext};

#[derive(Parser)]
#[command(name = "sonar_app", about = "Headless presence-sharing client over NATS")]
struct Args {
    /// NATS server URL
    #[arg(short, long, env = "SONAR_URL", default_value = DEFAULT_SERVER_ADDRESS)]
    server: String,

    /// Hub path; becomes the subject prefix
    #[arg(long, default_value = DEFAULT_HUB_PATH)]
    hub_path: String,

    /// Client api version sent with every call
    #[arg(long, default_value = API_VERSION)]
    api_version: String,

    /// Reconnect attempts before the connection is given up
    #[arg(long, default_value_t = DEFAULT_MAX_RECONNECTS)]
    max_reconnects: usize,

    /// Start with the client disabled
    #[arg(long)]
    disabled: bool,

    /// Whether to broadcast presence
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    broadcast: bool,

    /// Seconds between evaluations
    #[arg(long, default_value_t = 10)]
    tick_secs: u64,

    /// Distance moved before the position is published again
    #[arg(long, default_value_t = DEFAULT_MOVEMENT_THRESHOLD)]
    movement_threshold: f64,

    /// Path to a game tables JSON file
    #[arg(short, long)]
    tables: Option<PathBuf>,
}

fn load_tables(path: Option<&Path>) -> Result<GameTables> {
    let Some(path) = path else {
        warn!("no game tables given, every zone is unknown and nothing is shared");
        return Ok(GameTables::default());
    };
    info!(file = %path.display(), "loading game tables");
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading game tables {}", path.display()))?;
    let tables: GameTables = serde_json::from_str(&text)
        .with_context(|| format!("parsing game tables {}", path.display()))?;
    info!(
        territories = tables.territories.len(),
        worlds = tables.worlds.len(),
        maps = tables.maps.len(),
        "game tables loaded"
    );
    Ok(tables)
}

/// Log the connection status and indicator whenever `connected` flips.
async fn report_status<C: RemoteChannel>(manager: Arc<ConnectionManager<C>>, settings: Arc<Settings>) {
    let mut connected = manager.subscribe_connected();
    while connected.changed().await.is_ok() {
        let is_connected = *connected.borrow_and_update();
        let status = manager.state().await;
        info!(
            status = %status,
            indicator = indicator_label(
                settings.client_enabled(),
                settings.broadcast_enabled(),
                is_connected
            ),
            "connection status"
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sonar_app=info,sonar_client=info".into()),
        )
        .init();

    let args = Args::parse();
    let tables = Arc::new(load_tables(args.tables.as_deref())?);

    let connection = ConnectionConfig::new(args.server)
        .with_hub_path(args.hub_path)
        .with_api_version(args.api_version);
    let settings = Arc::new(Settings::new(!args.disabled, args.broadcast, connection));
    let channel = NatsChannel::new().with_max_reconnects(args.max_reconnects);
    let manager = Arc::new(ConnectionManager::new(channel));
    let actor = Arc::new(FeedActor::default());

    let config = BroadcastConfig::default()
        .with_tick_interval(Duration::from_secs(args.tick_secs.max(1)))
        .with_movement_threshold(args.movement_threshold);

    let (notices_tx, mut notices) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(notice) = notices.recv().await {
            println!("{notice}");
        }
    });
    tokio::spawn(report_status(Arc::clone(&manager), Arc::clone(&settings)));

    let feed = FeedContext {
        actor: Arc::clone(&actor),
        settings: Arc::clone(&settings),
        manager: Arc::clone(&manager),
        tables: Arc::clone(&tables),
    };
    tokio::spawn(feed.run(BufReader::new(tokio::io::stdin())));

    let supervisor = Supervisor::new(settings, manager, actor, tables, notices_tx).with_config(config);
    info!("presence client running, Ctrl-C to stop");
    supervisor
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for Ctrl-C");
            }
        })
        .await;

    info!("presence client shut down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["sonar_app", "--server", "nats://example:4222"]).unwrap();
        assert_eq!(args.server, "nats://example:4222");
        assert_eq!(args.hub_path, DEFAULT_HUB_PATH);
        assert_eq!(args.max_reconnects, DEFAULT_MAX_RECONNECTS);
        assert!(args.broadcast);
        assert!(!args.disabled);
    }

    #[test]
    fn test_args_overrides() {
        let args = Args::try_parse_from([
            "sonar_app",
            "--max-reconnects",
            "3",
            "--broadcast",
            "false",
            "--tick-secs",
            "2",
        ])
        .unwrap();
        assert_eq!(args.max_reconnects, 3);
        assert!(!args.broadcast);
        assert_eq!(args.tick_secs, 2);
    }
}
