//! Wires the settings to the connection manager and the broadcast engine.
//!
//! While the client is enabled the manager is connected and one engine runs.
//! Disabling the client stops the engine first, so its final retract goes
//! out over the live connection, and only then disconnects. A connection
//! config change while enabled does the same and starts again.

use std::future::Future;
use std::sync::Arc;

use sonar_net::RemoteChannel;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{error, info, warn};

use crate::engine::{BroadcastConfig, BroadcastEngine, EngineInputs};
use crate::manager::ConnectionManager;
use crate::notice::PresenceNotice;
use crate::settings::Settings;
use crate::snapshot::{ActorSource, GameData};

/// Owns the engine task for one client.
pub struct Supervisor<C: RemoteChannel> {
    settings: Arc<Settings>,
    manager: Arc<ConnectionManager<C>>,
    actors: Arc<dyn ActorSource>,
    game_data: Arc<dyn GameData>,
    notices: mpsc::UnboundedSender<PresenceNotice>,
    config: BroadcastConfig,
    /// The engine's view of "client enabled". Dropped to `false` to stop it.
    gate: watch::Sender<bool>,
    engine: Option<JoinHandle<()>>,
}

impl<C: RemoteChannel> Supervisor<C> {
    #[must_use]
    pub fn new(
        settings: Arc<Settings>,
        manager: Arc<ConnectionManager<C>>,
        actors: Arc<dyn ActorSource>,
        game_data: Arc<dyn GameData>,
        notices: mpsc::UnboundedSender<PresenceNotice>,
    ) -> Self {
        Self {
            settings,
            manager,
            actors,
            game_data,
            notices,
            config: BroadcastConfig::default(),
            gate: watch::Sender::new(false),
            engine: None,
        }
    }

    /// Replace the engine configuration used for engines started from now on.
    #[must_use]
    pub fn with_config(mut self, config: BroadcastConfig) -> Self {
        self.config = config;
        self
    }

    /// Whether an engine task is running.
    #[must_use]
    pub fn engine_running(&self) -> bool {
        self.engine.as_ref().is_some_and(|e| !e.is_finished())
    }

    /// Connect and start an engine unless one is running.
    pub async fn start(&mut self) {
        let connection = self.settings.connection();
        if let Err(e) = self.manager.enable(&connection).await {
            // The engine still runs and reacts once a connection comes up.
            warn!(error = %e, "presence connection not established");
        }
        if self.engine_running() {
            return;
        }

        self.gate.send_replace(true);
        let inputs = EngineInputs {
            client_enabled: self.gate.subscribe(),
            broadcast_enabled: self.settings.subscribe_broadcast_enabled(),
        };
        let engine = BroadcastEngine::new(
            Arc::clone(&self.manager),
            Arc::clone(&self.actors),
            Arc::clone(&self.game_data),
            inputs,
            self.notices.clone(),
        )
        .with_config(self.config.clone());
        self.engine = Some(tokio::spawn(engine.run()));
        info!("presence client started");
    }

    /// Stop the engine, waiting for its final retract, then disconnect.
    pub async fn stop(&mut self) {
        self.gate.send_replace(false);
        if let Some(mut engine) = self.engine.take() {
            match time::timeout(self.config.teardown_budget(), &mut engine).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(error = %e, "broadcast engine task failed"),
                Err(_) => {
                    warn!("broadcast engine did not stop in time, aborting");
                    engine.abort();
                }
            }
        }
        self.manager.disable().await;
        info!("presence client stopped");
    }

    /// Follow the settings until `shutdown` resolves, then stop.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) {
        let mut client_enabled = self.settings.subscribe_client_enabled();
        let mut connection = self.settings.subscribe_connection();
        tokio::pin!(shutdown);

        if *client_enabled.borrow_and_update() {
            self.start().await;
        }
        connection.borrow_and_update();

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                changed = client_enabled.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if *client_enabled.borrow_and_update() {
                        self.start().await;
                    } else {
                        self.stop().await;
                    }
                }
                changed = connection.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let config = connection.borrow_and_update().clone();
                    if self.settings.client_enabled() {
                        info!(url = %config.url(), "connection settings changed, reconnecting");
                        self.stop().await;
                        self.start().await;
                    }
                }
            }
        }

        self.stop().await;
    }
}
