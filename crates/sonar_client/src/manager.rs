//! Connection lifecycle manager.
//!
//! Owns the single [`RemoteChannel`] and the connection state machine:
//!
//! ```text
//! Disconnected --enable(ok)----------> Connected
//! Disconnected --enable(fail)--------> Disconnected
//! Connected    --closed--------------> Disconnected
//! Connected    --reconnecting--------> Reconnecting
//! Reconnecting --reconnected---------> Connected
//! Reconnecting --closed (give up)----> Disconnected
//! any          --UpdateClient push---> UpgradeRequired (terminal)
//! any          --disable()-----------> Disconnected
//! ```
//!
//! Subscribers see a de-duplicated `connected` signal: it fires only when
//! the effective value flips. The state write and the signal emission happen
//! under one lock hold.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use sonar_net::methods::UPDATE_CLIENT;
use sonar_net::{ChannelEvent, ConnectionConfig, NetError, RemoteChannel, codec};
use tokio::sync::{Mutex, RwLock, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::ConnectionError;

/// The manager's connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// The server rejected this client's version. Sticky.
    UpgradeRequired,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting...",
            Self::Connected => "Connected",
            Self::Reconnecting => "Reconnecting...",
            Self::UpgradeRequired => "Update required",
        };
        f.write_str(text)
    }
}

/// State shared with the channel event handler task.
#[derive(Debug)]
struct Shared {
    state: RwLock<ConnectionState>,
    connected: watch::Sender<bool>,
    upgrade: watch::Sender<Option<String>>,
}

impl Shared {
    /// Write the next state and emit `connected` if its value flipped.
    fn set(&self, state: &mut ConnectionState, next: ConnectionState) {
        if *state != next {
            debug!(from = %state, to = %next, "connection state transition");
        }
        *state = next;
        let connected = next == ConnectionState::Connected;
        self.connected.send_if_modified(|current| {
            if *current == connected {
                false
            } else {
                *current = connected;
                true
            }
        });
    }

    async fn on_channel_event(&self, event: ChannelEvent) {
        let mut state = self.state.write().await;
        match (event, *state) {
            (ChannelEvent::ServerPush { method, message }, _) if method == UPDATE_CLIENT => {
                error!(%message, "server requires a client update; presence sharing stopped");
                self.upgrade.send_replace(Some(message));
                self.set(&mut state, ConnectionState::UpgradeRequired);
            }
            (ChannelEvent::ServerPush { method, .. }, _) => {
                debug!(method, "ignoring unknown server push");
            }
            (ChannelEvent::Reconnecting, ConnectionState::Connected) => {
                warn!("connection lost, reconnecting");
                self.set(&mut state, ConnectionState::Reconnecting);
            }
            (ChannelEvent::Reconnected, ConnectionState::Reconnecting) => {
                info!("connection re-established");
                self.set(&mut state, ConnectionState::Connected);
            }
            (
                ChannelEvent::Closed,
                ConnectionState::Connected | ConnectionState::Reconnecting,
            ) => {
                warn!("connection closed");
                self.set(&mut state, ConnectionState::Disconnected);
            }
            (event, current) => {
                debug!(?event, state = %current, "ignoring channel event");
            }
        }
    }
}

/// Drain channel events for one open until the channel drops its sender.
async fn handle_events(shared: Arc<Shared>, mut events: mpsc::UnboundedReceiver<ChannelEvent>) {
    while let Some(event) = events.recv().await {
        shared.on_channel_event(event).await;
    }
}

/// Owns one [`RemoteChannel`] and its reconnect/version/upgrade lifecycle.
///
/// Every remote call goes through [`ConnectionManager::invoke`] or
/// [`ConnectionManager::send`]; nothing else touches the channel.
#[derive(Debug)]
pub struct ConnectionManager<C: RemoteChannel> {
    channel: C,
    shared: Arc<Shared>,
    handler: Mutex<Option<JoinHandle<()>>>,
}

impl<C: RemoteChannel> ConnectionManager<C> {
    /// Create a disconnected manager around `channel`.
    #[must_use]
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            shared: Arc::new(Shared {
                state: RwLock::new(ConnectionState::Disconnected),
                connected: watch::Sender::new(false),
                upgrade: watch::Sender::new(None),
            }),
            handler: Mutex::new(None),
        }
    }

    /// Returns the owned channel.
    #[must_use]
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Returns the current connection state.
    pub async fn state(&self) -> ConnectionState {
        *self.shared.state.read().await
    }

    /// Whether the manager is connected right now.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        *self.shared.connected.borrow()
    }

    /// The server's update message, once an upgrade has been demanded.
    #[must_use]
    pub fn upgrade_message(&self) -> Option<String> {
        self.shared.upgrade.borrow().clone()
    }

    /// Subscribe to the de-duplicated `connected` signal.
    #[must_use]
    pub fn subscribe_connected(&self) -> watch::Receiver<bool> {
        self.shared.connected.subscribe()
    }

    /// Subscribe to the forced-upgrade signal.
    #[must_use]
    pub fn subscribe_upgrade(&self) -> watch::Receiver<Option<String>> {
        self.shared.upgrade.subscribe()
    }

    /// Open the connection.
    ///
    /// A no-op while connected or already attempting. A failed open is logged
    /// and leaves the manager disconnected; retrying is left to the caller and
    /// to the transport's own reconnect.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::ForcedUpgrade`] once the server has demanded
    /// an update, without touching the channel, and
    /// [`ConnectionError::ConnectFailed`] if the open fails.
    pub async fn enable(&self, config: &ConnectionConfig) -> Result<(), ConnectionError> {
        {
            let mut state = self.shared.state.write().await;
            if let Some(message) = self.upgrade_message() {
                warn!(%message, "refusing to connect, client update required");
                return Err(ConnectionError::ForcedUpgrade(message));
            }
            if *state != ConnectionState::Disconnected {
                debug!(state = %*state, "enable ignored");
                return Ok(());
            }
            self.shared.set(&mut state, ConnectionState::Connecting);
        }

        // A transport that gave up on its own may still hold its handle.
        self.release_channel().await;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        *self.handler.lock().await =
            Some(tokio::spawn(handle_events(Arc::clone(&self.shared), events_rx)));

        info!(url = %config.url(), "connecting to presence server");
        let opened = self.channel.open(config, events_tx).await;

        let mut state = self.shared.state.write().await;
        match opened {
            Ok(()) if *state == ConnectionState::Connecting => {
                self.shared.set(&mut state, ConnectionState::Connected);
                info!(url = %config.url(), "connected to presence server");
                Ok(())
            }
            Ok(()) => match self.upgrade_message() {
                // The server pushed an update demand while the open completed.
                Some(message) => Err(ConnectionError::ForcedUpgrade(message)),
                // Disabled while opening.
                None => {
                    debug!(state = %*state, "open completed after disable");
                    Ok(())
                }
            },
            Err(e) => {
                error!(url = %config.url(), error = %e, "failed to connect to presence server");
                if *state == ConnectionState::Connecting {
                    self.shared.set(&mut state, ConnectionState::Disconnected);
                }
                Err(ConnectionError::ConnectFailed(e))
            }
        }
    }

    /// Close the connection.
    ///
    /// A no-op while disconnected. Close failures are logged; the state is
    /// disconnected afterwards regardless. Also clears `UpgradeRequired` so an
    /// owner can shut down cleanly, though [`Self::enable`] keeps refusing.
    pub async fn disable(&self) {
        if *self.shared.state.read().await == ConnectionState::Disconnected {
            debug!("disable ignored, already disconnected");
            return;
        }

        info!("disconnecting from presence server");
        self.release_channel().await;

        let mut state = self.shared.state.write().await;
        self.shared.set(&mut state, ConnectionState::Disconnected);
    }

    /// Close the channel and stop the event handler of the previous open.
    async fn release_channel(&self) {
        if let Err(e) = self.channel.close().await {
            warn!(error = %e, "failed to close presence channel");
        }
        if let Some(handler) = self.handler.lock().await.take() {
            handler.abort();
        }
    }

    /// Fail with [`ConnectionError::NotConnected`] unless connected.
    async fn ensure_connected(&self, method: &str) -> Result<(), ConnectionError> {
        let state = *self.shared.state.read().await;
        if state == ConnectionState::Connected {
            Ok(())
        } else {
            debug!(method, state = %state, "remote call rejected, not connected");
            Err(ConnectionError::NotConnected)
        }
    }

    /// Invoke a remote method and decode its result.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::NotConnected`] unless connected, and
    /// [`ConnectionError::RemoteCallFailed`] on transport or codec failure.
    pub async fn invoke<A, T>(&self, method: &str, args: &A) -> Result<T, ConnectionError>
    where
        A: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.ensure_connected(method).await?;
        let failed = |cause: NetError| {
            error!(method, error = %cause, "remote call failed");
            ConnectionError::RemoteCallFailed {
                method: method.to_string(),
                cause,
            }
        };

        debug!(method, "invoking remote method");
        let payload = codec::encode(args).map_err(failed)?;
        let reply = self.channel.call(method, payload).await.map_err(failed)?;
        codec::decode(&reply).map_err(failed)
    }

    /// Invoke a remote method without waiting for a result.
    ///
    /// # Errors
    ///
    /// Same as [`Self::invoke`].
    pub async fn send<A>(&self, method: &str, args: &A) -> Result<(), ConnectionError>
    where
        A: Serialize + ?Sized,
    {
        self.ensure_connected(method).await?;
        let failed = |cause: NetError| {
            error!(method, error = %cause, "remote call failed");
            ConnectionError::RemoteCallFailed {
                method: method.to_string(),
                cause,
            }
        };

        debug!(method, "sending remote method");
        let payload = codec::encode(args).map_err(failed)?;
        self.channel.send(method, payload).await.map_err(failed)
    }
}
