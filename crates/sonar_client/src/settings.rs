//! Observable client settings.
//!
//! Each value is a `watch` channel. Setters only notify subscribers when the
//! value actually changes, so every subscriber sees edges, never repeats.

use sonar_net::ConnectionConfig;
use tokio::sync::watch;
use tracing::debug;

/// The settings surface the core consumes.
#[derive(Debug)]
pub struct Settings {
    client_enabled: watch::Sender<bool>,
    broadcast_enabled: watch::Sender<bool>,
    connection: watch::Sender<ConnectionConfig>,
}

/// Replace `value` and report whether it changed.
fn replace_if_changed<T: PartialEq>(sender: &watch::Sender<T>, value: T) -> bool {
    sender.send_if_modified(|current| {
        if *current == value {
            false
        } else {
            *current = value;
            true
        }
    })
}

impl Settings {
    /// Create settings with the given initial values.
    #[must_use]
    pub fn new(client_enabled: bool, broadcast_enabled: bool, connection: ConnectionConfig) -> Self {
        Self {
            client_enabled: watch::Sender::new(client_enabled),
            broadcast_enabled: watch::Sender::new(broadcast_enabled),
            connection: watch::Sender::new(connection),
        }
    }

    /// Whether the client (connection) is enabled.
    #[must_use]
    pub fn client_enabled(&self) -> bool {
        *self.client_enabled.borrow()
    }

    /// Whether presence broadcasting is enabled.
    #[must_use]
    pub fn broadcast_enabled(&self) -> bool {
        *self.broadcast_enabled.borrow()
    }

    /// The current connection config.
    #[must_use]
    pub fn connection(&self) -> ConnectionConfig {
        self.connection.borrow().clone()
    }

    /// Toggle the client. Returns `true` if the value changed.
    pub fn set_client_enabled(&self, enabled: bool) -> bool {
        let changed = replace_if_changed(&self.client_enabled, enabled);
        if changed {
            debug!(enabled, "client enabled changed");
        }
        changed
    }

    /// Toggle broadcasting. Returns `true` if the value changed.
    pub fn set_broadcast_enabled(&self, enabled: bool) -> bool {
        let changed = replace_if_changed(&self.broadcast_enabled, enabled);
        if changed {
            debug!(enabled, "broadcast enabled changed");
        }
        changed
    }

    /// Replace the connection config. Returns `true` if it changed.
    pub fn set_connection(&self, config: ConnectionConfig) -> bool {
        let changed = replace_if_changed(&self.connection, config);
        if changed {
            debug!("connection config changed");
        }
        changed
    }

    /// Subscribe to client enabled edges.
    #[must_use]
    pub fn subscribe_client_enabled(&self) -> watch::Receiver<bool> {
        self.client_enabled.subscribe()
    }

    /// Subscribe to broadcast enabled edges.
    #[must_use]
    pub fn subscribe_broadcast_enabled(&self) -> watch::Receiver<bool> {
        self.broadcast_enabled.subscribe()
    }

    /// Subscribe to connection config changes.
    #[must_use]
    pub fn subscribe_connection(&self) -> watch::Receiver<ConnectionConfig> {
        self.connection.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_value_does_not_notify() {
        let settings = Settings::new(false, false, ConnectionConfig::default());
        let mut rx = settings.subscribe_client_enabled();

        assert!(!settings.set_client_enabled(false));
        assert!(!rx.has_changed().unwrap());

        assert!(settings.set_client_enabled(true));
        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update());
    }

    #[test]
    fn test_connection_change_notifies_once() {
        let settings = Settings::new(true, true, ConnectionConfig::default());
        let mut rx = settings.subscribe_connection();

        let moved = ConnectionConfig::new("nats://elsewhere:4222");
        assert!(settings.set_connection(moved.clone()));
        assert!(!settings.set_connection(moved.clone()));
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), moved);
        assert!(!rx.has_changed().unwrap());
    }
}
