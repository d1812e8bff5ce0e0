//! Client error types.

use sonar_net::NetError;

/// Errors surfaced by the connection lifecycle manager and its callers.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The transport could not be opened. The manager stays disconnected.
    #[error("failed to connect: {0}")]
    ConnectFailed(#[source] NetError),

    /// A remote method was invoked while not connected.
    #[error("not connected")]
    NotConnected,

    /// A remote call failed in transport or serialisation.
    #[error("remote call {method} failed: {cause}")]
    RemoteCallFailed {
        /// The remote method.
        method: String,
        /// The transport error.
        #[source]
        cause: NetError,
    },

    /// A remote call did not complete within its time budget.
    #[error("remote call {method} timed out")]
    Timeout {
        /// The remote method.
        method: String,
    },

    /// The server demanded a client update. Fatal for this manager.
    #[error("client update required: {0}")]
    ForcedUpgrade(String),
}
