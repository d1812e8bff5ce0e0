//! The remote channel abstraction.
//!
//! A [`RemoteChannel`] is a persistent RPC connection to the presence
//! service. It is owned by exactly one lifecycle manager, which opens and
//! closes it and reacts to the [`ChannelEvent`]s it reports.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::config::ConnectionConfig;
use crate::error::NetError;

/// Transport-level notifications delivered while a channel is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The transport is closed for good (remote close or reconnects exhausted).
    Closed,
    /// The transport lost its connection and is retrying.
    Reconnecting,
    /// The transport re-established its connection after [`Self::Reconnecting`].
    Reconnected,
    /// The server invoked a client method.
    ServerPush {
        /// The pushed method name, e.g. `UpdateClient`.
        method: String,
        /// The pushed message.
        message: String,
    },
}

/// A bidirectional RPC channel.
///
/// Arguments and results cross this boundary already encoded; see
/// [`crate::codec`].
#[async_trait]
pub trait RemoteChannel: Send + Sync + 'static {
    /// Open the channel. Transport events for this open are sent on `events`
    /// until the channel is closed.
    async fn open(
        &self,
        config: &ConnectionConfig,
        events: mpsc::UnboundedSender<ChannelEvent>,
    ) -> Result<(), NetError>;

    /// Close the channel. Pending fire-and-forget calls are flushed first.
    async fn close(&self) -> Result<(), NetError>;

    /// Invoke a remote method and wait for its encoded result.
    async fn call(&self, method: &str, args: Vec<u8>) -> Result<Vec<u8>, NetError>;

    /// Invoke a remote method without waiting for a result.
    async fn send(&self, method: &str, args: Vec<u8>) -> Result<(), NetError>;
}
