//! Transport error types.

/// Errors that can occur while talking to the presence service.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// Failed to encode call arguments to MessagePack.
    #[error("failed to encode message: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// Failed to decode a reply or push payload from MessagePack.
    #[error("failed to decode message: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// The transport could not be opened.
    #[error("NATS connection error: {0}")]
    Connect(#[from] async_nats::ConnectError),

    /// A request/reply call failed or timed out at the transport.
    #[error("NATS request error: {0}")]
    Request(#[from] async_nats::RequestError),

    /// A fire-and-forget publish could not be queued.
    #[error("NATS publish error: {0}")]
    Publish(#[from] async_nats::PublishError),

    /// Subscribing to the server push subjects failed.
    #[error("NATS subscribe error: {0}")]
    Subscribe(#[from] async_nats::SubscribeError),

    /// Flushing pending publishes on close failed.
    #[error("NATS flush error: {0}")]
    Flush(#[from] async_nats::client::FlushError),

    /// The channel has not been opened, or has already been closed.
    #[error("channel is not open")]
    NotOpen,

    /// Any other transport failure.
    #[error("transport error: {0}")]
    Transport(String),
}
