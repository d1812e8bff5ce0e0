//! NATS-backed [`RemoteChannel`].
//!
//! The server address is used as the NATS URL and the hub path becomes the
//! subject prefix. Calls with a result use request/reply, fire-and-forget
//! calls publish. Every message carries the api version and the session
//! identity in its headers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_nats::{ConnectOptions, Event, HeaderMap};
use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::channel::{ChannelEvent, RemoteChannel};
use crate::config::ConnectionConfig;
use crate::error::NetError;
use crate::methods::{self, headers};

/// Default number of reconnect attempts before the transport gives up.
pub const DEFAULT_MAX_RECONNECTS: usize = 60;

/// Client name reported to the NATS server.
const CLIENT_NAME: &str = "sonar";

/// State held while the channel is open.
#[derive(Debug)]
struct OpenChannel {
    client: async_nats::Client,
    prefix: String,
    headers: HeaderMap,
    push_task: JoinHandle<()>,
}

/// A [`RemoteChannel`] over an `async-nats` client.
#[derive(Debug)]
pub struct NatsChannel {
    /// Opaque identity the server keys this client's location record by.
    session: String,
    /// Reconnect budget handed to the transport on every open.
    max_reconnects: usize,
    open: Mutex<Option<OpenChannel>>,
}

impl Default for NatsChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl NatsChannel {
    /// Create a closed channel with a fresh session identity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            session: Uuid::new_v4().to_string(),
            max_reconnects: DEFAULT_MAX_RECONNECTS,
            open: Mutex::new(None),
        }
    }

    /// Override the reconnect budget.
    #[must_use]
    pub fn with_max_reconnects(mut self, max_reconnects: usize) -> Self {
        self.max_reconnects = max_reconnects;
        self
    }

    /// Returns the session identity.
    #[must_use]
    pub fn session(&self) -> &str {
        &self.session
    }

    /// Clone what a call needs out of the lock so calls do not serialise on it.
    async fn target(&self) -> Result<(async_nats::Client, String, HeaderMap), NetError> {
        let guard = self.open.lock().await;
        let open = guard.as_ref().ok_or(NetError::NotOpen)?;
        Ok((open.client.clone(), open.prefix.clone(), open.headers.clone()))
    }
}

/// Map NATS transport events onto channel events.
///
/// The first `Connected` belongs to the initial open and is not reported.
fn translate(event: Event, dropped: &AtomicBool) -> Option<ChannelEvent> {
    match event {
        Event::Disconnected => {
            dropped.store(true, Ordering::SeqCst);
            Some(ChannelEvent::Reconnecting)
        }
        Event::Connected => dropped
            .swap(false, Ordering::SeqCst)
            .then_some(ChannelEvent::Reconnected),
        Event::ClientError(async_nats::ClientError::MaxReconnects) => Some(ChannelEvent::Closed),
        other => {
            debug!(event = ?other, "ignoring transport event");
            None
        }
    }
}

/// Forward server pushes to the event channel until the subscriptions end.
async fn forward_pushes(
    subscriber: async_nats::Subscriber,
    broadcast: async_nats::Subscriber,
    events: mpsc::UnboundedSender<ChannelEvent>,
) {
    let mut pushes = futures::stream::select(subscriber, broadcast);
    while let Some(message) = pushes.next().await {
        let Some(method) = message
            .headers
            .as_ref()
            .and_then(|h| h.get(headers::MSG_TYPE))
            .map(|v| v.as_str().to_string())
        else {
            warn!(subject = %message.subject, "server push without msg-type header");
            continue;
        };

        match crate::codec::decode::<String>(message.payload.as_ref()) {
            Ok(text) => {
                debug!(method, "server push received");
                if events
                    .send(ChannelEvent::ServerPush {
                        method,
                        message: text,
                    })
                    .is_err()
                {
                    break;
                }
            }
            Err(e) => warn!(method, error = %e, "undecodable server push"),
        }
    }
}

#[async_trait]
impl RemoteChannel for NatsChannel {
    async fn open(
        &self,
        config: &ConnectionConfig,
        events: mpsc::UnboundedSender<ChannelEvent>,
    ) -> Result<(), NetError> {
        let mut guard = self.open.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        info!(url = %config.url(), session = %self.session, "opening presence channel");

        let dropped = Arc::new(AtomicBool::new(false));
        let transport_events = events.clone();
        let client = ConnectOptions::new()
            .name(CLIENT_NAME)
            .max_reconnects(self.max_reconnects)
            .event_callback(move |event| {
                let events = transport_events.clone();
                let dropped = Arc::clone(&dropped);
                async move {
                    if let Some(event) = translate(event, &dropped) {
                        let _ = events.send(event);
                    }
                }
            })
            .connect(config.server_address.as_str())
            .await?;

        let prefix = config.subject_prefix();
        let subscriber = client
            .subscribe(methods::session_push_subject(&prefix, &self.session))
            .await?;
        let broadcast = client
            .subscribe(methods::broadcast_push_subject(&prefix))
            .await?;
        let push_task = tokio::spawn(forward_pushes(subscriber, broadcast, events));

        let mut header_map = HeaderMap::new();
        header_map.insert(headers::VERSION, config.api_version.as_str());
        header_map.insert(headers::SESSION, self.session.as_str());

        *guard = Some(OpenChannel {
            client,
            prefix,
            headers: header_map,
            push_task,
        });
        info!("presence channel open");
        Ok(())
    }

    async fn close(&self) -> Result<(), NetError> {
        let Some(open) = self.open.lock().await.take() else {
            return Ok(());
        };
        open.push_task.abort();
        open.client.flush().await?;
        info!("presence channel closed");
        Ok(())
    }

    async fn call(&self, method: &str, args: Vec<u8>) -> Result<Vec<u8>, NetError> {
        let (client, prefix, header_map) = self.target().await?;
        let reply = client
            .request_with_headers(
                methods::method_subject(&prefix, method),
                header_map,
                args.into(),
            )
            .await?;
        Ok(reply.payload.to_vec())
    }

    async fn send(&self, method: &str, args: Vec<u8>) -> Result<(), NetError> {
        let (client, prefix, header_map) = self.target().await?;
        client
            .publish_with_headers(
                methods::method_subject(&prefix, method),
                header_map,
                args.into(),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sessions_are_unique() {
        let a = NatsChannel::new();
        let b = NatsChannel::new();
        assert_ne!(a.session(), b.session());
    }

    #[test]
    fn test_translate_reconnect_cycle() {
        let dropped = AtomicBool::new(false);
        assert_eq!(translate(Event::Connected, &dropped), None);
        assert_eq!(
            translate(Event::Disconnected, &dropped),
            Some(ChannelEvent::Reconnecting)
        );
        assert_eq!(
            translate(Event::Connected, &dropped),
            Some(ChannelEvent::Reconnected)
        );
        assert_eq!(translate(Event::Connected, &dropped), None);
    }

    #[test]
    fn test_translate_gave_up() {
        let dropped = AtomicBool::new(true);
        assert_eq!(
            translate(
                Event::ClientError(async_nats::ClientError::MaxReconnects),
                &dropped
            ),
            Some(ChannelEvent::Closed)
        );
    }

    #[tokio::test]
    async fn test_calls_before_open_fail() {
        let channel = NatsChannel::new();
        let err = channel.send("RemoveLocation", vec![0x90]).await.unwrap_err();
        assert!(matches!(err, NetError::NotOpen));
        let err = channel.call("GetWorldMapCounts", vec![0x90]).await.unwrap_err();
        assert!(matches!(err, NetError::NotOpen));
    }

    #[tokio::test]
    async fn test_close_without_open_is_noop() {
        let channel = NatsChannel::new();
        channel.close().await.unwrap();
    }
}
