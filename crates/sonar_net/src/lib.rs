//! # sonar_net
//!
//! Transport layer for the presence-sharing client.
//!
//! This crate provides:
//!
//! - [`channel`] — the [`RemoteChannel`] abstraction the lifecycle manager owns.
//! - [`connection`] — the NATS-backed channel implementation.
//! - [`config`] — endpoint, hub path and api version for one connection.
//! - [`methods`] — remote method names, subject builders and header keys.
//! - [`messages`] — positional argument and result payloads.
//! - [`codec`] — MessagePack serialisation/deserialisation helpers.
//! - [`error`] — Transport error types.

pub mod channel;
pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod messages;
pub mod methods;

pub use channel::{ChannelEvent, RemoteChannel};
pub use codec::{decode, encode};
pub use config::ConnectionConfig;
pub use connection::NatsChannel;
pub use error::NetError;
