//! # sonar_client
//!
//! Core of the presence-sharing client.
//!
//! This crate provides:
//!
//! - [`manager`] — the connection lifecycle manager and its `connected` signal.
//! - [`engine`] — the presence broadcast engine.
//! - [`eligibility`] — the eligibility policy.
//! - [`snapshot`] — actor/game data collaborators and the per-tick snapshot.
//! - [`settings`] — observable client settings.
//! - [`supervisor`] — runs the engine while the client is enabled.
//! - [`queries`] — typed read-only queries.
//! - [`counts`] — the per-world count tree.
//! - [`status`], [`notice`] — user-facing status text and notices.
//! - [`tables`] — in-memory game tables.
//! - [`error`] — client error types.

pub mod counts;
pub mod eligibility;
pub mod engine;
pub mod error;
pub mod manager;
pub mod notice;
pub mod queries;
pub mod settings;
pub mod snapshot;
pub mod status;
pub mod supervisor;
pub mod tables;

#[cfg(test)]
mod test_support;

pub use engine::{BroadcastConfig, BroadcastEngine, BroadcastState, EngineInputs};
pub use error::ConnectionError;
pub use manager::{ConnectionManager, ConnectionState};
pub use notice::PresenceNotice;
pub use settings::Settings;
pub use snapshot::{ActorSource, ActorState, EligibilitySnapshot, GameData};
pub use supervisor::Supervisor;
pub use tables::GameTables;
