//! User-facing notices emitted by the broadcast engine.

use std::fmt;

/// A transition the user should be told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceNotice {
    /// Presence went from idle to broadcasting.
    SharingStarted { world_id: u32, map_id: String },
    /// Presence went from broadcasting to idle.
    SharingStopped,
    /// The server demanded a client update; sharing is off until restart.
    UpgradeRequired { message: String },
}

impl fmt::Display for PresenceNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SharingStarted { .. } => f.write_str("Now sharing your location for RP"),
            Self::SharingStopped => f.write_str("No longer sharing your location"),
            Self::UpgradeRequired { message } => {
                write!(f, "A client update is required ({message}); sharing is disabled")
            }
        }
    }
}
