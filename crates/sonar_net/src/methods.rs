//! Remote method names and the NATS subject hierarchy.
//!
//! Every call is addressed as `{prefix}.{Method}` where the prefix is derived
//! from the hub path. Server pushes for this session arrive on
//! `{prefix}.client.{session}` and on the shared `{prefix}.client.all`.

// ── Client → server ─────────────────────────────────────────────────────────

/// Upsert this session's location record.
pub const PUBLISH_LOCATION: &str = "PublishLocation";

/// Delete this session's location record. Idempotent.
pub const REMOVE_LOCATION: &str = "RemoveLocation";

/// List broadcasting positions on one world map.
pub const GET_PLAYERS_IN_WORLD_MAP: &str = "GetPlayersInWorldMap";

/// Broadcaster counts keyed by `prefix:world:map`.
pub const GET_WORLD_MAP_COUNTS: &str = "GetWorldMapCounts";

/// Number of clients currently watching for presence.
pub const GET_CURRENT_WATCHING_FOR_RP_COUNT: &str = "GetCurrentWatchingForRpCount";

// ── Server → client ─────────────────────────────────────────────────────────

/// The server no longer accepts this client's api version.
pub const UPDATE_CLIENT: &str = "UpdateClient";

// ── Subject builders ────────────────────────────────────────────────────────

/// Build the subject for invoking a remote method.
///
/// `{prefix}.{method}`
#[must_use]
pub fn method_subject(prefix: &str, method: &str) -> String {
    format!("{prefix}.{method}")
}

/// Build the subject carrying pushes addressed to one session.
///
/// `{prefix}.client.{session}`
#[must_use]
pub fn session_push_subject(prefix: &str, session: &str) -> String {
    format!("{prefix}.client.{session}")
}

/// Build the subject carrying pushes addressed to every client.
///
/// `{prefix}.client.all`
#[must_use]
pub fn broadcast_push_subject(prefix: &str) -> String {
    format!("{prefix}.client.all")
}

/// Header keys carried on every message.
pub mod headers {
    /// The client api version.
    pub const VERSION: &str = "version";
    /// The opaque session identity the location record is keyed by.
    pub const SESSION: &str = "session";
    /// The pushed method name on server → client messages.
    pub const MSG_TYPE: &str = "msg-type";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_subject() {
        assert_eq!(
            method_subject("rpUtilsHub", PUBLISH_LOCATION),
            "rpUtilsHub.PublishLocation"
        );
    }

    #[test]
    fn test_push_subjects() {
        assert_eq!(
            session_push_subject("rpUtilsHub", "abc"),
            "rpUtilsHub.client.abc"
        );
        assert_eq!(broadcast_push_subject("rpUtilsHub"), "rpUtilsHub.client.all");
    }
}
