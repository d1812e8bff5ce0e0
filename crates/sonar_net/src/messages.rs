//! Argument and result payloads.
//!
//! Arguments are positional on the wire; `rmp-serde` writes structs in array
//! form, so field order here is the argument order.

use serde::{Deserialize, Serialize};

/// Arguments of `PublishLocation(worldId, mapId, x, z)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationUpdate {
    /// The world the actor is on.
    pub world_id: u32,
    /// The map the actor is standing on.
    pub map_id: String,
    /// Map-adjusted x coordinate.
    pub x: f64,
    /// Map-adjusted z coordinate.
    pub z: f64,
}

/// Arguments of `GetPlayersInWorldMap(worldId, mapId)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldMapQuery {
    /// The world to query.
    pub world_id: u32,
    /// The map to query.
    pub map_id: String,
}

/// One broadcasting position returned by `GetPlayersInWorldMap`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerPosition {
    /// Map-adjusted x coordinate.
    pub x: f64,
    /// Map-adjusted z coordinate.
    pub z: f64,
}

/// Arguments of calls that take none; encodes as an empty array.
pub const NO_ARGS: [u8; 0] = [];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_list_decodes_from_pairs() {
        let bytes = rmp_serde::to_vec(&vec![(1.0f64, 2.0f64), (3.5, -4.0)]).unwrap();
        let markers: Vec<MarkerPosition> = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[1], MarkerPosition { x: 3.5, z: -4.0 });
    }

    #[test]
    fn test_no_args_is_empty_array() {
        let bytes = rmp_serde::to_vec(&NO_ARGS).unwrap();
        assert_eq!(bytes, vec![0x90]);
    }
}
