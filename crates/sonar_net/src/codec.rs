//! MessagePack codec helpers.
//!
//! Thin wrappers around `rmp-serde`. Call arguments are positional, so
//! structs are written in the compact array form.

use serde::{Deserialize, Serialize};

use crate::error::NetError;

/// Encode a value to MessagePack bytes.
///
/// # Errors
///
/// Returns [`NetError::Encode`] if serialisation fails.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, NetError> {
    rmp_serde::to_vec(value).map_err(NetError::Encode)
}

/// Decode a value from MessagePack bytes.
///
/// # Errors
///
/// Returns [`NetError::Decode`] if deserialisation fails.
pub fn decode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, NetError> {
    rmp_serde::from_slice(bytes).map_err(NetError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::LocationUpdate;

    #[test]
    fn test_location_update_is_positional() {
        let update = LocationUpdate {
            world_id: 21,
            map_id: "s1f1".to_string(),
            x: 1.5,
            z: -3.0,
        };
        let bytes = encode(&update).unwrap();
        // Array form: decodable as a plain tuple of the four arguments.
        let (world_id, map_id, x, z): (u32, String, f64, f64) = decode(&bytes).unwrap();
        assert_eq!(world_id, 21);
        assert_eq!(map_id, "s1f1");
        assert!((x - 1.5).abs() < f64::EPSILON);
        assert!((z + 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_decode_invalid_bytes() {
        let result: Result<LocationUpdate, _> = decode(&[0xFF, 0xFF]);
        assert!(matches!(result, Err(NetError::Decode(_))));
    }
}
