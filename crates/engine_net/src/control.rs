//! NATS control-plane messages.
//!
//! Connect and disconnect notices travel as MessagePack. The op stream itself
//! uses the fixed binary layout in [`crate::op`].

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::NetError;

/// A client announces itself on [`crate::subjects::connect`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectRequest {
    /// Identifies the client's up/down subjects.
    pub client: Uuid,
}

/// A client leaves on [`crate::subjects::disconnect`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisconnectNotice {
    pub client: Uuid,
    #[serde(default)]
    pub reason: String,
}

/// Encode a value to MessagePack bytes.
///
/// # Errors
///
/// Returns [`NetError::Encode`] if serialisation fails.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, NetError> {
    rmp_serde::to_vec_named(value).map_err(NetError::Encode)
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

    #[test]
    fn test_disconnect_notice_reads_back() {
        let notice = DisconnectNotice {
            client: Uuid::new_v4(),
            reason: "quit".to_string(),
        };
        let bytes = encode(&notice).unwrap();
        let restored: DisconnectNotice = decode(&bytes).unwrap();
        assert_eq!(notice, restored);
    }

    #[test]
    fn test_decode_invalid_bytes() {
        let result: Result<ConnectRequest, _> = decode(&[0xFF, 0xFF]);
        assert!(matches!(result, Err(NetError::Decode(_))));
    }
}
