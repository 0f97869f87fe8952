//! Codec trait and the JSON implementation.
//!
//! A codec converts between Rust values and raw bytes. The handler and the
//! writer task only depend on the [`Codec`] trait, so the wire format can
//! change without touching routing code.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes Rust values to bytes and decodes bytes back.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// connection task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or do not
    /// match the expected shape.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// Browser clients speak JSON text frames, so this is the only codec the
/// relay ships with.
///
/// ## Example
///
/// ```rust
/// use parlor_protocol::{Codec, JsonCodec, RoomId, ServerEvent};
///
/// let codec = JsonCodec;
/// let event = ServerEvent::RoomCreated { room_id: RoomId::new("QWERT") };
///
/// let bytes = codec.encode(&event).unwrap();
/// assert_eq!(bytes, br#"{"type":"roomCreated","roomId":"QWERT"}"#);
///
/// let decoded: ServerEvent = codec.decode(&bytes).unwrap();
/// assert_eq!(decoded, event);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_codec_encode_produces_compact_json() {
        let bytes = JsonCodec.encode(&json!({ "type": "leaveRoom" })).unwrap();
        assert_eq!(bytes, br#"{"type":"leaveRoom"}"#);
    }

    #[test]
    fn test_json_codec_decode_rejects_garbage() {
        let result: Result<serde_json::Value, _> = JsonCodec.decode(b"{not json");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
