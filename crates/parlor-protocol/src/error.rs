//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding wire messages.
///
/// The relay cares about one distinction in particular: a well-formed
/// envelope whose `type` it does not know ([`UnknownType`]) is reported
/// differently from everything else, which is a format error.
///
/// [`UnknownType`]: ProtocolError::UnknownType
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing fields, or fields
    /// of the wrong type.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The JSON parsed, but its `type` is missing, not a string, or not a
    /// request we handle.
    #[error("unknown message type: {0}")]
    UnknownType(String),

    /// The envelope parsed, but breaks a protocol rule (e.g. a request
    /// that needs `data` arrived without it).
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

impl ProtocolError {
    /// Returns `true` if the envelope was readable but named an unknown type.
    pub fn is_unknown_type(&self) -> bool {
        matches!(self, Self::UnknownType(_))
    }
}
