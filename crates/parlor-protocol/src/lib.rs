//! Wire protocol for Parlor.
//!
//! This crate defines what hosts and clients say to the relay and what the
//! relay says back:
//!
//! - **Requests** ([`ClientRequest`]): inbound `{ "type", "data" }`
//!   envelopes, classified by type and validated field by field.
//! - **Events** ([`ServerEvent`]): outbound `{ "type", ...fields }`
//!   messages.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages are
//!   converted to and from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong while doing so.
//!
//! The protocol layer knows nothing about rooms or connections. It only
//! turns bytes into typed values and back.
//!
//! ```text
//! Transport (bytes) → Protocol (ClientRequest) → Router (rooms, roles)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{ClientRequest, Envelope, RoomId, ServerEvent};
