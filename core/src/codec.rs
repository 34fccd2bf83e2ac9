//! Binary framing for [`Message`] values exchanged between peers.

use thiserror::Error;

use crate::Message;

/// Errors raised while encoding or decoding a message.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The message could not be serialized.
    #[error("failed to encode message")]
    Encode(#[source] bincode::Error),
    /// The payload is not a valid message.
    #[error("failed to decode message")]
    Decode(#[source] bincode::Error),
}

/// Serializes a message into its wire representation.
pub fn encode(message: &Message) -> Result<Vec<u8>, CodecError> {
    bincode::serialize(message).map_err(CodecError::Encode)
}

/// Parses a message from its wire representation.
pub fn decode(bytes: &[u8]) -> Result<Message, CodecError> {
    bincode::deserialize(bytes).map_err(CodecError::Decode)
}
