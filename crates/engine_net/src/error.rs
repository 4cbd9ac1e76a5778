//! Network-layer error types.

use engine_component::ComponentTypeId;

/// Errors produced while encoding or decoding the op stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The input ended before the op was complete.
    #[error("unexpected end of input: needed {needed} more bytes")]
    UnexpectedEof { needed: usize },

    /// The leading op tag is out of range.
    #[error("unknown op tag {0}")]
    UnknownOpTag(u8),

    /// A value tag is out of range.
    #[error("unknown value tag {0}")]
    UnknownValueTag(u8),

    /// The component type has no wire index.
    #[error("component type {0} is not registered with the indexer")]
    UnregisteredType(ComponentTypeId),

    /// The wire index does not name a registered type.
    #[error("unknown component type index {0}")]
    UnknownTypeIndex(u32),

    /// A string payload is not valid UTF-8.
    #[error("string payload is not valid UTF-8")]
    InvalidUtf8,

    /// A whole-message decode left bytes unread.
    #[error("{0} trailing bytes after op")]
    TrailingBytes(usize),
}

/// Errors that can occur in a network transport.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// Failed to encode a control message to MessagePack.
    #[error("failed to encode message: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// Failed to decode a control message from MessagePack.
    #[error("failed to decode message: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// NATS subscription error.
    #[error("NATS subscribe error: {0}")]
    Subscribe(#[from] async_nats::SubscribeError),

    /// NATS connection error.
    #[error("NATS connection error: {0}")]
    Connect(#[from] async_nats::ConnectError),
}
