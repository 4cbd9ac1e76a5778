//! View-layer error types.

use engine_component::{ComponentKey, ComponentTypeId};
use engine_ecs::WorldError;
use engine_net::CodecError;

/// Errors raised while applying ops on the client side.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ReplicaError {
    #[error(transparent)]
    World(#[from] WorldError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("component type {0} is not in the local schema")]
    UnknownComponentType(ComponentTypeId),

    /// Local edits need authority delegated by the server.
    #[error("component {0} is not delegated to this client")]
    NotDelegated(ComponentKey),
}
