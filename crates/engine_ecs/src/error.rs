//! World error types.

use engine_component::{ClientId, ComponentKey, EntityId, FieldId, ValueKind};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum WorldError {
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),
    #[error("entity {0} already exists")]
    EntityExists(EntityId),
    #[error("unknown component type '{0}'")]
    UnknownComponentType(String),
    #[error("component {0} does not exist")]
    UnknownComponent(ComponentKey),
    #[error("component {0} already exists")]
    ComponentExists(ComponentKey),
    #[error("component {key} has no field {field:?}")]
    UnknownField { key: ComponentKey, field: FieldId },
    #[error("field {field:?} of {key} holds {expected:?}, got {found:?}")]
    FieldKindMismatch {
        key: ComponentKey,
        field: FieldId,
        expected: ValueKind,
        found: ValueKind,
    },
    #[error("{client} does not hold authority over {key} (owner: {owner:?})")]
    AuthorityViolation {
        key: ComponentKey,
        client: ClientId,
        owner: Option<ClientId>,
    },
    #[error("a system is already registered for component type '{0}'")]
    SystemExists(String),
}
