//! Mutation records produced by the world.
//!
//! The world appends one [`WorldEvent`] per observable change, in the order the
//! changes happen (cascades included). Consumers drain them with
//! [`World::drain_events`](crate::World::drain_events).

use engine_component::{ClientId, ComponentKey, EntityId, FieldId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorldEvent {
    EntityAdded(EntityId),
    EntityRemoved(EntityId),
    ComponentAdded(ComponentKey),
    /// A field was written. `source` is the client whose update was applied,
    /// or `None` for server-side writes.
    ComponentUpdated {
        key: ComponentKey,
        field: FieldId,
        source: Option<ClientId>,
    },
    ComponentRemoved(ComponentKey),
    /// Activation and authority changes are server-local state. Replication
    /// does not forward them (client activation and delegation are driven
    /// explicitly); they are recorded for embedders that observe the world.
    ComponentActivated(ComponentKey),
    ComponentDeactivated(ComponentKey),
    AuthorityChanged {
        key: ComponentKey,
        owner: Option<ClientId>,
    },
}
