//! Entity and client identifiers, plus entity id allocation.
//!
//! An [`EntityId`] is a lightweight signed 64-bit identifier with no inherent
//! data. It travels on the wire as a little-endian `i64`.

use serde::{Deserialize, Serialize};

/// A unique entity identifier.
///
/// Entities are pure identifiers; they carry no data of their own. Components
/// are attached to entities to give them meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub i64);

impl EntityId {
    /// The null / invalid entity sentinel.
    pub const INVALID: EntityId = EntityId(0);

    /// Create an entity id from a raw `i64`.
    #[must_use]
    pub const fn from_raw(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw `i64` identifier.
    #[must_use]
    pub const fn id(self) -> i64 {
        self.0
    }

    /// Returns `true` if this is a valid (non-zero) entity.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// Identifier of a connected client, assigned by the connection manager in
/// connection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(pub u32);

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Client({})", self.0)
    }
}

/// Allocates monotonically increasing entity ids.
///
/// Ids start at 1 (0 is reserved for [`EntityId::INVALID`]). Ids that were
/// claimed explicitly through [`EntityAllocator::reserve`] are never handed
/// out again.
#[derive(Debug)]
pub struct EntityAllocator {
    next_id: i64,
}

impl EntityAllocator {
    /// Creates a new allocator.
    #[must_use]
    pub fn new() -> Self {
        Self { next_id: 1 }
    }

    /// Allocates a fresh entity id.
    pub fn allocate(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        EntityId(id)
    }

    /// Marks an externally chosen id as used so later allocations skip it.
    pub fn reserve(&mut self, id: EntityId) {
        if id.0 >= self.next_id {
            self.next_id = id.0 + 1;
        }
    }

    /// Returns the next id that [`EntityAllocator::allocate`] would produce.
    #[must_use]
    pub fn peek(&self) -> EntityId {
        EntityId(self.next_id)
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}
