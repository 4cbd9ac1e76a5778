//! Field values.
//!
//! A field is either unset (`Option::None` wherever a value is stored) or holds
//! exactly one [`FieldValue`]. Unset is distinct from every zero value.

use glam::{Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::entity::EntityId;

/// The declared kind of a field, and the kind carried by a [`FieldValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Int,
    Float,
    Bool,
    String,
    Bytes,
    Vec2,
    Vec3,
    Vec4,
    Entity,
    EntityArray,
}

impl ValueKind {
    /// Returns `true` for kinds that can name dependency targets.
    #[must_use]
    pub const fn is_entity_ref(self) -> bool {
        matches!(self, Self::Entity | Self::EntityArray)
    }
}

/// A single field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Int(i32),
    Float(f32),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Entity(EntityId),
    EntityArray(Vec<EntityId>),
}

impl FieldValue {
    /// The kind of this value.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Bool(_) => ValueKind::Bool,
            Self::String(_) => ValueKind::String,
            Self::Bytes(_) => ValueKind::Bytes,
            Self::Vec2(_) => ValueKind::Vec2,
            Self::Vec3(_) => ValueKind::Vec3,
            Self::Vec4(_) => ValueKind::Vec4,
            Self::Entity(_) => ValueKind::Entity,
            Self::EntityArray(_) => ValueKind::EntityArray,
        }
    }

    /// The entities this value refers to. Empty for non-entity kinds.
    #[must_use]
    pub fn entity_refs(&self) -> &[EntityId] {
        match self {
            Self::Entity(id) => std::slice::from_ref(id),
            Self::EntityArray(ids) => ids,
            _ => &[],
        }
    }
}
