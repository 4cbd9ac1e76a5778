//! # engine_component
//!
//! Identifiers and values shared by every layer of the view replication
//! engine.
//!
//! This crate provides:
//!
//! - [`EntityId`] and [`EntityAllocator`]: entity identity.
//! - [`ClientId`]: identity of a connected peer.
//! - [`ComponentTypeId`], [`FieldId`], [`ComponentKey`]: component addressing.
//! - [`FieldValue`] and [`ValueKind`]: the typed values stored in fields.

pub mod component;
pub mod entity;
pub mod value;

pub use component::{ComponentKey, ComponentTypeId, FieldId};
pub use entity::{ClientId, EntityAllocator, EntityId};
pub use value::{FieldValue, ValueKind};
