//! # engine_ecs
//!
//! The entity/component world and its dependency graph.
//!
//! Components are instances of schema types. Dependency fields name other
//! components by entity id; the [`World`] tracks those edges in reverse and
//! uses them to order activation, deactivation and live updates. Behaviour is
//! attached per type through [`ComponentSystem`].

pub mod component;
pub mod dependency;
pub mod error;
pub mod event;
pub mod system;
pub mod world;

pub use component::{Component, ComponentStore, Entity, SystemData};
pub use dependency::{DependencyEdge, ReverseIndex};
pub use error::WorldError;
pub use event::WorldEvent;
pub use system::ComponentSystem;
pub use world::World;
