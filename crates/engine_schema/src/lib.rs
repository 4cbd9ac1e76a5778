//! # engine_schema
//!
//! The static catalog of component types and the indexer that names them on
//! the wire.

pub mod error;
pub mod indexer;
pub mod schema;

pub use error::SchemaError;
pub use indexer::ComponentTypeIndexer;
pub use schema::{ComponentType, FieldDef, Schema};
