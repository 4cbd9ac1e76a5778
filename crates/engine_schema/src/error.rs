//! Schema error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid schema json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("duplicate component type: {0}")]
    DuplicateType(String),
    #[error("component type '{name}' hashes to the same id as '{existing}'")]
    TypeIdCollision { name: String, existing: String },
    #[error("duplicate field '{field}' in component type '{component}'")]
    DuplicateField { component: String, field: String },
    #[error("field '{component}.{field}' depends on unknown component type '{target}'")]
    UnknownDependency {
        component: String,
        field: String,
        target: String,
    },
    #[error("field '{component}.{field}' declares a dependency but does not hold entity ids")]
    DependencyKind { component: String, field: String },
}
