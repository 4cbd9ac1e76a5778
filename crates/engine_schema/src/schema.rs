//! Component type catalog: the static definitions the world validates
//! component storage and field updates against.
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use engine_component::{ComponentTypeId, FieldId, ValueKind};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SchemaError;

/// One field of a component type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub kind: ValueKind,
    /// Optional fields never block activation, even when they declare a
    /// dependency.
    #[serde(default)]
    pub optional: bool,
    /// Name of the component type this field's entity ids must resolve to.
    #[serde(default)]
    pub dependency: Option<String>,
}

impl FieldDef {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            optional: false,
            dependency: None,
        }
    }

    /// Mark the field as optional.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Declare that entity ids stored in this field refer to components of
    /// type `target` on those entities.
    #[must_use]
    pub fn depends_on(mut self, target: impl Into<String>) -> Self {
        self.dependency = Some(target.into());
        self
    }

    /// Returns `true` if the field holds a list of entity ids.
    #[must_use]
    pub fn is_array(&self) -> bool {
        self.kind == ValueKind::EntityArray
    }

    /// The dependency target's type id, if this is a dependency field.
    #[must_use]
    pub fn dependency_type(&self) -> Option<ComponentTypeId> {
        self.dependency
            .as_deref()
            .map(ComponentTypeId::from_name)
    }
}

/// The serialised form of a component type; the id is derived on load.
#[derive(Deserialize)]
struct ComponentTypeDef {
    name: String,
    #[serde(default)]
    fields: Vec<FieldDef>,
}

impl From<ComponentTypeDef> for ComponentType {
    fn from(def: ComponentTypeDef) -> Self {
        ComponentType::new(def.name, def.fields)
    }
}

/// A named, ordered list of fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ComponentTypeDef")]
pub struct ComponentType {
    #[serde(skip_serializing)]
    id: ComponentTypeId,
    pub name: String,
    pub fields: Vec<FieldDef>,
}

impl ComponentType {
    #[must_use]
    pub fn new(name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        let name = name.into();
        Self {
            id: ComponentTypeId::from_name(&name),
            name,
            fields,
        }
    }

    #[must_use]
    pub fn id(&self) -> ComponentTypeId {
        self.id
    }

    #[must_use]
    pub fn field(&self, id: FieldId) -> Option<&FieldDef> {
        self.fields.get(id.index())
    }

    /// Look a field up by name.
    #[must_use]
    pub fn field_id(&self, name: &str) -> Option<FieldId> {
        self.fields
            .iter()
            .position(|f| f.name == name)
            .map(|i| FieldId(i as u32))
    }

    /// Iterate fields with their ids, in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (FieldId, &FieldDef)> {
        self.fields
            .iter()
            .enumerate()
            .map(|(i, f)| (FieldId(i as u32), f))
    }

    /// Iterate the fields that declare a dependency, with their target type.
    pub fn dependency_fields(&self) -> impl Iterator<Item = (FieldId, &FieldDef, ComponentTypeId)> {
        self.fields()
            .filter_map(|(id, f)| f.dependency_type().map(|target| (id, f, target)))
    }
}

/// The catalog of all registered component types.
///
/// Built once at startup and then shared read-only (usually behind an `Arc`)
/// by the world, the type indexer and the view synchroniser.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    /// Types in registration order.
    types: Vec<Arc<ComponentType>>,
    by_id: HashMap<ComponentTypeId, usize>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON array of component types, register and validate them.
    pub fn from_json_str(source: &str) -> Result<Self, SchemaError> {
        let types: Vec<ComponentType> = serde_json::from_str(source)?;
        let mut schema = Self::new();
        for ty in types {
            schema.register(ty)?;
        }
        schema.validate()?;
        Ok(schema)
    }

    /// Load a JSON schema file.
    pub fn load_file(path: &Path) -> Result<Self, SchemaError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_json_str(&source)
    }

    /// Register a component type.
    pub fn register(&mut self, ty: ComponentType) -> Result<Arc<ComponentType>, SchemaError> {
        if let Some(&idx) = self.by_id.get(&ty.id()) {
            let existing = &self.types[idx].name;
            if *existing == ty.name {
                return Err(SchemaError::DuplicateType(ty.name));
            }
            return Err(SchemaError::TypeIdCollision {
                name: ty.name,
                existing: existing.clone(),
            });
        }
        for (i, field) in ty.fields.iter().enumerate() {
            if ty.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(SchemaError::DuplicateField {
                    component: ty.name.clone(),
                    field: field.name.clone(),
                });
            }
        }

        debug!(component = %ty.name, fields = ty.fields.len(), "registered component type");
        let ty = Arc::new(ty);
        self.by_id.insert(ty.id(), self.types.len());
        self.types.push(Arc::clone(&ty));
        Ok(ty)
    }

    #[must_use]
    pub fn get(&self, id: ComponentTypeId) -> Option<&Arc<ComponentType>> {
        self.by_id.get(&id).map(|&idx| &self.types[idx])
    }

    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&Arc<ComponentType>> {
        self.get(ComponentTypeId::from_name(name))
    }

    /// Iterate types in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ComponentType>> {
        self.types.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Check that every dependency names a registered type and is declared on
    /// a field that stores entity ids.
    ///
    /// Dependency cycles between types are allowed; the world breaks them at
    /// activation time.
    pub fn validate(&self) -> Result<(), SchemaError> {
        for ty in &self.types {
            for field in &ty.fields {
                let Some(target) = &field.dependency else {
                    continue;
                };
                if !field.kind.is_entity_ref() {
                    return Err(SchemaError::DependencyKind {
                        component: ty.name.clone(),
                        field: field.name.clone(),
                    });
                }
                if self.get_by_name(target).is_none() {
                    return Err(SchemaError::UnknownDependency {
                        component: ty.name.clone(),
                        field: field.name.clone(),
                        target: target.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
