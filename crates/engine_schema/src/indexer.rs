//! Bijective mapping between component types and their compact wire index.

use std::collections::HashMap;

use engine_component::ComponentTypeId;

use crate::schema::Schema;

/// Assigns each registered component type a dense `u32` index.
///
/// Both ends of a connection must register the same types in the same order;
/// [`ComponentTypeIndexer::from_schema`] does this from schema order.
#[derive(Debug, Clone, Default)]
pub struct ComponentTypeIndexer {
    /// `names[i]` and `types[i]` describe wire index `i`.
    names: Vec<String>,
    types: Vec<ComponentTypeId>,
    index: HashMap<ComponentTypeId, u32>,
}

impl ComponentTypeIndexer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every type of `schema`, in registration order.
    #[must_use]
    pub fn from_schema(schema: &Schema) -> Self {
        let mut indexer = Self::new();
        for ty in schema.iter() {
            indexer.register(&ty.name);
        }
        indexer
    }

    /// Register a type name and return its index. Registering the same name
    /// twice returns the original index.
    pub fn register(&mut self, name: &str) -> u32 {
        let type_id = ComponentTypeId::from_name(name);
        if let Some(&idx) = self.index.get(&type_id) {
            return idx;
        }
        let idx = self.types.len() as u32;
        self.names.push(name.to_string());
        self.types.push(type_id);
        self.index.insert(type_id, idx);
        idx
    }

    #[must_use]
    pub fn index_of(&self, type_id: ComponentTypeId) -> Option<u32> {
        self.index.get(&type_id).copied()
    }

    #[must_use]
    pub fn type_at(&self, index: u32) -> Option<ComponentTypeId> {
        self.types.get(index as usize).copied()
    }

    #[must_use]
    pub fn name_of(&self, type_id: ComponentTypeId) -> Option<&str> {
        self.index_of(type_id)
            .map(|idx| self.names[idx as usize].as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ComponentType;

    #[test]
    fn test_register_is_idempotent() {
        let mut indexer = ComponentTypeIndexer::new();
        assert_eq!(indexer.register("position"), 0);
        assert_eq!(indexer.register("client"), 1);
        assert_eq!(indexer.register("position"), 0);
        assert_eq!(indexer.len(), 2);
    }

    #[test]
    fn test_lookup_both_directions() {
        let mut indexer = ComponentTypeIndexer::new();
        indexer.register("position");
        indexer.register("client");

        let client = ComponentTypeId::from_name("client");
        assert_eq!(indexer.index_of(client), Some(1));
        assert_eq!(indexer.type_at(1), Some(client));
        assert_eq!(indexer.name_of(client), Some("client"));
        assert_eq!(indexer.type_at(2), None);
        assert_eq!(indexer.index_of(ComponentTypeId::from_name("light")), None);
    }

    #[test]
    fn test_from_schema_uses_registration_order() {
        let mut schema = Schema::new();
        schema.register(ComponentType::new("b", vec![])).unwrap();
        schema.register(ComponentType::new("a", vec![])).unwrap();

        let indexer = ComponentTypeIndexer::from_schema(&schema);
        assert_eq!(indexer.index_of(ComponentTypeId::from_name("b")), Some(0));
        assert_eq!(indexer.index_of(ComponentTypeId::from_name("a")), Some(1));
    }
}
