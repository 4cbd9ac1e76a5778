//! Reverse dependency index.
//!
//! Dependency edges live in field values; this index answers the opposite
//! question: which components currently point at a given component. Entries
//! hold keys only, never references, so cycles in the graph own nothing.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use engine_component::{ComponentKey, FieldId};

/// One component field pointing at a target component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependencyEdge {
    pub source: ComponentKey,
    pub field: FieldId,
}

#[derive(Debug, Default)]
pub struct ReverseIndex {
    edges: HashMap<ComponentKey, BTreeSet<DependencyEdge>>,
}

impl ReverseIndex {
    pub fn insert(&mut self, target: ComponentKey, edge: DependencyEdge) {
        self.edges.entry(target).or_default().insert(edge);
    }

    pub fn remove(&mut self, target: ComponentKey, edge: DependencyEdge) {
        if let Some(set) = self.edges.get_mut(&target) {
            set.remove(&edge);
            if set.is_empty() {
                self.edges.remove(&target);
            }
        }
    }

    /// Edges pointing at `target`, ordered by source.
    pub fn edges(&self, target: ComponentKey) -> impl Iterator<Item = &DependencyEdge> {
        self.edges.get(&target).into_iter().flatten()
    }

    /// Distinct components pointing at `target`, each with the fields that
    /// point there.
    #[must_use]
    pub fn dependents(&self, target: ComponentKey) -> BTreeMap<ComponentKey, Vec<FieldId>> {
        let mut out: BTreeMap<ComponentKey, Vec<FieldId>> = BTreeMap::new();
        for edge in self.edges(target) {
            out.entry(edge.source).or_default().push(edge.field);
        }
        out
    }

    /// Number of targets with at least one incoming edge.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use engine_component::{ComponentTypeId, EntityId};

    use super::*;

    fn key(entity: i64, ty: &str) -> ComponentKey {
        ComponentKey::new(EntityId(entity), ComponentTypeId::from_name(ty))
    }

    #[test]
    fn test_dependents_group_fields_by_source() {
        let mut index = ReverseIndex::default();
        let target = key(1, "position");
        index.insert(target, DependencyEdge { source: key(2, "client"), field: FieldId(0) });
        index.insert(target, DependencyEdge { source: key(2, "client"), field: FieldId(2) });
        index.insert(target, DependencyEdge { source: key(3, "client"), field: FieldId(0) });

        let deps = index.dependents(target);
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[&key(2, "client")], vec![FieldId(0), FieldId(2)]);
    }

    #[test]
    fn test_remove_last_edge_drops_target() {
        let mut index = ReverseIndex::default();
        let target = key(1, "position");
        let edge = DependencyEdge { source: key(2, "client"), field: FieldId(0) };
        index.insert(target, edge);
        index.insert(target, edge);
        assert_eq!(index.edges(target).count(), 1);

        index.remove(target, edge);
        assert!(index.is_empty());
        assert_eq!(index.edges(target).count(), 0);
    }
}
