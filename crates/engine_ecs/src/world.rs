//! Entity/component storage with a live dependency graph.
//!
//! Components are schema-defined. Fields whose schema declares a dependency
//! hold entity ids that name other components; the world keeps a reverse
//! index of those edges and drives activation through it. A component
//! activates only after every required dependency is active, and deactivation
//! always tears down reverse dependents first.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use engine_component::{
    ClientId, ComponentKey, ComponentTypeId, EntityAllocator, EntityId, FieldId, FieldValue,
};
use engine_schema::Schema;
use tracing::{debug, warn};

use crate::component::{Component, ComponentStore, Entity};
use crate::dependency::{DependencyEdge, ReverseIndex};
use crate::error::WorldError;
use crate::event::WorldEvent;
use crate::system::ComponentSystem;

/// The dependency-tracking world.
pub struct World {
    schema: Arc<Schema>,
    allocator: EntityAllocator,
    store: ComponentStore,
    dependents: ReverseIndex,
    systems: HashMap<ComponentTypeId, Box<dyn ComponentSystem>>,
    events: Vec<WorldEvent>,
    record_events: bool,
}

impl World {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            allocator: EntityAllocator::new(),
            store: ComponentStore::default(),
            dependents: ReverseIndex::default(),
            systems: HashMap::new(),
            events: Vec::new(),
            record_events: true,
        }
    }

    /// Access the schema.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Read-only access to all entities and components.
    pub fn store(&self) -> &ComponentStore {
        &self.store
    }

    /// Stop (or resume) recording [`WorldEvent`]s. Recording is on by default;
    /// turn it off when nothing drains the queue.
    pub fn set_event_recording(&mut self, enabled: bool) {
        self.record_events = enabled;
        if !enabled {
            self.events.clear();
        }
    }

    /// Take every event recorded since the last drain.
    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }

    fn emit(&mut self, event: WorldEvent) {
        if self.record_events {
            self.events.push(event);
        }
    }

    /// Attach the behaviour for one component type.
    pub fn register_system(
        &mut self,
        type_name: &str,
        system: impl ComponentSystem + 'static,
    ) -> Result<(), WorldError> {
        let ty = self
            .schema
            .get_by_name(type_name)
            .ok_or_else(|| WorldError::UnknownComponentType(type_name.to_string()))?;
        if self.systems.contains_key(&ty.id()) {
            return Err(WorldError::SystemExists(type_name.to_string()));
        }
        self.systems.insert(ty.id(), Box::new(system));
        Ok(())
    }

    // -- Entity lifecycle --

    /// Create an entity with a freshly allocated id.
    pub fn spawn(&mut self) -> EntityId {
        let mut id = self.allocator.allocate();
        while self.store.contains_entity(id) {
            id = self.allocator.allocate();
        }
        self.store.insert(Entity::new(id));
        self.emit(WorldEvent::EntityAdded(id));
        id
    }

    /// Create an entity with a caller-chosen id.
    pub fn add_entity(&mut self, id: EntityId) -> Result<(), WorldError> {
        if self.store.contains_entity(id) {
            return Err(WorldError::EntityExists(id));
        }
        self.allocator.reserve(id);
        self.store.insert(Entity::new(id));
        self.emit(WorldEvent::EntityAdded(id));
        Ok(())
    }

    /// Remove an entity and every component on it. Each component is
    /// deactivated (with its dependents) before it goes away.
    pub fn remove_entity(&mut self, id: EntityId) -> Result<(), WorldError> {
        let entity = self.store.entity(id).ok_or(WorldError::UnknownEntity(id))?;
        let keys: Vec<ComponentKey> = entity.components().map(Component::key).collect();
        for key in keys {
            self.remove_component(key)?;
        }
        self.store.remove(id);
        self.emit(WorldEvent::EntityRemoved(id));
        Ok(())
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.store.entity(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.store.entities()
    }

    pub fn entity_count(&self) -> usize {
        self.store.len()
    }

    // -- Component lifecycle --

    /// Add an empty, inactive component of the named type.
    pub fn add_component(
        &mut self,
        entity: EntityId,
        type_name: &str,
    ) -> Result<ComponentKey, WorldError> {
        let ty = self
            .schema
            .get_by_name(type_name)
            .cloned()
            .ok_or_else(|| WorldError::UnknownComponentType(type_name.to_string()))?;
        let key = ComponentKey::new(entity, ty.id());
        let slot = self
            .store
            .entity_mut(entity)
            .ok_or(WorldError::UnknownEntity(entity))?;
        if slot.component(ty.id()).is_some() {
            return Err(WorldError::ComponentExists(key));
        }
        slot.push(Component::new(entity, ty));
        self.emit(WorldEvent::ComponentAdded(key));
        Ok(key)
    }

    /// Remove a component. It is deactivated first, and its outgoing
    /// dependency edges are dropped. Edges pointing at it stay indexed, since
    /// the fields holding them still name it.
    pub fn remove_component(&mut self, key: ComponentKey) -> Result<(), WorldError> {
        if self.store.component(key).is_none() {
            return Err(WorldError::UnknownComponent(key));
        }
        self.deactivate(key);

        if let Some(component) = self.store.component(key) {
            let ty = Arc::clone(component.component_type());
            for (field, _, target_type) in ty.dependency_fields() {
                for target in targets(component.value(field)) {
                    self.dependents.remove(
                        ComponentKey::new(target, target_type),
                        DependencyEdge { source: key, field },
                    );
                }
            }
        }

        if let Some(entity) = self.store.entity_mut(key.entity) {
            entity.remove(key.type_id);
        }
        self.emit(WorldEvent::ComponentRemoved(key));
        Ok(())
    }

    pub fn component(&self, key: ComponentKey) -> Option<&Component> {
        self.store.component(key)
    }

    /// Mutable access for touching system data. Values, activation and
    /// authority stay under the world's control.
    pub fn component_mut(&mut self, key: ComponentKey) -> Option<&mut Component> {
        self.store.component_mut(key)
    }

    // -- Field updates --

    /// Canonical write of a field value.
    pub fn set_field(
        &mut self,
        key: ComponentKey,
        field: FieldId,
        value: FieldValue,
    ) -> Result<(), WorldError> {
        self.write_field(key, field, Some(value), None)
    }

    /// Return a field to the unset state.
    pub fn clear_field(&mut self, key: ComponentKey, field: FieldId) -> Result<(), WorldError> {
        self.write_field(key, field, None, None)
    }

    /// Write a field on behalf of a remote client. Rejected unless `client`
    /// currently holds authority over the component.
    pub fn apply_client_update(
        &mut self,
        client: ClientId,
        key: ComponentKey,
        field: FieldId,
        value: Option<FieldValue>,
    ) -> Result<(), WorldError> {
        let owner = self
            .store
            .component(key)
            .ok_or(WorldError::UnknownComponent(key))?
            .authority;
        if owner != Some(client) {
            return Err(WorldError::AuthorityViolation { key, client, owner });
        }
        self.write_field(key, field, value, Some(client))
    }

    fn write_field(
        &mut self,
        key: ComponentKey,
        field: FieldId,
        value: Option<FieldValue>,
        source: Option<ClientId>,
    ) -> Result<(), WorldError> {
        let component = self
            .store
            .component_mut(key)
            .ok_or(WorldError::UnknownComponent(key))?;
        let ty = Arc::clone(component.component_type());
        let def = ty.field(field).ok_or(WorldError::UnknownField { key, field })?;
        if let Some(value) = &value
            && value.kind() != def.kind
        {
            return Err(WorldError::FieldKindMismatch {
                key,
                field,
                expected: def.kind,
                found: value.kind(),
            });
        }

        let new_targets = targets(value.as_ref());
        let old = component.replace_value(field, value);
        let active = component.active;

        // Swap dependency edges before any activation logic looks at them.
        if let Some(target_type) = def.dependency_type() {
            let edge = DependencyEdge { source: key, field };
            for target in targets(old.as_ref()) {
                self.dependents
                    .remove(ComponentKey::new(target, target_type), edge);
            }
            for target in new_targets {
                self.dependents
                    .insert(ComponentKey::new(target, target_type), edge);
            }
        }
        self.emit(WorldEvent::ComponentUpdated { key, field, source });

        if !active {
            return Ok(());
        }
        // A dependency field may only change in place while what it now names
        // is still satisfied; anything else goes through reactivation.
        let live = self
            .systems
            .get(&key.type_id)
            .is_some_and(|system| system.supports_live_update(field))
            && def.dependency_type().is_none_or(|target_type| {
                self.dependency_satisfied(key, field, def.optional, target_type)
            });
        if live {
            if self.live_update(key, field) {
                self.propagate_live(key, &mut HashSet::new());
            }
        } else {
            self.reactivate(key);
        }
        Ok(())
    }

    /// Whether dependency field `field` of `key` names only active
    /// components, or is optional where it does not.
    fn dependency_satisfied(
        &self,
        key: ComponentKey,
        field: FieldId,
        optional: bool,
        target_type: ComponentTypeId,
    ) -> bool {
        let Some(value) = self.store.component(key).and_then(|c| c.value(field)) else {
            return optional;
        };
        optional
            || value.entity_refs().iter().all(|&target| {
                self.store
                    .component(ComponentKey::new(target, target_type))
                    .is_some_and(Component::is_active)
            })
    }

    fn live_update(&mut self, key: ComponentKey, field: FieldId) -> bool {
        match (
            self.systems.get_mut(&key.type_id),
            self.store.component_mut(key),
        ) {
            (Some(system), Some(component)) => system.live_update(component, field),
            _ => false,
        }
    }

    // -- Dependency graph --

    /// Call `f` for every component whose dependency fields currently name
    /// `key`.
    pub fn for_each_reverse_dependency(&self, key: ComponentKey, mut f: impl FnMut(&Component)) {
        for source in self.dependents.dependents(key).into_keys() {
            if let Some(component) = self.store.component(source) {
                f(component);
            }
        }
    }

    /// Keys of the components depending on `key`, in key order.
    pub fn dependents(&self, key: ComponentKey) -> Vec<ComponentKey> {
        self.dependents.dependents(key).into_keys().collect()
    }

    /// Notify the reverse dependents of `key` that it changed in place.
    fn propagate_live(&mut self, key: ComponentKey, visited: &mut HashSet<ComponentKey>) {
        if !visited.insert(key) {
            return;
        }
        for (source, fields) in self.dependents.dependents(key) {
            if !self.store.component(source).is_some_and(|c| c.active) {
                continue;
            }
            let live = self.systems.get(&source.type_id).is_some_and(|system| {
                fields
                    .iter()
                    .all(|&field| system.supports_live_dependency_update(field))
            });
            if !live {
                self.reactivate(source);
                continue;
            }

            let mut propagate = false;
            if let (Some(system), Some(component)) = (
                self.systems.get_mut(&source.type_id),
                self.store.component_mut(source),
            ) {
                for field in fields {
                    propagate |= system.live_dependency_update(component, field);
                }
            }
            if propagate {
                self.propagate_live(source, visited);
            }
        }
    }

    // -- Activation --

    /// Activate a component, activating its required dependencies first.
    ///
    /// Returns `false` (and leaves the component inactive) when authority is
    /// required but missing, a required dependency is missing or cannot be
    /// activated, or the system refuses the activation. Dependencies that were
    /// activated before the failure stay active.
    pub fn activate(&mut self, key: ComponentKey) -> bool {
        self.activate_with(key, &mut HashSet::new())
    }

    fn activate_with(&mut self, key: ComponentKey, visiting: &mut HashSet<ComponentKey>) -> bool {
        match self.store.component(key) {
            None => return false,
            Some(component) if component.active => return true,
            Some(_) => {}
        }
        if !visiting.insert(key) {
            warn!(component = %key, "dependency cycle, cannot activate");
            return false;
        }
        let activated = self.try_activate(key, visiting);
        visiting.remove(&key);
        activated
    }

    fn try_activate(&mut self, key: ComponentKey, visiting: &mut HashSet<ComponentKey>) -> bool {
        let Some(component) = self.store.component(key) else {
            return false;
        };
        let ty = Arc::clone(component.component_type());
        let requires_authority = self
            .systems
            .get(&key.type_id)
            .is_some_and(|system| system.requires_authority());
        if requires_authority && component.authority.is_none() {
            warn!(component = %key, kind = %ty.name, "activation requires an authoritative client");
            return false;
        }

        for (field, def, target_type) in ty.dependency_fields() {
            let value = self
                .store
                .component(key)
                .and_then(|c| c.value(field))
                .cloned();
            let Some(value) = value else {
                if def.optional {
                    continue;
                }
                warn!(component = %key, field = %def.name, "required dependency is unset");
                return false;
            };
            for target in dedup(value.entity_refs()) {
                let dependency = ComponentKey::new(target, target_type);
                let present = self.store.component(dependency).is_some();
                if present && self.activate_with(dependency, visiting) {
                    continue;
                }
                if def.optional {
                    continue;
                }
                warn!(
                    component = %key,
                    field = %def.name,
                    dependency = %dependency,
                    present,
                    "required dependency is not active"
                );
                return false;
            }
        }

        let data = match (self.systems.get_mut(&key.type_id), self.store.component(key)) {
            (Some(system), Some(component)) => match system.activate(component, &self.store) {
                Some(data) => Some(data),
                None => {
                    warn!(component = %key, kind = %ty.name, "system refused activation");
                    return false;
                }
            },
            _ => None,
        };
        if let Some(component) = self.store.component_mut(key) {
            component.active = true;
            component.system_data = data;
        }
        debug!(component = %key, kind = %ty.name, "activated");
        self.emit(WorldEvent::ComponentActivated(key));
        true
    }

    /// Deactivate a component, deactivating its reverse dependents first.
    /// A no-op for inactive components.
    pub fn deactivate(&mut self, key: ComponentKey) {
        self.deactivate_with(key, &mut HashSet::new(), &mut Vec::new());
    }

    /// Deactivates `key` and everything depending on it. `order` receives the
    /// deactivated keys, dependents before what they depend on.
    fn deactivate_with(
        &mut self,
        key: ComponentKey,
        visited: &mut HashSet<ComponentKey>,
        order: &mut Vec<ComponentKey>,
    ) {
        if !self.store.component(key).is_some_and(|c| c.active) || !visited.insert(key) {
            return;
        }
        for source in self.dependents.dependents(key).into_keys() {
            self.deactivate_with(source, visited, order);
        }

        let Some(component) = self.store.component_mut(key) else {
            return;
        };
        let data = component.system_data.take();
        if let (Some(system), Some(data)) = (self.systems.get_mut(&key.type_id), data) {
            system.deactivate(component, data);
        }
        component.active = false;
        debug!(component = %key, "deactivated");
        order.push(key);
        self.emit(WorldEvent::ComponentDeactivated(key));
    }

    /// Deactivate and activate again, restoring the dependents the cascade
    /// took down. If `key` itself fails to come back, it and its dependents
    /// stay inactive.
    fn reactivate(&mut self, key: ComponentKey) -> bool {
        let mut order = Vec::new();
        self.deactivate_with(key, &mut HashSet::new(), &mut order);
        if !self.activate(key) {
            return false;
        }
        for dependent in order.into_iter().rev().filter(|&k| k != key) {
            self.activate(dependent);
        }
        true
    }

    // -- Authority --

    /// Set or clear the client holding authority over a component. Returns the
    /// previous owner.
    ///
    /// Clearing authority deactivates components whose system requires it.
    pub fn set_authority(
        &mut self,
        key: ComponentKey,
        owner: Option<ClientId>,
    ) -> Result<Option<ClientId>, WorldError> {
        let component = self
            .store
            .component_mut(key)
            .ok_or(WorldError::UnknownComponent(key))?;
        let previous = std::mem::replace(&mut component.authority, owner);
        if previous == owner {
            return Ok(previous);
        }
        self.emit(WorldEvent::AuthorityChanged { key, owner });

        let requires_authority = self
            .systems
            .get(&key.type_id)
            .is_some_and(|system| system.requires_authority());
        if owner.is_none() && requires_authority {
            self.deactivate(key);
        }
        Ok(previous)
    }

    pub fn authority(&self, key: ComponentKey) -> Option<ClientId> {
        self.store.component(key).and_then(Component::authority)
    }

    // -- Tick --

    /// Run one update of every active component. Components whose system
    /// reports a change notify their reverse dependents.
    pub fn update(&mut self, dt: f32) {
        let active: Vec<ComponentKey> = self
            .store
            .components()
            .filter(|c| c.active)
            .map(Component::key)
            .collect();
        for key in active {
            let changed = match (
                self.systems.get_mut(&key.type_id),
                self.store.component_mut(key),
            ) {
                (Some(system), Some(component)) if component.active => {
                    system.update(component, dt)
                }
                _ => false,
            };
            if changed {
                self.propagate_live(key, &mut HashSet::new());
            }
        }
    }
}

impl Drop for World {
    fn drop(&mut self) {
        let active: Vec<ComponentKey> = self
            .store
            .components()
            .filter(|c| c.active)
            .map(Component::key)
            .collect();
        for key in active {
            self.deactivate(key);
        }
    }
}

/// Distinct entity ids held by an optional field value.
fn targets(value: Option<&FieldValue>) -> BTreeSet<EntityId> {
    value.map(|v| dedup(v.entity_refs())).unwrap_or_default()
}

fn dedup(ids: &[EntityId]) -> BTreeSet<EntityId> {
    ids.iter().copied().collect()
}
