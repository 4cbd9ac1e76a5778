//! Component and entity storage.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use engine_component::{ClientId, ComponentKey, ComponentTypeId, EntityId, FieldId, FieldValue};
use engine_schema::ComponentType;

/// Opaque per-component state owned by the system that activated it.
pub type SystemData = Box<dyn Any>;

/// One component instance: a value slot per field of its type, plus
/// activation and authority state.
///
/// Only the world changes values, activation and authority. Systems may touch
/// nothing but their own [`SystemData`].
pub struct Component {
    entity: EntityId,
    ty: Arc<ComponentType>,
    values: Vec<Option<FieldValue>>,
    pub(crate) active: bool,
    pub(crate) authority: Option<ClientId>,
    pub(crate) system_data: Option<SystemData>,
}

impl Component {
    pub(crate) fn new(entity: EntityId, ty: Arc<ComponentType>) -> Self {
        let values = vec![None; ty.fields.len()];
        Self {
            entity,
            ty,
            values,
            active: false,
            authority: None,
            system_data: None,
        }
    }

    #[must_use]
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    #[must_use]
    pub fn component_type_id(&self) -> ComponentTypeId {
        self.ty.id()
    }

    #[must_use]
    pub fn component_type(&self) -> &Arc<ComponentType> {
        &self.ty
    }

    #[must_use]
    pub fn key(&self) -> ComponentKey {
        ComponentKey::new(self.entity, self.ty.id())
    }

    /// The value of a field, or `None` when the field is unset or unknown.
    #[must_use]
    pub fn value(&self, field: FieldId) -> Option<&FieldValue> {
        self.values.get(field.index()).and_then(Option::as_ref)
    }

    /// Iterate the fields that currently hold a value, in declaration order.
    pub fn set_values(&self) -> impl Iterator<Item = (FieldId, &FieldValue)> {
        self.values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.as_ref().map(|v| (FieldId(i as u32), v)))
    }

    pub(crate) fn replace_value(
        &mut self,
        field: FieldId,
        value: Option<FieldValue>,
    ) -> Option<FieldValue> {
        std::mem::replace(&mut self.values[field.index()], value)
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[must_use]
    pub fn authority(&self) -> Option<ClientId> {
        self.authority
    }

    /// The system data stored at activation, if it has type `T`.
    #[must_use]
    pub fn system_data<T: 'static>(&self) -> Option<&T> {
        self.system_data.as_ref()?.downcast_ref()
    }

    #[must_use]
    pub fn system_data_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.system_data.as_mut()?.downcast_mut()
    }
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("entity", &self.entity)
            .field("type", &self.ty.name)
            .field("values", &self.values)
            .field("active", &self.active)
            .field("authority", &self.authority)
            .field("has_system_data", &self.system_data.is_some())
            .finish()
    }
}

/// An entity and its components, in insertion order.
#[derive(Debug)]
pub struct Entity {
    id: EntityId,
    components: Vec<Component>,
}

impl Entity {
    pub(crate) fn new(id: EntityId) -> Self {
        Self {
            id,
            components: Vec::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    #[must_use]
    pub fn component(&self, type_id: ComponentTypeId) -> Option<&Component> {
        self.components.iter().find(|c| c.component_type_id() == type_id)
    }

    pub(crate) fn component_mut(&mut self, type_id: ComponentTypeId) -> Option<&mut Component> {
        self.components.iter_mut().find(|c| c.component_type_id() == type_id)
    }

    /// Components in the order they were added.
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub(crate) fn push(&mut self, component: Component) {
        self.components.push(component);
    }

    pub(crate) fn remove(&mut self, type_id: ComponentTypeId) -> Option<Component> {
        let pos = self.components.iter().position(|c| c.component_type_id() == type_id)?;
        Some(self.components.remove(pos))
    }
}

/// All entities of a world, keyed by id.
///
/// Handed read-only to systems during activation so they can inspect the
/// components they depend on.
#[derive(Debug, Default)]
pub struct ComponentStore {
    entities: BTreeMap<EntityId, Entity>,
}

impl ComponentStore {
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub(crate) fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    #[must_use]
    pub fn contains_entity(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    #[must_use]
    pub fn component(&self, key: ComponentKey) -> Option<&Component> {
        self.entities.get(&key.entity)?.component(key.type_id)
    }

    pub(crate) fn component_mut(&mut self, key: ComponentKey) -> Option<&mut Component> {
        self.entities.get_mut(&key.entity)?.component_mut(key.type_id)
    }

    /// Entities in id order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Every component of every entity.
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.entities.values().flat_map(Entity::components)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub(crate) fn insert(&mut self, entity: Entity) {
        self.entities.insert(entity.id(), entity);
    }

    pub(crate) fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }
}

#[cfg(test)]
mod tests {
    use engine_component::ValueKind;
    use engine_schema::FieldDef;

    use super::*;

    fn ty(name: &str) -> Arc<ComponentType> {
        Arc::new(ComponentType::new(name, vec![FieldDef::new("value", ValueKind::Int)]))
    }

    #[test]
    fn test_entity_finds_components_by_type() {
        let (position, client) = (ty("position"), ty("client"));
        let mut entity = Entity::new(EntityId(3));
        entity.push(Component::new(EntityId(3), Arc::clone(&position)));
        entity.push(Component::new(EntityId(3), Arc::clone(&client)));

        let found = entity.component(client.id()).unwrap();
        assert_eq!(found.component_type_id(), client.id());
        assert_eq!(found.key(), ComponentKey::new(EntityId(3), client.id()));
        assert!(entity.component_mut(position.id()).is_some());
        assert!(entity.component(ComponentTypeId::from_name("light")).is_none());

        assert!(entity.remove(position.id()).is_some());
        assert_eq!(entity.len(), 1);
        assert!(entity.component(position.id()).is_none());
    }
}
