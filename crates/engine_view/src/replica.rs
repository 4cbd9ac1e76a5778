//! Client-side mirror of a server's view.

use std::collections::BTreeSet;
use std::sync::Arc;

use engine_component::{ClientId, ComponentKey, EntityId, FieldId, FieldValue};
use engine_ecs::{World, WorldError};
use engine_net::{ClientOp, CodecError, ServerOp};
use engine_schema::{ComponentTypeIndexer, Schema};
use tracing::{debug, warn};

use crate::error::ReplicaError;

/// Authority marker used inside the replica's world for delegated components.
pub const LOCAL_CLIENT: ClientId = ClientId(0);

/// Applies the [`ClientOp`] stream to a local [`World`] and turns local edits
/// of delegated components into [`ServerOp`]s.
pub struct Replica {
    world: World,
    indexer: Arc<ComponentTypeIndexer>,
    delegated: BTreeSet<ComponentKey>,
    /// Activations the server asked for that could not run locally yet.
    deferred: BTreeSet<ComponentKey>,
    outbox: Vec<ServerOp>,
}

impl Replica {
    pub fn new(schema: Arc<Schema>) -> Self {
        let indexer = Arc::new(ComponentTypeIndexer::from_schema(&schema));
        Self::with_indexer(schema, indexer)
    }

    pub fn with_indexer(schema: Arc<Schema>, indexer: Arc<ComponentTypeIndexer>) -> Self {
        let mut world = World::new(schema);
        world.set_event_recording(false);
        Self {
            world,
            indexer,
            delegated: BTreeSet::new(),
            deferred: BTreeSet::new(),
            outbox: Vec::new(),
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Local world access, e.g. to register component systems.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    #[must_use]
    pub fn is_delegated(&self, key: ComponentKey) -> bool {
        self.delegated.contains(&key)
    }

    /// Decode and apply one server message.
    pub fn apply_bytes(&mut self, bytes: &[u8]) -> Result<(), ReplicaError> {
        let op = ClientOp::decode(&self.indexer, bytes)?;
        self.apply(op)
    }

    pub fn apply(&mut self, op: ClientOp) -> Result<(), ReplicaError> {
        debug!(?op, "applying");
        match op {
            ClientOp::Noop => {}
            ClientOp::AddEntity(id) => self.world.add_entity(id)?,
            ClientOp::RemoveEntity(id) => {
                self.world.remove_entity(id)?;
                self.delegated.retain(|k| k.entity != id);
                self.deferred.retain(|k| k.entity != id);
            }
            ClientOp::AddComponent(key) => {
                let name = self
                    .world
                    .schema()
                    .get(key.type_id)
                    .map(|ty| ty.name.clone())
                    .ok_or(ReplicaError::UnknownComponentType(key.type_id))?;
                self.world.add_component(key.entity, &name)?;
            }
            ClientOp::UpdateComponent { key, field, value } => match value {
                Some(value) => self.world.set_field(key, field, value)?,
                None => self.world.clear_field(key, field)?,
            },
            ClientOp::ActivateComponent(key) => {
                if self.world.component(key).is_none() {
                    return Err(WorldError::UnknownComponent(key).into());
                }
                if self.world.activate(key) {
                    self.deferred.remove(&key);
                } else {
                    warn!(component = %key, "local activation deferred");
                    self.deferred.insert(key);
                }
            }
            ClientOp::DeactivateComponent(key) => {
                self.deferred.remove(&key);
                self.world.deactivate(key);
            }
            ClientOp::DelegateComponent(key) => {
                self.world.set_authority(key, Some(LOCAL_CLIENT))?;
                self.delegated.insert(key);
                self.retry_deferred();
            }
            ClientOp::UndelegateComponent(key) => {
                self.delegated.remove(&key);
                self.world.set_authority(key, None)?;
            }
            ClientOp::RemoveComponent(key) => {
                self.delegated.remove(&key);
                self.deferred.remove(&key);
                self.world.remove_component(key)?;
            }
        }
        Ok(())
    }

    /// Authority arriving after the activation request can unblock it, for
    /// the delegated component or anything depending on it.
    fn retry_deferred(&mut self) {
        let deferred: Vec<ComponentKey> = self.deferred.iter().copied().collect();
        for key in deferred {
            if self.world.activate(key) {
                debug!(component = %key, "deferred activation completed");
                self.deferred.remove(&key);
            }
        }
    }

    /// Write a field of a delegated component locally and queue the update
    /// for the server.
    pub fn edit(
        &mut self,
        key: ComponentKey,
        field: FieldId,
        value: Option<FieldValue>,
    ) -> Result<(), ReplicaError> {
        if !self.is_delegated(key) {
            return Err(ReplicaError::NotDelegated(key));
        }
        match value.clone() {
            Some(v) => self.world.set_field(key, field, v)?,
            None => self.world.clear_field(key, field)?,
        }
        self.outbox.push(ServerOp::UpdateComponent { key, field, value });
        Ok(())
    }

    pub fn add_interest(&mut self, entity: EntityId) {
        self.outbox.push(ServerOp::AddEntityInterest(entity));
    }

    pub fn remove_interest(&mut self, entity: EntityId) {
        self.outbox.push(ServerOp::RemoveEntityInterest(entity));
    }

    /// Take the queued ops for the server.
    pub fn take_outbox(&mut self) -> Vec<ServerOp> {
        std::mem::take(&mut self.outbox)
    }

    /// Take the queued ops, each encoded as one message.
    pub fn take_encoded(&mut self) -> Result<Vec<Vec<u8>>, CodecError> {
        self.take_outbox()
            .iter()
            .map(|op| op.encode(&self.indexer))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use engine_component::ComponentTypeId;
    use engine_ecs::{Component, ComponentStore, ComponentSystem, SystemData};
    use engine_net::LocalNetwork;

    use super::*;
    use crate::synchronizer::ViewSynchronizer;

    const SCHEMA: &str = r#"
        [
            { "name": "position", "fields": [ { "name": "value", "kind": "vec3" } ] },
            { "name": "score", "fields": [ { "name": "value", "kind": "int" } ] }
        ]
    "#;

    fn schema() -> Arc<Schema> {
        Arc::new(Schema::from_json_str(SCHEMA).unwrap())
    }

    fn score(entity: i64) -> ComponentKey {
        ComponentKey::new(EntityId(entity), ComponentTypeId::from_name("score"))
    }

    #[test]
    fn test_applies_snapshot_ops() {
        let mut replica = Replica::new(schema());
        let key = score(4);
        for op in [
            ClientOp::AddEntity(EntityId(4)),
            ClientOp::AddComponent(key),
            ClientOp::UpdateComponent {
                key,
                field: FieldId(0),
                value: Some(FieldValue::Int(12)),
            },
            ClientOp::ActivateComponent(key),
        ] {
            replica.apply(op).unwrap();
        }
        let component = replica.world().component(key).unwrap();
        assert_eq!(component.value(FieldId(0)), Some(&FieldValue::Int(12)));
        assert!(component.is_active());

        replica.apply(ClientOp::RemoveEntity(EntityId(4))).unwrap();
        assert!(replica.world().entity(EntityId(4)).is_none());
    }

    /// A system that only runs while some client holds authority.
    struct Owned;

    impl ComponentSystem for Owned {
        fn requires_authority(&self) -> bool {
            true
        }

        fn activate(&mut self, _component: &Component, _store: &ComponentStore) -> Option<SystemData> {
            Some(Box::new(()))
        }
    }

    #[test]
    fn test_activation_waits_for_delegation() {
        let mut replica = Replica::new(schema());
        replica.world_mut().register_system("score", Owned).unwrap();
        let key = score(2);
        for op in [
            ClientOp::AddEntity(EntityId(2)),
            ClientOp::AddComponent(key),
            ClientOp::ActivateComponent(key),
        ] {
            replica.apply(op).unwrap();
        }
        assert!(!replica.world().component(key).unwrap().is_active());

        replica.apply(ClientOp::DelegateComponent(key)).unwrap();
        assert!(replica.is_delegated(key));
        assert!(replica.world().component(key).unwrap().is_active());

        // A deactivation in between cancels the pending request.
        replica.apply(ClientOp::UndelegateComponent(key)).unwrap();
        replica.apply(ClientOp::ActivateComponent(key)).unwrap();
        replica.apply(ClientOp::DeactivateComponent(key)).unwrap();
        replica.apply(ClientOp::DelegateComponent(key)).unwrap();
        assert!(!replica.world().component(key).unwrap().is_active());
    }

    #[test]
    fn test_edits_need_delegation() {
        let mut replica = Replica::new(schema());
        let key = score(1);
        replica.apply(ClientOp::AddEntity(EntityId(1))).unwrap();
        replica.apply(ClientOp::AddComponent(key)).unwrap();

        assert_eq!(
            replica.edit(key, FieldId(0), Some(FieldValue::Int(1))),
            Err(ReplicaError::NotDelegated(key))
        );

        replica.apply(ClientOp::DelegateComponent(key)).unwrap();
        replica.edit(key, FieldId(0), Some(FieldValue::Int(1))).unwrap();
        assert_eq!(
            replica.take_outbox(),
            vec![ServerOp::UpdateComponent {
                key,
                field: FieldId(0),
                value: Some(FieldValue::Int(1)),
            }]
        );

        replica.apply(ClientOp::UndelegateComponent(key)).unwrap();
        assert!(replica.edit(key, FieldId(0), None).is_err());
    }

    #[test]
    fn test_rejects_unknown_wire_type() {
        let mut replica = Replica::new(schema());
        let bad = [3u8, 1, 0, 0, 0, 0, 0, 0, 0, 7, 0, 0, 0];
        assert_eq!(
            replica.apply_bytes(&bad),
            Err(ReplicaError::Codec(CodecError::UnknownTypeIndex(7)))
        );
    }

    #[test]
    fn test_mirrors_server_over_local_network() {
        let schema = schema();
        let mut world = World::new(Arc::clone(&schema));
        let e = world.spawn();
        let key = world.add_component(e, "score").unwrap();
        world.set_field(key, FieldId(0), FieldValue::Int(5)).unwrap();

        let net = LocalNetwork::new();
        let mut server = ViewSynchronizer::new(world, net.clone());
        let mut replica = Replica::new(schema);
        let handle = net.connect();
        server.update(&mut ());

        replica.add_interest(e);
        for bytes in replica.take_encoded().unwrap() {
            net.send(handle, bytes);
        }
        server.update(&mut ());
        server.controller().delegate(key, ClientId(1)).unwrap();
        server.flush();
        for bytes in net.take_sent(handle) {
            replica.apply_bytes(&bytes).unwrap();
        }
        assert!(replica.is_delegated(key));
        assert_eq!(
            replica.world().component(key).unwrap().value(FieldId(0)),
            Some(&FieldValue::Int(5))
        );

        replica.edit(key, FieldId(0), Some(FieldValue::Int(6))).unwrap();
        for bytes in replica.take_encoded().unwrap() {
            net.send(handle, bytes);
        }
        server.update(&mut ());
        assert_eq!(
            server.world().component(key).unwrap().value(FieldId(0)),
            Some(&FieldValue::Int(6))
        );
        // The author is not echoed its own write.
        assert!(net.take_sent(handle).is_empty());
    }
}
