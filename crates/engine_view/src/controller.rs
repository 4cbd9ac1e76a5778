//! Server-side control over what each client sees and holds.

use engine_component::{ClientId, ComponentKey, EntityId};
use engine_ecs::{World, WorldError, WorldEvent};
use engine_net::ServerOp;
use tracing::{debug, info, warn};

use crate::emitter::ClientOpEmitter;
use crate::state::ViewState;

/// A short-lived handle over the world and the emitter.
///
/// Every method first forwards pending world events to the emitter, so ops
/// leave in the order the changes happened.
pub struct ServerController<'a> {
    world: &'a mut World,
    emitter: &'a mut ClientOpEmitter<ViewState>,
}

impl<'a> ServerController<'a> {
    pub fn new(world: &'a mut World, emitter: &'a mut ClientOpEmitter<ViewState>) -> Self {
        Self { world, emitter }
    }

    pub fn world(&self) -> &World {
        &*self.world
    }

    /// Direct world access. Changes made here are replicated on the next
    /// controller call or flush.
    pub fn world_mut(&mut self) -> &mut World {
        &mut *self.world
    }

    pub fn state(&self) -> &ViewState {
        self.emitter.adapter()
    }

    /// Turn pending world events into ops.
    pub fn sync(&mut self) {
        for event in self.world.drain_events() {
            match event {
                WorldEvent::EntityAdded(id) => self.emitter.add_entity(id),
                WorldEvent::EntityRemoved(id) => {
                    self.emitter.remove_entity(id);
                    self.emitter.adapter_mut().forget_entity(id);
                }
                WorldEvent::ComponentAdded(key) => self.emitter.add_component(key),
                WorldEvent::ComponentUpdated { key, field, source } => {
                    // Sends the current value; a later write in the same batch
                    // has its own event.
                    let Some(component) = self.world.component(key) else {
                        continue;
                    };
                    let value = component.value(field).cloned();
                    self.emitter.update_component(key, field, value, source);
                }
                WorldEvent::ComponentRemoved(key) => {
                    self.emitter.remove_component(key);
                    self.emitter.adapter_mut().forget_component(key);
                }
                // Server-local state; clients hear about it only through
                // the explicit delegate/activate calls below.
                WorldEvent::ComponentActivated(_)
                | WorldEvent::ComponentDeactivated(_)
                | WorldEvent::AuthorityChanged { .. } => {}
            }
        }
    }

    // -- Interest --

    /// Make `client` interested in `entity` and send it the entity's snapshot.
    /// Returns `false` if it was already interested.
    pub fn add_interest(&mut self, client: ClientId, entity: EntityId) -> Result<bool, WorldError> {
        self.sync();
        let Some(snapshot) = self.world.entity(entity) else {
            return Err(WorldError::UnknownEntity(entity));
        };
        if !self.emitter.adapter_mut().add_interest(client, entity) {
            return Ok(false);
        }
        debug!(%client, %entity, "checkout");
        self.emitter.checkout_entity(snapshot, client);
        Ok(true)
    }

    /// Drop `client`'s interest in `entity`, silently releasing its authority
    /// and activations there. Returns `false` if it was not interested.
    pub fn remove_interest(&mut self, client: ClientId, entity: EntityId) -> bool {
        self.sync();
        if !self.emitter.adapter_mut().remove_interest(client, entity) {
            return false;
        }
        let released = self.emitter.adapter_mut().release_entity(client, entity);
        for key in released {
            self.release_authority(client, key);
        }
        debug!(%client, %entity, "uncheckout");
        self.emitter.uncheckout_entity(entity, client);
        self.sync();
        true
    }

    // -- Authority --

    /// Give `client` authority over `key`. A previous owner is told it lost
    /// it. Returns `false` if the client already held it.
    pub fn delegate(&mut self, key: ComponentKey, client: ClientId) -> Result<bool, WorldError> {
        self.sync();
        let previous = self.world.set_authority(key, Some(client))?;
        if previous == Some(client) {
            return Ok(false);
        }
        if let Some(previous) = previous {
            self.emitter.adapter_mut().revoke_authority(previous, key);
            if self.state().is_interested(previous, key.entity) {
                self.emitter.undelegate_component(key, previous);
            }
        }
        self.emitter.adapter_mut().grant_authority(client, key);
        if self.state().is_interested(client, key.entity) {
            self.emitter.delegate_component(key, client);
        }
        info!(%key, %client, "delegated");
        self.sync();
        Ok(true)
    }

    /// Take authority over `key` back from `client`. Returns `false` if the
    /// client did not hold it.
    pub fn undelegate(&mut self, key: ComponentKey, client: ClientId) -> Result<bool, WorldError> {
        self.sync();
        if self.world.component(key).is_none() {
            return Err(WorldError::UnknownComponent(key));
        }
        if self.world.authority(key) != Some(client) {
            return Ok(false);
        }
        self.emitter.adapter_mut().revoke_authority(client, key);
        if self.state().is_interested(client, key.entity) {
            self.emitter.undelegate_component(key, client);
        }
        self.world.set_authority(key, None)?;
        info!(%key, %client, "undelegated");
        self.sync();
        Ok(true)
    }

    fn release_authority(&mut self, client: ClientId, key: ComponentKey) {
        if self.world.authority(key) == Some(client)
            && let Err(e) = self.world.set_authority(key, None)
        {
            warn!(%key, %client, error = %e, "failed to release authority");
        }
    }

    // -- Activation --

    /// Activate `key` on `client`. Returns `false` if it already was.
    pub fn activate(&mut self, key: ComponentKey, client: ClientId) -> Result<bool, WorldError> {
        self.sync();
        if self.world.component(key).is_none() {
            return Err(WorldError::UnknownComponent(key));
        }
        if !self.emitter.adapter_mut().add_activation(client, key) {
            return Ok(false);
        }
        if self.state().is_interested(client, key.entity) {
            self.emitter.activate_component(key, client);
        }
        Ok(true)
    }

    /// Deactivate `key` on `client`. Returns `false` if it was not active there.
    pub fn deactivate(&mut self, key: ComponentKey, client: ClientId) -> Result<bool, WorldError> {
        self.sync();
        if self.world.component(key).is_none() {
            return Err(WorldError::UnknownComponent(key));
        }
        if !self.emitter.adapter_mut().remove_activation(client, key) {
            return Ok(false);
        }
        if self.state().is_interested(client, key.entity) {
            self.emitter.deactivate_component(key, client);
        }
        Ok(true)
    }

    /// Cycle `key` on `client`: deactivate it if active there, then activate.
    pub fn reactivate(&mut self, key: ComponentKey, client: ClientId) -> Result<(), WorldError> {
        self.deactivate(key, client)?;
        self.activate(key, client)?;
        Ok(())
    }

    // -- Clients --

    /// Release everything `client` held without telling it. Authority goes
    /// back to the server.
    pub fn release_client(&mut self, client: ClientId) {
        self.sync();
        let records = self.emitter.adapter_mut().release_client(client);
        for key in records.authority {
            self.release_authority(client, key);
        }
        debug!(
            %client,
            interest = records.interest.len(),
            activations = records.activations.len(),
            "released client"
        );
        self.sync();
    }

    /// Apply an op received from `client`. Invalid or unauthorised ops are
    /// dropped.
    pub fn apply_server_op(&mut self, client: ClientId, op: ServerOp) {
        match op {
            ServerOp::Noop => {}
            ServerOp::AddEntityInterest(entity) => {
                if let Err(e) = self.add_interest(client, entity) {
                    debug!(%client, %entity, error = %e, "interest request dropped");
                }
            }
            ServerOp::RemoveEntityInterest(entity) => {
                self.remove_interest(client, entity);
            }
            ServerOp::UpdateComponent { key, field, value } => {
                self.sync();
                match self.world.apply_client_update(client, key, field, value) {
                    Ok(()) => self.sync(),
                    Err(e @ WorldError::AuthorityViolation { .. }) => {
                        debug!(%client, %key, error = %e, "update dropped");
                    }
                    Err(e) => warn!(%client, %key, error = %e, "update rejected"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use engine_component::{FieldId, FieldValue, ValueKind};
    use engine_net::ClientOp;
    use engine_schema::{ComponentType, FieldDef, Schema};

    use super::*;
    use crate::emitter::OutgoingOp;

    const A: ClientId = ClientId(1);
    const B: ClientId = ClientId(2);

    fn setup() -> (World, ClientOpEmitter<ViewState>, ComponentKey) {
        let mut schema = Schema::new();
        schema
            .register(ComponentType::new(
                "score",
                vec![FieldDef::new("value", ValueKind::Int)],
            ))
            .unwrap();
        let mut world = World::new(Arc::new(schema));
        let e = world.spawn();
        let key = world.add_component(e, "score").unwrap();
        world.drain_events();
        (world, ClientOpEmitter::new(ViewState::new()), key)
    }

    fn ops_for(ops: &[OutgoingOp], client: ClientId) -> Vec<ClientOp> {
        ops.iter()
            .filter(|o| o.recipients.contains(&client))
            .map(|o| o.op.clone())
            .collect()
    }

    #[test]
    fn test_delegate_moves_authority_between_clients() {
        let (mut world, mut emitter, key) = setup();
        let mut ctl = ServerController::new(&mut world, &mut emitter);
        ctl.add_interest(A, key.entity).unwrap();
        ctl.add_interest(B, key.entity).unwrap();
        ctl.emitter.take_ops();

        assert_eq!(ctl.delegate(key, A), Ok(true));
        assert_eq!(ctl.delegate(key, A), Ok(false));
        assert_eq!(ctl.delegate(key, B), Ok(true));
        let ops = ctl.emitter.take_ops();
        assert_eq!(
            ops_for(&ops, A),
            vec![ClientOp::DelegateComponent(key), ClientOp::UndelegateComponent(key)]
        );
        assert_eq!(ops_for(&ops, B), vec![ClientOp::DelegateComponent(key)]);
        assert_eq!(ctl.world().authority(key), Some(B));
        assert!(!ctl.state().holds_authority(A, key));
    }

    #[test]
    fn test_undelegate_only_by_owner() {
        let (mut world, mut emitter, key) = setup();
        let mut ctl = ServerController::new(&mut world, &mut emitter);
        ctl.delegate(key, A).unwrap();
        assert_eq!(ctl.undelegate(key, B), Ok(false));
        assert_eq!(ctl.undelegate(key, A), Ok(true));
        assert_eq!(ctl.world().authority(key), None);
    }

    #[test]
    fn test_reactivate_cycles_on_one_client() {
        let (mut world, mut emitter, key) = setup();
        let mut ctl = ServerController::new(&mut world, &mut emitter);
        ctl.add_interest(A, key.entity).unwrap();
        ctl.add_interest(B, key.entity).unwrap();
        ctl.activate(key, A).unwrap();
        ctl.emitter.take_ops();

        ctl.reactivate(key, A).unwrap();
        let ops = ctl.emitter.take_ops();
        assert_eq!(
            ops_for(&ops, A),
            vec![ClientOp::DeactivateComponent(key), ClientOp::ActivateComponent(key)]
        );
        assert!(ops_for(&ops, B).is_empty());
    }

    #[test]
    fn test_client_update_replicates_to_others() {
        let (mut world, mut emitter, key) = setup();
        let mut ctl = ServerController::new(&mut world, &mut emitter);
        ctl.add_interest(A, key.entity).unwrap();
        ctl.add_interest(B, key.entity).unwrap();
        ctl.delegate(key, A).unwrap();
        ctl.emitter.take_ops();

        let update = ServerOp::UpdateComponent {
            key,
            field: FieldId(0),
            value: Some(FieldValue::Int(3)),
        };
        ctl.apply_server_op(B, update.clone());
        assert!(ctl.emitter.ops().is_empty());

        ctl.apply_server_op(A, update);
        let ops = ctl.emitter.take_ops();
        assert!(ops_for(&ops, A).is_empty());
        assert_eq!(ops_for(&ops, B).len(), 1);
    }

    #[test]
    fn test_remove_interest_silently_releases_authority() {
        let (mut world, mut emitter, key) = setup();
        let mut ctl = ServerController::new(&mut world, &mut emitter);
        ctl.add_interest(A, key.entity).unwrap();
        ctl.delegate(key, A).unwrap();
        ctl.activate(key, A).unwrap();
        ctl.emitter.take_ops();

        assert!(ctl.remove_interest(A, key.entity));
        assert_eq!(
            ctl.emitter.take_ops(),
            vec![OutgoingOp {
                recipients: vec![A],
                op: ClientOp::RemoveEntity(key.entity),
            }]
        );
        assert_eq!(ctl.world().authority(key), None);
        assert!(!ctl.state().is_activated(A, key));
        assert!(!ctl.remove_interest(A, key.entity));
    }

    #[test]
    fn test_world_changes_reach_interested_clients() {
        let (mut world, mut emitter, key) = setup();
        let mut ctl = ServerController::new(&mut world, &mut emitter);
        ctl.add_interest(A, key.entity).unwrap();
        ctl.emitter.take_ops();

        ctl.world_mut()
            .set_field(key, FieldId(0), FieldValue::Int(9))
            .unwrap();
        ctl.sync();
        ctl.world_mut().remove_entity(key.entity).unwrap();
        ctl.sync();
        assert_eq!(
            ops_for(&ctl.emitter.take_ops(), A),
            vec![
                ClientOp::UpdateComponent {
                    key,
                    field: FieldId(0),
                    value: Some(FieldValue::Int(9)),
                },
                ClientOp::RemoveComponent(key),
                ClientOp::RemoveEntity(key.entity),
            ]
        );
        assert!(!ctl.state().is_interested(A, key.entity));
    }

    #[test]
    fn test_interest_in_unknown_entity() {
        let (mut world, mut emitter, _) = setup();
        let mut ctl = ServerController::new(&mut world, &mut emitter);
        assert_eq!(
            ctl.add_interest(A, EntityId(99)),
            Err(WorldError::UnknownEntity(EntityId(99)))
        );
        ctl.apply_server_op(A, ServerOp::AddEntityInterest(EntityId(99)));
        assert!(ctl.emitter.ops().is_empty());
    }
}
