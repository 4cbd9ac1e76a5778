//! Translation of world changes into per-client [`ClientOp`]s.
//!
//! The emitter never touches the network. It asks an [`EmitterAdapter`] who
//! should hear about a change and queues one [`OutgoingOp`] per change with
//! the resulting recipient list.

use engine_component::{ClientId, ComponentKey, EntityId, FieldId, FieldValue};
use engine_ecs::Entity;
use engine_net::ClientOp;

/// Answers the fan-out questions the emitter asks. Each call appends into a
/// caller-provided buffer, which the emitter clears first.
pub trait EmitterAdapter {
    /// Clients interested in `entity`.
    fn prepare_entity_interest(&self, entity: EntityId, out: &mut Vec<ClientId>);

    /// Components `client` holds authority over.
    fn prepare_client_authority(&self, client: ClientId, out: &mut Vec<ComponentKey>);

    /// Components activated on `client`.
    fn prepare_client_activations(&self, client: ClientId, out: &mut Vec<ComponentKey>);
}

/// One op and the clients it goes to.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingOp {
    pub recipients: Vec<ClientId>,
    pub op: ClientOp,
}

pub struct ClientOpEmitter<A> {
    adapter: A,
    queue: Vec<OutgoingOp>,
    clients: Vec<ClientId>,
}

impl<A: EmitterAdapter> ClientOpEmitter<A> {
    pub fn new(adapter: A) -> Self {
        Self {
            adapter,
            queue: Vec::new(),
            clients: Vec::new(),
        }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    /// Ops queued since the last [`ClientOpEmitter::take_ops`].
    #[must_use]
    pub fn ops(&self) -> &[OutgoingOp] {
        &self.queue
    }

    pub fn take_ops(&mut self) -> Vec<OutgoingOp> {
        std::mem::take(&mut self.queue)
    }

    fn push(&mut self, recipients: Vec<ClientId>, op: ClientOp) {
        if !recipients.is_empty() {
            self.queue.push(OutgoingOp { recipients, op });
        }
    }

    fn to_client(&mut self, client: ClientId, op: ClientOp) {
        self.push(vec![client], op);
    }

    fn to_interested(&mut self, entity: EntityId, exclude: Option<ClientId>, op: ClientOp) {
        self.clients.clear();
        self.adapter.prepare_entity_interest(entity, &mut self.clients);
        let recipients: Vec<ClientId> = self
            .clients
            .iter()
            .copied()
            .filter(|&c| Some(c) != exclude)
            .collect();
        self.push(recipients, op);
    }

    /// Send `client` a full snapshot of `entity`.
    ///
    /// Per component, in the entity's order: `AddComponent`, one
    /// `UpdateComponent` per set field, `ActivateComponent` if the component is
    /// activated on the client, `DelegateComponent` if the client holds its
    /// authority.
    pub fn checkout_entity(&mut self, entity: &Entity, client: ClientId) {
        let mut authority = Vec::new();
        let mut activations = Vec::new();
        self.adapter.prepare_client_authority(client, &mut authority);
        self.adapter.prepare_client_activations(client, &mut activations);

        self.to_client(client, ClientOp::AddEntity(entity.id()));
        for component in entity.components() {
            let key = component.key();
            self.to_client(client, ClientOp::AddComponent(key));
            for (field, value) in component.set_values() {
                self.to_client(
                    client,
                    ClientOp::UpdateComponent {
                        key,
                        field,
                        value: Some(value.clone()),
                    },
                );
            }
            if activations.contains(&key) {
                self.to_client(client, ClientOp::ActivateComponent(key));
            }
            if authority.contains(&key) {
                self.to_client(client, ClientOp::DelegateComponent(key));
            }
        }
    }

    /// Tell `client` to drop everything it knows about `entity`.
    pub fn uncheckout_entity(&mut self, entity: EntityId, client: ClientId) {
        self.to_client(client, ClientOp::RemoveEntity(entity));
    }

    pub fn add_entity(&mut self, entity: EntityId) {
        self.to_interested(entity, None, ClientOp::AddEntity(entity));
    }

    pub fn remove_entity(&mut self, entity: EntityId) {
        self.to_interested(entity, None, ClientOp::RemoveEntity(entity));
    }

    pub fn add_component(&mut self, key: ComponentKey) {
        self.to_interested(key.entity, None, ClientOp::AddComponent(key));
    }

    /// Fan a field write out to the entity's interest set, skipping the client
    /// the write came from.
    pub fn update_component(
        &mut self,
        key: ComponentKey,
        field: FieldId,
        value: Option<FieldValue>,
        source: Option<ClientId>,
    ) {
        self.to_interested(
            key.entity,
            source,
            ClientOp::UpdateComponent { key, field, value },
        );
    }

    pub fn remove_component(&mut self, key: ComponentKey) {
        self.to_interested(key.entity, None, ClientOp::RemoveComponent(key));
    }

    pub fn delegate_component(&mut self, key: ComponentKey, client: ClientId) {
        self.to_client(client, ClientOp::DelegateComponent(key));
    }

    pub fn undelegate_component(&mut self, key: ComponentKey, client: ClientId) {
        self.to_client(client, ClientOp::UndelegateComponent(key));
    }

    pub fn activate_component(&mut self, key: ComponentKey, client: ClientId) {
        self.to_client(client, ClientOp::ActivateComponent(key));
    }

    pub fn deactivate_component(&mut self, key: ComponentKey, client: ClientId) {
        self.to_client(client, ClientOp::DeactivateComponent(key));
    }
}
