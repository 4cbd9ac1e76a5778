//! The server-side replication service.
//!
//! [`ViewSynchronizer`] owns the world, the op emitter and the connection
//! manager. Each [`ViewSynchronizer::update`] handles one network event and
//! flushes whatever ops it produced.

use std::sync::Arc;

use engine_component::ClientId;
use engine_ecs::World;
use engine_net::{
    ClientConnectionManager, ConnectionHandler, NetworkAdapter, ServerOp,
};
use engine_schema::ComponentTypeIndexer;
use tracing::warn;

use crate::controller::ServerController;
use crate::emitter::{ClientOpEmitter, OutgoingOp};
use crate::state::ViewState;

/// Hooks for the hosting application. Both run after the connection manager
/// has updated its mapping; on disconnect, the client's records are already
/// released.
pub trait ViewCallbacks {
    fn on_client_connected(&mut self, _controller: &mut ServerController<'_>, _client: ClientId) {}

    fn on_client_disconnected(
        &mut self,
        _controller: &mut ServerController<'_>,
        _client: ClientId,
        _reason: &str,
    ) {
    }
}

impl ViewCallbacks for () {}

pub struct ViewSynchronizer<A> {
    world: World,
    emitter: ClientOpEmitter<ViewState>,
    connections: ClientConnectionManager<A>,
}

impl<A: NetworkAdapter> ViewSynchronizer<A> {
    /// Serve `world` over `adapter`, indexing types in schema order.
    pub fn new(world: World, adapter: A) -> Self {
        let indexer = Arc::new(ComponentTypeIndexer::from_schema(world.schema()));
        Self::with_indexer(world, adapter, indexer)
    }

    pub fn with_indexer(world: World, adapter: A, indexer: Arc<ComponentTypeIndexer>) -> Self {
        Self {
            world,
            emitter: ClientOpEmitter::new(ViewState::new()),
            connections: ClientConnectionManager::new(adapter, indexer),
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Direct world access. Changes are replicated on the next flush.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn state(&self) -> &ViewState {
        self.emitter.adapter()
    }

    pub fn connections(&self) -> &ClientConnectionManager<A> {
        &self.connections
    }

    pub fn indexer(&self) -> &Arc<ComponentTypeIndexer> {
        self.connections.indexer()
    }

    /// Interest, authority and activation control. Ops it produces are sent
    /// on the next flush.
    pub fn controller(&mut self) -> ServerController<'_> {
        ServerController::new(&mut self.world, &mut self.emitter)
    }

    /// Process at most one network event, then flush. Returns `1` if an event
    /// was handled and `0` otherwise; call it until it returns `0` to drain
    /// the queue.
    pub fn update(&mut self, callbacks: &mut impl ViewCallbacks) -> usize {
        let mut dispatch = Dispatch {
            controller: ServerController::new(&mut self.world, &mut self.emitter),
            callbacks,
        };
        let handled = self.connections.update(&mut dispatch);
        self.flush();
        handled
    }

    /// Process every queued network event, then flush. Unlike looping on
    /// [`update`](Self::update), a dropped message does not end the drain.
    /// Returns the number of events handled.
    pub fn drain(&mut self, callbacks: &mut impl ViewCallbacks) -> usize {
        let mut dispatch = Dispatch {
            controller: ServerController::new(&mut self.world, &mut self.emitter),
            callbacks,
        };
        let handled = self.connections.drain(&mut dispatch);
        self.flush();
        handled
    }

    /// Advance the world by `dt` and flush the resulting ops.
    pub fn tick(&mut self, dt: f32) -> usize {
        self.world.update(dt);
        self.flush()
    }

    /// Replicate pending world changes and send every queued op. Returns the
    /// number of messages the transport accepted.
    pub fn flush(&mut self) -> usize {
        self.controller().sync();
        let mut sent = 0;
        for OutgoingOp { recipients, op } in self.emitter.take_ops() {
            match self.connections.send_client_op(&recipients, &op) {
                Ok(n) => sent += n,
                Err(e) => warn!(error = %e, ?op, "op not sent"),
            }
        }
        sent
    }
}

struct Dispatch<'a, C> {
    controller: ServerController<'a>,
    callbacks: &'a mut C,
}

impl<C: ViewCallbacks> ConnectionHandler for Dispatch<'_, C> {
    fn on_client_connected(&mut self, client: ClientId) {
        self.callbacks.on_client_connected(&mut self.controller, client);
    }

    fn on_client_disconnected(&mut self, client: ClientId, reason: &str) {
        self.controller.release_client(client);
        self.callbacks
            .on_client_disconnected(&mut self.controller, client, reason);
    }

    fn on_server_op(&mut self, client: ClientId, op: ServerOp) {
        self.controller.apply_server_op(client, op);
    }
}

#[cfg(test)]
mod tests {
    use engine_component::{ComponentKey, FieldId, FieldValue};
    use engine_net::{ClientHandle, ClientOp, LocalNetwork};
    use engine_schema::Schema;

    use super::*;

    const SCHEMA: &str = r#"
        [
            { "name": "position", "fields": [ { "name": "value", "kind": "vec3" } ] },
            {
                "name": "client",
                "fields": [
                    { "name": "position", "kind": "entity", "dependency": "position" },
                    { "name": "nickname", "kind": "string", "optional": true }
                ]
            }
        ]
    "#;

    const POSITION: FieldId = FieldId(0);

    #[derive(Default)]
    struct Recorder {
        connected: Vec<ClientId>,
        disconnected: Vec<(ClientId, String)>,
    }

    impl ViewCallbacks for Recorder {
        fn on_client_connected(&mut self, _controller: &mut ServerController<'_>, client: ClientId) {
            self.connected.push(client);
        }

        fn on_client_disconnected(
            &mut self,
            controller: &mut ServerController<'_>,
            client: ClientId,
            reason: &str,
        ) {
            assert!(controller.state().interest_of(client).next().is_none());
            self.disconnected.push((client, reason.to_string()));
        }
    }

    struct Fixture {
        sync: ViewSynchronizer<LocalNetwork>,
        net: LocalNetwork,
        callbacks: Recorder,
        client_key: ComponentKey,
    }

    impl Fixture {
        fn new() -> Self {
            let schema = Arc::new(Schema::from_json_str(SCHEMA).unwrap());
            let mut world = World::new(schema);
            let e = world.spawn();
            world.add_component(e, "position").unwrap();
            let client_key = world.add_component(e, "client").unwrap();
            let net = LocalNetwork::new();
            Self {
                sync: ViewSynchronizer::new(world, net.clone()),
                net,
                callbacks: Recorder::default(),
                client_key,
            }
        }

        fn drain(&mut self) {
            while self.sync.update(&mut self.callbacks) > 0 {}
        }

        fn send(&self, handle: ClientHandle, op: &ServerOp) {
            self.net.send(handle, op.encode(self.sync.indexer()).unwrap());
        }

        fn received(&self, handle: ClientHandle) -> Vec<ClientOp> {
            self.net
                .take_sent(handle)
                .iter()
                .map(|bytes| ClientOp::decode(self.sync.indexer(), bytes).unwrap())
                .collect()
        }
    }

    #[test]
    fn test_update_handles_one_event_at_a_time() {
        let mut f = Fixture::new();
        f.net.connect();
        f.net.connect();
        assert_eq!(f.sync.update(&mut f.callbacks), 1);
        assert_eq!(f.net.pending(), 1);
        assert_eq!(f.sync.update(&mut f.callbacks), 1);
        assert_eq!(f.sync.update(&mut f.callbacks), 0);
        assert_eq!(f.callbacks.connected, vec![ClientId(1), ClientId(2)]);
    }

    #[test]
    fn test_checkout_reaches_only_interested_client() {
        let mut f = Fixture::new();
        let a = f.net.connect();
        let b = f.net.connect();
        f.drain();

        let entity = f.client_key.entity;
        f.send(a, &ServerOp::AddEntityInterest(entity));
        f.drain();

        let ops = f.received(a);
        assert_eq!(ops[0], ClientOp::AddEntity(entity));
        assert!(ops.contains(&ClientOp::AddComponent(f.client_key)));
        assert!(f.received(b).is_empty());

        // Later changes follow the same interest set.
        f.sync
            .world_mut()
            .set_field(f.client_key, FieldId(1), FieldValue::String("ada".into()))
            .unwrap();
        f.sync.flush();
        assert_eq!(f.received(a).len(), 1);
        assert!(f.received(b).is_empty());
    }

    #[test]
    fn test_two_client_delegation_scenario() {
        let mut f = Fixture::new();
        let a = f.net.connect();
        let b = f.net.connect();
        f.drain();
        let entity = f.client_key.entity;
        f.send(a, &ServerOp::AddEntityInterest(entity));
        f.send(b, &ServerOp::AddEntityInterest(entity));
        f.drain();

        f.sync.controller().delegate(f.client_key, ClientId(1)).unwrap();
        f.sync.flush();
        assert_eq!(f.received(b).len(), 3);
        let a_ops = f.received(a);
        assert_eq!(a_ops.last(), Some(&ClientOp::DelegateComponent(f.client_key)));

        let update = ServerOp::UpdateComponent {
            key: f.client_key,
            field: POSITION,
            value: Some(FieldValue::Entity(entity)),
        };
        f.send(a, &update);
        assert_eq!(f.sync.update(&mut f.callbacks), 1);
        assert_eq!(
            f.received(b),
            vec![ClientOp::UpdateComponent {
                key: f.client_key,
                field: POSITION,
                value: Some(FieldValue::Entity(entity)),
            }]
        );
        assert!(f.received(a).is_empty());

        // Same op from the non-owner: dropped, nothing echoed.
        f.send(b, &update);
        f.drain();
        assert!(f.received(a).is_empty());
        assert!(f.received(b).is_empty());
    }

    #[test]
    fn test_non_owner_update_changes_nothing() {
        let mut f = Fixture::new();
        let a = f.net.connect();
        f.drain();
        f.send(a, &ServerOp::AddEntityInterest(f.client_key.entity));
        f.drain();
        f.received(a);

        f.send(
            a,
            &ServerOp::UpdateComponent {
                key: f.client_key,
                field: FieldId(1),
                value: Some(FieldValue::String("mallory".into())),
            },
        );
        f.drain();
        assert!(f.received(a).is_empty());
        let component = f.sync.world().component(f.client_key).unwrap();
        assert_eq!(component.value(FieldId(1)), None);
    }

    #[test]
    fn test_disconnect_releases_authority() {
        let mut f = Fixture::new();
        let a = f.net.connect();
        f.drain();
        f.send(a, &ServerOp::AddEntityInterest(f.client_key.entity));
        f.drain();
        f.sync.controller().delegate(f.client_key, ClientId(1)).unwrap();
        f.sync.flush();

        f.net.disconnect(a, "timeout");
        assert_eq!(f.sync.update(&mut f.callbacks), 1);
        assert_eq!(
            f.callbacks.disconnected,
            vec![(ClientId(1), "timeout".to_string())]
        );
        assert_eq!(f.sync.world().authority(f.client_key), None);
        assert!(!f.sync.state().holds_authority(ClientId(1), f.client_key));
    }

    #[test]
    fn test_garbage_is_dropped_and_connection_kept() {
        let mut f = Fixture::new();
        let a = f.net.connect();
        f.drain();
        f.net.send(a, vec![0xEE]);
        assert_eq!(f.sync.update(&mut f.callbacks), 0);
        assert!(f.sync.connections().is_connected(ClientId(1)));
    }

    #[test]
    fn test_removed_entity_reaches_interested_clients() {
        let mut f = Fixture::new();
        let a = f.net.connect();
        f.drain();
        let entity = f.client_key.entity;
        f.send(a, &ServerOp::AddEntityInterest(entity));
        f.drain();
        f.received(a);

        f.sync.world_mut().remove_entity(entity).unwrap();
        f.sync.flush();
        let ops = f.received(a);
        assert_eq!(ops.last(), Some(&ClientOp::RemoveEntity(entity)));
        assert!(!f.sync.state().is_interested(ClientId(1), entity));
    }
}
