//! Per-connection lifecycle on top of a [`NetworkAdapter`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use engine_component::ClientId;
use engine_schema::ComponentTypeIndexer;
use tracing::{debug, info, warn};

use crate::adapter::{ClientHandle, NetworkAdapter, NetworkEvent};
use crate::error::CodecError;
use crate::op::{ClientOp, ServerOp};

/// Receives the decoded results of [`ClientConnectionManager::update`].
pub trait ConnectionHandler {
    fn on_client_connected(&mut self, client: ClientId);

    fn on_client_disconnected(&mut self, client: ClientId, reason: &str);

    fn on_server_op(&mut self, client: ClientId, op: ServerOp);
}

/// Maps transport handles to client ids, decodes inbound [`ServerOp`]s and
/// encodes outbound [`ClientOp`]s.
pub struct ClientConnectionManager<A> {
    adapter: A,
    indexer: Arc<ComponentTypeIndexer>,
    by_handle: HashMap<ClientHandle, ClientId>,
    by_client: BTreeMap<ClientId, ClientHandle>,
    next_client: u32,
    scratch: Vec<u8>,
}

impl<A: NetworkAdapter> ClientConnectionManager<A> {
    pub fn new(adapter: A, indexer: Arc<ComponentTypeIndexer>) -> Self {
        Self {
            adapter,
            indexer,
            by_handle: HashMap::new(),
            by_client: BTreeMap::new(),
            next_client: 1,
            scratch: Vec::new(),
        }
    }

    #[must_use]
    pub fn indexer(&self) -> &Arc<ComponentTypeIndexer> {
        &self.indexer
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    #[must_use]
    pub fn is_connected(&self, client: ClientId) -> bool {
        self.by_client.contains_key(&client)
    }

    /// Connected clients in id order.
    pub fn clients(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.by_client.keys().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_client.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_client.is_empty()
    }

    /// Process at most one transport event. Returns `1` if an event was
    /// handled, `0` if there was none or it was dropped.
    pub fn update(&mut self, handler: &mut impl ConnectionHandler) -> usize {
        self.poll(handler).unwrap_or(0)
    }

    /// Process every queued transport event. Dropped events do not stop the
    /// drain. Returns how many were handled.
    pub fn drain(&mut self, handler: &mut impl ConnectionHandler) -> usize {
        let mut handled = 0;
        while let Some(n) = self.poll(handler) {
            handled += n;
        }
        handled
    }

    /// Like [`update`](Self::update), but tells an empty queue (`None`) apart
    /// from a dropped event (`Some(0)`).
    pub fn poll(&mut self, handler: &mut impl ConnectionHandler) -> Option<usize> {
        let event = self.adapter.receive_event()?;
        let handled = match event {
            NetworkEvent::Connected(handle) => {
                if self.by_handle.contains_key(&handle) {
                    warn!(%handle, "duplicate connect, ignoring");
                    return Some(0);
                }
                let client = ClientId(self.next_client);
                self.next_client += 1;
                self.by_handle.insert(handle, client);
                self.by_client.insert(client, handle);
                info!(%client, %handle, "client connected");
                handler.on_client_connected(client);
                1
            }
            NetworkEvent::Message(handle, bytes) => {
                let Some(&client) = self.by_handle.get(&handle) else {
                    debug!(%handle, "message from unknown handle dropped");
                    return Some(0);
                };
                match ServerOp::decode(&self.indexer, &bytes) {
                    Ok(op) => {
                        handler.on_server_op(client, op);
                        1
                    }
                    Err(err) => {
                        warn!(%client, error = %err, len = bytes.len(), "malformed message dropped");
                        0
                    }
                }
            }
            NetworkEvent::Disconnected(handle, reason) => {
                let Some(client) = self.by_handle.remove(&handle) else {
                    debug!(%handle, "disconnect from unknown handle");
                    return Some(0);
                };
                self.by_client.remove(&client);
                info!(%client, %reason, "client disconnected");
                handler.on_client_disconnected(client, &reason);
                1
            }
        };
        Some(handled)
    }

    /// Serialize `op` once and send it to every listed client that is still
    /// connected. Returns how many sends the transport accepted.
    pub fn send_client_op(
        &mut self,
        clients: &[ClientId],
        op: &ClientOp,
    ) -> Result<usize, CodecError> {
        self.scratch.clear();
        op.serialize(&self.indexer, &mut self.scratch)?;

        let mut delivered = 0;
        for client in clients {
            let Some(&handle) = self.by_client.get(client) else {
                debug!(%client, "skipping send to unknown client");
                continue;
            };
            if self.adapter.send_message(handle, &self.scratch) {
                delivered += 1;
            }
        }
        Ok(delivered)
    }
}
