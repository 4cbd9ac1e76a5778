//! NATS-backed [`NetworkAdapter`].
//!
//! Inbound traffic is collected by a tokio task that owns the subscriptions
//! and forwards [`NetworkEvent`]s over a channel. The adapter itself is polled
//! synchronously from the server loop; sends are handed to the runtime as
//! fire-and-forget publishes.

use std::sync::Arc;

use async_nats::{Client, Message, Subscriber};
use dashmap::DashMap;
use futures::StreamExt;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapter::{ClientHandle, NetworkAdapter, NetworkEvent};
use crate::control::{self, ConnectRequest, DisconnectNotice};
use crate::error::NetError;
use crate::subjects;

/// Default NATS server URL.
pub const DEFAULT_NATS_URL: &str = "nats://localhost:4222";

/// The environment variable used to override the NATS URL.
pub const NATS_URL_ENV: &str = "NATS_URL";

/// Bidirectional handle ↔ client uuid registry, shared with the inbound task.
#[derive(Debug, Default)]
struct Peers {
    by_handle: DashMap<ClientHandle, Uuid>,
    by_uuid: DashMap<Uuid, ClientHandle>,
}

pub struct NatsNetworkAdapter {
    client: Client,
    prefix: String,
    runtime: Handle,
    peers: Arc<Peers>,
    events: mpsc::UnboundedReceiver<NetworkEvent>,
    inbound: JoinHandle<()>,
}

impl NatsNetworkAdapter {
    /// Connect to NATS at `url` and start listening under `prefix`.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`NetError`] if the connection or a subscription fails.
    pub async fn connect(url: &str, prefix: &str) -> Result<Self, NetError> {
        info!(url, "connecting to NATS");
        let client = async_nats::connect(url).await?;
        info!("NATS connection established");
        Self::with_client(client, prefix).await
    }

    /// Start listening under `prefix` on an existing connection.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Subscribe`] if a subscription fails.
    pub async fn with_client(client: Client, prefix: &str) -> Result<Self, NetError> {
        let connects = client.subscribe(subjects::connect(prefix)).await?;
        let disconnects = client.subscribe(subjects::disconnect(prefix)).await?;
        let ups = client.subscribe(subjects::all_client_up(prefix)).await?;
        info!(prefix, "listening for view clients");

        let peers = Arc::new(Peers::default());
        let (tx, events) = mpsc::unbounded_channel();
        let inbound = tokio::spawn(run_inbound(
            prefix.to_string(),
            Arc::clone(&peers),
            tx,
            connects,
            disconnects,
            ups,
        ));

        Ok(Self {
            client,
            prefix: prefix.to_string(),
            runtime: Handle::current(),
            peers,
            events,
            inbound,
        })
    }

    /// Number of clients currently announced.
    #[must_use]
    pub fn peer_count(&self) -> usize {
        self.peers.by_handle.len()
    }
}

impl NetworkAdapter for NatsNetworkAdapter {
    fn send_message(&mut self, handle: ClientHandle, bytes: &[u8]) -> bool {
        let Some(uuid) = self.peers.by_handle.get(&handle).map(|e| *e.value()) else {
            return false;
        };
        let client = self.client.clone();
        let subject = subjects::client_down(&self.prefix, uuid);
        let payload = bytes.to_vec();
        self.runtime.spawn(async move {
            if let Err(e) = client.publish(subject, payload.into()).await {
                warn!(%e, "failed to publish op");
            }
        });
        true
    }

    fn receive_event(&mut self) -> Option<NetworkEvent> {
        self.events.try_recv().ok()
    }
}

impl Drop for NatsNetworkAdapter {
    fn drop(&mut self) {
        self.inbound.abort();
    }
}

async fn run_inbound(
    prefix: String,
    peers: Arc<Peers>,
    tx: mpsc::UnboundedSender<NetworkEvent>,
    mut connects: Subscriber,
    mut disconnects: Subscriber,
    mut ups: Subscriber,
) {
    let mut next_handle = 0u64;
    loop {
        let event = tokio::select! {
            Some(msg) = connects.next() => on_connect(&peers, &mut next_handle, &msg),
            Some(msg) = disconnects.next() => on_disconnect(&peers, &msg),
            Some(msg) = ups.next() => on_up(&prefix, &peers, msg),
            else => break,
        };
        if let Some(event) = event
            && tx.send(event).is_err()
        {
            break;
        }
    }
    debug!("inbound NATS task finished");
}

fn on_connect(peers: &Peers, next_handle: &mut u64, msg: &Message) -> Option<NetworkEvent> {
    let request: ConnectRequest = match control::decode(&msg.payload) {
        Ok(request) => request,
        Err(e) => {
            warn!(%e, "malformed connect request");
            return None;
        }
    };
    if peers.by_uuid.contains_key(&request.client) {
        debug!(client = %request.client, "repeated connect ignored");
        return None;
    }
    *next_handle += 1;
    let handle = ClientHandle(*next_handle);
    peers.by_handle.insert(handle, request.client);
    peers.by_uuid.insert(request.client, handle);
    Some(NetworkEvent::Connected(handle))
}

fn on_disconnect(peers: &Peers, msg: &Message) -> Option<NetworkEvent> {
    let notice: DisconnectNotice = match control::decode(&msg.payload) {
        Ok(notice) => notice,
        Err(e) => {
            warn!(%e, "malformed disconnect notice");
            return None;
        }
    };
    let (_, handle) = peers.by_uuid.remove(&notice.client)?;
    peers.by_handle.remove(&handle);
    Some(NetworkEvent::Disconnected(handle, notice.reason))
}

fn on_up(prefix: &str, peers: &Peers, msg: Message) -> Option<NetworkEvent> {
    let uuid = subjects::parse_client_up(prefix, msg.subject.as_str())?;
    let Some(handle) = peers.by_uuid.get(&uuid).map(|e| *e.value()) else {
        debug!(client = %uuid, "message from unannounced client");
        return None;
    };
    Some(NetworkEvent::Message(handle, msg.payload.to_vec()))
}
