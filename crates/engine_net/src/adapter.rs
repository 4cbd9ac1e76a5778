//! The transport seam between the connection manager and a real network.

/// Opaque transport-level identifier of one peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientHandle(pub u64);

impl std::fmt::Display for ClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handle({})", self.0)
    }
}

/// Something that happened on the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    Connected(ClientHandle),
    /// One complete message. Transports preserve message boundaries.
    Message(ClientHandle, Vec<u8>),
    Disconnected(ClientHandle, String),
}

/// A message-oriented transport polled from the server loop.
pub trait NetworkAdapter {
    /// Queue `bytes` for delivery to `handle`. Returns `false` if the handle
    /// is not connected.
    fn send_message(&mut self, handle: ClientHandle, bytes: &[u8]) -> bool;

    /// Take the next pending event without blocking.
    fn receive_event(&mut self) -> Option<NetworkEvent>;
}
