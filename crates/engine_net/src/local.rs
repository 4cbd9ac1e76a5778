//! In-memory transport.
//!
//! [`LocalNetwork`] is a cheap, cloneable handle to a shared event queue. The
//! server side polls it as a [`NetworkAdapter`]; the client side (tests, demos)
//! drives connects, messages and disconnects through another clone and reads
//! back what the server sent.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use crate::adapter::{ClientHandle, NetworkAdapter, NetworkEvent};

#[derive(Debug, Default)]
struct LocalState {
    next_handle: u64,
    events: VecDeque<NetworkEvent>,
    /// Messages sent to each open handle, oldest first.
    outboxes: HashMap<ClientHandle, Vec<Vec<u8>>>,
}

#[derive(Debug, Clone, Default)]
pub struct LocalNetwork {
    state: Rc<RefCell<LocalState>>,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new connection and queue its `Connected` event.
    pub fn connect(&self) -> ClientHandle {
        let mut state = self.state.borrow_mut();
        state.next_handle += 1;
        let handle = ClientHandle(state.next_handle);
        state.outboxes.insert(handle, Vec::new());
        state.events.push_back(NetworkEvent::Connected(handle));
        handle
    }

    /// Queue a message from `handle` to the server.
    pub fn send(&self, handle: ClientHandle, bytes: Vec<u8>) {
        self.state
            .borrow_mut()
            .events
            .push_back(NetworkEvent::Message(handle, bytes));
    }

    /// Close a connection and queue its `Disconnected` event.
    pub fn disconnect(&self, handle: ClientHandle, reason: &str) {
        let mut state = self.state.borrow_mut();
        state.outboxes.remove(&handle);
        state
            .events
            .push_back(NetworkEvent::Disconnected(handle, reason.to_string()));
    }

    /// Take everything the server sent to `handle` so far.
    pub fn take_sent(&self, handle: ClientHandle) -> Vec<Vec<u8>> {
        self.state
            .borrow_mut()
            .outboxes
            .get_mut(&handle)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    /// Number of queued events the server has not polled yet.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.borrow().events.len()
    }
}

impl NetworkAdapter for LocalNetwork {
    fn send_message(&mut self, handle: ClientHandle, bytes: &[u8]) -> bool {
        match self.state.borrow_mut().outboxes.get_mut(&handle) {
            Some(outbox) => {
                outbox.push(bytes.to_vec());
                true
            }
            None => false,
        }
    }

    fn receive_event(&mut self) -> Option<NetworkEvent> {
        self.state.borrow_mut().events.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_arrive_in_order() {
        let net = LocalNetwork::new();
        let mut server = net.clone();
        let h = net.connect();
        net.send(h, vec![1]);
        net.disconnect(h, "done");

        assert_eq!(server.receive_event(), Some(NetworkEvent::Connected(h)));
        assert_eq!(server.receive_event(), Some(NetworkEvent::Message(h, vec![1])));
        assert_eq!(
            server.receive_event(),
            Some(NetworkEvent::Disconnected(h, "done".into()))
        );
        assert_eq!(server.receive_event(), None);
    }

    #[test]
    fn test_send_to_closed_handle_fails() {
        let net = LocalNetwork::new();
        let mut server = net.clone();
        let h = net.connect();
        assert!(server.send_message(h, &[7]));
        assert_eq!(net.take_sent(h), vec![vec![7]]);

        net.disconnect(h, "gone");
        assert!(!server.send_message(h, &[8]));
        assert!(net.take_sent(h).is_empty());
    }
}
