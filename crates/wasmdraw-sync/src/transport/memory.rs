//! In-memory transport and relay.
//!
//! `MemoryTransport` stands in for a websocket: tests script its events and
//! inspect what was sent. Attached to a [`MemoryRelay`] it behaves like a
//! client of a real relay, delivering every frame to the other members of
//! its room in send order.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use url::Url;

use super::{Transport, TransportEvent};
use crate::error::{SyncError, SyncResult};

#[derive(Debug, Default)]
struct Link {
    connected: bool,
    connects: Vec<Url>,
    sent: Vec<String>,
    close_requests: Vec<(u16, String)>,
    events: VecDeque<TransportEvent>,
    fail_next_connect: Option<String>,
    fail_sends: bool,
    hold_close_ack: bool,
    membership: Option<usize>,
}

/// Shared handle to an in-memory connection. Clones see the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    link: Rc<RefCell<Link>>,
    relay: Option<MemoryRelay>,
}

impl MemoryTransport {
    /// A standalone transport; open and close signals are scripted by hand.
    pub fn new() -> Self {
        Self::default()
    }

    // --- Scripting ---

    /// Complete the opening handshake.
    pub fn accept(&self) {
        self.push_event(TransportEvent::Opened);
    }

    /// Deliver a text frame as if a peer had sent it.
    pub fn deliver(&self, text: &str) {
        self.push_event(TransportEvent::Message(text.to_string()));
    }

    /// Simulate the relay dropping the connection.
    pub fn drop_connection(&self, code: Option<u16>, reason: &str) {
        self.leave_relay();
        self.push_event(TransportEvent::Closed {
            code,
            reason: reason.to_string(),
        });
    }

    /// Report an asynchronous construction failure (unreachable endpoint).
    pub fn fail_connect(&self, message: &str) {
        self.push_event(TransportEvent::Failed(message.to_string()));
    }

    /// Report a transport error without closing.
    pub fn report_error(&self, message: &str) {
        self.push_event(TransportEvent::Error(message.to_string()));
    }

    /// Make the next `connect` fail synchronously.
    pub fn fail_next_connect(&self, message: &str) {
        self.link.borrow_mut().fail_next_connect = Some(message.to_string());
    }

    /// Make every `send` fail until reset.
    pub fn set_fail_sends(&self, fail: bool) {
        self.link.borrow_mut().fail_sends = fail;
    }

    /// Leave close requests unanswered, like a socket still busy connecting.
    pub fn hold_close_ack(&self, hold: bool) {
        self.link.borrow_mut().hold_close_ack = hold;
    }

    pub fn push_event(&self, event: TransportEvent) {
        self.link.borrow_mut().events.push_back(event);
    }

    // --- Inspection ---

    /// Number of successful `connect` calls.
    pub fn connect_count(&self) -> usize {
        self.link.borrow().connects.len()
    }

    /// URL of the most recent `connect`.
    pub fn last_url(&self) -> Option<Url> {
        self.link.borrow().connects.last().cloned()
    }

    /// Frames sent so far.
    pub fn sent(&self) -> Vec<String> {
        self.link.borrow().sent.clone()
    }

    /// Take the frames sent so far.
    pub fn take_sent(&self) -> Vec<String> {
        std::mem::take(&mut self.link.borrow_mut().sent)
    }

    /// `(code, reason)` of every close request.
    pub fn close_requests(&self) -> Vec<(u16, String)> {
        self.link.borrow().close_requests.clone()
    }

    /// Check if a handle is held.
    pub fn is_connected(&self) -> bool {
        self.link.borrow().connected
    }

    fn leave_relay(&self) {
        let membership = self.link.borrow_mut().membership.take();
        if let (Some(relay), Some(id)) = (&self.relay, membership) {
            relay.leave(id);
        }
    }
}

impl Transport for MemoryTransport {
    fn connect(&mut self, url: &Url) -> SyncResult<()> {
        {
            let mut link = self.link.borrow_mut();
            if link.connected {
                return Err(SyncError::Construction("Already connected".to_string()));
            }
            if let Some(message) = link.fail_next_connect.take() {
                return Err(SyncError::Construction(message));
            }
            link.connected = true;
            link.connects.push(url.clone());
        }

        if let Some(relay) = &self.relay {
            let room = url
                .query_pairs()
                .find(|(key, _)| key == "room")
                .map(|(_, value)| value.into_owned())
                .unwrap_or_default();
            let id = relay.join(&room, Rc::downgrade(&self.link));
            self.link.borrow_mut().membership = Some(id);
            self.accept();
        }
        Ok(())
    }

    fn send(&mut self, text: &str) -> SyncResult<()> {
        let membership = {
            let mut link = self.link.borrow_mut();
            if !link.connected {
                return Err(SyncError::Transport("Not connected".to_string()));
            }
            if link.fail_sends {
                return Err(SyncError::Transport("Send failed".to_string()));
            }
            link.sent.push(text.to_string());
            link.membership
        };
        if let (Some(relay), Some(id)) = (&self.relay, membership) {
            relay.broadcast(id, text);
        }
        Ok(())
    }

    fn close(&mut self, code: u16, reason: &str) {
        let acknowledge = {
            let mut link = self.link.borrow_mut();
            link.close_requests.push((code, reason.to_string()));
            link.connected && !link.hold_close_ack
        };
        if acknowledge {
            // The peer acknowledges immediately.
            self.leave_relay();
            self.push_event(TransportEvent::Closed {
                code: Some(code),
                reason: reason.to_string(),
            });
        }
    }

    fn release(&mut self) {
        self.leave_relay();
        let mut link = self.link.borrow_mut();
        link.connected = false;
        link.events.clear();
    }

    fn poll_events(&mut self) -> Vec<TransportEvent> {
        self.link.borrow_mut().events.drain(..).collect()
    }
}

#[derive(Debug)]
struct Member {
    id: usize,
    room: String,
    link: Weak<RefCell<Link>>,
}

#[derive(Debug, Default)]
struct RelayState {
    next_id: usize,
    members: Vec<Member>,
}

/// In-process relay: routes frames to every other member of the sender's room.
#[derive(Debug, Clone, Default)]
pub struct MemoryRelay {
    state: Rc<RefCell<RelayState>>,
}

impl MemoryRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that connects through this relay. Connections open
    /// immediately.
    pub fn transport(&self) -> MemoryTransport {
        MemoryTransport {
            link: Rc::default(),
            relay: Some(self.clone()),
        }
    }

    /// Number of live members in a room.
    pub fn member_count(&self, room: &str) -> usize {
        self.state
            .borrow()
            .members
            .iter()
            .filter(|m| m.room == room && m.link.strong_count() > 0)
            .count()
    }

    fn join(&self, room: &str, link: Weak<RefCell<Link>>) -> usize {
        let mut state = self.state.borrow_mut();
        let id = state.next_id;
        state.next_id += 1;
        state.members.push(Member {
            id,
            room: room.to_string(),
            link,
        });
        id
    }

    fn leave(&self, id: usize) {
        self.state.borrow_mut().members.retain(|m| m.id != id);
    }

    fn broadcast(&self, from: usize, text: &str) {
        let state = self.state.borrow();
        let Some(room) = state.members.iter().find(|m| m.id == from).map(|m| &m.room) else {
            return;
        };
        for member in state.members.iter().filter(|m| m.id != from && &m.room == room) {
            if let Some(link) = member.link.upgrade() {
                link.borrow_mut()
                    .events
                    .push_back(TransportEvent::Message(text.to_string()));
            }
        }
    }
}
