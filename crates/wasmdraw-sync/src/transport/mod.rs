//! Transport abstraction for the relay connection.
//!
//! A transport owns at most one websocket at a time. Its asynchronous
//! notifications (open, message, close, error) are queued and collected by
//! the session through [`Transport::poll_events`], so every state change
//! happens on the caller's thread.

mod memory;

#[cfg(not(target_arch = "wasm32"))]
mod native;

#[cfg(target_arch = "wasm32")]
mod wasm;

pub use memory::{MemoryRelay, MemoryTransport};

#[cfg(not(target_arch = "wasm32"))]
pub use native::NativeTransport;

#[cfg(target_arch = "wasm32")]
pub use wasm::WasmTransport;

use url::Url;

use crate::error::SyncResult;

/// Notifications from a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Opening handshake completed.
    Opened,
    /// A text frame arrived.
    Message(String),
    /// The socket is closed. `code` is absent when no close frame was seen.
    Closed { code: Option<u16>, reason: String },
    /// Something went wrong; a `Closed` may or may not follow.
    Error(String),
    /// The endpoint could not be reached at all.
    Failed(String),
}

/// A websocket-like connection to the relay.
pub trait Transport {
    /// Start connecting. Fails synchronously only when no handle could be
    /// created; an unreachable endpoint is reported later as
    /// [`TransportEvent::Failed`].
    fn connect(&mut self, url: &Url) -> SyncResult<()>;

    /// Queue a text frame.
    fn send(&mut self, text: &str) -> SyncResult<()>;

    /// Begin the close handshake. A `Closed` event follows.
    fn close(&mut self, code: u16, reason: &str);

    /// Drop the handle and any queued notifications.
    fn release(&mut self);

    /// Take pending notifications (non-blocking).
    fn poll_events(&mut self) -> Vec<TransportEvent>;
}

/// Platform-specific transport type.
#[cfg(target_arch = "wasm32")]
pub type PlatformTransport = WasmTransport;

#[cfg(not(target_arch = "wasm32"))]
pub type PlatformTransport = NativeTransport;
