//! wasm-draw sync layer
//!
//! Propagates locally produced draw commands to the other participants of a
//! room through the relay, and replays theirs on the local surface.
//!
//! The host application owns a [`SyncSession`], a [`CommandSource`] (usually
//! a [`DrawStack`]) and a [`Surface`], and calls [`SyncSession::poll`] from
//! its event loop.

pub mod batcher;
pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod reconnect;
pub mod router;
pub mod session;
pub mod surface;
pub mod transport;

pub use batcher::Batcher;
pub use command::{CommandSource, DrawCommand, DrawStack, ShapeKind};
pub use config::{Environment, SyncConfig};
pub use connection::{ConnectionEvent, ConnectionState, Effect, Transition, transition};
pub use error::{SyncError, SyncResult};
pub use message::Message;
pub use reconnect::ReconnectPolicy;
pub use router::{Dispatch, MessageRouter};
pub use session::{SyncEvent, SyncSession};
pub use surface::{MemorySurface, Surface};
pub use transport::{MemoryRelay, MemoryTransport, PlatformTransport, Transport, TransportEvent};
