//! wasm-draw WebSocket relay
//!
//! Forwards every text frame a client sends to all *other* clients
//! connected with the same room code, in the order it was received.
//! Frames are relayed verbatim; the relay never looks inside them.
//!
//! Clients connect to `/ws?room=<roomCode>`.

pub mod config;

use std::{collections::HashSet, sync::Arc};

use axum::{
    Router,
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use config::{RelayConfig, RelayError};

/// A relayed frame: sender peer ID and the text as received.
type Frame = (String, String);

/// Room state
struct Room {
    /// Broadcast channel for this room
    tx: broadcast::Sender<Frame>,
    /// Connected peer IDs
    peers: HashSet<String>,
}

impl Room {
    fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            peers: HashSet::new(),
        }
    }
}

/// Shared relay state
pub struct AppState {
    /// Active rooms
    rooms: DashMap<String, Room>,
    channel_capacity: usize,
}

impl AppState {
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            channel_capacity,
        }
    }

    /// Number of peers currently in a room.
    pub fn peer_count(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map(|room| room.peers.len()).unwrap_or(0)
    }

    /// Add peer to room
    fn join_room(&self, room_id: &str, peer_id: &str) -> (broadcast::Receiver<Frame>, usize) {
        let capacity = self.channel_capacity;
        let mut room = self
            .rooms
            .entry(room_id.to_string())
            .or_insert_with(|| Room::new(capacity));
        room.peers.insert(peer_id.to_string());
        (room.tx.subscribe(), room.peers.len())
    }

    /// Remove peer from room
    fn leave_room(&self, room_id: &str, peer_id: &str) {
        if let Some(mut room) = self.rooms.get_mut(room_id) {
            room.peers.remove(peer_id);
            // Clean up empty rooms
            if room.peers.is_empty() {
                drop(room);
                self.rooms.remove_if(room_id, |_, room| room.peers.is_empty());
            }
        }
    }

    /// Broadcast a frame to the room
    fn broadcast(&self, room_id: &str, from: &str, text: String) {
        if let Some(room) = self.rooms.get(room_id) {
            let _ = room.tx.send((from.to_string(), text));
        }
    }
}

#[derive(Debug, Deserialize)]
struct JoinQuery {
    room: String,
}

/// Build the relay's HTTP router.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve on an already bound listener until the task is dropped.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<(), RelayError> {
    axum::serve(listener, app(state)).await?;
    Ok(())
}

/// Bind according to `config` and serve.
pub async fn run(config: RelayConfig) -> Result<(), RelayError> {
    let listener = TcpListener::bind(config.addr).await?;
    info!("wasm-draw relay listening on {}", listener.local_addr()?);
    info!("WebSocket endpoint: ws://{}/ws?room=<roomCode>", config.addr);
    serve(listener, Arc::new(AppState::new(config.channel_capacity))).await
}

/// Index page
async fn index() -> &'static str {
    "wasm-draw relay - connect via WebSocket at /ws?room=<roomCode>"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

/// WebSocket upgrade handler
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<JoinQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    if query.room.is_empty() {
        return (StatusCode::BAD_REQUEST, "room must not be empty").into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.room))
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, room: String) {
    let peer_id = Uuid::new_v4().to_string();
    let (mut room_rx, peer_count) = state.join_room(&room, &peer_id);
    info!("Peer {} joined room {} ({} peers)", peer_id, room, peer_count);

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            // Handle incoming messages from client
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        debug!("Relaying {} bytes from {} in room {}", text.len(), peer_id, room);
                        state.broadcast(&room, &peer_id, text.to_string());
                    }
                    Some(Ok(Message::Binary(_))) => {
                        warn!("Dropping binary frame from {}", peer_id);
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Ok(_)) => {} // Ignore ping/pong
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", peer_id, e);
                        break;
                    }
                }
            }

            // Handle broadcast frames from the room
            frame = room_rx.recv() => {
                match frame {
                    Ok((from, text)) => {
                        // Don't echo back to sender
                        if from != peer_id && sender.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("Peer {} lagged, {} frames dropped", peer_id, missed);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    // Cleanup on disconnect
    state.leave_room(&room, &peer_id);
    info!("Peer {} left room {}", peer_id, room);
}
