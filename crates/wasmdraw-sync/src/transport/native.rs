//! Native websocket transport.
//!
//! Uses a background thread for non-blocking operation: the socket lives on
//! the thread, commands go in over one channel and events come back over
//! another.

use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tungstenite::protocol::CloseFrame;
use tungstenite::protocol::frame::coding::CloseCode;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket, connect};
use url::Url;

use super::{Transport, TransportEvent};
use crate::error::{SyncError, SyncResult};
use crate::router::floor_char_boundary;

/// How long a read may block before queued commands are looked at again.
const READ_TIMEOUT: Duration = Duration::from_millis(50);
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);
/// How long to wait for the peer to answer our close frame.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Commands sent to the socket thread.
enum WsCommand {
    Send(String),
    Close { code: u16, reason: String },
}

/// Websocket transport for native platforms.
#[derive(Default)]
pub struct NativeTransport {
    /// Channel to send commands to the socket thread.
    cmd_tx: Option<Sender<WsCommand>>,
    /// Channel to receive events from the socket thread.
    event_rx: Option<Receiver<TransportEvent>>,
    /// Handle to the socket thread.
    _thread: Option<JoinHandle<()>>,
}

impl NativeTransport {
    /// Create a transport with no connection.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for NativeTransport {
    fn connect(&mut self, url: &Url) -> SyncResult<()> {
        if self.cmd_tx.is_some() {
            return Err(SyncError::Construction("Already connected".to_string()));
        }

        let (cmd_tx, cmd_rx) = channel::<WsCommand>();
        let (event_tx, event_rx) = channel::<TransportEvent>();
        let url = url.to_string();

        let handle = thread::Builder::new()
            .name("wasmdraw-ws".to_string())
            .spawn(move || run_socket(url, cmd_rx, event_tx))
            .map_err(|e| SyncError::Construction(format!("Failed to spawn socket thread: {}", e)))?;

        self.cmd_tx = Some(cmd_tx);
        self.event_rx = Some(event_rx);
        self._thread = Some(handle);
        Ok(())
    }

    fn send(&mut self, text: &str) -> SyncResult<()> {
        match self.cmd_tx {
            Some(ref tx) => tx
                .send(WsCommand::Send(text.to_string()))
                .map_err(|e| SyncError::Transport(format!("Send failed: {}", e))),
            None => Err(SyncError::Transport("Not connected".to_string())),
        }
    }

    fn close(&mut self, code: u16, reason: &str) {
        if let Some(ref tx) = self.cmd_tx {
            let _ = tx.send(WsCommand::Close {
                code,
                reason: reason.to_string(),
            });
        }
    }

    fn release(&mut self) {
        // Dropping the sender tells the thread to exit.
        self.cmd_tx = None;
        self.event_rx = None;
        self._thread = None;
    }

    fn poll_events(&mut self) -> Vec<TransportEvent> {
        match self.event_rx {
            Some(ref rx) => rx.try_iter().collect(),
            None => Vec::new(),
        }
    }
}

impl Drop for NativeTransport {
    fn drop(&mut self) {
        self.release();
    }
}

fn preview(text: &str) -> &str {
    &text[..floor_char_boundary(text, 100)]
}

/// Set socket timeouts so reads return regularly and queued sends go out.
fn set_timeouts(socket: &mut WebSocket<MaybeTlsStream<std::net::TcpStream>>) {
    match socket.get_mut() {
        MaybeTlsStream::Plain(tcp) => {
            let _ = tcp.set_read_timeout(Some(READ_TIMEOUT));
            let _ = tcp.set_write_timeout(Some(WRITE_TIMEOUT));
        }
        MaybeTlsStream::Rustls(tls) => {
            let _ = tls.sock.set_read_timeout(Some(READ_TIMEOUT));
            let _ = tls.sock.set_write_timeout(Some(WRITE_TIMEOUT));
        }
        #[allow(unreachable_patterns)]
        _ => {
            log::debug!("Unknown stream type - using default timeout handling");
        }
    }
}

/// Socket thread body. Always ends by reporting `Closed` or `Failed`.
fn run_socket(url: String, cmd_rx: Receiver<WsCommand>, event_tx: Sender<TransportEvent>) {
    log::info!("WebSocket thread: connecting to {}", url);

    let (mut socket, response) = match connect(url.as_str()) {
        Ok(pair) => pair,
        Err(e) => {
            log::error!("WebSocket connection failed: {}", e);
            let _ = event_tx.send(TransportEvent::Failed(format!("Connection failed: {}", e)));
            return;
        }
    };
    log::info!("WebSocket connected, status: {}", response.status());
    set_timeouts(&mut socket);
    let _ = event_tx.send(TransportEvent::Opened);

    let mut close_code: Option<u16> = None;
    let mut close_reason = String::new();
    let mut close_deadline: Option<Instant> = None;

    'session: loop {
        // Drain every queued command before blocking on a read.
        loop {
            match cmd_rx.try_recv() {
                Ok(WsCommand::Send(msg)) => {
                    if close_deadline.is_some() {
                        log::debug!("Dropping send queued after close");
                        continue;
                    }
                    log::debug!("WebSocket sending: {}", preview(&msg));
                    if let Err(e) = socket.send(Message::Text(msg)) {
                        log::error!("WebSocket send error: {}", e);
                        let _ = event_tx.send(TransportEvent::Error(format!("Send failed: {}", e)));
                        break 'session;
                    }
                }
                Ok(WsCommand::Close { code, reason }) => {
                    if close_deadline.is_some() {
                        continue;
                    }
                    log::info!("WebSocket close requested ({}: {})", code, reason);
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.clone().into(),
                    };
                    if let Err(e) = socket.close(Some(frame)) {
                        log::debug!("WebSocket close frame not sent: {}", e);
                    }
                    close_code = Some(code);
                    close_reason = reason;
                    close_deadline = Some(Instant::now() + CLOSE_TIMEOUT);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    log::info!("WebSocket command channel disconnected");
                    let _ = socket.close(None);
                    let _ = socket.flush();
                    break 'session;
                }
            }
        }

        if close_deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            log::warn!("WebSocket close handshake timed out");
            break;
        }

        match socket.read() {
            Ok(Message::Text(txt)) => {
                log::debug!("WebSocket received: {}", preview(&txt));
                let _ = event_tx.send(TransportEvent::Message(txt));
            }
            Ok(Message::Ping(data)) => {
                let _ = socket.send(Message::Pong(data));
            }
            Ok(Message::Close(frame)) => {
                log::info!("WebSocket received close frame");
                if let Some(frame) = frame {
                    close_code = Some(u16::from(frame.code));
                    close_reason = frame.reason.into_owned();
                }
                let _ = socket.flush();
                break;
            }
            Ok(_) => {} // Ignore binary, pong
            Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                break;
            }
            Err(tungstenite::Error::Io(ref e))
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                // Timeout on read, continue loop
                continue;
            }
            Err(e) => {
                log::error!("WebSocket read error: {}", e);
                let _ = event_tx.send(TransportEvent::Error(format!("Read failed: {}", e)));
                break;
            }
        }
    }

    log::info!("WebSocket thread exiting");
    let _ = event_tx.send(TransportEvent::Closed {
        code: close_code,
        reason: close_reason,
    });
}
