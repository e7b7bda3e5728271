//! Room session: connection lifecycle, batching and inbound dispatch.
//!
//! A [`SyncSession`] is the single owner of one relay connection and of its
//! flush timer. All work happens inside [`SyncSession::poll`], which the
//! host calls from its frame or event loop; the session never spawns work of
//! its own, so no state is shared across threads.

use std::time::Duration;

#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;

#[cfg(target_arch = "wasm32")]
use web_time::Instant;

use crate::batcher::Batcher;
use crate::command::CommandSource;
use crate::config::{NORMAL_CLOSURE, SyncConfig};
use crate::connection::{ConnectionEvent, ConnectionState, Effect, Transition, transition};
use crate::error::{SyncError, SyncResult};
use crate::message::Message;
use crate::reconnect::Backoff;
use crate::router::{Dispatch, MessageRouter};
use crate::surface::Surface;
use crate::transport::{PlatformTransport, Transport, TransportEvent};

/// Events reported to the host after each poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Connection open; show the room code.
    Connected { room: String },
    /// Connection gone; hide the room code and reset the join button.
    Disconnected { code: Option<u16>, reason: String },
    /// A peer's draw batch was replayed on the surface.
    Applied { rendered: usize, skipped: usize },
    /// A peer cleared the canvas; the local history was dropped with it.
    Cleared,
    /// An inbound message was dropped.
    Ignored { reason: String },
    /// The relay dropped us; another attempt follows after `delay`.
    ReconnectScheduled { attempt: u32, delay: Duration },
    /// Something failed (construction, send, transport). Nothing is fatal.
    Error { message: String },
}

/// Manages one room connection.
pub struct SyncSession<T: Transport = PlatformTransport> {
    config: SyncConfig,
    transport: T,
    state: ConnectionState,
    /// Room of the current or most recent connection.
    room: Option<String>,
    batcher: Batcher,
    router: MessageRouter,
    backoff: Backoff,
    /// Close details waiting to be reported.
    last_close: (Option<u16>, String),
    events: Vec<SyncEvent>,
}

impl SyncSession<PlatformTransport> {
    /// Session over the platform websocket.
    pub fn platform(config: SyncConfig) -> Self {
        Self::new(config, PlatformTransport::new())
    }
}

impl<T: Transport> SyncSession<T> {
    /// Create an idle session.
    pub fn new(config: SyncConfig, transport: T) -> Self {
        Self {
            batcher: Batcher::new(config.flush_interval),
            backoff: Backoff::new(config.reconnect.clone()),
            router: MessageRouter::new(),
            config,
            transport,
            state: ConnectionState::Idle,
            room: None,
            last_close: (None, String::new()),
            events: Vec::new(),
        }
    }

    /// Replace the inbound router (e.g. to limit renderable shapes).
    pub fn with_router(mut self, router: MessageRouter) -> Self {
        self.router = router;
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Get current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Check if connected.
    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Room of the live connection, if any.
    pub fn room(&self) -> Option<&str> {
        if self.state.is_active() {
            self.room.as_deref()
        } else {
            None
        }
    }

    /// Check if the flush timer is running.
    pub fn is_batching(&self) -> bool {
        self.batcher.is_running()
    }

    /// Check if a reconnect attempt is waiting.
    pub fn reconnect_pending(&self) -> bool {
        self.backoff.is_pending()
    }

    // --- Lifecycle ---

    /// Join a room.
    ///
    /// Does nothing while a connection is already open or in progress. A
    /// construction failure leaves the session `Closed`, is reported as a
    /// [`SyncEvent::Error`] and is returned; it is never retried.
    pub fn open(&mut self, room: &str) -> SyncResult<()> {
        self.backoff.reset();
        self.connect(room, Instant::now())
    }

    /// Leave the room with a normal closure. Cancels any pending reconnect.
    pub fn close(&mut self) {
        self.backoff.reset();
        if !self.state.is_active() {
            log::info!("Connection is already closed or not initialized");
            return;
        }
        self.apply(ConnectionEvent::CloseRequested, Instant::now());
    }

    // --- Outgoing ---

    /// Send a message on the open connection.
    ///
    /// Fails with [`SyncError::NotConnected`] unless the connection is
    /// open. Nothing is queued or retried.
    pub fn send(&mut self, message: &Message) -> SyncResult<()> {
        if self.state != ConnectionState::Open {
            log::error!("Connection is not open, {} message not sent", message.tag());
            return Err(SyncError::NotConnected);
        }
        let text = message.encode().inspect_err(|e| {
            log::error!("Failed to encode {} message: {}", message.tag(), e);
        })?;
        self.transport.send(&text).inspect_err(|e| {
            log::error!("Failed to send {} message: {}", message.tag(), e);
        })?;
        log::debug!("Sent {} message ({} bytes)", message.tag(), text.len());
        Ok(())
    }

    /// Tell every peer in the room to clear their canvas.
    pub fn send_clear(&mut self) -> SyncResult<()> {
        self.send(&Message::ClearCanvas)
    }

    // --- Event loop ---

    /// Drive the session: apply transport notifications, run a due
    /// reconnect, run a due flush. Returns what happened, in order.
    pub fn poll(
        &mut self,
        now: Instant,
        source: &mut dyn CommandSource,
        surface: &mut dyn Surface,
    ) -> Vec<SyncEvent> {
        for event in self.transport.poll_events() {
            self.handle_transport_event(event, source, surface, now);
        }

        if self.backoff.take_due(now) {
            if let Some(room) = self.room.clone() {
                log::info!("Reconnecting to room {}", room);
                // Failures are logged and reported as events by `connect`.
                let _ = self.connect(&room, now);
            }
        }

        if let Some(batch) = self.batcher.poll(now, self.is_open(), source) {
            if let Err(e) = self.send(&batch) {
                self.events.push(SyncEvent::Error {
                    message: e.to_string(),
                });
            }
        }

        std::mem::take(&mut self.events)
    }

    // --- Internals ---

    fn connect(&mut self, room: &str, now: Instant) -> SyncResult<()> {
        if self.state.is_active() {
            log::info!("Connection is already {:?}, not opening room {}", self.state, room);
            return Ok(());
        }

        self.room = Some(room.to_string());
        self.apply(ConnectionEvent::OpenRequested, now);

        let result = self.config.endpoint_url(room).and_then(|url| {
            log::info!("Connecting to {}", url);
            self.transport.connect(&url)
        });
        if let Err(e) = result {
            log::error!("Failed to open connection: {}", e);
            self.events.push(SyncEvent::Error {
                message: e.to_string(),
            });
            self.apply(ConnectionEvent::ConstructionFailed, now);
            self.continue_backoff(now);
            return Err(e);
        }
        Ok(())
    }

    fn handle_transport_event(
        &mut self,
        event: TransportEvent,
        source: &mut dyn CommandSource,
        surface: &mut dyn Surface,
        now: Instant,
    ) {
        match event {
            TransportEvent::Opened => self.apply(ConnectionEvent::TransportOpened, now),
            TransportEvent::Message(text) => {
                let event = match self.router.route(&text, surface) {
                    Dispatch::Drew { rendered, skipped } => SyncEvent::Applied { rendered, skipped },
                    Dispatch::Cleared => {
                        source.clear_history();
                        SyncEvent::Cleared
                    }
                    Dispatch::Ignored(reason) => SyncEvent::Ignored {
                        reason: reason.to_string(),
                    },
                };
                self.events.push(event);
            }
            TransportEvent::Closed { code, reason } => {
                log::info!("WebSocket connection closed (code {:?}, reason {:?})", code, reason);
                let never_opened = self.state == ConnectionState::Connecting;
                self.last_close = (code, reason);
                self.apply(ConnectionEvent::TransportClosed, now);
                if never_opened {
                    // Browsers report an unreachable endpoint this way.
                    self.continue_backoff(now);
                }
            }
            TransportEvent::Error(message) => {
                log::warn!("WebSocket error: {}", message);
                self.apply(ConnectionEvent::TransportError, now);
                self.events.push(SyncEvent::Error { message });
            }
            TransportEvent::Failed(message) => {
                log::error!("WebSocket could not connect: {}", message);
                self.events.push(SyncEvent::Error { message });
                self.apply(ConnectionEvent::ConstructionFailed, now);
                self.continue_backoff(now);
            }
        }
    }

    /// A failed attempt inside a reconnect cycle schedules the next one.
    fn continue_backoff(&mut self, now: Instant) {
        if self.backoff.in_progress() {
            self.run_effect(Effect::ScheduleReconnect, now);
        }
    }

    fn apply(&mut self, event: ConnectionEvent, now: Instant) {
        let Transition { next, effects } = transition(self.state, &event);
        if next != self.state {
            log::debug!("Connection {:?} -> {:?} on {:?}", self.state, next, event);
        }
        self.state = next;
        for effect in effects {
            self.run_effect(effect, now);
        }
    }

    fn run_effect(&mut self, effect: Effect, now: Instant) {
        match effect {
            Effect::NotifyOpened => {
                self.backoff.reset();
                let room = self.room.clone().unwrap_or_default();
                log::info!("WebSocket connection established, room {}", room);
                self.events.push(SyncEvent::Connected { room });
            }
            Effect::StartBatcher => self.batcher.start(now),
            Effect::StopBatcher => self.batcher.stop(),
            Effect::RequestClose => self
                .transport
                .close(NORMAL_CLOSURE, &self.config.close_reason),
            Effect::NotifyClosed => {
                let (code, reason) = std::mem::take(&mut self.last_close);
                self.events.push(SyncEvent::Disconnected { code, reason });
            }
            Effect::ReleaseHandle => self.transport.release(),
            Effect::ScheduleReconnect => match self.backoff.schedule(now) {
                Some((attempt, delay)) => {
                    log::info!("Reconnect attempt {} in {:?}", attempt, delay);
                    self.events.push(SyncEvent::ReconnectScheduled { attempt, delay });
                }
                None if self.config.reconnect.enabled => {
                    log::warn!("Giving up reconnecting to room {:?}", self.room);
                }
                None => {}
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{DrawCommand, DrawStack, ShapeKind};
    use crate::config::{DEFAULT_CLOSE_REASON, Environment};
    use crate::reconnect::ReconnectPolicy;
    use crate::surface::MemorySurface;
    use crate::transport::{MemoryRelay, MemoryTransport};

    const TICK: Duration = Duration::from_millis(50);

    struct Harness {
        session: SyncSession<MemoryTransport>,
        transport: MemoryTransport,
        stack: DrawStack,
        surface: MemorySurface,
        t0: Instant,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_config(SyncConfig::default())
        }

        fn with_config(config: SyncConfig) -> Self {
            let transport = MemoryTransport::new();
            Self {
                session: SyncSession::new(config, transport.clone()),
                transport,
                stack: DrawStack::new(),
                surface: MemorySurface::new(),
                t0: Instant::now(),
            }
        }

        fn poll_at(&mut self, offset: Duration) -> Vec<SyncEvent> {
            self.session
                .poll(self.t0 + offset, &mut self.stack, &mut self.surface)
        }

        /// Open room R1 and complete the handshake at t0.
        fn joined() -> Self {
            let mut h = Self::new();
            h.session.open("R1").unwrap();
            h.transport.accept();
            let events = h.poll_at(Duration::ZERO);
            assert_eq!(events, vec![SyncEvent::Connected { room: "R1".to_string() }]);
            h
        }
    }

    fn decode_all(frames: &[String]) -> Vec<Message> {
        frames.iter().map(|f| Message::decode(f).unwrap()).collect()
    }

    #[test]
    fn test_open_connects_to_room_url() {
        let mut h = Harness::new();
        h.session.open("R1").unwrap();
        assert_eq!(h.session.state(), ConnectionState::Connecting);
        assert_eq!(
            h.transport.last_url().unwrap().as_str(),
            "ws://localhost:8080/ws?room=R1"
        );
        assert!(!h.session.is_batching());
    }

    #[test]
    fn test_open_is_idempotent_while_open() {
        let mut h = Harness::joined();
        h.session.open("R1").unwrap();
        h.session.open("R2").unwrap();
        assert_eq!(h.transport.connect_count(), 1);
        assert_eq!(h.session.state(), ConnectionState::Open);
        assert_eq!(h.session.room(), Some("R1"));
    }

    #[test]
    fn test_next_tick_sends_one_batch_in_order() {
        let mut h = Harness::joined();
        h.stack.push(DrawCommand::line(0.0, 0.0, 10.0, 10.0));
        h.stack
            .push(DrawCommand::new(5.0, 5.0, 15.0, 15.0, ShapeKind::Circle));

        h.poll_at(TICK);

        let sent = decode_all(&h.transport.sent());
        assert_eq!(
            sent,
            vec![Message::Draw {
                payload: vec![
                    DrawCommand::line(0.0, 0.0, 10.0, 10.0),
                    DrawCommand::new(5.0, 5.0, 15.0, 15.0, ShapeKind::Circle),
                ]
            }]
        );
    }

    #[test]
    fn test_idle_ticks_send_nothing() {
        let mut h = Harness::joined();
        for i in 1..5 {
            h.poll_at(TICK * i);
        }
        assert!(h.transport.sent().is_empty());
    }

    #[test]
    fn test_send_while_closed_keeps_commands_pending() {
        let mut h = Harness::new();
        h.stack.push(DrawCommand::line(0.0, 0.0, 1.0, 1.0));

        let result = h.session.send(&Message::Draw {
            payload: vec![DrawCommand::line(0.0, 0.0, 1.0, 1.0)],
        });
        assert_eq!(result, Err(SyncError::NotConnected));

        h.poll_at(TICK);
        assert_eq!(h.stack.pending_count(), 1);
        assert_eq!(h.stack.cursor(), 0);
    }

    #[test]
    fn test_close_uses_normal_closure() {
        let mut h = Harness::joined();
        h.session.close();
        assert_eq!(h.session.state(), ConnectionState::Closing);
        assert!(!h.session.is_batching());
        assert_eq!(
            h.transport.close_requests(),
            vec![(1000, DEFAULT_CLOSE_REASON.to_string())]
        );

        let events = h.poll_at(TICK);
        assert_eq!(
            events,
            vec![SyncEvent::Disconnected {
                code: Some(1000),
                reason: DEFAULT_CLOSE_REASON.to_string()
            }]
        );
        assert_eq!(h.session.state(), ConnectionState::Closed);
        assert!(!h.transport.is_connected());
        assert!(h.session.room().is_none());
    }

    #[test]
    fn test_no_sends_after_close_until_reopen() {
        let mut h = Harness::joined();
        h.session.close();
        h.poll_at(TICK);

        h.stack.push(DrawCommand::line(1.0, 2.0, 3.0, 4.0));
        for i in 2..6 {
            h.poll_at(TICK * i);
        }
        assert!(h.transport.sent().is_empty());
        assert_eq!(h.stack.pending_count(), 1);

        h.session.open("R1").unwrap();
        h.transport.accept();
        h.poll_at(TICK * 6);

        assert_eq!(h.transport.connect_count(), 2);
        assert_eq!(
            decode_all(&h.transport.sent()),
            vec![Message::Draw {
                payload: vec![DrawCommand::line(1.0, 2.0, 3.0, 4.0)]
            }]
        );
    }

    #[test]
    fn test_close_when_idle_is_noop() {
        let mut h = Harness::new();
        h.session.close();
        assert_eq!(h.session.state(), ConnectionState::Idle);
        assert!(h.transport.close_requests().is_empty());
    }

    #[test]
    fn test_open_ignored_while_closing() {
        let mut h = Harness::joined();
        h.session.close();
        h.session.open("R2").unwrap();
        assert_eq!(h.session.state(), ConnectionState::Closing);
        assert_eq!(h.transport.connect_count(), 1);
    }

    #[test]
    fn test_remote_draw_is_rendered_not_requeued() {
        let mut h = Harness::joined();
        h.transport.deliver(
            r#"{"type":"draw","payload":[{"startX":0,"startY":0,"endX":10,"endY":10,"type":0}]}"#,
        );

        let events = h.poll_at(TICK);
        assert_eq!(events, vec![SyncEvent::Applied { rendered: 1, skipped: 0 }]);
        assert_eq!(h.surface.rendered(), &[DrawCommand::line(0.0, 0.0, 10.0, 10.0)]);
        assert_eq!(h.stack.pending_count(), 0);

        h.poll_at(TICK * 2);
        assert!(h.transport.sent().is_empty());
    }

    #[test]
    fn test_unknown_message_is_ignored() {
        let mut h = Harness::joined();
        h.transport.deliver(r#"{"type":"unknown-thing"}"#);

        let events = h.poll_at(TICK);
        assert!(matches!(events.as_slice(), [SyncEvent::Ignored { .. }]));
        assert!(h.surface.rendered().is_empty());
        assert_eq!(h.surface.clear_count(), 0);
        assert!(h.session.is_open());
    }

    #[test]
    fn test_malformed_message_keeps_connection() {
        let mut h = Harness::joined();
        h.transport.deliver("{not json");
        h.transport.deliver(r#"{"type":"clear-canvas"}"#);

        let events = h.poll_at(TICK);
        assert!(matches!(events[0], SyncEvent::Ignored { .. }));
        assert_eq!(events[1], SyncEvent::Cleared);
        assert!(h.session.is_open());
    }

    #[test]
    fn test_remote_clear_drops_unsent_history() {
        let mut h = Harness::joined();
        h.stack.push(DrawCommand::line(0.0, 0.0, 1.0, 1.0));
        h.poll_at(TICK);
        h.stack.push(DrawCommand::line(2.0, 2.0, 3.0, 3.0));
        h.transport.deliver(r#"{"type":"clear-canvas"}"#);

        let events = h.poll_at(TICK * 2);
        assert_eq!(events, vec![SyncEvent::Cleared]);
        assert!(h.stack.is_empty());
        assert_eq!(h.surface.clear_count(), 1);

        h.poll_at(TICK * 3);
        assert_eq!(
            decode_all(&h.transport.sent()),
            vec![Message::Draw {
                payload: vec![DrawCommand::line(0.0, 0.0, 1.0, 1.0)]
            }]
        );
    }

    #[test]
    fn test_send_clear() {
        let mut h = Harness::new();
        assert_eq!(h.session.send_clear(), Err(SyncError::NotConnected));

        let mut h = Harness::joined();
        h.session.send_clear().unwrap();
        assert_eq!(h.transport.sent(), vec![r#"{"type":"clear-canvas"}"#.to_string()]);
    }

    #[test]
    fn test_bad_endpoint_is_construction_failure() {
        let config = SyncConfig::default().with_endpoint("http://localhost:8080");
        let mut h = Harness::with_config(config);

        let result = h.session.open("R1");
        assert!(matches!(result, Err(SyncError::Construction(_))));
        assert_eq!(h.session.state(), ConnectionState::Closed);
        assert_eq!(h.transport.connect_count(), 0);

        let events = h.poll_at(Duration::from_secs(60));
        assert!(matches!(events[0], SyncEvent::Error { .. }));
        assert!(matches!(events[1], SyncEvent::Disconnected { .. }));
        assert_eq!(h.transport.connect_count(), 0);
    }

    #[test]
    fn test_sync_connect_failure() {
        let mut h = Harness::new();
        h.transport.fail_next_connect("refused");

        assert_eq!(
            h.session.open("R1"),
            Err(SyncError::Construction("refused".to_string()))
        );
        assert_eq!(h.session.state(), ConnectionState::Closed);
        assert!(!h.session.reconnect_pending());
    }

    #[test]
    fn test_async_connect_failure_is_not_retried() {
        let mut h = Harness::new();
        h.session.open("R1").unwrap();
        h.transport.fail_connect("unreachable");

        h.poll_at(Duration::ZERO);
        assert_eq!(h.session.state(), ConnectionState::Closed);
        assert!(!h.session.reconnect_pending());
        h.poll_at(Duration::from_secs(60));
        assert_eq!(h.transport.connect_count(), 1);
    }

    #[test]
    fn test_connect_failure_after_close_finishes_close() {
        let mut h = Harness::new();
        h.transport.hold_close_ack(true);
        h.session.open("R1").unwrap();
        h.session.close();
        assert_eq!(h.session.state(), ConnectionState::Closing);

        h.transport.fail_connect("unreachable");
        let events = h.poll_at(Duration::ZERO);
        assert_eq!(h.session.state(), ConnectionState::Closed);
        assert!(!h.transport.is_connected());
        assert!(matches!(
            events.as_slice(),
            [SyncEvent::Error { .. }, SyncEvent::Disconnected { .. }]
        ));
        assert!(!h.session.reconnect_pending());

        h.session.open("R1").unwrap();
        assert_eq!(h.session.state(), ConnectionState::Connecting);
        assert_eq!(h.transport.connect_count(), 2);
    }

    #[test]
    fn test_close_before_open_is_not_retried() {
        let mut h = Harness::new();
        h.session.open("R1").unwrap();
        h.transport.report_error("WebSocket error");
        h.transport.drop_connection(Some(1006), "");

        let events = h.poll_at(Duration::ZERO);
        assert_eq!(
            events,
            vec![
                SyncEvent::Error {
                    message: "WebSocket error".to_string()
                },
                SyncEvent::Disconnected {
                    code: Some(1006),
                    reason: String::new()
                },
            ]
        );
        assert_eq!(h.session.state(), ConnectionState::Closed);
        assert!(!h.session.reconnect_pending());

        h.poll_at(Duration::from_secs(1));
        h.poll_at(Duration::from_secs(60));
        assert_eq!(h.transport.connect_count(), 1);
    }

    #[test]
    fn test_close_before_open_during_reconnect_backs_off() {
        let mut h = Harness::joined();
        h.transport.drop_connection(None, "");
        h.poll_at(Duration::ZERO);

        h.poll_at(Duration::from_millis(500));
        assert_eq!(h.transport.connect_count(), 2);
        h.transport.drop_connection(Some(1006), "");
        let events = h.poll_at(Duration::from_millis(600));
        assert!(events.contains(&SyncEvent::ReconnectScheduled {
            attempt: 2,
            delay: Duration::from_millis(1000)
        }));
    }

    #[test]
    fn test_transport_error_does_not_change_state() {
        let mut h = Harness::joined();
        h.transport.report_error("hiccup");

        let events = h.poll_at(TICK);
        assert_eq!(
            events,
            vec![SyncEvent::Error {
                message: "hiccup".to_string()
            }]
        );
        assert!(h.session.is_open());
        assert!(h.session.is_batching());
    }

    #[test]
    fn test_failed_send_keeps_batching_without_retry() {
        let mut h = Harness::joined();
        h.transport.set_fail_sends(true);
        h.stack.push(DrawCommand::line(0.0, 0.0, 1.0, 1.0));

        let events = h.poll_at(TICK);
        assert!(matches!(events.as_slice(), [SyncEvent::Error { .. }]));
        assert!(h.session.is_batching());

        h.transport.set_fail_sends(false);
        h.stack.push(DrawCommand::line(2.0, 2.0, 3.0, 3.0));
        h.poll_at(TICK * 2);

        assert_eq!(
            decode_all(&h.transport.sent()),
            vec![Message::Draw {
                payload: vec![DrawCommand::line(2.0, 2.0, 3.0, 3.0)]
            }]
        );
    }

    #[test]
    fn test_unexpected_close_reconnects_with_backoff() {
        let mut h = Harness::joined();
        h.transport.drop_connection(Some(1006), "");

        let events = h.poll_at(TICK);
        assert_eq!(
            events,
            vec![
                SyncEvent::Disconnected {
                    code: Some(1006),
                    reason: String::new()
                },
                SyncEvent::ReconnectScheduled {
                    attempt: 1,
                    delay: Duration::from_millis(500)
                },
            ]
        );
        assert_eq!(h.session.state(), ConnectionState::Closed);
        assert!(!h.session.is_batching());

        h.poll_at(TICK + Duration::from_millis(499));
        assert_eq!(h.transport.connect_count(), 1);

        h.poll_at(TICK + Duration::from_millis(500));
        assert_eq!(h.transport.connect_count(), 2);
        assert_eq!(h.session.state(), ConnectionState::Connecting);

        h.transport.accept();
        let events = h.poll_at(Duration::from_secs(1));
        assert_eq!(events, vec![SyncEvent::Connected { room: "R1".to_string() }]);
        assert!(!h.session.reconnect_pending());
    }

    #[test]
    fn test_failed_reconnect_backs_off_further() {
        let mut h = Harness::joined();
        h.transport.drop_connection(None, "");
        h.poll_at(Duration::ZERO);

        h.poll_at(Duration::from_millis(500));
        h.transport.fail_connect("still down");
        let events = h.poll_at(Duration::from_millis(600));
        assert!(events.contains(&SyncEvent::ReconnectScheduled {
            attempt: 2,
            delay: Duration::from_millis(1000)
        }));
    }

    #[test]
    fn test_close_cancels_reconnect() {
        let mut h = Harness::joined();
        h.transport.drop_connection(Some(1006), "");
        h.poll_at(TICK);
        assert!(h.session.reconnect_pending());

        h.session.close();
        assert!(!h.session.reconnect_pending());
        h.poll_at(Duration::from_secs(30));
        assert_eq!(h.transport.connect_count(), 1);
    }

    #[test]
    fn test_reconnect_disabled() {
        let config = SyncConfig::default().with_reconnect(ReconnectPolicy::disabled());
        let mut h = Harness::with_config(config);
        h.session.open("R1").unwrap();
        h.transport.accept();
        h.poll_at(Duration::ZERO);

        h.transport.drop_connection(Some(1006), "");
        let events = h.poll_at(TICK);
        assert_eq!(events.len(), 1);
        assert!(!h.session.reconnect_pending());
    }

    #[test]
    fn test_production_environment_url() {
        let config = SyncConfig::default().with_environment(Environment::Production);
        let mut h = Harness::with_config(config);
        h.session.open("abc").unwrap();
        assert_eq!(
            h.transport.last_url().unwrap().as_str(),
            "wss://wasm-draw.art/ws?room=abc"
        );
    }

    #[test]
    fn test_peers_share_room_through_relay() {
        let relay = MemoryRelay::new();
        let t0 = Instant::now();
        let mut alice = SyncSession::new(SyncConfig::default(), relay.transport());
        let mut bob = SyncSession::new(SyncConfig::default(), relay.transport());
        let mut carol = SyncSession::new(SyncConfig::default(), relay.transport());
        let (mut alice_stack, mut bob_stack, mut carol_stack) =
            (DrawStack::new(), DrawStack::new(), DrawStack::new());
        let (mut alice_surface, mut bob_surface, mut carol_surface) =
            (MemorySurface::new(), MemorySurface::new(), MemorySurface::new());

        alice.open("R1").unwrap();
        bob.open("R1").unwrap();
        carol.open("R2").unwrap();
        alice.poll(t0, &mut alice_stack, &mut alice_surface);
        bob.poll(t0, &mut bob_stack, &mut bob_surface);
        carol.poll(t0, &mut carol_stack, &mut carol_surface);
        assert!(alice.is_open() && bob.is_open() && carol.is_open());

        alice_stack.push(DrawCommand::line(0.0, 0.0, 10.0, 10.0));
        alice.poll(t0 + TICK, &mut alice_stack, &mut alice_surface);
        let events = bob.poll(t0 + TICK, &mut bob_stack, &mut bob_surface);
        carol.poll(t0 + TICK, &mut carol_stack, &mut carol_surface);

        assert_eq!(events, vec![SyncEvent::Applied { rendered: 1, skipped: 0 }]);
        assert_eq!(bob_surface.rendered(), &[DrawCommand::line(0.0, 0.0, 10.0, 10.0)]);
        assert!(carol_surface.rendered().is_empty());
        assert!(alice_surface.rendered().is_empty());

        alice.send_clear().unwrap();
        let events = bob.poll(t0 + TICK * 2, &mut bob_stack, &mut bob_surface);
        assert_eq!(events, vec![SyncEvent::Cleared]);
        assert!(bob_surface.rendered().is_empty());
        assert_eq!(carol_surface.clear_count(), 0);
    }
}
