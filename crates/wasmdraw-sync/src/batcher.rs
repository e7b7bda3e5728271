//! Periodic flush of local draw commands.
//!
//! The batcher holds the single timer handle of a session. It is driven by
//! [`SyncSession::poll`](crate::SyncSession::poll): each call checks whether
//! a tick is due and, if so, pulls everything appended since the last pull.

use std::time::Duration;

#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;

#[cfg(target_arch = "wasm32")]
use web_time::Instant;

use crate::command::CommandSource;
use crate::message::Message;

/// Flush timer.
#[derive(Debug, Clone)]
pub struct Batcher {
    interval: Duration,
    /// Next tick deadline; `None` while stopped.
    next_tick: Option<Instant>,
}

impl Batcher {
    /// Create a stopped batcher.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_tick: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start ticking. The first tick is due immediately.
    pub fn start(&mut self, now: Instant) {
        self.next_tick = Some(now);
    }

    /// Cancel the pending tick. Stopping a stopped batcher is a no-op.
    pub fn stop(&mut self) {
        self.next_tick = None;
    }

    pub fn is_running(&self) -> bool {
        self.next_tick.is_some()
    }

    /// Deadline of the next tick, if running.
    pub fn next_tick(&self) -> Option<Instant> {
        self.next_tick
    }

    /// Run a tick if one is due.
    ///
    /// The next tick is scheduled before anything else happens, so nothing
    /// done with the returned batch can stop the schedule. When the
    /// connection is not open the tick is skipped without touching the
    /// source, leaving its commands pending for a later connection.
    /// Returns a `Draw` message when there is something to send.
    pub fn poll(&mut self, now: Instant, open: bool, source: &mut dyn CommandSource) -> Option<Message> {
        let due = self.next_tick?;
        if now < due {
            return None;
        }
        // Skip missed ticks rather than bursting to catch up.
        let mut next = due + self.interval;
        if next <= now {
            next = now + self.interval;
        }
        self.next_tick = Some(next);

        if !open {
            log::debug!("Batcher tick skipped: connection not open");
            return None;
        }
        if source.pending_count() == 0 {
            return None;
        }
        let payload = source.drain_pending();
        log::debug!("Batcher flushing {} command(s)", payload.len());
        Some(Message::Draw { payload })
    }
}
