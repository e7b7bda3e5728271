//! Connection lifecycle as an explicit state machine.
//!
//! [`transition`] is a pure function from the current state and an event to
//! the next state plus the side effects the session must perform. The
//! session owns the transport and timers; this module never touches them.

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Never opened.
    Idle,
    /// Transport constructed, waiting for the open signal.
    Connecting,
    Open,
    /// Close requested, waiting for the handshake to finish.
    Closing,
    Closed,
}

impl ConnectionState {
    /// Check if a transport handle exists in this state.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Open | ConnectionState::Closing
        )
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Caller asked to join a room.
    OpenRequested,
    /// The endpoint could not be created, synchronously or asynchronously.
    ConstructionFailed,
    /// The transport finished its opening handshake.
    TransportOpened,
    /// Caller asked to leave.
    CloseRequested,
    /// The transport is gone, whoever initiated it.
    TransportClosed,
    /// The transport reported an error. Never changes state by itself.
    TransportError,
}

/// Side effects requested by a transition, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Tell observers we are connected (show room code, flip the join button).
    NotifyOpened,
    StartBatcher,
    /// Idempotent.
    StopBatcher,
    /// Start the transport's close handshake (code 1000).
    RequestClose,
    /// Tell observers we are disconnected.
    NotifyClosed,
    /// Drop the transport handle.
    ReleaseHandle,
    /// The close was not requested; the session may try again.
    ScheduleReconnect,
}

/// Result of applying one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: ConnectionState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn stay(state: ConnectionState) -> Self {
        Self {
            next: state,
            effects: Vec::new(),
        }
    }

    fn to(next: ConnectionState, effects: &[Effect]) -> Self {
        Self {
            next,
            effects: effects.to_vec(),
        }
    }
}

const ENTER_CLOSED: [Effect; 3] = [Effect::StopBatcher, Effect::NotifyClosed, Effect::ReleaseHandle];

/// Apply `event` to `state`.
///
/// Events that make no sense in the current state (a stale open signal
/// after close, a second open request) leave the state untouched with no
/// effects.
pub fn transition(state: ConnectionState, event: &ConnectionEvent) -> Transition {
    use ConnectionEvent as Ev;
    use ConnectionState as St;

    match (state, event) {
        (St::Idle | St::Closed, Ev::OpenRequested) => Transition::to(St::Connecting, &[]),

        // A connect that was cancelled before it failed still has to finish.
        (St::Connecting | St::Closing, Ev::ConstructionFailed) => {
            Transition::to(St::Closed, &ENTER_CLOSED)
        }

        (St::Connecting, Ev::TransportOpened) => {
            Transition::to(St::Open, &[Effect::NotifyOpened, Effect::StartBatcher])
        }

        (St::Connecting | St::Open, Ev::CloseRequested) => {
            Transition::to(St::Closing, &[Effect::StopBatcher, Effect::RequestClose])
        }

        // Closed before it ever opened: the endpoint was unreachable.
        (St::Connecting, Ev::TransportClosed) => Transition::to(St::Closed, &ENTER_CLOSED),

        (St::Open, Ev::TransportClosed) => {
            let mut effects = ENTER_CLOSED.to_vec();
            effects.push(Effect::ScheduleReconnect);
            Transition { next: St::Closed, effects }
        }

        (St::Closing, Ev::TransportClosed) => Transition::to(St::Closed, &ENTER_CLOSED),

        // Already open or on the way there: at most one connection.
        (St::Connecting | St::Open | St::Closing, Ev::OpenRequested) => Transition::stay(state),

        _ => Transition::stay(state),
    }
}
