/// Lifecycle of the broker session.
///
/// `Disconnected → Connecting → Connected → Subscribed`, back to
/// `Connecting` on any fault, and `ShuttingDown → Closed` on shutdown.
/// `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Subscribed,
    ShuttingDown,
    Closed,
}

/// Inputs that drive [`SessionState`] transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSignal {
    ConnectStarted,
    ConnectionUp,
    SubscribeRequested,
    Fault,
    ShutdownRequested,
    SessionClosed,
}

impl SessionState {
    pub fn on(self, signal: SessionSignal) -> Self {
        use SessionSignal::*;
        use SessionState::*;

        match (self, signal) {
            (Closed, _) => Closed,
            (ShuttingDown, SessionClosed | Fault) => Closed,
            (ShuttingDown, _) => ShuttingDown,
            (_, ShutdownRequested) => ShuttingDown,
            (Disconnected, ConnectStarted) => Connecting,
            (Connecting | Connected | Subscribed, ConnectionUp) => Connected,
            (Connected | Subscribed, SubscribeRequested) => Subscribed,
            (Connecting | Connected | Subscribed, Fault) => Connecting,
            (Disconnected | Connecting | Connected | Subscribed, SessionClosed) => Disconnected,
            (state, _) => state,
        }
    }

    pub fn is_connected(self) -> bool {
        matches!(self, SessionState::Connected | SessionState::Subscribed)
    }
}
