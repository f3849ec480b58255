use std::fmt;

use serde::Serialize;

/// Lifecycle of a telemetry session.
///
/// ```text
/// Disconnected -> Connecting -> CapabilitiesExchanged -> Subscribing -> Streaming
/// Connecting -> Subscribing                  (capabilities failed, proceed)
/// Streaming -> Subscribing                   (resubscribe on the same connection)
/// Connecting | CapabilitiesExchanged | Subscribing | Streaming -> Reconnecting
/// Reconnecting -> Connecting                 (after backoff)
/// Reconnecting -> Closed                     (attempts or budget exhausted)
/// any live state -> Closing -> Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SessionState {
    Disconnected,
    Connecting,
    CapabilitiesExchanged,
    Subscribing,
    Streaming,
    Reconnecting,
    Closing,
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::CapabilitiesExchanged => "capabilities_exchanged",
            SessionState::Subscribing => "subscribing",
            SessionState::Streaming => "streaming",
            SessionState::Reconnecting => "reconnecting",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, SessionState::Closed)
    }

    pub fn can_transition_to(
        &self,
        to: SessionState,
    ) -> bool {
        use SessionState::*;

        match (self, to) {
            (Closed, _) => false,
            (Closing, Closed) => true,
            (Closing, _) => false,
            (_, Closing) => true,

            (Disconnected, Connecting) => true,
            (Connecting, CapabilitiesExchanged | Subscribing | Reconnecting) => true,
            (CapabilitiesExchanged, Subscribing | Reconnecting) => true,
            (Subscribing, Streaming | Reconnecting) => true,
            (Streaming, Subscribing | Reconnecting) => true,
            (Reconnecting, Connecting | Closed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
