use std::time::Duration;

use crate::SessionState;
use crate::TransportError;

/// Lifecycle notification published on the session's status channel
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStatus {
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    /// A reconnect attempt will start after `delay`
    ReconnectScheduled {
        attempt: u32,
        delay: Duration,
        reason: TransportError,
    },
    /// The sink evicted an event; `total` is the running count
    EventsDropped { total: u64 },
    /// Final notification; `error` is set when the session failed
    Terminated { error: Option<TransportError> },
}
