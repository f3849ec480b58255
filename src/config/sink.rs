use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct SinkConfig {
    /// Events buffered between the receive loop and the consumer.
    /// Beyond this the oldest event is dropped.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Depth of the status broadcast channel
    #[serde(default = "default_status_capacity")]
    pub status_capacity: usize,

    /// How long `stop()` waits for the receive loop before aborting it (milliseconds)
    #[serde(default = "default_close_timeout_ms")]
    pub close_timeout_ms: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            event_capacity: default_event_capacity(),
            status_capacity: default_status_capacity(),
            close_timeout_ms: default_close_timeout_ms(),
        }
    }
}

impl SinkConfig {
    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.event_capacity == 0 {
            return Err(Error::config("sink.event_capacity must be > 0"));
        }
        if self.status_capacity == 0 {
            return Err(Error::config("sink.status_capacity must be > 0"));
        }
        Ok(())
    }
}

fn default_event_capacity() -> usize {
    1024
}
fn default_status_capacity() -> usize {
    64
}
fn default_close_timeout_ms() -> u64 {
    2_000
}
