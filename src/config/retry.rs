use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Reconnect backoff policy
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Consecutive failed attempts before the session gives up.
    /// 0 disables reconnecting: the first disconnect is fatal.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff base (unit: milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum backoff time (unit: milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Upper bound of the random delay added to each backoff (unit: milliseconds)
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    /// Overall budget for one reconnect episode (unit: milliseconds, 0 = unbounded)
    #[serde(default)]
    pub timeout_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ms: default_jitter_ms(),
            timeout_ms: 0,
        }
    }
}

impl ReconnectPolicy {
    /// Deterministic part of the delay before `attempt` (1-based):
    /// `min(base * 2^(attempt-1), max)`
    pub fn base_delay(
        &self,
        attempt: u32,
    ) -> Duration {
        let mut delay = self.base_delay_ms;
        for _ in 1..attempt {
            delay = delay.checked_mul(2).unwrap_or(self.max_delay_ms);
            if delay >= self.max_delay_ms {
                break;
            }
        }
        Duration::from_millis(delay.min(self.max_delay_ms))
    }

    /// Delay before `attempt`, jitter included
    pub fn delay(
        &self,
        attempt: u32,
    ) -> Duration {
        let jitter = if self.jitter_ms > 0 {
            rand::random::<u64>() % self.jitter_ms
        } else {
            0
        };
        self.base_delay(attempt) + Duration::from_millis(jitter)
    }

    pub fn budget(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_delay_ms == 0 {
            return Err(Error::config("reconnect.base_delay_ms must be > 0"));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(Error::config(format!(
                "reconnect.max_delay_ms ({}) must be >= base_delay_ms ({})",
                self.max_delay_ms, self.base_delay_ms
            )));
        }
        Ok(())
    }
}

fn default_max_attempts() -> u32 {
    5
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    30_000
}
fn default_jitter_ms() -> u64 {
    250
}
