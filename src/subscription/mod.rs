//! Subscriptions and the registry that owns them
//!
//! A [`Subscription`] pairs a [`PathPattern`] with a delivery mode. The
//! [`SubscriptionRegistry`] is the only place subscriptions are created or
//! destroyed; the receive loop works on an immutable [`RegistrySnapshot`]
//! taken at the start of each subscribe cycle.

mod registry;

pub use registry::*;

#[cfg(test)]
mod registry_test;

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::PathPattern;

/// Registry-assigned subscription identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Delivery cadence
///
/// The interval only exists for `Sample`, so "interval required iff SAMPLE"
/// holds by construction. Positivity is checked by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionMode {
    /// Device sends the value every `interval`, changed or not
    Sample { interval: Duration },
    /// Device sends the value only when it differs from the last one sent
    OnChange,
}

impl SubscriptionMode {
    pub fn sample(interval: Duration) -> Self {
        SubscriptionMode::Sample { interval }
    }

    pub fn sample_interval(&self) -> Option<Duration> {
        match self {
            SubscriptionMode::Sample { interval } => Some(*interval),
            SubscriptionMode::OnChange => None,
        }
    }

    pub fn is_sample(&self) -> bool {
        matches!(self, SubscriptionMode::Sample { .. })
    }
}

impl fmt::Display for SubscriptionMode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            SubscriptionMode::Sample { interval } => write!(f, "sample({interval:?})"),
            SubscriptionMode::OnChange => write!(f, "on_change"),
        }
    }
}

/// An active path subscription.
///
/// Fields are private: once the registry hands one out nothing can change
/// its pattern or mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    id: SubscriptionId,
    pattern: PathPattern,
    mode: SubscriptionMode,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn mode(&self) -> SubscriptionMode {
        self.mode
    }
}
