use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::PathPattern;
use crate::Result;
use crate::SubscriptionMode;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModeConfig {
    Sample,
    OnChange,
}

/// One configured subscription, e.g.
///
/// ```toml
/// [[subscriptions]]
/// path = "/interfaces/interface[name=*]/state/counters/in-octets"
/// mode = "sample"
/// sample_interval_ms = 5000
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SubscriptionConfig {
    pub path: String,
    pub mode: ModeConfig,
    /// Required for `sample`, rejected for `on_change`
    #[serde(default)]
    pub sample_interval_ms: Option<u64>,
}

impl SubscriptionConfig {
    pub fn sample(
        path: &str,
        interval_ms: u64,
    ) -> Self {
        Self {
            path: path.to_string(),
            mode: ModeConfig::Sample,
            sample_interval_ms: Some(interval_ms),
        }
    }

    pub fn on_change(path: &str) -> Self {
        Self {
            path: path.to_string(),
            mode: ModeConfig::OnChange,
            sample_interval_ms: None,
        }
    }

    /// Parsed pattern and mode, ready for the registry
    pub fn resolve(&self) -> Result<(PathPattern, SubscriptionMode)> {
        let pattern = PathPattern::parse(&self.path)?;
        let mode = match (self.mode, self.sample_interval_ms) {
            (ModeConfig::Sample, Some(ms)) if ms > 0 => SubscriptionMode::sample(Duration::from_millis(ms)),
            (ModeConfig::Sample, _) => {
                return Err(Error::config(format!(
                    "subscription {}: sample mode requires sample_interval_ms > 0",
                    self.path
                )))
            }
            (ModeConfig::OnChange, None) => SubscriptionMode::OnChange,
            (ModeConfig::OnChange, Some(_)) => {
                return Err(Error::config(format!(
                    "subscription {}: sample_interval_ms is only valid in sample mode",
                    self.path
                )))
            }
        };
        Ok((pattern, mode))
    }

    pub fn validate(&self) -> Result<()> {
        self.resolve().map(|_| ())
    }
}

/// Interface traffic counters sampled every 5 s plus on-change status.
///
/// Used by the binary when the configuration lists no subscriptions.
pub fn interface_subscriptions() -> Vec<SubscriptionConfig> {
    vec![
        SubscriptionConfig::sample("/interfaces/interface[name=*]/state/counters/in-octets", 5_000),
        SubscriptionConfig::sample("/interfaces/interface[name=*]/state/counters/out-octets", 5_000),
        SubscriptionConfig::on_change("/interfaces/interface[name=*]/state/oper-status"),
        SubscriptionConfig::on_change("/interfaces/interface[name=*]/state/admin-status"),
    ]
}
