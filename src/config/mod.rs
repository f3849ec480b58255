//! Session configuration.
//!
//! Sources are layered with increasing priority:
//! 1. Type defaults
//! 2. The file named by `CONFIG_PATH`, if set
//! 3. Environment variables prefixed `GNMI__` (`GNMI__RECONNECT__MAX_ATTEMPTS=3`)
//!
//! [`SessionConfig::with_override_config`] merges one more file on top.
//! Nothing is validated while loading; call [`SessionConfig::validate`]
//! before handing the config to a session.

mod connection;
mod retry;
mod sink;
mod subscription;

pub use connection::*;
pub use retry::*;
pub use sink::*;
pub use subscription::*;


use std::env;
use std::fmt::Debug;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

const ENV_PREFIX: &str = "GNMI";

#[derive(Serialize, Deserialize, Clone, Default)]
pub struct SessionConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub reconnect: ReconnectPolicy,
    #[serde(default)]
    pub sink: SinkConfig,
    /// Empty unless configured; see [`interface_subscriptions`]
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionConfig>,
}

impl Debug for SessionConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("target", &self.connection.target())
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

impl SessionConfig {
    /// Load defaults, then `CONFIG_PATH`, then `GNMI__*` variables
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(environment());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Merge `path` over the current values; environment still wins
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(environment())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    pub fn validate(self) -> Result<Self> {
        self.connection.validate()?;
        self.reconnect.validate()?;
        self.sink.validate()?;
        for subscription in &self.subscriptions {
            subscription.validate()?;
        }
        Ok(self)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}
