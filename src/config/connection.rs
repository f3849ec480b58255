use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::Credentials;
use crate::Encoding;
use crate::Error;
use crate::Result;
use crate::Target;

/// Where and how to reach the device
#[derive(Serialize, Deserialize, Clone)]
pub struct ConnectionConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Sent as `username` request metadata when set
    #[serde(default)]
    pub username: Option<String>,

    /// Sent as `password` request metadata when set
    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub tls: TlsConfig,

    /// Timeout for establishing the channel (milliseconds)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Timeout for the capabilities exchange (milliseconds)
    #[serde(default = "default_capabilities_timeout")]
    pub capabilities_timeout_ms: u64,

    /// Timeout for unary requests such as Get (milliseconds).
    /// Streaming reads are never timed out.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// TCP keepalive (seconds)
    #[serde(default = "default_tcp_keepalive")]
    pub tcp_keepalive_in_secs: u64,

    /// HTTP/2 keepalive ping interval (seconds)
    #[serde(default = "default_h2_keepalive_interval")]
    pub http2_keep_alive_interval_in_secs: u64,

    /// HTTP/2 keepalive ack timeout (seconds)
    #[serde(default = "default_h2_keepalive_timeout")]
    pub http2_keep_alive_timeout_in_secs: u64,

    /// Request gzip on the wire
    #[serde(default)]
    pub enable_compression: bool,

    /// Value encoding asked of the device
    #[serde(default)]
    pub encoding: Encoding,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct TlsConfig {
    /// Default: false (plaintext, equivalent to an insecure dial)
    #[serde(default)]
    pub enabled: bool,

    /// PEM bundle used to verify the device; required when `enabled`
    #[serde(default)]
    pub ca_cert_path: Option<String>,

    /// Override for the name checked against the device certificate
    #[serde(default)]
    pub domain: Option<String>,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("tls", &self.tls)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("encoding", &self.encoding)
            .finish()
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            username: None,
            password: None,
            tls: TlsConfig::default(),
            connect_timeout_ms: default_connect_timeout(),
            capabilities_timeout_ms: default_capabilities_timeout(),
            request_timeout_ms: default_request_timeout(),
            tcp_keepalive_in_secs: default_tcp_keepalive(),
            http2_keep_alive_interval_in_secs: default_h2_keepalive_interval(),
            http2_keep_alive_timeout_in_secs: default_h2_keepalive_timeout(),
            enable_compression: false,
            encoding: Encoding::default(),
        }
    }
}

impl ConnectionConfig {
    pub fn target(&self) -> Target {
        Target {
            host: self.host.clone(),
            port: self.port,
            tls: self.tls.enabled,
            ca_cert_path: self.tls.ca_cert_path.clone(),
            domain: self.tls.domain.clone(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            tcp_keepalive: Duration::from_secs(self.tcp_keepalive_in_secs),
            http2_keep_alive_interval: Duration::from_secs(self.http2_keep_alive_interval_in_secs),
            http2_keep_alive_timeout: Duration::from_secs(self.http2_keep_alive_timeout_in_secs),
            enable_compression: self.enable_compression,
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn capabilities_timeout(&self) -> Duration {
        Duration::from_millis(self.capabilities_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::config("connection.host must not be empty"));
        }
        if self.port == 0 {
            return Err(Error::config("connection.port must be > 0"));
        }
        if self.connect_timeout_ms == 0 || self.capabilities_timeout_ms == 0 || self.request_timeout_ms == 0 {
            return Err(Error::config("connection timeouts must be > 0"));
        }
        if self.password.is_some() && self.username.is_none() {
            return Err(Error::config("connection.password requires connection.username"));
        }
        self.tls.validate()
    }
}

impl TlsConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let Some(ca) = &self.ca_cert_path else {
            return Err(Error::config("connection.tls.ca_cert_path is required when TLS is enabled"));
        };
        if !Path::new(ca).exists() {
            return Err(Error::config(format!("CA certificate file not found: {ca}")));
        }
        Ok(())
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    6030
}
fn default_connect_timeout() -> u64 {
    5_000
}
fn default_capabilities_timeout() -> u64 {
    5_000
}
fn default_request_timeout() -> u64 {
    10_000
}
fn default_tcp_keepalive() -> u64 {
    60
}
fn default_h2_keepalive_interval() -> u64 {
    30
}
fn default_h2_keepalive_timeout() -> u64 {
    10
}
