//! Transport seam between the session and the device.
//!
//! The session only knows [`Transport`] and [`Connection`]. The production
//! implementation is [`GrpcTransport`]; tests substitute mocks or
//! channel-driven fakes.

mod convert;
mod grpc;
pub mod proto;

pub use grpc::*;

#[cfg(test)]
mod transport_test;

use std::fmt;
use std::time::Duration;

use futures::stream::BoxStream;
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use serde::Serialize;
use tonic::async_trait;

use crate::PathPattern;
use crate::RawMessage;
use crate::RawUpdate;
use crate::Subscription;
use crate::TransportError;

/// Stream of raw messages produced by one subscribe call
pub type RawStream = BoxStream<'static, Result<RawMessage, TransportError>>;

/// Device address plus channel tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub ca_cert_path: Option<String>,
    pub domain: Option<String>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub tcp_keepalive: Duration,
    pub http2_keep_alive_interval: Duration,
    pub http2_keep_alive_timeout: Duration,
    pub enable_compression: bool,
}

impl Target {
    pub fn uri(&self) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Target {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Value encoding requested from the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    Json,
    Bytes,
    Proto,
    Ascii,
    #[default]
    JsonIetf,
}

/// YANG model advertised by the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelData {
    pub name: String,
    pub organization: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub version: String,
    pub encodings: Vec<Encoding>,
    pub models: Vec<ModelData>,
}

impl Capabilities {
    pub fn supports_encoding(
        &self,
        encoding: Encoding,
    ) -> bool {
        self.encodings.contains(&encoding)
    }

    /// Whether the first segment of `pattern` belongs to an advertised model.
    ///
    /// A module-qualified root (`openconfig-interfaces:interfaces`) must name
    /// an advertised model. A bare root needs a model named after it, either
    /// exactly or as its last dash-separated part (`interfaces` is covered by
    /// `openconfig-interfaces`). A device advertising no models covers every
    /// path.
    pub fn advertises_root(
        &self,
        pattern: &PathPattern,
    ) -> bool {
        let Some(root) = pattern.elems().first() else {
            return true;
        };
        if self.models.is_empty() {
            return true;
        }
        match root.name.split_once(':') {
            Some((module, _)) => self.models.iter().any(|m| m.name == module),
            None => self.models.iter().any(|m| {
                m.name == root.name
                    || m.name
                        .strip_suffix(root.name.as_str())
                        .is_some_and(|prefix| prefix.ends_with('-'))
            }),
        }
    }
}

/// One streaming subscribe call: every listed subscription, one encoding
#[derive(Debug, Clone, PartialEq)]
pub struct SubscribeRequest {
    pub subscriptions: Vec<Subscription>,
    pub encoding: Encoding,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Establish a channel to `target`.
    ///
    /// Implementations do not apply their own connect deadline beyond what
    /// `target` asks for; the session wraps the call in a timeout.
    async fn open(
        &self,
        target: &Target,
        credentials: &Credentials,
    ) -> Result<Box<dyn Connection>, TransportError>;
}

/// An open channel to one device.
///
/// Dropping it releases the underlying connection.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    async fn capabilities(&self) -> Result<Capabilities, TransportError>;

    /// One-shot read of the given paths
    async fn read_state(
        &self,
        paths: &[PathPattern],
        encoding: Encoding,
    ) -> Result<Vec<RawUpdate>, TransportError>;

    /// Send the subscribe request and return the response stream.
    ///
    /// The request side stays open for as long as the returned stream
    /// lives.
    async fn stream(
        &self,
        request: SubscribeRequest,
    ) -> Result<RawStream, TransportError>;
}
