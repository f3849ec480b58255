//! Telemetry Session Error Hierarchy
//!
//! Errors are grouped by how the session reacts to them:
//! - [`Error::Config`] and [`SubscriptionError`] are rejected synchronously and never reach the
//!   stream.
//! - [`TransportError`] drives the reconnect path.
//! - [`DecodeError`] only ever fails a single event.
//! - [`SessionError`] reports misuse of the session lifecycle.

use std::time::Duration;

use config::ConfigError;

use crate::SessionState;
use crate::SubscriptionId;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid settings or subscription parameters
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Registry lookups on unknown subscriptions
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),

    /// Connection, request and stream failures
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A single malformed update
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Lifecycle misuse (start twice, illegal transition, ...)
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Unrecoverable failures
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscriptionError {
    #[error("Subscription {0} not found")]
    UnknownSubscription(SubscriptionId),
}

/// Transport-level failures.
///
/// Kept `Clone` so the terminal error can be handed to the consumer and
/// to status observers alike.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Channel establishment failure
    #[error("Connect to {target} failed: {reason}")]
    Connect { target: String, reason: String },

    /// Unary request (capabilities, get) failure
    #[error("Request failed: {0}")]
    Request(String),

    /// Streaming call failure or broken stream
    #[error("Stream failed: {0}")]
    Stream(String),

    /// Step exceeded its deadline
    #[error("{step} timed out after {duration:?}")]
    Timeout { step: &'static str, duration: Duration },

    /// Malformed target address
    #[error("Invalid URI format: {0}")]
    InvalidUri(String),

    /// TLS material could not be loaded
    #[error("TLS configuration error: {0}")]
    Tls(String),

    /// Reconnect policy exhaustion
    #[error("Reconnect gave up after {attempts} attempts, last error: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("Update at {path} carries no value")]
    MissingValue { path: String },

    #[error("Expected a non-negative integer for counter at {path}, found {found}")]
    NotNumeric { path: String, found: String },

    #[error("Expected a string for status at {path}, found {found}")]
    NotText { path: String, found: String },

    #[error("Structured value at {path} has no member named {member}")]
    MissingMember { path: String, member: String },

    #[error("Invalid JSON payload at {path}: {reason}")]
    InvalidJson { path: String, reason: String },

    #[error("Unsupported value encoding at {path}: {encoding}")]
    Unsupported { path: String, encoding: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Session was already started")]
    AlreadyStarted,

    #[error("Session is not running")]
    NotRunning,

    #[error("Invalid session state transition: {from:?} -> {to:?}")]
    InvalidTransition { from: SessionState, to: SessionState },
}

// ============== Conversion Implementations ============== //

impl From<tonic::Status> for TransportError {
    fn from(status: tonic::Status) -> Self {
        TransportError::Stream(format!("{:?}: {}", status.code(), status.message()))
    }
}

impl From<tonic::transport::Error> for TransportError {
    fn from(err: tonic::transport::Error) -> Self {
        TransportError::Stream(err.to_string())
    }
}

impl From<tonic::Status> for Error {
    fn from(status: tonic::Status) -> Self {
        TransportError::from(status).into()
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Fatal(format!("receive loop task failed: {err}"))
    }
}

impl Error {
    /// Config errors are raised with a plain message, the way config
    /// validation reports them.
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Config(ConfigError::Message(msg.into()))
    }
}
