//! Streaming telemetry subscriptions over gNMI.
//!
//! A [`Session`] keeps a set of path subscriptions against one device,
//! drives the connect, capabilities and subscribe exchange, and turns the
//! device's notifications into typed [`DecodedEvent`]s delivered through a
//! bounded [`EventStream`]. Transport failures are retried with
//! exponential backoff until the [`ReconnectPolicy`] gives up.

mod config;
mod decoder;
mod errors;
mod metrics;
mod path;
mod session;
mod sink;
mod subscription;
mod transport;

pub use self::config::*;
pub use decoder::*;
pub use errors::*;
pub use metrics::*;
pub use path::*;
pub use session::*;
pub use sink::*;
pub use subscription::*;
pub use transport::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
