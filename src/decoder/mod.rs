//! Update decoding and classification
//!
//! Turns transport-level [`RawUpdate`]s into typed [`DecodedEvent`]s. The
//! kind of an event is decided by the trailing path segment only; counter
//! values stay raw cumulative integers and no unit conversion happens here.
//!
//! A value that does not fit its kind fails that single event with a
//! [`DecodeError`]; the caller logs, counts and moves on.

mod value;

pub use value::*;


use std::fmt;
use std::time::SystemTime;

use crate::DecodeError;
use crate::KeyBindings;
use crate::Path;
use crate::SubscriptionId;

/// One update as received, owned by the decode pipeline for a single call
#[derive(Debug, Clone, PartialEq)]
pub struct RawUpdate {
    /// Concrete path, prefix already applied
    pub path: Path,
    pub value: Option<RawValue>,
    /// Device-supplied timestamp, nanoseconds since the Unix epoch
    pub timestamp: Option<i64>,
}

/// Items yielded by a transport stream
#[derive(Debug, Clone, PartialEq)]
pub enum RawMessage {
    Update(RawUpdate),
    /// Initial synchronisation of the subscription list is complete
    Sync,
    /// Path-less keepalive from the device
    Heartbeat { timestamp: Option<i64> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Counter,
    Status,
    Sync,
    Heartbeat,
    Other,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Counter => "counter",
            EventKind::Status => "status",
            EventKind::Sync => "sync",
            EventKind::Heartbeat => "heartbeat",
            EventKind::Other => "other",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const COUNTER_SUFFIXES: [&str; 4] = ["-octets", "-pkts", "-errors", "-discards"];
const STATUS_LEAVES: [&str; 2] = ["oper-status", "admin-status"];

/// Classify an update by its trailing segment name
pub fn classify(path: &Path) -> EventKind {
    let Some(leaf) = path.leaf() else {
        return EventKind::Heartbeat;
    };
    if COUNTER_SUFFIXES.iter().any(|s| leaf.ends_with(s)) {
        EventKind::Counter
    } else if STATUS_LEAVES.contains(&leaf) {
        EventKind::Status
    } else {
        EventKind::Other
    }
}

/// Typed event handed to the consumer
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEvent {
    pub subscription_id: SubscriptionId,
    pub keys: KeyBindings,
    /// Concrete path the value came from, empty for control events
    pub path: Path,
    pub kind: EventKind,
    /// `Uint` for counters, `String` for statuses, `None` for control events
    pub value: Option<TelemetryValue>,
    pub device_timestamp: Option<i64>,
    pub received_at: SystemTime,
}

impl DecodedEvent {
    pub fn counter(&self) -> Option<u64> {
        match (self.kind, &self.value) {
            (EventKind::Counter, Some(TelemetryValue::Uint(v))) => Some(*v),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<&str> {
        match (self.kind, &self.value) {
            (EventKind::Status, Some(TelemetryValue::String(s))) => Some(s),
            _ => None,
        }
    }
}

/// Decode one update into one event per matching subscription.
///
/// Every entry of `matches` yields exactly one result, in the same order.
/// The value is decoded once and shared by all matches, so either all of
/// them succeed or all of them carry the same error.
pub fn decode(
    update: &RawUpdate,
    matches: &[(SubscriptionId, KeyBindings)],
) -> Vec<std::result::Result<DecodedEvent, DecodeError>> {
    if matches.is_empty() {
        return Vec::new();
    }

    let received_at = SystemTime::now();
    let kind = classify(&update.path);
    let value = decode_value(kind, update);

    matches
        .iter()
        .map(|(subscription_id, keys)| {
            value.clone().map(|value| DecodedEvent {
                subscription_id: *subscription_id,
                keys: keys.clone(),
                path: update.path.clone(),
                kind,
                value: Some(value),
                device_timestamp: update.timestamp,
                received_at,
            })
        })
        .collect()
}

/// Fan a path-less control message out to every listed subscription
pub fn decode_control(
    message: &RawMessage,
    subscriptions: &[SubscriptionId],
) -> Vec<DecodedEvent> {
    let (kind, timestamp) = match message {
        RawMessage::Sync => (EventKind::Sync, None),
        RawMessage::Heartbeat { timestamp } => (EventKind::Heartbeat, *timestamp),
        RawMessage::Update(_) => return Vec::new(),
    };

    let received_at = SystemTime::now();
    subscriptions
        .iter()
        .map(|id| DecodedEvent {
            subscription_id: *id,
            keys: KeyBindings::new(),
            path: Path::default(),
            kind,
            value: None,
            device_timestamp: timestamp,
            received_at,
        })
        .collect()
}

fn decode_value(
    kind: EventKind,
    update: &RawUpdate,
) -> std::result::Result<TelemetryValue, DecodeError> {
    let path = update.path.to_string();
    let raw = update
        .value
        .as_ref()
        .ok_or_else(|| DecodeError::MissingValue { path: path.clone() })?;
    let value = TelemetryValue::from_raw(raw, &path)?;
    let leaf = update.path.leaf().unwrap_or_default();

    match kind {
        EventKind::Counter => value.into_counter(leaf, &path).map(TelemetryValue::Uint),
        EventKind::Status => value.into_status(leaf, &path).map(TelemetryValue::String),
        _ => Ok(value),
    }
}
