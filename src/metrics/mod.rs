//! Prometheus collectors for the telemetry session.
//!
//! Collectors live in a crate-private [`REGISTRY`] with the `gnmi` prefix.
//! They are registered lazily on first use, so a process that never
//! scrapes pays nothing beyond the atomic increments.


use lazy_static::lazy_static;
use prometheus::Encoder;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use tracing::warn;

lazy_static! {
    pub static ref REGISTRY: Registry = {
        let registry = Registry::new_custom(Some("gnmi".to_string()), None)
            .expect("registry prefix is valid");
        register_custom_metrics(&registry);
        registry
    };

    pub static ref EVENTS_DECODED: IntCounterVec = IntCounterVec::new(
        Opts::new("events_decoded_total", "Decoded telemetry events by kind"),
        &["kind"]
    )
    .expect("Should succeed to create metric");

    pub static ref DECODE_ERRORS: IntCounter = IntCounter::new(
        "decode_errors_total",
        "Updates whose value did not fit their kind"
    )
    .expect("Should succeed to create metric");

    pub static ref EVENTS_DROPPED: IntCounter = IntCounter::new(
        "events_dropped_total",
        "Events evicted from a full sink buffer"
    )
    .expect("Should succeed to create metric");

    pub static ref RECONNECT_ATTEMPTS: IntCounter = IntCounter::new(
        "reconnect_attempts_total",
        "Reconnect attempts scheduled by the session"
    )
    .expect("Should succeed to create metric");

    pub static ref STATE_TRANSITIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("state_transitions_total", "Session state transitions by target state"),
        &["to"]
    )
    .expect("Should succeed to create metric");

    pub static ref ACTIVE_SESSIONS: IntGauge = IntGauge::new(
        "active_sessions",
        "Sessions whose receive loop is running"
    )
    .expect("Should succeed to create metric");
}

pub(crate) fn register_custom_metrics(registry: &Registry) {
    registry
        .register(Box::new(EVENTS_DECODED.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(DECODE_ERRORS.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(EVENTS_DROPPED.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(RECONNECT_ATTEMPTS.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(STATE_TRANSITIONS.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(ACTIVE_SESSIONS.clone()))
        .expect("collector can be registered");
}

/// Render every collector in the text exposition format
pub fn gather_metrics() -> String {
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        warn!("could not encode custom metrics: {}", e);
    }
    match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            warn!("custom metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    }
}
