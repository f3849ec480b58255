use std::time::Duration;

use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use crate::ConnectionConfig;
use crate::Path;
use crate::PathElem;
use crate::RawMessage;
use crate::RawUpdate;
use crate::RawValue;
use crate::ReconnectPolicy;
use crate::SessionConfig;
use crate::SessionState;
use crate::SessionStatus;
use crate::SinkConfig;
use crate::SubscriptionConfig;

pub const IN_OCTETS: &str = "/interfaces/interface[name=*]/state/counters/in-octets";
pub const OPER_STATUS: &str = "/interfaces/interface[name=*]/state/oper-status";

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for unit test.");
}

/// Config with deterministic backoff and one subscription on `in-octets`
pub fn test_config(max_attempts: u32) -> SessionConfig {
    SessionConfig {
        connection: ConnectionConfig::default(),
        reconnect: ReconnectPolicy {
            max_attempts,
            base_delay_ms: 100,
            max_delay_ms: 1_000,
            jitter_ms: 0,
            timeout_ms: 0,
        },
        sink: SinkConfig::default(),
        subscriptions: vec![SubscriptionConfig::sample(IN_OCTETS, 5_000)],
    }
}

pub fn interface_path(
    name: &str,
    tail: &[&str],
) -> Path {
    let mut elems = vec![
        PathElem::new("interfaces"),
        PathElem::new("interface").with_key("name", name),
    ];
    elems.extend(tail.iter().map(|e| PathElem::new(*e)));
    Path::new(elems)
}

pub fn counter_message(
    name: &str,
    value: RawValue,
) -> RawMessage {
    RawMessage::Update(RawUpdate {
        path: interface_path(name, &["state", "counters", "in-octets"]),
        value: Some(value),
        timestamp: Some(1),
    })
}

pub fn oper_status_message(
    name: &str,
    status: &str,
) -> RawMessage {
    RawMessage::Update(RawUpdate {
        path: interface_path(name, &["state", "oper-status"]),
        value: Some(RawValue::String(status.to_string())),
        timestamp: Some(1),
    })
}

/// Wait until the session reports `state`, returning every state seen on
/// the way
pub async fn wait_for_state(
    status: &mut broadcast::Receiver<SessionStatus>,
    state: SessionState,
) -> Vec<SessionState> {
    let mut seen = Vec::new();
    loop {
        let next = tokio::time::timeout(Duration::from_secs(60), status.recv())
            .await
            .expect("state not reached in time");
        match next {
            Ok(SessionStatus::StateChanged { to, .. }) => {
                seen.push(to);
                if to == state {
                    return seen;
                }
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => panic!("status channel closed before {state}"),
        }
    }
}
