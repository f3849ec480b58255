#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use gnmi_stream::Capabilities;
use gnmi_stream::Connection;
use gnmi_stream::Credentials;
use gnmi_stream::Encoding;
use gnmi_stream::Path;
use gnmi_stream::PathElem;
use gnmi_stream::PathPattern;
use gnmi_stream::RawMessage;
use gnmi_stream::RawStream;
use gnmi_stream::RawUpdate;
use gnmi_stream::RawValue;
use gnmi_stream::ReconnectPolicy;
use gnmi_stream::SessionConfig;
use gnmi_stream::SessionState;
use gnmi_stream::SessionStatus;
use gnmi_stream::SubscribeRequest;
use gnmi_stream::SubscriptionConfig;
use gnmi_stream::Target;
use gnmi_stream::Transport;
use gnmi_stream::TransportError;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tonic::async_trait;
use tracing_subscriber::EnvFilter;

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
    println!("setup logger for integration test.");
}

pub fn session_config(
    max_attempts: u32,
    subscriptions: Vec<SubscriptionConfig>,
) -> SessionConfig {
    SessionConfig {
        reconnect: ReconnectPolicy {
            max_attempts,
            base_delay_ms: 50,
            max_delay_ms: 400,
            jitter_ms: 0,
            timeout_ms: 0,
        },
        subscriptions,
        ..Default::default()
    }
}

type Item = Result<RawMessage, TransportError>;

/// Device side of one subscribe stream
#[derive(Debug, Clone)]
pub struct DeviceStream {
    tx: mpsc::UnboundedSender<Item>,
}

impl DeviceStream {
    pub fn send(
        &self,
        message: RawMessage,
    ) {
        self.tx.send(Ok(message)).expect("session dropped the stream");
    }

    pub fn fail(
        &self,
        error: TransportError,
    ) {
        self.tx.send(Err(error)).expect("session dropped the stream");
    }
}

enum Plan {
    Refuse,
    Accept(VecDeque<mpsc::UnboundedReceiver<Item>>),
}

/// Transport whose connections are scripted by the test.
///
/// Each `open` consumes the next queued plan; once the queue is empty
/// every `open` is refused.
#[derive(Default)]
pub struct FakeTransport {
    plans: Mutex<VecDeque<Plan>>,
    requests: Arc<Mutex<Vec<SubscribeRequest>>>,
    opens: AtomicUsize,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn refuse(
        &self,
        times: usize,
    ) {
        let mut plans = self.plans.lock();
        for _ in 0..times {
            plans.push_back(Plan::Refuse);
        }
    }

    /// Queue a connection serving `streams` subscribe calls
    pub fn accept(
        &self,
        streams: usize,
    ) -> Vec<DeviceStream> {
        let mut receivers = VecDeque::new();
        let mut devices = Vec::new();
        for _ in 0..streams {
            let (tx, rx) = mpsc::unbounded_channel();
            receivers.push_back(rx);
            devices.push(DeviceStream { tx });
        }
        self.plans.lock().push_back(Plan::Accept(receivers));
        devices
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<SubscribeRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn open(
        &self,
        target: &Target,
        _credentials: &Credentials,
    ) -> Result<Box<dyn Connection>, TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        match self.plans.lock().pop_front() {
            Some(Plan::Accept(streams)) => Ok(Box::new(FakeConnection {
                streams: Mutex::new(streams),
                requests: self.requests.clone(),
            })),
            Some(Plan::Refuse) | None => Err(TransportError::Connect {
                target: target.to_string(),
                reason: "connection refused".to_string(),
            }),
        }
    }
}

struct FakeConnection {
    streams: Mutex<VecDeque<mpsc::UnboundedReceiver<Item>>>,
    requests: Arc<Mutex<Vec<SubscribeRequest>>>,
}

#[async_trait]
impl Connection for FakeConnection {
    async fn capabilities(&self) -> Result<Capabilities, TransportError> {
        Ok(Capabilities {
            version: "0.7.0".to_string(),
            encodings: vec![Encoding::JsonIetf],
            models: vec![],
        })
    }

    async fn read_state(
        &self,
        _paths: &[PathPattern],
        _encoding: Encoding,
    ) -> Result<Vec<RawUpdate>, TransportError> {
        Ok(vec![])
    }

    async fn stream(
        &self,
        request: SubscribeRequest,
    ) -> Result<RawStream, TransportError> {
        self.requests.lock().push(request);
        let rx = self
            .streams
            .lock()
            .pop_front()
            .ok_or_else(|| TransportError::Stream("no stream scripted".to_string()))?;
        Ok(UnboundedReceiverStream::new(rx).boxed())
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

pub fn counter(
    name: &str,
    value: RawValue,
) -> RawMessage {
    RawMessage::Update(RawUpdate {
        path: interface_path(name, &["state", "counters", "in-octets"]),
        value: Some(value),
        timestamp: Some(1_700_000_000_000_000_000),
    })
}

pub fn oper_status(
    name: &str,
    status: &str,
) -> RawMessage {
    RawMessage::Update(RawUpdate {
        path: interface_path(name, &["state", "oper-status"]),
        value: Some(RawValue::Json(format!(r#"{{"openconfig-interfaces:oper-status":"{status}"}}"#).into_bytes())),
        timestamp: Some(1_700_000_000_000_000_000),
    })
}

/// Every status notification received so far, without waiting
pub fn drain(status: &mut broadcast::Receiver<SessionStatus>) -> Vec<SessionStatus> {
    let mut seen = Vec::new();
    loop {
        match status.try_recv() {
            Ok(notification) => seen.push(notification),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => return seen,
        }
    }
}

pub async fn wait_for_state(
    status: &mut broadcast::Receiver<SessionStatus>,
    state: SessionState,
) -> Vec<SessionStatus> {
    let mut seen = Vec::new();
    loop {
        let notification = tokio::time::timeout(Duration::from_secs(60), status.recv())
            .await
            .expect("state not reached in time")
            .expect("status channel closed");
        let reached = matches!(notification, SessionStatus::StateChanged { to, .. } if to == state);
        seen.push(notification);
        if reached {
            return seen;
        }
    }
}
