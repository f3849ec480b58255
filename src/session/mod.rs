//! Telemetry session: lifecycle, receive loop and the caller-facing handle.
//!
//! A [`Session`] owns the subscription registry and, once started, one
//! spawned receive loop. The loop and the consumer only share the bounded
//! sink, so a slow consumer loses the oldest events instead of stalling
//! the transport read.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use gnmi_stream::*;
//! # async fn run() -> Result<()> {
//! let session = Session::new(SessionConfig::new()?.validate()?, Arc::new(GrpcTransport))?;
//! session.subscribe(
//!     PathPattern::parse("/interfaces/interface[name=*]/state/oper-status")?,
//!     SubscriptionMode::OnChange,
//! )?;
//! let mut handle = session.start()?;
//! while let Some(event) = handle.events.recv().await {
//!     println!("{:?}", event?);
//! }
//! # Ok(())
//! # }
//! ```

mod receive_loop;
mod state;

pub use state::*;

#[cfg(test)]
mod state_test;

use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use self::receive_loop::ReceiveLoop;
use crate::metrics::STATE_TRANSITIONS;
use crate::sink;
use crate::Error;
use crate::EventSink;
use crate::EventStream;
use crate::PathPattern;
use crate::RawUpdate;
use crate::Result;
use crate::SessionConfig;
use crate::SessionError;
use crate::SessionStatus;
use crate::SubscriptionConfig;
use crate::SubscriptionId;
use crate::SubscriptionMode;
use crate::SubscriptionRegistry;
use crate::Transport;
use crate::TransportError;

/// What [`Session::start`] hands back to the caller
#[derive(Debug)]
pub struct SessionHandle {
    pub events: EventStream,
    pub status: broadcast::Receiver<SessionStatus>,
}

/// Point-in-time counters of a session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStats {
    pub id: String,
    pub state: SessionState,
    /// Consecutive reconnect attempts in the current episode
    pub reconnect_attempts: u32,
    pub reconnects_total: u64,
    pub events_delivered: u64,
    pub decode_errors: u64,
    pub events_dropped: u64,
    pub last_error: Option<String>,
}

/// State shared between the session handle and its receive loop
#[derive(Debug)]
pub(crate) struct SessionShared {
    id: String,
    state: Mutex<SessionState>,
    status: broadcast::Sender<SessionStatus>,
    resubscribe: Notify,
    sink: Mutex<Option<EventSink>>,
    last_error: Mutex<Option<TransportError>>,
    reconnect_attempts: AtomicU32,
    reconnects_total: AtomicU64,
    events_delivered: AtomicU64,
    decode_errors: AtomicU64,
}

impl SessionShared {
    fn new(
        id: String,
        status_capacity: usize,
    ) -> Self {
        let (status, _) = broadcast::channel(status_capacity.max(1));
        Self {
            id,
            state: Mutex::new(SessionState::Disconnected),
            status,
            resubscribe: Notify::new(),
            sink: Mutex::new(None),
            last_error: Mutex::new(None),
            reconnect_attempts: AtomicU32::new(0),
            reconnects_total: AtomicU64::new(0),
            events_delivered: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Move to `to`, publishing a `StateChanged` notification.
    pub(crate) fn transition(
        &self,
        to: SessionState,
    ) -> std::result::Result<(), SessionError> {
        let from = {
            let mut state = self.state.lock();
            let from = *state;
            if !from.can_transition_to(to) {
                return Err(SessionError::InvalidTransition { from, to });
            }
            *state = to;
            from
        };

        debug!(session = %self.id, %from, %to, "state transition");
        STATE_TRANSITIONS.with_label_values(&[to.as_str()]).inc();
        self.publish(SessionStatus::StateChanged { from, to });
        Ok(())
    }

    /// Close without going through the state machine, used when the loop
    /// had to be aborted
    fn force_closed(&self) {
        let from = std::mem::replace(&mut *self.state.lock(), SessionState::Closed);
        if from != SessionState::Closed {
            self.publish(SessionStatus::StateChanged {
                from,
                to: SessionState::Closed,
            });
            self.publish(SessionStatus::Terminated { error: None });
        }
        if let Some(sink) = self.sink.lock().as_ref() {
            sink.close(None);
        }
    }

    pub(crate) fn publish(
        &self,
        status: SessionStatus,
    ) {
        // No receivers is fine: status observers are optional.
        let _ = self.status.send(status);
    }

    pub(crate) fn record_error(
        &self,
        error: &TransportError,
    ) {
        *self.last_error.lock() = Some(error.clone());
    }
}

/// A telemetry subscription session against one device.
///
/// Not restartable: once started and stopped, create a new session.
pub struct Session {
    shared: Arc<SessionShared>,
    config: SessionConfig,
    transport: Arc<dyn Transport>,
    registry: Arc<SubscriptionRegistry>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
}

impl std::fmt::Debug for Session {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.shared.id)
            .field("state", &self.state())
            .field("subscriptions", &self.registry.len())
            .finish()
    }
}

impl Session {
    /// Validate `config` and register its subscriptions
    pub fn new(
        config: SessionConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let config = config.validate()?;
        let id = nanoid::nanoid!(10);
        let session = Self {
            shared: Arc::new(SessionShared::new(id, config.sink.status_capacity)),
            transport,
            registry: Arc::new(SubscriptionRegistry::new()),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
            started: AtomicBool::new(false),
            config,
        };
        let subscriptions = session.config.subscriptions.clone();
        session.configure(&subscriptions)?;
        Ok(session)
    }

    pub fn id(&self) -> &str {
        &self.shared.id
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Register a subscription.
    ///
    /// While streaming, the change reaches the device on the next
    /// subscribe cycle: [`resubscribe`](Self::resubscribe) or a reconnect.
    pub fn subscribe(
        &self,
        pattern: PathPattern,
        mode: SubscriptionMode,
    ) -> Result<SubscriptionId> {
        self.registry.add(pattern, mode)
    }

    pub fn unsubscribe(
        &self,
        id: SubscriptionId,
    ) -> Result<()> {
        self.registry.remove(id)
    }

    /// Register every configured subscription.
    ///
    /// All entries are validated first; on error nothing is registered.
    pub fn configure(
        &self,
        subscriptions: &[SubscriptionConfig],
    ) -> Result<Vec<SubscriptionId>> {
        let resolved = subscriptions
            .iter()
            .map(SubscriptionConfig::resolve)
            .collect::<Result<Vec<_>>>()?;
        resolved
            .into_iter()
            .map(|(pattern, mode)| self.registry.add(pattern, mode))
            .collect()
    }

    /// Spawn the receive loop.
    ///
    /// # Errors
    /// - [`SessionError::AlreadyStarted`] on a second call
    /// - [`Error::Config`] if no subscription is registered
    pub fn start(&self) -> Result<SessionHandle> {
        if self.registry.is_empty() {
            return Err(Error::config("cannot start a session without subscriptions"));
        }
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(SessionError::AlreadyStarted.into());
        }

        let status = self.shared.status.subscribe();
        let (sink, events) = sink::channel(
            self.config.sink.event_capacity,
            self.shared.status.clone(),
            self.cancel.clone(),
        );
        *self.shared.sink.lock() = Some(sink.clone());

        let receive_loop = ReceiveLoop::new(
            self.shared.clone(),
            self.transport.clone(),
            self.registry.clone(),
            self.config.clone(),
            sink,
            self.cancel.clone(),
        );
        info!(session = %self.shared.id, target = %self.config.connection.target(), "starting session");
        *self.task.lock() = Some(tokio::spawn(receive_loop.run()));

        Ok(SessionHandle { events, status })
    }

    /// Close the session and wait for the receive loop to release the
    /// transport.
    ///
    /// Waits at most `sink.close_timeout_ms`, then aborts the loop.
    /// Calling it again, or on a session that never started, is a no-op
    /// beyond reaching `Closed`.
    pub async fn stop(&self) -> Result<()> {
        self.started.store(true, Ordering::Release);
        self.cancel.cancel();

        let handle = self.task.lock().take();
        let Some(handle) = handle else {
            if self.shared.state() == SessionState::Disconnected {
                let _ = self.shared.transition(SessionState::Closing);
                let _ = self.shared.transition(SessionState::Closed);
                self.shared.publish(SessionStatus::Terminated { error: None });
            }
            return Ok(());
        };

        let close_timeout = self.config.sink.close_timeout();
        let abort = handle.abort_handle();
        match timeout(close_timeout, handle).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                error!(session = %self.shared.id, "receive loop failed: {:?}", e);
                self.shared.force_closed();
                Err(e.into())
            }
            Err(_) => {
                warn!(session = %self.shared.id, ?close_timeout, "receive loop did not stop in time, aborting");
                abort.abort();
                self.shared.force_closed();
                Ok(())
            }
        }
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Another receiver on the status channel; sees notifications sent
    /// from now on
    pub fn subscribe_status(&self) -> broadcast::Receiver<SessionStatus> {
        self.shared.status.subscribe()
    }

    pub fn stats(&self) -> SessionStats {
        let events_dropped = self.shared.sink.lock().as_ref().map(EventSink::dropped).unwrap_or(0);
        SessionStats {
            id: self.shared.id.clone(),
            state: self.shared.state(),
            reconnect_attempts: self.shared.reconnect_attempts.load(Ordering::Relaxed),
            reconnects_total: self.shared.reconnects_total.load(Ordering::Relaxed),
            events_delivered: self.shared.events_delivered.load(Ordering::Relaxed),
            decode_errors: self.shared.decode_errors.load(Ordering::Relaxed),
            events_dropped,
            last_error: self.shared.last_error.lock().as_ref().map(ToString::to_string),
        }
    }

    /// Re-send the current registry on the open connection.
    ///
    /// A no-op if the registry did not change since the last subscribe
    /// cycle. When the session is reconnecting the next cycle picks up the
    /// current registry anyway.
    pub fn resubscribe(&self) -> Result<()> {
        let running = self.task.lock().as_ref().is_some_and(|h| !h.is_finished());
        if !running || self.shared.state().is_closed() {
            return Err(SessionError::NotRunning.into());
        }
        self.shared.resubscribe.notify_one();
        Ok(())
    }

    /// One-shot read of `paths` over a connection scoped to this call
    pub async fn read_state(
        &self,
        paths: &[PathPattern],
    ) -> Result<Vec<RawUpdate>> {
        let connection = &self.config.connection;
        let connect_timeout = connection.connect_timeout();
        let request_timeout = connection.request_timeout();

        let conn = timeout(
            connect_timeout,
            self.transport.open(&connection.target(), &connection.credentials()),
        )
        .await
        .map_err(|_| TransportError::Timeout {
            step: "connect",
            duration: connect_timeout,
        })??;

        let updates = timeout(request_timeout, conn.read_state(paths, connection.encoding))
            .await
            .map_err(|_| TransportError::Timeout {
                step: "get",
                duration: request_timeout,
            })??;
        debug!(session = %self.shared.id, paths = paths.len(), updates = updates.len(), "read_state");
        Ok(updates)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
