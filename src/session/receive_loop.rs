use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use futures::StreamExt;
use tokio::time::sleep;
use tokio::time::timeout;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::SessionShared;
use super::SessionState;
use crate::decode;
use crate::decode_control;
use crate::metrics::ACTIVE_SESSIONS;
use crate::metrics::DECODE_ERRORS;
use crate::metrics::EVENTS_DECODED;
use crate::metrics::RECONNECT_ATTEMPTS;
use crate::Connection;
use crate::DecodedEvent;
use crate::EventSink;
use crate::RawMessage;
use crate::RawStream;
use crate::RegistrySnapshot;
use crate::SessionConfig;
use crate::SessionStatus;
use crate::SubscribeRequest;
use crate::SubscriptionId;
use crate::SubscriptionRegistry;
use crate::Transport;
use crate::TransportError;

/// How one connection ended
#[derive(Debug)]
enum ConnectionEnd {
    Cancelled,
    Failed {
        error: TransportError,
        /// The device delivered at least one message on this connection
        streamed: bool,
    },
}

/// How one subscribe cycle ended
#[derive(Debug)]
enum CycleEnd {
    Cancelled,
    Resubscribe,
    Disconnected(TransportError),
}

pub(super) struct ReceiveLoop {
    shared: Arc<SessionShared>,
    transport: Arc<dyn Transport>,
    registry: Arc<SubscriptionRegistry>,
    config: SessionConfig,
    sink: EventSink,
    cancel: CancellationToken,
}

impl ReceiveLoop {
    pub(super) fn new(
        shared: Arc<SessionShared>,
        transport: Arc<dyn Transport>,
        registry: Arc<SubscriptionRegistry>,
        config: SessionConfig,
        sink: EventSink,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            shared,
            transport,
            registry,
            config,
            sink,
            cancel,
        }
    }

    pub(super) async fn run(self) {
        ACTIVE_SESSIONS.inc();

        let terminal = self.drive().await.err();
        match &terminal {
            None => {
                self.move_to(SessionState::Closing);
                info!(session = %self.shared.id, "session closed");
            }
            Some(e) => error!(session = %self.shared.id, "session failed: {}", e),
        }
        self.move_to(SessionState::Closed);
        self.sink.close(terminal.clone());
        self.shared.publish(SessionStatus::Terminated { error: terminal });

        ACTIVE_SESSIONS.dec();
    }

    /// Connect, stream and reconnect until cancelled or out of attempts.
    ///
    /// `Ok` means the session was cancelled.
    async fn drive(&self) -> Result<(), TransportError> {
        let policy = self.config.reconnect;
        let mut attempts: u32 = 0;
        let mut episode_started: Option<Instant> = None;

        loop {
            self.move_to(SessionState::Connecting);

            let (error, streamed) = match self.run_connection().await {
                ConnectionEnd::Cancelled => return Ok(()),
                ConnectionEnd::Failed { error, streamed } => (error, streamed),
            };
            if streamed {
                attempts = 0;
                episode_started = None;
            }
            self.shared.record_error(&error);
            self.move_to(SessionState::Reconnecting);

            if self.cancel.is_cancelled() {
                return Ok(());
            }
            if attempts >= policy.max_attempts {
                return Err(TransportError::RetriesExhausted {
                    attempts,
                    last_error: error.to_string(),
                });
            }
            let started = *episode_started.get_or_insert_with(Instant::now);
            if let Some(budget) = policy.budget() {
                if started.elapsed() >= budget {
                    return Err(TransportError::Timeout {
                        step: "reconnect",
                        duration: budget,
                    });
                }
            }

            attempts += 1;
            let delay = policy.delay(attempts);
            self.shared.reconnect_attempts.store(attempts, Ordering::Relaxed);
            self.shared.reconnects_total.fetch_add(1, Ordering::Relaxed);
            RECONNECT_ATTEMPTS.inc();
            warn!(
                session = %self.shared.id,
                attempt = attempts,
                max_attempts = policy.max_attempts,
                ?delay,
                "transport failure: {}, reconnecting",
                error
            );
            self.shared.publish(SessionStatus::ReconnectScheduled {
                attempt: attempts,
                delay,
                reason: error,
            });

            if self.until_cancelled(sleep(delay)).await.is_none() {
                return Ok(());
            }
        }
    }

    /// Open one connection and run subscribe cycles on it until it fails.
    ///
    /// The connection is dropped on every return path.
    async fn run_connection(&self) -> ConnectionEnd {
        let settings = &self.config.connection;
        let connect_timeout = settings.connect_timeout();
        let target = settings.target();
        let credentials = settings.credentials();
        let open = timeout(connect_timeout, self.transport.open(&target, &credentials));
        let connection = match self.until_cancelled(open).await {
            None => return ConnectionEnd::Cancelled,
            Some(Err(_)) => {
                return failed(TransportError::Timeout {
                    step: "connect",
                    duration: connect_timeout,
                })
            }
            Some(Ok(Err(e))) => return failed(e),
            Some(Ok(Ok(connection))) => connection,
        };

        if !self.exchange_capabilities(connection.as_ref()).await {
            return ConnectionEnd::Cancelled;
        }

        let mut streamed = false;
        loop {
            self.move_to(SessionState::Subscribing);
            let snapshot = self.registry.snapshot();
            let mut stream = match self.open_stream(connection.as_ref(), &snapshot).await {
                None => return ConnectionEnd::Cancelled,
                Some(Err(error)) => return ConnectionEnd::Failed { error, streamed },
                Some(Ok(stream)) => stream,
            };

            self.move_to(SessionState::Streaming);

            match self.pump(&mut stream, &snapshot, &mut streamed).await {
                CycleEnd::Cancelled => return ConnectionEnd::Cancelled,
                CycleEnd::Resubscribe => {
                    debug!(session = %self.shared.id, "registry changed, resubscribing");
                }
                CycleEnd::Disconnected(error) => return ConnectionEnd::Failed { error, streamed },
            }
        }
    }

    /// Returns `false` only when cancelled. A failed or slow exchange is
    /// logged and the session proceeds.
    async fn exchange_capabilities(
        &self,
        connection: &dyn Connection,
    ) -> bool {
        let capabilities_timeout = self.config.connection.capabilities_timeout();
        let exchange = timeout(capabilities_timeout, connection.capabilities());
        match self.until_cancelled(exchange).await {
            None => false,
            Some(Ok(Ok(capabilities))) => {
                let encoding = self.config.connection.encoding;
                if !capabilities.supports_encoding(encoding) {
                    warn!(
                        session = %self.shared.id,
                        ?encoding,
                        supported = ?capabilities.encodings,
                        "device does not advertise the requested encoding"
                    );
                }
                for subscription in self.registry.all() {
                    if !capabilities.advertises_root(subscription.pattern()) {
                        warn!(
                            session = %self.shared.id,
                            subscription = %subscription.id(),
                            path = %subscription.pattern(),
                            "no advertised model covers the subscribed path"
                        );
                    }
                }
                debug!(
                    session = %self.shared.id,
                    version = %capabilities.version,
                    models = capabilities.models.len(),
                    "capabilities exchanged"
                );
                self.move_to(SessionState::CapabilitiesExchanged);
                true
            }
            Some(Ok(Err(e))) => {
                warn!(session = %self.shared.id, "capabilities request failed, proceeding: {}", e);
                true
            }
            Some(Err(_)) => {
                warn!(session = %self.shared.id, ?capabilities_timeout, "capabilities request timed out, proceeding");
                true
            }
        }
    }

    async fn open_stream(
        &self,
        connection: &dyn Connection,
        snapshot: &RegistrySnapshot,
    ) -> Option<Result<RawStream, TransportError>> {
        let request = SubscribeRequest {
            subscriptions: snapshot.subscriptions().to_vec(),
            encoding: self.config.connection.encoding,
        };
        debug!(
            session = %self.shared.id,
            subscriptions = request.subscriptions.len(),
            generation = snapshot.generation(),
            "subscribing"
        );

        let request_timeout = self.config.connection.request_timeout();
        let opened = self
            .until_cancelled(timeout(request_timeout, connection.stream(request)))
            .await?;
        Some(opened.unwrap_or(Err(TransportError::Timeout {
            step: "subscribe",
            duration: request_timeout,
        })))
    }

    /// Pull messages until the stream breaks, the session is cancelled or
    /// a resubscribe is requested.
    ///
    /// `streamed` is set by the first message received; only then does the
    /// connection count as healthy and the attempt counter reset.
    async fn pump(
        &self,
        stream: &mut RawStream,
        snapshot: &RegistrySnapshot,
        streamed: &mut bool,
    ) -> CycleEnd {
        let ids = snapshot.ids();
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return CycleEnd::Cancelled,
                _ = self.shared.resubscribe.notified() => {
                    if self.registry.generation() != snapshot.generation() {
                        return CycleEnd::Resubscribe;
                    }
                    debug!(session = %self.shared.id, "registry unchanged, resubscribe skipped");
                }
                item = stream.next() => match item {
                    Some(Ok(message)) => {
                        if !*streamed {
                            *streamed = true;
                            self.shared.reconnect_attempts.store(0, Ordering::Relaxed);
                        }
                        self.dispatch(message, snapshot, &ids)
                    }
                    Some(Err(e)) => return CycleEnd::Disconnected(e),
                    None => return CycleEnd::Disconnected(TransportError::Stream("stream closed by remote".to_string())),
                },
            }
        }
    }

    fn dispatch(
        &self,
        message: RawMessage,
        snapshot: &RegistrySnapshot,
        ids: &[SubscriptionId],
    ) {
        let update = match message {
            RawMessage::Update(update) => update,
            control => {
                for event in decode_control(&control, ids) {
                    self.deliver(event);
                }
                return;
            }
        };

        let matches = snapshot.match_update(&update);
        if matches.is_empty() {
            trace!(session = %self.shared.id, path = %update.path, "update matched no subscription");
            return;
        }
        for result in decode(&update, &matches) {
            match result {
                Ok(event) => self.deliver(event),
                Err(e) => {
                    DECODE_ERRORS.inc();
                    self.shared.decode_errors.fetch_add(1, Ordering::Relaxed);
                    warn!(session = %self.shared.id, "skipping update: {}", e);
                }
            }
        }
    }

    fn deliver(
        &self,
        event: DecodedEvent,
    ) {
        EVENTS_DECODED.with_label_values(&[event.kind.as_str()]).inc();
        self.shared.events_delivered.fetch_add(1, Ordering::Relaxed);
        self.sink.push(event);
    }

    fn move_to(
        &self,
        to: SessionState,
    ) {
        if let Err(e) = self.shared.transition(to) {
            error!(session = %self.shared.id, "{}", e);
        }
    }

    /// `None` if the session was cancelled first
    async fn until_cancelled<F: Future>(
        &self,
        fut: F,
    ) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            out = fut => Some(out),
        }
    }
}

fn failed(error: TransportError) -> ConnectionEnd {
    ConnectionEnd::Failed {
        error,
        streamed: false,
    }
}
