//! Event delivery between the receive loop and the consumer.
//!
//! [`EventSink`] and [`EventStream`] share a bounded buffer. The producer
//! never blocks: when the buffer is full the oldest event is evicted and
//! counted. Lifecycle notifications travel separately on a broadcast
//! channel of [`SessionStatus`] values.

mod status;

pub use status::*;


use std::collections::VecDeque;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use crate::metrics::EVENTS_DROPPED;
use crate::DecodedEvent;
use crate::Error;
use crate::TransportError;

#[derive(Debug, Default)]
struct Buffer {
    events: VecDeque<DecodedEvent>,
    closed: bool,
    terminal: Option<TransportError>,
}

#[derive(Debug)]
struct Shared {
    buffer: Mutex<Buffer>,
    capacity: usize,
    notify: Notify,
    dropped: AtomicU64,
    status: broadcast::Sender<SessionStatus>,
}

/// Create a connected producer/consumer pair.
///
/// `capacity` is clamped to at least one slot. Dropping or cancelling the
/// returned [`EventStream`] cancels `cancel`.
pub fn channel(
    capacity: usize,
    status: broadcast::Sender<SessionStatus>,
    cancel: CancellationToken,
) -> (EventSink, EventStream) {
    let capacity = capacity.max(1);
    let shared = Arc::new(Shared {
        buffer: Mutex::new(Buffer {
            events: VecDeque::with_capacity(capacity),
            ..Default::default()
        }),
        capacity,
        notify: Notify::new(),
        dropped: AtomicU64::new(0),
        status,
    });
    (
        EventSink {
            shared: shared.clone(),
        },
        EventStream { shared, cancel },
    )
}

/// Producer half, owned by the receive loop
#[derive(Debug, Clone)]
pub struct EventSink {
    shared: Arc<Shared>,
}

impl EventSink {
    /// Buffer one event.
    ///
    /// Returns `true` if an older event had to be evicted to make room.
    /// Events pushed after [`close`](Self::close) are discarded.
    pub fn push(
        &self,
        event: DecodedEvent,
    ) -> bool {
        let evicted = {
            let mut buffer = self.shared.buffer.lock();
            if buffer.closed {
                debug!(subscription_id = %event.subscription_id, "sink closed, event discarded");
                return false;
            }
            let evicted = if buffer.events.len() >= self.shared.capacity {
                buffer.events.pop_front()
            } else {
                None
            };
            buffer.events.push_back(event);
            evicted
        };
        self.shared.notify.notify_one();

        match evicted {
            Some(old) => {
                let total = self.shared.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                EVENTS_DROPPED.inc();
                warn!(
                    subscription_id = %old.subscription_id,
                    path = %old.path,
                    total,
                    "sink full, oldest event dropped"
                );
                let _ = self.shared.status.send(SessionStatus::EventsDropped { total });
                true
            }
            None => false,
        }
    }

    /// End the stream once buffered events are drained.
    ///
    /// A `terminal` error is delivered to the consumer as a final `Err`.
    /// Only the first close takes effect.
    pub fn close(
        &self,
        terminal: Option<TransportError>,
    ) {
        {
            let mut buffer = self.shared.buffer.lock();
            if buffer.closed {
                return;
            }
            buffer.closed = true;
            buffer.terminal = terminal;
        }
        self.shared.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.buffer.lock().closed
    }

    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.shared.buffer.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }
}

/// Consumer half handed to the caller
#[derive(Debug)]
pub struct EventStream {
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

impl EventStream {
    /// Next event in arrival order.
    ///
    /// Returns `None` once the session has closed and the buffer is empty.
    /// A session-fatal error is yielded once as `Some(Err(_))` after every
    /// buffered event.
    pub async fn recv(&mut self) -> Option<Result<DecodedEvent, Error>> {
        loop {
            let notified = self.shared.notify.notified();
            if let Some(item) = self.take() {
                return item;
            }
            notified.await;
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    ///
    /// The outer `None` means nothing is available yet.
    pub fn try_recv(&mut self) -> Option<Option<Result<DecodedEvent, Error>>> {
        self.take()
    }

    fn take(&self) -> Option<Option<Result<DecodedEvent, Error>>> {
        let mut buffer = self.shared.buffer.lock();
        if let Some(event) = buffer.events.pop_front() {
            return Some(Some(Ok(event)));
        }
        if let Some(err) = buffer.terminal.take() {
            return Some(Some(Err(err.into())));
        }
        if buffer.closed {
            return Some(None);
        }
        None
    }

    /// Events evicted so far because the consumer fell behind
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Cancel the owning session; the stream ends once the loop exits
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Adapt into a [`futures::Stream`]
    pub fn into_stream(self) -> impl Stream<Item = Result<DecodedEvent, Error>> + Send + 'static {
        futures::stream::unfold(self, |mut events| async move {
            let item = events.recv().await?;
            Some((item, events))
        })
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
