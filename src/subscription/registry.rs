use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tracing::debug;
use tracing::trace;

use super::Subscription;
use super::SubscriptionId;
use super::SubscriptionMode;
use crate::match_path;
use crate::Error;
use crate::KeyBindings;
use crate::PathPattern;
use crate::RawUpdate;
use crate::Result;
use crate::SubscriptionError;

/// Set of active subscriptions.
///
/// Readers never block: the current set is published through an
/// [`ArcSwap`] and each write replaces it copy-on-write. Writers are
/// serialised by `write_lock` so concurrent `add`/`remove` calls cannot lose
/// each other's changes.
#[derive(Debug)]
pub struct SubscriptionRegistry {
    current: ArcSwap<Vec<Subscription>>,
    write_lock: Mutex<()>,
    next_id: AtomicU64,
    generation: AtomicU64,
}

/// Immutable view of the registry taken at the start of a subscribe cycle
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    subscriptions: Arc<Vec<Subscription>>,
    generation: u64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(Vec::new()),
            write_lock: Mutex::new(()),
            next_id: AtomicU64::new(1),
            generation: AtomicU64::new(0),
        }
    }

    /// Register a new subscription and return its id.
    ///
    /// # Errors
    /// [`Error::Config`] if `mode` is `Sample` with a zero interval. The
    /// registry is left unchanged in that case.
    pub fn add(
        &self,
        pattern: PathPattern,
        mode: SubscriptionMode,
    ) -> Result<SubscriptionId> {
        if let SubscriptionMode::Sample { interval } = mode {
            if interval.is_zero() {
                return Err(Error::config(format!(
                    "sample_interval for {pattern} must be > 0"
                )));
            }
        }

        let _guard = self.write_lock.lock();
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut next = Vec::clone(&self.current.load());
        next.push(Subscription { id, pattern, mode });
        self.publish(next);

        debug!(%id, "subscription added");
        Ok(id)
    }

    /// Remove a subscription.
    ///
    /// # Errors
    /// [`SubscriptionError::UnknownSubscription`] if `id` is not registered.
    pub fn remove(
        &self,
        id: SubscriptionId,
    ) -> Result<()> {
        let _guard = self.write_lock.lock();
        let current = self.current.load();
        if !current.iter().any(|s| s.id == id) {
            return Err(SubscriptionError::UnknownSubscription(id).into());
        }
        let next = current.iter().filter(|s| s.id != id).cloned().collect();
        self.publish(next);

        debug!(%id, "subscription removed");
        Ok(())
    }

    pub fn get(
        &self,
        id: SubscriptionId,
    ) -> Option<Subscription> {
        self.current.load().iter().find(|s| s.id == id).cloned()
    }

    /// All active subscriptions, in registration order
    pub fn all(&self) -> Vec<Subscription> {
        Vec::clone(&self.current.load())
    }

    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }

    /// Bumped on every successful add/remove
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        let _guard = self.write_lock.lock();
        RegistrySnapshot {
            subscriptions: self.current.load_full(),
            generation: self.generation.load(Ordering::Acquire),
        }
    }

    /// Match an update against every active pattern
    pub fn match_update(
        &self,
        update: &RawUpdate,
    ) -> Vec<(SubscriptionId, KeyBindings)> {
        match_all(&self.current.load(), update)
    }

    fn publish(
        &self,
        next: Vec<Subscription>,
    ) {
        self.current.store(Arc::new(next));
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistrySnapshot {
    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    pub fn ids(&self) -> Vec<SubscriptionId> {
        self.subscriptions.iter().map(Subscription::id).collect()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn match_update(
        &self,
        update: &RawUpdate,
    ) -> Vec<(SubscriptionId, KeyBindings)> {
        match_all(&self.subscriptions, update)
    }
}

fn match_all(
    subscriptions: &[Subscription],
    update: &RawUpdate,
) -> Vec<(SubscriptionId, KeyBindings)> {
    let matches: Vec<_> = subscriptions
        .iter()
        .filter_map(|s| match_path(&s.pattern, &update.path).map(|keys| (s.id, keys)))
        .collect();
    trace!(path = %update.path, matched = matches.len(), "update matched");
    matches
}
