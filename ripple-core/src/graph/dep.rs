//! Dependency Sets
//!
//! A [`Dep`] is the set of effects that read one (target, key) pair, or one
//! ref or computed. Membership is keyed by effect id, so tracking the same
//! pair twice in a run is a no-op.
//!
//! Each membership remembers the run epoch in which it was last tracked.
//! When a run finishes, the effect drops every membership still carrying an
//! older epoch; those are the reads the run did not repeat.
//!
//! Members are held weakly. A Dep never keeps an effect alive.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::reactive::{EffectId, Subscriber};

/// Unique identifier for a dependency set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepId(u64);

impl DepId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

struct Subscription {
    subscriber: Weak<dyn Subscriber>,
    epoch: u64,
}

struct DepInner {
    id: DepId,
    subscribers: Mutex<IndexMap<EffectId, Subscription>>,
}

/// A deduplicated set of subscribed effects.
#[derive(Clone)]
pub struct Dep {
    inner: Arc<DepInner>,
}

impl Dep {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DepInner {
                id: DepId::new(),
                subscribers: Mutex::new(IndexMap::new()),
            }),
        }
    }

    /// The dep's unique id.
    pub fn id(&self) -> DepId {
        self.inner.id
    }

    /// Number of subscribed effects.
    pub fn len(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `effect` is subscribed.
    pub fn contains(&self, effect: EffectId) -> bool {
        self.inner.subscribers.lock().contains_key(&effect)
    }

    /// Record that `subscriber` read this dep during run `epoch`.
    ///
    /// Returns `true` if the effect was not yet a member, in which case the
    /// caller must link the dep into the effect's reverse index.
    pub(crate) fn subscribe(&self, subscriber: &Arc<dyn Subscriber>, epoch: u64) -> bool {
        let id = subscriber.core().id();
        let mut subscribers = self.inner.subscribers.lock();
        match subscribers.get_mut(&id) {
            Some(subscription) => {
                subscription.epoch = epoch;
                false
            }
            None => {
                subscribers.insert(
                    id,
                    Subscription {
                        subscriber: Arc::downgrade(subscriber),
                        epoch,
                    },
                );
                true
            }
        }
    }

    /// Whether `effect` re-tracked this dep during run `epoch`.
    pub(crate) fn tracked_in(&self, effect: EffectId, epoch: u64) -> bool {
        self.inner
            .subscribers
            .lock()
            .get(&effect)
            .is_some_and(|subscription| subscription.epoch == epoch)
    }

    pub(crate) fn unsubscribe(&self, effect: EffectId) {
        self.inner.subscribers.lock().swap_remove(&effect);
    }

    /// Copy live members into `into`, skipping effects already present.
    pub(crate) fn collect_into(&self, into: &mut IndexMap<EffectId, Arc<dyn Subscriber>>) {
        let subscribers = self.inner.subscribers.lock();
        for (id, subscription) in subscribers.iter() {
            if into.contains_key(id) {
                continue;
            }
            if let Some(subscriber) = subscription.subscriber.upgrade() {
                into.insert(*id, subscriber);
            }
        }
    }

    pub(crate) fn downgrade(&self) -> WeakDep {
        WeakDep {
            id: self.inner.id,
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl Default for Dep {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Dep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dep")
            .field("id", &self.inner.id)
            .field("len", &self.len())
            .finish()
    }
}

/// An effect's non-owning link back to a dep it belongs to.
pub(crate) struct WeakDep {
    id: DepId,
    inner: Weak<DepInner>,
}

impl WeakDep {
    pub(crate) fn id(&self) -> DepId {
        self.id
    }

    pub(crate) fn upgrade(&self) -> Option<Dep> {
        self.inner.upgrade().map(|inner| Dep { inner })
    }
}
