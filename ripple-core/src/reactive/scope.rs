//! Effect Scopes
//!
//! An [`EffectScope`] collects the effects (and computeds) created while it
//! is current, so they can be stopped together. Scopes nest: a scope created
//! inside another is stopped with its parent unless it was created detached.

use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::subscriber::Subscriber;

type Cleanup = Box<dyn FnOnce() + Send>;

struct ScopeInner {
    active: AtomicBool,
    effects: Mutex<Vec<Arc<dyn Subscriber>>>,
    cleanups: Mutex<Vec<Cleanup>>,
    children: Mutex<Vec<EffectScope>>,
}

/// A group of effects stopped together.
#[derive(Clone)]
pub struct EffectScope {
    inner: Arc<ScopeInner>,
}

thread_local! {
    static CURRENT_SCOPE: RefCell<Option<EffectScope>> = const { RefCell::new(None) };
}

struct ScopeGuard {
    prev: Option<EffectScope>,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        let prev = self.prev.take();
        CURRENT_SCOPE.with(|current| *current.borrow_mut() = prev);
    }
}

impl EffectScope {
    /// Create a scope owned by the current scope, if there is one.
    pub fn new() -> Self {
        let scope = Self::detached();
        if let Some(parent) = get_current_scope() {
            if parent.is_active() {
                parent.inner.children.lock().push(scope.clone());
            }
        }
        scope
    }

    /// Create a scope that is never stopped by an enclosing scope.
    pub fn detached() -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                active: AtomicBool::new(true),
                effects: Mutex::new(Vec::new()),
                cleanups: Mutex::new(Vec::new()),
                children: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Run `f` with this scope current. Returns `None` once the scope has
    /// been stopped.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        if !self.is_active() {
            dev_warn!("cannot run an inactive effect scope");
            return None;
        }
        let prev = CURRENT_SCOPE.with(|current| current.borrow_mut().replace(self.clone()));
        let _guard = ScopeGuard { prev };
        Some(f())
    }

    /// Stop every effect and child scope, then run the dispose callbacks.
    pub fn stop(&self) {
        if !self.inner.active.swap(false, Ordering::SeqCst) {
            return;
        }
        let effects = std::mem::take(&mut *self.inner.effects.lock());
        let children = std::mem::take(&mut *self.inner.children.lock());
        let cleanups = std::mem::take(&mut *self.inner.cleanups.lock());
        debug!(
            effects = effects.len(),
            children = children.len(),
            cleanups = cleanups.len(),
            "stopping effect scope"
        );

        for effect in &effects {
            effect.core().stop();
        }
        for cleanup in cleanups {
            cleanup();
        }
        for child in &children {
            child.stop();
        }
    }

    /// Whether the scope has not been stopped.
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Number of effects registered directly with this scope.
    pub fn effect_count(&self) -> usize {
        self.inner.effects.lock().len()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn record(&self, effect: Arc<dyn Subscriber>) {
        if self.is_active() {
            self.inner.effects.lock().push(effect);
        }
    }
}

impl Default for EffectScope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EffectScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectScope")
            .field("active", &self.is_active())
            .field("effects", &self.effect_count())
            .field("children", &self.inner.children.lock().len())
            .finish()
    }
}

/// The scope made current by the innermost [`EffectScope::run`].
pub fn get_current_scope() -> Option<EffectScope> {
    CURRENT_SCOPE.with(|current| current.borrow().clone())
}

/// Register `f` to run when the current scope stops. Without a current
/// scope, `f` is dropped and a warning is emitted.
pub fn on_scope_dispose(f: impl FnOnce() + Send + 'static) {
    match get_current_scope() {
        Some(scope) if scope.is_active() => scope.inner.cleanups.lock().push(Box::new(f)),
        _ => dev_warn!("on_scope_dispose called without an active effect scope"),
    }
}

/// Attach a new effect to `scope`, or to the current scope.
pub(crate) fn record_effect_scope(effect: Arc<dyn Subscriber>, scope: Option<&EffectScope>) {
    match scope {
        Some(scope) => scope.record(effect),
        None => {
            if let Some(scope) = get_current_scope() {
                scope.record(effect);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{computed, create_ref, effect, effect_with, EffectOptions};
    use std::sync::atomic::AtomicI32;

    #[test]
    fn scope_collects_effects() {
        let count = create_ref(0);
        let runs = Arc::new(AtomicI32::new(0));
        let scope = EffectScope::new();

        let count_clone = count.clone();
        let runs_clone = runs.clone();
        scope.run(|| {
            let _runner = effect(move || {
                count_clone.get();
                runs_clone.fetch_add(1, Ordering::SeqCst);
            });
        });
        assert_eq!(scope.effect_count(), 1);

        // The scope keeps the effect alive past its runner.
        count.set(1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        scope.stop();
        count.set(2);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(count.subscriber_count(), 0);
    }

    #[test]
    fn computeds_register_with_scope() {
        let scope = EffectScope::new();
        let doubled = scope.run(|| computed(|| 2)).unwrap();
        assert_eq!(scope.effect_count(), 1);

        scope.stop();
        assert!(!doubled.effect().is_active());
    }

    #[test]
    fn explicit_scope_option() {
        let scope = EffectScope::detached();
        let runner = effect_with(|| {}, EffectOptions::new().in_scope(&scope));
        assert_eq!(scope.effect_count(), 1);

        scope.stop();
        assert!(!runner.effect().is_active());
    }

    #[test]
    fn nested_scopes_and_dispose_callbacks() {
        let disposed = Arc::new(AtomicI32::new(0));
        let parent = EffectScope::new();

        let disposed_clone = disposed.clone();
        let (child, detached) = parent
            .run(|| {
                let child = EffectScope::new();
                let detached = EffectScope::detached();
                child.run(|| {
                    on_scope_dispose(move || {
                        disposed_clone.fetch_add(1, Ordering::SeqCst);
                    });
                });
                (child, detached)
            })
            .unwrap();

        assert!(get_current_scope().is_none());

        parent.stop();
        assert!(!child.is_active());
        assert!(detached.is_active());
        assert_eq!(disposed.load(Ordering::SeqCst), 1);

        // Idempotent.
        parent.stop();
        assert_eq!(disposed.load(Ordering::SeqCst), 1);
        assert!(parent.run(|| ()).is_none());
    }
}
