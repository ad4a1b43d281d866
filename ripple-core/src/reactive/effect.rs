//! Effect Implementation
//!
//! An Effect is a computation that re-runs whenever something it read
//! changes.
//!
//! # How Effects Work
//!
//! 1. Unless created lazily, the effect runs its function immediately to
//!    establish initial dependencies.
//!
//! 2. Every read through a proxy, ref or computed during the run subscribes
//!    the effect to what was read.
//!
//! 3. When any of those change, the effect is notified. With no scheduler it
//!    re-runs right away; with a scheduler, the scheduler decides.
//!
//! 4. After each run, dependencies the run did not read again are dropped.
//!    Only the effect's own dependency list is walked to find them.
//!
//! # Stopping
//!
//! A stopped effect leaves every dependency set it belongs to and is never
//! notified again. Running it by hand still calls the function, without
//! tracking. Stopping an effect from inside its own run takes effect once
//! the run finishes.
//!
//! # Ownership
//!
//! Dependency sets hold effects weakly. Keep the [`EffectRunner`] (or the
//! [`ReactiveEffect`], or a scope) alive for as long as the effect should
//! react.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::trace;

use super::context::{untracked, ReactiveContext};
use super::scope::{record_effect_scope, EffectScope};
use super::subscriber::{EffectId, Subscriber};
use crate::graph::{Dep, WeakDep};

/// Callback invoked instead of re-running an effect.
pub type SchedulerFn = Arc<dyn Fn() + Send + Sync>;

/// Callback invoked once when an effect stops.
pub type StopFn = Arc<dyn Fn() + Send + Sync>;

/// How a notified effect is dispatched.
#[derive(Clone, Default)]
pub enum EffectScheduler {
    /// Re-run synchronously inside `trigger`.
    #[default]
    Immediate,
    /// Call the callback instead of running. The callback may run the effect
    /// later, or not at all.
    Deferred(SchedulerFn),
}

impl fmt::Debug for EffectScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate => f.write_str("Immediate"),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// Options for [`effect_with`].
#[derive(Clone, Default)]
pub struct EffectOptions {
    pub lazy: bool,
    pub scheduler: EffectScheduler,
    pub on_stop: Option<StopFn>,
    /// Scope to register with. Defaults to the current scope.
    pub scope: Option<EffectScope>,
}

impl EffectOptions {
    /// Default options: run immediately, no scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip the initial run.
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    /// Call `scheduler` on change instead of re-running.
    pub fn with_scheduler(mut self, scheduler: impl Fn() + Send + Sync + 'static) -> Self {
        self.scheduler = EffectScheduler::Deferred(Arc::new(scheduler));
        self
    }

    /// Call `on_stop` when the effect is stopped.
    pub fn with_on_stop(mut self, on_stop: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_stop = Some(Arc::new(on_stop));
        self
    }

    /// Register the effect with `scope` instead of the current scope.
    pub fn in_scope(mut self, scope: &EffectScope) -> Self {
        self.scope = Some(scope.clone());
        self
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("scheduler", &self.scheduler)
            .field("on_stop", &self.on_stop.is_some())
            .field("scope", &self.scope.is_some())
            .finish()
    }
}

/// State every effect carries, whatever its output type.
pub(crate) struct EffectCore {
    id: EffectId,
    active: AtomicBool,
    running: AtomicBool,
    deferred_stop: AtomicBool,
    epoch: AtomicU64,
    run_count: AtomicU64,
    /// Reverse index: every dep this effect is a member of.
    deps: Mutex<SmallVec<[WeakDep; 4]>>,
    scheduler: EffectScheduler,
    on_stop: Option<StopFn>,
}

impl EffectCore {
    fn new(scheduler: EffectScheduler, on_stop: Option<StopFn>) -> Self {
        Self {
            id: EffectId::new(),
            active: AtomicBool::new(true),
            running: AtomicBool::new(false),
            deferred_stop: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            run_count: AtomicU64::new(0),
            deps: Mutex::new(SmallVec::new()),
            scheduler,
            on_stop,
        }
    }

    pub(crate) fn id(&self) -> EffectId {
        self.id
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub(crate) fn scheduler(&self) -> &EffectScheduler {
        &self.scheduler
    }

    /// Add `dep` to the reverse index. Called once per membership.
    pub(crate) fn link(&self, dep: &Dep) {
        let mut deps = self.deps.lock();
        debug_assert!(
            deps.iter().all(|linked| linked.id() != dep.id()),
            "dep linked twice"
        );
        deps.push(dep.downgrade());
    }

    fn begin_run(&self) -> u64 {
        self.running.store(true, Ordering::SeqCst);
        self.run_count.fetch_add(1, Ordering::Relaxed);
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Drop every dep the run tagged `epoch` did not re-track, then apply a
    /// stop requested during the run.
    fn finish_run(&self, epoch: u64) {
        let id = self.id;
        let pruned = {
            let mut deps = self.deps.lock();
            let before = deps.len();
            deps.retain(|linked| match linked.upgrade() {
                Some(dep) if dep.tracked_in(id, epoch) => true,
                Some(dep) => {
                    dep.unsubscribe(id);
                    false
                }
                // The target is gone.
                None => false,
            });
            before - deps.len()
        };
        if pruned > 0 {
            trace!(effect = %id, pruned, "pruned stale deps");
        }

        self.running.store(false, Ordering::SeqCst);
        if self.deferred_stop.swap(false, Ordering::SeqCst) {
            self.stop();
        }
    }

    fn cleanup(&self) {
        let deps = std::mem::take(&mut *self.deps.lock());
        for dep in deps.iter().filter_map(WeakDep::upgrade) {
            dep.unsubscribe(self.id);
        }
    }

    pub(crate) fn stop(&self) {
        if self.running.load(Ordering::SeqCst) {
            self.deferred_stop.store(true, Ordering::SeqCst);
            return;
        }
        if self.active.swap(false, Ordering::SeqCst) {
            self.cleanup();
            trace!(effect = %self.id, "stopped");
            if let Some(on_stop) = &self.on_stop {
                on_stop();
            }
        }
    }

    pub(crate) fn dependency_count(&self) -> usize {
        self.deps.lock().len()
    }

    fn run_count(&self) -> u64 {
        self.run_count.load(Ordering::Relaxed)
    }
}

pub(crate) struct EffectInner<T> {
    core: EffectCore,
    func: Box<dyn Fn() -> T + Send + Sync>,
}

/// Ends a run on every exit path, panics included.
struct RunGuard<'a> {
    core: &'a EffectCore,
    epoch: u64,
    context: Option<ReactiveContext>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        // Leave the context before pruning, so nothing is tracked into a
        // finished run.
        drop(self.context.take());
        self.core.finish_run(self.epoch);
    }
}

impl<T: 'static> EffectInner<T> {
    fn run_effect(this: &Arc<Self>) -> Option<T> {
        if !this.core.is_active() {
            return Some(untracked(|| (this.func)()));
        }
        if ReactiveContext::contains(this.core.id) {
            trace!(effect = %this.core.id, "skipping re-entrant run");
            return None;
        }

        let epoch = this.core.begin_run();
        let subscriber: Arc<dyn Subscriber> = this.clone();
        let _guard = RunGuard {
            core: &this.core,
            epoch,
            context: Some(ReactiveContext::enter(subscriber, epoch)),
        };
        trace!(effect = %this.core.id, epoch, "run");
        Some((this.func)())
    }
}

impl<T: 'static> Subscriber for EffectInner<T> {
    fn core(&self) -> &EffectCore {
        &self.core
    }

    fn execute(self: Arc<Self>) {
        let _ = Self::run_effect(&self);
    }
}

impl<T> Drop for EffectInner<T> {
    fn drop(&mut self) {
        // Nothing can run a dropped effect, so membership is released
        // without calling `on_stop`.
        if self.core.active.swap(false, Ordering::SeqCst) {
            self.core.cleanup();
        }
    }
}

/// A tracked computation producing a `T` per run.
pub struct ReactiveEffect<T> {
    inner: Arc<EffectInner<T>>,
}

impl<T: 'static> ReactiveEffect<T> {
    /// Create an effect that re-runs immediately when notified. It does not
    /// run until [`run`](Self::run) is called.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::build(func, EffectScheduler::Immediate, None, None)
    }

    /// Create an effect whose notifications call `scheduler` instead of
    /// re-running it.
    pub fn with_scheduler<F, S>(func: F, scheduler: S) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
        S: Fn() + Send + Sync + 'static,
    {
        Self::build(func, EffectScheduler::Deferred(Arc::new(scheduler)), None, None)
    }

    pub(crate) fn build<F>(
        func: F,
        scheduler: EffectScheduler,
        on_stop: Option<StopFn>,
        scope: Option<&EffectScope>,
    ) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let inner = Arc::new(EffectInner {
            core: EffectCore::new(scheduler, on_stop),
            func: Box::new(func),
        });
        record_effect_scope(inner.clone(), scope);
        Self { inner }
    }

    /// Run the function, collecting dependencies.
    ///
    /// Returns `None` if this effect is already running further up the
    /// stack.
    pub fn run(&self) -> Option<T> {
        EffectInner::run_effect(&self.inner)
    }
}

impl<T> ReactiveEffect<T> {
    /// Stop the effect. Deferred until the run ends if called from inside it.
    pub fn stop(&self) {
        self.inner.core.stop();
    }

    /// Whether the effect still reacts to changes.
    pub fn is_active(&self) -> bool {
        self.inner.core.is_active()
    }

    /// The effect's unique id.
    pub fn id(&self) -> EffectId {
        self.inner.core.id
    }

    /// Number of dependency sets this effect belongs to.
    pub fn dependency_count(&self) -> usize {
        self.inner.core.dependency_count()
    }

    /// Number of tracked runs so far.
    pub fn run_count(&self) -> u64 {
        self.inner.core.run_count()
    }
}

impl<T> Clone for ReactiveEffect<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for ReactiveEffect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveEffect")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("active", &self.is_active())
            .finish()
    }
}

/// Handle returned by [`effect`]. Dropping it releases the effect unless a
/// scope holds it.
#[must_use = "the effect stops reacting once its runner is dropped"]
pub struct EffectRunner<T> {
    effect: ReactiveEffect<T>,
}

impl<T: 'static> EffectRunner<T> {
    /// Run the effect again. Returns `None` if it is already running.
    pub fn run(&self) -> Option<T> {
        self.effect.run()
    }
}

impl<T> EffectRunner<T> {
    /// The underlying effect.
    pub fn effect(&self) -> &ReactiveEffect<T> {
        &self.effect
    }

    /// Stop the effect.
    pub fn stop(&self) {
        self.effect.stop();
    }
}

impl<T> Clone for EffectRunner<T> {
    fn clone(&self) -> Self {
        Self {
            effect: self.effect.clone(),
        }
    }
}

impl<T> fmt::Debug for EffectRunner<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EffectRunner").field(&self.effect).finish()
    }
}

/// Create an effect and run it once.
///
/// # Example
///
/// ```rust
/// use ripple_core::{effect, reactive};
/// use serde_json::json;
///
/// let state = reactive(json!({"count": 0}));
/// let observed = state.as_observed().unwrap().clone();
///
/// let runner = effect(move || {
///     println!("count is {:?}", observed.get("count"));
/// });
/// assert_eq!(runner.effect().run_count(), 1);
/// ```
pub fn effect<T, F>(func: F) -> EffectRunner<T>
where
    T: 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    effect_with(func, EffectOptions::default())
}

/// Create an effect with options.
pub fn effect_with<T, F>(func: F, options: EffectOptions) -> EffectRunner<T>
where
    T: 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    let EffectOptions {
        lazy,
        scheduler,
        on_stop,
        scope,
    } = options;
    let effect = ReactiveEffect::build(func, scheduler, on_stop, scope.as_ref());
    if !lazy {
        effect.run();
    }
    EffectRunner { effect }
}

/// Stop the effect behind `runner`.
pub fn stop<T>(runner: &EffectRunner<T>) {
    runner.stop();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn effect_runs_on_creation() {
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let _runner = effect(move || {
            run_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        // Effect should have run once on creation
        assert_eq!(run_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn lazy_effect_does_not_run_on_creation() {
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let runner = effect_with(
            move || {
                run_count_clone.fetch_add(1, Ordering::SeqCst);
            },
            EffectOptions::new().lazy(),
        );

        assert_eq!(run_count.load(Ordering::SeqCst), 0);
        assert_eq!(runner.effect().run_count(), 0);

        runner.run();
        assert_eq!(run_count.load(Ordering::SeqCst), 1);
        assert_eq!(runner.effect().run_count(), 1);
    }

    #[test]
    fn run_returns_the_function_result() {
        let runner = effect(|| 42);
        assert_eq!(runner.run(), Some(42));
        assert_eq!(runner.effect().run_count(), 2);
    }

    #[test]
    fn stopped_effect_runs_untracked() {
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let runner = effect(move || run_count_clone.fetch_add(1, Ordering::SeqCst));
        stop(&runner);
        assert!(!runner.effect().is_active());

        // Manual runs still call the function but are not counted as tracked runs.
        assert_eq!(runner.run(), Some(1));
        assert_eq!(run_count.load(Ordering::SeqCst), 2);
        assert_eq!(runner.effect().run_count(), 1);
    }

    #[test]
    fn on_stop_fires_once() {
        let stops = Arc::new(AtomicI32::new(0));
        let stops_clone = stops.clone();

        let runner = effect_with(
            || {},
            EffectOptions::new().with_on_stop(move || {
                stops_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        runner.stop();
        runner.stop();
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn effect_clone_shares_state() {
        let effect1 = ReactiveEffect::new(|| {});
        let effect2 = effect1.clone();

        assert_eq!(effect1.id(), effect2.id());

        effect1.run();
        assert_eq!(effect2.run_count(), 1);

        effect1.stop();
        assert!(!effect2.is_active());
    }

    #[test]
    fn options_debug_hides_callbacks() {
        let options = EffectOptions::new().lazy().with_scheduler(|| {});
        let debug = format!("{options:?}");
        assert!(debug.contains("lazy: true"));
        assert!(debug.contains("Deferred(..)"));
    }
}
