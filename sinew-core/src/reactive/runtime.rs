//! Reactive Runtime
//!
//! The runtime is the central coordinator for one UI tree. It owns the
//! tracking session that virtualized objects report to, the hook registry,
//! the scheduler and the host the tree lives in.
//!
//! # How It Works
//!
//! 1. `virtualize` links a state object to the runtime's session. Reads made
//!    during `compute` are recorded as dependency paths.
//!
//! 2. `mount` builds descriptors into the host tree. Every binding it meets
//!    is applied from its initial value and its paths are registered as
//!    hooks.
//!
//! 3. A write to a virtualized object enqueues a change. The first one since
//!    the last flush asks the scheduler for a flush.
//!
//! 4. The flush drains the queue in order:
//!    a. Look up the hook list for `(receiver, key)`
//!    b. Skip it if it already ran during this flush
//!    c. Run each action with the change's value, except actions registered
//!       after the change was queued
//!    d. Once the queue is empty, prune registry entries for dead objects
//!       and retire actions whose nodes are all gone
//!
//! # Threading
//!
//! A runtime and everything it touches is confined to one thread. Handles are
//! `Rc` clones of the same runtime.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::Serialize;
use tracing::{debug, debug_span, error, trace, warn};

use super::binding::Binding;
use super::object::{self, Object};
use super::recorder::Path;
use super::registry::HookRegistry;
use super::scheduler::{LocalTaskScheduler, MicrotaskQueue, Scheduler, SchedulerKind};
use super::session::Session;
use super::value::Value;
use crate::config::RuntimeConfig;
use crate::error::{Error, Result};
use crate::tree::{HookAction, Host};

/// Counters for one completed flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    /// Changes taken off the queue.
    pub changes: usize,

    /// Distinct hook lists that ran.
    pub lists_run: usize,

    /// Hook actions executed across those lists.
    pub actions_run: usize,
}

struct RuntimeInner<H: Host> {
    host: H,
    session: Rc<Session>,
    hooks: RefCell<HookRegistry<Hook<H>>>,
    scheduler: Rc<dyn Scheduler>,
    microtasks: MicrotaskQueue,
    config: RuntimeConfig,
    flushing: Cell<bool>,
    task_pending: Cell<bool>,
}

/// A registered action and the last change queued before it was built.
struct Hook<H: Host> {
    since: u64,
    action: HookAction<H>,
}

/// Handle to a reactive runtime driving one host tree.
pub struct Runtime<H: Host> {
    inner: Rc<RuntimeInner<H>>,
}

impl<H: Host> Clone for Runtime<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<H: Host + 'static> Runtime<H> {
    /// Create a runtime with the default configuration.
    pub fn new(host: H) -> Self {
        let microtasks = MicrotaskQueue::new();
        let scheduler = Rc::new(microtasks.clone());
        Self::build(host, RuntimeConfig::default(), scheduler, microtasks)
    }

    /// Create a runtime whose scheduler is picked by `config`.
    pub fn with_config(host: H, config: RuntimeConfig) -> Result<Self> {
        config.validate()?;
        let microtasks = MicrotaskQueue::new();
        let scheduler: Rc<dyn Scheduler> = match config.scheduler {
            SchedulerKind::Microtask => Rc::new(microtasks.clone()),
            SchedulerKind::TokioLocal => Rc::new(LocalTaskScheduler::new(microtasks.clone())),
        };
        Ok(Self::build(host, config, scheduler, microtasks))
    }

    /// Create a runtime that defers flushes through a custom scheduler.
    pub fn with_scheduler(
        host: H,
        config: RuntimeConfig,
        scheduler: impl Scheduler + 'static,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(
            host,
            config,
            Rc::new(scheduler),
            MicrotaskQueue::new(),
        ))
    }

    fn build(
        host: H,
        config: RuntimeConfig,
        scheduler: Rc<dyn Scheduler>,
        microtasks: MicrotaskQueue,
    ) -> Self {
        let inner = Rc::new(RuntimeInner {
            host,
            session: Rc::new(Session::new()),
            hooks: RefCell::new(HookRegistry::new()),
            scheduler,
            microtasks,
            config,
            flushing: Cell::new(false),
            task_pending: Cell::new(false),
        });

        let weak = Rc::downgrade(&inner);
        inner
            .session
            .set_flush_request(move || request_flush(&weak));

        Self { inner }
    }

    pub fn host(&self) -> &H {
        &self.inner.host
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Link `object` to this runtime and return it. Objects reached through it
    /// are linked lazily, on first read. Virtualizing twice is a no-op.
    pub fn virtualize(&self, object: &Object) -> Object {
        object::virtualize(&self.inner.session, object)
    }

    /// Build a virtualized object from plain JSON data.
    pub fn state(&self, json: serde_json::Value) -> Result<Object> {
        Ok(self.virtualize(&Object::from_json(json)?))
    }

    /// Evaluate `f` once, recording what it reads.
    ///
    /// The result can be used as an attribute value or a child; later writes
    /// to anything `f` read re-run it to patch that spot.
    pub fn compute<T, F>(&self, f: F) -> Binding<T>
    where
        T: 'static,
        F: Fn() -> T + 'static,
    {
        Binding::track(
            Some(&*self.inner.session),
            None,
            Rc::new(move |_: Option<&Value>| f()),
        )
    }

    /// Like [`compute`](Self::compute), but `f` also receives the value
    /// carried by the change that triggered a replay (`None` the first time).
    pub fn compute_with<T, F>(&self, f: F) -> Binding<T>
    where
        T: 'static,
        F: Fn(Option<&Value>) -> T + 'static,
    {
        Binding::track(Some(&*self.inner.session), None, Rc::new(f))
    }

    /// Whether a tracked evaluation is running.
    pub fn is_recording(&self) -> bool {
        self.inner.session.is_recording()
    }

    pub(crate) fn register(&self, paths: &[Path], action: HookAction<H>) {
        let since = self.inner.session.last_sequence();
        trace!(paths = paths.len(), since, ?action, "registering hook");
        self.inner
            .hooks
            .borrow_mut()
            .register(paths, Rc::new(Hook { since, action }));
    }

    /// Drain the change queue and run the affected hooks.
    ///
    /// Each hook list runs at most once, with the value of the first change
    /// that reached it. Changes enqueued by the hooks themselves are drained
    /// by this same call. An action never runs for a change that was queued
    /// before it was registered, since it was built from the written state.
    pub fn flush(&self) -> Result<FlushReport> {
        let inner: &RuntimeInner<H> = &self.inner;
        if inner.flushing.replace(true) {
            return Err(Error::FlushInProgress);
        }
        let mut guard = FlushGuard {
            inner,
            completed: false,
        };

        let span = debug_span!("flush", pending = inner.session.pending());
        let _enter = span.enter();

        let limit = inner.config.max_flush_changes;
        let mut report = FlushReport::default();
        let mut seen = HashSet::new();

        while let Some(change) = inner.session.next_change() {
            report.changes += 1;
            if report.changes > limit {
                let dropped = inner.session.abort();
                warn!(limit, dropped, "flush overflow, remaining changes dropped");
                inner.hooks.borrow_mut().prune();
                guard.completed = true;
                return Err(Error::FlushOverflow { limit });
            }

            let list = inner.hooks.borrow().lookup(&change.receiver, &change.key);
            let Some(list) = list else {
                continue;
            };
            let id = Rc::as_ptr(&list);
            if seen.contains(&id) {
                continue;
            }

            // Actions appended while the list runs are checked too.
            let mut ran = 0;
            let mut index = 0;
            loop {
                let hook = list.borrow().get(index).map(Rc::clone);
                let Some(hook) = hook else {
                    break;
                };
                index += 1;
                if hook.since >= change.sequence {
                    trace!(key = %change.key, since = hook.since, "hook is newer than change");
                    continue;
                }
                trace!(key = %change.key, action = ?hook.action, "running hook");
                self.apply(&hook.action, &change.value);
                ran += 1;
            }

            // A list with only newer actions stays eligible for later changes.
            if ran > 0 {
                seen.insert(id);
                report.lists_run += 1;
                report.actions_run += ran;
            }
        }

        inner.session.finish_flush();
        let (pruned, retired) = {
            let mut hooks = inner.hooks.borrow_mut();
            let pruned = hooks.prune();
            (pruned, hooks.retain_actions(|hook| hook.action.is_live(&inner.host)))
        };
        guard.completed = true;

        debug!(
            changes = report.changes,
            lists = report.lists_run,
            actions = report.actions_run,
            pruned,
            retired,
            "flush complete"
        );
        Ok(report)
    }

    /// Run deferred tasks queued on the default scheduler, including the
    /// flushes they trigger. Returns how many tasks ran.
    pub fn run_microtasks(&self) -> usize {
        self.inner.microtasks.run_until_stalled()
    }

    /// Whether a flush has been requested and not yet run.
    pub fn is_flush_scheduled(&self) -> bool {
        self.inner.session.is_scheduled()
    }

    pub fn pending_changes(&self) -> usize {
        self.inner.session.pending()
    }

    /// Number of objects with registered hooks.
    pub fn hook_count(&self) -> usize {
        self.inner.hooks.borrow().len()
    }
}

/// Schedule a flush task unless one is already waiting. A direct `flush()`
/// leaves the waiting task in place; it runs later and finds whatever was
/// queued since.
fn request_flush<H: Host + 'static>(weak: &Weak<RuntimeInner<H>>) {
    let Some(inner) = weak.upgrade() else {
        return;
    };
    if inner.task_pending.replace(true) {
        trace!("flush task already waiting");
        return;
    }
    let weak = weak.clone();
    inner.scheduler.schedule(Box::new(move || {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        inner.task_pending.set(false);
        let runtime = Runtime { inner };
        if let Err(e) = runtime.flush() {
            warn!(error = %e, "scheduled flush failed");
        }
    }));
}

/// Resets the flushing flag. If the flush unwound, also drops whatever is
/// still queued so later writes schedule a fresh flush.
struct FlushGuard<'a, H: Host> {
    inner: &'a RuntimeInner<H>,
    completed: bool,
}

impl<H: Host> Drop for FlushGuard<'_, H> {
    fn drop(&mut self) {
        self.inner.flushing.set(false);
        if !self.completed {
            let dropped = self.inner.session.abort();
            error!(dropped, "flush aborted by a panicking callback");
        }
    }
}

impl<H: Host> fmt::Debug for Runtime<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("session", &self.inner.session)
            .field("hooked_objects", &self.inner.hooks.borrow().len())
            .field("flushing", &self.inner.flushing.get())
            .field("config", &self.inner.config)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Child, Descriptor, MemoryHost, MemoryNode};
    use std::panic::{catch_unwind, AssertUnwindSafe};

    fn setup() -> (Runtime<MemoryHost>, Object, MemoryNode) {
        let runtime = Runtime::new(MemoryHost::new());
        let state = runtime.virtualize(&Object::new_map());
        let root = runtime.host().create_root("div");
        (runtime, state, root)
    }

    #[test]
    fn many_writes_schedule_one_flush() {
        let (runtime, state, _root) = setup();

        for n in 0..5 {
            state.set("count", n).unwrap();
        }
        assert!(runtime.is_flush_scheduled());
        assert_eq!(runtime.pending_changes(), 6);

        assert_eq!(runtime.run_microtasks(), 1);
        assert!(!runtime.is_flush_scheduled());
        assert_eq!(runtime.pending_changes(), 0);
    }

    #[test]
    fn first_change_to_reach_a_list_wins() {
        let (runtime, state, root) = setup();
        state.set("n", 0).unwrap();
        runtime.flush().unwrap();

        let s = state.clone();
        let binding = runtime.compute_with(move |change: Option<&Value>| match change {
            Some(value) => value.to_string(),
            None => s.get("n").to_string(),
        });
        runtime.mount(Child::from(binding), &root);

        state.set("n", 1).unwrap();
        state.set("n", 2).unwrap();
        let report = runtime.flush().unwrap();

        assert_eq!(report.changes, 2);
        assert_eq!(report.lists_run, 1);
        assert_eq!(report.actions_run, 1);
        assert_eq!(root.text_content(), "1");
        assert_eq!(state.peek("n"), Value::from(2));
    }

    #[test]
    fn writes_made_by_hooks_join_the_same_flush() {
        let (runtime, state, root) = setup();
        state.set("a", 1).unwrap();
        state.set("b", 0).unwrap();
        runtime.flush().unwrap();

        let s = state.clone();
        runtime.mount(
            Child::from(runtime.compute(move || {
                let a = s.get("a");
                s.set("b", a.as_f64().unwrap_or(0.0) * 10.0).ok();
                a
            })),
            &root,
        );
        let s = state.clone();
        runtime.mount(Child::from(runtime.compute(move || s.get("b"))), &root);
        runtime.flush().unwrap();
        assert_eq!(root.text_content(), "110");

        state.set("a", 2).unwrap();
        let report = runtime.flush().unwrap();
        assert_eq!(report.lists_run, 2);
        assert_eq!(root.text_content(), "220");
        assert!(!runtime.is_flush_scheduled());
    }

    #[test]
    fn hooks_built_after_a_write_skip_it() {
        let (runtime, state, root) = setup();
        state.set("show", false).unwrap();
        state.set("x", 0).unwrap();
        runtime.flush().unwrap();

        let evaluations = Rc::new(Cell::new(0));
        let (s, rt, count) = (state.clone(), runtime.clone(), evaluations.clone());
        runtime.mount(
            Child::from(runtime.compute(move || {
                if s.get("show").as_bool() != Some(true) {
                    return Child::empty();
                }
                let (inner, count) = (s.clone(), count.clone());
                Child::from(rt.compute(move || {
                    count.set(count.get() + 1);
                    inner.get("x")
                }))
            })),
            &root,
        );

        // The inner binding is built after both writes were queued
        state.set("show", true).unwrap();
        state.set("x", 5).unwrap();
        let report = runtime.flush().unwrap();

        assert_eq!(report.changes, 2);
        assert_eq!(report.lists_run, 1);
        assert_eq!(report.actions_run, 1);
        assert_eq!(evaluations.get(), 1);
        assert_eq!(root.text_content(), "5");

        // Later writes reach it
        state.set("x", 6).unwrap();
        let report = runtime.flush().unwrap();
        assert_eq!(report.actions_run, 1);
        assert_eq!(evaluations.get(), 2);
        assert_eq!(root.text_content(), "6");
    }

    #[test]
    fn direct_flushes_reuse_the_waiting_task() {
        let (runtime, state, _root) = setup();

        for n in 0..1000 {
            state.set("n", n).unwrap();
            runtime.flush().unwrap();
        }
        assert_eq!(runtime.inner.microtasks.pending(), 1);
        assert_eq!(runtime.run_microtasks(), 1);

        state.set("n", -1).unwrap();
        assert_eq!(runtime.inner.microtasks.pending(), 1);
        assert_eq!(runtime.run_microtasks(), 1);
        assert_eq!(runtime.pending_changes(), 0);
    }

    #[test]
    fn runaway_cascade_overflows() {
        let config = RuntimeConfig {
            max_flush_changes: 50,
            ..RuntimeConfig::default()
        };
        let runtime = Runtime::with_config(MemoryHost::new(), config).unwrap();
        let state = runtime.virtualize(&Object::new_map());
        state.set("n", 0).unwrap();
        runtime.flush().unwrap();
        let root = runtime.host().create_root("div");

        let s = state.clone();
        runtime.mount(
            Descriptor::new("div").attr(
                "data-n",
                runtime.compute_with(move |change: Option<&Value>| {
                    if change.is_some() {
                        for i in 0..100 {
                            s.set("spam", i).ok();
                        }
                    }
                    s.get("n")
                }),
            ),
            &root,
        );

        state.set("n", 1).unwrap();
        let err = runtime.flush().unwrap_err();
        assert_eq!(err, Error::FlushOverflow { limit: 50 });
        assert_eq!(runtime.pending_changes(), 0);
        assert!(!runtime.is_flush_scheduled());
    }

    #[test]
    fn nested_flush_is_rejected() {
        let (runtime, state, root) = setup();
        state.set("x", 0).unwrap();
        runtime.flush().unwrap();

        let nested = Rc::new(RefCell::new(None));
        let (s, rt, slot) = (state.clone(), runtime.clone(), nested.clone());
        runtime.mount(
            Child::from(runtime.compute_with(move |change: Option<&Value>| {
                if change.is_some() {
                    *slot.borrow_mut() = Some(rt.flush());
                }
                s.get("x")
            })),
            &root,
        );

        state.set("x", 1).unwrap();
        runtime.flush().unwrap();
        assert_eq!(*nested.borrow(), Some(Err(Error::FlushInProgress)));
    }

    #[test]
    fn panicking_hook_aborts_the_flush() {
        let (runtime, state, root) = setup();
        state.set("boom", false).unwrap();
        state.set("other", 0).unwrap();
        runtime.flush().unwrap();

        let s = state.clone();
        runtime.mount(
            Child::from(runtime.compute(move || {
                if s.get("boom").as_bool() == Some(true) {
                    panic!("hook failed");
                }
                "ok"
            })),
            &root,
        );

        state.set("boom", true).unwrap();
        state.set("other", 1).unwrap();
        let result = catch_unwind(AssertUnwindSafe(|| runtime.flush()));
        assert!(result.is_err());
        assert_eq!(runtime.pending_changes(), 0);
        assert!(!runtime.is_flush_scheduled());

        state.set("boom", false).unwrap();
        assert!(runtime.is_flush_scheduled());
        assert!(runtime.flush().is_ok());
    }

    #[test]
    fn dropped_runtime_leaves_objects_plain() {
        let state = {
            let runtime = Runtime::new(MemoryHost::new());
            runtime.virtualize(&Object::new_map())
        };
        state.set("a", 1).unwrap();
        assert_eq!(state.get("a"), Value::from(1));
    }

    #[test]
    fn rejects_invalid_config() {
        let config = RuntimeConfig {
            max_flush_changes: 0,
            ..RuntimeConfig::default()
        };
        assert!(matches!(
            Runtime::with_config(MemoryHost::new(), config),
            Err(Error::Config(_))
        ));
    }
}
