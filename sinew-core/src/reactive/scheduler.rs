//! Flush Scheduling
//!
//! A write never patches the UI synchronously. The first write after a flush
//! asks the runtime's [`Scheduler`] to run one flush later, after the current
//! synchronous work completes. Every write made before that flush runs is
//! coalesced into it.
//!
//! # Schedulers
//!
//! - [`MicrotaskQueue`]: deferred tasks are kept in a local queue and the host
//!   drains them after its synchronous turn (`Runtime::run_microtasks`).
//! - [`LocalTaskScheduler`]: the flush is spawned onto the current tokio
//!   `LocalSet` and runs on its next turn. Outside a tokio runtime it falls
//!   back to a [`MicrotaskQueue`].

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce()>;

/// Something that can run a task after the current synchronous turn.
pub trait Scheduler {
    fn schedule(&self, task: Task);
}

/// Which scheduler a runtime builds from its configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerKind {
    /// Host-drained [`MicrotaskQueue`].
    #[default]
    Microtask,

    /// [`LocalTaskScheduler`] on a tokio `LocalSet`.
    TokioLocal,
}

/// A queue of deferred tasks drained explicitly by the host.
#[derive(Clone, Default)]
pub struct MicrotaskQueue {
    tasks: Rc<RefCell<VecDeque<Task>>>,
}

impl MicrotaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Run tasks until the queue is empty, including tasks scheduled by the
    /// tasks themselves. Returns how many ran.
    pub fn run_until_stalled(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.tasks.borrow_mut().pop_front();
            let Some(task) = next else {
                break;
            };
            task();
            ran += 1;
        }
        if ran > 0 {
            trace!(ran, "microtasks drained");
        }
        ran
    }
}

impl Scheduler for MicrotaskQueue {
    fn schedule(&self, task: Task) {
        self.tasks.borrow_mut().push_back(task);
    }
}

impl fmt::Debug for MicrotaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MicrotaskQueue")
            .field("pending", &self.pending())
            .finish()
    }
}

/// Spawns each task onto the current tokio `LocalSet`.
///
/// With no tokio runtime on the thread, tasks go to `fallback` instead and
/// wait for the host to drain it. Inside a runtime but outside a `LocalSet`,
/// scheduling panics as `tokio::task::spawn_local` does.
#[derive(Debug, Clone, Default)]
pub struct LocalTaskScheduler {
    fallback: MicrotaskQueue,
}

impl LocalTaskScheduler {
    pub fn new(fallback: MicrotaskQueue) -> Self {
        Self { fallback }
    }
}

impl Scheduler for LocalTaskScheduler {
    fn schedule(&self, task: Task) {
        if tokio::runtime::Handle::try_current().is_err() {
            warn!("no tokio runtime on this thread, deferring to microtasks");
            self.fallback.schedule(task);
            return;
        }
        tokio::task::spawn_local(async move { task() });
    }
}
