//! Reactive Primitives
//!
//! This module implements the reactive half of Sinew: virtualized state
//! objects, dependency recording, bindings, the hook registry and the
//! deferred flush.
//!
//! # Concepts
//!
//! ## Virtualized Objects
//!
//! An [`Object`] is a shared mapping or sequence of [`Value`]s. Once a
//! [`Runtime`] has virtualized it, reads made during a tracked evaluation are
//! recorded and every write is queued as a [`Change`]. Nested objects are
//! virtualized lazily, the first time they are read.
//!
//! ## Bindings
//!
//! A [`Binding`] is what a tracked evaluation produces: its initial value,
//! the callback that produced it and the `(object, key)` paths it read. The
//! runtime registers those paths as hooks when the binding is mounted.
//!
//! ## Flushes
//!
//! Writes are not applied to the UI immediately. The first write after a
//! flush schedules the next one through a [`Scheduler`]; every write made
//! before it runs is coalesced into it.
//!
//! # Implementation Notes
//!
//! Recording state lives in the runtime and is reached through the object's
//! weak link to it, never through ambient globals. Only own keys are
//! recorded: a read that falls through to a parent object is not a
//! dependency.

mod binding;
pub(crate) mod object;
mod queue;
mod recorder;
mod registry;
mod runtime;
mod scheduler;
mod session;
mod value;

pub use binding::{Binding, Replay};
pub use object::{Object, ObjectId, WeakObject};
pub use queue::{Change, ChangeQueue};
pub use recorder::{Path, Paths, Recorder, RecordingSession};
pub use registry::{HookList, HookRegistry};
pub use runtime::{FlushReport, Runtime};
pub use scheduler::{LocalTaskScheduler, MicrotaskQueue, Scheduler, SchedulerKind, Task};
pub use value::{Key, Value};
