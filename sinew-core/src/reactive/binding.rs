//! Computed Bindings
//!
//! A [`Binding`] is the output of one tracked evaluation: the value the
//! callback produced, the callback itself, and the dependency paths read
//! while it ran.
//!
//! # How Bindings Work
//!
//! 1. A recording session is opened.
//! 2. The callback runs exactly once, with no triggering change, to produce
//!    the initial value.
//! 3. The session is closed and its paths are packaged with the callback.
//!
//! When the binding is attached to an attribute or a child slot, the runtime
//! registers its paths as hooks. A later write to any of those paths replays
//! the callback to derive a fresh value from current state.
//!
//! # Differences from a Memo
//!
//! - Bindings never cache: every replay calls the callback.
//! - Dependencies are captured once, at build time, and never re-tracked.

use std::fmt;
use std::rc::Rc;

use super::recorder::{Path, Paths};
use super::session::Session;
use super::value::Value;

/// Replay callback. Receives the value carried by the triggering change, or
/// `None` for the initial evaluation.
pub type Replay<T> = Rc<dyn Fn(Option<&Value>) -> T>;

/// A value derived from state, plus what it depends on.
pub struct Binding<T> {
    initial: T,
    callback: Replay<T>,
    paths: Paths,
}

impl<T: 'static> Binding<T> {
    /// Evaluate `callback` under a nested recording session.
    ///
    /// `injected` is recorded first, as if the callback had read it. Without
    /// a session the callback still runs but nothing is recorded.
    pub(crate) fn track(
        session: Option<&Session>,
        injected: Option<Path>,
        callback: Replay<T>,
    ) -> Self {
        let Some(session) = session else {
            return Self::untracked(callback);
        };

        let open = session.begin();
        if let Some(path) = injected {
            session.record(path);
        }
        let initial = callback(None);
        let paths = open.finish();

        Self {
            initial,
            callback,
            paths,
        }
    }

    /// Evaluate `callback` without recording anything. The result never
    /// replays.
    pub fn untracked(callback: Replay<T>) -> Self {
        let initial = callback(None);
        Self {
            initial,
            callback,
            paths: Paths::new(),
        }
    }

    /// Transform the produced values, keeping the same dependencies.
    pub fn map<U: 'static>(self, f: impl Fn(T) -> U + 'static) -> Binding<U> {
        let callback = self.callback;
        let f = Rc::new(f);
        let initial = f(self.initial);
        Binding {
            initial,
            callback: Rc::new(move |change: Option<&Value>| f(callback(change))),
            paths: self.paths,
        }
    }
}

impl<T> Binding<T> {
    /// The value produced by the initial evaluation.
    pub fn initial(&self) -> &T {
        &self.initial
    }

    /// Dependency paths captured by the initial evaluation.
    pub fn paths(&self) -> &[Path] {
        &self.paths
    }

    /// Whether any dependency was captured.
    pub fn is_reactive(&self) -> bool {
        !self.paths.is_empty()
    }

    /// Run the callback again as if `change` had been written.
    pub fn replay(&self, change: Option<&Value>) -> T {
        (self.callback)(change)
    }

    pub(crate) fn into_parts(self) -> (T, Replay<T>, Paths) {
        (self.initial, self.callback, self.paths)
    }
}

impl<T: Clone> Clone for Binding<T> {
    fn clone(&self) -> Self {
        Self {
            initial: self.initial.clone(),
            callback: Rc::clone(&self.callback),
            paths: self.paths.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Binding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("initial", &self.initial)
            .field("paths", &self.paths)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::object::virtualize;
    use crate::reactive::{Key, Object};
    use std::cell::Cell;

    #[test]
    fn captures_initial_value_and_paths() {
        let session = Rc::new(Session::new());
        let state = virtualize(&session, &Object::new_map());
        state.set("a", 2).unwrap();
        state.set("b", 3).unwrap();

        let s = state.clone();
        let binding = Binding::track(
            Some(&*session),
            None,
            Rc::new(move |_: Option<&Value>| {
                s.get("a").as_f64().unwrap_or(0.0) + s.get("b").as_f64().unwrap_or(0.0)
            }),
        );

        assert_eq!(*binding.initial(), 5.0);
        let keys: Vec<_> = binding.paths().iter().map(|p| p.key().clone()).collect();
        assert_eq!(keys, vec![Key::from("a"), Key::from("b")]);
        assert!(binding.paths().iter().all(|p| p.object().ptr_eq(&state)));
    }

    #[test]
    fn callback_runs_once_until_replayed() {
        let session = Rc::new(Session::new());
        let runs = Rc::new(Cell::new(0));
        let counter = runs.clone();

        let binding = Binding::track(
            Some(&*session),
            None,
            Rc::new(move |change: Option<&Value>| {
                counter.set(counter.get() + 1);
                change.cloned().unwrap_or_default()
            }),
        );
        assert_eq!(runs.get(), 1);
        assert!(binding.initial().is_null());

        assert_eq!(binding.replay(Some(&Value::from(7))), Value::from(7));
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn injected_path_comes_first() {
        let session = Rc::new(Session::new());
        let list = virtualize(&session, &Object::new_seq());
        list.push("x").unwrap();

        let binding = Binding::track(
            Some(&*session),
            Some(Path::new(list.clone(), Key::Index(0))),
            Rc::new(|_: Option<&Value>| ()),
        );
        assert_eq!(binding.paths().len(), 1);
        assert_eq!(binding.paths()[0].key(), &Key::Index(0));
    }

    #[test]
    fn map_keeps_dependencies() {
        let session = Rc::new(Session::new());
        let state = virtualize(&session, &Object::new_map());
        state.set("n", 4).unwrap();

        let s = state.clone();
        let binding = Binding::track(
            Some(&*session),
            None,
            Rc::new(move |_: Option<&Value>| s.get("n")),
        )
        .map(|v| v.to_string());

        assert_eq!(binding.initial(), "4");
        assert_eq!(binding.paths().len(), 1);
        state.set("n", 9).unwrap();
        assert_eq!(binding.replay(None), "9");
    }

    #[test]
    fn untracked_binding_has_no_paths() {
        let binding = Binding::untracked(Rc::new(|_: Option<&Value>| 1));
        assert!(!binding.is_reactive());
        assert_eq!(*binding.initial(), 1);
    }
}
