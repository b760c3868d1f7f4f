//! Dependency Recorder
//!
//! The recorder captures which (object, key) pairs are read while a tracked
//! evaluation runs. Recording is active whenever the nesting depth is above
//! zero.
//!
//! # Implementation
//!
//! All sessions of one runtime share a single path buffer. Starting a session
//! remembers the current end of the buffer (its mark); finishing it drains
//! everything appended since that mark. Because an inner session drains its
//! own tail before the outer one continues, nested sessions never see each
//! other's reads, and the outer session keeps appending after the inner one
//! ends.
//!
//! Sessions are represented by a guard. Dropping an unfinished guard (for
//! example while a callback panics) restores the depth and truncates the
//! buffer so the recorder stays consistent.

use std::cell::RefCell;
use std::fmt;

use smallvec::SmallVec;

use super::object::Object;
use super::value::Key;

/// One recorded dependency: a property of a specific object.
#[derive(Clone, PartialEq)]
pub struct Path {
    object: Object,
    key: Key,
}

impl Path {
    pub fn new(object: Object, key: Key) -> Self {
        Self { object, key }
    }

    pub fn object(&self) -> &Object {
        &self.object
    }

    pub fn key(&self) -> &Key {
        &self.key
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({:?}.{})", self.object.id(), self.key)
    }
}

/// The paths captured by one session. Most bindings read a handful of keys.
pub type Paths = SmallVec<[Path; 4]>;

/// Shared recording state for one runtime.
#[derive(Debug, Default)]
pub struct Recorder {
    depth: usize,
    buffer: Vec<Path>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any session is open.
    pub fn is_recording(&self) -> bool {
        self.depth > 0
    }

    /// Current nesting depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Append a path to the open session, if any.
    pub fn record(&mut self, path: Path) {
        if self.depth > 0 {
            self.buffer.push(path);
        }
    }

    fn begin(&mut self) -> usize {
        self.depth += 1;
        self.buffer.len()
    }

    fn end(&mut self, mark: usize) -> Paths {
        self.depth -= 1;
        self.buffer.drain(mark..).collect()
    }

    fn abandon(&mut self, mark: usize) {
        self.depth -= 1;
        self.buffer.truncate(mark);
    }
}

/// Guard for an open recording session.
pub struct RecordingSession<'a> {
    recorder: &'a RefCell<Recorder>,
    mark: usize,
    finished: bool,
}

impl<'a> RecordingSession<'a> {
    /// Open a session on the given recorder.
    pub fn begin(recorder: &'a RefCell<Recorder>) -> Self {
        let mark = recorder.borrow_mut().begin();
        Self {
            recorder,
            mark,
            finished: false,
        }
    }

    /// Close the session and return the paths it recorded.
    pub fn finish(mut self) -> Paths {
        self.finished = true;
        self.recorder.borrow_mut().end(self.mark)
    }
}

impl Drop for RecordingSession<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.recorder.borrow_mut().abandon(self.mark);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(object: &Object, key: &str) -> Path {
        Path::new(object.clone(), Key::from(key))
    }

    #[test]
    fn records_only_inside_a_session() {
        let recorder = RefCell::new(Recorder::new());
        let object = Object::new_map();

        recorder.borrow_mut().record(path(&object, "ignored"));
        assert!(!recorder.borrow().is_recording());

        let session = RecordingSession::begin(&recorder);
        assert!(recorder.borrow().is_recording());
        recorder.borrow_mut().record(path(&object, "a"));
        let paths = session.finish();

        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].key(), &Key::from("a"));
        assert!(!recorder.borrow().is_recording());
    }

    #[test]
    fn nested_sessions_are_isolated() {
        let recorder = RefCell::new(Recorder::new());
        let object = Object::new_map();

        let outer = RecordingSession::begin(&recorder);
        recorder.borrow_mut().record(path(&object, "before"));

        let inner = RecordingSession::begin(&recorder);
        assert_eq!(recorder.borrow().depth(), 2);
        recorder.borrow_mut().record(path(&object, "inner"));
        let inner_paths = inner.finish();

        recorder.borrow_mut().record(path(&object, "after"));
        let outer_paths = outer.finish();

        let inner_keys: Vec<_> = inner_paths.iter().map(|p| p.key().to_string()).collect();
        let outer_keys: Vec<_> = outer_paths.iter().map(|p| p.key().to_string()).collect();
        assert_eq!(inner_keys, vec!["inner"]);
        assert_eq!(outer_keys, vec!["before", "after"]);
    }

    #[test]
    fn dropped_session_restores_state() {
        let recorder = RefCell::new(Recorder::new());
        let object = Object::new_map();

        let outer = RecordingSession::begin(&recorder);
        recorder.borrow_mut().record(path(&object, "kept"));
        {
            let _abandoned = RecordingSession::begin(&recorder);
            recorder.borrow_mut().record(path(&object, "lost"));
        }
        assert_eq!(recorder.borrow().depth(), 1);

        let paths = outer.finish();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].key(), &Key::from("kept"));
    }
}
