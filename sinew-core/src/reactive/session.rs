//! Tracking Session
//!
//! The part of a runtime that virtualized objects talk to: the dependency
//! recorder and the change queue. Objects hold a weak link to it, so a
//! dropped runtime simply turns their reads and writes back into plain ones.
//!
//! The session does not know how to flush. The runtime installs a flush
//! request callback, invoked once on the first enqueue after a flush.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use super::queue::{Change, ChangeQueue};
use super::recorder::{Path, Recorder, RecordingSession};

type FlushRequest = Rc<dyn Fn()>;

pub(crate) struct Session {
    recorder: RefCell<Recorder>,
    queue: RefCell<ChangeQueue>,
    scheduled: Cell<bool>,
    flush_request: RefCell<Option<FlushRequest>>,
}

impl Session {
    pub(crate) fn new() -> Self {
        Self {
            recorder: RefCell::new(Recorder::new()),
            queue: RefCell::new(ChangeQueue::new()),
            scheduled: Cell::new(false),
            flush_request: RefCell::new(None),
        }
    }

    pub(crate) fn set_flush_request(&self, request: impl Fn() + 'static) {
        *self.flush_request.borrow_mut() = Some(Rc::new(request));
    }

    pub(crate) fn begin(&self) -> RecordingSession<'_> {
        RecordingSession::begin(&self.recorder)
    }

    pub(crate) fn is_recording(&self) -> bool {
        self.recorder.borrow().is_recording()
    }

    pub(crate) fn record(&self, path: Path) {
        let mut recorder = self.recorder.borrow_mut();
        if recorder.is_recording() {
            trace!(path = ?path, "recorded dependency");
            recorder.record(path);
        }
    }

    /// Queue a change and request a flush if none is scheduled.
    pub(crate) fn enqueue(&self, change: Change) {
        self.queue.borrow_mut().push(change);

        if !self.scheduled.replace(true) {
            let request = self.flush_request.borrow().clone();
            if let Some(request) = request {
                request();
            }
        }
    }

    pub(crate) fn next_change(&self) -> Option<Change> {
        self.queue.borrow_mut().pop()
    }

    pub(crate) fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Sequence number of the most recently queued change.
    pub(crate) fn last_sequence(&self) -> u64 {
        self.queue.borrow().last_sequence()
    }

    pub(crate) fn is_scheduled(&self) -> bool {
        self.scheduled.get()
    }

    /// Mark the queue as drained.
    pub(crate) fn finish_flush(&self) {
        self.scheduled.set(false);
    }

    /// Discard everything still queued and clear the scheduled flag.
    pub(crate) fn abort(&self) -> usize {
        let dropped = self.queue.borrow_mut().clear();
        self.scheduled.set(false);
        dropped
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("depth", &self.recorder.borrow().depth())
            .field("pending", &self.pending())
            .field("scheduled", &self.is_scheduled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Key, Object, Value};

    #[test]
    fn first_enqueue_requests_one_flush() {
        let session = Session::new();
        let requests = Rc::new(Cell::new(0));
        let counter = requests.clone();
        session.set_flush_request(move || counter.set(counter.get() + 1));

        let object = Object::new_map();
        for n in 0..3 {
            session.enqueue(Change::new(Key::from("a"), Value::from(n), object.clone()));
        }
        assert_eq!(requests.get(), 1);
        assert_eq!(session.pending(), 3);

        while session.next_change().is_some() {}
        session.finish_flush();

        session.enqueue(Change::new(Key::from("a"), Value::Null, object));
        assert_eq!(requests.get(), 2);
    }

    #[test]
    fn abort_discards_pending_changes() {
        let session = Session::new();
        let object = Object::new_map();
        session.enqueue(Change::new(Key::from("a"), Value::Null, object.clone()));
        session.enqueue(Change::new(Key::from("b"), Value::Null, object));

        assert_eq!(session.abort(), 2);
        assert!(!session.is_scheduled());
        assert_eq!(session.pending(), 0);
    }

    #[test]
    fn records_only_while_a_session_is_open() {
        let session = Session::new();
        let object = Object::new_map();

        session.record(Path::new(object.clone(), Key::from("outside")));
        let open = session.begin();
        assert!(session.is_recording());
        session.record(Path::new(object, Key::from("inside")));
        let paths = open.finish();

        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].key(), &Key::from("inside"));
    }
}
