//! State Objects
//!
//! An [`Object`] is a reference-counted mapping or sequence holding
//! application state. Once virtualized by a runtime, its reads and writes are
//! intercepted:
//!
//! - A read of an own key inside a tracked evaluation records the dependency
//!   path `(object, key)`. Keys that fall through to a parent object are
//!   never recorded.
//! - A read that reaches nested plain data promotes it to a virtualized
//!   object and stores the promoted object back into the slot, so later
//!   reads return the same identity.
//! - A write enqueues a [`Change`] (which requests a flush) and then performs
//!   the underlying write.
//!
//! Objects that were never virtualized behave as plain containers.
//!
//! # Identity
//!
//! Every object carries a unique [`ObjectId`]. Cloning an `Object` clones the
//! handle, not the data. Equality is identity.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{Error, Result};

use super::binding::Binding;
use super::queue::Change;
use super::recorder::Path;
use super::session::Session;
use super::value::{Key, Value};

/// Unique identifier for a state object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(u64);

impl ObjectId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A stored entry: either a value, or nested plain data not yet promoted.
#[derive(Debug)]
enum Slot {
    Value(Value),
    Plain(serde_json::Value),
}

impl Slot {
    fn snapshot(&self) -> serde_json::Value {
        match self {
            Slot::Value(value) => value.to_json(),
            Slot::Plain(json) => json.clone(),
        }
    }
}

#[derive(Debug)]
enum Entries {
    Map(IndexMap<String, Slot>),
    Seq(Vec<Slot>),
}

impl Entries {
    fn len(&self) -> usize {
        match self {
            Entries::Map(map) => map.len(),
            Entries::Seq(seq) => seq.len(),
        }
    }

    fn contains(&self, key: &Key) -> bool {
        match (self, key) {
            (_, Key::Length) => true,
            (Entries::Map(map), Key::Field(name)) => map.contains_key(name.as_str()),
            (Entries::Seq(seq), Key::Index(index)) => *index < seq.len(),
            _ => false,
        }
    }

    fn slot_mut(&mut self, key: &Key) -> Option<&mut Slot> {
        match (self, key) {
            (Entries::Map(map), Key::Field(name)) => map.get_mut(name.as_str()),
            (Entries::Seq(seq), Key::Index(index)) => seq.get_mut(*index),
            _ => None,
        }
    }
}

struct ObjectInner {
    id: ObjectId,
    entries: RefCell<Entries>,
    parent: Option<Object>,
    session: RefCell<Option<Weak<Session>>>,
}

/// Handle to a state object.
#[derive(Clone)]
pub struct Object(Rc<ObjectInner>);

/// Non-owning handle to a state object.
#[derive(Clone)]
pub struct WeakObject(Weak<ObjectInner>);

impl WeakObject {
    pub fn upgrade(&self) -> Option<Object> {
        self.0.upgrade().map(Object)
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl Object {
    fn with_entries(entries: Entries, parent: Option<Object>) -> Self {
        Self(Rc::new(ObjectInner {
            id: ObjectId::next(),
            entries: RefCell::new(entries),
            parent,
            session: RefCell::new(None),
        }))
    }

    /// Create an empty mapping.
    pub fn new_map() -> Self {
        Self::with_entries(Entries::Map(IndexMap::new()), None)
    }

    /// Create an empty sequence.
    pub fn new_seq() -> Self {
        Self::with_entries(Entries::Seq(Vec::new()), None)
    }

    /// Create an empty mapping whose missing keys fall through to `parent`.
    ///
    /// Reads that fall through are inherited and never recorded.
    pub fn inheriting(parent: &Object) -> Self {
        Self::with_entries(Entries::Map(IndexMap::new()), Some(parent.clone()))
    }

    /// Build an object from plain JSON data.
    ///
    /// Nested mappings and sequences are kept as plain data and promoted on
    /// first read.
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        match Object::from_plain(json) {
            Value::Object(object) => Ok(object),
            _ => Err(Error::NotAnObject),
        }
    }

    pub(crate) fn from_plain(json: serde_json::Value) -> Value {
        let into_slot = |json: serde_json::Value| match json {
            json @ (serde_json::Value::Object(_) | serde_json::Value::Array(_)) => Slot::Plain(json),
            scalar => Slot::Value(Value::from(scalar)),
        };

        match json {
            serde_json::Value::Object(map) => {
                let entries = map.into_iter().map(|(k, v)| (k, into_slot(v))).collect();
                Value::Object(Self::with_entries(Entries::Map(entries), None))
            }
            serde_json::Value::Array(items) => {
                let entries = items.into_iter().map(into_slot).collect();
                Value::Object(Self::with_entries(Entries::Seq(entries), None))
            }
            scalar => Value::from(scalar),
        }
    }

    /// Get the object's unique ID.
    pub fn id(&self) -> ObjectId {
        self.0.id
    }

    /// Whether two handles point at the same object.
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn downgrade(&self) -> WeakObject {
        WeakObject(Rc::downgrade(&self.0))
    }

    pub fn is_sequence(&self) -> bool {
        matches!(*self.0.entries.borrow(), Entries::Seq(_))
    }

    pub fn parent(&self) -> Option<&Object> {
        self.0.parent.as_ref()
    }

    /// Whether a runtime has virtualized this object.
    pub fn is_virtualized(&self) -> bool {
        self.0.session.borrow().is_some()
    }

    /// Attach this object to a session. Returns `false` if it was already
    /// virtualized, in which case nothing changes.
    pub(crate) fn bind(&self, session: &Rc<Session>) -> bool {
        let mut slot = self.0.session.borrow_mut();
        if slot.is_some() {
            return false;
        }
        *slot = Some(Rc::downgrade(session));
        true
    }

    fn session(&self) -> Option<Rc<Session>> {
        self.0.session.borrow().as_ref().and_then(Weak::upgrade)
    }

    /// Whether `key` is held by this object itself rather than a parent.
    pub fn owns(&self, key: &Key) -> bool {
        self.0.entries.borrow().contains(key)
    }

    /// Read a key, recording it if it is an own key and a tracked evaluation
    /// is running. Missing keys read as [`Value::Null`].
    pub fn get(&self, key: impl Into<Key>) -> Value {
        let key = key.into();
        if !self.owns(&key) {
            return self.inherited(&key);
        }

        if let Some(session) = self.session() {
            session.record(Path::new(self.clone(), key.clone()));
        }
        self.read_own(&key)
    }

    /// Read a key without recording it.
    pub fn peek(&self, key: impl Into<Key>) -> Value {
        let key = key.into();
        if self.owns(&key) {
            self.read_own(&key)
        } else {
            self.inherited(&key)
        }
    }

    fn inherited(&self, key: &Key) -> Value {
        match &self.0.parent {
            Some(parent) => parent.peek(key.clone()),
            None => Value::Null,
        }
    }

    fn read_own(&self, key: &Key) -> Value {
        if *key == Key::Length {
            return Value::from(self.0.entries.borrow().len());
        }

        let session = self.0.session.borrow().clone();
        let mut entries = self.0.entries.borrow_mut();
        let Some(slot) = entries.slot_mut(key) else {
            return Value::Null;
        };

        match slot {
            Slot::Value(Value::Object(nested)) => {
                if let Some(session) = session.as_ref().and_then(Weak::upgrade) {
                    nested.bind(&session);
                }
                Value::Object(nested.clone())
            }
            Slot::Value(value) => value.clone(),
            Slot::Plain(json) => {
                let promoted = Object::from_plain(json.take());
                if let (Value::Object(nested), Some(session)) =
                    (&promoted, session.as_ref().and_then(Weak::upgrade))
                {
                    nested.bind(&session);
                }
                *slot = Slot::Value(promoted.clone());
                promoted
            }
        }
    }

    /// Number of entries. Records the `Length` key.
    pub fn len(&self) -> usize {
        if let Some(session) = self.session() {
            session.record(Path::new(self.clone(), Key::Length));
        }
        self.0.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Own keys in order. Not recorded.
    pub fn keys(&self) -> Vec<Key> {
        match &*self.0.entries.borrow() {
            Entries::Map(map) => map.keys().cloned().map(Key::Field).collect(),
            Entries::Seq(seq) => (0..seq.len()).map(Key::Index).collect(),
        }
    }

    /// Write a key.
    ///
    /// Mappings accept field keys; sequences accept indices up to their
    /// length (writing at the length appends). Writes that add an entry also
    /// announce the new `Length`.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        let value = value.into();
        let grows = self.check_write(&key)?;

        if let Some(session) = self.session() {
            session.enqueue(Change::new(key.clone(), value.clone(), self.clone()));
            if grows {
                let len = self.0.entries.borrow().len() + 1;
                session.enqueue(Change::new(Key::Length, Value::from(len), self.clone()));
            }
        }

        match (&mut *self.0.entries.borrow_mut(), key) {
            (Entries::Map(map), Key::Field(name)) => {
                map.insert(name, Slot::Value(value));
            }
            (Entries::Seq(seq), Key::Index(index)) if index == seq.len() => {
                seq.push(Slot::Value(value));
            }
            (Entries::Seq(seq), Key::Index(index)) => {
                seq[index] = Slot::Value(value);
            }
            (_, key) => return Err(Error::InvalidKey(key)),
        }
        Ok(())
    }

    fn check_write(&self, key: &Key) -> Result<bool> {
        match (&*self.0.entries.borrow(), key) {
            (Entries::Map(map), Key::Field(name)) => Ok(!map.contains_key(name.as_str())),
            (Entries::Seq(seq), Key::Index(index)) if *index <= seq.len() => {
                Ok(*index == seq.len())
            }
            (Entries::Seq(seq), Key::Index(index)) => Err(Error::IndexOutOfBounds {
                index: *index,
                len: seq.len(),
            }),
            _ => Err(Error::InvalidKey(key.clone())),
        }
    }

    /// Append to a sequence. Announces the new index, then the new length.
    pub fn push(&self, value: impl Into<Value>) -> Result<()> {
        let len = match &*self.0.entries.borrow() {
            Entries::Seq(seq) => seq.len(),
            Entries::Map(_) => return Err(Error::NotASequence),
        };
        self.set(Key::Index(len), value)
    }

    /// Remove the last element of a sequence. Only the new length is
    /// announced; projections re-render from it.
    pub fn pop(&self) -> Result<Option<Value>> {
        let len = match &*self.0.entries.borrow() {
            Entries::Seq(seq) => seq.len(),
            Entries::Map(_) => return Err(Error::NotASequence),
        };
        if len == 0 {
            return Ok(None);
        }

        let last = self.peek(Key::Index(len - 1));
        if let Some(session) = self.session() {
            session.enqueue(Change::new(Key::Length, Value::from(len - 1), self.clone()));
        }
        if let Entries::Seq(seq) = &mut *self.0.entries.borrow_mut() {
            seq.pop();
        }
        Ok(Some(last))
    }

    /// Remove a field from a mapping.
    ///
    /// Announces the field as `Null`, then the new length. Removing a
    /// missing field is a no-op.
    pub fn remove(&self, key: impl Into<Key>) -> Result<Option<Value>> {
        let key = key.into();
        let Key::Field(name) = &key else {
            return Err(Error::InvalidKey(key));
        };
        let len = match &*self.0.entries.borrow() {
            Entries::Map(map) if !map.contains_key(name.as_str()) => return Ok(None),
            Entries::Map(map) => map.len(),
            Entries::Seq(_) => return Err(Error::NotAMapping),
        };

        let previous = self.peek(key.clone());
        if let Some(session) = self.session() {
            session.enqueue(Change::new(key.clone(), Value::Null, self.clone()));
            session.enqueue(Change::new(Key::Length, Value::from(len - 1), self.clone()));
        }
        if let Entries::Map(map) = &mut *self.0.entries.borrow_mut() {
            map.shift_remove(name.as_str());
        }
        Ok(Some(previous))
    }

    /// Project each element of a sequence into its own binding.
    ///
    /// The length read is recorded in the enclosing evaluation, if any. Each
    /// element is evaluated in a nested session that depends on
    /// `(self, Index(i))` plus whatever `f` reads, so a write to one element
    /// only replays that element's binding.
    pub fn map<T, F>(&self, f: F) -> Result<Vec<Binding<T>>>
    where
        T: 'static,
        F: Fn(Value, usize) -> T + 'static,
    {
        if !self.is_sequence() {
            return Err(Error::NotASequence);
        }

        let len = self.len();
        let session = self.session();
        let f = Rc::new(f);

        let bindings = (0..len)
            .map(|index| {
                let list = self.downgrade();
                let f = Rc::clone(&f);
                let injected = Path::new(self.clone(), Key::Index(index));
                Binding::track(
                    session.as_deref(),
                    Some(injected),
                    Rc::new(move |_: Option<&Value>| {
                        let element = list
                            .upgrade()
                            .map(|list| list.peek(Key::Index(index)))
                            .unwrap_or_default();
                        f(element, index)
                    }),
                )
            })
            .collect();
        Ok(bindings)
    }

    /// Snapshot as plain JSON. Reads are not recorded.
    pub fn to_json(&self) -> serde_json::Value {
        match &*self.0.entries.borrow() {
            Entries::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, slot)| (k.clone(), slot.snapshot())).collect(),
            ),
            Entries::Seq(seq) => {
                serde_json::Value::Array(seq.iter().map(Slot::snapshot).collect())
            }
        }
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Object {}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.0.entries.borrow();
        f.debug_struct("Object")
            .field("id", &self.0.id.raw())
            .field("sequence", &matches!(*entries, Entries::Seq(_)))
            .field("len", &entries.len())
            .field("virtualized", &self.is_virtualized())
            .finish()
    }
}

impl fmt::Debug for WeakObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakObject")
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Attach an object and everything reachable from it lazily. Kept separate
/// from `Runtime` so the virtualizer can be exercised without a UI host.
pub(crate) fn virtualize(session: &Rc<Session>, object: &Object) -> Object {
    if !object.bind(session) {
        debug!(object = object.id().raw(), "object already virtualized");
    }
    object.clone()
}
