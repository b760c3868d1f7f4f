//! Hook Registry
//!
//! Maps `(object, key)` to the list of hook actions that must run when that
//! key is written. The registry does not own the objects it indexes: each
//! entry holds a weak reference, and entries whose object is gone are pruned.
//!
//! One action registered under several paths is shared (`Rc`) between the
//! lists. The flush loop deduplicates by the identity of the list, so a list
//! runs at most once per flush.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::object::{Object, ObjectId, WeakObject};
use super::recorder::Path;
use super::value::Key;

/// The actions registered under one path.
pub type HookList<A> = Rc<RefCell<Vec<Rc<A>>>>;

struct Entry<A> {
    object: WeakObject,
    lists: HashMap<Key, HookList<A>>,
}

/// Weak index from dependency paths to hook lists.
pub struct HookRegistry<A> {
    entries: HashMap<ObjectId, Entry<A>>,
}

impl<A> HookRegistry<A> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Append `action` to the list at every path, creating lists as needed.
    pub fn register(&mut self, paths: &[Path], action: Rc<A>) {
        for path in paths {
            let entry = self
                .entries
                .entry(path.object().id())
                .or_insert_with(|| Entry {
                    object: path.object().downgrade(),
                    lists: HashMap::new(),
                });
            entry
                .lists
                .entry(path.key().clone())
                .or_default()
                .borrow_mut()
                .push(Rc::clone(&action));
        }
    }

    /// Find the list registered for `(object, key)`.
    pub fn lookup(&self, object: &Object, key: &Key) -> Option<HookList<A>> {
        self.entries
            .get(&object.id())
            .and_then(|entry| entry.lists.get(key))
            .map(Rc::clone)
    }

    /// Drop entries whose object no longer exists. Returns how many were
    /// dropped.
    pub fn prune(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.object.is_alive());
        before - self.entries.len()
    }

    /// Drop actions `keep` rejects, then lists and entries left empty.
    /// Returns how many registrations were dropped.
    pub fn retain_actions(&mut self, keep: impl Fn(&A) -> bool) -> usize {
        let mut dropped = 0;
        for entry in self.entries.values_mut() {
            entry.lists.retain(|_, list| {
                let mut list = list.borrow_mut();
                let before = list.len();
                list.retain(|action| keep(action.as_ref()));
                dropped += before - list.len();
                !list.is_empty()
            });
        }
        self.entries.retain(|_, entry| !entry.lists.is_empty());
        dropped
    }

    /// Number of objects with at least one registered list.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<A> Default for HookRegistry<A> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(object: &Object, key: &str) -> Path {
        Path::new(object.clone(), Key::from(key))
    }

    #[test]
    fn register_fans_out_one_shared_action() {
        let mut registry = HookRegistry::new();
        let object = Object::new_map();
        let action = Rc::new("patch");

        registry.register(&[path(&object, "a"), path(&object, "b")], Rc::clone(&action));

        let a = registry.lookup(&object, &Key::from("a")).unwrap();
        let b = registry.lookup(&object, &Key::from("b")).unwrap();
        assert!(!Rc::ptr_eq(&a, &b));
        assert!(Rc::ptr_eq(&a.borrow()[0], &b.borrow()[0]));
        assert!(registry.lookup(&object, &Key::from("c")).is_none());
    }

    #[test]
    fn actions_share_a_path_in_registration_order() {
        let mut registry = HookRegistry::new();
        let object = Object::new_map();

        registry.register(&[path(&object, "a")], Rc::new(1));
        registry.register(&[path(&object, "a")], Rc::new(2));

        let list = registry.lookup(&object, &Key::from("a")).unwrap();
        let order: Vec<i32> = list.borrow().iter().map(|a| **a).collect();
        assert_eq!(order, vec![1, 2]);

        let again = registry.lookup(&object, &Key::from("a")).unwrap();
        assert!(Rc::ptr_eq(&list, &again));
    }

    #[test]
    fn lookup_is_by_identity() {
        let mut registry = HookRegistry::new();
        let first = Object::new_map();
        let second = Object::new_map();

        registry.register(&[path(&first, "a")], Rc::new(()));
        assert!(registry.lookup(&second, &Key::from("a")).is_none());
    }

    #[test]
    fn prune_drops_dead_objects() {
        let mut registry = HookRegistry::new();
        let kept = Object::new_map();
        let dropped = Object::new_map();

        registry.register(&[path(&kept, "a")], Rc::new(()));
        registry.register(&[path(&dropped, "a")], Rc::new(()));
        assert_eq!(registry.len(), 2);

        drop(dropped);
        assert_eq!(registry.prune(), 1);
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup(&kept, &Key::from("a")).is_some());
    }

    #[test]
    fn retain_actions_drops_empty_lists() {
        let mut registry = HookRegistry::new();
        let object = Object::new_map();

        registry.register(&[path(&object, "a"), path(&object, "b")], Rc::new(1));
        registry.register(&[path(&object, "a")], Rc::new(2));

        assert_eq!(registry.retain_actions(|n| *n != 1), 2);
        let a = registry.lookup(&object, &Key::from("a")).unwrap();
        assert_eq!(a.borrow().len(), 1);
        assert!(registry.lookup(&object, &Key::from("b")).is_none());

        assert_eq!(registry.retain_actions(|_| false), 1);
        assert!(registry.is_empty());
    }
}
