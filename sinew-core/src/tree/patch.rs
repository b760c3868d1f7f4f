//! Patch Applier
//!
//! Runs one hook action against the UI tree when a dependency changes.
//!
//! # How Patching Works
//!
//! An attribute hook re-evaluates its callback and sets the attribute on its
//! node, unless the node is gone.
//!
//! A content hook re-evaluates its callback, builds fresh nodes and
//! reconciles them positionally against the nodes it produced last time:
//!
//! 1. Each previous node consumes the next fresh node. A live previous node
//!    is replaced by it, or removed when the fresh nodes have run out. A dead
//!    previous node discards the fresh node it consumed.
//! 2. Leftover fresh nodes are inserted after the last consumed node.
//! 3. The hook now refers to the fresh nodes.

use std::cell::RefCell;
use std::fmt;

use tracing::{debug, trace};

use super::descriptor::{AttrValue, Child};
use super::host::Host;
use crate::reactive::{Replay, Runtime, Value};

/// A patch registered under one or more dependency paths.
pub(crate) enum HookAction<H: Host> {
    /// Re-set one attribute on one node.
    Attribute {
        node: H::WeakNode,
        key: String,
        callback: Replay<AttrValue>,
    },

    /// Rebuild the nodes produced by one child binding.
    Content {
        refs: RefCell<Vec<H::WeakNode>>,
        graphics: bool,
        callback: Replay<Child>,
    },
}

impl<H: Host> HookAction<H> {
    /// Whether the action can still reach a node. Dead actions never become
    /// live again.
    pub(crate) fn is_live(&self, host: &H) -> bool {
        match self {
            HookAction::Attribute { node, .. } => host.upgrade(node).is_some(),
            HookAction::Content { refs, .. } => {
                refs.borrow().iter().any(|node| host.upgrade(node).is_some())
            }
        }
    }
}

impl<H: Host> fmt::Debug for HookAction<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookAction::Attribute { key, .. } => {
                f.debug_struct("Attribute").field("key", key).finish()
            }
            HookAction::Content { refs, graphics, .. } => f
                .debug_struct("Content")
                .field("refs", &refs.borrow().len())
                .field("graphics", graphics)
                .finish(),
        }
    }
}

impl<H: Host + 'static> Runtime<H> {
    /// Run `action` with the value carried by the triggering change.
    pub(crate) fn apply(&self, action: &HookAction<H>, value: &Value) {
        let host = self.host();
        match action {
            HookAction::Attribute {
                node,
                key,
                callback,
            } => {
                let Some(node) = host.upgrade(node) else {
                    trace!(key = %key, "attribute target is gone");
                    return;
                };
                let value = callback(Some(value));
                host.set_attribute(&node, key, &value);
            }
            HookAction::Content {
                refs,
                graphics,
                callback,
            } => {
                let output = callback(Some(value));
                let fresh = self.render_slot(output, *graphics);
                let previous =
                    refs.replace(fresh.iter().map(|node| host.downgrade(node)).collect());
                reconcile(host, &previous, fresh);
            }
        }
    }
}

/// Put `fresh` where the nodes behind `previous` are. Returns how many fresh
/// nodes were discarded because their position was stale.
pub(crate) fn reconcile<H: Host>(
    host: &H,
    previous: &[H::WeakNode],
    fresh: Vec<H::Node>,
) -> usize {
    let mut fresh = fresh.into_iter();
    let mut anchor = None;
    let mut discarded = 0;

    for weak in previous {
        match (host.upgrade(weak), fresh.next()) {
            (Some(old), Some(node)) => {
                host.replace_with(&old, node.clone());
                anchor = Some(node);
            }
            (Some(old), None) => host.remove(&old),
            (None, Some(_)) => {
                discarded += 1;
                anchor = None;
            }
            (None, None) => {}
        }
    }

    let rest: Vec<_> = fresh.collect();
    if !rest.is_empty() {
        match anchor {
            Some(anchor) => host.insert_after(&anchor, rest),
            None => discarded += rest.len(),
        }
    }

    if discarded > 0 {
        debug!(discarded, "stale content nodes; new output discarded");
    }
    discarded
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
