//! UI Tree Host
//!
//! The runtime does not own a UI tree. It drives one through the [`Host`]
//! trait: node construction, attribute setting, and the handful of
//! structural edits the patch applier needs.
//!
//! Hooks keep only weak handles to the nodes they produced. A node that has
//! been removed from the tree and has no other owner must fail to upgrade;
//! that is how the applier detects stale output.

use super::descriptor::{AttrValue, Listener};

/// Namespace for nodes built in a graphics context.
pub const GRAPHICS_NAMESPACE: &str = "http://www.w3.org/2000/svg";

/// Tag that switches its subtree into the graphics context.
pub const GRAPHICS_ROOT_TAG: &str = "svg";

/// A concrete UI tree the runtime can build into and patch.
pub trait Host {
    /// Strong handle to a node.
    type Node: Clone;

    /// Weak handle to a node.
    type WeakNode: Clone;

    fn downgrade(&self, node: &Self::Node) -> Self::WeakNode;

    /// `None` once the node no longer exists.
    fn upgrade(&self, weak: &Self::WeakNode) -> Option<Self::Node>;

    /// Create an element, in the graphics namespace if `graphics` is set.
    fn create_element(&self, tag: &str, graphics: bool) -> Self::Node;

    fn create_text(&self, text: &str) -> Self::Node;

    /// Set an attribute. `Bool` toggles presence.
    fn set_attribute(&self, node: &Self::Node, key: &str, value: &AttrValue);

    fn add_listener(&self, node: &Self::Node, event: &str, listener: Listener);

    /// Append children to the end of `parent`.
    fn append(&self, parent: &Self::Node, children: Vec<Self::Node>);

    /// Put `new` where `old` is. No-op if `old` has no parent.
    fn replace_with(&self, old: &Self::Node, new: Self::Node);

    /// Detach `node` from its parent. No-op if it has none.
    fn remove(&self, node: &Self::Node);

    /// Insert `nodes` right after `anchor`. No-op if `anchor` has no parent.
    fn insert_after(&self, anchor: &Self::Node, nodes: Vec<Self::Node>);

    /// Whether children built under `node` belong to the graphics context.
    fn is_graphics_root(&self, node: &Self::Node) -> bool;
}
