//! In-Memory Tree
//!
//! A headless [`Host`] implementation. Nodes are reference counted; a parent
//! owns its children and children point back at their parent weakly. A node
//! removed from the tree with no other owner is dropped at once, so weak
//! handles held by hooks stop upgrading.
//!
//! Every structural edit and attribute write is appended to a mutation log,
//! which tests use to check exactly what a flush touched.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use tracing::trace;

use super::descriptor::{AttrValue, Listener};
use super::host::{Host, GRAPHICS_NAMESPACE, GRAPHICS_ROOT_TAG};

/// Unique identifier for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// What a node is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element { tag: String, graphics: bool },
    Text,
}

#[derive(Default)]
struct NodeState {
    parent: Weak<NodeCell>,
    children: Vec<MemoryNode>,
    attributes: IndexMap<String, String>,
    listeners: Vec<(String, Listener)>,
    text: String,
}

struct NodeCell {
    id: NodeId,
    kind: NodeKind,
    state: RefCell<NodeState>,
}

/// Strong handle to a node in a [`MemoryHost`] tree.
#[derive(Clone)]
pub struct MemoryNode(Rc<NodeCell>);

/// Weak handle to a node.
#[derive(Clone)]
pub struct WeakMemoryNode(Weak<NodeCell>);

impl WeakMemoryNode {
    pub fn upgrade(&self) -> Option<MemoryNode> {
        self.0.upgrade().map(MemoryNode)
    }
}

impl MemoryNode {
    fn new(kind: NodeKind, text: String) -> Self {
        Self(Rc::new(NodeCell {
            id: NodeId::next(),
            kind,
            state: RefCell::new(NodeState {
                text,
                ..NodeState::default()
            }),
        }))
    }

    pub fn id(&self) -> NodeId {
        self.0.id
    }

    pub fn kind(&self) -> &NodeKind {
        &self.0.kind
    }

    pub fn downgrade(&self) -> WeakMemoryNode {
        WeakMemoryNode(Rc::downgrade(&self.0))
    }

    pub fn ptr_eq(&self, other: &MemoryNode) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Element tag, or `None` for text nodes.
    pub fn tag(&self) -> Option<&str> {
        match &self.0.kind {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text => None,
        }
    }

    pub fn is_text(&self) -> bool {
        self.0.kind == NodeKind::Text
    }

    /// Namespace URI for graphics elements.
    pub fn namespace(&self) -> Option<&'static str> {
        match &self.0.kind {
            NodeKind::Element { graphics: true, .. } => Some(GRAPHICS_NAMESPACE),
            _ => None,
        }
    }

    pub fn parent(&self) -> Option<MemoryNode> {
        self.0.state.borrow().parent.upgrade().map(MemoryNode)
    }

    pub fn children(&self) -> Vec<MemoryNode> {
        self.0.state.borrow().children.clone()
    }

    pub fn child_count(&self) -> usize {
        self.0.state.borrow().children.len()
    }

    pub fn attribute(&self, key: &str) -> Option<String> {
        self.0.state.borrow().attributes.get(key).cloned()
    }

    pub fn has_attribute(&self, key: &str) -> bool {
        self.0.state.borrow().attributes.contains_key(key)
    }

    /// Concatenated text of this node and its descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        let state = self.0.state.borrow();
        if self.is_text() {
            out.push_str(&state.text);
        }
        for child in &state.children {
            child.collect_text(out);
        }
    }

    /// Markup-like rendering, for assertions and debugging.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out);
        out
    }

    fn render_into(&self, out: &mut String) {
        let state = self.0.state.borrow();
        let NodeKind::Element { tag, .. } = &self.0.kind else {
            out.push_str(&state.text);
            return;
        };

        out.push('<');
        out.push_str(tag);
        for (key, value) in &state.attributes {
            if value.is_empty() {
                out.push_str(&format!(" {key}"));
            } else {
                out.push_str(&format!(" {key}=\"{value}\""));
            }
        }
        out.push('>');
        for child in &state.children {
            child.render_into(out);
        }
        out.push_str(&format!("</{tag}>"));
    }

    fn detach(&self) -> Option<MemoryNode> {
        let parent = self.parent()?;
        parent
            .0
            .state
            .borrow_mut()
            .children
            .retain(|child| !child.ptr_eq(self));
        self.0.state.borrow_mut().parent = Weak::new();
        Some(parent)
    }

    fn position_in(&self, parent: &MemoryNode) -> Option<usize> {
        parent
            .0
            .state
            .borrow()
            .children
            .iter()
            .position(|child| child.ptr_eq(self))
    }

    fn adopt(&self, children: &[MemoryNode]) {
        for child in children {
            child.detach();
            child.0.state.borrow_mut().parent = Rc::downgrade(&self.0);
        }
    }
}

impl PartialEq for MemoryNode {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for MemoryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryNode")
            .field("id", &self.0.id.raw())
            .field("kind", &self.0.kind)
            .finish()
    }
}

impl fmt::Debug for WeakMemoryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakMemoryNode")
            .field("alive", &(self.0.strong_count() > 0))
            .finish()
    }
}

/// One recorded edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// `value` is `None` when a boolean attribute was toggled off.
    SetAttribute {
        node: NodeId,
        key: String,
        value: Option<String>,
    },
    Append { parent: NodeId, count: usize },
    Replace { old: NodeId, new: NodeId },
    Remove { node: NodeId },
    InsertAfter { anchor: NodeId, count: usize },
}

/// Headless UI tree with a mutation log.
#[derive(Clone, Default)]
pub struct MemoryHost {
    log: Rc<RefCell<Vec<Mutation>>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached element to mount into. Not logged.
    pub fn create_root(&self, tag: &str) -> MemoryNode {
        let graphics = tag.eq_ignore_ascii_case(GRAPHICS_ROOT_TAG);
        MemoryNode::new(
            NodeKind::Element {
                tag: tag.to_owned(),
                graphics,
            },
            String::new(),
        )
    }

    /// Everything logged so far.
    pub fn mutations(&self) -> Vec<Mutation> {
        self.log.borrow().clone()
    }

    /// Count logged mutations matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&Mutation) -> bool) -> usize {
        self.log.borrow().iter().filter(|&m| predicate(m)).count()
    }

    pub fn clear_mutations(&self) {
        self.log.borrow_mut().clear();
    }

    /// Invoke every listener registered on `node` for `event`. Returns how
    /// many ran.
    pub fn dispatch(&self, node: &MemoryNode, event: &str) -> usize {
        let listeners: Vec<Listener> = node
            .0
            .state
            .borrow()
            .listeners
            .iter()
            .filter(|(name, _)| name == event)
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in &listeners {
            listener();
        }
        listeners.len()
    }

    fn log(&self, mutation: Mutation) {
        trace!(?mutation, "tree mutation");
        self.log.borrow_mut().push(mutation);
    }
}

impl fmt::Debug for MemoryHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryHost")
            .field("mutations", &self.log.borrow().len())
            .finish()
    }
}

impl Host for MemoryHost {
    type Node = MemoryNode;
    type WeakNode = WeakMemoryNode;

    fn downgrade(&self, node: &MemoryNode) -> WeakMemoryNode {
        node.downgrade()
    }

    fn upgrade(&self, weak: &WeakMemoryNode) -> Option<MemoryNode> {
        weak.upgrade()
    }

    fn create_element(&self, tag: &str, graphics: bool) -> MemoryNode {
        MemoryNode::new(
            NodeKind::Element {
                tag: tag.to_owned(),
                graphics,
            },
            String::new(),
        )
    }

    fn create_text(&self, text: &str) -> MemoryNode {
        MemoryNode::new(NodeKind::Text, text.to_owned())
    }

    fn set_attribute(&self, node: &MemoryNode, key: &str, value: &AttrValue) {
        let stored = match value {
            AttrValue::Bool(true) => Some(String::new()),
            AttrValue::Bool(false) => None,
            AttrValue::Text(text) => Some(text.clone()),
        };
        {
            let mut state = node.0.state.borrow_mut();
            match &stored {
                Some(text) => {
                    state.attributes.insert(key.to_owned(), text.clone());
                }
                None => {
                    state.attributes.shift_remove(key);
                }
            }
        }
        self.log(Mutation::SetAttribute {
            node: node.id(),
            key: key.to_owned(),
            value: stored,
        });
    }

    fn add_listener(&self, node: &MemoryNode, event: &str, listener: Listener) {
        node.0
            .state
            .borrow_mut()
            .listeners
            .push((event.to_owned(), listener));
    }

    fn append(&self, parent: &MemoryNode, children: Vec<MemoryNode>) {
        if children.is_empty() {
            return;
        }
        parent.adopt(&children);
        let count = children.len();
        parent.0.state.borrow_mut().children.extend(children);
        self.log(Mutation::Append {
            parent: parent.id(),
            count,
        });
    }

    fn replace_with(&self, old: &MemoryNode, new: MemoryNode) {
        let Some(parent) = old.parent() else {
            return;
        };
        new.detach();
        let Some(index) = old.position_in(&parent) else {
            return;
        };
        new.0.state.borrow_mut().parent = Rc::downgrade(&parent.0);
        old.0.state.borrow_mut().parent = Weak::new();
        let new_id = new.id();
        parent.0.state.borrow_mut().children[index] = new;
        self.log(Mutation::Replace {
            old: old.id(),
            new: new_id,
        });
    }

    fn remove(&self, node: &MemoryNode) {
        if node.detach().is_some() {
            self.log(Mutation::Remove { node: node.id() });
        }
    }

    fn insert_after(&self, anchor: &MemoryNode, nodes: Vec<MemoryNode>) {
        let Some(parent) = anchor.parent() else {
            return;
        };
        parent.adopt(&nodes);
        let Some(index) = anchor.position_in(&parent) else {
            return;
        };
        let count = nodes.len();
        parent
            .0
            .state
            .borrow_mut()
            .children
            .splice(index + 1..index + 1, nodes);
        self.log(Mutation::InsertAfter {
            anchor: anchor.id(),
            count,
        });
    }

    fn is_graphics_root(&self, node: &MemoryNode) -> bool {
        match &node.0.kind {
            NodeKind::Element { tag, graphics } => {
                *graphics || tag.eq_ignore_ascii_case(GRAPHICS_ROOT_TAG)
            }
            NodeKind::Text => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn texts(host: &MemoryHost, parent: &MemoryNode, items: &[&str]) -> Vec<MemoryNode> {
        let nodes: Vec<_> = items.iter().map(|t| host.create_text(t)).collect();
        host.append(parent, nodes.clone());
        nodes
    }

    #[test]
    fn append_and_render() {
        let host = MemoryHost::new();
        let root = host.create_root("div");
        let span = host.create_element("span", false);
        host.set_attribute(&span, "class", &AttrValue::from("label"));
        host.set_attribute(&span, "hidden", &AttrValue::Bool(true));
        host.append(&span, vec![host.create_text("hi")]);
        host.append(&root, vec![span.clone()]);

        assert_eq!(root.render(), "<div><span class=\"label\" hidden>hi</span></div>");
        assert_eq!(root.text_content(), "hi");
        assert!(span.parent().unwrap().ptr_eq(&root));
    }

    #[test]
    fn boolean_attributes_toggle() {
        let host = MemoryHost::new();
        let node = host.create_element("input", false);

        host.set_attribute(&node, "disabled", &AttrValue::Bool(true));
        assert!(node.has_attribute("disabled"));
        host.set_attribute(&node, "disabled", &AttrValue::Bool(false));
        assert!(!node.has_attribute("disabled"));
        assert_eq!(
            host.mutations().last(),
            Some(&Mutation::SetAttribute {
                node: node.id(),
                key: "disabled".into(),
                value: None,
            })
        );
    }

    #[test]
    fn removed_nodes_die_without_other_owners() {
        let host = MemoryHost::new();
        let root = host.create_root("div");
        let weak = texts(&host, &root, &["a"])[0].downgrade();

        assert!(weak.upgrade().is_some());
        let node = weak.upgrade().unwrap();
        host.remove(&node);
        drop(node);
        assert!(weak.upgrade().is_none());
        assert_eq!(root.child_count(), 0);
    }

    #[test]
    fn replace_and_insert_after_keep_order() {
        let host = MemoryHost::new();
        let root = host.create_root("ul");
        let nodes = texts(&host, &root, &["a", "b", "c"]);

        let x = host.create_text("x");
        host.replace_with(&nodes[1], x.clone());
        assert_eq!(root.text_content(), "axc");
        assert!(nodes[1].parent().is_none());

        host.insert_after(&x, vec![host.create_text("y"), host.create_text("z")]);
        assert_eq!(root.text_content(), "axyzc");
    }

    #[test]
    fn edits_on_detached_nodes_are_no_ops() {
        let host = MemoryHost::new();
        let loose = host.create_text("loose");

        host.replace_with(&loose, host.create_text("other"));
        host.insert_after(&loose, vec![host.create_text("after")]);
        host.remove(&loose);
        assert!(host.mutations().is_empty());
    }

    #[test]
    fn graphics_roots() {
        let host = MemoryHost::new();
        assert!(host.is_graphics_root(&host.create_root("svg")));
        assert!(!host.is_graphics_root(&host.create_root("div")));
        let circle = host.create_element("circle", true);
        assert_eq!(circle.namespace(), Some(GRAPHICS_NAMESPACE));
    }

    #[test]
    fn dispatch_runs_matching_listeners() {
        let host = MemoryHost::new();
        let button = host.create_element("button", false);
        let clicks = Rc::new(Cell::new(0));
        let counter = clicks.clone();
        host.add_listener(&button, "click", Rc::new(move || counter.set(counter.get() + 1)));

        assert_eq!(host.dispatch(&button, "click"), 1);
        assert_eq!(host.dispatch(&button, "keydown"), 0);
        assert_eq!(clicks.get(), 1);
    }
}
