//! Node Descriptors
//!
//! Plain descriptions of UI output, before anything is built. A
//! [`Descriptor`] names a tag, its attributes and its children. Attribute
//! values and children may be live [`Binding`]s; the runtime turns those into
//! hooks when it builds the descriptor.

use std::fmt;
use std::rc::Rc;

use crate::reactive::{Binding, Value};

/// An attribute value as applied to a node.
///
/// `Bool` toggles the attribute's presence; `Text` sets it verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Bool(bool),
    Text(String),
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Text(s.to_owned())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Text(s)
    }
}

/// Booleans stay booleans; everything else is rendered as text.
impl From<Value> for AttrValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Bool(b) => AttrValue::Bool(b),
            other => AttrValue::Text(other.to_string()),
        }
    }
}

/// An event listener attached through an attribute.
pub type Listener = Rc<dyn Fn()>;

/// An attribute on a descriptor.
pub enum Attr {
    /// Applied once at build time.
    Static(AttrValue),

    /// Applied at build time and re-applied whenever its dependencies change.
    Bound(Binding<AttrValue>),

    /// Attached as an event listener; never reactive.
    Listener(Listener),
}

impl Attr {
    pub fn listener(f: impl Fn() + 'static) -> Self {
        Attr::Listener(Rc::new(f))
    }
}

impl From<AttrValue> for Attr {
    fn from(value: AttrValue) -> Self {
        Attr::Static(value)
    }
}

impl From<bool> for Attr {
    fn from(b: bool) -> Self {
        Attr::Static(b.into())
    }
}

impl From<&str> for Attr {
    fn from(s: &str) -> Self {
        Attr::Static(s.into())
    }
}

impl From<String> for Attr {
    fn from(s: String) -> Self {
        Attr::Static(s.into())
    }
}

impl From<Value> for Attr {
    fn from(value: Value) -> Self {
        Attr::Static(value.into())
    }
}

impl<T: Into<AttrValue> + 'static> From<Binding<T>> for Attr {
    fn from(binding: Binding<T>) -> Self {
        Attr::Bound(binding.map(Into::into))
    }
}

impl fmt::Debug for Attr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attr::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Attr::Bound(binding) => f.debug_tuple("Bound").field(binding).finish(),
            Attr::Listener(_) => f.write_str("Listener"),
        }
    }
}

/// Child content: text, an element, a live binding, or a nested list.
///
/// Nested lists are flattened when built.
pub enum Child {
    Text(String),
    Element(Descriptor),
    Bound(Box<Binding<Child>>),
    List(Vec<Child>),
}

impl Child {
    /// An empty list; renders as a placeholder when used as slot content.
    pub fn empty() -> Self {
        Child::List(Vec::new())
    }
}

impl From<&str> for Child {
    fn from(s: &str) -> Self {
        Child::Text(s.to_owned())
    }
}

impl From<String> for Child {
    fn from(s: String) -> Self {
        Child::Text(s)
    }
}

impl From<Value> for Child {
    fn from(value: Value) -> Self {
        Child::Text(value.to_string())
    }
}

impl From<Descriptor> for Child {
    fn from(descriptor: Descriptor) -> Self {
        Child::Element(descriptor)
    }
}

impl<T: Into<Child> + 'static> From<Binding<T>> for Child {
    fn from(binding: Binding<T>) -> Self {
        Child::Bound(Box::new(binding.map(Into::into)))
    }
}

impl<C: Into<Child>> From<Vec<C>> for Child {
    fn from(children: Vec<C>) -> Self {
        Child::List(children.into_iter().map(Into::into).collect())
    }
}

impl fmt::Debug for Child {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Child::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Child::Element(descriptor) => f.debug_tuple("Element").field(descriptor).finish(),
            Child::Bound(binding) => f
                .debug_struct("Bound")
                .field("paths", &binding.paths().len())
                .finish(),
            Child::List(children) => f.debug_tuple("List").field(children).finish(),
        }
    }
}

/// A `{tag, attributes, children}` description of one element.
#[derive(Debug)]
pub struct Descriptor {
    tag: String,
    attributes: Vec<(String, Attr)>,
    children: Vec<Child>,
}

impl Descriptor {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Add an attribute.
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<Attr>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    /// Add an event listener. The attribute key is `on{event}`.
    pub fn on(mut self, event: &str, listener: impl Fn() + 'static) -> Self {
        self.attributes
            .push((format!("on{event}"), Attr::listener(listener)));
        self
    }

    /// Add a child.
    pub fn child(mut self, child: impl Into<Child>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Add several children.
    pub fn children<C: Into<Child>>(mut self, children: impl IntoIterator<Item = C>) -> Self {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attributes(&self) -> &[(String, Attr)] {
        &self.attributes
    }

    pub fn child_nodes(&self) -> &[Child] {
        &self.children
    }

    pub(crate) fn into_parts(self) -> (String, Vec<(String, Attr)>, Vec<Child>) {
        (self.tag, self.attributes, self.children)
    }
}

/// Content handed to `Runtime::mount`.
#[derive(Debug)]
pub enum Mount {
    /// Children appended to the host node.
    Children(Vec<Child>),

    /// Attributes applied to the host node itself, plus children.
    Root {
        attributes: Vec<(String, Attr)>,
        children: Vec<Child>,
    },
}

impl From<Vec<Child>> for Mount {
    fn from(children: Vec<Child>) -> Self {
        Mount::Children(children)
    }
}

impl From<Child> for Mount {
    fn from(child: Child) -> Self {
        Mount::Children(vec![child])
    }
}

/// Uses the descriptor's attributes and children; its tag is ignored.
impl From<Descriptor> for Mount {
    fn from(descriptor: Descriptor) -> Self {
        let (_, attributes, children) = descriptor.into_parts();
        Mount::Root {
            attributes,
            children,
        }
    }
}
