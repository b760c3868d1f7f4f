//! Node Production
//!
//! Turns descriptors into host nodes. Static attributes and text are applied
//! once; bindings are applied from their initial value and registered as
//! hooks so later writes can patch them.

use std::cell::RefCell;

use super::descriptor::{Attr, Child, Descriptor, Mount};
use super::host::{Host, GRAPHICS_ROOT_TAG};
use super::patch::HookAction;
use crate::reactive::{Binding, Runtime};

impl<H: Host + 'static> Runtime<H> {
    /// Render `content` into `node` and return `node`.
    ///
    /// A children list is appended. A root mount also applies its attributes
    /// to `node` itself. Children are built in the graphics context when
    /// `node` is a graphics root.
    pub fn mount(&self, content: impl Into<Mount>, node: &H::Node) -> H::Node {
        let graphics = self.host().is_graphics_root(node);
        match content.into() {
            Mount::Children(children) => self.append_children(node, graphics, children),
            Mount::Root {
                attributes,
                children,
            } => {
                self.apply_attributes(node, attributes);
                self.append_children(node, graphics, children);
            }
        }
        node.clone()
    }

    /// Build the nodes for one child slot. Never empty: empty output becomes
    /// a single empty text node.
    pub(crate) fn render_slot(&self, child: Child, graphics: bool) -> Vec<H::Node> {
        let mut nodes = Vec::new();
        self.render_into(&mut nodes, child, graphics);
        if nodes.is_empty() {
            nodes.push(self.host().create_text(""));
        }
        nodes
    }

    fn render_into(&self, out: &mut Vec<H::Node>, child: Child, graphics: bool) {
        match child {
            Child::Text(text) => out.push(self.host().create_text(&text)),
            Child::Element(descriptor) => out.push(self.create_node(descriptor, graphics)),
            Child::Bound(binding) => out.extend(self.bind_content(*binding, graphics)),
            Child::List(children) => {
                for child in children {
                    self.render_into(out, child, graphics);
                }
            }
        }
    }

    fn bind_content(&self, binding: Binding<Child>, graphics: bool) -> Vec<H::Node> {
        let (initial, callback, paths) = binding.into_parts();
        let nodes = self.render_slot(initial, graphics);
        if !paths.is_empty() {
            let refs = nodes.iter().map(|node| self.host().downgrade(node)).collect();
            self.register(
                &paths,
                HookAction::Content {
                    refs: RefCell::new(refs),
                    graphics,
                    callback,
                },
            );
        }
        nodes
    }

    fn create_node(&self, descriptor: Descriptor, graphics: bool) -> H::Node {
        let (tag, attributes, children) = descriptor.into_parts();
        let graphics = graphics || tag.eq_ignore_ascii_case(GRAPHICS_ROOT_TAG);
        let node = self.host().create_element(&tag, graphics);
        self.apply_attributes(&node, attributes);
        self.append_children(&node, graphics, children);
        node
    }

    fn apply_attributes(&self, node: &H::Node, attributes: Vec<(String, Attr)>) {
        let host = self.host();
        for (key, attr) in attributes {
            match attr {
                Attr::Static(value) => host.set_attribute(node, &key, &value),
                Attr::Listener(listener) => {
                    let event = key.strip_prefix("on").unwrap_or(&key);
                    host.add_listener(node, event, listener);
                }
                Attr::Bound(binding) => {
                    let (initial, callback, paths) = binding.into_parts();
                    host.set_attribute(node, &key, &initial);
                    if !paths.is_empty() {
                        self.register(
                            &paths,
                            HookAction::Attribute {
                                node: host.downgrade(node),
                                key,
                                callback,
                            },
                        );
                    }
                }
            }
        }
    }

    fn append_children(&self, node: &H::Node, graphics: bool, children: Vec<Child>) {
        let mut nodes = Vec::new();
        for child in children {
            self.render_into(&mut nodes, child, graphics);
        }
        self.host().append(node, nodes);
    }
}
