//! UI Tree
//!
//! This module connects bindings to a concrete tree of UI nodes.
//!
//! # Overview
//!
//! - [`Descriptor`]s describe output before it is built.
//! - A [`Host`] builds and edits the real nodes.
//! - Mounting a descriptor turns each binding it contains into a hook: an
//!   attribute hook for a bound attribute, a content hook for a bound child.
//! - When a flush runs a hook, the patch applier updates only that attribute
//!   or those child nodes.
//!
//! # Design Decisions
//!
//! 1. Hooks refer to nodes weakly. Output that has been removed from the tree
//!    is skipped rather than patched.
//!
//! 2. Content is reconciled by position. There is no keyed diffing.
//!
//! 3. A bound child slot always renders at least one node, so a later patch
//!    has somewhere to go.

mod build;
mod descriptor;
mod host;
mod memory;
mod patch;

pub use descriptor::{Attr, AttrValue, Child, Descriptor, Listener, Mount};
pub use host::{Host, GRAPHICS_NAMESPACE, GRAPHICS_ROOT_TAG};
pub use memory::{MemoryHost, MemoryNode, Mutation, NodeId, NodeKind, WeakMemoryNode};

pub(crate) use patch::HookAction;
