//! Sinew Core
//!
//! This crate provides the core runtime for the Sinew reactive UI engine.
//! It implements:
//!
//! - Virtualized state objects with per-key dependency tracking
//! - Bindings that tie attributes and child slots to the state they read
//! - A batched change queue that patches the UI once per tick
//! - Positional reconciliation of bound child content
//!
//! Instead of re-rendering a subtree when state changes, Sinew re-applies
//! only the attribute or child list whose dependencies were written.
//!
//! # Architecture
//!
//! - `reactive`: state objects, recording, bindings, hooks and flushing
//! - `tree`: descriptors, the [`Host`](tree::Host) trait, node building,
//!   patching and an in-memory host
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use sinew_core::reactive::Runtime;
//! use sinew_core::tree::{Child, Descriptor, MemoryHost};
//!
//! let runtime = Runtime::new(MemoryHost::new());
//! let state = runtime.state(json!({ "count": 0 })).unwrap();
//! let root = runtime.host().create_root("div");
//!
//! let s = state.clone();
//! runtime.mount(
//!     Child::from(Descriptor::new("span").child(runtime.compute(move || s.get("count")))),
//!     &root,
//! );
//!
//! state.set("count", 5).unwrap();
//! assert_eq!(root.text_content(), "0");
//!
//! runtime.run_microtasks();
//! assert_eq!(root.text_content(), "5");
//! ```

pub mod reactive;
pub mod tree;

mod config;
mod error;

pub use config::{RuntimeConfig, DEFAULT_MAX_FLUSH_CHANGES};
pub use error::{Error, Result};
pub use reactive::{Binding, Key, Object, Runtime, SchedulerKind, Value};
