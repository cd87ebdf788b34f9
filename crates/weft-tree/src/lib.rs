#![forbid(unsafe_code)]

//! UI tree, widget contract, and scope stack for Weft.
//!
//! - [`widget`]: the [`Widget`] handle contract and [`WidgetBackend`] factory.
//! - [`headless`]: an in-memory backend and a text dump of widget trees.
//! - [`node`]: [`Node`], the tree handle that mirrors its widget's children.
//! - [`scope`]: [`ScopeStack`], the LIFO stack of current parents.

pub mod error;
pub mod headless;
pub mod node;
pub mod scope;
pub mod widget;

pub use error::{ScopeDisciplineError, StructuralError};
pub use headless::{HeadlessBackend, HeadlessWidget, render_tree};
pub use node::{ChildKey, Node};
pub use scope::{DEFAULT_MAX_DEPTH, Scope, ScopeId, ScopeStack};
pub use widget::{
    CallbackId, PropertyValue, ValueCallback, Widget, WidgetBackend, WidgetHandle, WidgetKind,
    WidgetValue, same_widget,
};
