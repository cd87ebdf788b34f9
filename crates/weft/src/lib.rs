#![forbid(unsafe_code)]

//! Weft: scoped declarative UI composition with reactive bindings.
//!
//! Build a widget tree by nesting scopes, bind node properties to application
//! state, and call [`Composer::tick`] once per frame to push source changes
//! into the tree.
//!
//! ```ignore
//! use weft::prelude::*;
//!
//! let composer = Composer::headless();
//! let session = Rc::new(RefCell::new(Session::default()));
//! let panel = composer.element();
//! {
//!     let _scope = composer.scope(&panel)?;
//!     let status = composer.bind_property(&session, member!(Session, status()), None);
//!     if let Some(status) = status {
//!         composer.label("").bind_text(&status);
//!     }
//! }
//! composer.tick();
//! ```

pub mod compose;
pub mod config;
pub mod error;
pub mod wiring;

pub use compose::Composer;
pub use config::{ComposeConfig, ConfigError};
pub use error::ComposeError;
pub use wiring::NodeBindExt;

pub use weft_reactive as reactive;
pub use weft_reactive::member;
pub use weft_tree as tree;

/// Everything needed to compose and bind.
pub mod prelude {
    pub use crate::{ComposeConfig, ComposeError, Composer, NodeBindExt};
    pub use weft_reactive::{
        Bindable, BindingRegistry, MemberExpr, MemberTable, ReadOnlyBinding, Reflect,
        TargetBinding, TickReport, ValueBinding, member,
    };
    pub use weft_tree::{
        HeadlessBackend, Node, PropertyValue, Scope, Widget, WidgetBackend, WidgetHandle,
        WidgetKind, WidgetValue, render_tree,
    };
}
