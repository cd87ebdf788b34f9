#![forbid(unsafe_code)]

//! Change-detecting bindings for Weft.
//!
//! - [`binding`]: the owned-value, read-only, and target binding variants.
//! - [`registry`]: creates bindings and drives change detection with `tick`.
//! - [`accessor`]: resolves named fields and properties into typed closures.
//! - [`event`]: ordered, panic-isolated change notification.
//!
//! Everything here is single-threaded. Handles are `Rc`-based and `!Send`.

pub mod accessor;
pub mod binding;
pub mod error;
pub mod event;
pub mod registry;

pub use accessor::{Accessor, AccessorCompiler, BoundAccessor, MemberExpr, MemberTable, Reflect};
pub use binding::{
    Bindable, BindingId, BindingKind, ChangeCallback, Getter, ReadOnlyBinding, Setter,
    TargetBinding, UpdateBinding, UpdateOutcome, ValueBinding,
};
pub use error::{BindingResolutionError, BindingUpdateError, MemberKind, UpdateStage};
pub use event::{ChangeEvent, Subscription};
pub use registry::{BindingRegistry, RegistryOptions, TickReport};
