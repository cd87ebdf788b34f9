//! Error types for binding resolution and tick-time updates.
//!
//! # Failure Modes
//!
//! | Failure | Raised by | Behavior |
//! |---------|-----------|----------|
//! | Unknown member | accessor compiler | `bind_*` logs and returns `None` |
//! | Kind or type mismatch | accessor compiler | `bind_*` logs and returns `None` |
//! | Write to read-only binding | `Bindable::set` | returned to caller, value unchanged |
//! | Panic in setter | `Bindable::set` | caught, logged, returned as `WriteFailed` |
//! | Panic in getter at registration | `register_*` / `bind_*` | caught, logged, binding starts unseeded |
//! | Panic in getter/subscriber | registry tick | caught, logged, reported in `TickReport` |

use std::any::Any;

use crate::binding::BindingId;

/// Which way a member is exposed on its source type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// Plain data member, read and written in place.
    Field,
    /// Accessor-method pair; either side may be absent.
    Property,
}

impl std::fmt::Display for MemberKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Field => f.write_str("field"),
            Self::Property => f.write_str("property"),
        }
    }
}

/// A member could not be turned into a working accessor or binding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindingResolutionError {
    /// No member with this name exists on the source type.
    #[error("no member named '{member}' on {source_type}")]
    UnknownMember {
        source_type: &'static str,
        member: String,
    },
    /// The member exists but is the other kind (field vs. property).
    #[error("'{member}' on {source_type} is a {found}, not a {expected}")]
    KindMismatch {
        source_type: &'static str,
        member: String,
        expected: MemberKind,
        found: MemberKind,
    },
    /// The member's value type differs from the binding's declared type.
    #[error("'{member}' on {source_type} has type {found}, binding expects {expected}")]
    TypeMismatch {
        source_type: &'static str,
        member: String,
        expected: &'static str,
        found: &'static str,
    },
    /// The member has no getter.
    #[error("'{member}' on {source_type} is not readable")]
    NotReadable {
        source_type: &'static str,
        member: String,
    },
    /// A write was attempted on a member or binding without a setter.
    #[error("'{member}' is read-only")]
    NotWritable { member: String },
    /// The setter panicked; the source may or may not have changed.
    #[error("write to '{member}' failed: {message}")]
    WriteFailed { member: String, message: String },
    /// The expression does not name exactly one field or property.
    #[error("expression `{expr}` is not a direct field or property access")]
    NotMemberAccess { expr: String },
}

/// Stage of a binding update at which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStage {
    /// First read of the source when the binding is registered.
    Seed,
    /// Reading the source through the getter.
    Read,
    /// Writing the source through the setter.
    Write,
    /// Delivering the change event to a subscriber.
    Notify,
    /// A panic escaped the update pass outside the getter and listener
    /// guards, e.g. from the value type's `Clone` or `PartialEq`.
    Update,
}

impl std::fmt::Display for UpdateStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Seed => f.write_str("seed"),
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
            Self::Notify => f.write_str("notify"),
            Self::Update => f.write_str("update"),
        }
    }
}

/// A getter, setter, or subscriber panicked while a binding was updated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("binding {binding} ({label}) failed during {stage}: {message}")]
pub struct BindingUpdateError {
    pub binding: BindingId,
    pub label: String,
    pub stage: UpdateStage,
    pub message: String,
}

/// Extract a readable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
