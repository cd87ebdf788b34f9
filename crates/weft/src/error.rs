//! Top-level error for composition code.

use weft_reactive::{BindingResolutionError, BindingUpdateError};
use weft_tree::{ScopeDisciplineError, StructuralError};

use crate::config::ConfigError;

/// Any error raised while composing, binding, or configuring.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComposeError {
    #[error(transparent)]
    Scope(#[from] ScopeDisciplineError),
    #[error(transparent)]
    Structure(#[from] StructuralError),
    #[error(transparent)]
    Resolution(#[from] BindingResolutionError),
    #[error(transparent)]
    Update(#[from] BindingUpdateError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
