//! Error types for tree edits and scope discipline.

use crate::scope::ScopeId;

/// A scope was released out of LIFO order, or nesting went too deep.
///
/// Fatal to the composition pass that caused it; the stack itself is left
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeDisciplineError {
    #[error("cannot release scope {scope}: scope stack is empty")]
    EmptyStack { scope: ScopeId },
    #[error("cannot release scope {scope}: scope {top} is still open above it")]
    NotTop { scope: ScopeId, top: ScopeId },
    #[error("scope depth {depth} exceeds the limit of {max}")]
    TooDeep { depth: usize, max: usize },
}

/// A tree edit was rejected. The tree is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructuralError {
    #[error("node {node} already has a parent")]
    AlreadyAttached { node: String },
    #[error("attaching node {node} would create a cycle")]
    WouldCycle { node: String },
    #[error("node {node} is not a child of {parent}")]
    NotAChild { node: String, parent: String },
}
