#![forbid(unsafe_code)]

//! LIFO scope stack that designates the current attachment parent.
//!
//! [`ScopeStack::enter`] pushes a node and returns a [`Scope`] guard. While
//! the guard is the top of the stack, [`ScopeStack::current`] returns its
//! node. Closing the guard, explicitly or by dropping it, pops it again.
//!
//! # Invariants
//!
//! 1. Only the top scope may be released. Any other release fails with
//!    [`ScopeDisciplineError`] and leaves the stack unchanged.
//! 2. Release callbacks of a scope run exactly once, after it is popped.
//! 3. Depth never exceeds the configured maximum.
//!
//! # Failure Modes
//!
//! - Explicit [`Scope::close`] out of order returns the error; the guard stays
//!   open.
//! - Dropping an open guard out of order logs the error and panics, unless the
//!   thread is already unwinding, in which case it only logs.
//! - A guard whose scope was discarded by [`ScopeStack::clear`] drops silently.
//!
//! # Example
//!
//! ```ignore
//! let stack = ScopeStack::new(256);
//! {
//!     let _panel = stack.enter(&panel)?;
//!     // current() == Some(panel)
//! }
//! // current() == None
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::error::ScopeDisciplineError;
use crate::node::Node;

/// Default limit on nested scopes.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Unique identifier of an entered scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl ScopeId {
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

type ReleaseCallback = Box<dyn FnOnce()>;

struct Frame {
    id: ScopeId,
    node: Node,
    on_release: Vec<ReleaseCallback>,
}

struct StackState {
    frames: RefCell<Vec<Frame>>,
    next_id: Cell<u64>,
    max_depth: usize,
}

/// Shared LIFO stack of scopes. Clones share the same stack.
#[derive(Clone)]
pub struct ScopeStack {
    state: Rc<StackState>,
}

impl ScopeStack {
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        Self {
            state: Rc::new(StackState {
                frames: RefCell::new(Vec::new()),
                next_id: Cell::new(1),
                max_depth,
            }),
        }
    }

    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.state.max_depth
    }

    /// Make `node` the current parent until the returned guard is closed.
    pub fn enter(&self, node: &Node) -> Result<Scope, ScopeDisciplineError> {
        let mut frames = self.state.frames.borrow_mut();
        if frames.len() >= self.state.max_depth {
            let err = ScopeDisciplineError::TooDeep {
                depth: frames.len() + 1,
                max: self.state.max_depth,
            };
            tracing::error!(depth = frames.len(), node = %node.describe(), "{err}");
            return Err(err);
        }

        let id = ScopeId::new(self.state.next_id.get());
        self.state.next_id.set(id.id() + 1);
        frames.push(Frame {
            id,
            node: node.clone(),
            on_release: Vec::new(),
        });
        tracing::debug!(scope = %id, depth = frames.len(), node = %node.describe(), "scope entered");

        Ok(Scope {
            id,
            node: node.clone(),
            stack: self.clone(),
            closed: false,
        })
    }

    /// The node of the top scope.
    #[must_use]
    pub fn current(&self) -> Option<Node> {
        self.state.frames.borrow().last().map(|f| f.node.clone())
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.state.frames.borrow().len()
    }

    #[must_use]
    pub fn top_id(&self) -> Option<ScopeId> {
        self.state.frames.borrow().last().map(|f| f.id)
    }

    #[must_use]
    pub fn contains(&self, id: ScopeId) -> bool {
        self.state.frames.borrow().iter().any(|f| f.id == id)
    }

    /// Pop scope `id`, which must be the top of the stack.
    pub fn release(&self, id: ScopeId) -> Result<(), ScopeDisciplineError> {
        let frame = {
            let mut frames = self.state.frames.borrow_mut();
            match frames.last() {
                None => return Err(ScopeDisciplineError::EmptyStack { scope: id }),
                Some(top) if top.id != id => {
                    return Err(ScopeDisciplineError::NotTop { scope: id, top: top.id });
                }
                Some(_) => {}
            }
            let Some(frame) = frames.pop() else {
                return Err(ScopeDisciplineError::EmptyStack { scope: id });
            };
            tracing::debug!(scope = %id, depth = frames.len(), node = %frame.node.describe(), "scope released");
            frame
        };
        for callback in frame.on_release {
            callback();
        }
        Ok(())
    }

    /// Discard every scope, top first, running their release callbacks.
    ///
    /// Guards for discarded scopes become inert.
    pub fn clear(&self) {
        let frames = std::mem::take(&mut *self.state.frames.borrow_mut());
        if !frames.is_empty() {
            tracing::debug!(count = frames.len(), "scope stack cleared");
        }
        for frame in frames.into_iter().rev() {
            for callback in frame.on_release {
                callback();
            }
        }
    }

    /// Queue `callback` on scope `id`, handing it back if the scope is not open.
    fn push_release_callback(&self, id: ScopeId, callback: ReleaseCallback) -> Result<(), ReleaseCallback> {
        let mut frames = self.state.frames.borrow_mut();
        match frames.iter_mut().find(|f| f.id == id) {
            Some(frame) => {
                frame.on_release.push(callback);
                Ok(())
            }
            None => Err(callback),
        }
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl fmt::Debug for ScopeStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeStack")
            .field("depth", &self.depth())
            .field("max_depth", &self.state.max_depth)
            .finish()
    }
}

/// RAII guard for an entered scope.
#[must_use = "dropping this guard closes the scope immediately"]
pub struct Scope {
    id: ScopeId,
    node: Node,
    stack: ScopeStack,
    closed: bool,
}

impl Scope {
    #[must_use]
    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// The node this scope makes current.
    #[must_use]
    pub fn node(&self) -> &Node {
        &self.node
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Run `callback` once, when this scope is released. If the scope is
    /// already closed, it runs immediately.
    pub fn on_release(&self, callback: impl FnOnce() + 'static) {
        if self.closed {
            callback();
            return;
        }
        if let Err(callback) = self.stack.push_release_callback(self.id, Box::new(callback)) {
            callback();
        }
    }

    /// Release this scope. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<(), ScopeDisciplineError> {
        if self.closed {
            return Ok(());
        }
        self.stack.release(self.id)?;
        self.closed = true;
        Ok(())
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        if self.closed || !self.stack.contains(self.id) {
            return;
        }
        if let Err(err) = self.stack.release(self.id) {
            tracing::error!(scope = %self.id, depth = self.stack.depth(), "{err}");
            if !std::thread::panicking() {
                panic!("scope discipline violated: {err}");
            }
        }
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.id)
            .field("node", &self.node.describe())
            .field("closed", &self.closed)
            .finish()
    }
}
