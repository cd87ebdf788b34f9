#![forbid(unsafe_code)]

//! Change event with registration-ordered, panic-isolated delivery.
//!
//! A [`ChangeEvent<T>`] is the notification half of every binding. Two kinds of
//! listener are supported:
//!
//! - **Pinned** listeners live as long as the event itself. The `on_change`
//!   callback passed when a binding is registered is pinned.
//! - **Subscribed** listeners are held weakly; the returned [`Subscription`]
//!   guard keeps them alive and dropping it unsubscribes.
//!
//! # Invariants
//!
//! 1. Listeners are invoked in registration order, pinned and subscribed alike.
//! 2. A panicking listener does not prevent later listeners from running.
//! 3. Dead weak entries are pruned lazily during [`ChangeEvent::emit`].
//! 4. Listeners may subscribe further listeners while being notified; the new
//!    listeners are first called on the next emission.

use std::cell::RefCell;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::{Rc, Weak};

use crate::error::panic_message;

type CallbackRc<T> = Rc<dyn Fn(&T)>;
type CallbackWeak<T> = Weak<dyn Fn(&T)>;

/// Ordered list of change listeners for one binding.
pub struct ChangeEvent<T> {
    /// Every listener in registration order. Pinned ones are kept alive by
    /// `pinned`; the rest by their `Subscription` guards.
    listeners: RefCell<Vec<CallbackWeak<T>>>,
    pinned: RefCell<Vec<CallbackRc<T>>>,
}

impl<T: 'static> ChangeEvent<T> {
    /// Create an event with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: RefCell::new(Vec::new()),
            pinned: RefCell::new(Vec::new()),
        }
    }

    /// Register a listener that lives as long as the event.
    pub fn pin(&self, callback: impl Fn(&T) + 'static) {
        let strong: CallbackRc<T> = Rc::new(callback);
        self.listeners.borrow_mut().push(Rc::downgrade(&strong));
        self.pinned.borrow_mut().push(strong);
    }

    /// Register a listener held alive by the returned guard.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let strong: CallbackRc<T> = Rc::new(callback);
        self.listeners.borrow_mut().push(Rc::downgrade(&strong));
        Subscription {
            _guard: Box::new(strong),
        }
    }

    /// Number of listeners that would currently be invoked.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners
            .borrow()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Deliver `value` to every live listener.
    ///
    /// Returns the panic messages of listeners that panicked, in order.
    pub fn emit(&self, value: &T) -> Vec<String> {
        let callbacks: Vec<CallbackRc<T>> = {
            let mut listeners = self.listeners.borrow_mut();
            listeners.retain(|w| w.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect()
        };

        let mut failures = Vec::new();
        for cb in &callbacks {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| cb(value))) {
                failures.push(panic_message(payload.as_ref()));
            }
        }
        failures
    }
}

impl<T: 'static> Default for ChangeEvent<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for ChangeEvent<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeEvent")
            .field("listeners", &self.listeners.borrow().len())
            .field("pinned", &self.pinned.borrow().len())
            .finish()
    }
}

/// RAII guard for a subscribed listener.
///
/// Dropping the guard drops the only strong reference to the callback, so the
/// event's weak entry fails to upgrade on the next emission.
pub struct Subscription {
    _guard: Box<dyn std::any::Any>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
