#![forbid(unsafe_code)]

//! The three binding variants and the traits they share.
//!
//! Every binding is a cheap, clonable handle to shared state that is also held
//! by the [`BindingRegistry`](crate::registry::BindingRegistry). Handles expose
//! the typed [`Bindable<T>`] surface; the registry sees each binding through the
//! object-safe [`UpdateBinding`] trait.
//!
//! | Variant | Source of truth | Write | Change detection |
//! |---------|-----------------|-------|------------------|
//! | [`ValueBinding`] | stored value | stores and always notifies | none (tick is a no-op) |
//! | [`ReadOnlyBinding`] | getter | rejected | getter vs. last-seen on tick |
//! | [`TargetBinding`] | getter (+ setter) | setter, then re-read | getter vs. last-seen on write and tick |
//!
//! # Invariants
//!
//! 1. A read-only or target binding notifies only when the freshly read value
//!    differs from the last-seen value by `PartialEq`. For `Option<T>` values
//!    this covers transitions in both directions between `Some` and `None`.
//! 2. A target binding publishes the value read back through its getter after
//!    a write, not the value that was assigned.
//! 3. A value binding notifies on every write, including writes of an equal
//!    value.
//! 4. No `RefCell` borrow is held while listeners run, so listeners may read
//!    or write the binding that notified them.
//! 5. Registration never panics on account of the getter. A getter that fails
//!    while seeding leaves the binding unseeded; the first successful read
//!    publishes its value.

use std::cell::{Cell, RefCell};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use crate::error::{BindingResolutionError, BindingUpdateError, UpdateStage, panic_message};
use crate::event::{ChangeEvent, Subscription};

/// Callback registered together with a binding; lives as long as the binding.
pub type ChangeCallback<T> = Box<dyn Fn(&T)>;

/// Compiled read side of a binding.
pub type Getter<T> = Rc<dyn Fn() -> T>;

/// Compiled write side of a binding.
pub type Setter<T> = Rc<dyn Fn(T)>;

/// Registry-unique identifier of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(u64);

impl BindingId {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw id value. Ids increase in registration order.
    #[inline]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for BindingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which of the three variants a binding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    OwnedValue,
    ReadOnly,
    Target,
}

impl BindingKind {
    const fn default_label(self) -> &'static str {
        match self {
            Self::OwnedValue => "value",
            Self::ReadOnly => "read-only",
            Self::Target => "target",
        }
    }
}

/// Typed surface shared by all binding handles.
pub trait Bindable<T>: Clone + 'static {
    /// Registry id of this binding.
    fn id(&self) -> BindingId;

    /// Current value. Read-only and target bindings consult their getter.
    fn get(&self) -> T;

    /// Assign a value.
    ///
    /// Fails with [`BindingResolutionError::NotWritable`] when the binding has
    /// no write side.
    fn set(&self, value: T) -> Result<(), BindingResolutionError>;

    /// Whether [`set`](Bindable::set) can succeed.
    fn is_writable(&self) -> bool;

    /// Listen for changes until the returned guard is dropped.
    fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription;
}

/// Result of one [`UpdateBinding::update`] call.
#[derive(Debug, Default)]
pub struct UpdateOutcome {
    /// The change event fired.
    pub changed: bool,
    /// Failures caught while reading or notifying.
    pub failures: Vec<BindingUpdateError>,
}

/// Type-erased view of a binding used by the registry's tick pass.
pub trait UpdateBinding {
    fn id(&self) -> BindingId;
    fn kind(&self) -> BindingKind;
    fn label(&self) -> String;

    /// Re-read the source and notify on change. Never panics on account of
    /// user closures; their panics are returned as failures.
    fn update(&self) -> UpdateOutcome;
}

struct BindingMeta {
    id: BindingId,
    kind: BindingKind,
    label: RefCell<String>,
}

impl BindingMeta {
    fn new(id: BindingId, kind: BindingKind) -> Self {
        Self {
            id,
            kind,
            label: RefCell::new(kind.default_label().to_string()),
        }
    }

    fn failure(&self, stage: UpdateStage, message: String) -> BindingUpdateError {
        let err = BindingUpdateError {
            binding: self.id,
            label: self.label.borrow().clone(),
            stage,
            message,
        };
        tracing::error!(
            binding = %err.binding,
            label = %err.label,
            stage = %err.stage,
            "binding update failed: {}",
            err.message
        );
        err
    }

    fn notify<T: 'static>(&self, event: &ChangeEvent<T>, value: &T, out: &mut UpdateOutcome) {
        out.changed = true;
        for message in event.emit(value) {
            out.failures.push(self.failure(UpdateStage::Notify, message));
        }
    }
}

/// Getter + last-seen state shared by read-only and target bindings.
struct Polled<T> {
    getter: Getter<T>,
    /// `None` until the getter has succeeded once.
    last: RefCell<Option<T>>,
    changed: ChangeEvent<T>,
}

impl<T: Clone + PartialEq + 'static> Polled<T> {
    fn new(getter: Getter<T>, meta: &BindingMeta) -> Self {
        let last = match catch_unwind(AssertUnwindSafe(|| getter())) {
            Ok(v) => Some(v),
            Err(payload) => {
                meta.failure(UpdateStage::Seed, panic_message(payload.as_ref()));
                None
            }
        };
        Self {
            getter,
            last: RefCell::new(last),
            changed: ChangeEvent::new(),
        }
    }

    fn poll(&self, meta: &BindingMeta) -> UpdateOutcome {
        let mut out = UpdateOutcome::default();
        let fresh = match catch_unwind(AssertUnwindSafe(|| (self.getter)())) {
            Ok(v) => v,
            Err(payload) => {
                out.failures
                    .push(meta.failure(UpdateStage::Read, panic_message(payload.as_ref())));
                return out;
            }
        };

        let differs = self.last.borrow().as_ref() != Some(&fresh);
        if differs {
            *self.last.borrow_mut() = Some(fresh.clone());
            meta.notify(&self.changed, &fresh, &mut out);
        }
        out
    }
}

// ---------------------------------------------------------------------------
// ValueBinding<T>: owns its value
// ---------------------------------------------------------------------------

pub(crate) struct ValueInner<T> {
    meta: BindingMeta,
    value: RefCell<T>,
    changed: ChangeEvent<T>,
}

/// Binding that owns its value; every write is the source of truth.
pub struct ValueBinding<T> {
    inner: Rc<ValueInner<T>>,
}

impl<T> Clone for ValueBinding<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static> ValueBinding<T> {
    pub(crate) fn register(id: BindingId, initial: T) -> (Self, Rc<dyn UpdateBinding>) {
        let inner = Rc::new(ValueInner {
            meta: BindingMeta::new(id, BindingKind::OwnedValue),
            value: RefCell::new(initial),
            changed: ChangeEvent::new(),
        });
        let erased: Rc<dyn UpdateBinding> = inner.clone();
        (Self { inner }, erased)
    }

    pub(crate) fn pin(&self, callback: ChangeCallback<T>) {
        self.inner.changed.pin(callback);
    }

    /// Attach a label used in log output.
    #[must_use]
    pub fn with_label(self, label: impl Into<String>) -> Self {
        *self.inner.meta.label.borrow_mut() = label.into();
        self
    }

    /// Read the value by reference without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }
}

impl<T: Clone + 'static> Bindable<T> for ValueBinding<T> {
    fn id(&self) -> BindingId {
        self.inner.meta.id
    }

    fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    fn set(&self, value: T) -> Result<(), BindingResolutionError> {
        *self.inner.value.borrow_mut() = value;
        let snapshot = self.inner.value.borrow().clone();
        let mut out = UpdateOutcome::default();
        self.inner.meta.notify(&self.inner.changed, &snapshot, &mut out);
        Ok(())
    }

    fn is_writable(&self) -> bool {
        true
    }

    fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        self.inner.changed.subscribe(callback)
    }
}

impl<T: 'static> UpdateBinding for ValueInner<T> {
    fn id(&self) -> BindingId {
        self.meta.id
    }

    fn kind(&self) -> BindingKind {
        self.meta.kind
    }

    fn label(&self) -> String {
        self.meta.label.borrow().clone()
    }

    fn update(&self) -> UpdateOutcome {
        // Writes already notified synchronously.
        UpdateOutcome::default()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ValueBinding<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueBinding")
            .field("id", &self.inner.meta.id)
            .field("value", &self.inner.value.borrow())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ReadOnlyBinding<T>: getter only
// ---------------------------------------------------------------------------

pub(crate) struct ReadOnlyInner<T> {
    meta: BindingMeta,
    polled: Polled<T>,
}

/// Binding that only reads from its source.
pub struct ReadOnlyBinding<T> {
    inner: Rc<ReadOnlyInner<T>>,
}

impl<T> Clone for ReadOnlyBinding<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + 'static> ReadOnlyBinding<T> {
    pub(crate) fn register(id: BindingId, getter: Getter<T>) -> (Self, Rc<dyn UpdateBinding>) {
        let meta = BindingMeta::new(id, BindingKind::ReadOnly);
        let polled = Polled::new(getter, &meta);
        let inner = Rc::new(ReadOnlyInner { meta, polled });
        let erased: Rc<dyn UpdateBinding> = inner.clone();
        (Self { inner }, erased)
    }

    pub(crate) fn pin(&self, callback: ChangeCallback<T>) {
        self.inner.polled.changed.pin(callback);
    }

    /// Attach a label used in log output.
    #[must_use]
    pub fn with_label(self, label: impl Into<String>) -> Self {
        *self.inner.meta.label.borrow_mut() = label.into();
        self
    }

    /// The value observed by the most recent change check, or `None` if the
    /// getter has never succeeded.
    #[must_use]
    pub fn last_seen(&self) -> Option<T> {
        self.inner.polled.last.borrow().clone()
    }
}

impl<T: Clone + PartialEq + 'static> Bindable<T> for ReadOnlyBinding<T> {
    fn id(&self) -> BindingId {
        self.inner.meta.id
    }

    fn get(&self) -> T {
        (self.inner.polled.getter)()
    }

    fn set(&self, _value: T) -> Result<(), BindingResolutionError> {
        Err(BindingResolutionError::NotWritable {
            member: self.inner.meta.label.borrow().clone(),
        })
    }

    fn is_writable(&self) -> bool {
        false
    }

    fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        self.inner.polled.changed.subscribe(callback)
    }
}

impl<T: Clone + PartialEq + 'static> UpdateBinding for ReadOnlyInner<T> {
    fn id(&self) -> BindingId {
        self.meta.id
    }

    fn kind(&self) -> BindingKind {
        self.meta.kind
    }

    fn label(&self) -> String {
        self.meta.label.borrow().clone()
    }

    fn update(&self) -> UpdateOutcome {
        self.polled.poll(&self.meta)
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ReadOnlyBinding<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadOnlyBinding")
            .field("id", &self.inner.meta.id)
            .field("last_seen", &self.inner.polled.last.borrow())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// TargetBinding<T>: getter plus optional setter
// ---------------------------------------------------------------------------

pub(crate) struct TargetInner<T> {
    meta: BindingMeta,
    polled: Polled<T>,
    setter: Option<Setter<T>>,
    writes: Cell<u64>,
}

/// Two-way binding over a getter and an optional setter.
pub struct TargetBinding<T> {
    inner: Rc<TargetInner<T>>,
}

impl<T> Clone for TargetBinding<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + 'static> TargetBinding<T> {
    pub(crate) fn register(
        id: BindingId,
        getter: Getter<T>,
        setter: Option<Setter<T>>,
    ) -> (Self, Rc<dyn UpdateBinding>) {
        let meta = BindingMeta::new(id, BindingKind::Target);
        let polled = Polled::new(getter, &meta);
        let inner = Rc::new(TargetInner {
            meta,
            polled,
            setter,
            writes: Cell::new(0),
        });
        let erased: Rc<dyn UpdateBinding> = inner.clone();
        (Self { inner }, erased)
    }

    pub(crate) fn pin(&self, callback: ChangeCallback<T>) {
        self.inner.polled.changed.pin(callback);
    }

    /// Attach a label used in log output.
    #[must_use]
    pub fn with_label(self, label: impl Into<String>) -> Self {
        *self.inner.meta.label.borrow_mut() = label.into();
        self
    }

    /// The value observed by the most recent change check, or `None` if the
    /// getter has never succeeded.
    #[must_use]
    pub fn last_seen(&self) -> Option<T> {
        self.inner.polled.last.borrow().clone()
    }

    /// Number of writes the setter completed.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.inner.writes.get()
    }
}

impl<T: Clone + PartialEq + 'static> Bindable<T> for TargetBinding<T> {
    fn id(&self) -> BindingId {
        self.inner.meta.id
    }

    fn get(&self) -> T {
        (self.inner.polled.getter)()
    }

    /// Invoke the setter, then re-read through the getter and notify with the
    /// re-read value if it differs from the last-seen one.
    ///
    /// A panicking setter is logged and returned as
    /// [`BindingResolutionError::WriteFailed`]; no change check runs.
    fn set(&self, value: T) -> Result<(), BindingResolutionError> {
        let inner = &self.inner;
        let Some(setter) = inner.setter.as_ref() else {
            return Err(BindingResolutionError::NotWritable {
                member: inner.meta.label.borrow().clone(),
            });
        };

        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| setter(value))) {
            let err = inner
                .meta
                .failure(UpdateStage::Write, panic_message(payload.as_ref()));
            return Err(BindingResolutionError::WriteFailed {
                member: err.label,
                message: err.message,
            });
        }
        inner.writes.set(inner.writes.get() + 1);
        inner.polled.poll(&inner.meta);
        Ok(())
    }

    fn is_writable(&self) -> bool {
        self.inner.setter.is_some()
    }

    fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        self.inner.polled.changed.subscribe(callback)
    }
}

impl<T: Clone + PartialEq + 'static> UpdateBinding for TargetInner<T> {
    fn id(&self) -> BindingId {
        self.meta.id
    }

    fn kind(&self) -> BindingKind {
        self.meta.kind
    }

    fn label(&self) -> String {
        self.meta.label.borrow().clone()
    }

    fn update(&self) -> UpdateOutcome {
        self.polled.poll(&self.meta)
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for TargetBinding<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetBinding")
            .field("id", &self.inner.meta.id)
            .field("writable", &self.inner.setter.is_some())
            .field("last_seen", &self.inner.polled.last.borrow())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
