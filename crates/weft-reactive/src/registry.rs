#![forbid(unsafe_code)]

//! Binding registry: creates bindings and drives their change detection.
//!
//! The registry owns one type-erased handle per binding. [`BindingRegistry::tick`]
//! walks them in registration order and asks each to re-read its source;
//! callers drive it from their frame or update loop.
//!
//! # Invariants
//!
//! 1. Bindings are updated in registration order.
//! 2. A binding registered while a tick is running is first updated on the
//!    next tick.
//! 3. A failure in one binding never stops the tick; it is logged and
//!    collected into the [`TickReport`].
//! 4. Bindings are never removed individually; [`BindingRegistry::clear`]
//!    drops all of them at once.

use std::cell::{Cell, RefCell};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;
use std::time::Duration;

use web_time::Instant;

use crate::binding::{
    Bindable, BindingId, ChangeCallback, Getter, ReadOnlyBinding, Setter, TargetBinding,
    UpdateBinding, ValueBinding,
};
use crate::error::{BindingUpdateError, UpdateStage, panic_message};

/// Tuning knobs for a [`BindingRegistry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryOptions {
    /// Initial capacity of the binding list.
    pub capacity: usize,
    /// Log a warning when a tick takes longer than this.
    pub slow_tick_warn: Option<Duration>,
    /// Wrap each tick in a `debug` span.
    pub trace_ticks: bool,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            capacity: 64,
            slow_tick_warn: None,
            trace_ticks: false,
        }
    }
}

/// Summary of one [`BindingRegistry::tick`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// 1-based sequence number of this tick.
    pub tick: u64,
    /// Bindings visited.
    pub updated: usize,
    /// Bindings whose change event fired.
    pub changed: usize,
    /// Failures caught during the pass, in binding order.
    pub failures: Vec<BindingUpdateError>,
}

impl TickReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Holds every live binding and updates them on demand.
pub struct BindingRegistry {
    bindings: RefCell<Vec<Rc<dyn UpdateBinding>>>,
    next_id: Cell<u64>,
    ticks: Cell<u64>,
    options: RegistryOptions,
}

impl BindingRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(RegistryOptions::default())
    }

    #[must_use]
    pub fn with_options(options: RegistryOptions) -> Self {
        Self {
            bindings: RefCell::new(Vec::with_capacity(options.capacity)),
            next_id: Cell::new(1),
            ticks: Cell::new(0),
            options,
        }
    }

    #[must_use]
    pub fn options(&self) -> &RegistryOptions {
        &self.options
    }

    fn allocate(&self) -> BindingId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        BindingId::new(id)
    }

    fn push(&self, erased: Rc<dyn UpdateBinding>) {
        tracing::trace!(binding = %erased.id(), kind = ?erased.kind(), "binding registered");
        self.bindings.borrow_mut().push(erased);
    }

    /// Create a binding that owns `initial`.
    ///
    /// `on_change` is called on every write, for as long as the binding lives.
    pub fn register_owned_value<T: Clone + 'static>(
        &self,
        initial: T,
        on_change: Option<ChangeCallback<T>>,
    ) -> ValueBinding<T> {
        let (binding, erased) = ValueBinding::register(self.allocate(), initial);
        if let Some(cb) = on_change {
            binding.pin(cb);
        }
        self.push(erased);
        binding
    }

    /// Create a binding that reads `getter` and notifies when its result
    /// changes.
    ///
    /// The getter is called once immediately to seed the last-seen value. If
    /// it panics, the failure is logged and the first successful tick
    /// publishes the value.
    pub fn register_read_only<T: Clone + PartialEq + 'static>(
        &self,
        getter: impl Fn() -> T + 'static,
        on_change: Option<ChangeCallback<T>>,
    ) -> ReadOnlyBinding<T> {
        let (binding, erased) = ReadOnlyBinding::register(self.allocate(), Rc::new(getter));
        if let Some(cb) = on_change {
            binding.pin(cb);
        }
        self.push(erased);
        binding
    }

    /// Create a two-way binding over `getter` and an optional `setter`.
    pub fn register_target<T: Clone + PartialEq + 'static>(
        &self,
        getter: impl Fn() -> T + 'static,
        setter: Option<Setter<T>>,
        on_change: Option<ChangeCallback<T>>,
    ) -> TargetBinding<T> {
        self.register_target_compiled(Rc::new(getter), setter, on_change)
    }

    /// Like [`register_target`](Self::register_target) for closures that are
    /// already shared, such as those produced by the accessor compiler.
    pub fn register_target_compiled<T: Clone + PartialEq + 'static>(
        &self,
        getter: Getter<T>,
        setter: Option<Setter<T>>,
        on_change: Option<ChangeCallback<T>>,
    ) -> TargetBinding<T> {
        let (binding, erased) = TargetBinding::register(self.allocate(), getter, setter);
        if let Some(cb) = on_change {
            binding.pin(cb);
        }
        self.push(erased);
        binding
    }

    /// Create a read-only binding whose value is `map` applied to `source`.
    ///
    /// The derived binding is updated after `source` within the same tick,
    /// since it is registered later.
    pub fn derive<S, T, B>(&self, source: &B, map: impl Fn(&S) -> T + 'static) -> ReadOnlyBinding<T>
    where
        S: 'static,
        B: Bindable<S>,
        T: Clone + PartialEq + 'static,
    {
        let source = source.clone();
        self.register_read_only(move || map(&source.get()), None)
            .with_label("derived")
    }

    /// Update every binding once, in registration order.
    pub fn tick(&self) -> TickReport {
        let tick = self.ticks.get() + 1;
        self.ticks.set(tick);

        let span = if self.options.trace_ticks {
            tracing::debug_span!("weft_tick", tick)
        } else {
            tracing::Span::none()
        };
        let _entered = span.enter();

        let started = Instant::now();
        let snapshot: Vec<Rc<dyn UpdateBinding>> = self.bindings.borrow().clone();
        let mut report = TickReport {
            tick,
            ..TickReport::default()
        };

        for binding in &snapshot {
            report.updated += 1;
            match catch_unwind(AssertUnwindSafe(|| binding.update())) {
                Ok(outcome) => {
                    if outcome.changed {
                        report.changed += 1;
                    }
                    report.failures.extend(outcome.failures);
                }
                Err(payload) => {
                    let err = BindingUpdateError {
                        binding: binding.id(),
                        label: binding.label(),
                        stage: UpdateStage::Update,
                        message: panic_message(payload.as_ref()),
                    };
                    tracing::error!(binding = %err.binding, label = %err.label, "{err}");
                    report.failures.push(err);
                }
            }
        }

        let elapsed = started.elapsed();
        if let Some(limit) = self.options.slow_tick_warn
            && elapsed > limit
        {
            tracing::warn!(
                tick,
                bindings = report.updated,
                elapsed_us = elapsed.as_micros() as u64,
                "slow binding tick"
            );
        }
        tracing::trace!(
            tick,
            updated = report.updated,
            changed = report.changed,
            failures = report.failures.len(),
            "tick complete"
        );
        report
    }

    /// Drop every binding. Handles held elsewhere keep working but are no
    /// longer ticked.
    pub fn clear(&self) {
        let dropped = std::mem::take(&mut *self.bindings.borrow_mut());
        tracing::debug!(count = dropped.len(), "binding registry cleared");
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.borrow().is_empty()
    }

    /// Number of ticks run so far.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.ticks.get()
    }

    /// Labels of all bindings in registration order.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.bindings.borrow().iter().map(|b| b.label()).collect()
    }
}

impl Default for BindingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BindingRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingRegistry")
            .field("bindings", &self.len())
            .field("ticks", &self.ticks.get())
            .field("options", &self.options)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
