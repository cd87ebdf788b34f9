#![forbid(unsafe_code)]

//! Member accessor compiler: resolve a named field or property once, then
//! read and write it through typed closures.
//!
//! Rust has no runtime reflection, so a source type opts in by implementing
//! [`Reflect`] and describing its members in a [`MemberTable`]. The table is
//! the only place that knows member names; it can expose private fields
//! because it is written next to the type.
//!
//! ```ignore
//! struct Session { count: i32, url: String }
//!
//! impl Reflect for Session {
//!     fn members() -> MemberTable<Self> {
//!         MemberTable::<Self>::new()
//!             .field("count", |s| &s.count, |s| &mut s.count)
//!             .property("url", |s: &Session| s.url.clone())
//!     }
//! }
//!
//! let compiler = AccessorCompiler::new();
//! let count = compiler.compile_field::<Session, i32>("count")?;
//! let same = compiler.compile_field(member!(Session, count))?;
//! ```
//!
//! # Two phases
//!
//! 1. **Resolve** (once per bind call): look the member up by name, check its
//!    kind and exact value type, and downcast the stored [`Accessor<S, T>`].
//!    Tables themselves are built once per source type and cached by `TypeId`.
//! 2. **Invoke** (every tick): call the closures in the [`BoundAccessor`]. No
//!    name lookup happens after phase 1.
//!
//! # Failure Modes
//!
//! Every failure is a [`BindingResolutionError`]. The `bind_*` entry points
//! log it and return `None`; the `compile_*` entry points return it.

use std::any::{Any, TypeId, type_name};
use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use std::rc::Rc;

use ahash::AHashMap;

use crate::binding::{ChangeCallback, Getter, Setter, TargetBinding};
use crate::error::{BindingResolutionError, MemberKind};
use crate::registry::BindingRegistry;

/// A source type whose members can be bound by name.
pub trait Reflect: Sized + 'static {
    /// Describe every bindable field and property.
    fn members() -> MemberTable<Self>;
}

// ---------------------------------------------------------------------------
// Accessor<S, T>
// ---------------------------------------------------------------------------

type GetFn<S, T> = Rc<dyn Fn(&S) -> T>;
type SetFn<S, T> = Rc<dyn Fn(&mut S, T)>;

/// Typed read/write closures for one member of `S`, not yet tied to an
/// instance.
pub struct Accessor<S, T> {
    get: Option<GetFn<S, T>>,
    set: Option<SetFn<S, T>>,
}

impl<S, T> Clone for Accessor<S, T> {
    fn clone(&self) -> Self {
        Self {
            get: self.get.clone(),
            set: self.set.clone(),
        }
    }
}

impl<S: 'static, T: 'static> Accessor<S, T> {
    #[must_use]
    pub fn is_readable(&self) -> bool {
        self.get.is_some()
    }

    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.set.is_some()
    }

    /// Read the member from `source`, if readable.
    pub fn read(&self, source: &S) -> Option<T> {
        self.get.as_ref().map(|get| get(source))
    }

    /// Write the member on `source`, if writable. Returns whether a write
    /// happened.
    pub fn write(&self, source: &mut S, value: T) -> bool {
        match &self.set {
            Some(set) => {
                set(source, value);
                true
            }
            None => false,
        }
    }

    /// Close both sides over one shared instance.
    #[must_use]
    pub fn bind(&self, source: Rc<RefCell<S>>) -> BoundAccessor<T> {
        let getter = self.get.clone().map(|get| {
            let source = Rc::clone(&source);
            Rc::new(move || get(&source.borrow())) as Getter<T>
        });
        let setter = self.set.clone().map(|set| {
            let source = Rc::clone(&source);
            Rc::new(move |value: T| set(&mut source.borrow_mut(), value)) as Setter<T>
        });
        BoundAccessor { getter, setter }
    }
}

impl<S, T> std::fmt::Debug for Accessor<S, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Accessor")
            .field("readable", &self.get.is_some())
            .field("writable", &self.set.is_some())
            .finish()
    }
}

/// Accessor closures bound to a specific source instance.
pub struct BoundAccessor<T> {
    pub getter: Option<Getter<T>>,
    pub setter: Option<Setter<T>>,
}

// ---------------------------------------------------------------------------
// MemberTable<S>
// ---------------------------------------------------------------------------

struct MemberEntry {
    name: &'static str,
    kind: MemberKind,
    value_type: TypeId,
    value_type_name: &'static str,
    /// An `Accessor<S, T>` for this entry's `T`.
    accessor: Rc<dyn Any>,
}

/// The bindable members of `S`, by name.
pub struct MemberTable<S> {
    entries: Vec<MemberEntry>,
    index: AHashMap<&'static str, usize>,
    _source: PhantomData<fn(&S)>,
}

impl<S: 'static> MemberTable<S> {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: AHashMap::new(),
            _source: PhantomData,
        }
    }

    /// Add a writable field.
    #[must_use]
    pub fn field<T: Clone + 'static>(
        self,
        name: &'static str,
        get: impl Fn(&S) -> &T + 'static,
        get_mut: impl Fn(&mut S) -> &mut T + 'static,
    ) -> Self {
        let accessor = Accessor::<S, T> {
            get: Some(Rc::new(move |s: &S| get(s).clone())),
            set: Some(Rc::new(move |s: &mut S, v: T| *get_mut(s) = v)),
        };
        self.insert(name, MemberKind::Field, accessor)
    }

    /// Add a field that can be read but not written.
    #[must_use]
    pub fn readonly_field<T: Clone + 'static>(
        self,
        name: &'static str,
        get: impl Fn(&S) -> &T + 'static,
    ) -> Self {
        let accessor = Accessor::<S, T> {
            get: Some(Rc::new(move |s: &S| get(s).clone())),
            set: None,
        };
        self.insert(name, MemberKind::Field, accessor)
    }

    /// Add a property with only a getter.
    #[must_use]
    pub fn property<T: 'static>(self, name: &'static str, get: impl Fn(&S) -> T + 'static) -> Self {
        let accessor = Accessor::<S, T> {
            get: Some(Rc::new(get)),
            set: None,
        };
        self.insert(name, MemberKind::Property, accessor)
    }

    /// Add a property with a getter and a setter.
    #[must_use]
    pub fn property_rw<T: 'static>(
        self,
        name: &'static str,
        get: impl Fn(&S) -> T + 'static,
        set: impl Fn(&mut S, T) + 'static,
    ) -> Self {
        let accessor = Accessor::<S, T> {
            get: Some(Rc::new(get)),
            set: Some(Rc::new(set)),
        };
        self.insert(name, MemberKind::Property, accessor)
    }

    /// Add a property with only a setter. It can be resolved but not bound.
    #[must_use]
    pub fn write_only_property<T: 'static>(
        self,
        name: &'static str,
        set: impl Fn(&mut S, T) + 'static,
    ) -> Self {
        let accessor = Accessor::<S, T> {
            get: None,
            set: Some(Rc::new(set)),
        };
        self.insert(name, MemberKind::Property, accessor)
    }

    fn insert<T: 'static>(mut self, name: &'static str, kind: MemberKind, accessor: Accessor<S, T>) -> Self {
        if self.index.contains_key(name) {
            tracing::warn!(
                source_type = type_name::<S>(),
                member = name,
                "duplicate member ignored"
            );
            return self;
        }
        self.index.insert(name, self.entries.len());
        self.entries.push(MemberEntry {
            name,
            kind,
            value_type: TypeId::of::<T>(),
            value_type_name: type_name::<T>(),
            accessor: Rc::new(accessor),
        });
        self
    }

    /// Member names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|e| e.name)
    }

    /// Kind of the named member, if present.
    #[must_use]
    pub fn kind_of(&self, name: &str) -> Option<MemberKind> {
        self.index.get(name).map(|&i| self.entries[i].kind)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve `name` into a typed accessor.
    ///
    /// `kind` restricts the lookup to fields or properties; `None` accepts
    /// either. The member's value type must be exactly `T`.
    pub fn resolve<T: 'static>(
        &self,
        name: &str,
        kind: Option<MemberKind>,
    ) -> Result<Accessor<S, T>, BindingResolutionError> {
        let source_type = type_name::<S>();
        let entry = self
            .index
            .get(name)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| BindingResolutionError::UnknownMember {
                source_type,
                member: name.to_string(),
            })?;

        if let Some(expected) = kind
            && expected != entry.kind
        {
            return Err(BindingResolutionError::KindMismatch {
                source_type,
                member: name.to_string(),
                expected,
                found: entry.kind,
            });
        }

        let mismatch = || BindingResolutionError::TypeMismatch {
            source_type,
            member: name.to_string(),
            expected: type_name::<T>(),
            found: entry.value_type_name,
        };
        if entry.value_type != TypeId::of::<T>() {
            return Err(mismatch());
        }
        entry
            .accessor
            .downcast_ref::<Accessor<S, T>>()
            .cloned()
            .ok_or_else(mismatch)
    }
}

impl<S: 'static> Default for MemberTable<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> std::fmt::Debug for MemberTable<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemberTable")
            .field("source", &type_name::<S>())
            .field(
                "members",
                &self.entries.iter().map(|e| (e.name, e.kind)).collect::<Vec<_>>(),
            )
            .finish()
    }
}

// ---------------------------------------------------------------------------
// MemberExpr<S, T>
// ---------------------------------------------------------------------------

/// A description of "this field or property of an `S`".
///
/// Built from a plain name (`"count"`), from text (`"self.count"`,
/// `"label()"`), or with [`member!`](crate::member) which also proves at
/// compile time that the member exists and has type `T`.
pub struct MemberExpr<S, T> {
    text: Cow<'static, str>,
    _marker: PhantomData<fn(&S) -> T>,
}

impl<S, T> MemberExpr<S, T> {
    /// Wrap expression text. Its shape is validated when it is resolved.
    pub fn parse(text: impl Into<Cow<'static, str>>) -> Self {
        Self {
            text: text.into(),
            _marker: PhantomData,
        }
    }

    #[doc(hidden)]
    pub fn checked_field(name: &'static str, _witness: impl Fn(&S) -> &T) -> Self {
        Self::parse(name)
    }

    #[doc(hidden)]
    pub fn checked_property(name: &'static str, _witness: impl Fn(&S) -> T) -> Self {
        let mut text = String::with_capacity(name.len() + 2);
        text.push_str(name);
        text.push_str("()");
        Self::parse(text)
    }

    /// The expression as written.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The member name and, for `name()` forms, the property hint.
    pub fn target(&self) -> Result<(&str, Option<MemberKind>), BindingResolutionError> {
        let not_member = || BindingResolutionError::NotMemberAccess {
            expr: self.text.to_string(),
        };
        let raw = self.text.trim();
        let raw = raw.strip_prefix("self.").unwrap_or(raw);
        let (name, hint) = match raw.strip_suffix("()") {
            Some(name) => (name, Some(MemberKind::Property)),
            None => (raw, None),
        };
        if is_identifier(name) {
            Ok((name, hint))
        } else {
            Err(not_member())
        }
    }
}

impl<S, T> From<&'static str> for MemberExpr<S, T> {
    fn from(text: &'static str) -> Self {
        Self::parse(text)
    }
}

impl<S, T> From<String> for MemberExpr<S, T> {
    fn from(text: String) -> Self {
        Self::parse(text)
    }
}

impl<S, T> std::fmt::Debug for MemberExpr<S, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("MemberExpr").field(&self.text).finish()
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Build a compile-time checked [`MemberExpr`].
///
/// `member!(Type, field)` names a field; `member!(Type, getter())` names a
/// property read through a method. The macro must be invoked where the member
/// is visible.
#[macro_export]
macro_rules! member {
    ($source:ty, $name:ident ()) => {
        $crate::accessor::MemberExpr::<$source, _>::checked_property(
            stringify!($name),
            |s: &$source| s.$name(),
        )
    };
    ($source:ty, $name:ident) => {
        $crate::accessor::MemberExpr::<$source, _>::checked_field(
            stringify!($name),
            |s: &$source| &s.$name,
        )
    };
}

// ---------------------------------------------------------------------------
// AccessorCompiler
// ---------------------------------------------------------------------------

/// Resolves members into accessors and target bindings, caching one
/// [`MemberTable`] per source type.
pub struct AccessorCompiler {
    tables: RefCell<AHashMap<TypeId, Rc<dyn Any>>>,
    builds: Cell<usize>,
}

impl AccessorCompiler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: RefCell::new(AHashMap::new()),
            builds: Cell::new(0),
        }
    }

    /// The member table for `S`, built on first use.
    pub fn table<S: Reflect>(&self) -> Rc<MemberTable<S>> {
        let key = TypeId::of::<S>();
        let cached = self.tables.borrow().get(&key).cloned();
        if let Some(table) = cached.and_then(|t| t.downcast::<MemberTable<S>>().ok()) {
            return table;
        }
        let table = Rc::new(S::members());
        self.builds.set(self.builds.get() + 1);
        tracing::trace!(
            source_type = type_name::<S>(),
            members = table.len(),
            "member table built"
        );
        self.tables
            .borrow_mut()
            .insert(key, Rc::clone(&table) as Rc<dyn Any>);
        table
    }

    /// Number of member tables built so far.
    #[must_use]
    pub fn tables_built(&self) -> usize {
        self.builds.get()
    }

    /// Resolve a field of `S` with value type `T`.
    pub fn compile_field<S: Reflect, T: 'static>(
        &self,
        member: impl Into<MemberExpr<S, T>>,
    ) -> Result<Accessor<S, T>, BindingResolutionError> {
        self.compile(&member.into(), MemberKind::Field)
    }

    /// Resolve a property of `S` with value type `T`.
    pub fn compile_property<S: Reflect, T: 'static>(
        &self,
        member: impl Into<MemberExpr<S, T>>,
    ) -> Result<Accessor<S, T>, BindingResolutionError> {
        self.compile(&member.into(), MemberKind::Property)
    }

    fn compile<S: Reflect, T: 'static>(
        &self,
        expr: &MemberExpr<S, T>,
        kind: MemberKind,
    ) -> Result<Accessor<S, T>, BindingResolutionError> {
        let (name, hint) = expr.target()?;
        if hint.is_some_and(|h| h != kind) {
            return Err(BindingResolutionError::NotMemberAccess {
                expr: expr.text().to_string(),
            });
        }
        self.table::<S>().resolve(name, Some(kind))
    }

    /// Bind a field of `source` as a target binding.
    ///
    /// Resolution failures are logged and yield `None`.
    pub fn bind_field<S: Reflect, T: Clone + PartialEq + 'static>(
        &self,
        registry: &BindingRegistry,
        source: &Rc<RefCell<S>>,
        member: impl Into<MemberExpr<S, T>>,
        on_change: Option<ChangeCallback<T>>,
    ) -> Option<TargetBinding<T>> {
        self.bind(registry, source, &member.into(), MemberKind::Field, on_change)
    }

    /// Bind a property of `source` as a target binding.
    ///
    /// Resolution failures are logged and yield `None`.
    pub fn bind_property<S: Reflect, T: Clone + PartialEq + 'static>(
        &self,
        registry: &BindingRegistry,
        source: &Rc<RefCell<S>>,
        member: impl Into<MemberExpr<S, T>>,
        on_change: Option<ChangeCallback<T>>,
    ) -> Option<TargetBinding<T>> {
        self.bind(registry, source, &member.into(), MemberKind::Property, on_change)
    }

    fn bind<S: Reflect, T: Clone + PartialEq + 'static>(
        &self,
        registry: &BindingRegistry,
        source: &Rc<RefCell<S>>,
        expr: &MemberExpr<S, T>,
        kind: MemberKind,
        on_change: Option<ChangeCallback<T>>,
    ) -> Option<TargetBinding<T>> {
        let resolved = self.compile(expr, kind).and_then(|accessor| {
            let bound = accessor.bind(Rc::clone(source));
            let getter = bound
                .getter
                .ok_or_else(|| BindingResolutionError::NotReadable {
                    source_type: type_name::<S>(),
                    member: expr.text().to_string(),
                })?;
            Ok((getter, bound.setter))
        });

        match resolved {
            Ok((getter, setter)) => {
                let binding = registry
                    .register_target_compiled(getter, setter, on_change)
                    .with_label(format!("{}.{}", short_type_name::<S>(), expr.text()));
                Some(binding)
            }
            Err(err) => {
                tracing::error!(
                    source_type = type_name::<S>(),
                    member = expr.text(),
                    kind = %kind,
                    "failed binding on {kind}: {err}"
                );
                None
            }
        }
    }
}

impl Default for AccessorCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AccessorCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessorCompiler")
            .field("tables", &self.tables.borrow().len())
            .finish()
    }
}

fn short_type_name<S>() -> &'static str {
    let full = type_name::<S>();
    match full.find('<') {
        Some(_) => full,
        None => full.rsplit("::").next().unwrap_or(full),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Bindable;
    use crate::error::UpdateStage;
    use std::cell::Cell;

    #[derive(Default)]
    struct Counter {
        count: i32,
        title: String,
        limit: i32,
        seed: u64,
    }

    impl Counter {
        fn doubled(&self) -> i32 {
            self.count * 2
        }
    }

    impl Reflect for Counter {
        fn members() -> MemberTable<Self> {
            MemberTable::<Self>::new()
                .field("count", |s| &s.count, |s| &mut s.count)
                .field("title", |s| &s.title, |s| &mut s.title)
                .readonly_field("seed", |s| &s.seed)
                .property("doubled", Counter::doubled)
                .property_rw(
                    "limit",
                    |s: &Counter| s.limit,
                    |s: &mut Counter, v: i32| s.limit = v.clamp(0, 100),
                )
                .write_only_property("sink", |s: &mut Counter, v: i32| s.count = v)
        }
    }

    fn shared(counter: Counter) -> Rc<RefCell<Counter>> {
        Rc::new(RefCell::new(counter))
    }

    #[test]
    fn name_and_macro_resolve_to_same_member() {
        let compiler = AccessorCompiler::new();
        let by_name = compiler.compile_field::<Counter, i32>("count").unwrap();
        let by_expr = compiler.compile_field::<Counter, i32>(member!(Counter, count)).unwrap();

        let mut c = Counter { count: 3, ..Default::default() };
        assert_eq!(by_name.read(&c), Some(3));
        assert_eq!(by_expr.read(&c), Some(3));
        assert!(by_expr.write(&mut c, 8));
        assert_eq!(by_name.read(&c), Some(8));
    }

    #[test]
    fn property_macro_form_resolves() {
        let compiler = AccessorCompiler::new();
        let acc = compiler.compile_property::<Counter, i32>(member!(Counter, doubled())).unwrap();
        let c = Counter { count: 4, ..Default::default() };
        assert_eq!(acc.read(&c), Some(8));
        assert!(!acc.is_writable());
    }

    #[test]
    fn table_is_built_once_per_type() {
        let compiler = AccessorCompiler::new();
        compiler.compile_field::<Counter, i32>("count").unwrap();
        compiler.compile_field::<Counter, String>("title").unwrap();
        compiler.compile_property::<Counter, i32>("limit").unwrap();
        assert_eq!(compiler.tables_built(), 1);
    }

    #[test]
    fn resolution_errors() {
        let compiler = AccessorCompiler::new();

        assert!(matches!(
            compiler.compile_field::<Counter, i32>("missing"),
            Err(BindingResolutionError::UnknownMember { .. })
        ));
        assert!(matches!(
            compiler.compile_property::<Counter, i32>("count"),
            Err(BindingResolutionError::KindMismatch {
                expected: MemberKind::Property,
                found: MemberKind::Field,
                ..
            })
        ));
        assert!(matches!(
            compiler.compile_field::<Counter, i64>("count"),
            Err(BindingResolutionError::TypeMismatch { .. })
        ));
        assert!(matches!(
            compiler.compile_field::<Counter, i32>("count + 1"),
            Err(BindingResolutionError::NotMemberAccess { .. })
        ));
        assert!(matches!(
            compiler.compile_field::<Counter, i32>("inner.count"),
            Err(BindingResolutionError::NotMemberAccess { .. })
        ));
        assert!(matches!(
            compiler.compile_field::<Counter, i32>("count()"),
            Err(BindingResolutionError::NotMemberAccess { .. })
        ));
    }

    #[test]
    fn expression_text_forms() {
        let e: MemberExpr<Counter, i32> = MemberExpr::parse(" self.count ");
        assert_eq!(e.target().unwrap(), ("count", None));
        let e: MemberExpr<Counter, i32> = MemberExpr::parse("limit()");
        assert_eq!(e.target().unwrap(), ("limit", Some(MemberKind::Property)));
        let e: MemberExpr<Counter, i32> = MemberExpr::parse("");
        assert!(e.target().is_err());
        let e: MemberExpr<Counter, i32> = MemberExpr::parse("9lives");
        assert!(e.target().is_err());
    }

    #[test]
    fn bind_field_tracks_direct_mutation() {
        let registry = BindingRegistry::new();
        let compiler = AccessorCompiler::new();
        let source = shared(Counter { count: 1, ..Default::default() });

        let binding = compiler
            .bind_field::<Counter, i32>(&registry, &source, "count", None)
            .expect("field binds");
        assert_eq!(binding.get(), 1);

        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let _sub = binding.subscribe(move |_| h.set(h.get() + 1));

        source.borrow_mut().count = 5;
        registry.tick();
        assert_eq!(binding.get(), 5);
        assert_eq!(binding.last_seen(), Some(5));
        assert_eq!(hits.get(), 1);

        binding.set(9).unwrap();
        assert_eq!(source.borrow().count, 9);
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn binding_over_busy_source_does_not_panic() {
        let registry = BindingRegistry::new();
        let compiler = AccessorCompiler::new();
        let source = shared(Counter { count: 2, ..Default::default() });

        let binding = {
            let _busy = source.borrow_mut();
            compiler.bind_field::<Counter, i32>(&registry, &source, "count", None)
        }
        .expect("resolution does not touch the source");
        assert_eq!(binding.last_seen(), None);

        let report = registry.tick();
        assert!(report.is_clean());
        assert_eq!(report.changed, 1);
        assert_eq!(binding.last_seen(), Some(2));
    }

    #[test]
    fn panicking_property_getter_is_contained() {
        struct Fragile;
        impl Fragile {
            fn boom(&self) -> i32 {
                panic!("boom")
            }
        }
        impl Reflect for Fragile {
            fn members() -> MemberTable<Self> {
                MemberTable::<Self>::new().property("boom", Fragile::boom)
            }
        }

        let registry = BindingRegistry::new();
        let compiler = AccessorCompiler::new();
        let source = Rc::new(RefCell::new(Fragile));
        let binding = compiler
            .bind_property::<Fragile, i32>(&registry, &source, "boom", None)
            .expect("binds even though the first read fails");
        assert_eq!(binding.last_seen(), None);

        let report = registry.tick();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].stage, UpdateStage::Read);
    }

    #[test]
    fn bind_property_clamps_through_setter() {
        let registry = BindingRegistry::new();
        let compiler = AccessorCompiler::new();
        let source = shared(Counter::default());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);

        let binding = compiler
            .bind_property::<Counter, i32>(
                &registry,
                &source,
                "limit",
                Some(Box::new(move |v| s.borrow_mut().push(*v))),
            )
            .unwrap();
        binding.set(500).unwrap();
        assert_eq!(*seen.borrow(), vec![100]);
    }

    #[test]
    fn bind_missing_member_returns_none() {
        let registry = BindingRegistry::new();
        let compiler = AccessorCompiler::new();
        let source = shared(Counter::default());
        let binding = compiler.bind_property::<Counter, i32>(&registry, &source, "Missing", None);
        assert!(binding.is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn write_only_property_cannot_be_bound() {
        let registry = BindingRegistry::new();
        let compiler = AccessorCompiler::new();
        let source = shared(Counter::default());
        assert!(
            compiler
                .bind_property::<Counter, i32>(&registry, &source, "sink", None)
                .is_none()
        );
    }

    #[test]
    fn readonly_field_binding_rejects_writes() {
        let registry = BindingRegistry::new();
        let compiler = AccessorCompiler::new();
        let source = shared(Counter { seed: 7, ..Default::default() });
        let binding = compiler
            .bind_field::<Counter, u64>(&registry, &source, "seed", None)
            .unwrap();
        assert!(!binding.is_writable());
        assert!(binding.set(1).is_err());
        assert_eq!(source.borrow().seed, 7);
    }

    #[test]
    fn binding_label_names_source_and_member() {
        let registry = BindingRegistry::new();
        let compiler = AccessorCompiler::new();
        let source = shared(Counter::default());
        let binding = compiler
            .bind_field::<Counter, String>(&registry, &source, "title", None)
            .unwrap();
        assert!(format!("{binding:?}").contains("TargetBinding"));
        assert_eq!(registry.labels(), vec!["Counter.title".to_string()]);
    }
}
