#![forbid(unsafe_code)]

//! The composition service.
//!
//! A [`Composer`] owns everything one composition session needs: the widget
//! backend, the scope stack, the binding registry, and the accessor cache.
//! Factory methods create a node and attach it to the current scope's node,
//! so nesting in code mirrors nesting in the tree:
//!
//! ```ignore
//! let composer = Composer::headless();
//! let panel = composer.element().named("panel");
//! {
//!     let _scope = composer.scope(&panel)?;
//!     composer.label("Hello");
//! }
//! assert_eq!(panel.child_count(), 1);
//! ```
//!
//! # Failure Modes
//!
//! - A factory whose node cannot be attached logs the [`StructuralError`] and
//!   still returns the detached node.
//! - Scope misuse surfaces as [`ScopeDisciplineError`]; [`Composer::reset`]
//!   discards the session's scopes and bindings.
//! - `bind_field` / `bind_property` log resolution errors and return `None`.
//!
//! Nodes wrapping widgets passed to [`Composer::scope_widget`] are kept by the
//! composer until [`Composer::reset`], so children composed under them keep
//! their bindings after the scope closes.

use std::cell::RefCell;
use std::rc::Rc;

use weft_reactive::{
    AccessorCompiler, Bindable, BindingRegistry, ChangeCallback, MemberExpr, ReadOnlyBinding,
    Reflect, Setter, TargetBinding, TickReport, ValueBinding,
};
use weft_tree::{
    HeadlessBackend, Node, Scope, ScopeDisciplineError, ScopeStack, StructuralError,
    WidgetBackend, WidgetHandle, WidgetKind, same_widget,
};

use crate::config::ComposeConfig;

/// One composition session.
pub struct Composer {
    backend: Rc<dyn WidgetBackend>,
    scopes: ScopeStack,
    registry: BindingRegistry,
    accessors: AccessorCompiler,
    adopted: RefCell<Vec<Node>>,
    config: ComposeConfig,
}

impl Composer {
    /// Composer over `backend` with the default configuration.
    #[must_use]
    pub fn new(backend: impl WidgetBackend + 'static) -> Self {
        Self::with_config(backend, ComposeConfig::default())
    }

    #[must_use]
    pub fn with_config(backend: impl WidgetBackend + 'static, config: ComposeConfig) -> Self {
        Self {
            backend: Rc::new(backend),
            scopes: ScopeStack::new(config.max_scope_depth),
            registry: BindingRegistry::with_options(config.registry_options()),
            accessors: AccessorCompiler::new(),
            adopted: RefCell::new(Vec::new()),
            config,
        }
    }

    /// Composer over an in-memory [`HeadlessBackend`].
    #[must_use]
    pub fn headless() -> Self {
        Self::new(HeadlessBackend::new())
    }

    #[must_use]
    pub fn config(&self) -> &ComposeConfig {
        &self.config
    }

    #[must_use]
    pub fn backend(&self) -> &Rc<dyn WidgetBackend> {
        &self.backend
    }

    #[must_use]
    pub fn registry(&self) -> &BindingRegistry {
        &self.registry
    }

    #[must_use]
    pub fn accessors(&self) -> &AccessorCompiler {
        &self.accessors
    }

    #[must_use]
    pub fn scopes(&self) -> &ScopeStack {
        &self.scopes
    }

    // -- scopes -----------------------------------------------------------

    /// Make `node` the parent of nodes created until the guard closes.
    pub fn scope(&self, node: &Node) -> Result<Scope, ScopeDisciplineError> {
        self.scopes.enter(node)
    }

    /// Scope over a widget that was not created by this composer, such as a
    /// window's root element.
    ///
    /// The wrapping node lives until [`Composer::reset`]; scoping the same
    /// widget again reuses it.
    pub fn scope_widget(&self, widget: WidgetHandle) -> Result<Scope, ScopeDisciplineError> {
        let node = self.adopt(widget);
        self.scopes.enter(&node)
    }

    /// Node wrapping an external widget, created on first use.
    pub fn adopt(&self, widget: WidgetHandle) -> Node {
        let mut adopted = self.adopted.borrow_mut();
        if let Some(node) = adopted.iter().find(|n| same_widget(n.widget(), &widget)) {
            return node.clone();
        }
        let node = Node::from_widget(widget);
        tracing::debug!(node = %node.describe(), children = node.child_count(), "widget adopted");
        adopted.push(node.clone());
        node
    }

    /// Number of external widgets this composer keeps nodes for.
    #[must_use]
    pub fn adopted_count(&self) -> usize {
        self.adopted.borrow().len()
    }

    /// The node new nodes are attached to.
    #[must_use]
    pub fn current(&self) -> Option<Node> {
        self.scopes.current()
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.scopes.depth()
    }

    // -- nodes ------------------------------------------------------------

    /// Attach `node` to the current scope's node, if any.
    pub fn process(&self, node: Node) -> Result<Node, StructuralError> {
        if let Some(parent) = self.scopes.current() {
            parent.add(&node)?;
        }
        Ok(node)
    }

    /// Create a node of `kind` and attach it to the current scope.
    pub fn create(&self, kind: WidgetKind) -> Node {
        let node = Node::from_widget(self.backend.create(&kind));
        match self.process(node.clone()) {
            Ok(node) => node,
            Err(err) => {
                tracing::error!(node = %node.describe(), depth = self.depth(), "{err}");
                node
            }
        }
    }

    pub fn element(&self) -> Node {
        self.create(WidgetKind::Element)
    }

    pub fn label(&self, text: &str) -> Node {
        self.create(WidgetKind::Label).with_text(text)
    }

    pub fn button(&self, text: &str) -> Node {
        self.create(WidgetKind::Button).with_text(text)
    }

    pub fn text_field(&self) -> Node {
        self.create(WidgetKind::TextField)
    }

    pub fn toggle(&self, text: &str) -> Node {
        self.create(WidgetKind::Toggle).with_text(text)
    }

    pub fn integer_field(&self) -> Node {
        self.create(WidgetKind::IntegerField)
    }

    pub fn float_field(&self) -> Node {
        self.create(WidgetKind::FloatField)
    }

    pub fn foldout(&self, text: &str) -> Node {
        self.create(WidgetKind::Foldout).with_text(text)
    }

    pub fn scroll_view(&self) -> Node {
        self.create(WidgetKind::ScrollView)
    }

    pub fn group_box(&self, text: &str) -> Node {
        self.create(WidgetKind::GroupBox).with_text(text)
    }

    pub fn help_box(&self, text: &str) -> Node {
        self.create(WidgetKind::HelpBox).with_text(text)
    }

    pub fn progress_bar(&self) -> Node {
        self.create(WidgetKind::ProgressBar)
    }

    pub fn custom(&self, kind: &str) -> Node {
        self.create(WidgetKind::Custom(kind.to_string()))
    }

    // -- bindings ---------------------------------------------------------

    pub fn bind_value<T: Clone + 'static>(
        &self,
        initial: T,
        on_change: Option<ChangeCallback<T>>,
    ) -> ValueBinding<T> {
        self.registry.register_owned_value(initial, on_change)
    }

    pub fn bind_read_only<T: Clone + PartialEq + 'static>(
        &self,
        getter: impl Fn() -> T + 'static,
        on_change: Option<ChangeCallback<T>>,
    ) -> ReadOnlyBinding<T> {
        self.registry.register_read_only(getter, on_change)
    }

    pub fn bind_target<T: Clone + PartialEq + 'static>(
        &self,
        getter: impl Fn() -> T + 'static,
        setter: Option<Setter<T>>,
        on_change: Option<ChangeCallback<T>>,
    ) -> TargetBinding<T> {
        self.registry.register_target(getter, setter, on_change)
    }

    /// Bind a field of `source` by name or [`member!`](weft_reactive::member)
    /// expression.
    pub fn bind_field<S: Reflect, T: Clone + PartialEq + 'static>(
        &self,
        source: &Rc<RefCell<S>>,
        member: impl Into<MemberExpr<S, T>>,
        on_change: Option<ChangeCallback<T>>,
    ) -> Option<TargetBinding<T>> {
        self.accessors
            .bind_field(&self.registry, source, member, on_change)
    }

    /// Bind a property of `source` by name or [`member!`](weft_reactive::member)
    /// expression.
    pub fn bind_property<S: Reflect, T: Clone + PartialEq + 'static>(
        &self,
        source: &Rc<RefCell<S>>,
        member: impl Into<MemberExpr<S, T>>,
        on_change: Option<ChangeCallback<T>>,
    ) -> Option<TargetBinding<T>> {
        self.accessors
            .bind_property(&self.registry, source, member, on_change)
    }

    /// Read-only binding that maps another binding's value.
    pub fn derive<S, T, B>(&self, source: &B, map: impl Fn(&S) -> T + 'static) -> ReadOnlyBinding<T>
    where
        S: 'static,
        B: Bindable<S>,
        T: Clone + PartialEq + 'static,
    {
        self.registry.derive(source, map)
    }

    // -- session ----------------------------------------------------------

    /// Run one change-detection pass over every binding.
    pub fn tick(&self) -> TickReport {
        self.registry.tick()
    }

    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.registry.len()
    }

    /// Discard every open scope, every binding and every adopted widget node.
    pub fn reset(&self) {
        self.scopes.clear();
        self.registry.clear();
        let adopted = std::mem::take(&mut *self.adopted.borrow_mut());
        drop(adopted);
        tracing::debug!("composer reset");
    }
}

impl Default for Composer {
    fn default() -> Self {
        Self::headless()
    }
}

impl std::fmt::Debug for Composer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Composer")
            .field("scopes", &self.scopes)
            .field("registry", &self.registry)
            .field("adopted", &self.adopted.borrow().len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
