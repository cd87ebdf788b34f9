#![forbid(unsafe_code)]

//! UI tree nodes.
//!
//! A [`Node`] is a cheap, clonable handle around one widget. It keeps its own
//! ordered child list, a weak link to its parent, and whatever subscriptions
//! and widget callbacks were wired onto it.
//!
//! # Invariants
//!
//! 1. A node's children mirror its widget's children: every successful
//!    [`Node::add`], [`Node::remove`] and [`Node::clear`] edits both.
//! 2. A node has at most one parent, and the parent chain never loops.
//! 3. A rejected edit leaves both lists untouched.
//! 4. When the last handle to a node is dropped, the widget callbacks it
//!    registered are unregistered and its held subscriptions are released.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::StructuralError;
use crate::widget::{CallbackId, PropertyValue, WidgetHandle, WidgetKind, WidgetValue, same_widget};

struct NodeInner {
    widget: WidgetHandle,
    name: RefCell<Option<Rc<str>>>,
    children: RefCell<Vec<Node>>,
    parent: RefCell<Weak<NodeInner>>,
    held: RefCell<Vec<Box<dyn Any>>>,
    callbacks: RefCell<Vec<CallbackId>>,
}

impl Drop for NodeInner {
    fn drop(&mut self) {
        for id in self.callbacks.get_mut().drain(..) {
            self.widget.unregister_value_changed(id);
        }
    }
}

/// Handle to a node in the UI tree.
#[derive(Clone)]
pub struct Node {
    inner: Rc<NodeInner>,
}

/// Selects a child by position or by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKey<'a> {
    Index(usize),
    Name(&'a str),
}

impl From<usize> for ChildKey<'_> {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl<'a> From<&'a str> for ChildKey<'a> {
    fn from(name: &'a str) -> Self {
        Self::Name(name)
    }
}

impl Node {
    /// Wrap an existing widget.
    ///
    /// The node adopts the widget's current name and wraps every child the
    /// widget already has, recursively, so the new node starts out mirrored.
    #[must_use]
    pub fn from_widget(widget: WidgetHandle) -> Self {
        let name = widget.name().map(Rc::from);
        let node = Self {
            inner: Rc::new(NodeInner {
                widget,
                name: RefCell::new(name),
                children: RefCell::new(Vec::new()),
                parent: RefCell::new(Weak::new()),
                held: RefCell::new(Vec::new()),
                callbacks: RefCell::new(Vec::new()),
            }),
        };
        let mut index = 0;
        while let Some(child_widget) = node.inner.widget.child_at(index) {
            let child = Node::from_widget(child_widget);
            *child.inner.parent.borrow_mut() = Rc::downgrade(&node.inner);
            node.inner.children.borrow_mut().push(child);
            index += 1;
        }
        node
    }

    #[must_use]
    pub fn widget(&self) -> &WidgetHandle {
        &self.inner.widget
    }

    #[must_use]
    pub fn kind(&self) -> WidgetKind {
        self.inner.widget.kind()
    }

    #[must_use]
    pub fn name(&self) -> Option<Rc<str>> {
        self.inner.name.borrow().clone()
    }

    pub fn set_name(&self, name: Option<&str>) {
        *self.inner.name.borrow_mut() = name.map(Rc::from);
        self.inner.widget.set_name(name);
    }

    /// `Kind#name`, or just `Kind` for unnamed nodes. Used in messages.
    #[must_use]
    pub fn describe(&self) -> String {
        match self.inner.name.borrow().as_deref() {
            Some(name) => format!("{}#{name}", self.kind()),
            None => self.kind().to_string(),
        }
    }

    /// Whether both handles refer to the same node.
    #[must_use]
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // -- structure --------------------------------------------------------

    #[must_use]
    pub fn parent(&self) -> Option<Node> {
        self.inner.parent.borrow().upgrade().map(|inner| Node { inner })
    }

    /// Append `child`.
    ///
    /// Fails with [`StructuralError::AlreadyAttached`] if `child` has a parent
    /// and with [`StructuralError::WouldCycle`] if `child` is this node or one
    /// of its ancestors.
    pub fn add(&self, child: &Node) -> Result<(), StructuralError> {
        if child.parent().is_some() {
            return Err(StructuralError::AlreadyAttached {
                node: child.describe(),
            });
        }
        let mut cursor = Some(self.clone());
        while let Some(node) = cursor {
            if node.ptr_eq(child) {
                return Err(StructuralError::WouldCycle {
                    node: child.describe(),
                });
            }
            cursor = node.parent();
        }

        self.inner.children.borrow_mut().push(child.clone());
        *child.inner.parent.borrow_mut() = Rc::downgrade(&self.inner);
        self.inner.widget.add_child(Rc::clone(&child.inner.widget));
        tracing::trace!(node = %child.describe(), parent = %self.describe(), "node attached");
        Ok(())
    }

    /// Detach `child`.
    pub fn remove(&self, child: &Node) -> Result<(), StructuralError> {
        let index = self.index_of(child).ok_or_else(|| StructuralError::NotAChild {
            node: child.describe(),
            parent: self.describe(),
        })?;
        self.inner.children.borrow_mut().remove(index);
        *child.inner.parent.borrow_mut() = Weak::new();
        self.inner.widget.remove_child(&child.inner.widget);
        tracing::trace!(node = %child.describe(), parent = %self.describe(), "node detached");
        Ok(())
    }

    /// Detach every child.
    pub fn clear(&self) {
        let children = std::mem::take(&mut *self.inner.children.borrow_mut());
        for child in &children {
            *child.inner.parent.borrow_mut() = Weak::new();
        }
        self.inner.widget.clear_children();
    }

    /// Child at a position or with a name.
    ///
    /// Name lookup returns the first child whose name matches.
    pub fn child<'a>(&self, key: impl Into<ChildKey<'a>>) -> Option<Node> {
        let children = self.inner.children.borrow();
        match key.into() {
            ChildKey::Index(index) => children.get(index).cloned(),
            ChildKey::Name(name) => children
                .iter()
                .find(|c| c.inner.name.borrow().as_deref() == Some(name))
                .cloned(),
        }
    }

    /// Snapshot of the children in display order.
    #[must_use]
    pub fn children(&self) -> Vec<Node> {
        self.inner.children.borrow().clone()
    }

    #[must_use]
    pub fn child_count(&self) -> usize {
        self.inner.children.borrow().len()
    }

    #[must_use]
    pub fn index_of(&self, child: &Node) -> Option<usize> {
        self.inner
            .children
            .borrow()
            .iter()
            .position(|c| c.ptr_eq(child))
    }

    /// Whether the widget's child list matches this node's, in order.
    #[must_use]
    pub fn is_mirrored(&self) -> bool {
        let children = self.inner.children.borrow();
        children.len() == self.inner.widget.child_count()
            && children.iter().enumerate().all(|(i, c)| {
                self.inner
                    .widget
                    .child_at(i)
                    .is_some_and(|w| same_widget(&w, &c.inner.widget))
            })
    }

    // -- properties -------------------------------------------------------

    #[must_use]
    pub fn text(&self) -> String {
        self.inner.widget.text()
    }

    pub fn set_text(&self, text: &str) {
        self.inner.widget.set_text(text);
    }

    #[must_use]
    pub fn display(&self) -> bool {
        self.inner.widget.display()
    }

    pub fn set_display(&self, display: bool) {
        self.inner.widget.set_display(display);
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.inner.widget.enabled()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.inner.widget.set_enabled(enabled);
    }

    #[must_use]
    pub fn value(&self) -> WidgetValue {
        self.inner.widget.value()
    }

    /// The widget value converted to `V`, if it holds one.
    #[must_use]
    pub fn value_as<V: PropertyValue>(&self) -> Option<V> {
        V::from_widget_value(&self.inner.widget.value())
    }

    /// Assign the value as a user edit, firing value-changed callbacks.
    pub fn set_value<V: PropertyValue>(&self, value: V) {
        self.inner.widget.set_value(value.into_widget_value());
    }

    // -- fluent setters ---------------------------------------------------

    #[must_use]
    pub fn named(self, name: &str) -> Self {
        self.set_name(Some(name));
        self
    }

    #[must_use]
    pub fn with_text(self, text: &str) -> Self {
        self.set_text(text);
        self
    }

    #[must_use]
    pub fn with_display(self, display: bool) -> Self {
        self.set_display(display);
        self
    }

    #[must_use]
    pub fn with_enabled(self, enabled: bool) -> Self {
        self.set_enabled(enabled);
        self
    }

    /// Set the initial value without firing callbacks.
    #[must_use]
    pub fn with_value<V: PropertyValue>(self, value: V) -> Self {
        self.inner
            .widget
            .set_value_without_notify(value.into_widget_value());
        self
    }

    // -- attachments ------------------------------------------------------

    /// Call `callback` whenever the widget's value is edited. The callback is
    /// unregistered when the node is dropped.
    pub fn on_value_changed(&self, callback: impl Fn(&WidgetValue) + 'static) -> CallbackId {
        let id = self.inner.widget.register_value_changed(Rc::new(callback));
        self.inner.callbacks.borrow_mut().push(id);
        id
    }

    /// Keep `guard` alive for as long as this node.
    pub fn hold(&self, guard: impl Any) {
        self.inner.held.borrow_mut().push(Box::new(guard));
    }

    /// Number of guards and callbacks attached to this node.
    #[must_use]
    pub fn attachment_count(&self) -> usize {
        self.inner.held.borrow().len() + self.inner.callbacks.borrow().len()
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Node {}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("widget", &self.describe())
            .field("children", &self.child_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{HeadlessBackend, HeadlessWidget};
    use crate::widget::{Widget, WidgetBackend};
    use proptest::prelude::*;
    use std::cell::Cell;

    fn node(kind: WidgetKind) -> Node {
        Node::from_widget(HeadlessBackend::new().create(&kind))
    }

    #[test]
    fn add_mirrors_widget_children() {
        let panel = node(WidgetKind::Element);
        let label = node(WidgetKind::Label);
        panel.add(&label).unwrap();

        assert_eq!(panel.child_count(), 1);
        assert_eq!(panel.widget().child_count(), 1);
        assert!(panel.is_mirrored());
        assert_eq!(label.parent(), Some(panel.clone()));
    }

    #[test]
    fn child_lookup_by_index_and_name() {
        let panel = node(WidgetKind::Element);
        let a = node(WidgetKind::Label).named("a");
        let b = node(WidgetKind::Button).named("b");
        panel.add(&a).unwrap();
        panel.add(&b).unwrap();

        assert_eq!(panel.child(1), Some(b.clone()));
        assert_eq!(panel.child("a"), Some(a));
        assert_eq!(panel.child("zzz"), None);
        assert_eq!(panel.child(5), None);
        assert_eq!(panel.index_of(&b), Some(1));
    }

    #[test]
    fn reattaching_is_rejected() {
        let p1 = node(WidgetKind::Element);
        let p2 = node(WidgetKind::Element);
        let child = node(WidgetKind::Label);
        p1.add(&child).unwrap();

        assert!(matches!(
            p1.add(&child),
            Err(StructuralError::AlreadyAttached { .. })
        ));
        assert!(matches!(
            p2.add(&child),
            Err(StructuralError::AlreadyAttached { .. })
        ));
        assert_eq!(p1.child_count(), 1);
        assert_eq!(p2.child_count(), 0);
        assert!(p2.is_mirrored());
    }

    #[test]
    fn cycles_are_rejected() {
        let root = node(WidgetKind::Element).named("root");
        let mid = node(WidgetKind::Element);
        root.add(&mid).unwrap();

        assert!(matches!(root.add(&root), Err(StructuralError::WouldCycle { .. })));

        let detached_root = node(WidgetKind::Element);
        let leaf = node(WidgetKind::Element);
        detached_root.add(&leaf).unwrap();
        assert!(matches!(
            leaf.add(&detached_root),
            Err(StructuralError::WouldCycle { .. })
        ));
        assert_eq!(leaf.child_count(), 0);
    }

    #[test]
    fn remove_and_clear() {
        let panel = node(WidgetKind::Element);
        let a = node(WidgetKind::Label);
        let b = node(WidgetKind::Label);
        panel.add(&a).unwrap();
        panel.add(&b).unwrap();

        panel.remove(&a).unwrap();
        assert!(a.parent().is_none());
        assert_eq!(
            panel.remove(&a),
            Err(StructuralError::NotAChild {
                node: "Label".into(),
                parent: "Element".into(),
            })
        );
        assert!(panel.is_mirrored());

        panel.clear();
        assert_eq!(panel.child_count(), 0);
        assert_eq!(panel.widget().child_count(), 0);
        assert!(b.parent().is_none());
        panel.add(&b).unwrap();
    }

    #[test]
    fn fluent_setters_reach_widget() {
        let button = node(WidgetKind::Button)
            .named("go")
            .with_text("Go")
            .with_enabled(false)
            .with_display(false);
        assert_eq!(button.widget().name().as_deref(), Some("go"));
        assert_eq!(button.text(), "Go");
        assert!(!button.enabled());
        assert!(!button.display());
        assert_eq!(button.describe(), "Button#go");

        let field = node(WidgetKind::IntegerField).with_value(12_i32);
        assert_eq!(field.value_as::<i32>(), Some(12));
    }

    #[test]
    fn from_widget_adopts_name() {
        let widget = HeadlessWidget::new(WidgetKind::Element);
        widget.set_name(Some("root"));
        let root = Node::from_widget(widget);
        assert_eq!(root.name().as_deref(), Some("root"));
    }

    #[test]
    fn from_widget_adopts_existing_children() {
        let backend = HeadlessBackend::new();
        let window = backend.create(&WidgetKind::Element);
        let first = backend.create(&WidgetKind::Label);
        first.set_name(Some("first"));
        let group = backend.create(&WidgetKind::GroupBox);
        group.add_child(backend.create(&WidgetKind::Button));
        window.add_child(Rc::clone(&first));
        window.add_child(group);

        let root = Node::from_widget(window);
        assert_eq!(root.child_count(), 2);
        assert!(root.is_mirrored());
        let adopted = root.child("first").unwrap();
        assert!(same_widget(adopted.widget(), &first));
        assert_eq!(adopted.parent(), Some(root.clone()));
        let nested = root.child(1).unwrap();
        assert_eq!(nested.child_count(), 1);
        assert!(nested.is_mirrored());

        let added = node(WidgetKind::Label);
        root.add(&added).unwrap();
        assert_eq!(root.index_of(&added), Some(2));
        assert!(root.is_mirrored());
    }

    #[test]
    fn dropping_node_unregisters_callbacks() {
        let widget = HeadlessWidget::new(WidgetKind::Toggle);
        let hits = Rc::new(Cell::new(0));
        {
            let node = Node::from_widget(widget.clone());
            let h = Rc::clone(&hits);
            node.on_value_changed(move |_| h.set(h.get() + 1));
            node.hold(String::from("guard"));
            assert_eq!(node.attachment_count(), 2);
            widget.set_value(WidgetValue::Bool(true));
        }
        widget.set_value(WidgetValue::Bool(false));
        assert_eq!(hits.get(), 1);
        assert_eq!(widget.callback_count(), 0);
    }

    proptest! {
        #[test]
        fn random_edits_keep_widget_mirrored(ops in proptest::collection::vec((0_u8..3, 0_usize..6), 0..60)) {
            let panel = node(WidgetKind::Element);
            let pool: Vec<Node> = (0..6).map(|_| node(WidgetKind::Label)).collect();
            for (op, i) in ops {
                let target = &pool[i];
                match op {
                    0 => { let _ = panel.add(target); }
                    1 => { let _ = panel.remove(target); }
                    _ => panel.clear(),
                }
                prop_assert!(panel.is_mirrored());
                for n in &pool {
                    prop_assert_eq!(n.parent().is_some(), panel.index_of(n).is_some());
                }
            }
        }
    }
}
