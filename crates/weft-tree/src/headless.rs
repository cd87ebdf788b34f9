#![forbid(unsafe_code)]

//! In-memory widget backend.
//!
//! [`HeadlessWidget`] implements the full [`Widget`] contract without any
//! toolkit behind it. Tests and the demo compose against it and inspect the
//! result with [`render_tree`].
//!
//! # Example
//!
//! ```ignore
//! let backend = HeadlessBackend::new();
//! let panel = backend.create(&WidgetKind::Element);
//! panel.add_child(backend.create(&WidgetKind::Label));
//! assert_eq!(render_tree(&panel), "Element\n  Label\n");
//! ```

use std::cell::{Cell, RefCell};
use std::fmt::Write as _;
use std::rc::Rc;

use crate::widget::{
    CallbackId, ValueCallback, Widget, WidgetBackend, WidgetHandle, WidgetKind, WidgetValue,
    same_widget,
};

/// Backend that creates [`HeadlessWidget`]s.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    created: Cell<usize>,
}

impl HeadlessBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of widgets created so far.
    #[must_use]
    pub fn created(&self) -> usize {
        self.created.get()
    }
}

impl WidgetBackend for HeadlessBackend {
    fn create(&self, kind: &WidgetKind) -> WidgetHandle {
        self.created.set(self.created.get() + 1);
        HeadlessWidget::new(kind.clone())
    }
}

struct State {
    name: Option<String>,
    text: String,
    display: bool,
    enabled: bool,
    value: WidgetValue,
    children: Vec<WidgetHandle>,
}

/// Widget that keeps all of its state in memory.
pub struct HeadlessWidget {
    kind: WidgetKind,
    state: RefCell<State>,
    callbacks: RefCell<Vec<(CallbackId, ValueCallback)>>,
    next_callback: Cell<u64>,
}

impl HeadlessWidget {
    #[must_use]
    pub fn new(kind: WidgetKind) -> Rc<Self> {
        Rc::new(Self {
            state: RefCell::new(State {
                name: None,
                text: String::new(),
                display: true,
                enabled: true,
                value: kind.default_value(),
                children: Vec::new(),
            }),
            kind,
            callbacks: RefCell::new(Vec::new()),
            next_callback: Cell::new(1),
        })
    }

    /// Number of registered value-changed callbacks.
    #[must_use]
    pub fn callback_count(&self) -> usize {
        self.callbacks.borrow().len()
    }
}

impl Widget for HeadlessWidget {
    fn kind(&self) -> WidgetKind {
        self.kind.clone()
    }

    fn name(&self) -> Option<String> {
        self.state.borrow().name.clone()
    }

    fn set_name(&self, name: Option<&str>) {
        self.state.borrow_mut().name = name.map(str::to_string);
    }

    fn text(&self) -> String {
        self.state.borrow().text.clone()
    }

    fn set_text(&self, text: &str) {
        text.clone_into(&mut self.state.borrow_mut().text);
    }

    fn display(&self) -> bool {
        self.state.borrow().display
    }

    fn set_display(&self, display: bool) {
        self.state.borrow_mut().display = display;
    }

    fn enabled(&self) -> bool {
        self.state.borrow().enabled
    }

    fn set_enabled(&self, enabled: bool) {
        self.state.borrow_mut().enabled = enabled;
    }

    fn value(&self) -> WidgetValue {
        self.state.borrow().value.clone()
    }

    fn set_value(&self, value: WidgetValue) {
        {
            let mut state = self.state.borrow_mut();
            if state.value == value {
                return;
            }
            state.value = value.clone();
        }
        let callbacks: Vec<ValueCallback> =
            self.callbacks.borrow().iter().map(|(_, cb)| Rc::clone(cb)).collect();
        for cb in callbacks {
            cb(&value);
        }
    }

    fn set_value_without_notify(&self, value: WidgetValue) {
        self.state.borrow_mut().value = value;
    }

    fn child_count(&self) -> usize {
        self.state.borrow().children.len()
    }

    fn child_at(&self, index: usize) -> Option<WidgetHandle> {
        self.state.borrow().children.get(index).cloned()
    }

    fn child_named(&self, name: &str) -> Option<WidgetHandle> {
        self.state
            .borrow()
            .children
            .iter()
            .find(|c| c.name().as_deref() == Some(name))
            .cloned()
    }

    fn index_of(&self, child: &WidgetHandle) -> Option<usize> {
        self.state
            .borrow()
            .children
            .iter()
            .position(|c| same_widget(c, child))
    }

    fn add_child(&self, child: WidgetHandle) {
        self.state.borrow_mut().children.push(child);
    }

    fn remove_child(&self, child: &WidgetHandle) -> bool {
        let mut state = self.state.borrow_mut();
        match state.children.iter().position(|c| same_widget(c, child)) {
            Some(index) => {
                state.children.remove(index);
                true
            }
            None => false,
        }
    }

    fn clear_children(&self) {
        self.state.borrow_mut().children.clear();
    }

    fn register_value_changed(&self, callback: ValueCallback) -> CallbackId {
        let id = CallbackId::new(self.next_callback.get());
        self.next_callback.set(id.id() + 1);
        self.callbacks.borrow_mut().push((id, callback));
        id
    }

    fn unregister_value_changed(&self, id: CallbackId) -> bool {
        let mut callbacks = self.callbacks.borrow_mut();
        let before = callbacks.len();
        callbacks.retain(|(cid, _)| *cid != id);
        callbacks.len() != before
    }
}

impl std::fmt::Debug for HeadlessWidget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("HeadlessWidget")
            .field("kind", &self.kind)
            .field("name", &state.name)
            .field("value", &state.value)
            .field("children", &state.children.len())
            .finish()
    }
}

/// Deterministic indented dump of a widget subtree.
///
/// One line per widget: kind, then `#name`, quoted text, `= value`, and the
/// `[hidden]` / `[disabled]` flags when they apply. Children are indented by
/// two spaces per level.
#[must_use]
pub fn render_tree(root: &WidgetHandle) -> String {
    let mut out = String::new();
    render_into(root, 0, &mut out);
    out
}

fn render_into(widget: &WidgetHandle, depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push_str("  ");
    }
    out.push_str(widget.kind().as_str());
    if let Some(name) = widget.name() {
        let _ = write!(out, " #{name}");
    }
    let text = widget.text();
    if !text.is_empty() {
        let _ = write!(out, " {text:?}");
    }
    let value = widget.value();
    if value != WidgetValue::None {
        let _ = write!(out, " = {value}");
    }
    if !widget.display() {
        out.push_str(" [hidden]");
    }
    if !widget.enabled() {
        out.push_str(" [disabled]");
    }
    out.push('\n');

    let mut index = 0;
    while let Some(child) = widget.child_at(index) {
        render_into(&child, depth + 1, out);
        index += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_value_notifies_only_on_change() {
        let widget = HeadlessWidget::new(WidgetKind::IntegerField);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        widget.register_value_changed(Rc::new(move |v: &WidgetValue| {
            s.borrow_mut().push(v.clone());
        }));

        widget.set_value(WidgetValue::Int(0));
        widget.set_value(WidgetValue::Int(3));
        widget.set_value_without_notify(WidgetValue::Int(4));
        assert_eq!(*seen.borrow(), vec![WidgetValue::Int(3)]);
        assert_eq!(widget.value(), WidgetValue::Int(4));
    }

    #[test]
    fn unregister_removes_callback() {
        let widget = HeadlessWidget::new(WidgetKind::Toggle);
        let id = widget.register_value_changed(Rc::new(|_: &WidgetValue| {}));
        assert_eq!(widget.callback_count(), 1);
        assert!(widget.unregister_value_changed(id));
        assert!(!widget.unregister_value_changed(id));
        assert_eq!(widget.callback_count(), 0);
    }

    #[test]
    fn callback_may_read_widget() {
        let widget = HeadlessWidget::new(WidgetKind::TextField);
        let echo = Rc::new(RefCell::new(String::new()));
        let (w, e) = (Rc::downgrade(&widget), Rc::clone(&echo));
        widget.register_value_changed(Rc::new(move |_: &WidgetValue| {
            if let Some(w) = w.upgrade() {
                *e.borrow_mut() = w.value().to_string();
            }
        }));
        widget.set_value(WidgetValue::Text("typed".into()));
        assert_eq!(*echo.borrow(), "\"typed\"");
    }

    #[test]
    fn children_by_index_and_name() {
        let backend = HeadlessBackend::new();
        let root = backend.create(&WidgetKind::Element);
        let a = backend.create(&WidgetKind::Label);
        let b = backend.create(&WidgetKind::Button);
        b.set_name(Some("go"));
        root.add_child(Rc::clone(&a));
        root.add_child(Rc::clone(&b));

        assert_eq!(backend.created(), 3);
        assert!(same_widget(&root.child_at(1).unwrap(), &b));
        assert!(same_widget(&root.child_named("go").unwrap(), &b));
        assert_eq!(root.index_of(&a), Some(0));
        assert!(root.remove_child(&a));
        assert!(!root.remove_child(&a));
        assert_eq!(root.child_count(), 1);
    }

    #[test]
    fn debug_reports_child_count() {
        let backend = HeadlessBackend::new();
        let root = HeadlessWidget::new(WidgetKind::Element);
        root.set_name(Some("panel"));
        root.add_child(backend.create(&WidgetKind::Label));
        let dump = format!("{root:?}");
        assert!(dump.starts_with("HeadlessWidget"));
        assert!(dump.contains("children: 1"));
    }

    #[test]
    fn render_tree_is_deterministic() {
        let backend = HeadlessBackend::new();
        let root = backend.create(&WidgetKind::Element);
        root.set_name(Some("panel"));
        let label = backend.create(&WidgetKind::Label);
        label.set_text("State: New");
        let button = backend.create(&WidgetKind::Button);
        button.set_text("Connect");
        button.set_enabled(false);
        let field = backend.create(&WidgetKind::TextField);
        field.set_value(WidgetValue::Text("stun:a".into()));
        field.set_display(false);
        root.add_child(label);
        root.add_child(button);
        root.add_child(field);

        assert_eq!(
            render_tree(&root),
            "Element #panel\n  Label \"State: New\"\n  Button \"Connect\" [disabled]\n  TextField = \"stun:a\" [hidden]\n"
        );
    }
}
