#![forbid(unsafe_code)]

//! Wiring bindings onto node properties.
//!
//! Each helper reads the binding once, writes the value into the widget, and
//! subscribes so later changes are written too. The subscription is held by
//! the node and released with it. If the first read panics, the widget keeps
//! its current value until the binding next reports a change.
//!
//! [`NodeBindExt::bind_value_two_way`] additionally listens for widget edits
//! and writes them back through the binding. Binding-driven updates are
//! applied with `set_value_without_notify`, so an edit does not echo back
//! into the binding.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::{Rc, Weak};

use weft_reactive::{Bindable, BindingResolutionError};
use weft_tree::{Node, PropertyValue, Widget, WidgetValue};

/// Binding helpers for [`Node`].
pub trait NodeBindExt {
    /// Keep the widget's caption equal to the binding.
    fn bind_text<B: Bindable<String>>(&self, binding: &B) -> &Self;

    /// Keep the widget's visibility equal to the binding.
    fn bind_display<B: Bindable<bool>>(&self, binding: &B) -> &Self;

    /// Keep the widget's enabled flag equal to the binding.
    fn bind_enabled<B: Bindable<bool>>(&self, binding: &B) -> &Self;

    /// Keep the widget's value equal to the binding, one way.
    fn bind_value<T: PropertyValue, B: Bindable<T>>(&self, binding: &B) -> &Self;

    /// Keep the widget's value and the binding in sync both ways.
    ///
    /// A binding that cannot be written is logged and wired one way.
    fn bind_value_two_way<T: PropertyValue, B: Bindable<T>>(&self, binding: &B) -> &Self;
}

fn wire<T, B>(node: &Node, binding: &B, apply: impl Fn(&dyn Widget, &T) + 'static)
where
    T: Clone + 'static,
    B: Bindable<T>,
{
    match catch_unwind(AssertUnwindSafe(|| binding.get())) {
        Ok(initial) => apply(node.widget().as_ref(), &initial),
        Err(_) => tracing::warn!(
            binding = %binding.id(),
            node = %node.describe(),
            "initial read failed; waiting for the next change"
        ),
    }
    let widget: Weak<dyn Widget> = Rc::downgrade(node.widget());
    let subscription = binding.subscribe(move |value: &T| {
        if let Some(widget) = widget.upgrade() {
            apply(widget.as_ref(), value);
        }
    });
    node.hold(subscription);
}

impl NodeBindExt for Node {
    fn bind_text<B: Bindable<String>>(&self, binding: &B) -> &Self {
        wire(self, binding, |w, text: &String| w.set_text(text));
        self
    }

    fn bind_display<B: Bindable<bool>>(&self, binding: &B) -> &Self {
        wire(self, binding, |w, display: &bool| w.set_display(*display));
        self
    }

    fn bind_enabled<B: Bindable<bool>>(&self, binding: &B) -> &Self {
        wire(self, binding, |w, enabled: &bool| w.set_enabled(*enabled));
        self
    }

    fn bind_value<T: PropertyValue, B: Bindable<T>>(&self, binding: &B) -> &Self {
        wire(self, binding, |w, value: &T| {
            w.set_value(value.clone().into_widget_value());
        });
        self
    }

    fn bind_value_two_way<T: PropertyValue, B: Bindable<T>>(&self, binding: &B) -> &Self {
        wire(self, binding, |w, value: &T| {
            w.set_value_without_notify(value.clone().into_widget_value());
        });

        if !binding.is_writable() {
            let err = BindingResolutionError::NotWritable {
                member: format!("binding {}", binding.id()),
            };
            tracing::error!(binding = %binding.id(), node = %self.describe(), "{err}; wired one way");
            return self;
        }

        let writer = binding.clone();
        let node = self.describe();
        self.on_value_changed(move |value: &WidgetValue| match T::from_widget_value(value) {
            Some(typed) => {
                if let Err(err) = writer.set(typed) {
                    tracing::warn!(binding = %writer.id(), node = %node, "{err}");
                }
            }
            None => tracing::warn!(
                binding = %writer.id(),
                node = %node,
                %value,
                "widget value does not fit the binding type"
            ),
        });
        self
    }
}
