#![forbid(unsafe_code)]

//! Widget handle contract.
//!
//! A [`Widget`] is the backend object a [`Node`](crate::node::Node) wraps. The
//! trait uses `&self` everywhere; implementations keep their state behind
//! interior mutability so a handle can be shared between the tree, binding
//! subscribers, and value-changed callbacks.
//!
//! Values cross the contract as a small dynamic [`WidgetValue`]. Typed code
//! converts with [`PropertyValue`].

use std::fmt;
use std::rc::Rc;

/// Shared handle to a backend widget.
pub type WidgetHandle = Rc<dyn Widget>;

/// Callback invoked with a widget's new value after a user edit.
pub type ValueCallback = Rc<dyn Fn(&WidgetValue)>;

/// The kinds of widget the composer knows how to create.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WidgetKind {
    /// Plain container.
    Element,
    Label,
    Button,
    TextField,
    Toggle,
    IntegerField,
    FloatField,
    /// Collapsible container; its value is the expanded flag.
    Foldout,
    ScrollView,
    GroupBox,
    HelpBox,
    ProgressBar,
    /// Backend-specific kind, identified by name.
    Custom(String),
}

impl WidgetKind {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Element => "Element",
            Self::Label => "Label",
            Self::Button => "Button",
            Self::TextField => "TextField",
            Self::Toggle => "Toggle",
            Self::IntegerField => "IntegerField",
            Self::FloatField => "FloatField",
            Self::Foldout => "Foldout",
            Self::ScrollView => "ScrollView",
            Self::GroupBox => "GroupBox",
            Self::HelpBox => "HelpBox",
            Self::ProgressBar => "ProgressBar",
            Self::Custom(name) => name,
        }
    }

    /// Value a freshly created widget of this kind holds.
    #[must_use]
    pub fn default_value(&self) -> WidgetValue {
        match self {
            Self::Toggle => WidgetValue::Bool(false),
            Self::Foldout => WidgetValue::Bool(true),
            Self::IntegerField => WidgetValue::Int(0),
            Self::FloatField | Self::ProgressBar => WidgetValue::Float(0.0),
            Self::TextField => WidgetValue::Text(String::new()),
            _ => WidgetValue::None,
        }
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dynamic value carried by a widget.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum WidgetValue {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for WidgetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v:?}"),
        }
    }
}

/// Conversion between a typed property and [`WidgetValue`].
pub trait PropertyValue: Clone + PartialEq + 'static {
    fn into_widget_value(self) -> WidgetValue;

    /// `None` when `value` does not hold this type or is out of range.
    fn from_widget_value(value: &WidgetValue) -> Option<Self>;
}

impl PropertyValue for WidgetValue {
    fn into_widget_value(self) -> WidgetValue {
        self
    }

    fn from_widget_value(value: &WidgetValue) -> Option<Self> {
        Some(value.clone())
    }
}

impl PropertyValue for bool {
    fn into_widget_value(self) -> WidgetValue {
        WidgetValue::Bool(self)
    }

    fn from_widget_value(value: &WidgetValue) -> Option<Self> {
        match value {
            WidgetValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl PropertyValue for String {
    fn into_widget_value(self) -> WidgetValue {
        WidgetValue::Text(self)
    }

    fn from_widget_value(value: &WidgetValue) -> Option<Self> {
        match value {
            WidgetValue::Text(v) => Some(v.clone()),
            _ => None,
        }
    }
}

macro_rules! int_property {
    ($($ty:ty),*) => {$(
        impl PropertyValue for $ty {
            fn into_widget_value(self) -> WidgetValue {
                WidgetValue::Int(i64::from(self))
            }

            fn from_widget_value(value: &WidgetValue) -> Option<Self> {
                match value {
                    WidgetValue::Int(v) => <$ty>::try_from(*v).ok(),
                    _ => None,
                }
            }
        }
    )*};
}

int_property!(i8, i16, i32, i64, u8, u16, u32);

impl PropertyValue for f64 {
    fn into_widget_value(self) -> WidgetValue {
        WidgetValue::Float(self)
    }

    fn from_widget_value(value: &WidgetValue) -> Option<Self> {
        match value {
            WidgetValue::Float(v) => Some(*v),
            WidgetValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }
}

impl PropertyValue for f32 {
    fn into_widget_value(self) -> WidgetValue {
        WidgetValue::Float(f64::from(self))
    }

    fn from_widget_value(value: &WidgetValue) -> Option<Self> {
        f64::from_widget_value(value).map(|v| v as f32)
    }
}

/// Identifier of a registered value-changed callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

impl CallbackId {
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// Backend widget object.
pub trait Widget {
    fn kind(&self) -> WidgetKind;

    fn name(&self) -> Option<String>;
    fn set_name(&self, name: Option<&str>);

    /// Caption of labels, buttons, foldouts and help boxes.
    fn text(&self) -> String;
    fn set_text(&self, text: &str);

    fn display(&self) -> bool;
    fn set_display(&self, display: bool);

    fn enabled(&self) -> bool;
    fn set_enabled(&self, enabled: bool);

    fn value(&self) -> WidgetValue;

    /// Assign the value as a user edit would, firing value-changed callbacks
    /// when it differs from the current one.
    fn set_value(&self, value: WidgetValue);

    /// Assign the value without firing value-changed callbacks.
    fn set_value_without_notify(&self, value: WidgetValue);

    fn child_count(&self) -> usize;
    fn child_at(&self, index: usize) -> Option<WidgetHandle>;
    fn child_named(&self, name: &str) -> Option<WidgetHandle>;
    fn index_of(&self, child: &WidgetHandle) -> Option<usize>;
    fn add_child(&self, child: WidgetHandle);

    /// Remove `child`; returns whether it was present.
    fn remove_child(&self, child: &WidgetHandle) -> bool;
    fn clear_children(&self);

    fn register_value_changed(&self, callback: ValueCallback) -> CallbackId;

    /// Returns whether the id was registered.
    fn unregister_value_changed(&self, id: CallbackId) -> bool;
}

/// Creates widgets by kind.
pub trait WidgetBackend {
    fn create(&self, kind: &WidgetKind) -> WidgetHandle;
}

/// Identity comparison of two widget handles.
#[must_use]
pub fn same_widget(a: &WidgetHandle, b: &WidgetHandle) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}
