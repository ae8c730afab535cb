//! Dynamic values carried by props, state and context.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::component::ComponentHandle;
use crate::dom::{Event, NodeId};
use crate::vnode::VNode;

/// Insertion-ordered `name → value` mapping.
pub type ValueMap = IndexMap<Rc<str>, Value>;
pub type Props = ValueMap;
pub type State = ValueMap;
pub type Context = ValueMap;

/// Builds a [`ValueMap`] from `name => value` pairs.
///
/// ```
/// let props = sprig_core::values! { "class" => "btn", "tabIndex" => 2 };
/// assert_eq!(props.len(), 2);
/// ```
#[macro_export]
macro_rules! values {
    () => {
        $crate::ValueMap::default()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::ValueMap::default();
        $(
            map.insert(::std::rc::Rc::<str>::from($name), $crate::Value::from($value));
        )+
        map
    }};
}

#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    /// Property → value mapping for the `style` accessor.
    Style(ValueMap),
    /// Pre-sanitised markup for `dangerouslySetInnerHTML`.
    Html(Rc<str>),
    Handler(EventHandler),
    Ref(RefCallback),
    List(Vec<Value>),
    Map(ValueMap),
    /// Child descriptors handed to a component as `props.children`.
    Nodes(Vec<VNode>),
}

impl Value {
    pub fn style(entries: ValueMap) -> Self {
        Value::Style(entries)
    }

    pub fn html(markup: impl Into<Rc<str>>) -> Self {
        Value::Html(markup.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// `null` and `false` both mean "no attribute".
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Null | Value::Bool(false))
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(flag) => *flag,
            Value::Number(number) => *number != 0.0 && !number.is_nan(),
            Value::Str(text) => !text.is_empty(),
            _ => true,
        }
    }

    pub fn is_callback(&self) -> bool {
        matches!(self, Value::Handler(_) | Value::Ref(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(number) => Some(*number),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn as_handler(&self) -> Option<&EventHandler> {
        match self {
            Value::Handler(handler) => Some(handler),
            _ => None,
        }
    }

    pub fn as_nodes(&self) -> Option<&[VNode]> {
        match self {
            Value::Nodes(nodes) => Some(nodes),
            _ => None,
        }
    }

    /// Text used when the value is written as a DOM attribute or property.
    /// Callbacks and structured values have no textual form.
    pub fn to_attribute_string(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(flag) => Some(flag.to_string()),
            Value::Number(number) => Some(number.to_string()),
            Value::Str(text) | Value::Html(text) => Some(text.to_string()),
            Value::List(items) => Some(
                items
                    .iter()
                    .filter_map(Value::to_attribute_string)
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            Value::Style(_)
            | Value::Handler(_)
            | Value::Ref(_)
            | Value::Map(_)
            | Value::Nodes(_) => None,
        }
    }

    pub(crate) fn to_key(&self) -> Option<Rc<str>> {
        match self {
            Value::Str(text) => Some(text.clone()),
            Value::Number(number) => Some(Rc::from(number.to_string())),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Style(a), Value::Style(b)) => a == b,
            (Value::Html(a), Value::Html(b)) => a == b,
            (Value::Handler(a), Value::Handler(b)) => a.ptr_eq(b),
            (Value::Ref(a), Value::Ref(b)) => a.ptr_eq(b),
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Nodes(a), Value::Nodes(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(flag) => write!(f, "{flag}"),
            Value::Number(number) => write!(f, "{number}"),
            Value::Str(text) => write!(f, "{text:?}"),
            Value::Style(entries) => f.debug_tuple("Style").field(entries).finish(),
            Value::Html(markup) => f.debug_tuple("Html").field(markup).finish(),
            Value::Handler(_) => f.write_str("<handler>"),
            Value::Ref(_) => f.write_str("<ref>"),
            Value::List(items) => f.debug_list().entries(items).finish(),
            Value::Map(entries) => f.debug_map().entries(entries.iter()).finish(),
            Value::Nodes(nodes) => write!(f, "<{} nodes>", nodes.len()),
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Str(Rc::from(text))
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Str(Rc::from(text))
    }
}

impl From<Rc<str>> for Value {
    fn from(text: Rc<str>) -> Self {
        Value::Str(text)
    }
}

impl From<bool> for Value {
    fn from(flag: bool) -> Self {
        Value::Bool(flag)
    }
}

impl From<f64> for Value {
    fn from(number: f64) -> Self {
        Value::Number(number)
    }
}

macro_rules! impl_from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(number: $ty) -> Self {
                    Value::Number(number as f64)
                }
            }
        )*
    };
}

impl_from_integer!(i32, i64, u32, u64, usize);

impl From<EventHandler> for Value {
    fn from(handler: EventHandler) -> Self {
        Value::Handler(handler)
    }
}

impl From<RefCallback> for Value {
    fn from(callback: RefCallback) -> Self {
        Value::Ref(callback)
    }
}

impl From<Vec<VNode>> for Value {
    fn from(nodes: Vec<VNode>) -> Self {
        Value::Nodes(nodes)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

type HandlerFn = dyn Fn(&Event, Option<&ComponentHandle>);

/// Event callback stored in a node's listener table.
///
/// The second argument is the owning component when the renderer runs with
/// `event_bind` enabled, and `None` otherwise.
#[derive(Clone)]
pub struct EventHandler(Rc<HandlerFn>);

impl EventHandler {
    pub fn new(handler: impl Fn(&Event, Option<&ComponentHandle>) + 'static) -> Self {
        Self(Rc::new(handler))
    }

    pub fn call(&self, event: &Event, receiver: Option<&ComponentHandle>) {
        (self.0)(event, receiver)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EventHandler")
    }
}

/// What a `ref` callback is attached to.
#[derive(Clone, Debug)]
pub enum RefTarget {
    Node(NodeId),
    Component(ComponentHandle),
}

impl RefTarget {
    pub fn node(&self) -> Option<NodeId> {
        match self {
            RefTarget::Node(node) => Some(*node),
            RefTarget::Component(_) => None,
        }
    }
}

/// `ref` callback: called with `Some(target)` on attach and `None` on detach.
#[derive(Clone)]
pub struct RefCallback(Rc<dyn Fn(Option<RefTarget>)>);

impl RefCallback {
    pub fn new(callback: impl Fn(Option<RefTarget>) + 'static) -> Self {
        Self(Rc::new(callback))
    }

    pub fn call(&self, target: Option<RefTarget>) {
        (self.0)(target)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for RefCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RefCallback")
    }
}

/// Shallow merge: every key of `partial` overwrites the same key in `target`.
pub fn merge_into(target: &mut ValueMap, partial: ValueMap) {
    for (name, value) in partial {
        target.insert(name, value);
    }
}
