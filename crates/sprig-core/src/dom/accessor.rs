//! Applies a single named prop change to a live node.

use std::rc::Rc;

use super::{Document, DomError, NodeId, XLINK_NS};
use crate::collections::map::HashMap;
use crate::component::ComponentHandle;
use crate::value::{EventHandler, RefTarget, Value};

/// Handler currently bound to one `(node, event, phase)` subscription.
#[derive(Clone, Debug)]
pub struct Listener {
    pub handler: EventHandler,
    pub owner: Option<ComponentHandle>,
}

type ListenerKey = (NodeId, Rc<str>, bool);

/// Patches attributes, properties, styles and event bindings.
///
/// Native subscriptions are made once per `(node, event, phase)`; swapping
/// the handler only rewrites the listener table, which dispatch reads on
/// every event.
#[derive(Default)]
pub struct AccessorPatcher {
    listeners: HashMap<ListenerKey, Listener>,
    invocations: u64,
}

impl AccessorPatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set_accessor` calls made so far.
    pub fn invocations(&self) -> u64 {
        self.invocations
    }

    pub fn listener(&self, node: NodeId, event: &str, capture: bool) -> Option<&Listener> {
        self.listeners.get(&(node, Rc::from(event), capture))
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Drops every table entry for `node` without touching the document.
    pub fn forget_node(&mut self, node: NodeId) -> usize {
        let before = self.listeners.len();
        self.listeners.retain(|(id, _, _), _| *id != node);
        before - self.listeners.len()
    }

    /// Hands the listener bound for `name` on `node` to `owner` when another
    /// instance held it. A recycled root keeps its subscriptions, so its
    /// unchanged handlers must follow the instance that adopted the node.
    /// Returns whether an owner was replaced.
    pub fn rebind_owner(
        &mut self,
        node: NodeId,
        name: &str,
        owner: Option<&ComponentHandle>,
    ) -> bool {
        let Some(key) = listener_key(node, name) else {
            return false;
        };
        let Some(listener) = self.listeners.get_mut(&key) else {
            return false;
        };
        let current = listener.owner.as_ref().map(ComponentHandle::id);
        if current == owner.map(ComponentHandle::id) {
            return false;
        }
        listener.owner = owner.cloned();
        true
    }

    /// Moves `name` on `node` from `old` to `value`. `None` and `Null` both
    /// mean the prop is unset.
    #[allow(clippy::too_many_arguments)]
    pub fn set_accessor<D: Document + ?Sized>(
        &mut self,
        document: &mut D,
        node: NodeId,
        name: &str,
        old: Option<&Value>,
        value: Option<&Value>,
        svg: bool,
        owner: Option<&ComponentHandle>,
    ) -> Result<(), DomError> {
        self.invocations += 1;
        let name = if name == "className" { "class" } else { name };
        match name {
            "key" => Ok(()),
            "ref" => {
                if let Some(Value::Ref(previous)) = old {
                    previous.call(None);
                }
                if let Some(Value::Ref(next)) = value {
                    next.call(Some(RefTarget::Node(node)));
                }
                Ok(())
            }
            "class" => {
                let class = present(value)
                    .and_then(Value::to_attribute_string)
                    .unwrap_or_default();
                document.set_class_name(node, &class)
            }
            "style" => set_style(document, node, old, value),
            "dangerouslySetInnerHTML" => {
                let html = present(value).and_then(inner_html).unwrap_or_default();
                document.set_inner_html(node, &html)
            }
            _ if is_listener_name(name) => self.set_listener(document, node, name, value, owner),
            _ if name != "list" && name != "type" && !svg && document.has_property(node, name) => {
                let written = match value {
                    None | Some(Value::Null) => Value::Str(Rc::from("")),
                    Some(value) => value.clone(),
                };
                if let Err(err) = document.set_property(node, name, &written) {
                    log::trace!("ignoring property write: {err}");
                }
                if present(value).is_none() {
                    document.remove_attribute(node, None, name)?;
                }
                Ok(())
            }
            _ => set_attribute(document, node, name, value, svg),
        }
    }

    fn set_listener<D: Document + ?Sized>(
        &mut self,
        document: &mut D,
        node: NodeId,
        name: &str,
        value: Option<&Value>,
        owner: Option<&ComponentHandle>,
    ) -> Result<(), DomError> {
        let Some(key) = listener_key(node, name) else {
            return Ok(());
        };
        let (_, event, capture) = key.clone();
        match value.and_then(Value::as_handler) {
            Some(handler) => {
                let listener = Listener {
                    handler: handler.clone(),
                    owner: owner.cloned(),
                };
                if self.listeners.insert(key, listener).is_none() {
                    document.add_event_listener(node, &event, capture)?;
                }
            }
            None => {
                if self.listeners.remove(&key).is_some() {
                    document.remove_event_listener(node, &event, capture)?;
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for AccessorPatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessorPatcher")
            .field("listeners", &self.listeners.len())
            .field("invocations", &self.invocations)
            .finish()
    }
}

pub(crate) fn is_listener_name(name: &str) -> bool {
    name.len() > 2 && name.starts_with("on")
}

/// `onClick` binds `click` in the bubble phase, `onClickCapture` in capture.
fn listener_key(node: NodeId, name: &str) -> Option<ListenerKey> {
    if !is_listener_name(name) {
        return None;
    }
    let (base, capture) = match name.strip_suffix("Capture") {
        Some(base) => (base, true),
        None => (name, false),
    };
    let event: Rc<str> = Rc::from(base[2..].to_ascii_lowercase());
    Some((node, event, capture))
}

/// Values that unset an attribute (`null` and `false`) read as `None`.
fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|value| !value.is_absent())
}

fn inner_html(value: &Value) -> Option<String> {
    match value {
        Value::Html(markup) => Some(markup.to_string()),
        Value::Map(entries) => entries
            .get("__html")
            .and_then(Value::to_attribute_string),
        _ => None,
    }
}

fn set_style<D: Document + ?Sized>(
    document: &mut D,
    node: NodeId,
    old: Option<&Value>,
    value: Option<&Value>,
) -> Result<(), DomError> {
    let old = present(old);
    let value = present(value);
    let replaces = matches!(value, None | Some(Value::Str(_)))
        || matches!(old, None | Some(Value::Str(_)));
    if replaces {
        let css = value.and_then(Value::as_str).unwrap_or_default();
        document.set_style_text(node, css)?;
    }
    let Some(Value::Style(next)) = value else {
        return Ok(());
    };
    if let Some(Value::Style(previous)) = old {
        for name in previous.keys() {
            if !next.contains_key(name) {
                document.set_style_property(node, name, "")?;
            }
        }
    }
    for (name, entry) in next {
        document.set_style_property(node, name, &style_value(name, entry))?;
    }
    Ok(())
}

fn style_value(name: &str, value: &Value) -> String {
    match value {
        Value::Number(number) if !is_non_dimensional(name) => format!("{number}px"),
        value if value.is_absent() => String::new(),
        value => value.to_attribute_string().unwrap_or_default(),
    }
}

/// Style properties that take a bare number (`opacity`, `zIndex`,
/// `flexGrow`, `lineHeight`, `order` and friends).
pub fn is_non_dimensional(name: &str) -> bool {
    const FRAGMENTS: &[&str] = &[
        "acit", "exs", "exg", "exn", "exp", "rph", "ows", "mnc", "ntw", "inec", "ineh", "zoo",
    ];
    let name = name.to_ascii_lowercase();
    name.starts_with("ord")
        || name.ends_with("ex")
        || FRAGMENTS.iter().any(|fragment| name.contains(fragment))
}

fn set_attribute<D: Document + ?Sized>(
    document: &mut D,
    node: NodeId,
    name: &str,
    value: Option<&Value>,
    svg: bool,
) -> Result<(), DomError> {
    let xlink = if svg { strip_xlink(name) } else { None };
    let (namespace, name) = match xlink {
        Some(local) => (Some(XLINK_NS), local.to_ascii_lowercase()),
        None => (None, name.to_owned()),
    };
    match present(value) {
        None => document.remove_attribute(node, namespace, &name),
        Some(value) => match value.to_attribute_string() {
            Some(text) => document.set_attribute(node, namespace, &name, &text),
            None => Ok(()),
        },
    }
}

fn strip_xlink(name: &str) -> Option<&str> {
    let rest = name.strip_prefix("xlink")?;
    let rest = rest.strip_prefix(':').unwrap_or(rest);
    (!rest.is_empty()).then_some(rest)
}

#[cfg(test)]
#[path = "../tests/accessor_tests.rs"]
mod tests;
