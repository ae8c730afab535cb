//! Virtual node descriptors and the `h` factory that builds them.

use std::fmt;
use std::rc::Rc;

use crate::component::{ComponentType, TypeKey};
use crate::value::Props;

/// Sibling identity hint used to match children across passes.
pub type Key = Rc<str>;

/// Immutable description of desired UI. Cloning is cheap.
#[derive(Clone, PartialEq)]
pub enum VNode {
    Text(Rc<str>),
    Element(Rc<Element>),
}

#[derive(Clone, PartialEq)]
pub struct Element {
    pub node_type: NodeType,
    pub props: Props,
    pub children: Vec<VNode>,
    pub key: Option<Key>,
}

#[derive(Clone)]
pub enum NodeType {
    Tag(Rc<str>),
    Component(ComponentType),
}

impl NodeType {
    pub fn tag_name(&self) -> Option<&str> {
        match self {
            NodeType::Tag(tag) => Some(tag),
            NodeType::Component(_) => None,
        }
    }

    pub fn type_key(&self) -> Option<TypeKey> {
        match self {
            NodeType::Tag(_) => None,
            NodeType::Component(component) => Some(component.type_key()),
        }
    }
}

impl PartialEq for NodeType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (NodeType::Tag(a), NodeType::Tag(b)) => a == b,
            (NodeType::Component(a), NodeType::Component(b)) => a.type_key() == b.type_key(),
            _ => false,
        }
    }
}

impl fmt::Debug for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Tag(tag) => write!(f, "<{tag}>"),
            NodeType::Component(component) => write!(f, "<{}/>", component.name()),
        }
    }
}

impl From<&str> for NodeType {
    fn from(tag: &str) -> Self {
        NodeType::Tag(Rc::from(tag))
    }
}

impl From<String> for NodeType {
    fn from(tag: String) -> Self {
        NodeType::Tag(Rc::from(tag))
    }
}

impl From<ComponentType> for NodeType {
    fn from(component: ComponentType) -> Self {
        NodeType::Component(component)
    }
}

impl VNode {
    pub fn text(text: impl Into<Rc<str>>) -> Self {
        VNode::Text(text.into())
    }

    pub fn key(&self) -> Option<&Key> {
        match self {
            VNode::Text(_) => None,
            VNode::Element(element) => element.key.as_ref(),
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            VNode::Text(_) => None,
            VNode::Element(element) => Some(element),
        }
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VNode::Text(text) => write!(f, "{text:?}"),
            VNode::Element(element) => {
                let mut out = f.debug_struct("Element");
                out.field("type", &element.node_type);
                if let Some(key) = &element.key {
                    out.field("key", key);
                }
                out.field("props", &element.props)
                    .field("children", &element.children)
                    .finish()
            }
        }
    }
}

impl From<&str> for VNode {
    fn from(text: &str) -> Self {
        VNode::Text(Rc::from(text))
    }
}

impl From<String> for VNode {
    fn from(text: String) -> Self {
        VNode::Text(Rc::from(text))
    }
}

/// Builds a [`VNode`].
///
/// `key` is lifted out of `props`. Adjacent text children are joined into a
/// single text node, so `["a", "b"]` diffs like `"ab"`.
pub fn h(
    node_type: impl Into<NodeType>,
    mut props: Props,
    children: impl IntoIterator<Item = VNode>,
) -> VNode {
    let key = props.shift_remove("key").and_then(|value| value.to_key());
    let mut flattened: Vec<VNode> = Vec::new();
    for child in children {
        if let VNode::Text(text) = &child {
            if let Some(VNode::Text(previous)) = flattened.last_mut() {
                let mut joined = String::with_capacity(previous.len() + text.len());
                joined.push_str(previous);
                joined.push_str(text);
                *previous = Rc::from(joined);
                continue;
            }
        }
        flattened.push(child);
    }
    VNode::Element(Rc::new(Element {
        node_type: node_type.into(),
        props,
        children: flattened,
        key,
    }))
}

#[cfg(test)]
#[path = "tests/vnode_tests.rs"]
mod tests;
