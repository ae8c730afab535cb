//! In-memory [`Document`] used by tests, benchmarks and headless hosts.

use std::fmt::Write as _;

use indexmap::IndexMap;

use super::{Document, DomError, NodeId, XLINK_NS};
use crate::value::Value;

/// Element properties the memory document treats as pre-existing, so the
/// accessor patcher writes them as properties rather than attributes.
const KNOWN_PROPERTIES: &[&str] = &[
    "id",
    "value",
    "checked",
    "selected",
    "disabled",
    "hidden",
    "title",
    "href",
    "src",
    "name",
    "placeholder",
    "tabIndex",
    "htmlFor",
    "multiple",
    "readOnly",
    "type",
    "list",
    "tagName",
    "nodeName",
];

const READONLY_PROPERTIES: &[&str] = &["tagName", "nodeName"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeKind {
    Element { tag: String, svg: bool },
    Text(String),
}

#[derive(Debug, Clone)]
struct MemoryNode {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    class_name: String,
    style: IndexMap<String, String>,
    attributes: IndexMap<(Option<String>, String), String>,
    properties: IndexMap<String, Value>,
    inner_html: Option<String>,
    listeners: Vec<(String, bool)>,
}

impl MemoryNode {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            class_name: String::new(),
            style: IndexMap::new(),
            attributes: IndexMap::new(),
            properties: IndexMap::new(),
            inner_html: None,
            listeners: Vec::new(),
        }
    }

    fn is_element(&self) -> bool {
        matches!(self.kind, NodeKind::Element { .. })
    }
}

/// Counts of native calls, so tests can assert how much work a pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocumentStats {
    pub created: usize,
    pub released: usize,
    pub inserted: usize,
    pub removed: usize,
    pub text_writes: usize,
    pub class_writes: usize,
    pub style_writes: usize,
    pub inner_html_writes: usize,
    pub property_writes: usize,
    pub attribute_writes: usize,
    pub attribute_removals: usize,
    pub listeners_added: usize,
    pub listeners_removed: usize,
}

impl DocumentStats {
    /// Total of every call that changed the document.
    pub fn mutations(&self) -> usize {
        self.created
            + self.inserted
            + self.removed
            + self.text_writes
            + self.class_writes
            + self.style_writes
            + self.inner_html_writes
            + self.property_writes
            + self.attribute_writes
            + self.attribute_removals
            + self.listeners_added
            + self.listeners_removed
    }
}

#[derive(Debug, Default)]
pub struct MemoryDocument {
    nodes: Vec<Option<MemoryNode>>,
    stats: DocumentStats,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (not yet released) nodes.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> DocumentStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = DocumentStats::default();
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.node(node).is_ok()
    }

    pub fn tag_name(&self, node: NodeId) -> Option<&str> {
        match &self.node(node).ok()?.kind {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text(_) => None,
        }
    }

    pub fn text(&self, node: NodeId) -> Option<&str> {
        match &self.node(node).ok()?.kind {
            NodeKind::Text(text) => Some(text),
            NodeKind::Element { .. } => None,
        }
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.node(node)
            .map(|node| node.children.clone())
            .unwrap_or_default()
    }

    pub fn class_name(&self, node: NodeId) -> Option<&str> {
        self.node(node).ok().map(|node| node.class_name.as_str())
    }

    pub fn style_property(&self, node: NodeId, name: &str) -> Option<&str> {
        self.node(node).ok()?.style.get(name).map(String::as_str)
    }

    pub fn style_text(&self, node: NodeId) -> String {
        self.node(node)
            .map(|node| serialize_style(&node.style))
            .unwrap_or_default()
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.attribute_ns(node, None, name)
    }

    pub fn attribute_ns(&self, node: NodeId, namespace: Option<&str>, name: &str) -> Option<&str> {
        self.node(node)
            .ok()?
            .attributes
            .get(&(namespace.map(str::to_owned), name.to_owned()))
            .map(String::as_str)
    }

    pub fn property(&self, node: NodeId, name: &str) -> Option<&Value> {
        self.node(node).ok()?.properties.get(name)
    }

    pub fn inner_html(&self, node: NodeId) -> Option<&str> {
        self.node(node).ok()?.inner_html.as_deref()
    }

    pub fn has_listener(&self, node: NodeId, event: &str, capture: bool) -> bool {
        self.node(node)
            .map(|node| {
                node.listeners
                    .iter()
                    .any(|(name, phase)| name == event && *phase == capture)
            })
            .unwrap_or(false)
    }

    pub fn listener_count(&self, node: NodeId) -> usize {
        self.node(node)
            .map(|node| node.listeners.len())
            .unwrap_or(0)
    }

    /// Serialises the children of `node` as markup.
    pub fn inner_markup(&self, node: NodeId) -> String {
        let mut output = String::new();
        if let Ok(current) = self.node(node) {
            if current.children.is_empty() {
                if let Some(html) = &current.inner_html {
                    output.push_str(html);
                }
            }
            for child in &current.children {
                self.write_node(&mut output, *child);
            }
        }
        output
    }

    /// Serialises `node` and its subtree as markup.
    pub fn to_html(&self, node: NodeId) -> String {
        let mut output = String::new();
        self.write_node(&mut output, node);
        output
    }

    fn write_node(&self, output: &mut String, id: NodeId) {
        let Ok(node) = self.node(id) else {
            let _ = write!(output, "<!--missing {id}-->");
            return;
        };
        match &node.kind {
            NodeKind::Text(text) => output.push_str(&escape(text)),
            NodeKind::Element { tag, .. } => {
                output.push('<');
                output.push_str(tag);
                if !node.class_name.is_empty() {
                    let _ = write!(output, " class=\"{}\"", escape(&node.class_name));
                }
                if !node.style.is_empty() {
                    let _ = write!(output, " style=\"{}\"", escape(&serialize_style(&node.style)));
                }
                for ((namespace, name), value) in &node.attributes {
                    let prefix = match namespace.as_deref() {
                        Some(XLINK_NS) => "xlink:",
                        _ => "",
                    };
                    let _ = write!(output, " {prefix}{name}=\"{}\"", escape(value));
                }
                for (name, value) in &node.properties {
                    if matches!(value, Value::Bool(false) | Value::Null) {
                        continue;
                    }
                    if let Some(text) = value.to_attribute_string() {
                        let _ = write!(output, " {name}=\"{}\"", escape(&text));
                    }
                }
                output.push('>');
                output.push_str(&self.inner_markup(id));
                let _ = write!(output, "</{tag}>");
            }
        }
    }

    fn node(&self, id: NodeId) -> Result<&MemoryNode, DomError> {
        self.nodes
            .get(id)
            .and_then(Option::as_ref)
            .ok_or(DomError::Missing { id })
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut MemoryNode, DomError> {
        self.nodes
            .get_mut(id)
            .and_then(Option::as_mut)
            .ok_or(DomError::Missing { id })
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut MemoryNode, DomError> {
        let node = self.node_mut(id)?;
        if !node.is_element() {
            return Err(DomError::NotElement { id });
        }
        Ok(node)
    }

    fn create(&mut self, kind: NodeKind) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Some(MemoryNode::new(kind)));
        self.stats.created += 1;
        id
    }

    fn detach(&mut self, child: NodeId) -> Result<(), DomError> {
        let Some(parent) = self.node(child)?.parent else {
            return Ok(());
        };
        if let Ok(parent_node) = self.node_mut(parent) {
            parent_node.children.retain(|existing| *existing != child);
        }
        self.node_mut(child)?.parent = None;
        Ok(())
    }

    fn is_ancestor(&self, candidate: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            current = self.parent(id);
        }
        false
    }
}

impl Document for MemoryDocument {
    fn create_element(&mut self, tag: &str, svg: bool) -> NodeId {
        self.create(NodeKind::Element {
            tag: tag.to_owned(),
            svg,
        })
    }

    fn create_text(&mut self, text: &str) -> NodeId {
        self.create(NodeKind::Text(text.to_owned()))
    }

    fn set_text(&mut self, node: NodeId, text: &str) -> Result<(), DomError> {
        match &mut self.node_mut(node)?.kind {
            NodeKind::Text(current) => {
                current.clear();
                current.push_str(text);
            }
            NodeKind::Element { .. } => return Err(DomError::NotText { id: node }),
        }
        self.stats.text_writes += 1;
        Ok(())
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.insert_before(parent, child, None)
    }

    fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        before: Option<NodeId>,
    ) -> Result<(), DomError> {
        if !self.node(parent)?.is_element() {
            return Err(DomError::NotElement { id: parent });
        }
        self.node(child)?;
        if self.is_ancestor(child, parent) {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        if before == Some(child) {
            return Ok(());
        }
        if let Some(reference) = before {
            if self.node(reference)?.parent != Some(parent) {
                return Err(DomError::HierarchyRequest {
                    parent,
                    child: reference,
                });
            }
        }
        self.detach(child)?;
        let parent_node = self.node_mut(parent)?;
        let index = before
            .and_then(|reference| parent_node.children.iter().position(|id| *id == reference))
            .unwrap_or(parent_node.children.len());
        parent_node.children.insert(index, child);
        self.node_mut(child)?.parent = Some(parent);
        self.stats.inserted += 1;
        Ok(())
    }

    fn remove_node(&mut self, node: NodeId) -> Result<(), DomError> {
        match self.node(node) {
            Ok(current) if current.parent.is_some() => {
                self.detach(node)?;
                self.stats.removed += 1;
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(_) => {
                log::trace!("remove_node on released node {node}");
                Ok(())
            }
        }
    }

    fn release(&mut self, node: NodeId) {
        if self.detach(node).is_err() {
            return;
        }
        let mut pending = vec![node];
        while let Some(id) = pending.pop() {
            if let Some(slot) = self.nodes.get_mut(id) {
                if let Some(released) = slot.take() {
                    pending.extend(released.children);
                    self.stats.released += 1;
                }
            }
        }
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).ok()?.parent
    }

    fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).ok()?.children.first().copied()
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let siblings = &self.node(parent).ok()?.children;
        let index = siblings.iter().position(|id| *id == node)?;
        siblings.get(index + 1).copied()
    }

    fn child_at(&self, parent: NodeId, index: usize) -> Option<NodeId> {
        self.node(parent).ok()?.children.get(index).copied()
    }

    fn set_class_name(&mut self, node: NodeId, class: &str) -> Result<(), DomError> {
        let element = self.element_mut(node)?;
        element.class_name = class.to_owned();
        self.stats.class_writes += 1;
        Ok(())
    }

    fn set_style_text(&mut self, node: NodeId, css: &str) -> Result<(), DomError> {
        let element = self.element_mut(node)?;
        element.style = parse_style(css);
        self.stats.style_writes += 1;
        Ok(())
    }

    fn set_style_property(
        &mut self,
        node: NodeId,
        name: &str,
        value: &str,
    ) -> Result<(), DomError> {
        let element = self.element_mut(node)?;
        if value.is_empty() {
            element.style.shift_remove(name);
        } else {
            element.style.insert(name.to_owned(), value.to_owned());
        }
        self.stats.style_writes += 1;
        Ok(())
    }

    fn set_inner_html(&mut self, node: NodeId, html: &str) -> Result<(), DomError> {
        let children = std::mem::take(&mut self.element_mut(node)?.children);
        for child in children {
            if let Ok(child_node) = self.node_mut(child) {
                child_node.parent = None;
            }
        }
        let element = self.element_mut(node)?;
        element.inner_html = (!html.is_empty()).then(|| html.to_owned());
        self.stats.inner_html_writes += 1;
        Ok(())
    }

    fn has_property(&self, node: NodeId, name: &str) -> bool {
        match self.node(node) {
            Ok(current) if current.is_element() => {
                KNOWN_PROPERTIES.contains(&name) || current.properties.contains_key(name)
            }
            _ => false,
        }
    }

    fn set_property(&mut self, node: NodeId, name: &str, value: &Value) -> Result<(), DomError> {
        if READONLY_PROPERTIES.contains(&name) || value.is_callback() {
            return Err(DomError::PropertyRejected {
                id: node,
                name: name.to_owned(),
            });
        }
        let element = self.element_mut(node)?;
        element.properties.insert(name.to_owned(), value.clone());
        self.stats.property_writes += 1;
        Ok(())
    }

    fn set_attribute(
        &mut self,
        node: NodeId,
        namespace: Option<&str>,
        name: &str,
        value: &str,
    ) -> Result<(), DomError> {
        let element = self.element_mut(node)?;
        element
            .attributes
            .insert((namespace.map(str::to_owned), name.to_owned()), value.to_owned());
        self.stats.attribute_writes += 1;
        Ok(())
    }

    fn remove_attribute(
        &mut self,
        node: NodeId,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), DomError> {
        let element = self.element_mut(node)?;
        element
            .attributes
            .shift_remove(&(namespace.map(str::to_owned), name.to_owned()));
        self.stats.attribute_removals += 1;
        Ok(())
    }

    fn add_event_listener(
        &mut self,
        node: NodeId,
        event: &str,
        capture: bool,
    ) -> Result<(), DomError> {
        let current = self.node_mut(node)?;
        current.listeners.push((event.to_owned(), capture));
        self.stats.listeners_added += 1;
        Ok(())
    }

    fn remove_event_listener(
        &mut self,
        node: NodeId,
        event: &str,
        capture: bool,
    ) -> Result<(), DomError> {
        let current = self.node_mut(node)?;
        if let Some(index) = current
            .listeners
            .iter()
            .position(|(name, phase)| name == event && *phase == capture)
        {
            current.listeners.remove(index);
        }
        self.stats.listeners_removed += 1;
        Ok(())
    }
}

fn parse_style(css: &str) -> IndexMap<String, String> {
    css.split(';')
        .filter_map(|declaration| {
            let (name, value) = declaration.split_once(':')?;
            let (name, value) = (name.trim(), value.trim());
            (!name.is_empty() && !value.is_empty()).then(|| (name.to_owned(), value.to_owned()))
        })
        .collect()
}

fn serialize_style(style: &IndexMap<String, String>) -> String {
    style
        .iter()
        .map(|(name, value)| format!("{name}: {value};"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
#[path = "../tests/memory_document_tests.rs"]
mod tests;
