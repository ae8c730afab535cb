//! Live document abstraction the reconciler writes to.

use std::cell::Cell;
use std::rc::Rc;

use thiserror::Error;

use crate::value::Value;

pub mod accessor;
pub mod memory;

pub use accessor::{AccessorPatcher, Listener};
pub use memory::{DocumentStats, MemoryDocument};

pub type NodeId = usize;

pub const SVG_NS: &str = "http://www.w3.org/2000/svg";
pub const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
    #[error("node {id} missing")]
    Missing { id: NodeId },
    #[error("node {id} is not an element")]
    NotElement { id: NodeId },
    #[error("node {id} is not a text node")]
    NotText { id: NodeId },
    #[error("cannot insert node {child} under {parent}")]
    HierarchyRequest { parent: NodeId, child: NodeId },
    #[error("property `{name}` rejected on node {id}")]
    PropertyRejected { id: NodeId, name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPhase {
    None,
    Capturing,
    AtTarget,
    Bubbling,
}

/// Event routed through the listener table by `Renderer::dispatch_event`.
#[derive(Debug, Clone)]
pub struct Event {
    pub event_type: Rc<str>,
    pub target: Option<NodeId>,
    pub detail: Value,
    current_target: Cell<Option<NodeId>>,
    phase: Cell<EventPhase>,
    propagation_stopped: Cell<bool>,
}

impl Event {
    pub fn new(event_type: impl Into<Rc<str>>, target: Option<NodeId>) -> Self {
        Self {
            event_type: event_type.into(),
            target,
            detail: Value::Null,
            current_target: Cell::new(None),
            phase: Cell::new(EventPhase::None),
            propagation_stopped: Cell::new(false),
        }
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = detail;
        self
    }

    pub fn current_target(&self) -> Option<NodeId> {
        self.current_target.get()
    }

    pub fn phase(&self) -> EventPhase {
        self.phase.get()
    }

    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }

    pub(crate) fn enter(&self, node: NodeId, phase: EventPhase) {
        self.current_target.set(Some(node));
        self.phase.set(phase);
    }
}

/// Native node operations. Node ids stay valid until [`Document::release`].
pub trait Document {
    fn create_element(&mut self, tag: &str, svg: bool) -> NodeId;
    fn create_text(&mut self, text: &str) -> NodeId;
    fn set_text(&mut self, node: NodeId, text: &str) -> Result<(), DomError>;

    fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError>;
    /// Inserts `child` before `before`, or appends when `before` is `None`.
    /// A child that is already attached somewhere is moved.
    fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        before: Option<NodeId>,
    ) -> Result<(), DomError>;
    /// Detaches `node` from its parent. Detached nodes are left alone.
    fn remove_node(&mut self, node: NodeId) -> Result<(), DomError>;
    /// Frees a detached node and its whole subtree.
    fn release(&mut self, node: NodeId);

    fn parent(&self, node: NodeId) -> Option<NodeId>;
    fn first_child(&self, node: NodeId) -> Option<NodeId>;
    fn next_sibling(&self, node: NodeId) -> Option<NodeId>;
    fn child_at(&self, parent: NodeId, index: usize) -> Option<NodeId>;

    fn set_class_name(&mut self, node: NodeId, class: &str) -> Result<(), DomError>;
    fn set_style_text(&mut self, node: NodeId, css: &str) -> Result<(), DomError>;
    /// An empty `value` clears the property.
    fn set_style_property(&mut self, node: NodeId, name: &str, value: &str)
        -> Result<(), DomError>;
    fn set_inner_html(&mut self, node: NodeId, html: &str) -> Result<(), DomError>;

    fn has_property(&self, node: NodeId, name: &str) -> bool;
    fn set_property(&mut self, node: NodeId, name: &str, value: &Value) -> Result<(), DomError>;
    fn set_attribute(
        &mut self,
        node: NodeId,
        namespace: Option<&str>,
        name: &str,
        value: &str,
    ) -> Result<(), DomError>;
    fn remove_attribute(
        &mut self,
        node: NodeId,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), DomError>;

    fn add_event_listener(&mut self, node: NodeId, event: &str, capture: bool)
        -> Result<(), DomError>;
    fn remove_event_listener(
        &mut self,
        node: NodeId,
        event: &str,
        capture: bool,
    ) -> Result<(), DomError>;
}
