//! Reconciler: diffs rendered trees against the live document and drives
//! component lifecycles.

use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::arena::ComponentArena;
use crate::collections::map::HashMap;
use crate::component::{
    Component, ComponentHandle, ComponentId, ComponentRecord, ComponentType, Hooks,
    LifecyclePhase,
};
use crate::dom::accessor::is_listener_name;
use crate::dom::{AccessorPatcher, Document, DomError, Event, EventPhase, NodeId};
use crate::error::{HookKind, RenderError};
use crate::options::RendererOptions;
use crate::recycler::RecyclePool;
use crate::runtime::{DefaultScheduler, Runtime};
use crate::value::{merge_into, Context, Props, RefCallback, RefTarget, Value};
use crate::vnode::{Element, Key, NodeType, VNode};

const INNER_HTML: &str = "dangerouslySetInnerHTML";
const MAX_DRAIN_ROUNDS: usize = 1024;

/// Committed tree: what was last written to the document.
#[derive(Debug)]
pub(crate) enum VDom {
    Text {
        node: NodeId,
        text: Rc<str>,
    },
    Element {
        node: NodeId,
        tag: Rc<str>,
        svg: bool,
        key: Option<Key>,
        props: Props,
        children: Vec<VDom>,
    },
    Component {
        id: ComponentId,
        key: Option<Key>,
    },
}

impl VDom {
    fn key(&self) -> Option<&Key> {
        match self {
            VDom::Text { .. } => None,
            VDom::Element { key, .. } | VDom::Component { key, .. } => key.as_ref(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RenderMode {
    Sync,
    /// Bypasses `should_component_update`.
    Force,
}

/// Outcome of one [`Renderer::drain`].
#[derive(Debug, Default)]
pub struct DrainReport {
    /// Instances rendered without a hook failure.
    pub rendered: usize,
    /// Queue entries no longer dirty, disabled or unmounted by the time
    /// their turn came.
    pub skipped: usize,
    pub failures: Vec<RenderError>,
}

impl DrainReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Folds a later report into this one.
    pub fn absorb(&mut self, other: DrainReport) {
        self.rendered += other.rendered;
        self.skipped += other.skipped;
        self.failures.extend(other.failures);
    }
}

/// Owns a document, the component arena and the render queue consumer.
pub struct Renderer<D: Document> {
    document: D,
    runtime: Runtime,
    options: RendererOptions,
    patcher: AccessorPatcher,
    pool: RecyclePool,
    components: ComponentArena,
    roots: HashMap<NodeId, VDom>,
    mounts: Vec<ComponentId>,
    failures: Vec<RenderError>,
}

impl<D: Document> Renderer<D> {
    pub fn new(document: D) -> Self {
        Self::with_runtime(document, Runtime::new(Arc::new(DefaultScheduler)))
    }

    pub fn with_runtime(document: D, runtime: Runtime) -> Self {
        Self {
            document,
            runtime,
            options: RendererOptions::default(),
            patcher: AccessorPatcher::new(),
            pool: RecyclePool::new(),
            components: ComponentArena::new(),
            roots: HashMap::default(),
            mounts: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: RendererOptions) -> Self {
        self.options = options;
        self
    }

    pub fn set_options(&mut self, options: RendererOptions) {
        self.options = options;
    }

    pub fn options(&self) -> &RendererOptions {
        &self.options
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut D {
        &mut self.document
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn patcher(&self) -> &AccessorPatcher {
        &self.patcher
    }

    pub fn pool(&self) -> &RecyclePool {
        &self.pool
    }

    pub fn handle(&self, id: ComponentId) -> Option<ComponentHandle> {
        self.record(id).map(|record| record.handle.clone())
    }

    /// Number of instances currently mounted.
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Arena slots allocated so far. Bounded by the largest number of
    /// instances mounted at once.
    pub fn component_slots(&self) -> usize {
        self.components.capacity()
    }

    /// Node rendered into `container`, if any.
    pub fn root_node(&self, container: NodeId) -> Option<NodeId> {
        self.roots.get(&container).and_then(|root| self.dom_node(root))
    }

    /// The component at the top of the tree rendered into `container`.
    pub fn root_component(&self, container: NodeId) -> Option<ComponentHandle> {
        match self.roots.get(&container)? {
            VDom::Component { id, .. } => self.handle(*id),
            _ => None,
        }
    }

    pub fn has_pending_renders(&self) -> bool {
        self.runtime.has_pending_renders()
    }

    /// Renders `vnode` into `container`, diffing against whatever the last
    /// call rendered there.
    pub fn render(&mut self, vnode: &VNode, container: NodeId) -> Result<(), RenderError> {
        let previous = self.roots.remove(&container);
        let next = self.diff(previous, vnode, &Context::default(), false, None)?;
        if let Some(node) = self.dom_node(&next) {
            if self.document.parent(node) != Some(container) {
                self.document.append_child(container, node)?;
            }
        }
        self.roots.insert(container, next);
        self.flush_mounts();
        self.finish_pass()
    }

    /// Unmounts everything rendered into `container`.
    pub fn unmount_root(&mut self, container: NodeId) -> Result<(), RenderError> {
        let root = self
            .roots
            .remove(&container)
            .ok_or(RenderError::NoRoot(container))?;
        self.recollect(root)?;
        self.finish_pass()
    }

    /// Re-renders `id` synchronously, skipping the update gate.
    pub fn force_update(&mut self, id: ComponentId) -> Result<(), RenderError> {
        self.force_update_inner(id, None)
    }

    pub fn force_update_then(
        &mut self,
        id: ComponentId,
        callback: impl FnOnce() + 'static,
    ) -> Result<(), RenderError> {
        self.force_update_inner(id, Some(Box::new(callback)))
    }

    fn force_update_inner(
        &mut self,
        id: ComponentId,
        callback: Option<Box<dyn FnOnce()>>,
    ) -> Result<(), RenderError> {
        let record = self.record(id).ok_or(RenderError::NotMounted(id))?;
        {
            let mut instance = record.shared.borrow_mut();
            if instance.base.is_none() {
                return Err(RenderError::NotMounted(id));
            }
            if let Some(callback) = callback {
                instance.render_callbacks.push(callback);
            }
        }
        self.render_component(id, RenderMode::Force)?;
        self.flush_mounts();
        self.finish_pass()
    }

    /// Renders every instance queued since the last drain, in enqueue order.
    /// A failing instance does not stop the others.
    pub fn drain(&mut self) -> DrainReport {
        let queue = self.runtime.handle().take_render_queue();
        let mut report = DrainReport::default();
        log::trace!("draining {} queued renders", queue.len());
        for (id, instance) in queue {
            let runnable = match (instance.upgrade(), self.record(id)) {
                (Some(instance), Some(record)) if Rc::ptr_eq(&instance, &record.shared) => {
                    let state = instance.borrow();
                    state.dirty && !state.disabled && state.base.is_some()
                }
                _ => false,
            };
            if !runnable {
                report.skipped += 1;
                continue;
            }
            let failures_before = self.failures.len();
            if let Err(err) = self.render_component(id, RenderMode::Sync) {
                log::error!("render of {id} aborted: {err}");
                self.failures.push(RenderError::Dom(err));
            }
            self.flush_mounts();
            if self.failures.len() == failures_before {
                report.rendered += 1;
            }
            report.failures.append(&mut self.failures);
        }
        report
    }

    /// Drains until no renders are pending.
    pub fn drain_until_idle(&mut self) -> DrainReport {
        let mut total = DrainReport::default();
        for _ in 0..MAX_DRAIN_ROUNDS {
            if !self.runtime.has_pending_renders() {
                return total;
            }
            total.absorb(self.drain());
        }
        log::warn!("render queue still busy after {MAX_DRAIN_ROUNDS} drains");
        total
    }

    /// Routes `event` from the root down to `target` through capture
    /// listeners, then back up through bubble listeners.
    pub fn dispatch_event(&self, target: NodeId, mut event: Event) -> Event {
        event.target = Some(target);
        if let Some(transform) = &self.options.event {
            event = transform(event);
        }
        let event_type: Rc<str> = Rc::from(event.event_type.to_ascii_lowercase());
        let mut path = Vec::new();
        let mut current = Some(target);
        while let Some(node) = current {
            path.push(node);
            current = self.document.parent(node);
        }
        for &node in path.iter().rev() {
            if event.is_propagation_stopped() {
                return event;
            }
            let phase = if node == target {
                EventPhase::AtTarget
            } else {
                EventPhase::Capturing
            };
            self.invoke_listener(node, &event_type, true, &event, phase);
        }
        for &node in &path {
            if event.is_propagation_stopped() {
                break;
            }
            let phase = if node == target {
                EventPhase::AtTarget
            } else {
                EventPhase::Bubbling
            };
            self.invoke_listener(node, &event_type, false, &event, phase);
        }
        event
    }

    fn invoke_listener(
        &self,
        node: NodeId,
        event_type: &str,
        capture: bool,
        event: &Event,
        phase: EventPhase,
    ) {
        let Some(listener) = self.patcher.listener(node, event_type, capture).cloned() else {
            return;
        };
        event.enter(node, phase);
        let receiver = if self.options.event_bind {
            listener.owner.as_ref()
        } else {
            None
        };
        listener.handler.call(event, receiver);
    }

    /// Releases the cached nodes of every pooled instance.
    pub fn clear_pool(&mut self) -> Result<usize, RenderError> {
        let records = self.pool.clear();
        let count = records.len();
        for mut record in records {
            if let Some(cached) = record.next_vdom.take() {
                self.recollect(cached)?;
            }
        }
        Ok(count)
    }

    fn record(&self, id: ComponentId) -> Option<&ComponentRecord> {
        self.components.get(id)
    }

    fn record_mut(&mut self, id: ComponentId) -> Option<&mut ComponentRecord> {
        self.components.get_mut(id)
    }

    fn dom_node(&self, vdom: &VDom) -> Option<NodeId> {
        match vdom {
            VDom::Text { node, .. } | VDom::Element { node, .. } => Some(*node),
            VDom::Component { id, .. } => self
                .record(*id)
                .and_then(|record| record.shared.borrow().base),
        }
    }

    fn finish_pass(&mut self) -> Result<(), RenderError> {
        let mut failures = std::mem::take(&mut self.failures).into_iter();
        match failures.next() {
            Some(first) => {
                for rest in failures {
                    log::debug!("additional failure in pass: {rest}");
                }
                Err(first)
            }
            None => Ok(()),
        }
    }

    fn with_behavior<R>(
        &mut self,
        id: ComponentId,
        f: impl FnOnce(&mut dyn Component, &ComponentHandle) -> R,
    ) -> Option<R> {
        let record = self.record_mut(id)?;
        Some(f(record.behavior.as_mut(), &record.handle))
    }

    /// Runs a fallible hook, recording its failure instead of propagating.
    fn call_hook<R>(
        &mut self,
        id: ComponentId,
        hook: HookKind,
        f: impl FnOnce(&mut dyn Component, &ComponentHandle) -> anyhow::Result<R>,
    ) -> Option<R> {
        match self.with_behavior(id, f)? {
            Ok(value) => Some(value),
            Err(source) => {
                let name = self.record(id).map(ComponentRecord::name).unwrap_or("<gone>");
                log::error!("{name} ({id}) failed in {hook}: {source:#}");
                self.failures.push(RenderError::Hook {
                    component: id,
                    name,
                    hook,
                    source,
                });
                None
            }
        }
    }

    fn flush_mounts(&mut self) {
        for id in std::mem::take(&mut self.mounts) {
            let Some(record) = self.record(id) else {
                continue;
            };
            if record.shared.borrow().base.is_none() {
                continue;
            }
            log::debug!("mounted {} as {id}", record.name());
            if record.hooks.contains(Hooks::DID_MOUNT) {
                self.call_hook(id, HookKind::DidMount, |component, this| {
                    component.component_did_mount(this)
                });
            }
        }
    }

    fn diff(
        &mut self,
        old: Option<VDom>,
        vnode: &VNode,
        context: &Context,
        svg: bool,
        owner: Option<&ComponentHandle>,
    ) -> Result<VDom, DomError> {
        match vnode {
            VNode::Text(text) => match old {
                Some(VDom::Text {
                    node,
                    text: previous,
                }) => {
                    if previous != *text {
                        self.document.set_text(node, text)?;
                    }
                    Ok(VDom::Text {
                        node,
                        text: text.clone(),
                    })
                }
                other => {
                    let anchor = self.take_anchor(other)?;
                    let node = self.document.create_text(text);
                    self.place_at(anchor, node)?;
                    Ok(VDom::Text {
                        node,
                        text: text.clone(),
                    })
                }
            },
            VNode::Element(element) => match &element.node_type {
                NodeType::Component(component_type) => {
                    self.build_component(old, element, *component_type, context, svg, owner)
                }
                NodeType::Tag(tag) => self.diff_element(old, element, tag, context, svg, owner),
            },
        }
    }

    /// Remembers where `old` sits in its parent, then recollects it.
    fn take_anchor(
        &mut self,
        old: Option<VDom>,
    ) -> Result<Option<(NodeId, Option<NodeId>)>, DomError> {
        let Some(old) = old else {
            return Ok(None);
        };
        let anchor = self.dom_node(&old).and_then(|node| {
            let parent = self.document.parent(node)?;
            Some((parent, self.document.next_sibling(node)))
        });
        self.recollect(old)?;
        Ok(anchor)
    }

    fn place_at(
        &mut self,
        anchor: Option<(NodeId, Option<NodeId>)>,
        node: NodeId,
    ) -> Result<(), DomError> {
        if let Some((parent, before)) = anchor {
            self.document.insert_before(parent, node, before)?;
        }
        Ok(())
    }

    fn diff_element(
        &mut self,
        old: Option<VDom>,
        element: &Element,
        tag: &Rc<str>,
        context: &Context,
        svg: bool,
        owner: Option<&ComponentHandle>,
    ) -> Result<VDom, DomError> {
        let svg = match &**tag {
            "svg" => true,
            "foreignObject" => false,
            _ => svg,
        };
        let (node, old_props, old_children) = match old {
            Some(VDom::Element {
                node,
                tag: previous,
                svg: was_svg,
                props,
                children,
                ..
            }) if previous == *tag && was_svg == svg => (node, props, children),
            other => {
                let anchor = self.take_anchor(other)?;
                let node = self.document.create_element(tag, svg);
                self.place_at(anchor, node)?;
                (node, Props::default(), Vec::new())
            }
        };
        let html_first =
            element.props.contains_key(INNER_HTML) || old_props.contains_key(INNER_HTML);
        if html_first {
            self.diff_attributes(node, &old_props, &element.props, svg, owner)?;
        }
        let children =
            self.diff_children(node, old_children, &element.children, context, svg, owner)?;
        if !html_first {
            self.diff_attributes(node, &old_props, &element.props, svg, owner)?;
        }
        Ok(VDom::Element {
            node,
            tag: tag.clone(),
            svg,
            key: element.key.clone(),
            props: element.props.clone(),
            children,
        })
    }

    /// Only names whose value changed reach the patcher.
    fn diff_attributes(
        &mut self,
        node: NodeId,
        old: &Props,
        props: &Props,
        svg: bool,
        owner: Option<&ComponentHandle>,
    ) -> Result<(), DomError> {
        for (name, previous) in old {
            if &**name == "children" || props.contains_key(name) || previous.is_null() {
                continue;
            }
            self.patcher.set_accessor(
                &mut self.document,
                node,
                name,
                Some(previous),
                None,
                svg,
                owner,
            )?;
        }
        for (name, value) in props {
            if &**name == "children" {
                continue;
            }
            let previous = old.get(name);
            if previous == Some(value) {
                if is_listener_name(name) && self.patcher.rebind_owner(node, name, owner) {
                    log::trace!("rebound {name} on node {node} to its new owner");
                }
                continue;
            }
            self.patcher.set_accessor(
                &mut self.document,
                node,
                name,
                previous,
                Some(value),
                svg,
                owner,
            )?;
        }
        Ok(())
    }

    fn diff_children(
        &mut self,
        parent: NodeId,
        old_children: Vec<VDom>,
        children: &[VNode],
        context: &Context,
        svg: bool,
        owner: Option<&ComponentHandle>,
    ) -> Result<Vec<VDom>, DomError> {
        let mut keyed: IndexMap<Key, VDom> = IndexMap::new();
        let mut unkeyed: Vec<Option<VDom>> = Vec::new();
        let mut duplicates = Vec::new();
        for child in old_children {
            match child.key().cloned() {
                Some(key) => {
                    if let Some(duplicate) = keyed.insert(key, child) {
                        duplicates.push(duplicate);
                    }
                }
                None => unkeyed.push(Some(child)),
            }
        }

        let mut min = 0;
        let mut next = Vec::with_capacity(children.len());
        for (index, vnode) in children.iter().enumerate() {
            let matched = match vnode.key() {
                Some(key) => keyed.shift_remove(key),
                None => {
                    let mut found = None;
                    for slot in min..unkeyed.len() {
                        let candidate = unkeyed[slot]
                            .as_ref()
                            .is_some_and(|old| self.same_node_type(old, vnode));
                        if candidate {
                            found = unkeyed[slot].take();
                            break;
                        }
                    }
                    while min < unkeyed.len() && unkeyed[min].is_none() {
                        min += 1;
                    }
                    found
                }
            };
            let child = self.diff(matched, vnode, context, svg, owner)?;
            if let Some(node) = self.dom_node(&child) {
                let current = self.document.child_at(parent, index);
                if current != Some(node) {
                    self.document.insert_before(parent, node, current)?;
                }
            }
            next.push(child);
        }

        let leftovers = keyed
            .into_values()
            .chain(unkeyed.into_iter().flatten())
            .chain(duplicates);
        for leftover in leftovers {
            self.recollect(leftover)?;
        }
        Ok(next)
    }

    fn same_node_type(&self, old: &VDom, vnode: &VNode) -> bool {
        match (old, vnode) {
            (VDom::Text { .. }, VNode::Text(_)) => true,
            (VDom::Element { tag, .. }, VNode::Element(element)) => {
                element.node_type.tag_name() == Some(&**tag)
            }
            (VDom::Component { id, .. }, VNode::Element(element)) => {
                match (self.record(*id), element.node_type.type_key()) {
                    (Some(record), Some(key)) => record.type_key() == key,
                    _ => false,
                }
            }
            _ => false,
        }
    }

    /// Props a component instance sees: element props with defaults filled
    /// in and children attached, minus `ref`.
    fn component_props(
        element: &Element,
        component_type: &ComponentType,
    ) -> (Props, Option<RefCallback>) {
        let mut props = element.props.clone();
        for (name, value) in component_type.default_props() {
            props.entry(name).or_insert(value);
        }
        if !element.children.is_empty() {
            props.insert(Rc::from("children"), Value::Nodes(element.children.clone()));
        }
        props.shift_remove("key");
        let component_ref = match props.shift_remove("ref") {
            Some(Value::Ref(callback)) => Some(callback),
            _ => None,
        };
        (props, component_ref)
    }

    fn build_component(
        &mut self,
        old: Option<VDom>,
        element: &Element,
        component_type: ComponentType,
        context: &Context,
        svg: bool,
        owner: Option<&ComponentHandle>,
    ) -> Result<VDom, DomError> {
        let (props, component_ref) = Self::component_props(element, &component_type);
        if let Some(VDom::Component { id, .. }) = &old {
            let id = *id;
            if let Some(record) = self.record_mut(id) {
                if record.type_key() == component_type.type_key() {
                    record.component_ref = component_ref;
                    {
                        let mut instance = record.shared.borrow_mut();
                        instance.key = element.key.clone();
                        instance.owner = owner.cloned();
                    }
                    self.set_component_props(id, props, context.clone())?;
                    return Ok(VDom::Component {
                        id,
                        key: element.key.clone(),
                    });
                }
            }
        }

        let anchor = self.take_anchor(old)?;
        let id = self.components.vacant_id();
        let mut record = self.pool.acquire(
            component_type,
            &props,
            context,
            id,
            self.runtime.handle(),
            owner.cloned(),
        );
        record.component_ref = component_ref;
        record.svg = svg;
        record.shared.borrow_mut().key = element.key.clone();
        self.components.insert(record);
        self.set_component_props(id, props, context.clone())?;
        if let Some(base) = self.record(id).and_then(|record| record.shared.borrow().base) {
            self.place_at(anchor, base)?;
        }
        Ok(VDom::Component {
            id,
            key: element.key.clone(),
        })
    }

    fn set_component_props(
        &mut self,
        id: ComponentId,
        props: Props,
        context: Context,
    ) -> Result<(), DomError> {
        let Some(record) = self.record(id) else {
            return Ok(());
        };
        let hooks = record.hooks;
        let shared = record.shared.clone();
        let mounted = {
            let mut instance = shared.borrow_mut();
            if instance.disabled {
                return Ok(());
            }
            instance.disabled = true;
            instance.base.is_some()
        };

        if !mounted {
            shared.borrow_mut().phase = LifecyclePhase::Mounting;
            if hooks.contains(Hooks::WILL_MOUNT) {
                self.call_hook(id, HookKind::WillMount, |component, this| {
                    component.component_will_mount(this)
                });
            }
        } else if hooks.contains(Hooks::WILL_RECEIVE_PROPS) {
            self.call_hook(id, HookKind::WillReceiveProps, |component, this| {
                component.component_will_receive_props(this, &props, &context)
            });
        }

        {
            let mut instance = shared.borrow_mut();
            if instance.context != context {
                if instance.prev_context.is_none() {
                    instance.prev_context = Some(std::mem::take(&mut instance.context));
                }
                instance.context = context;
            }
            if instance.prev_props.is_none() {
                instance.prev_props = Some(std::mem::take(&mut instance.props));
            }
            instance.props = props;
            instance.disabled = false;
        }

        self.render_component(id, RenderMode::Sync)?;

        if let Some(record) = self.record(id) {
            if let Some(component_ref) = record.component_ref.clone() {
                component_ref.call(Some(RefTarget::Component(record.handle.clone())));
            }
        }
        Ok(())
    }

    fn render_component(&mut self, id: ComponentId, mode: RenderMode) -> Result<(), DomError> {
        let Some(record) = self.record(id) else {
            return Ok(());
        };
        let hooks = record.hooks;
        let shared = record.shared.clone();
        let handle = record.handle.clone();
        let (props, state, context, is_update) = {
            let instance = shared.borrow();
            if instance.disabled {
                return Ok(());
            }
            (
                instance.props.clone(),
                instance.state.clone(),
                instance.context.clone(),
                instance.base.is_some(),
            )
        };

        let mut skip = false;
        if is_update {
            shared.borrow_mut().phase = LifecyclePhase::Updating;
            if hooks.contains(Hooks::SHOULD_UPDATE) {
                if mode != RenderMode::Force {
                    skip = !self
                        .with_behavior(id, |component, this| {
                            component.should_component_update(this, &props, &state, &context)
                        })
                        .unwrap_or(true);
                }
            } else if hooks.contains(Hooks::WILL_UPDATE) {
                self.call_hook(id, HookKind::WillUpdate, |component, this| {
                    component.component_will_update(this, &props, &state, &context)
                });
            }
        }

        let (prev_props, prev_state, prev_context) = {
            let mut instance = shared.borrow_mut();
            instance.dirty = false;
            (
                instance.prev_props.take().unwrap_or_else(|| props.clone()),
                instance.prev_state.take().unwrap_or_else(|| state.clone()),
                instance.prev_context.take().unwrap_or_else(|| context.clone()),
            )
        };

        let mut failed = false;
        if skip {
            log::trace!("{id} skipped by should_component_update");
        } else {
            let rendered = self.call_hook(id, HookKind::Render, |component, _| {
                component.render(&props, &state, &context)
            });
            failed = rendered.is_none();
            if !failed || !is_update {
                let vnode = rendered.flatten().unwrap_or_else(|| VNode::text(""));
                self.commit(id, &vnode, &context, &handle, hooks)?;
            }
        }

        if let Some(record) = self.record(id) {
            record.set_phase(LifecyclePhase::Mounted);
        }
        if !is_update {
            self.mounts.push(id);
        } else if !skip && !failed && hooks.contains(Hooks::DID_UPDATE) {
            self.call_hook(id, HookKind::DidUpdate, |component, this| {
                component.component_did_update(this, &prev_props, &prev_state, &prev_context)
            });
        }

        let callbacks = std::mem::take(&mut shared.borrow_mut().render_callbacks);
        for callback in callbacks {
            callback();
        }
        Ok(())
    }

    /// Diffs `vnode` against the instance's committed (or recycled) tree and
    /// stores the result as its new base.
    fn commit(
        &mut self,
        id: ComponentId,
        vnode: &VNode,
        context: &Context,
        handle: &ComponentHandle,
        hooks: Hooks,
    ) -> Result<(), DomError> {
        let mut child_context = context.clone();
        if hooks.contains(Hooks::CHILD_CONTEXT) {
            if let Some(record) = self.record(id) {
                merge_into(&mut child_context, record.behavior.child_context(handle));
            }
        }
        let Some(record) = self.record_mut(id) else {
            return Ok(());
        };
        let previous = record.vdom.take().or_else(|| record.next_vdom.take());
        let svg = record.svg;
        let previous_child = record.child_component;

        let next = self.diff(previous, vnode, &child_context, svg, Some(handle))?;

        let child = match &next {
            VDom::Component { id: child, .. } => Some(*child),
            _ => None,
        };
        if let Some(child) = child {
            if let Some(child_record) = self.record_mut(child) {
                child_record.parent_component = Some(id);
            }
        }
        if previous_child != child {
            log::trace!("{id} now wraps {child:?}");
        }
        let base = self.dom_node(&next);
        if let Some(record) = self.record_mut(id) {
            record.child_component = child;
            record.vdom = Some(next);
            record.shared.borrow_mut().base = base;
        }
        self.propagate_base(id, base);
        Ok(())
    }

    /// Higher-order parents share their child's root node.
    fn propagate_base(&mut self, id: ComponentId, base: Option<NodeId>) {
        let mut current = id;
        while let Some(parent) = self.record(current).and_then(|record| record.parent_component)
        {
            let Some(record) = self.record(parent) else {
                break;
            };
            if record.child_component != Some(current) {
                break;
            }
            record.shared.borrow_mut().base = base;
            current = parent;
        }
    }

    fn unmount_component(&mut self, id: ComponentId) -> Result<(), DomError> {
        let Some(record) = self.record(id) else {
            return Ok(());
        };
        let hooks = record.hooks;
        {
            let mut instance = record.shared.borrow_mut();
            instance.disabled = true;
            instance.phase = LifecyclePhase::Unmounting;
        }
        log::debug!("unmounting {} ({id})", record.name());
        if hooks.contains(Hooks::WILL_UNMOUNT) {
            self.with_behavior(id, |component, this| component.component_will_unmount(this));
        }

        let Some(mut record) = self.components.remove(id) else {
            return Ok(());
        };
        record.shared.borrow_mut().base = None;
        match record.vdom.take() {
            Some(VDom::Component { id: inner, .. }) => self.unmount_component(inner)?,
            Some(VDom::Element {
                node,
                tag,
                svg,
                key,
                mut props,
                children,
            }) => {
                for child in children {
                    self.recollect(child)?;
                }
                if let Some(Value::Ref(element_ref)) = props.shift_remove("ref") {
                    element_ref.call(None);
                }
                self.document.remove_node(node)?;
                record.next_vdom = Some(VDom::Element {
                    node,
                    tag,
                    svg,
                    key,
                    props,
                    children: Vec::new(),
                });
            }
            Some(text @ VDom::Text { .. }) => {
                if let VDom::Text { node, .. } = &text {
                    self.document.remove_node(*node)?;
                }
                record.next_vdom = Some(text);
            }
            None => {}
        }
        if let Some(component_ref) = record.component_ref.take() {
            component_ref.call(None);
        }
        record.parent_component = None;
        record.child_component = None;
        record.set_phase(LifecyclePhase::Recycled);
        self.pool.collect(record);
        Ok(())
    }

    /// Tears down a committed subtree: components are unmounted into the
    /// pool, plain nodes are detached and released.
    fn recollect(&mut self, vdom: VDom) -> Result<(), DomError> {
        match vdom {
            VDom::Component { id, .. } => self.unmount_component(id),
            VDom::Text { node, .. } => {
                self.document.remove_node(node)?;
                self.document.release(node);
                Ok(())
            }
            VDom::Element {
                node,
                props,
                children,
                ..
            } => {
                if let Some(Value::Ref(element_ref)) = props.get("ref") {
                    element_ref.call(None);
                }
                for child in children {
                    self.recollect(child)?;
                }
                self.patcher.forget_node(node);
                self.document.remove_node(node)?;
                self.document.release(node);
                Ok(())
            }
        }
    }
}

impl<D: Document + std::fmt::Debug> std::fmt::Debug for Renderer<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("document", &self.document)
            .field("options", &self.options)
            .field("components", &self.component_count())
            .field("pool", &self.pool)
            .field("roots", &self.roots.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/renderer_tests.rs"]
mod tests;
