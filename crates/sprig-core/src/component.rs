//! Component trait, per-instance state and the handle application code uses
//! to talk to a mounted instance.

use std::any::{type_name, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use bitflags::bitflags;

use crate::dom::{Event, NodeId};
use crate::renderer::VDom;
use crate::runtime::RuntimeHandle;
use crate::value::{merge_into, Context, Props, RefCallback, State, Value};
use crate::vnode::{Key, VNode};

/// Handle into the renderer's component arena.
///
/// Slots are reused once their instance unmounts; the generation tells a
/// stale id apart from the slot's current occupant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId {
    pub(crate) index: usize,
    pub(crate) generation: u32,
}

impl ComponentId {
    pub const fn new(index: usize) -> Self {
        Self::with_generation(index, 0)
    }

    pub const fn with_generation(index: usize, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(self) -> usize {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "component#{}v{}", self.index, self.generation)
    }
}

bitflags! {
    /// Lifecycle hooks a component type implements. Computed once per
    /// instance; the reconciler only invokes hooks whose flag is set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Hooks: u16 {
        const WILL_MOUNT = 1 << 0;
        const DID_MOUNT = 1 << 1;
        const WILL_UNMOUNT = 1 << 2;
        const WILL_RECEIVE_PROPS = 1 << 3;
        /// Declaring the update gate disables `component_will_update`.
        const SHOULD_UPDATE = 1 << 4;
        const WILL_UPDATE = 1 << 5;
        const DID_UPDATE = 1 << 6;
        const CHILD_CONTEXT = 1 << 7;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Constructed,
    Mounting,
    Mounted,
    Updating,
    Unmounting,
    Recycled,
}

pub type RenderResult = anyhow::Result<Option<VNode>>;

/// Behaviour of a component. Every hook has a no-op default; the reconciler
/// only calls the ones named in [`Component::hooks`].
///
/// Hooks receive the instance's [`ComponentHandle`] and must not hold a
/// borrow across calls back into it.
pub trait Component: 'static {
    fn hooks(&self) -> Hooks {
        Hooks::empty()
    }

    fn initial_state(&self, _props: &Props) -> State {
        State::default()
    }

    fn render(&mut self, _props: &Props, _state: &State, _context: &Context) -> RenderResult {
        log::warn!("{} does not override render; rendering nothing", type_name::<Self>());
        Ok(None)
    }

    fn component_will_mount(&mut self, _this: &ComponentHandle) -> anyhow::Result<()> {
        Ok(())
    }

    fn component_did_mount(&mut self, _this: &ComponentHandle) -> anyhow::Result<()> {
        Ok(())
    }

    fn component_will_unmount(&mut self, _this: &ComponentHandle) {}

    fn component_will_receive_props(
        &mut self,
        _this: &ComponentHandle,
        _next_props: &Props,
        _next_context: &Context,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn should_component_update(
        &mut self,
        _this: &ComponentHandle,
        _next_props: &Props,
        _next_state: &State,
        _next_context: &Context,
    ) -> bool {
        true
    }

    fn component_will_update(
        &mut self,
        _this: &ComponentHandle,
        _next_props: &Props,
        _next_state: &State,
        _next_context: &Context,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn component_did_update(
        &mut self,
        _this: &ComponentHandle,
        _prev_props: &Props,
        _prev_state: &State,
        _prev_context: &Context,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Values merged over the inherited context for every descendant.
    fn child_context(&self, _this: &ComponentHandle) -> Context {
        Context::default()
    }
}

/// Construction side of a class component.
pub trait ComponentClass: Component + Sized {
    fn create(props: &Props, context: &Context) -> Self;

    /// Filled into props the parent leaves unset.
    fn default_props() -> Props {
        Props::default()
    }
}

pub type RenderFn = fn(&Props, &Context) -> RenderResult;

/// A plain function used as a component.
#[derive(Clone, Copy)]
pub struct FunctionComponent {
    name: &'static str,
    render: RenderFn,
}

impl FunctionComponent {
    pub fn new(name: &'static str, render: RenderFn) -> Self {
        Self { name, render }
    }
}

#[derive(Clone, Copy)]
pub struct ClassComponent {
    type_id: TypeId,
    name: &'static str,
    construct: fn(&Props, &Context) -> Box<dyn Component>,
    default_props: fn() -> Props,
}

impl ClassComponent {
    pub fn of<T: ComponentClass>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
            construct: construct_boxed::<T>,
            default_props: T::default_props,
        }
    }
}

fn construct_boxed<T: ComponentClass>(props: &Props, context: &Context) -> Box<dyn Component> {
    Box::new(T::create(props, context))
}

/// Identity of a component type. Two distinct types never share a key even
/// when their display names collide.
///
/// Function components are keyed by their registered name together with the
/// function's address. Rust does not promise a function a single unique
/// address: identical bodies may be merged, and one function may get
/// different addresses in different codegen units. The name keeps merged
/// functions apart; a function split across codegen units can still miss
/// the pool or remount where it would otherwise have updated. Register each
/// function component once and share the resulting [`ComponentType`] when
/// that matters, or use a class component, which is keyed by `TypeId`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeKey {
    Class(TypeId),
    Function { name: &'static str, address: usize },
}

/// Function and class components, told apart once when the node type is
/// built rather than on every render.
#[derive(Clone, Copy)]
pub enum ComponentType {
    Function(FunctionComponent),
    Class(ClassComponent),
}

impl ComponentType {
    pub fn class<T: ComponentClass>() -> Self {
        ComponentType::Class(ClassComponent::of::<T>())
    }

    pub fn function(name: &'static str, render: RenderFn) -> Self {
        ComponentType::Function(FunctionComponent::new(name, render))
    }

    pub fn type_key(&self) -> TypeKey {
        match self {
            ComponentType::Function(function) => TypeKey::Function {
                name: function.name,
                address: function.render as usize,
            },
            ComponentType::Class(class) => TypeKey::Class(class.type_id),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ComponentType::Function(function) => function.name,
            ComponentType::Class(class) => class.name,
        }
    }

    pub fn default_props(&self) -> Props {
        match self {
            ComponentType::Function(_) => Props::default(),
            ComponentType::Class(class) => (class.default_props)(),
        }
    }

    pub(crate) fn construct(&self, props: &Props, context: &Context) -> Box<dyn Component> {
        match self {
            ComponentType::Function(function) => Box::new(FunctionAdapter {
                render: function.render,
            }),
            ComponentType::Class(class) => (class.construct)(props, context),
        }
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComponentType").field(&self.name()).finish()
    }
}

/// Gives a function component the same instance shape as a class one.
struct FunctionAdapter {
    render: RenderFn,
}

impl Component for FunctionAdapter {
    fn render(&mut self, props: &Props, _state: &State, context: &Context) -> RenderResult {
        (self.render)(props, context)
    }
}

pub type RenderCallback = Box<dyn FnOnce()>;

/// Mutable per-instance data shared between the renderer and handles.
pub(crate) struct Instance {
    pub(crate) props: Props,
    pub(crate) state: State,
    pub(crate) context: Context,
    pub(crate) prev_props: Option<Props>,
    pub(crate) prev_state: Option<State>,
    pub(crate) prev_context: Option<Context>,
    pub(crate) dirty: bool,
    pub(crate) disabled: bool,
    pub(crate) render_callbacks: Vec<RenderCallback>,
    pub(crate) base: Option<NodeId>,
    pub(crate) key: Option<Key>,
    pub(crate) phase: LifecyclePhase,
    /// Emission context: the component whose render produced this one.
    pub(crate) owner: Option<ComponentHandle>,
}

/// Renderer-side record of one component instance.
pub(crate) struct ComponentRecord {
    pub(crate) component_type: ComponentType,
    pub(crate) behavior: Box<dyn Component>,
    pub(crate) hooks: Hooks,
    pub(crate) shared: Rc<RefCell<Instance>>,
    pub(crate) handle: ComponentHandle,
    pub(crate) vdom: Option<VDom>,
    pub(crate) next_vdom: Option<VDom>,
    pub(crate) parent_component: Option<ComponentId>,
    pub(crate) child_component: Option<ComponentId>,
    pub(crate) component_ref: Option<RefCallback>,
    pub(crate) svg: bool,
}

impl ComponentRecord {
    pub(crate) fn new(
        id: ComponentId,
        component_type: ComponentType,
        props: &Props,
        context: &Context,
        runtime: RuntimeHandle,
        owner: Option<ComponentHandle>,
    ) -> Self {
        let behavior = component_type.construct(props, context);
        let hooks = behavior.hooks();
        let state = behavior.initial_state(props);
        let shared = Rc::new(RefCell::new(Instance {
            props: props.clone(),
            state,
            context: context.clone(),
            prev_props: None,
            prev_state: None,
            prev_context: None,
            dirty: true,
            disabled: false,
            render_callbacks: Vec::new(),
            base: None,
            key: None,
            phase: LifecyclePhase::Constructed,
            owner,
        }));
        let handle = ComponentHandle {
            id,
            instance: Rc::downgrade(&shared),
            runtime,
        };
        Self {
            component_type,
            behavior,
            hooks,
            shared,
            handle,
            vdom: None,
            next_vdom: None,
            parent_component: None,
            child_component: None,
            component_ref: None,
            svg: false,
        }
    }

    pub(crate) fn type_key(&self) -> TypeKey {
        self.component_type.type_key()
    }

    pub(crate) fn name(&self) -> &'static str {
        self.component_type.name()
    }

    pub(crate) fn set_phase(&self, phase: LifecyclePhase) {
        self.shared.borrow_mut().phase = phase;
    }
}

/// Application-facing handle to a component instance.
///
/// Holds weak references only; once the instance is gone every accessor
/// returns its empty value and `set_state` becomes a no-op.
#[derive(Clone)]
pub struct ComponentHandle {
    id: ComponentId,
    instance: Weak<RefCell<Instance>>,
    runtime: RuntimeHandle,
}

impl ComponentHandle {
    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn is_alive(&self) -> bool {
        self.instance.strong_count() > 0
    }

    pub fn props(&self) -> Props {
        self.read(|instance| instance.props.clone())
            .unwrap_or_default()
    }

    pub fn state(&self) -> State {
        self.read(|instance| instance.state.clone())
            .unwrap_or_default()
    }

    pub fn context(&self) -> Context {
        self.read(|instance| instance.context.clone())
            .unwrap_or_default()
    }

    pub fn base(&self) -> Option<NodeId> {
        self.read(|instance| instance.base).flatten()
    }

    pub fn key(&self) -> Option<Key> {
        self.read(|instance| instance.key.clone()).flatten()
    }

    pub fn phase(&self) -> Option<LifecyclePhase> {
        self.read(|instance| instance.phase)
    }

    pub fn is_dirty(&self) -> bool {
        self.read(|instance| instance.dirty).unwrap_or(false)
    }

    /// Reads a single state entry without cloning the whole map.
    pub fn state_value(&self, name: &str) -> Option<Value> {
        self.read(|instance| instance.state.get(name).cloned())
            .flatten()
    }

    pub fn prop(&self, name: &str) -> Option<Value> {
        self.read(|instance| instance.props.get(name).cloned())
            .flatten()
    }

    /// Shallow-merges `partial` into state and queues a render.
    pub fn set_state(&self, partial: State) {
        self.update_state(move |_, _| Some(partial), None);
    }

    pub fn set_state_then(&self, partial: State, callback: impl FnOnce() + 'static) {
        self.update_state(move |_, _| Some(partial), Some(Box::new(callback)));
    }

    /// Computes the partial from the current (already merged) state and props.
    /// Returning `None` or an empty map merges nothing but still queues.
    pub fn set_state_with(&self, updater: impl FnOnce(&State, &Props) -> Option<State>) {
        self.update_state(updater, None);
    }

    pub fn set_state_with_then(
        &self,
        updater: impl FnOnce(&State, &Props) -> Option<State>,
        callback: impl FnOnce() + 'static,
    ) {
        self.update_state(updater, Some(Box::new(callback)));
    }

    fn update_state(
        &self,
        updater: impl FnOnce(&State, &Props) -> Option<State>,
        callback: Option<RenderCallback>,
    ) {
        let Some(instance) = self.instance.upgrade() else {
            log::trace!("set_state on dropped {}", self.id);
            return;
        };
        {
            let mut guard = instance.borrow_mut();
            let inner = &mut *guard;
            if inner.prev_state.is_none() {
                inner.prev_state = Some(inner.state.clone());
            }
            if let Some(partial) = updater(&inner.state, &inner.props) {
                merge_into(&mut inner.state, partial);
            }
            if let Some(callback) = callback {
                inner.render_callbacks.push(callback);
            }
        }
        self.runtime.enqueue_render(self.id, &instance);
    }

    /// Invokes the `on<Name>` handler from this component's props, passing
    /// the emission context (the component that rendered this one) as the
    /// receiver. Returns whether a handler was found.
    pub fn emit(&self, name: &str, detail: Value) -> bool {
        let Some((handler, owner, base)) = self.read(|instance| {
            let handler = instance
                .props
                .get(handler_prop_name(name).as_str())
                .and_then(Value::as_handler)
                .cloned();
            (handler, instance.owner.clone(), instance.base)
        }) else {
            return false;
        };
        let Some(handler) = handler else {
            return false;
        };
        let event = Event::new(name, base).with_detail(detail);
        handler.call(&event, owner.as_ref());
        true
    }

    fn read<R>(&self, f: impl FnOnce(&Instance) -> R) -> Option<R> {
        self.instance
            .upgrade()
            .map(|instance| f(&instance.borrow()))
    }
}

impl fmt::Debug for ComponentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentHandle")
            .field("id", &self.id)
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl PartialEq for ComponentHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Weak::ptr_eq(&self.instance, &other.instance)
    }
}

fn handler_prop_name(name: &str) -> String {
    let mut chars = name.chars();
    let mut out = String::with_capacity(name.len() + 2);
    out.push_str("on");
    if let Some(first) = chars.next() {
        out.extend(first.to_uppercase());
        out.push_str(chars.as_str());
    }
    out
}

#[cfg(test)]
#[path = "tests/component_tests.rs"]
mod tests;
