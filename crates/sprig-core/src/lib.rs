#![doc = r"Core of the sprig virtual-DOM engine: component lifecycle, render batching, instance recycling and the DOM accessor patcher."]

extern crate self as sprig_core;

mod arena;
pub mod collections;
pub mod component;
pub mod dom;
pub mod error;
pub mod hash;
pub mod options;
pub mod platform;
pub mod recycler;
pub mod renderer;
pub mod runtime;
pub mod value;
pub mod vnode;

pub use component::{
    ClassComponent, Component, ComponentClass, ComponentHandle, ComponentId, ComponentType,
    FunctionComponent, Hooks, LifecyclePhase, RenderFn, RenderResult, TypeKey,
};
pub use dom::{
    AccessorPatcher, Document, DocumentStats, DomError, Event, EventPhase, Listener,
    MemoryDocument, NodeId, SVG_NS, XLINK_NS,
};
pub use error::{HookKind, RenderError};
pub use options::RendererOptions;
pub use platform::RuntimeScheduler;
pub use recycler::RecyclePool;
pub use renderer::{DrainReport, Renderer};
pub use runtime::{DefaultScheduler, Runtime, RuntimeHandle};
pub use value::{
    merge_into, Context, EventHandler, Props, RefCallback, RefTarget, State, Value, ValueMap,
};
pub use vnode::{h, Element, Key, NodeType, VNode};

#[cfg(test)]
pub use runtime::TestScheduler;
