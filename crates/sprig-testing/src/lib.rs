//! Testing utilities and harness for sprig

pub mod testing;

pub use testing::*;

pub mod prelude {
    pub use crate::testing::*;
    pub use sprig_core::{
        h, values, Component, ComponentClass, ComponentHandle, ComponentType, Context, Document,
        EventHandler, Hooks, Props, RefCallback, RefTarget, RenderResult, State, Value, VNode,
    };
}
