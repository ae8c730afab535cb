use std::fmt;

use thiserror::Error;

use crate::component::ComponentId;
use crate::dom::{DomError, NodeId};

/// Which user callback failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    Render,
    WillMount,
    DidMount,
    WillReceiveProps,
    WillUpdate,
    DidUpdate,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HookKind::Render => "render",
            HookKind::WillMount => "component_will_mount",
            HookKind::DidMount => "component_did_mount",
            HookKind::WillReceiveProps => "component_will_receive_props",
            HookKind::WillUpdate => "component_will_update",
            HookKind::DidUpdate => "component_did_update",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("{name} ({component}) failed in {hook}: {source}")]
    Hook {
        component: ComponentId,
        name: &'static str,
        hook: HookKind,
        #[source]
        source: anyhow::Error,
    },
    #[error(transparent)]
    Dom(#[from] DomError),
    #[error("{0} is not mounted")]
    NotMounted(ComponentId),
    #[error("no root rendered into node {0}")]
    NoRoot(NodeId),
}

impl RenderError {
    pub fn component(&self) -> Option<ComponentId> {
        match self {
            RenderError::Hook { component, .. } | RenderError::NotMounted(component) => {
                Some(*component)
            }
            RenderError::Dom(_) | RenderError::NoRoot(_) => None,
        }
    }

    pub fn hook(&self) -> Option<HookKind> {
        match self {
            RenderError::Hook { hook, .. } => Some(*hook),
            _ => None,
        }
    }
}
