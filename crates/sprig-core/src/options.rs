use std::fmt;
use std::rc::Rc;

use crate::dom::Event;

pub type EventTransform = Rc<dyn Fn(Event) -> Event>;

/// Per-renderer configuration.
#[derive(Clone, Default)]
pub struct RendererOptions {
    /// Applied to every event before any listener sees it.
    pub event: Option<EventTransform>,
    /// Hand the owning component's handle to event handlers.
    pub event_bind: bool,
}

impl RendererOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event(mut self, transform: impl Fn(Event) -> Event + 'static) -> Self {
        self.event = Some(Rc::new(transform));
        self
    }

    pub fn with_event_bind(mut self, enabled: bool) -> Self {
        self.event_bind = enabled;
        self
    }
}

impl fmt::Debug for RendererOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RendererOptions")
            .field("event", &self.event.is_some())
            .field("event_bind", &self.event_bind)
            .finish()
    }
}
