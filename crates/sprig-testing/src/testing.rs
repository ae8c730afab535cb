use sprig_core::{
    ComponentHandle, Document, DrainReport, Event, MemoryDocument, NodeId, RenderError, Renderer,
    RendererOptions, VNode,
};
use sprig_runtime_std::StdRuntime;

const MAX_PUMPS: usize = 1024;

/// Headless harness for exercising sprig trees in tests.
///
/// `RenderTestRule` owns an in-memory document with a `<body>` container, a
/// renderer driven by a [`StdRuntime`], and the content last installed. It
/// counts the frames the runtime requested so tests can assert batching.
pub struct RenderTestRule {
    runtime: StdRuntime,
    renderer: Renderer<MemoryDocument>,
    container: NodeId,
    content: Option<VNode>,
    frames: usize,
}

impl RenderTestRule {
    pub fn new() -> Self {
        Self::with_options(RendererOptions::default())
    }

    pub fn with_options(options: RendererOptions) -> Self {
        let runtime = StdRuntime::new();
        let mut document = MemoryDocument::new();
        let container = document.create_element("body", false);
        let renderer = Renderer::with_runtime(document, runtime.runtime()).with_options(options);
        Self {
            runtime,
            renderer,
            container,
            content: None,
            frames: 0,
        }
    }

    /// Install `content` and render it into the container.
    pub fn set_content(&mut self, content: VNode) -> Result<(), RenderError> {
        self.content = Some(content);
        self.rerender()
    }

    /// Render the installed content again.
    pub fn rerender(&mut self) -> Result<(), RenderError> {
        match &self.content {
            Some(content) => self.renderer.render(content, self.container),
            None => Ok(()),
        }
    }

    /// Drain the render queue, frame by frame, until nothing is pending.
    /// Each drain stands in for one frame, so frames requested by renders
    /// in the middle of the pump are counted too.
    pub fn pump_until_idle(&mut self) -> DrainReport {
        let mut total = DrainReport::default();
        for _ in 0..MAX_PUMPS {
            self.poll_frame();
            if !self.renderer.has_pending_renders() {
                return total;
            }
            total.absorb(self.renderer.drain());
        }
        log::warn!("render queue still busy after {MAX_PUMPS} frames");
        total
    }

    /// Frames requested by the runtime since the rule was created.
    pub fn frames_requested(&mut self) -> usize {
        self.poll_frame();
        self.frames
    }

    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }

    pub fn container(&self) -> NodeId {
        self.container
    }

    pub fn root_node(&self) -> Option<NodeId> {
        self.renderer.root_node(self.container)
    }

    pub fn root_component(&self) -> Option<ComponentHandle> {
        self.renderer.root_component(self.container)
    }

    /// Markup currently rendered inside the container.
    pub fn html(&self) -> String {
        self.renderer.document().inner_markup(self.container)
    }

    pub fn document(&self) -> &MemoryDocument {
        self.renderer.document()
    }

    pub fn renderer(&self) -> &Renderer<MemoryDocument> {
        &self.renderer
    }

    /// Gain mutable access to the renderer for advanced scenarios.
    pub fn renderer_mut(&mut self) -> &mut Renderer<MemoryDocument> {
        &mut self.renderer
    }

    pub fn runtime(&self) -> &StdRuntime {
        &self.runtime
    }

    /// Dispatch an event of `event_type` at `target`.
    pub fn dispatch(&self, target: NodeId, event_type: &str) -> Event {
        self.renderer
            .dispatch_event(target, Event::new(event_type, None))
    }

    /// Elements with the given tag under the container, in document order.
    pub fn find_by_tag(&self, tag: &str) -> Vec<NodeId> {
        let document = self.renderer.document();
        let mut found = Vec::new();
        let mut stack = vec![self.container];
        while let Some(node) = stack.pop() {
            if node != self.container && document.tag_name(node) == Some(tag) {
                found.push(node);
            }
            stack.extend(document.children(node).into_iter().rev());
        }
        found
    }

    fn poll_frame(&mut self) {
        if self.runtime.take_frame_request() {
            self.frames += 1;
        }
    }
}

impl Default for RenderTestRule {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for tests that only need temporary access to a
/// `RenderTestRule`.
pub fn run_test_render<R>(f: impl FnOnce(&mut RenderTestRule) -> R) -> R {
    let mut rule = RenderTestRule::new();
    f(&mut rule)
}

/// Route `log` output through the test harness. Safe to call from every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
