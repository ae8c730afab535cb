use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::component::{ComponentId, Instance};
use crate::platform::RuntimeScheduler;

pub(crate) type QueuedRender = (ComponentId, Weak<RefCell<Instance>>);

struct RuntimeInner {
    scheduler: Arc<dyn RuntimeScheduler>,
    needs_frame: Cell<bool>,
    render_queue: RefCell<Vec<QueuedRender>>,
}

impl RuntimeInner {
    fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self {
            scheduler,
            needs_frame: Cell::new(false),
            render_queue: RefCell::new(Vec::new()),
        }
    }

    fn schedule(&self) {
        self.needs_frame.set(true);
        self.scheduler.schedule_frame();
    }

    fn enqueue_render(&self, id: ComponentId, instance: &Rc<RefCell<Instance>>) {
        {
            let mut state = instance.borrow_mut();
            if state.dirty || state.disabled {
                return;
            }
            state.dirty = true;
        }
        let first = {
            let mut queue = self.render_queue.borrow_mut();
            queue.push((id, Rc::downgrade(instance)));
            queue.len() == 1
        };
        log::trace!("queued render for {id}");
        if first {
            self.schedule();
        }
    }

    fn take_render_queue(&self) -> Vec<QueuedRender> {
        self.needs_frame.set(false);
        self.render_queue.borrow_mut().drain(..).collect()
    }

    fn has_pending_renders(&self) -> bool {
        !self.render_queue.borrow().is_empty()
    }
}

/// Shared scheduling state for one renderer: the pending render batch and
/// the host scheduler it reports to.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    pub fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self {
            inner: Rc::new(RuntimeInner::new(scheduler)),
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle(Rc::downgrade(&self.inner))
    }

    pub fn has_pending_renders(&self) -> bool {
        self.inner.has_pending_renders()
    }

    /// True between the first enqueue of a batch and the drain that takes it.
    pub fn needs_frame(&self) -> bool {
        self.inner.needs_frame.get()
    }
}

/// Scheduler that ignores frame requests; the host polls
/// [`Runtime::needs_frame`] instead.
#[derive(Default)]
pub struct DefaultScheduler;

impl RuntimeScheduler for DefaultScheduler {
    fn schedule_frame(&self) {}
}

#[cfg(test)]
#[derive(Default)]
pub struct TestScheduler {
    frames: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl TestScheduler {
    pub fn frames(&self) -> usize {
        self.frames.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl RuntimeScheduler for TestScheduler {
    fn schedule_frame(&self) {
        self.frames.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

/// Weak reference to a [`Runtime`], held by component handles so a stale
/// handle never keeps the renderer's queue alive.
#[derive(Clone)]
pub struct RuntimeHandle(Weak<RuntimeInner>);

impl RuntimeHandle {
    pub(crate) fn enqueue_render(&self, id: ComponentId, instance: &Rc<RefCell<Instance>>) {
        if let Some(inner) = self.0.upgrade() {
            inner.enqueue_render(id, instance);
        }
    }

    pub(crate) fn take_render_queue(&self) -> Vec<QueuedRender> {
        self.0
            .upgrade()
            .map(|inner| inner.take_render_queue())
            .unwrap_or_default()
    }

    pub fn has_pending_renders(&self) -> bool {
        self.0
            .upgrade()
            .map(|inner| inner.has_pending_renders())
            .unwrap_or(false)
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

#[cfg(test)]
#[path = "tests/runtime_tests.rs"]
mod tests;
