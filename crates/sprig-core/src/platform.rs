//! Platform abstraction for the render queue.
//!
//! The engine never drains its queue on its own. It asks the host for a
//! later turn of the event loop through [`RuntimeScheduler`], and the host
//! answers by calling `Renderer::drain`.

/// Requests deferred work from the host event loop.
///
/// Implementations must be safe to signal from other threads even though
/// draining always happens on the thread that owns the renderer.
pub trait RuntimeScheduler: Send + Sync {
    /// Ask the host to call back on its next available frame.
    ///
    /// Called once per batch: when the first component becomes dirty after
    /// the previous drain.
    fn schedule_frame(&self);
}
