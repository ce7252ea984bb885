//! Queue classes abstract over the hardware queues of an explicit graphics
//! API.
//!
//! Passes are divided into four classes:
//! - [`Graphics`](QueueClass::Graphics): rasterization and render-target work.
//! - [`Compute`](QueueClass::Compute): dispatch work, possibly on an async
//!   compute queue.
//! - [`Transfer`](QueueClass::Transfer): copy work, possibly on a dedicated
//!   copy queue.
//! - [`Present`](QueueClass::Present): the synthetic acquire/present pass the
//!   graph creates for the swapchain backbuffer.
//!
//! The class of a pass feeds the barrier transition rules: crossing a queue
//! class boundary is where implicit state decay happens, and it decides
//! which states are reachable without an explicit barrier on the other side.

/// Queue class of a pass.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum QueueClass {
    /// Rasterization, render targets, and everything else a universal queue
    /// accepts.
    #[default]
    Graphics,
    /// Compute dispatches.
    Compute,
    /// Copies and other transfer operations.
    Transfer,
    /// The synthetic swapchain acquire/present pass. For synchronization
    /// purposes this runs on the graphics queue.
    Present,
}

impl QueueClass {
    /// The queue class used when evaluating transition rules. Presentation
    /// has no queue of its own here; present work submits on graphics.
    pub fn sync_class(self) -> QueueClass {
        match self {
            QueueClass::Present => QueueClass::Graphics,
            other => other,
        }
    }
}
