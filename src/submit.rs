//! The command recording and submission boundary.
//!
//! Traversal records one command-buffer-equivalent per dependency level and
//! submits them as a single ordered batch. Both sides of that contract are
//! traits the host renderer implements: [`CommandRecorder`] is whatever its
//! backend records commands into, [`SubmitInterface`] creates recorders and
//! accepts the finished batch.
//!
//! The frame graph itself only ever calls [`CommandRecorder::pipeline_barrier`];
//! everything else a pass records goes through the concrete recorder type,
//! which pass executors receive directly (they are generic over `R`).

use anyhow::Result;

use crate::domain::QueueClass;
use crate::resource::{AccessMask, ImageHandle, PipelineStageMask, ResourceState};

/// One precomputed state transition, ready to be emitted into a recorder.
///
/// The referenced image is resolved at build time for graph-owned resources.
/// Barriers on the backbuffer are repointed to the acquired swapchain image
/// at the start of every traversal, before any recording begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarrierRecord {
    /// The physical image being transitioned.
    pub image: ImageHandle,
    /// Name of the resource instance, for debugging and logging.
    pub resource: String,
    /// State the resource is in when the barrier executes.
    pub from_state: ResourceState,
    /// State the resource must be in afterwards.
    pub to_state: ResourceState,
    /// Accesses that must complete before the transition.
    pub src_access: AccessMask,
    /// Accesses that wait for the transition.
    pub dst_access: AccessMask,
    /// Stages that must complete before the transition.
    pub src_stage: PipelineStageMask,
    /// Stages that wait for the transition.
    pub dst_stage: PipelineStageMask,
}

/// A command-buffer-equivalent the frame graph records a dependency level
/// into. Recorders move to worker threads during traversal.
pub trait CommandRecorder: Send {
    /// Record the given transitions at the current position.
    fn pipeline_barrier(&mut self, barriers: &[BarrierRecord]);
}

/// Creates recorders and accepts the finished per-level batch.
pub trait SubmitInterface<R: CommandRecorder> {
    /// Create the recorder for one dependency level. `frame_slot` is the
    /// frame index modulo frames-in-flight, for implementations that ring
    /// their command allocators.
    fn create_recorder(&self, level: u32, frame_slot: u32) -> Result<R>;

    /// Submit the recorded levels, in dependency order, to the hardware
    /// queue of the given class. Called exactly once per traversal. Errors
    /// propagate out of [`traverse`](crate::graph::frame_graph::FrameGraph::traverse);
    /// the frame graph does not retry.
    fn submit(&self, queue: QueueClass, recorders: Vec<R>) -> Result<()>;
}
