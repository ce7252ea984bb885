//! Re-exports the most important types in the crate so they can all be
//! imported at once.

pub use crate::alloc::{ImageDescription, ImagePoolAllocator, PoolAllocation};
pub use crate::core::config::FrameGraphConfig;
pub use crate::core::error::Error;
pub use crate::domain::QueueClass;
pub use crate::graph::barrier::{CommonStatePolicy, StateTransition, TransitionEdge, TransitionPolicy};
pub use crate::graph::description::FrameGraphBuilder;
pub use crate::graph::frame_graph::FrameGraph;
pub use crate::graph::pass::{EmptyPassExecutor, PassExecutor, RecordContext};
pub use crate::graph::view::{ImageViewDesc, ViewClass};
pub use crate::resource::{
    AccessMask, Format, ImageHandle, PipelineStageMask, PoolHandle, ResourceState, ViewUsage,
};
pub use crate::submit::{BarrierRecord, CommandRecorder, SubmitInterface};
pub use crate::swapchain::Swapchain;
