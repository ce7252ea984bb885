//! Frame graph construction and automatic barrier synthesis library
//!
//! Deimos builds a complete frame execution plan out of a declarative
//! description of render passes. Each pass declares named subresource
//! *roles* it reads and writes, together with the format, access, pipeline
//! stage and resource state each role requires. Binding two roles to the
//! same shared resource name makes them refer to the same physical
//! resource. From this description, [`FrameGraphBuilder::build`] produces a
//! [`FrameGraph`] containing:
//!
//! - every pass assigned to a *dependency level*: passes in the same level
//!   have no ordering constraint between them and may record concurrently,
//!   while levels are totally ordered by the data dependencies of the graph,
//! - one physical image per resource *instance* (a resource that must
//!   ping-pong across frames in flight, or the swapchain backbuffer, gets
//!   several), allocated in batched pool allocations through the injected
//!   [`ImagePoolAllocator`],
//! - deduplicated view descriptions for every (instance, format, view class)
//!   combination the passes need,
//! - a precomputed list of state transition barriers with, per pass, the
//!   span to emit immediately before and immediately after its work.
//!
//! Barrier decisions are delegated to a [`TransitionPolicy`]. The default
//! [`CommonStatePolicy`] models an API with implicit state promotion from a
//! common state and implicit decay back to it at queue boundaries, so
//! transitions that the API performs on its own never produce explicit
//! barriers. Swapping the policy retargets the same dependency, allocation
//! and view logic to a different explicit-barrier API.
//!
//! At frame time, [`FrameGraph::traverse`] swaps in the physical image and
//! views for the acquired swapchain image, records every dependency level
//! except the last on worker threads, records the last level on the calling
//! thread, and submits the recorded command buffers in level order through
//! the injected [`SubmitInterface`].
//!
//! The GPU is never touched directly: window/device bring-up, pipeline and
//! descriptor management and the draw commands inside each pass all belong
//! to the host renderer, which reaches back into the graph only through the
//! [`RecordContext`] passed to its pass executors.

#[macro_use]
extern crate derivative;
#[macro_use]
extern crate log;

pub mod prelude;
pub use crate::prelude::*;

pub mod core;
pub mod domain;
pub mod resource;
pub mod alloc;
pub mod swapchain;
pub mod submit;
pub mod graph;
