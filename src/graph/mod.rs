//! The frame graph system: registration, dependency resolution, resource
//! lifetime and aliasing, view allocation, barrier synthesis, and per-frame
//! traversal.
//!
//! Construction runs once per graph lifetime (first load, swapchain resize,
//! pass-set change) through [`FrameGraphBuilder::build`](description::FrameGraphBuilder::build)
//! and proceeds in fixed phases:
//!
//! 1. registration data is flattened into arenas of pass, subresource and
//!    resource metadata ([`metadata`]),
//! 2. write→read intersections order the passes into dependency levels
//!    ([`dependency`]),
//! 3. resources are amplified into per-frame physical instances, their
//!    subresource chains linked in execution order, payloads propagated, and
//!    the physical images allocated in batches ([`lifetime`]),
//! 4. views are deduplicated and assigned ([`view`]),
//! 5. barriers are synthesized from the transition policy ([`barrier`]).
//!
//! The result is a [`FrameGraph`](frame_graph::FrameGraph), which stays
//! read-only during per-frame traversal except for the swapchain-cycling
//! slots that are repointed at the acquired image each frame.

pub mod barrier;
pub mod description;
pub mod frame_graph;
pub mod pass;
pub mod view;

pub(crate) mod dependency;
pub(crate) mod lifetime;
pub(crate) mod metadata;
