//! The physical image allocator interface.
//!
//! The frame graph never allocates GPU memory itself. It aggregates one
//! [`ImageDescription`] per physical resource instance and hands entire
//! batches to an [`ImagePoolAllocator`] the host renderer injects: one call
//! for every attachment-class image, one call for everything else. Batching
//! is what lets the backing allocator place the whole frame's transient
//! images in a single heap and alias their memory where the API allows it.

use anyhow::Result;

use crate::resource::{Format, ImageHandle, PoolHandle, ResourceState, ViewUsage};

/// Description of one physical image the frame graph wants allocated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDescription {
    /// Debug name, derived from the shared resource name (instanced
    /// resources get a `#N` suffix).
    pub name: String,
    /// Width in pixels. Always the frame graph viewport width.
    pub width: u32,
    /// Height in pixels. Always the frame graph viewport height.
    pub height: u32,
    /// Element format. [`Format::Typeless`] when the passes sharing the
    /// resource use more than one concrete format.
    pub format: Format,
    /// Union of the view classes used across the resource's lifetime.
    pub usage: ViewUsage,
    /// State to create the image in: the state of the resource's last use
    /// in a frame. The chain is circular, so every frame starts from the
    /// state the previous frame left the resource in, and the very first
    /// frame must too.
    pub initial_state: ResourceState,
    /// Concrete format for the optimized clear value, remembered for
    /// render-target and depth-write resources. A typeless allocation has no
    /// default clear format of its own, so it is carried here.
    pub clear_format: Option<Format>,
}

/// Result of one pooled allocation: the pool that backs the images, and one
/// offset + image handle per description, in input order.
#[derive(Debug, Clone)]
pub struct PoolAllocation {
    pub pool: PoolHandle,
    pub offsets: Vec<u64>,
    pub images: Vec<ImageHandle>,
}

/// Allocates batches of image descriptions into a single memory pool.
pub trait ImagePoolAllocator {
    /// Allocate every description into one pool and return per-image
    /// offsets and handles. The returned vectors must have one entry per
    /// description. Failure aborts frame graph construction; the graph does
    /// not retry.
    fn allocate_image_pool(&mut self, descriptions: &[ImageDescription]) -> Result<PoolAllocation>;
}
