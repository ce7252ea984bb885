//! The swapchain interface.
//!
//! The backbuffer is the one resource whose physical images the frame graph
//! does not own: they belong to the swapchain and are swapped into the graph
//! each frame. The graph only needs to know how many there are, their
//! format, and the handle behind each index.

use crate::resource::{Format, ImageHandle};

/// Fixed-image-count swapchain as seen by the frame graph.
pub trait Swapchain {
    /// Number of images in the swapchain. The backbuffer resource gets this
    /// many physical instances, and every pass touching it this many
    /// recorded copies.
    fn image_count(&self) -> u32;

    /// Handle of the image at the given index. Handles must stay stable for
    /// the lifetime of the built graph; recreating the swapchain requires a
    /// full rebuild.
    fn image_handle(&self, image_index: u32) -> ImageHandle;

    /// Element format of the swapchain images.
    fn format(&self) -> Format;
}
