//! View allocation: one deduplicated view description per (physical
//! instance, format, view class) combination used anywhere in the graph.
//!
//! A pass touching the same resource through several roles with the same
//! format and class shares one view with them, and with every other pass
//! using the resource the same way. Backbuffer views are special: the
//! primary view entry is a placeholder that traversal repoints at a
//! pre-created per-swapchain-image view through the swap map.

use std::collections::HashMap;

use crate::graph::metadata::{BuildState, ResourceKind, SubresourcePayload, SwapMapEntry};
use crate::resource::{Format, ImageHandle, ResourceState, ViewUsage};

/// How a view exposes its image to a pass.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ViewClass {
    /// Sampled/read in shaders.
    ShaderResource,
    /// Written as a storage image.
    Storage,
    /// Bound as a color render target.
    ColorTarget,
    /// Bound as a depth/stencil target.
    DepthTarget,
}

/// A concrete view the host renderer can instantiate: which image, seen
/// through which format, usable as what.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ImageViewDesc {
    pub image: ImageHandle,
    pub format: Format,
    pub class: ViewClass,
}

/// The view class a subresource payload calls for, if any. Copy and present
/// uses need no view object.
fn classify(payload: &SubresourcePayload) -> Option<ViewClass> {
    match payload.state {
        ResourceState::RenderTarget => Some(ViewClass::ColorTarget),
        ResourceState::DepthWrite | ResourceState::DepthRead => Some(ViewClass::DepthTarget),
        ResourceState::UnorderedAccess => Some(ViewClass::Storage),
        ResourceState::ShaderResource => Some(ViewClass::ShaderResource),
        _ => {
            if payload.usage.contains(ViewUsage::RENDER_TARGET) {
                Some(ViewClass::ColorTarget)
            } else if payload.usage.contains(ViewUsage::DEPTH_STENCIL) {
                Some(ViewClass::DepthTarget)
            } else if payload.usage.contains(ViewUsage::STORAGE) {
                Some(ViewClass::Storage)
            } else if payload.usage.contains(ViewUsage::SHADER_RESOURCE) {
                Some(ViewClass::ShaderResource)
            } else {
                None
            }
        }
    }
}

pub(crate) fn create_views(state: &mut BuildState) {
    let mut lookup: HashMap<(u32, Format, ViewClass), u32> = HashMap::new();

    for pass_index in state.pass_indices() {
        let span = state.passes[pass_index].subresources;
        for node_index in span.range() {
            let (resource_index, payload) = {
                let node = &state.nodes[node_index];
                (node.resource_index, node.payload)
            };
            let Some(class) = classify(&payload) else {
                continue;
            };
            let key = (resource_index, payload.format, class);
            let view_index = match lookup.get(&key) {
                Some(&index) => index,
                None => {
                    let index = state.views.len() as u32;
                    let resource = &state.resources[resource_index as usize];
                    if resource.kind == ResourceKind::Backbuffer {
                        // Placeholder entry; cycled through the swap map.
                        state.views.push(ImageViewDesc {
                            image: ImageHandle::null(),
                            format: payload.format,
                            class,
                        });
                        let base = state.swapchain_views.len() as u32;
                        for image in &state.swapchain_images {
                            state.swapchain_views.push(ImageViewDesc {
                                image: *image,
                                format: payload.format,
                                class,
                            });
                        }
                        state.swapchain_view_swap_map.push(SwapMapEntry {
                            view_index: index,
                            base,
                        });
                    } else {
                        state.views.push(ImageViewDesc {
                            image: state.images[resource.image_index as usize],
                            format: payload.format,
                            class,
                        });
                    }
                    lookup.insert(key, index);
                    index
                }
            };
            state.nodes[node_index].view_index = view_index;
        }
    }

    trace!(
        "created {} views ({} swapchain-cycled)",
        state.views.len(),
        state.swapchain_view_swap_map.len()
    );
}
