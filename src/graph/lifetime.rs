//! Resource lifetime and aliasing: per-frame amplification, circular
//! subresource chains, payload propagation, and batched physical
//! allocation.
//!
//! A resource needs one physical instance normally, one per frame in flight
//! when marked per-frame, and one per swapchain image for the backbuffer.
//! Passes touching multi-instance resources are *amplified*: they get one
//! recorded copy per instance, and every copy's subresource nodes are
//! relinked into per-instance circular chains ordered by execution order.
//! The chain of an instance closes over the frame boundary, so the last use
//! in one frame feeds the first use of the next one; that wrap edge is what
//! start-of-frame barriers are synthesized from.
//!
//! A pass with fewer copies than a chain has slots (a single-copy pass
//! sharing a resource with an amplified pass) contributes extra *helper*
//! nodes cloned from its primary node, so every chain slot stays a distinct
//! node with its own links.

use std::collections::{HashMap, HashSet};

use anyhow::Result;

use crate::alloc::{ImageDescription, ImagePoolAllocator};
use crate::core::error::Error;
use crate::graph::metadata::{
    BuildState, FrameSwapType, PassFrameSpan, PassMetadata, ResourceKind, ResourceMetadata, Span,
    INVALID_INDEX,
};
use crate::resource::{Format, ImageHandle, ResourceState, ViewUsage};

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

fn lcm(a: u32, b: u32) -> u32 {
    a / gcd(a, b) * b
}

/// Expand resources and passes into per-frame instances and rebuild the
/// subresource chains per physical instance.
pub(crate) fn amplify(state: &mut BuildState, per_frame: &HashSet<String>) -> Result<()> {
    let frames_in_flight = state.config.frame_count();
    let swapchain_images = state.swapchain_image_count;

    for resource in &mut state.resources {
        resource.frame_count = match resource.kind {
            ResourceKind::Backbuffer => swapchain_images,
            ResourceKind::Texture => {
                if per_frame.contains(&resource.name) {
                    frames_in_flight
                } else {
                    1
                }
            }
        };
    }

    let old_passes = std::mem::take(&mut state.passes);
    let old_nodes = std::mem::take(&mut state.nodes);
    let old_resources = std::mem::take(&mut state.resources);

    // Recording period and swap type per pass. A pass inherits the instance
    // count of the multi-instance resources it touches; two different
    // cycling periods inside one pass cannot be walked by a single frame
    // index.
    let mut periods = Vec::with_capacity(old_passes.len());
    for pass in &old_passes {
        let mut period = 1u32;
        let mut swap_type = FrameSwapType::Constant;
        for node in &old_nodes[pass.subresources.range()] {
            let resource = &old_resources[node.resource_index as usize];
            if resource.frame_count > 1 {
                let resource_swap = match resource.kind {
                    ResourceKind::Backbuffer => FrameSwapType::PerBackbufferImage,
                    ResourceKind::Texture => FrameSwapType::PerLinearFrame,
                };
                if swap_type != FrameSwapType::Constant && swap_type != resource_swap {
                    return Err(Error::MixedFramePeriods(pass.name.clone()).into());
                }
                swap_type = resource_swap;
                period = lcm(period, resource.frame_count);
            }
        }
        periods.push((period, swap_type));
    }

    // Amplified resources: one metadata entry per physical instance.
    let mut resource_base = vec![0u32; old_resources.len()];
    let mut resources = Vec::new();
    for (index, resource) in old_resources.iter().enumerate() {
        resource_base[index] = resources.len() as u32;
        for instance in 0..resource.frame_count {
            let name = if resource.frame_count == 1 {
                resource.name.clone()
            } else {
                format!("{}#{}", resource.name, instance)
            };
            resources.push(ResourceMetadata {
                name,
                kind: resource.kind,
                head_node: INVALID_INDEX,
                frame_count: 1,
                image_index: INVALID_INDEX,
                description: None,
            });
        }
    }
    if let Some(backbuffer) = state.backbuffer_resource {
        state.backbuffer_resource = Some(resource_base[backbuffer as usize]);
    }

    // Amplified passes and their subresource nodes. Copy k of a pass binds
    // each node to instance k of the node's resource (periods are always a
    // multiple of the instance counts involved).
    let mut passes = Vec::new();
    let mut nodes = Vec::new();
    state.frame_spans.clear();
    state.frame_span_names.clear();
    for (pass_index, pass) in old_passes.iter().enumerate() {
        let (period, swap_type) = periods[pass_index];
        state.frame_spans.push(PassFrameSpan {
            begin: passes.len() as u32,
            end: passes.len() as u32 + period,
            swap_type,
        });
        state.frame_span_names.push(pass.name.clone());
        for copy in 0..period {
            let name = if period == 1 {
                pass.name.clone()
            } else {
                format!("{}#{}", pass.name, copy)
            };
            let begin = nodes.len() as u32;
            for old_node in &old_nodes[pass.subresources.range()] {
                let mut node = old_node.clone();
                node.prev_node = INVALID_INDEX;
                node.next_node = INVALID_INDEX;
                let resource = old_node.resource_index as usize;
                node.resource_index =
                    resource_base[resource] + copy % old_resources[resource].frame_count;
                nodes.push(node);
            }
            passes.push(PassMetadata {
                name,
                class: pass.class,
                dependency_level: pass.dependency_level,
                subresources: Span::new(begin, nodes.len() as u32),
                roles: pass.roles.clone(),
            });
        }
    }

    let render_pass_count = state.render_span.len() as usize;
    let had_present = !state.present_span.is_empty();
    let render_end = if had_present {
        state.frame_spans[render_pass_count].begin
    } else {
        passes.len() as u32
    };
    state.render_span = Span::new(0, render_end);
    state.present_span = Span::new(render_end, passes.len() as u32);

    // Users of each resource, in execution order.
    let mut users: Vec<Vec<(u32, u32)>> = vec![Vec::new(); old_resources.len()];
    for (pass_index, pass) in old_passes.iter().enumerate() {
        for slot in 0..pass.subresources.len() {
            let node = &old_nodes[(pass.subresources.begin + slot) as usize];
            users[node.resource_index as usize].push((pass_index as u32, slot));
        }
    }

    // Relink the chains per physical instance. The chain of instance c
    // walks frame phases c, c + count, ... up to the least common multiple
    // of the users' periods; a pass copy revisited within that window gets
    // a helper node per extra visit.
    let mut helper_nodes: HashMap<(u32, u32), u32> = HashMap::new();
    state.helper_primaries.clear();
    for (resource_index, resource) in old_resources.iter().enumerate() {
        if users[resource_index].is_empty() {
            continue;
        }
        let count = resource.frame_count;
        let mut chain_period = 1u32;
        for &(pass_index, _) in &users[resource_index] {
            chain_period = lcm(chain_period, periods[pass_index as usize].0);
        }
        for instance in 0..count {
            let amplified_resource = resource_base[resource_index] + instance;
            let mut first = INVALID_INDEX;
            let mut last = INVALID_INDEX;
            let mut phase = instance;
            while phase < chain_period {
                for &(pass_index, slot) in &users[resource_index] {
                    let period = periods[pass_index as usize].0;
                    let copy = phase % period;
                    let span = state.frame_spans[pass_index as usize];
                    let primary =
                        passes[(span.begin + copy) as usize].subresources.begin + slot;
                    let occurrence = phase / period;
                    let node_index = if occurrence == 0 {
                        primary
                    } else {
                        *helper_nodes
                            .entry((primary, occurrence))
                            .or_insert_with(|| {
                                let mut helper = nodes[primary as usize].clone();
                                helper.prev_node = INVALID_INDEX;
                                helper.next_node = INVALID_INDEX;
                                nodes.push(helper);
                                let index = nodes.len() as u32 - 1;
                                state.helper_primaries.push((index, primary));
                                index
                            })
                    };
                    if last != INVALID_INDEX {
                        nodes[last as usize].next_node = node_index;
                        nodes[node_index as usize].prev_node = last;
                    } else {
                        first = node_index;
                    }
                    last = node_index;
                }
                phase += count;
            }
            // Close the circle: the last use of one frame feeds the first
            // use of the next.
            nodes[last as usize].next_node = first;
            nodes[first as usize].prev_node = last;
            resources[amplified_resource as usize].head_node = first;
        }
    }

    trace!(
        "amplified into {} passes, {} resource instances, {} subresource nodes",
        passes.len(),
        resources.len(),
        nodes.len()
    );

    state.passes = passes;
    state.nodes = nodes;
    state.resources = resources;
    Ok(())
}

/// Fill unknown formats and undefined states from chain neighbours and from
/// sibling nodes of the same pass, until nothing changes anymore. Formats
/// cross queue boundaries freely; states only propagate along
/// same-queue-class runs of the chain.
pub(crate) fn propagate_payloads(state: &mut BuildState) -> Result<()> {
    let heads: Vec<u32> = state.resources.iter().map(|r| r.head_node).collect();
    loop {
        let mut changed = false;

        for &head in &heads {
            if head == INVALID_INDEX {
                continue;
            }
            let mut current = head;
            loop {
                let next = state.nodes[current as usize].next_node;
                changed |= propagate_pair(state, current, next);
                current = next;
                if current == head {
                    break;
                }
            }
        }

        for pass_index in state.pass_indices() {
            let span = state.passes[pass_index].subresources;
            for a in span.range() {
                for b in span.range().skip(a - span.begin as usize + 1) {
                    if state.nodes[a].resource_index != state.nodes[b].resource_index {
                        continue;
                    }
                    changed |= propagate_formats(state, a as u32, b as u32);
                }
            }
        }

        if !changed {
            break;
        }
    }

    for node in &state.nodes {
        if node.payload.format.is_unknown() || node.payload.state.is_undefined() {
            let name = state.resources[node.resource_index as usize].name.clone();
            return Err(Error::UnresolvedPayload(name).into());
        }
    }
    Ok(())
}

fn propagate_pair(state: &mut BuildState, a: u32, b: u32) -> bool {
    let mut changed = propagate_formats(state, a, b);
    let (state_a, class_a) = {
        let node = &state.nodes[a as usize];
        (node.payload.state, node.pass_class)
    };
    let (state_b, class_b) = {
        let node = &state.nodes[b as usize];
        (node.payload.state, node.pass_class)
    };
    if class_a == class_b {
        if state_b.is_undefined() && !state_a.is_undefined() {
            state.nodes[b as usize].payload.state = state_a;
            changed = true;
        }
        if state_a.is_undefined() && !state_b.is_undefined() {
            state.nodes[a as usize].payload.state = state_b;
            changed = true;
        }
    }
    changed
}

fn propagate_formats(state: &mut BuildState, a: u32, b: u32) -> bool {
    let format_a = state.nodes[a as usize].payload.format;
    let format_b = state.nodes[b as usize].payload.format;
    let mut changed = false;
    if format_b.is_unknown() && !format_a.is_unknown() {
        state.nodes[b as usize].payload.format = format_a;
        changed = true;
    }
    if format_a.is_unknown() && !format_b.is_unknown() {
        state.nodes[a as usize].payload.format = format_b;
        changed = true;
    }
    changed
}

fn usage_from_state(state: ResourceState) -> ViewUsage {
    match state {
        ResourceState::RenderTarget => ViewUsage::RENDER_TARGET,
        ResourceState::DepthWrite | ResourceState::DepthRead => ViewUsage::DEPTH_STENCIL,
        ResourceState::ShaderResource => ViewUsage::SHADER_RESOURCE,
        ResourceState::UnorderedAccess => ViewUsage::STORAGE,
        _ => ViewUsage::empty(),
    }
}

/// Aggregate one image description per graph-owned resource instance and
/// allocate them through the external allocator: one pooled call for the
/// attachment-class images, one for everything else.
pub(crate) fn create_images(
    state: &mut BuildState,
    allocator: &mut dyn ImagePoolAllocator,
) -> Result<()> {
    let width = state.config.viewport_width();
    let height = state.config.viewport_height();

    for resource_index in 0..state.resources.len() {
        if state.resources[resource_index].kind != ResourceKind::Texture {
            continue;
        }

        let mut format = Format::Unknown;
        let mut usage = ViewUsage::empty();
        let mut clear_format = None;

        // Node arena order is execution order, so aggregation is
        // deterministic across rebuilds.
        for node in state
            .nodes
            .iter()
            .filter(|n| n.resource_index == resource_index as u32)
        {
            let payload = &node.payload;
            if !payload.format.is_unknown() {
                if format.is_unknown() {
                    format = payload.format;
                } else if format != payload.format && format != Format::Typeless {
                    // Conflicting concrete formats force a type-erased
                    // allocation; the per-pass views keep their formats.
                    format = Format::Typeless;
                }
            }
            usage |= payload.usage | usage_from_state(payload.state);
            if clear_format.is_none()
                && matches!(
                    payload.state,
                    ResourceState::RenderTarget | ResourceState::DepthWrite
                )
            {
                clear_format = Some(payload.format);
            }
            if payload.format.is_depth_stencil() {
                usage |= ViewUsage::DEPTH_STENCIL;
            }
        }

        // The image is created in the state its chain ends a frame in, so
        // the very first frame starts from the same state every later frame
        // does.
        let head = state.resources[resource_index].head_node;
        let initial_state = if head == INVALID_INDEX {
            ResourceState::Common
        } else {
            let tail = state.nodes[head as usize].prev_node;
            state.nodes[tail as usize].payload.state
        };

        let resource = &mut state.resources[resource_index];
        resource.description = Some(ImageDescription {
            name: resource.name.clone(),
            width,
            height,
            format,
            usage,
            initial_state,
            clear_format,
        });
    }

    // Batch per heap class. Attachments and non-attachments land in
    // separate pools; everything inside one pool is allocated in a single
    // call so the backing allocator can alias memory across the whole set.
    let attachment_usage = ViewUsage::RENDER_TARGET | ViewUsage::DEPTH_STENCIL;
    let mut batches: [Vec<usize>; 2] = [Vec::new(), Vec::new()];
    for (index, resource) in state.resources.iter().enumerate() {
        if let Some(description) = &resource.description {
            if description.usage.intersects(attachment_usage) {
                batches[0].push(index);
            } else {
                batches[1].push(index);
            }
        }
    }

    for batch in &batches {
        if batch.is_empty() {
            continue;
        }
        let descriptions: Vec<ImageDescription> = batch
            .iter()
            .filter_map(|&index| state.resources[index].description.clone())
            .collect();
        let allocation = allocator.allocate_image_pool(&descriptions)?;
        if allocation.images.len() != descriptions.len() {
            return Err(Error::Uncategorized("allocator returned a mismatched image count").into());
        }
        debug!(
            "allocated {} images in pool {:?}",
            allocation.images.len(),
            allocation.pool
        );
        for (&resource_index, image) in batch.iter().zip(allocation.images) {
            state.resources[resource_index].image_index = state.images.len() as u32;
            state.images.push(image);
        }
    }

    // The backbuffer slot is reserved but owned by the swapchain; traversal
    // repoints it at the acquired image every frame.
    if state.backbuffer_resource.is_some() {
        state.images.push(ImageHandle::null());
        state.backbuffer_image_index = state.images.len() as u32 - 1;
        for resource in &mut state.resources {
            if resource.kind == ResourceKind::Backbuffer {
                resource.image_index = state.backbuffer_image_index;
            }
        }
    }

    for node in &mut state.nodes {
        node.image_index = state.resources[node.resource_index as usize].image_index;
    }
    Ok(())
}
