//! Flat metadata arenas the build phases operate on.
//!
//! All cross-references are integer indices into growable vectors: passes
//! own contiguous spans of subresource nodes, nodes point at their resource
//! and at the previous/next node of the same resource. The prev/next links
//! form a circular list per physical resource instance, ordered by
//! execution order; the last use in frame N feeds the first use in frame
//! N+1.

use std::ops::Range;

use crate::domain::QueueClass;
use crate::resource::{AccessMask, Format, ImageHandle, PipelineStageMask, ResourceState, ViewUsage};

pub(crate) const INVALID_INDEX: u32 = u32::MAX;

/// Name of the synthetic acquire/present pass owning the backbuffer's
/// frame-boundary chain endpoints.
pub(crate) const PRESENT_PASS_NAME: &str = "_present_acquire";

/// Half-open index range into one of the flat arenas.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub(crate) struct Span {
    pub begin: u32,
    pub end: u32,
}

impl Span {
    pub fn new(begin: u32, end: u32) -> Self {
        Span {
            begin,
            end,
        }
    }

    pub fn len(&self) -> u32 {
        self.end - self.begin
    }

    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.begin as usize..self.end as usize
    }
}

/// Mutable per-(pass, role) payload: what the pass requires of the
/// subresource. Unknown formats and undefined states are filled in by
/// propagation before barrier synthesis.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub(crate) struct SubresourcePayload {
    pub format: Format,
    pub state: ResourceState,
    pub access: AccessMask,
    pub stage: PipelineStageMask,
    pub usage: ViewUsage,
    /// The state is reachable from the common state without an explicit
    /// barrier.
    pub promoted: bool,
    /// The pass performs its own synchronization for this subresource;
    /// barrier synthesis skips it.
    pub auto_barrier: bool,
}

/// One use of a resource by one pass.
#[derive(Debug, Clone)]
pub(crate) struct SubresourceNode {
    /// Node of the previous use of the same resource instance, in execution
    /// order. Circular.
    pub prev_node: u32,
    /// Node of the next use. Circular.
    pub next_node: u32,
    /// Index into [`BuildState::resources`].
    pub resource_index: u32,
    /// Queue class of the owning pass, cached for the transition rules.
    pub pass_class: QueueClass,
    /// Whether the owning pass reads the subresource.
    pub read: bool,
    /// Whether the owning pass writes the subresource.
    pub write: bool,
    /// Index into the physical image table, set once allocation ran.
    pub image_index: u32,
    /// Index into the view table, set once view allocation ran.
    /// `INVALID_INDEX` for uses that need no view (copies, present).
    pub view_index: u32,
    pub payload: SubresourcePayload,
}

impl SubresourceNode {
    pub fn new(pass_class: QueueClass) -> Self {
        SubresourceNode {
            prev_node: INVALID_INDEX,
            next_node: INVALID_INDEX,
            resource_index: INVALID_INDEX,
            pass_class,
            read: false,
            write: false,
            image_index: INVALID_INDEX,
            view_index: INVALID_INDEX,
            payload: SubresourcePayload::default(),
        }
    }
}

/// One registered pass (or, after amplification, one per-frame copy of it).
#[derive(Debug, Clone)]
pub(crate) struct PassMetadata {
    pub name: String,
    pub class: QueueClass,
    pub dependency_level: u32,
    /// Nodes owned by this pass.
    pub subresources: Span,
    /// Role ids, parallel to the subresource span.
    pub roles: Vec<String>,
}

/// Where the physical images of a resource come from.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum ResourceKind {
    /// Allocated and owned by the graph.
    Texture,
    /// Swapped in from the swapchain each frame, never owned.
    Backbuffer,
}

/// One physical resource (after amplification: one physical instance).
#[derive(Debug, Clone)]
pub(crate) struct ResourceMetadata {
    pub name: String,
    pub kind: ResourceKind,
    /// First node of the circular chain.
    pub head_node: u32,
    /// Physical instances this logical resource needs. Meaningful on the
    /// pre-amplification entries; amplified instances each carry 1.
    pub frame_count: u32,
    /// Index into the physical image table.
    pub image_index: u32,
    /// The allocation description, kept for introspection. `None` for the
    /// backbuffer.
    pub description: Option<crate::alloc::ImageDescription>,
}

/// How a pass's recorded copies cycle across frames.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum FrameSwapType {
    /// One copy, used every frame.
    Constant,
    /// One copy per frame in flight, selected by frame index.
    PerLinearFrame,
    /// One copy per swapchain image, selected by acquired image index.
    PerBackbufferImage,
}

/// Span of amplified pass copies belonging to one registered pass.
#[derive(Debug, Copy, Clone)]
pub(crate) struct PassFrameSpan {
    pub begin: u32,
    pub end: u32,
    pub swap_type: FrameSwapType,
}

impl PassFrameSpan {
    pub fn period(&self) -> u32 {
        self.end - self.begin
    }
}

/// Before/after barrier spans of one amplified pass.
#[derive(Debug, Default, Copy, Clone)]
pub(crate) struct BarrierPassSpan {
    pub before: Span,
    pub after: Span,
}

/// Entry of the swapchain view swap map: `views[view_index]` is replaced
/// with `swapchain_views[base + image_index]` each frame.
#[derive(Debug, Copy, Clone)]
pub(crate) struct SwapMapEntry {
    pub view_index: u32,
    pub base: u32,
}

/// Everything the build phases accumulate before the final [`FrameGraph`]
/// is assembled.
pub(crate) struct BuildState {
    pub config: crate::core::config::FrameGraphConfig,
    pub swapchain_image_count: u32,
    pub swapchain_format: Format,
    pub swapchain_images: Vec<ImageHandle>,

    /// Render passes first, the present quasi-pass (if any) last. Render
    /// passes are sorted by dependency level once `dependency::sort_passes`
    /// ran; amplification rebuilds the array with per-frame copies in the
    /// same order.
    pub passes: Vec<PassMetadata>,
    pub render_span: Span,
    pub present_span: Span,

    pub nodes: Vec<SubresourceNode>,
    pub resources: Vec<ResourceMetadata>,
    pub backbuffer_resource: Option<u32>,
    /// Helper nodes and the primary node each one mirrors. Helpers share
    /// the primary's payload; promotion marking copies its flag over.
    pub helper_primaries: Vec<(u32, u32)>,

    /// Per registered pass (post-sort order): its amplified copies.
    pub frame_spans: Vec<PassFrameSpan>,
    /// Registered pass name behind each frame span, for executor lookup.
    pub frame_span_names: Vec<String>,
    /// Per dependency level: span of registered render pass indices.
    pub level_spans: Vec<Span>,

    pub images: Vec<ImageHandle>,
    pub backbuffer_image_index: u32,

    pub views: Vec<crate::graph::view::ImageViewDesc>,
    pub swapchain_views: Vec<crate::graph::view::ImageViewDesc>,
    pub swapchain_view_swap_map: Vec<SwapMapEntry>,

    pub barriers: Vec<crate::submit::BarrierRecord>,
    pub barrier_spans: Vec<BarrierPassSpan>,
    pub swapchain_barrier_indices: Vec<u32>,
}

impl BuildState {
    pub fn new(
        config: crate::core::config::FrameGraphConfig,
        swapchain: &dyn crate::swapchain::Swapchain,
    ) -> Self {
        let count = swapchain.image_count();
        BuildState {
            config,
            swapchain_image_count: count,
            swapchain_format: swapchain.format(),
            swapchain_images: (0..count).map(|i| swapchain.image_handle(i)).collect(),
            passes: Vec::new(),
            render_span: Span::default(),
            present_span: Span::default(),
            nodes: Vec::new(),
            resources: Vec::new(),
            backbuffer_resource: None,
            helper_primaries: Vec::new(),
            frame_spans: Vec::new(),
            frame_span_names: Vec::new(),
            level_spans: Vec::new(),
            images: Vec::new(),
            backbuffer_image_index: INVALID_INDEX,
            views: Vec::new(),
            swapchain_views: Vec::new(),
            swapchain_view_swap_map: Vec::new(),
            barriers: Vec::new(),
            barrier_spans: Vec::new(),
            swapchain_barrier_indices: Vec::new(),
        }
    }

    /// Indices of all passes in execution order: sorted render passes, then
    /// the present quasi-pass.
    pub fn pass_indices(&self) -> Range<usize> {
        0..self.passes.len()
    }
}
