//! The built frame graph and its per-frame traversal.
//!
//! Everything in a [`FrameGraph`] is immutable between rebuilds except the
//! swapchain-cycling slots: the backbuffer image entry, the backbuffer view
//! entries, and the barriers that reference them. Traversal patches those
//! for the acquired image first, on the calling thread, and only then forks
//! out recording, so workers observe a fully consistent graph.
//!
//! Recording is strict fork-join: every dependency level except the last is
//! recorded by a worker, the last level by the calling thread, and the join
//! happens before anything is submitted. Within a level, the pass copy to
//! record is selected through the precomputed frame spans (by frame index
//! for per-frame passes, by acquired image index for swapchain-cycling
//! passes). Submission is a single ordered batch of all per-level
//! recorders.

use std::collections::HashMap;

use anyhow::Result;

use crate::core::config::FrameGraphConfig;
use crate::domain::QueueClass;
use crate::graph::description::ExecutorFactory;
use crate::graph::metadata::{
    BarrierPassSpan, BuildState, FrameSwapType, PassFrameSpan, PassMetadata, ResourceMetadata,
    Span, SubresourceNode, SwapMapEntry, INVALID_INDEX,
};
use crate::graph::pass::{EmptyPassExecutor, PassCopy, RecordContext, RoleBinding};
use crate::graph::view::ImageViewDesc;
use crate::resource::ImageHandle;
use crate::submit::{BarrierRecord, CommandRecorder, SubmitInterface};

/// A fully built frame graph, ready for per-frame traversal.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct FrameGraph<R: CommandRecorder> {
    config: FrameGraphConfig,

    #[derivative(Debug = "ignore")]
    pass_copies: Vec<PassCopy<R>>,
    pass_metadatas: Vec<PassMetadata>,
    nodes: Vec<SubresourceNode>,
    resources: Vec<ResourceMetadata>,

    frame_spans: Vec<PassFrameSpan>,
    frame_span_names: Vec<String>,
    level_spans: Vec<Span>,
    present_frame_span: Option<PassFrameSpan>,
    render_copy_count: u32,

    images: Vec<ImageHandle>,
    backbuffer_image_index: u32,
    swapchain_images: Vec<ImageHandle>,

    views: Vec<ImageViewDesc>,
    swapchain_views: Vec<ImageViewDesc>,
    swapchain_view_swap_map: Vec<SwapMapEntry>,

    barriers: Vec<BarrierRecord>,
    barrier_spans: Vec<BarrierPassSpan>,
    swapchain_barrier_indices: Vec<u32>,
}

pub(crate) fn assemble<R: CommandRecorder>(
    state: BuildState,
    mut factories: HashMap<String, ExecutorFactory<R>>,
) -> FrameGraph<R> {
    let mut pass_copies = Vec::with_capacity(state.passes.len());
    for (span_index, frame_span) in state.frame_spans.iter().enumerate() {
        let factory = factories.remove(&state.frame_span_names[span_index]);
        for copy in 0..frame_span.period() {
            let metadata = &state.passes[(frame_span.begin + copy) as usize];
            let roles = metadata
                .roles
                .iter()
                .enumerate()
                .map(|(slot, role)| {
                    let node = &state.nodes[metadata.subresources.begin as usize + slot];
                    RoleBinding {
                        role: role.clone(),
                        view_index: node.view_index,
                        image_index: node.image_index,
                    }
                })
                .collect();
            let executor: Box<dyn crate::graph::pass::PassExecutor<R> + Send> = match &factory {
                Some(f) => f(copy),
                None => EmptyPassExecutor::new_boxed(),
            };
            pass_copies.push(PassCopy {
                name: metadata.name.clone(),
                roles,
                executor,
            });
        }
    }

    let present_frame_span = if state.present_span.is_empty() {
        None
    } else {
        state.frame_spans.last().copied()
    };

    FrameGraph {
        config: state.config,
        render_copy_count: state.render_span.end,
        pass_copies,
        pass_metadatas: state.passes,
        nodes: state.nodes,
        resources: state.resources,
        frame_spans: state.frame_spans,
        frame_span_names: state.frame_span_names,
        level_spans: state.level_spans,
        present_frame_span,
        images: state.images,
        backbuffer_image_index: state.backbuffer_image_index,
        swapchain_images: state.swapchain_images,
        views: state.views,
        swapchain_views: state.swapchain_views,
        swapchain_view_swap_map: state.swapchain_view_swap_map,
        barriers: state.barriers,
        barrier_spans: state.barrier_spans,
        swapchain_barrier_indices: state.swapchain_barrier_indices,
    }
}

fn select_copy(span: &PassFrameSpan, frame_index: u32, swapchain_image_index: u32) -> u32 {
    match span.swap_type {
        FrameSwapType::Constant => span.begin,
        FrameSwapType::PerLinearFrame => span.begin + frame_index % span.period(),
        FrameSwapType::PerBackbufferImage => span.begin + swapchain_image_index % span.period(),
    }
}

struct LevelShared<'a> {
    config: &'a FrameGraphConfig,
    frame_spans: &'a [PassFrameSpan],
    barriers: &'a [BarrierRecord],
    barrier_spans: &'a [BarrierPassSpan],
    views: &'a [ImageViewDesc],
    images: &'a [ImageHandle],
    frame_index: u32,
    swapchain_image_index: u32,
    frame_slot: u32,
}

struct WorkItem<'a, R: CommandRecorder> {
    level_span: Span,
    passes: &'a mut [PassCopy<R>],
    base: u32,
    /// Acquire barriers of the present quasi-pass, emitted at the very
    /// start of the first level.
    prologue: Span,
    /// Present barriers of the present quasi-pass, emitted at the very end
    /// of the last level.
    epilogue: Span,
    recorder: R,
    error: Option<anyhow::Error>,
}

fn record_level<R: CommandRecorder>(item: &mut WorkItem<'_, R>, shared: &LevelShared<'_>) {
    if let Err(error) = try_record_level(item, shared) {
        item.error = Some(error);
    }
}

fn try_record_level<R: CommandRecorder>(
    item: &mut WorkItem<'_, R>,
    shared: &LevelShared<'_>,
) -> Result<()> {
    if !item.prologue.is_empty() {
        item.recorder
            .pipeline_barrier(&shared.barriers[item.prologue.range()]);
    }
    for span_index in item.level_span.range() {
        let frame_span = &shared.frame_spans[span_index];
        let copy_index = select_copy(frame_span, shared.frame_index, shared.swapchain_image_index);
        let barrier_span = &shared.barrier_spans[copy_index as usize];

        if !barrier_span.before.is_empty() {
            item.recorder
                .pipeline_barrier(&shared.barriers[barrier_span.before.range()]);
        }

        let pass = &mut item.passes[(copy_index - item.base) as usize];
        let ctx = RecordContext {
            config: shared.config,
            pass_name: &pass.name,
            frame_index: shared.frame_index,
            swapchain_image_index: shared.swapchain_image_index,
            frame_slot: shared.frame_slot,
            roles: &pass.roles,
            views: shared.views,
            images: shared.images,
        };
        pass.executor.record(&mut item.recorder, &ctx)?;

        if !barrier_span.after.is_empty() {
            item.recorder
                .pipeline_barrier(&shared.barriers[barrier_span.after.range()]);
        }
    }
    if !item.epilogue.is_empty() {
        item.recorder
            .pipeline_barrier(&shared.barriers[item.epilogue.range()]);
    }
    Ok(())
}

impl<R: CommandRecorder> FrameGraph<R> {
    /// Record and submit one frame.
    ///
    /// `frame_index` is the monotonically increasing frame counter;
    /// `swapchain_image_index` is the index of the image acquired for this
    /// frame. Every dependency level except the last records on a worker
    /// thread; the last records on the calling thread. All levels submit as
    /// one ordered batch.
    ///
    /// # Errors
    /// * Fails if creating a recorder, a pass executor, or the submission
    ///   itself fails. The graph does not retry; retry policy belongs to the
    ///   frame loop.
    pub fn traverse<S>(&mut self, submit: &S, frame_index: u32, swapchain_image_index: u32) -> Result<()>
    where
        S: SubmitInterface<R>,
    {
        if self.level_spans.is_empty() {
            return Ok(());
        }
        self.switch_swapchain_resources(swapchain_image_index);

        let frame_slot = frame_index % self.config.frame_count();
        let mut recorders = Vec::with_capacity(self.level_spans.len());
        for level in 0..self.level_spans.len() {
            recorders.push(submit.create_recorder(level as u32, frame_slot)?);
        }

        let shared = LevelShared {
            config: &self.config,
            frame_spans: &self.frame_spans,
            barriers: &self.barriers,
            barrier_spans: &self.barrier_spans,
            views: &self.views,
            images: &self.images,
            frame_index,
            swapchain_image_index,
            frame_slot,
        };

        // Acquire/present transitions of the present quasi-pass wrap the
        // frame; the quasi-pass itself records nothing.
        let (acquire_span, present_span) = match &self.present_frame_span {
            Some(frame_span) => {
                let copy = select_copy(frame_span, frame_index, swapchain_image_index);
                let spans = self.barrier_spans[copy as usize];
                (spans.after, spans.before)
            }
            None => (Span::default(), Span::default()),
        };

        let mut items: Vec<WorkItem<'_, R>> = Vec::with_capacity(self.level_spans.len());
        {
            let mut rest: &mut [PassCopy<R>] = &mut self.pass_copies[..self.render_copy_count as usize];
            let mut base = 0u32;
            for (level_span, recorder) in self.level_spans.iter().zip(recorders) {
                let copies_end = self.frame_spans[(level_span.end - 1) as usize].end;
                let (slice, remainder) = rest.split_at_mut((copies_end - base) as usize);
                rest = remainder;
                items.push(WorkItem {
                    level_span: *level_span,
                    passes: slice,
                    base,
                    prologue: Span::default(),
                    epilogue: Span::default(),
                    recorder,
                    error: None,
                });
                base = copies_end;
            }
        }

        let last = items.len() - 1;
        items[0].prologue = acquire_span;
        items[last].epilogue = present_span;
        let (workers, main) = items.split_at_mut(last);
        rayon::scope(|scope| {
            for item in workers.iter_mut() {
                let shared = &shared;
                scope.spawn(move |_| record_level(item, shared));
            }
            record_level(&mut main[0], &shared);
        });

        for item in &mut items {
            if let Some(error) = item.error.take() {
                return Err(error);
            }
        }

        let recorders: Vec<R> = items.into_iter().map(|item| item.recorder).collect();
        submit.submit(QueueClass::Graphics, recorders)?;
        trace!(
            "traversed frame {} (swapchain image {})",
            frame_index,
            swapchain_image_index
        );
        Ok(())
    }

    /// Repoint the backbuffer image slot, the backbuffer views, and the
    /// swapchain barriers at the acquired image. Runs synchronously before
    /// any recording is forked, so workers never observe a partial switch.
    fn switch_swapchain_resources(&mut self, swapchain_image_index: u32) {
        if self.backbuffer_image_index == INVALID_INDEX {
            return;
        }
        let image = self.swapchain_images[swapchain_image_index as usize];
        self.images[self.backbuffer_image_index as usize] = image;
        for entry in &self.swapchain_view_swap_map {
            self.views[entry.view_index as usize] =
                self.swapchain_views[(entry.base + swapchain_image_index) as usize];
        }
        for &barrier_index in &self.swapchain_barrier_indices {
            self.barriers[barrier_index as usize].image = image;
        }
    }

    /// Number of dependency levels.
    pub fn dependency_level_count(&self) -> usize {
        self.level_spans.len()
    }

    /// Dependency level of a pass, looked up by its registered name.
    pub fn dependency_level(&self, pass: &str) -> Option<u32> {
        let span_index = self.frame_span_names.iter().position(|n| n == pass)?;
        let copy = self.frame_spans[span_index].begin;
        Some(self.pass_metadatas[copy as usize].dependency_level)
    }

    /// All recorded pass copy names, in execution order.
    pub fn pass_names(&self) -> impl Iterator<Item = &str> {
        self.pass_metadatas.iter().map(|p| p.name.as_str())
    }

    /// The before/after barrier spans of a pass copy, by exact copy name
    /// (for amplified passes, `name#N`) or by registered name for
    /// single-copy passes.
    pub fn pass_barriers(&self, pass: &str) -> Option<(&[BarrierRecord], &[BarrierRecord])> {
        let index = self.pass_metadatas.iter().position(|p| p.name == pass)?;
        let span = &self.barrier_spans[index];
        Some((
            &self.barriers[span.before.range()],
            &self.barriers[span.after.range()],
        ))
    }

    /// The complete synthesized barrier list.
    pub fn barrier_records(&self) -> &[BarrierRecord] {
        &self.barriers
    }

    /// Names of all physical resource instances (amplified resources show
    /// up as `name#N`).
    pub fn resource_names(&self) -> impl Iterator<Item = &str> {
        self.resources.iter().map(|r| r.name.as_str())
    }

    /// The allocation description of a graph-owned resource instance.
    /// `None` for the backbuffer and for unknown names.
    pub fn resource_description(&self, resource: &str) -> Option<&crate::alloc::ImageDescription> {
        self.resources
            .iter()
            .find(|r| r.name == resource)?
            .description
            .as_ref()
    }

    /// Length of the circular subresource chain of a resource instance:
    /// the number of `next` hops needed to return to the first use.
    pub fn chain_length(&self, resource: &str) -> Option<usize> {
        let head = self.resources.iter().find(|r| r.name == resource)?.head_node;
        if head == INVALID_INDEX {
            return None;
        }
        let mut length = 0;
        let mut current = head;
        loop {
            length += 1;
            current = self.nodes[current as usize].next_node;
            if current == head || length > self.nodes.len() {
                break;
            }
        }
        Some(length)
    }

    /// The pass copies a resource instance's chain visits, in chain order.
    /// Helper nodes report the pass copy they were cloned from.
    pub fn chain_passes(&self, resource: &str) -> Option<Vec<String>> {
        let head = self.resources.iter().find(|r| r.name == resource)?.head_node;
        if head == INVALID_INDEX {
            return None;
        }
        let mut names = Vec::new();
        let mut current = head;
        loop {
            let owner = self
                .pass_metadatas
                .iter()
                .find(|p| p.subresources.range().contains(&(current as usize)))
                .or_else(|| {
                    // Helper nodes sit outside every pass span; report the
                    // pass whose primary node they mirror.
                    let instance = self.nodes[current as usize].resource_index;
                    self.pass_metadatas.iter().find(|p| {
                        self.nodes[p.subresources.range()]
                            .iter()
                            .any(|n| n.resource_index == instance)
                    })
                });
            names.push(owner.map(|p| p.name.clone()).unwrap_or_default());
            current = self.nodes[current as usize].next_node;
            if current == head || names.len() > self.nodes.len() {
                break;
            }
        }
        Some(names)
    }

    /// Number of physical images the graph references (including the
    /// backbuffer slot).
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// All view descriptions. Backbuffer views reflect the swapchain image
    /// of the most recent traversal.
    pub fn views(&self) -> &[ImageViewDesc] {
        &self.views
    }

    /// The frame graph configuration.
    pub fn config(&self) -> &FrameGraphConfig {
        &self.config
    }
}
