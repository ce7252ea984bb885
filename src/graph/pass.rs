//! Pass executors: the opaque per-pass recording callbacks the host
//! renderer supplies.
//!
//! The frame graph knows nothing about what a pass draws. At traversal it
//! emits the pass's before-barriers, hands the level's recorder and a
//! [`RecordContext`] to the pass's executor, and emits the after-barriers.
//! Executors are created once per recorded pass copy at build time through
//! the factory given to
//! [`FrameGraphBuilder::set_pass_executor`](crate::graph::description::FrameGraphBuilder::set_pass_executor);
//! a pass cycling with the swapchain gets one executor per swapchain image
//! so each copy can bake resources for its image up front.

use anyhow::Result;

use crate::core::config::FrameGraphConfig;
use crate::graph::metadata::INVALID_INDEX;
use crate::graph::view::ImageViewDesc;
use crate::resource::ImageHandle;
use crate::submit::CommandRecorder;

/// Defines a pass executor that is called when the pass is recorded.
pub trait PassExecutor<R: CommandRecorder> {
    /// Record this pass into the given recorder.
    fn record(&mut self, recorder: &mut R, ctx: &RecordContext) -> Result<()>;
}

impl<R, F> PassExecutor<R> for F
where
    R: CommandRecorder,
    F: FnMut(&mut R, &RecordContext) -> Result<()>,
{
    /// Record this pass by calling the given function.
    fn record(&mut self, recorder: &mut R, ctx: &RecordContext) -> Result<()> {
        self(recorder, ctx)
    }
}

/// An executor that records nothing. Every pass starts with one until the
/// host renderer installs its own.
pub struct EmptyPassExecutor;

impl EmptyPassExecutor {
    /// Create a new empty pass executor in a [`Box`].
    pub fn new_boxed() -> Box<Self> {
        Box::new(EmptyPassExecutor)
    }
}

impl<R: CommandRecorder> PassExecutor<R> for EmptyPassExecutor {
    fn record(&mut self, _recorder: &mut R, _ctx: &RecordContext) -> Result<()> {
        Ok(())
    }
}

/// Resolved binding of one subresource role of a recorded pass copy.
#[derive(Debug, Clone)]
pub(crate) struct RoleBinding {
    pub role: String,
    pub view_index: u32,
    pub image_index: u32,
}

/// Everything a pass executor may ask about the frame being recorded.
pub struct RecordContext<'a> {
    pub(crate) config: &'a FrameGraphConfig,
    pub(crate) pass_name: &'a str,
    pub(crate) frame_index: u32,
    pub(crate) swapchain_image_index: u32,
    pub(crate) frame_slot: u32,
    pub(crate) roles: &'a [RoleBinding],
    pub(crate) views: &'a [ImageViewDesc],
    pub(crate) images: &'a [ImageHandle],
}

impl<'a> RecordContext<'a> {
    /// The frame graph configuration (viewport extent, frames in flight).
    pub fn config(&self) -> &FrameGraphConfig {
        self.config
    }

    /// Name of the pass copy being recorded.
    pub fn pass_name(&self) -> &str {
        self.pass_name
    }

    /// Monotonic frame index passed to `traverse`.
    pub fn frame_index(&self) -> u32 {
        self.frame_index
    }

    /// Swapchain image index acquired for this frame.
    pub fn swapchain_image_index(&self) -> u32 {
        self.swapchain_image_index
    }

    /// Frame index modulo frames-in-flight.
    pub fn frame_slot(&self) -> u32 {
        self.frame_slot
    }

    /// The view bound to one of this pass's subresource roles, if the role
    /// has a view (copy-only and present roles do not).
    pub fn view(&self, role: &str) -> Option<&ImageViewDesc> {
        let binding = self.roles.iter().find(|b| b.role == role)?;
        if binding.view_index == INVALID_INDEX {
            return None;
        }
        self.views.get(binding.view_index as usize)
    }

    /// The physical image behind one of this pass's subresource roles.
    pub fn image(&self, role: &str) -> Option<ImageHandle> {
        let binding = self.roles.iter().find(|b| b.role == role)?;
        self.images.get(binding.image_index as usize).copied()
    }
}

/// One recorded copy of a pass in the built graph.
#[derive(Derivative)]
#[derivative(Debug)]
pub(crate) struct PassCopy<R: CommandRecorder> {
    pub name: String,
    pub roles: Vec<RoleBinding>,
    #[derivative(Debug = "ignore")]
    pub executor: Box<dyn PassExecutor<R> + Send>,
}
