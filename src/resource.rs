//! Formats, resource states, access/stage masks and opaque physical handles.

use bitflags::bitflags;

/// Element format of a frame graph image.
///
/// `Unknown` marks a subresource whose format has not been specified by its
/// pass; payload propagation fills it in from the other passes sharing the
/// resource. `Typeless` is the type-erased allocation format used when the
/// passes sharing one resource disagree on the element format; the views
/// created per pass retain their concrete formats.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Format {
    #[default]
    Unknown,
    Rgba8Unorm,
    Bgra8Unorm,
    Rgba16Float,
    Rgba32Float,
    R32Float,
    Depth24Stencil8,
    Depth32Float,
    Typeless,
}

impl Format {
    /// Whether the format is still unresolved.
    pub fn is_unknown(&self) -> bool {
        matches!(self, Format::Unknown)
    }

    /// Whether the format carries a depth (and possibly stencil) aspect.
    pub fn is_depth_stencil(&self) -> bool {
        matches!(self, Format::Depth24Stencil8 | Format::Depth32Float)
    }
}

/// Access state of a resource as seen by one pass.
///
/// This is the unit the transition policy reasons about: a barrier is a
/// transition from one state to another. `Common` is the API default state
/// that resources decay to and promote from; `Undefined` marks a payload
/// whose state has not been resolved yet and is illegal once barrier
/// synthesis runs.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ResourceState {
    #[default]
    Undefined,
    Common,
    RenderTarget,
    DepthWrite,
    DepthRead,
    ShaderResource,
    UnorderedAccess,
    CopySource,
    CopyDest,
    Present,
}

impl ResourceState {
    /// Whether the state is still unresolved.
    pub fn is_undefined(&self) -> bool {
        matches!(self, ResourceState::Undefined)
    }
}

bitflags! {
    /// Memory access kinds a pass performs on a subresource.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct AccessMask: u32 {
        const SHADER_READ = 1 << 0;
        const SHADER_WRITE = 1 << 1;
        const COLOR_WRITE = 1 << 2;
        const DEPTH_READ = 1 << 3;
        const DEPTH_WRITE = 1 << 4;
        const TRANSFER_READ = 1 << 5;
        const TRANSFER_WRITE = 1 << 6;
    }
}

bitflags! {
    /// Pipeline stages in which a pass touches a subresource.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct PipelineStageMask: u32 {
        const VERTEX_SHADER = 1 << 0;
        const FRAGMENT_SHADER = 1 << 1;
        const COMPUTE_SHADER = 1 << 2;
        const EARLY_FRAGMENT_TESTS = 1 << 3;
        const LATE_FRAGMENT_TESTS = 1 << 4;
        const COLOR_ATTACHMENT_OUTPUT = 1 << 5;
        const TRANSFER = 1 << 6;
        const BOTTOM_OF_PIPE = 1 << 7;
    }
}

bitflags! {
    /// View classes a physical image must support. The union of these over a
    /// resource's whole chain decides the usage flags of its allocation.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct ViewUsage: u32 {
        const SHADER_RESOURCE = 1 << 0;
        const STORAGE = 1 << 1;
        const RENDER_TARGET = 1 << 2;
        const DEPTH_STENCIL = 1 << 3;
    }
}

impl Default for AccessMask {
    fn default() -> Self {
        AccessMask::empty()
    }
}

impl Default for PipelineStageMask {
    fn default() -> Self {
        PipelineStageMask::empty()
    }
}

impl Default for ViewUsage {
    fn default() -> Self {
        ViewUsage::empty()
    }
}

/// Opaque handle to a physical image owned by a collaborator (the pool
/// allocator or the swapchain).
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ImageHandle(pub u64);

impl ImageHandle {
    /// Handle of an image that has not been supplied yet. The backbuffer
    /// slot holds this between graph construction and the first traversal.
    pub fn null() -> Self {
        ImageHandle(0)
    }

    /// Whether this is the null handle.
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

/// Opaque handle to a memory pool/heap owned by the allocator collaborator.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct PoolHandle(pub u64);
