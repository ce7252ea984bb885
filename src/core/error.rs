//! Exposes the deimos error type

use thiserror::Error;

/// Error type that deimos can return.
#[derive(Error, Debug)]
pub enum Error {
    /// A pass with this name was already registered.
    #[error("Pass `{0}` is already registered.")]
    DuplicatePass(String),
    /// A pass with this name was never registered.
    #[error("Pass `{0}` is not registered.")]
    PassNotFound(String),
    /// A subresource role with this id was never registered on the pass.
    #[error("Subresource `{1}` of pass `{0}` is not registered.")]
    SubresourceNotFound(String, String),
    /// A subresource role was registered twice in the same direction.
    #[error("Subresource `{1}` of pass `{0}` is already registered.")]
    DuplicateSubresource(String, String),
    /// A subresource role was registered but never bound to a shared
    /// resource name, so the builder cannot tell which resource it refers to.
    #[error("Subresource `{1}` of pass `{0}` has no resource name bound.")]
    UnboundSubresource(String, String),
    /// The pass graph contains a cyclic dependency and has no valid
    /// execution order.
    #[error("Pass graph contains a cycle.")]
    GraphHasCycle,
    /// A pass uses both a per-frame resource and a per-backbuffer resource.
    /// No single frame index walks both periods coherently.
    #[error("Pass `{0}` mixes per-frame and per-backbuffer resources.")]
    MixedFramePeriods(String),
    /// A backbuffer name was bound but no pass references it.
    #[error("Backbuffer `{0}` is not referenced by any pass.")]
    BackbufferNotUsed(String),
    /// A subresource still has an unknown format or state when barrier
    /// synthesis runs. This indicates a bug in payload propagation or a
    /// resource no pass ever fully described.
    #[error("Resource `{0}` has an unresolved format or state after propagation.")]
    UnresolvedPayload(String),
    /// Uncategorized error.
    #[error("Uncategorized error: `{0}`")]
    Uncategorized(&'static str),
}
