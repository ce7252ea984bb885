//! Barrier synthesis: walks every subresource chain and decides, per
//! directed edge, whether an explicit transition is needed and on which
//! side of the edge it is recorded.
//!
//! The decision is delegated to a [`TransitionPolicy`]. For every edge
//! `prev → next` the policy is asked twice: once for the predecessor's
//! *after* slot and once for the successor's *before* slot. The two rule
//! tables are complementary: for any edge at most one of them fires, so a
//! transition is never recorded twice and never dropped. Roughly, the
//! after slot owns forward transitions and handoffs into the common/present
//! state, while the before slot owns transitions out of the common state
//! (start-of-frame acquires and post-decay re-transitions).
//!
//! [`CommonStatePolicy`] implements the rules of an API with implicit state
//! promotion and decay: a resource in the common state is implicitly
//! promoted to promotable states without a barrier, and promoted read-only
//! states decay back to the common state when crossing a queue-class
//! boundary.

use crate::domain::QueueClass;
use crate::graph::metadata::{BarrierPassSpan, BuildState, Span, SubresourceNode};
use crate::resource::{AccessMask, PipelineStageMask, ResourceState};
use crate::submit::BarrierRecord;

/// One directed edge of a subresource chain, as seen by the policy.
#[derive(Debug, Copy, Clone)]
pub struct TransitionEdge {
    pub prev_class: QueueClass,
    pub next_class: QueueClass,
    pub prev_state: ResourceState,
    pub next_state: ResourceState,
    /// The previous state was reached through implicit promotion.
    pub prev_promoted: bool,
    /// The next state is reachable through implicit promotion.
    pub next_promoted: bool,
}

/// An explicit transition the policy decided on.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StateTransition {
    pub from: ResourceState,
    pub to: ResourceState,
}

/// The queue-class transition rules of one explicit-barrier API.
///
/// Implementations must keep [`barrier_before`](TransitionPolicy::barrier_before)
/// and [`barrier_after`](TransitionPolicy::barrier_after) complementary:
/// for any edge, at most one of the two returns a transition.
pub trait TransitionPolicy {
    /// Whether a state behaves as the API's default state (the state
    /// resources decay to and promote from).
    fn is_common(&self, state: ResourceState) -> bool;
    /// Whether a state is reachable from the common state without an
    /// explicit barrier.
    fn is_promotable(&self, state: ResourceState) -> bool;
    /// Whether a state allows writes. Promoted writable states do not decay.
    fn is_writeable(&self, state: ResourceState) -> bool;
    /// Whether a state is legal on a compute queue.
    fn is_compute_friendly(&self, state: ResourceState) -> bool;

    /// Transition to record immediately before the successor's work, if any.
    fn barrier_before(&self, edge: &TransitionEdge) -> Option<StateTransition>;
    /// Transition to record immediately after the predecessor's work, if any.
    fn barrier_after(&self, edge: &TransitionEdge) -> Option<StateTransition>;
}

/// Transition rules for an API with a common default state, implicit
/// promotion out of it, and implicit decay of promoted read-only states at
/// queue-class boundaries.
pub struct CommonStatePolicy;

impl TransitionPolicy for CommonStatePolicy {
    fn is_common(&self, state: ResourceState) -> bool {
        matches!(state, ResourceState::Common | ResourceState::Present)
    }

    fn is_promotable(&self, state: ResourceState) -> bool {
        matches!(
            state,
            ResourceState::ShaderResource | ResourceState::CopySource | ResourceState::CopyDest
        )
    }

    fn is_writeable(&self, state: ResourceState) -> bool {
        matches!(
            state,
            ResourceState::RenderTarget
                | ResourceState::DepthWrite
                | ResourceState::UnorderedAccess
                | ResourceState::CopyDest
        )
    }

    fn is_compute_friendly(&self, state: ResourceState) -> bool {
        matches!(
            state,
            ResourceState::Common
                | ResourceState::Present
                | ResourceState::ShaderResource
                | ResourceState::UnorderedAccess
                | ResourceState::CopySource
                | ResourceState::CopyDest
        )
    }

    fn barrier_before(&self, edge: &TransitionEdge) -> Option<StateTransition> {
        let mut from = edge.prev_state;
        let to = edge.next_state;
        let prev_class = edge.prev_class.sync_class();
        let next_class = edge.next_class.sync_class();

        let needed = if prev_class == next_class {
            // Transitions out of the common state belong to the arriving
            // pass; everything else is the leaving pass's business.
            if self.is_common(from) && !self.is_common(to) {
                !edge.next_promoted
            } else {
                false
            }
        } else if prev_class == QueueClass::Graphics && next_class == QueueClass::Compute {
            if edge.prev_promoted && !self.is_writeable(from) {
                // Promoted read-only state decayed at the queue boundary.
                from = ResourceState::Common;
                !edge.next_promoted
            } else {
                false
            }
        } else if prev_class == QueueClass::Compute && next_class == QueueClass::Graphics {
            if edge.prev_promoted && !self.is_writeable(from) {
                from = ResourceState::Common;
                !edge.next_promoted
            } else {
                // Graphics-only target states cannot be entered from the
                // compute side; the transition waits for the graphics pass.
                !edge.next_promoted && from != to && !self.is_compute_friendly(to)
            }
        } else if next_class == QueueClass::Transfer {
            // The copy class accepts any incoming state.
            false
        } else if prev_class == QueueClass::Transfer {
            from = ResourceState::Common;
            !edge.next_promoted && !self.is_common(to)
        } else {
            false
        };

        needed.then_some(StateTransition {
            from,
            to,
        })
    }

    fn barrier_after(&self, edge: &TransitionEdge) -> Option<StateTransition> {
        let from = edge.prev_state;
        let to = edge.next_state;
        let prev_class = edge.prev_class.sync_class();
        let next_class = edge.next_class.sync_class();

        let needed = if prev_class == next_class {
            if self.is_common(from) {
                // The arriving pass handles transitions out of common.
                false
            } else if self.is_common(to) {
                // Handoff into present/common. Promoted read-only states
                // decay on their own.
                !edge.prev_promoted || self.is_writeable(from)
            } else {
                from != to
            }
        } else if prev_class == QueueClass::Graphics && next_class == QueueClass::Compute {
            if edge.prev_promoted && !self.is_writeable(from) {
                false
            } else {
                !edge.next_promoted && from != to
            }
        } else if prev_class == QueueClass::Compute && next_class == QueueClass::Graphics {
            if edge.prev_promoted && !self.is_writeable(from) {
                false
            } else {
                !edge.next_promoted && from != to && self.is_compute_friendly(to)
            }
        } else if next_class == QueueClass::Transfer {
            !edge.prev_promoted || self.is_writeable(from)
        } else if prev_class == QueueClass::Transfer {
            false
        } else {
            false
        };

        needed.then_some(StateTransition {
            from,
            to,
        })
    }
}

/// Mark every subresource whose state the API reaches implicitly, without
/// an explicit barrier. Walks passes in execution order so a promotion can
/// carry forward along same-queue same-state runs.
pub(crate) fn mark_promotions(state: &mut BuildState, policy: &dyn TransitionPolicy) {
    for pass_index in state.render_span.range() {
        let span = state.passes[pass_index].subresources;
        for node_index in span.range() {
            let (prev_state, prev_class, prev_promoted) = {
                let prev = &state.nodes[state.nodes[node_index].prev_node as usize];
                (prev.payload.state, prev.pass_class, prev.payload.promoted)
            };
            let node = &state.nodes[node_index];
            let promoted = if policy.is_common(prev_state) && policy.is_promotable(node.payload.state)
            {
                true
            } else if prev_class == node.pass_class {
                prev_promoted && prev_state == node.payload.state
            } else {
                prev_promoted
                    && !policy.is_writeable(prev_state)
                    && policy.is_promotable(node.payload.state)
            };
            state.nodes[node_index].payload.promoted = promoted;
        }
    }

    // Helper nodes mirror their primary's flag so both sides of an edge see
    // the same promotion no matter which copy of the node they go through.
    for index in 0..state.helper_primaries.len() {
        let (helper, primary) = state.helper_primaries[index];
        state.nodes[helper as usize].payload.promoted =
            state.nodes[primary as usize].payload.promoted;
    }
}

fn edge_between(prev: &SubresourceNode, next: &SubresourceNode) -> TransitionEdge {
    TransitionEdge {
        prev_class: prev.pass_class,
        next_class: next.pass_class,
        prev_state: prev.payload.state,
        next_state: next.payload.state,
        prev_promoted: prev.payload.promoted,
        next_promoted: next.payload.promoted,
    }
}

fn make_record(
    state: &BuildState,
    transition: StateTransition,
    prev: &SubresourceNode,
    next: &SubresourceNode,
) -> BarrierRecord {
    // When the policy rewrote the source state (decay), the recorded
    // accesses/stages of the previous use no longer apply.
    let (src_access, src_stage) = if transition.from == prev.payload.state {
        (prev.payload.access, prev.payload.stage)
    } else {
        (AccessMask::empty(), PipelineStageMask::empty())
    };
    BarrierRecord {
        image: state.images[next.image_index as usize],
        resource: state.resources[next.resource_index as usize].name.clone(),
        from_state: transition.from,
        to_state: transition.to,
        src_access,
        dst_access: next.payload.access,
        src_stage,
        dst_stage: next.payload.stage,
    }
}

/// Walk every pass's subresources and synthesize its before/after barrier
/// spans into the flat barrier list. Barriers touching the backbuffer are
/// remembered so traversal can repoint them at the acquired image.
pub(crate) fn build_barriers(state: &mut BuildState, policy: &dyn TransitionPolicy) {
    state.barrier_spans = vec![BarrierPassSpan::default(); state.passes.len()];

    for pass_index in state.pass_indices() {
        let span = state.passes[pass_index].subresources;
        let mut before: Vec<(BarrierRecord, bool)> = Vec::new();
        let mut after: Vec<(BarrierRecord, bool)> = Vec::new();

        for node_index in span.range() {
            let node = &state.nodes[node_index];
            if node.payload.auto_barrier {
                continue;
            }
            let on_backbuffer = node.image_index == state.backbuffer_image_index;

            let prev = &state.nodes[node.prev_node as usize];
            if let Some(transition) = policy.barrier_before(&edge_between(prev, node)) {
                before.push((make_record(state, transition, prev, node), on_backbuffer));
            }

            let next = &state.nodes[node.next_node as usize];
            if let Some(transition) = policy.barrier_after(&edge_between(node, next)) {
                after.push((make_record(state, transition, node, next), on_backbuffer));
            }
        }

        let before_begin = state.barriers.len() as u32;
        for (record, on_backbuffer) in before {
            if on_backbuffer {
                state.swapchain_barrier_indices.push(state.barriers.len() as u32);
            }
            state.barriers.push(record);
        }
        let after_begin = state.barriers.len() as u32;
        for (record, on_backbuffer) in after {
            if on_backbuffer {
                state.swapchain_barrier_indices.push(state.barriers.len() as u32);
            }
            state.barriers.push(record);
        }

        state.barrier_spans[pass_index] = BarrierPassSpan {
            before: Span::new(before_begin, after_begin),
            after: Span::new(after_begin, state.barriers.len() as u32),
        };
    }

    debug!(
        "synthesized {} barriers ({} swapchain-cycled)",
        state.barriers.len(),
        state.swapchain_barrier_indices.len()
    );
}
