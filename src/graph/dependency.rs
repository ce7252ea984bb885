//! Pass ordering: write→read adjacency, topological sort, dependency
//! levels.
//!
//! Two passes are adjacent when one writes a resource the other reads; the
//! subresource identity comes from the shared-name binding, never from pass
//! order. The adjacency is checked for cycles up front (a cyclic pass graph
//! has no valid execution order and fails the build), then dependency
//! levels are assigned as the longest dependency path leading to each pass.
//! Passes inside one level have no ordering constraint between each other;
//! in particular, any number of passes may read the same resource without a
//! writer between them and stay in one level.

use anyhow::Result;
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;

use crate::core::error::Error;
use crate::graph::metadata::{BuildState, Span};

pub(crate) fn sort_passes(state: &mut BuildState) -> Result<()> {
    let pass_count = state.render_span.len() as usize;

    // Sorted resource index lists per pass, so the intersection test is a
    // linear merge.
    let mut reads: Vec<Vec<u32>> = vec![Vec::new(); pass_count];
    let mut writes: Vec<Vec<u32>> = vec![Vec::new(); pass_count];
    for index in 0..pass_count {
        let span = state.passes[index].subresources;
        for node in &state.nodes[span.range()] {
            if node.read {
                reads[index].push(node.resource_index);
            }
            if node.write {
                writes[index].push(node.resource_index);
            }
        }
        reads[index].sort_unstable();
        reads[index].dedup();
        writes[index].sort_unstable();
        writes[index].dedup();
    }

    let mut graph = DiGraph::<u32, u32>::new();
    let node_indices: Vec<_> = (0..pass_count).map(|i| graph.add_node(i as u32)).collect();
    for writer in 0..pass_count {
        for reader in 0..pass_count {
            if writer == reader {
                continue;
            }
            if let Some(resource) = sorted_intersect(&writes[writer], &reads[reader]) {
                graph.add_edge(node_indices[writer], node_indices[reader], resource);
            }
        }
    }

    let order = toposort(&graph, None).map_err(|_| Error::GraphHasCycle)?;

    // Longest-path dependency levels. Visiting in topological order
    // guarantees a pass's level is final before its dependents read it.
    let mut levels = vec![0u32; pass_count];
    for &node in &order {
        let pass = node.index();
        let next_level = levels[pass] + 1;
        for neighbor in graph.neighbors(node) {
            let dependent = neighbor.index();
            levels[dependent] = levels[dependent].max(next_level);
        }
    }
    for (index, level) in levels.iter().enumerate() {
        state.passes[index].dependency_level = *level;
    }

    // Stable sort keeps registration order as the tie-break inside a level,
    // which makes rebuilding from the same description deterministic.
    state.passes[..pass_count].sort_by_key(|p| p.dependency_level);

    state.level_spans.clear();
    for (index, pass) in state.passes[..pass_count].iter().enumerate() {
        match state.level_spans.last_mut() {
            Some(span) if state.passes[span.begin as usize].dependency_level == pass.dependency_level => {
                span.end = index as u32 + 1;
            }
            _ => state.level_spans.push(Span::new(index as u32, index as u32 + 1)),
        }
    }

    debug!(
        "sorted {} passes into {} dependency levels",
        pass_count,
        state.level_spans.len()
    );
    Ok(())
}

fn sorted_intersect(left: &[u32], right: &[u32]) -> Option<u32> {
    let mut l = 0;
    let mut r = 0;
    while l < left.len() && r < right.len() {
        if left[l] == right[r] {
            return Some(left[l]);
        } else if left[l] < right[r] {
            l += 1;
        } else {
            r += 1;
        }
    }
    None
}
