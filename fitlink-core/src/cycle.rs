//! Circular-reference detection for directional links
//!
//! Adding `source -> target` closes a cycle exactly when a path
//! `target -> ... -> source` already exists, so the check walks outbound
//! edges from `target` looking for `source`:
//! - explicit work list (no recursion), visited set keyed by exercise id
//! - only WARMUP/COOLDOWN edges are followed; WORKOUT edges mirror them and
//!   ALTERNATIVE pairs are symmetric by construction
//! - a failed lookup on an intermediate node makes it a dead end; a failed
//!   lookup on `target` itself is returned to the caller

use std::collections::{HashMap, HashSet};

use crate::gateway::{LinkRepository, RepositoryError};
use crate::ids::ExerciseId;
use crate::models::ExerciseLink;

/// Pure traversal over an in-memory adjacency map (directional edges only).
pub fn is_acyclic_core(
    source: ExerciseId,
    target: ExerciseId,
    adjacency: &HashMap<ExerciseId, Vec<ExerciseId>>,
) -> bool {
    let mut visited: HashSet<ExerciseId> = HashSet::new();
    let mut stack = vec![target];

    while let Some(node) = stack.pop() {
        if !visited.insert(node) {
            continue;
        }
        let Some(neighbors) = adjacency.get(&node) else {
            continue;
        };
        for next in neighbors {
            if *next == source {
                return false;
            }
            if !visited.contains(next) {
                stack.push(*next);
            }
        }
    }

    true
}

/// Build the directional adjacency map from a list of edges.
pub fn directional_adjacency(edges: &[ExerciseLink]) -> HashMap<ExerciseId, Vec<ExerciseId>> {
    let mut adjacency: HashMap<ExerciseId, Vec<ExerciseId>> = HashMap::new();
    for edge in edges.iter().filter(|e| e.is_active && e.link_type.is_directional()) {
        adjacency
            .entry(edge.source_exercise_id)
            .or_default()
            .push(edge.target_exercise_id);
    }
    adjacency
}

/// Whether committing `source -> target` keeps the directional graph acyclic.
///
/// Issues one `get_outbound_edges` lookup per visited node, sequentially.
pub async fn is_acyclic_after_adding(
    repository: &dyn LinkRepository,
    source: ExerciseId,
    target: ExerciseId,
) -> Result<bool, RepositoryError> {
    if source == target {
        return Ok(false);
    }

    let mut visited: HashSet<ExerciseId> = HashSet::new();
    let mut stack = vec![target];

    while let Some(node) = stack.pop() {
        if !visited.insert(node) {
            continue;
        }

        let edges = match repository.get_outbound_edges(node).await {
            Ok(edges) => edges,
            Err(e) if node == target => return Err(e),
            Err(e) => {
                tracing::warn!(
                    exercise_id = %node,
                    error = %e,
                    "Cycle check lookup failed, treating node as dead end"
                );
                continue;
            }
        };

        for edge in edges
            .iter()
            .filter(|e| e.is_active && e.link_type.is_directional())
        {
            if edge.target_exercise_id == source {
                tracing::debug!(
                    source = %source,
                    target = %target,
                    via = %node,
                    "Circular reference detected"
                );
                return Ok(false);
            }
            if !visited.contains(&edge.target_exercise_id) {
                stack.push(edge.target_exercise_id);
            }
        }
    }

    Ok(true)
}

// ============================================================================
// TESTS
// ============================================================================
