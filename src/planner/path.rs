use tracing::trace;

use crate::{planner::state::State, repository::Repository};

/// Walks parent links from `target_label` back to the origin and returns
/// the label indexes in travel order.
pub(crate) fn backtrack(repository: &Repository, state: &State, target_label: u32) -> Vec<u32> {
    let mut path: Vec<u32> = Vec::new();
    let mut current = Some(target_label);

    while let Some(label_idx) = current {
        let label = &state.labels[label_idx as usize];
        let stop = &repository.stops[label.stop_idx as usize];
        trace!(
            "Backtracking through stop: [{}] {} at {}",
            stop.id, stop.name, label.arrival
        );
        path.push(label_idx);
        current = label.parent;
    }
    path.reverse();
    path
}
