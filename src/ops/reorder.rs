use std::cmp::Ordering;
use std::collections::HashMap;

use crate::model::task::{Task, TaskId};

/// Outcome of a drag gesture over the filtered view.
///
/// Indices are positions within the filtered view. `destination` is `None`
/// when the item was dropped outside any valid target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragResult {
    pub source: usize,
    pub destination: Option<usize>,
}

impl DragResult {
    pub fn new(source: usize, destination: usize) -> Self {
        DragResult {
            source,
            destination: Some(destination),
        }
    }

    /// A drag released outside the list
    pub fn cancelled(source: usize) -> Self {
        DragResult {
            source,
            destination: None,
        }
    }
}

/// Move the item at `source` to `destination` within `view`.
///
/// `destination` is an index into the list after removal and is clamped to
/// its end. Returns `None` if `source` is out of range.
pub fn move_within(view: &[Task], source: usize, destination: usize) -> Option<Vec<Task>> {
    if source >= view.len() {
        return None;
    }
    let mut moved = view.to_vec();
    let item = moved.remove(source);
    let destination = destination.min(moved.len());
    moved.insert(destination, item);
    Some(moved)
}

/// Reorder the full list so it agrees with a reordered filtered view.
///
/// Tasks present in `reordered_view` come first, in view order. The rest
/// follow in their original relative order. Visible tasks therefore end up
/// as one block at the front, even if hidden tasks were interleaved with
/// them before.
pub fn reconcile(full: &[Task], reordered_view: &[Task]) -> Vec<Task> {
    let ranks: HashMap<&TaskId, usize> = reordered_view
        .iter()
        .enumerate()
        .map(|(rank, task)| (&task.id, rank))
        .collect();

    let mut result = full.to_vec();
    // Stable: unranked tasks keep their original relative order
    result.sort_by(|a, b| match (ranks.get(&a.id), ranks.get(&b.id)) {
        (Some(ra), Some(rb)) => ra.cmp(rb),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn task(id: &str, completed: bool) -> Task {
        Task {
            id: TaskId::new(id),
            text: id.to_string(),
            completed,
        }
    }

    fn ids(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn move_within_forward_and_back() {
        let view = vec![task("a", false), task("b", false), task("c", false)];
        assert_eq!(ids(&move_within(&view, 0, 2).unwrap()), vec!["b", "c", "a"]);
        assert_eq!(ids(&move_within(&view, 2, 0).unwrap()), vec!["c", "a", "b"]);
        assert_eq!(ids(&move_within(&view, 1, 1).unwrap()), vec!["a", "b", "c"]);
    }

    #[test]
    fn move_within_clamps_destination() {
        let view = vec![task("a", false), task("b", false)];
        assert_eq!(ids(&move_within(&view, 0, 10).unwrap()), vec!["b", "a"]);
    }

    #[test]
    fn move_within_rejects_bad_source() {
        let view = vec![task("a", false)];
        assert!(move_within(&view, 1, 0).is_none());
        assert!(move_within(&[], 0, 0).is_none());
    }

    #[test]
    fn pending_view_drag_pulls_visible_block_to_front() {
        // [A(done), B, C(done), D], pending view [B, D], drag D to 0
        let full = vec![task("A", true), task("B", false), task("C", true), task("D", false)];
        let view: Vec<Task> = full.iter().filter(|t| !t.completed).cloned().collect();

        let reordered = move_within(&view, 1, 0).unwrap();
        assert_eq!(ids(&reordered), vec!["D", "B"]);

        let result = reconcile(&full, &reordered);
        assert_eq!(ids(&result), vec!["D", "B", "A", "C"]);
    }

    #[test]
    fn full_view_drag_is_plain_move() {
        let full = vec![task("a", false), task("b", true), task("c", false)];
        let reordered = move_within(&full, 2, 0).unwrap();
        assert_eq!(ids(&reconcile(&full, &reordered)), vec!["c", "a", "b"]);
    }

    #[test]
    fn hidden_tasks_keep_relative_order() {
        let full = vec![
            task("h1", true),
            task("v1", false),
            task("h2", true),
            task("h3", true),
            task("v2", false),
        ];
        let reordered = vec![task("v2", false), task("v1", false)];
        assert_eq!(
            ids(&reconcile(&full, &reordered)),
            vec!["v2", "v1", "h1", "h2", "h3"]
        );
    }

    #[test]
    fn reconcile_preserves_every_task() {
        let full = vec![task("a", true), task("b", false), task("c", true)];
        let reordered = vec![task("c", true), task("a", true)];
        let result = reconcile(&full, &reordered);
        assert_eq!(result.len(), full.len());
        assert_eq!(ids(&result), vec!["c", "a", "b"]);
    }

    #[test]
    fn empty_view_leaves_list_unchanged() {
        let full = vec![task("a", true), task("b", false)];
        assert_eq!(reconcile(&full, &[]), full);
    }
}
