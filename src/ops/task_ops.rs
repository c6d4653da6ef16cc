use crate::io::cell::PersistentCell;
use crate::io::storage::DurableStore;
use crate::model::filter::Filter;
use crate::model::task::{Task, TaskId};
use crate::ops::reorder::{self, DragResult};

/// Storage key holding the task list
pub const TASKS_KEY: &str = "tasks";

/// Source of fresh task ids
pub trait IdGenerator {
    fn next_id(&mut self) -> TaskId;
}

/// Random v4 UUIDs
#[derive(Debug, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&mut self) -> TaskId {
        TaskId::new(uuid::Uuid::new_v4().to_string())
    }
}

/// Owns the task list and the active filter.
///
/// Every mutation replaces the whole list and writes it through the
/// `"tasks"` cell. Operations on unknown ids or empty text change nothing.
pub struct TaskStore<S> {
    tasks: PersistentCell<Vec<Task>, S>,
    filter: Filter,
    ids: Box<dyn IdGenerator>,
}

impl<S: DurableStore> TaskStore<S> {
    pub fn new(store: S) -> Self {
        Self::with_id_generator(store, Box::new(UuidGenerator))
    }

    pub fn with_id_generator(store: S, ids: Box<dyn IdGenerator>) -> Self {
        TaskStore {
            tasks: PersistentCell::new(store, TASKS_KEY, Vec::new()),
            filter: Filter::default(),
            ids,
        }
    }

    /// Load persisted tasks. Until this runs the list is empty and
    /// reordering is disabled.
    pub fn hydrate(&mut self) -> bool {
        self.tasks.hydrate()
    }

    pub fn is_hydrated(&self) -> bool {
        self.tasks.is_hydrated()
    }

    /// Pick up task changes made by other contexts.
    /// Returns true if the list changed.
    pub fn sync_external(&mut self) -> bool {
        self.tasks.sync_external()
    }

    /// Like `sync_external`, but block up to `timeout` for a change first.
    pub fn wait_external(&mut self, timeout: std::time::Duration) -> bool {
        self.tasks.wait_external(timeout)
    }

    pub fn tasks(&self) -> &[Task] {
        self.tasks.get()
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    pub fn set_filter(&mut self, filter: Filter) {
        self.filter = filter;
    }

    /// Tasks matching the active filter, in list order
    pub fn filtered_tasks(&self) -> Vec<&Task> {
        self.tasks()
            .iter()
            .filter(|t| self.filter.matches(t))
            .collect()
    }

    /// Append a new task. Returns its id, or `None` if `text` is blank.
    pub fn add_task(&mut self, text: &str) -> Option<TaskId> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let id = self.ids.next_id();
        let task = Task::new(id.clone(), text);
        self.tasks.update(|prev| {
            let mut next = prev.clone();
            next.push(task);
            next
        });
        Some(id)
    }

    /// Flip `completed` on the task with this id.
    pub fn toggle_task(&mut self, id: &TaskId) -> bool {
        if !self.contains(id) {
            return false;
        }
        self.tasks.update(|prev| {
            prev.iter()
                .map(|t| if &t.id == id { t.toggled() } else { t.clone() })
                .collect()
        });
        true
    }

    /// Remove the task with this id.
    pub fn delete_task(&mut self, id: &TaskId) -> bool {
        if !self.contains(id) {
            return false;
        }
        self.tasks
            .update(|prev| prev.iter().filter(|t| &t.id != id).cloned().collect());
        true
    }

    /// Apply a drag within the filtered view to the full list.
    ///
    /// Does nothing before hydration, when the drag was cancelled, or when
    /// `source` is not a position in the filtered view.
    pub fn reorder(&mut self, drag: DragResult) -> bool {
        if !self.is_hydrated() {
            tracing::debug!("reorder ignored: task list not hydrated yet");
            return false;
        }
        let Some(destination) = drag.destination else {
            return false;
        };

        let view: Vec<Task> = self.filtered_tasks().into_iter().cloned().collect();
        let Some(reordered) = reorder::move_within(&view, drag.source, destination) else {
            tracing::debug!(source = drag.source, "reorder ignored: source out of range");
            return false;
        };

        let next = reorder::reconcile(self.tasks(), &reordered);
        self.tasks.set(next);
        true
    }

    /// Resolve a full id or a unique id prefix.
    pub fn resolve_id(&self, prefix: &str) -> Option<TaskId> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return None;
        }
        if let Some(task) = self.tasks().iter().find(|t| t.id.as_str() == prefix) {
            return Some(task.id.clone());
        }
        let mut matches = self
            .tasks()
            .iter()
            .filter(|t| t.id.as_str().starts_with(prefix));
        match (matches.next(), matches.next()) {
            (Some(task), None) => Some(task.id.clone()),
            _ => None,
        }
    }

    fn contains(&self, id: &TaskId) -> bool {
        self.tasks().iter().any(|t| &t.id == id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
