use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of id characters shown in list output
const SHORT_ID_LEN: usize = 8;

/// Opaque task identifier. Assigned once at creation and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        TaskId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading characters of the id, used for display and prefix lookup
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(SHORT_ID_LEN) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single to-do item.
///
/// Persisted as `{"id": "...", "text": "...", "completed": false}`.
/// `text` is trimmed and non-empty; that is enforced by the task store,
/// which is the only place tasks are created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub text: String,
    pub completed: bool,
}

impl Task {
    /// Create a new, not yet completed task
    pub fn new(id: TaskId, text: impl Into<String>) -> Self {
        Task {
            id,
            text: text.into(),
            completed: false,
        }
    }

    /// Copy of this task with `completed` flipped
    pub fn toggled(&self) -> Self {
        Task {
            completed: !self.completed,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_plain_string_id() {
        let task = Task::new(TaskId::new("abc"), "Buy milk");
        let json = serde_json::to_string(&task).unwrap();
        assert_eq!(json, r#"{"id":"abc","text":"Buy milk","completed":false}"#);
    }

    #[test]
    fn deserializes_persisted_layout() {
        let task: Task =
            serde_json::from_str(r#"{"id":"x-1","text":"Walk dog","completed":true}"#).unwrap();
        assert_eq!(task.id.as_str(), "x-1");
        assert_eq!(task.text, "Walk dog");
        assert!(task.completed);
    }

    #[test]
    fn short_id_truncates_long_ids_only() {
        let long = TaskId::new("0123456789abcdef");
        assert_eq!(long.short(), "01234567");
        let short = TaskId::new("t1");
        assert_eq!(short.short(), "t1");
    }

    #[test]
    fn toggled_keeps_id_and_text() {
        let task = Task::new(TaskId::new("a"), "Read");
        let flipped = task.toggled();
        assert!(flipped.completed);
        assert_eq!(flipped.id, task.id);
        assert_eq!(flipped.text, "Read");
        assert!(!flipped.toggled().completed);
    }
}
