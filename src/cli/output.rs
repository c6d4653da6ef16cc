use serde::Serialize;

use crate::model::filter::Filter;
use crate::model::task::Task;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

/// Everything a renderer needs: the full list, the filter and its view
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListJson<'a> {
    pub tasks: &'a [Task],
    pub filter: Filter,
    pub filtered_tasks: Vec<&'a Task>,
}

// ---------------------------------------------------------------------------
// Text formatting
// ---------------------------------------------------------------------------

/// Checkbox shown in front of a task
fn checkbox(task: &Task) -> &'static str {
    if task.completed { "[x]" } else { "[ ]" }
}

/// One line per task: 1-based view position, checkbox, text, short id.
/// An empty view is described by the filter's empty message.
pub fn format_task_list(view: &[&Task], filter: Filter) -> String {
    if view.is_empty() {
        return filter.empty_message().to_string();
    }
    let width = view.len().to_string().len();
    view.iter()
        .enumerate()
        .map(|(i, task)| {
            format!(
                "{:>width$}. {} {}  ({})",
                i + 1,
                checkbox(task),
                task.text,
                task.id.short(),
                width = width
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Single-task summary used after add/toggle/rm
pub fn format_task_line(verb: &str, task: &Task) -> String {
    format!("{} {} {}  ({})", verb, checkbox(task), task.text, task.id.short())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::TaskId;
    use insta::assert_snapshot;

    fn task(id: &str, text: &str, completed: bool) -> Task {
        Task {
            id: TaskId::new(id),
            text: text.to_string(),
            completed,
        }
    }

    #[test]
    fn list_with_mixed_tasks() {
        let tasks = vec![
            task("4f9c2a1e-0000-4000-8000-000000000001", "Buy milk", false),
            task("b71d03aa-0000-4000-8000-000000000002", "Walk the dog", true),
        ];
        let view: Vec<&Task> = tasks.iter().collect();
        assert_snapshot!(format_task_list(&view, Filter::All), @r"
        1. [ ] Buy milk  (4f9c2a1e)
        2. [x] Walk the dog  (b71d03aa)
        ");
    }

    #[test]
    fn positions_are_right_aligned() {
        let tasks: Vec<Task> = (1..=10)
            .map(|n| task(&format!("id{}", n), &format!("task {}", n), false))
            .collect();
        let view: Vec<&Task> = tasks.iter().collect();
        let out = format_task_list(&view, Filter::Pending);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 10);
        assert_eq!(lines[0], " 1. [ ] task 1  (id1)");
        assert_eq!(lines[9], "10. [ ] task 10  (id10)");
    }

    #[test]
    fn empty_views_use_filter_message() {
        assert_snapshot!(format_task_list(&[], Filter::All), @"No tasks here yet!");
        assert_snapshot!(format_task_list(&[], Filter::Pending), @"No pending tasks.");
        assert_snapshot!(format_task_list(&[], Filter::Completed), @"No completed tasks.");
    }

    #[test]
    fn list_json_uses_camel_case() {
        let tasks = vec![task("a", "A", true), task("b", "B", false)];
        let json = ListJson {
            tasks: &tasks,
            filter: Filter::Completed,
            filtered_tasks: tasks.iter().filter(|t| t.completed).collect(),
        };
        let value = serde_json::to_value(&json).unwrap();
        assert_eq!(value["filter"], "completed");
        assert_eq!(value["tasks"].as_array().unwrap().len(), 2);
        assert_eq!(value["filteredTasks"][0]["id"], "a");
    }

    #[test]
    fn task_line() {
        let t = task("abcdef123456", "Read book", true);
        assert_eq!(format_task_line("completed", &t), "completed [x] Read book  (abcdef12)");
    }
}
