//! Filtered, searched and sorted projections of the task collection

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::task::{Task, TaskStatus};

/// Which statuses a view shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Completed,
}

impl StatusFilter {
    fn admits(&self, status: TaskStatus) -> bool {
        match self {
            Self::All => true,
            Self::Pending => status == TaskStatus::Pending,
            Self::Completed => status == TaskStatus::Completed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    CreatedAt,
    Priority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// View settings chosen in the list UI
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewQuery {
    pub filter: StatusFilter,
    pub sort: SortKey,
    pub direction: SortDirection,
    /// Case-insensitive title substring, matched as given; empty means no search
    pub search: String,
}

impl ViewQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: StatusFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_sort(mut self, sort: SortKey) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_direction(mut self, direction: SortDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    fn compare(&self, a: &Task, b: &Task) -> Ordering {
        let ascending = match self.sort {
            SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
            SortKey::Priority => a.priority.rank().cmp(&b.priority.rank()),
        };
        match self.direction {
            SortDirection::Asc => ascending,
            SortDirection::Desc => ascending.reverse(),
        }
    }
}

/// Project `tasks` through `query`.
///
/// Filters by status, then by title, then sorts. The sort is stable so
/// equal keys keep their relative order from `tasks`. The input is never
/// modified.
pub fn derive(tasks: &[Task], query: &ViewQuery) -> Vec<Task> {
    let needle = query.search.to_lowercase();

    let mut view: Vec<Task> = tasks
        .iter()
        .filter(|t| query.filter.admits(t.status))
        .filter(|t| needle.is_empty() || t.title.to_lowercase().contains(&needle))
        .cloned()
        .collect();

    // slice::sort_by is stable
    view.sort_by(|a, b| query.compare(a, b));
    view
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{TaskDraft, TaskPriority};
    use chrono::{Duration, Utc};

    fn task(title: &str, minutes_ago: i64, priority: TaskPriority, status: TaskStatus) -> Task {
        let mut task = Task::from_draft(
            TaskDraft::new(title)
                .with_priority(priority)
                .with_status(status),
            Utc::now() - Duration::minutes(minutes_ago),
        );
        task.id = title.to_string();
        task
    }

    fn sample() -> Vec<Task> {
        vec![
            task("Write report", 30, TaskPriority::Medium, TaskStatus::Pending),
            task("Fix login bug", 10, TaskPriority::High, TaskStatus::Completed),
            task("Plan sprint", 20, TaskPriority::Low, TaskStatus::Pending),
            task("Review report", 40, TaskPriority::High, TaskStatus::Pending),
        ]
    }

    fn ids(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn test_default_sorts_newest_first() {
        let view = derive(&sample(), &ViewQuery::new());
        assert_eq!(
            ids(&view),
            vec!["Fix login bug", "Plan sprint", "Write report", "Review report"]
        );
    }

    #[test]
    fn test_filter_by_status() {
        let tasks = sample();
        let pending = derive(&tasks, &ViewQuery::new().with_filter(StatusFilter::Pending));
        let completed = derive(&tasks, &ViewQuery::new().with_filter(StatusFilter::Completed));

        assert_eq!(pending.len(), 3);
        assert!(pending.iter().all(|t| t.status == TaskStatus::Pending));
        assert_eq!(ids(&completed), vec!["Fix login bug"]);
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let view = derive(&sample(), &ViewQuery::new().with_search("REPORT"));
        assert_eq!(ids(&view), vec!["Write report", "Review report"]);
    }

    #[test]
    fn test_search_whitespace_is_significant() {
        let trailing = derive(&sample(), &ViewQuery::new().with_search("report "));
        assert!(trailing.is_empty());

        let tasks = vec![task("Deploy", 0, TaskPriority::Low, TaskStatus::Pending)];
        let space = derive(&tasks, &ViewQuery::new().with_search(" "));
        assert!(space.is_empty());
    }

    #[test]
    fn test_search_composes_with_filter() {
        let query = ViewQuery::new()
            .with_filter(StatusFilter::Completed)
            .with_search("report");
        assert!(derive(&sample(), &query).is_empty());
    }

    #[test]
    fn test_priority_sort_is_stable() {
        let view = derive(&sample(), &ViewQuery::new().with_sort(SortKey::Priority));
        // Both High tasks keep their input order, as do the rest
        assert_eq!(
            ids(&view),
            vec!["Fix login bug", "Review report", "Write report", "Plan sprint"]
        );
    }

    #[test]
    fn test_priority_sort_ascending_keeps_ties_stable() {
        let query = ViewQuery::new()
            .with_sort(SortKey::Priority)
            .with_direction(SortDirection::Asc);
        let view = derive(&sample(), &query);
        assert_eq!(
            ids(&view),
            vec!["Plan sprint", "Write report", "Fix login bug", "Review report"]
        );
    }

    #[test]
    fn test_equal_timestamps_keep_input_order() {
        let now = Utc::now();
        let mut tasks: Vec<Task> = ["a", "b", "c"]
            .iter()
            .map(|id| {
                let mut t = Task::from_draft(TaskDraft::new(*id), now);
                t.id = id.to_string();
                t
            })
            .collect();
        tasks.rotate_left(1);

        let view = derive(&tasks, &ViewQuery::new());
        assert_eq!(ids(&view), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_derive_is_idempotent_and_pure() {
        let tasks = sample();
        let before = tasks.clone();
        let query = ViewQuery::new()
            .with_sort(SortKey::Priority)
            .with_search("r");

        let first = derive(&tasks, &query);
        let second = derive(&tasks, &query);

        assert_eq!(first, second);
        assert_eq!(tasks, before);
    }
}
