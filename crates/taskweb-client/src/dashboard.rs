//! Dashboard statistics over the bound board's columns and tasks.

use chrono::{DateTime, NaiveDate};
use taskweb_types::{Column, ColumnId, Priority, Task, TaskId};

use crate::constants::DATE_FORMAT;

/// UTC calendar date of a Unix-millisecond timestamp.
pub fn calendar_date(millis: u64) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(i64::try_from(millis).ok()?).map(|dt| dt.date_naive())
}

/// Parse a stored due date (`YYYY-MM-DD`).
pub fn parse_due_date(due: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(due.trim(), DATE_FORMAT).ok()
}

/// True when the task's due date is strictly before `today`. Unparseable
/// dates are never overdue.
pub fn is_overdue(task: &Task, today: NaiveDate) -> bool {
    task.due_date.as_deref().and_then(parse_due_date).is_some_and(|due| due < today)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnCount {
    pub column: ColumnId,
    pub title: String,
    pub count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecentTask {
    pub task: TaskId,
    pub title: String,
    pub priority: Priority,
    /// `None` when the task points at a column that no longer exists.
    pub column_title: Option<String>,
}

/// Aggregates shown on the dashboard view.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DashboardStats {
    pub total: usize,
    pub high_priority: usize,
    pub overdue: usize,
    /// Tasks sitting in a column titled "Done" (any case).
    pub completed: usize,
    /// One entry per column, in column order.
    pub per_column: Vec<ColumnCount>,
    /// Counts for high, medium, low, in that order.
    pub priorities: Vec<(Priority, usize)>,
    /// Most recently updated first.
    pub recent: Vec<RecentTask>,
}

impl DashboardStats {
    pub fn compute(columns: &[Column], tasks: &[Task], today: NaiveDate, recent_limit: usize) -> Self {
        let column_of = |id: ColumnId| columns.iter().find(|c| c.id == id);

        let completed = tasks
            .iter()
            .filter(|t| column_of(t.column_id).is_some_and(Column::is_done_column))
            .count();

        let per_column = columns
            .iter()
            .map(|c| ColumnCount {
                column: c.id,
                title: c.title.clone(),
                count: tasks.iter().filter(|t| t.column_id == c.id).count(),
            })
            .collect();

        let priorities = Priority::ALL
            .iter()
            .map(|p| (*p, tasks.iter().filter(|t| t.priority == *p).count()))
            .collect();

        let mut by_update: Vec<&Task> = tasks.iter().collect();
        // Stable: equal timestamps keep snapshot order
        by_update.sort_by(|a, b| b.updated_at.unwrap_or(0).cmp(&a.updated_at.unwrap_or(0)));
        let recent = by_update
            .into_iter()
            .take(recent_limit)
            .map(|t| RecentTask {
                task: t.id,
                title: t.title.clone(),
                priority: t.priority,
                column_title: column_of(t.column_id).map(|c| c.title.clone()),
            })
            .collect();

        Self {
            total: tasks.len(),
            high_priority: tasks.iter().filter(|t| t.priority == Priority::High).count(),
            overdue: tasks.iter().filter(|t| is_overdue(t, today)).count(),
            completed,
            per_column,
            priorities,
            recent,
        }
    }

    /// Share of tasks at `priority`, 0.0 to 1.0.
    pub fn priority_share(&self, priority: Priority) -> f64 {
        let count = self.priorities.iter().find(|(p, _)| *p == priority).map_or(0, |(_, n)| *n);
        count as f64 / self.total.max(1) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(order: i64, title: &str) -> Column {
        Column { id: ColumnId::new(), title: title.into(), order, created_at: None, updated_at: None }
    }

    fn task(column: &Column, priority: Priority, due: Option<&str>, updated: u64) -> Task {
        Task {
            id: TaskId::new(),
            column_id: column.id,
            title: format!("t{updated}"),
            description: String::new(),
            priority,
            due_date: due.map(String::from),
            order: 0,
            created_by: None,
            created_at: None,
            updated_at: Some(updated),
            locked_by: None,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
    }

    #[test]
    fn test_calendar_date() {
        assert_eq!(calendar_date(1_709_640_000_000), Some(today()));
    }

    #[test]
    fn test_overdue_is_strictly_before_today() {
        let col = column(0, "To Do");
        assert!(is_overdue(&task(&col, Priority::Low, Some("2024-03-04"), 0), today()));
        assert!(!is_overdue(&task(&col, Priority::Low, Some("2024-03-05"), 0), today()));
        assert!(!is_overdue(&task(&col, Priority::Low, Some("soon"), 0), today()));
        assert!(!is_overdue(&task(&col, Priority::Low, None, 0), today()));
    }

    #[test]
    fn test_compute() {
        let todo = column(0, "To Do");
        let done = column(1, "done");
        let tasks = vec![
            task(&todo, Priority::High, Some("2024-01-01"), 10),
            task(&todo, Priority::Medium, None, 30),
            task(&done, Priority::High, None, 20),
        ];
        let stats = DashboardStats::compute(&[todo.clone(), done.clone()], &tasks, today(), 2);

        assert_eq!(stats.total, 3);
        assert_eq!(stats.high_priority, 2);
        assert_eq!(stats.overdue, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(
            stats.per_column.iter().map(|c| c.count).collect::<Vec<_>>(),
            vec![2, 1]
        );
        assert_eq!(
            stats.priorities,
            vec![(Priority::High, 2), (Priority::Medium, 1), (Priority::Low, 0)]
        );
        let recent: Vec<&str> = stats.recent.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(recent, vec!["t30", "t20"]);
        assert_eq!(stats.recent[1].column_title.as_deref(), Some("done"));
    }

    #[test]
    fn test_empty_board() {
        let stats = DashboardStats::compute(&[], &[], today(), 5);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.priority_share(Priority::High), 0.0);
    }
}
