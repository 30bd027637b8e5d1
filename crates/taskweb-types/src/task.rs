//! Task records, priorities, and the draft/patch shapes used by commands.

use serde::{Deserialize, Deserializer, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::ids::{ColumnId, TaskId, UserId};

/// Task priority.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Every priority, highest first (dashboard bar order).
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];
}

/// Persisted task document (`boards/{board}/tasks/{id}`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub column_id: ColumnId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    /// `YYYY-MM-DD`; an empty string is read as absent.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub due_date: Option<String>,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub created_by: Option<UserId>,
    #[serde(default)]
    pub created_at: Option<u64>,
    #[serde(default)]
    pub updated_at: Option<u64>,
    /// Advisory edit lock. Not enforced by the store.
    #[serde(default)]
    pub locked_by: Option<UserId>,
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// A task on a board.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub column_id: ColumnId,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub due_date: Option<String>,
    pub order: i64,
    pub created_by: Option<UserId>,
    pub created_at: Option<u64>,
    pub updated_at: Option<u64>,
    pub locked_by: Option<UserId>,
}

impl Task {
    pub fn from_record(id: TaskId, record: TaskRecord) -> Self {
        Self {
            id,
            column_id: record.column_id,
            title: record.title,
            description: record.description,
            priority: record.priority,
            due_date: record.due_date,
            order: record.order,
            created_by: record.created_by,
            created_at: record.created_at,
            updated_at: record.updated_at,
            locked_by: record.locked_by,
        }
    }

    /// Locked by someone other than `viewer`: read-only for them.
    pub fn is_locked_for(&self, viewer: UserId) -> bool {
        matches!(self.locked_by, Some(holder) if holder != viewer)
    }
}

/// Sort tasks for display: by `(column_id, order)`.
///
/// Stable, so tasks with equal keys keep the order the store delivered them
/// in (creation time, newest first).
pub fn sort_tasks(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| a.column_id.cmp(&b.column_id).then(a.order.cmp(&b.order)));
}

/// Fields for a new task. Creator, timestamps, order, and lock are filled in
/// by the command layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskDraft {
    pub column_id: ColumnId,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub due_date: Option<String>,
}

impl TaskDraft {
    pub fn new(column_id: ColumnId, title: impl Into<String>) -> Self {
        Self {
            column_id,
            title: title.into(),
            description: String::new(),
            priority: Priority::default(),
            due_date: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_due_date(mut self, due_date: impl Into<String>) -> Self {
        self.due_date = Some(due_date.into());
        self
    }
}

/// Partial task update. `None` leaves a field untouched; for `due_date`,
/// `Some(None)` clears it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub column_id: Option<ColumnId>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<Option<String>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

impl From<TaskDraft> for TaskPatch {
    /// The edit form always submits every field.
    fn from(draft: TaskDraft) -> Self {
        Self {
            column_id: Some(draft.column_id),
            title: Some(draft.title),
            description: Some(draft.description),
            priority: Some(draft.priority),
            due_date: Some(draft.due_date),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
