//! Advisory task locks and the task edit workflow.
//!
//! A task's `lockedBy` field marks who is editing it. The store does not
//! enforce it; clients cooperate:
//!
//! - Opening a task that is unlocked (or locked by us) writes
//!   `lockedBy = me`, fire-and-forget. A failed lock write is logged and
//!   editing continues.
//! - A task locked by someone else opens read-only and no lock is attempted.
//! - Saving skips the lock re-check; the editor took the lock at open time.
//! - Closing clears the lock if we were the editor, tolerating a task that
//!   was deleted meanwhile.
//!
//! Locks never expire. A client that crashes mid-edit leaves the task locked
//! until some client clears it with [`Commands::unlock_task`].

use taskweb_store::Fields;
use taskweb_types::{BoardId, ColumnId, Task, TaskDraft, TaskId, TaskPatch, UserId};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::codec;
use crate::commands::{Commands, required_title};
use crate::error::{BoardError, Result};
use crate::schema::{self, field};

impl Commands {
    /// Set `lockedBy` to this user. Repeating it is harmless.
    pub async fn lock_task(&self, board_id: BoardId, id: TaskId) -> Result<()> {
        let fields = Fields::new()
            .set(field::LOCKED_BY, self.user)
            .server_timestamp(field::UPDATED_AT);
        self.store.update(&schema::task(board_id, id), fields).await?;
        debug!(task = %id, "locked task");
        Ok(())
    }

    /// Clear `lockedBy`. A task that no longer exists counts as unlocked.
    pub async fn unlock_task(&self, board_id: BoardId, id: TaskId) -> Result<()> {
        let fields = Fields::new()
            .delete(field::LOCKED_BY)
            .server_timestamp(field::UPDATED_AT);
        match self.store.update(&schema::task(board_id, id), fields).await {
            Ok(()) => {
                debug!(task = %id, "unlocked task");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!(task = %id, "unlock on deleted task");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Apply `patch` to a task.
    ///
    /// Unless `skip_lock_check` is set, the task is re-read first and the
    /// update fails with `Locked` (writing nothing) when another user holds
    /// the lock.
    pub async fn update_task(
        &self,
        board_id: BoardId,
        id: TaskId,
        patch: TaskPatch,
        skip_lock_check: bool,
    ) -> Result<()> {
        let path = schema::task(board_id, id);

        if !skip_lock_check {
            let doc = self
                .store
                .get(&path)
                .await?
                .ok_or_else(|| BoardError::NotFound(format!("task {id}")))?;
            let task = codec::decode_task(&doc)?;
            if let Some(holder) = task.locked_by.filter(|_| task.is_locked_for(self.user)) {
                return Err(BoardError::Locked { task: id, holder });
            }
        }

        self.store.update(&path, patch_fields(patch)?).await?;
        debug!(task = %id, skip_lock_check, "updated task");
        Ok(())
    }
}

fn patch_fields(patch: TaskPatch) -> Result<Fields> {
    let mut fields = Fields::new().server_timestamp(field::UPDATED_AT);
    if let Some(column) = patch.column_id {
        fields = fields.set(field::COLUMN_ID, column);
    }
    if let Some(title) = patch.title {
        fields = fields.set(field::TITLE, required_title(&title, "title")?);
    }
    if let Some(description) = patch.description {
        fields = fields.set(field::DESCRIPTION, description.trim());
    }
    if let Some(priority) = patch.priority {
        fields = fields.set(field::PRIORITY, priority);
    }
    match patch.due_date {
        Some(Some(due)) if !due.trim().is_empty() => fields = fields.set(field::DUE_DATE, due.trim()),
        Some(_) => fields = fields.delete(field::DUE_DATE),
        None => {}
    }
    Ok(fields)
}

// ============================================================================
// Task editor
// ============================================================================

enum EditTarget {
    New { column: ColumnId },
    Existing { task: TaskId },
}

/// One open task editor (the task modal).
///
/// ```text
///   open(task) ──┬── unlocked / ours ──▶ lock (background) ──▶ editable
///                └── someone else's ───────────────────────▶ read-only
///   save(draft) ─▶ create, or update_task(skip_lock_check = true)
///   close()     ─▶ await pending lock ─▶ unlock if we were the editor
/// ```
pub struct TaskEditor {
    commands: Commands,
    board: BoardId,
    target: EditTarget,
    holder: Option<UserId>,
    locking: bool,
    pending_lock: Option<JoinHandle<Result<()>>>,
}

impl TaskEditor {
    /// Editor for a new task in `column`. Nothing is locked.
    pub fn create(commands: Commands, board: BoardId, column: ColumnId) -> Self {
        Self {
            commands,
            board,
            target: EditTarget::New { column },
            holder: None,
            locking: false,
            pending_lock: None,
        }
    }

    /// Open an existing task as seen in the latest snapshot.
    ///
    /// Must be called inside a tokio runtime: the lock write is spawned.
    pub fn open(commands: Commands, board: BoardId, task: &Task) -> Self {
        let holder = if task.is_locked_for(commands.user) { task.locked_by } else { None };

        let pending_lock = if holder.is_none() {
            let locker = commands.clone();
            let id = task.id;
            Some(tokio::spawn(async move {
                let result = locker.lock_task(board, id).await;
                if let Err(e) = &result {
                    warn!(task = %id, error = %e, "failed to lock task");
                }
                result
            }))
        } else {
            debug!(task = %task.id, "task locked by another user; opening read-only");
            None
        };

        Self {
            commands,
            board,
            target: EditTarget::Existing { task: task.id },
            holder,
            locking: pending_lock.is_some(),
            pending_lock,
        }
    }

    /// True when another user held the lock at open time.
    pub fn is_read_only(&self) -> bool {
        self.holder.is_some()
    }

    /// The other user holding the lock, if any.
    pub fn lock_holder(&self) -> Option<UserId> {
        self.holder
    }

    pub fn task_id(&self) -> Option<TaskId> {
        match self.target {
            EditTarget::Existing { task } => Some(task),
            EditTarget::New { .. } => None,
        }
    }

    /// Column a new task will be created in.
    pub fn column(&self) -> Option<ColumnId> {
        match self.target {
            EditTarget::New { column } => Some(column),
            EditTarget::Existing { .. } => None,
        }
    }

    /// Persist the form. Creates the task, or updates it without re-checking
    /// the lock. Read-only editors fail with `Locked`.
    pub async fn save(&mut self, draft: TaskDraft) -> Result<TaskId> {
        match self.target {
            EditTarget::New { .. } => {
                let id = self.commands.create_task(self.board, draft).await?;
                self.target = EditTarget::Existing { task: id };
                Ok(id)
            }
            EditTarget::Existing { task } => {
                if let Some(holder) = self.holder {
                    return Err(BoardError::Locked { task, holder });
                }
                self.commands.update_task(self.board, task, TaskPatch::from(draft), true).await?;
                Ok(task)
            }
        }
    }

    /// Close the editor, clearing our lock. Never fails.
    pub async fn close(mut self) {
        let EditTarget::Existing { task } = self.target else { return };

        // The clear must not be overtaken by the lock write from open()
        if let Some(pending) = self.pending_lock.take() {
            if let Err(e) = pending.await {
                warn!(task = %task, error = %e, "lock task did not complete");
            }
        }
        if !self.locking {
            return;
        }
        if let Err(e) = self.commands.unlock_task(self.board, task).await {
            warn!(task = %task, error = %e, "failed to unlock task");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use std::sync::Arc;
    use taskweb_store::{DocumentStore, MemoryStore};
    use taskweb_types::Priority;

    struct Fixture {
        store: Arc<MemoryStore>,
        alice: Commands,
        bob: Commands,
        board: BoardId,
        column: ColumnId,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let config = Arc::new(ClientConfig::default());
        let alice = Commands::new(store.clone(), UserId::new(), config.clone());
        let bob = Commands::new(store.clone(), UserId::new(), config);
        let board = alice.create_board(true, Some("Team")).await.unwrap();
        let column = alice.create_column(board, "Work").await.unwrap();
        Fixture { store, alice, bob, board, column }
    }

    async fn load(f: &Fixture, id: TaskId) -> Option<Task> {
        let doc = f.store.get(&schema::task(f.board, id)).await.unwrap()?;
        Some(codec::decode_task(&doc).unwrap())
    }

    #[tokio::test]
    async fn test_lock_is_idempotent() {
        let f = fixture().await;
        let id = f.alice.create_task(f.board, TaskDraft::new(f.column, "t")).await.unwrap();
        f.alice.lock_task(f.board, id).await.unwrap();
        f.alice.lock_task(f.board, id).await.unwrap();
        assert_eq!(load(&f, id).await.unwrap().locked_by, Some(f.alice.user()));
    }

    #[tokio::test]
    async fn test_checked_update_on_foreign_lock_fails_without_write() {
        let f = fixture().await;
        let id = f.alice.create_task(f.board, TaskDraft::new(f.column, "t")).await.unwrap();
        f.alice.lock_task(f.board, id).await.unwrap();
        f.store.clear_write_log();

        let patch = TaskPatch { title: Some("mine now".into()), ..TaskPatch::default() };
        let err = f.bob.update_task(f.board, id, patch, false).await.unwrap_err();

        assert_eq!(err, BoardError::Locked { task: id, holder: f.alice.user() });
        assert!(f.store.write_log().is_empty());
        assert_eq!(load(&f, id).await.unwrap().title, "t");
    }

    #[tokio::test]
    async fn test_checked_update_by_holder_succeeds() {
        let f = fixture().await;
        let id = f.alice.create_task(f.board, TaskDraft::new(f.column, "t")).await.unwrap();
        f.alice.lock_task(f.board, id).await.unwrap();
        let patch = TaskPatch { priority: Some(Priority::Low), ..TaskPatch::default() };
        f.alice.update_task(f.board, id, patch, false).await.unwrap();
        assert_eq!(load(&f, id).await.unwrap().priority, Priority::Low);
    }

    #[tokio::test]
    async fn test_editor_reopens_own_lock_as_editable() {
        let f = fixture().await;
        let id = f.alice.create_task(f.board, TaskDraft::new(f.column, "t")).await.unwrap();
        f.alice.lock_task(f.board, id).await.unwrap();
        let task = load(&f, id).await.unwrap();

        let editor = TaskEditor::open(f.alice.clone(), f.board, &task);
        assert!(!editor.is_read_only());
        assert_eq!(editor.lock_holder(), None);
        editor.close().await;
        assert_eq!(load(&f, id).await.unwrap().locked_by, None);

        f.alice.lock_task(f.board, id).await.unwrap();
        let task = load(&f, id).await.unwrap();
        let foreign = TaskEditor::open(f.bob.clone(), f.board, &task);
        assert_eq!(foreign.lock_holder(), Some(f.alice.user()));
    }

    #[tokio::test]
    async fn test_checked_update_on_missing_task() {
        let f = fixture().await;
        let err = f.alice.update_task(f.board, TaskId::new(), TaskPatch::default(), false).await;
        assert!(matches!(err, Err(BoardError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_unlock_tolerates_deleted_task() {
        let f = fixture().await;
        f.alice.unlock_task(f.board, TaskId::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_patch_clears_due_date() {
        let f = fixture().await;
        let draft = TaskDraft::new(f.column, "t").with_due_date("2024-01-01");
        let id = f.alice.create_task(f.board, draft).await.unwrap();
        let patch = TaskPatch { due_date: Some(None), ..TaskPatch::default() };
        f.alice.update_task(f.board, id, patch, true).await.unwrap();
        assert_eq!(load(&f, id).await.unwrap().due_date, None);
    }

    #[tokio::test]
    async fn test_editor_lock_then_unlock_on_close() {
        let f = fixture().await;
        let id = f.alice.create_task(f.board, TaskDraft::new(f.column, "t")).await.unwrap();
        let task = load(&f, id).await.unwrap();

        let mut editor = TaskEditor::open(f.alice.clone(), f.board, &task);
        assert!(!editor.is_read_only());
        editor.save(TaskDraft::new(f.column, "renamed")).await.unwrap();
        editor.close().await;

        let task = load(&f, id).await.unwrap();
        assert_eq!(task.title, "renamed");
        assert_eq!(task.locked_by, None);
    }

    #[tokio::test]
    async fn test_editor_read_only_for_foreign_lock() {
        let f = fixture().await;
        let id = f.alice.create_task(f.board, TaskDraft::new(f.column, "t")).await.unwrap();
        f.alice.lock_task(f.board, id).await.unwrap();
        let task = load(&f, id).await.unwrap();
        f.store.clear_write_log();

        let mut editor = TaskEditor::open(f.bob.clone(), f.board, &task);
        assert!(editor.is_read_only());
        assert_eq!(editor.lock_holder(), Some(f.alice.user()));
        assert!(matches!(
            editor.save(TaskDraft::new(f.column, "x")).await,
            Err(BoardError::Locked { .. })
        ));
        editor.close().await;

        // Bob neither took nor cleared Alice's lock
        assert!(f.store.write_log().is_empty());
        assert_eq!(load(&f, id).await.unwrap().locked_by, Some(f.alice.user()));
    }

    #[tokio::test]
    async fn test_editor_close_after_concurrent_delete() {
        let f = fixture().await;
        let id = f.alice.create_task(f.board, TaskDraft::new(f.column, "t")).await.unwrap();
        let task = load(&f, id).await.unwrap();
        let editor = TaskEditor::open(f.alice.clone(), f.board, &task);
        f.bob.delete_task(f.board, id).await.unwrap();
        editor.close().await;
        assert!(load(&f, id).await.is_none());
    }

    #[tokio::test]
    async fn test_editor_create_mode() {
        let f = fixture().await;
        let mut editor = TaskEditor::create(f.alice.clone(), f.board, f.column);
        assert_eq!(editor.column(), Some(f.column));
        let id = editor.save(TaskDraft::new(f.column, "new")).await.unwrap();
        assert_eq!(editor.task_id(), Some(id));
        f.store.clear_write_log();
        editor.close().await;
        // Nothing was locked, so nothing is cleared
        assert!(f.store.write_log().is_empty());
    }
}
