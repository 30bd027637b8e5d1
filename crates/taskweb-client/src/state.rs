//! Observable application state.
//!
//! [`AppState`] holds exactly one value per field. Every setter replaces its
//! field wholesale and then synchronously notifies all subscribers, in
//! registration order, with the name of the changed field and the complete
//! new snapshot. There is no batching: one set, one fan-out.
//!
//! Snapshots are immutable (`Arc<StateSnapshot>`); a setter builds a new one.
//! The fan-out runs under a reentrant lock, so subscribers may read or set
//! state from inside their callback, and notifications from different
//! threads never interleave.

use std::cell::RefCell;
use std::sync::{Arc, Weak};

use parking_lot::ReentrantMutex;
use strum::Display;
use taskweb_types::{Board, Column, Task, UserId, sort_columns};

/// Which top-level view the user is looking at.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Dashboard,
    Board,
}

/// Name of the field a notification is about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum StateChange {
    CurrentUser,
    Board,
    Columns,
    Tasks,
    ActiveUsers,
    ViewMode,
}

/// Point-in-time view of the whole state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StateSnapshot {
    pub current_user: Option<UserId>,
    pub board: Option<Board>,
    /// Sorted by `order`, ties by column ID.
    pub columns: Vec<Column>,
    pub tasks: Vec<Task>,
    pub active_users: Vec<UserId>,
    pub view_mode: ViewMode,
}

impl StateSnapshot {
    /// Tasks of one column, in display order.
    pub fn tasks_in(&self, column: taskweb_types::ColumnId) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(move |t| t.column_id == column)
    }

    pub fn task(&self, id: taskweb_types::TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }
}

type Listener = Arc<dyn Fn(StateChange, &StateSnapshot) + Send + Sync>;

#[derive(Default)]
struct Registry {
    snapshot: Arc<StateSnapshot>,
    listeners: Vec<(u64, Listener)>,
    next_id: u64,
}

type Shared = ReentrantMutex<RefCell<Registry>>;

/// Cheaply cloneable handle to the shared state container.
#[derive(Clone, Default)]
pub struct AppState {
    inner: Arc<Shared>,
}

/// Returned by [`AppState::subscribe`]; removes the subscriber.
#[must_use = "dropping the handle keeps the subscriber registered forever"]
pub struct Unsubscribe {
    id: u64,
    registry: Weak<Shared>,
}

impl Unsubscribe {
    pub fn unsubscribe(self) {
        if let Some(registry) = self.registry.upgrade() {
            let guard = registry.lock();
            guard.borrow_mut().listeners.retain(|(id, _)| *id != self.id);
        }
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<StateSnapshot> {
        let guard = self.inner.lock();
        let snapshot = guard.borrow().snapshot.clone();
        snapshot
    }

    /// Register a subscriber. It is called after every set, including sets
    /// that store an equal value.
    pub fn subscribe(
        &self,
        listener: impl Fn(StateChange, &StateSnapshot) + Send + Sync + 'static,
    ) -> Unsubscribe {
        let guard = self.inner.lock();
        let mut registry = guard.borrow_mut();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.push((id, Arc::new(listener)));
        Unsubscribe { id, registry: Arc::downgrade(&self.inner) }
    }

    pub fn subscriber_count(&self) -> usize {
        let guard = self.inner.lock();
        let count = guard.borrow().listeners.len();
        count
    }

    pub fn set_current_user(&self, user: Option<UserId>) {
        self.update(StateChange::CurrentUser, |s| s.current_user = user);
    }

    pub fn set_board(&self, board: Option<Board>) {
        self.update(StateChange::Board, |s| s.board = board);
    }

    /// Replace the columns, sorted ascending by `order` (ties by ID).
    pub fn set_columns(&self, mut columns: Vec<Column>) {
        sort_columns(&mut columns);
        self.update(StateChange::Columns, |s| s.columns = columns);
    }

    pub fn set_tasks(&self, tasks: Vec<Task>) {
        self.update(StateChange::Tasks, |s| s.tasks = tasks);
    }

    pub fn set_active_users(&self, users: Vec<UserId>) {
        self.update(StateChange::ActiveUsers, |s| s.active_users = users);
    }

    pub fn set_view_mode(&self, mode: ViewMode) {
        self.update(StateChange::ViewMode, |s| s.view_mode = mode);
    }

    fn update(&self, change: StateChange, apply: impl FnOnce(&mut StateSnapshot)) {
        let guard = self.inner.lock();
        let (snapshot, listeners) = {
            let mut registry = guard.borrow_mut();
            let mut next = StateSnapshot::clone(&registry.snapshot);
            apply(&mut next);
            registry.snapshot = Arc::new(next);
            let listeners: Vec<Listener> =
                registry.listeners.iter().map(|(_, l)| Arc::clone(l)).collect();
            (Arc::clone(&registry.snapshot), listeners)
        };
        // RefCell borrow is released; listeners may re-enter
        for listener in listeners {
            listener(change, &snapshot);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
