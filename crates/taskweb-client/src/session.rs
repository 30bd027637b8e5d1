//! Board session: the synchronization engine.
//!
//! A [`Session`] owns every live subscription of the signed-in user and
//! binds at most one board at a time:
//!
//! ```text
//!   Unbound ──load_board──▶ Loading ──ok──▶ Bound(board)
//!      ▲                       │                │
//!      │                       └──err──▶ Failed │ (nothing was bound)
//!      └────────────────unbind──────────────────┘
//! ```
//!
//! Binding a board opens listeners on the board document, its columns, its
//! tasks, and (for collaborative boards) presence. Re-binding or unbinding
//! closes the previous listeners first, in the order board, columns, tasks,
//! presence, and advances the [`BindingStamp`] so late snapshots for the old
//! board are dropped instead of applied.
//!
//! A load that fails leaves any previously bound board in place: access is
//! checked before anything is torn down.

use std::sync::Arc;

use parking_lot::Mutex;
use taskweb_store::{Direction, Document, DocumentStore, Query};
use taskweb_types::{Board, BoardId, ColumnId, TaskId, UserId, sort_tasks};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::auth::AuthProvider;
use crate::codec;
use crate::commands::Commands;
use crate::config::ClientConfig;
use crate::dashboard::{DashboardStats, calendar_date};
use crate::error::{BoardError, Result};
use crate::location::{BoardLocation, NavEvent};
use crate::locks::TaskEditor;
use crate::presence::{Presence, PresenceLeave};
use crate::reorder::ReorderEvent;
use crate::schema::{self, field};
use crate::state::{AppState, ViewMode};
use crate::subscriptions::{
    BindingStamp, ListenerHandle, Notice, NoticeLevel, SyncGeneration, notify, spawn_listener,
};

/// Where the session is in its board lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Unbound,
    Loading,
    Bound(BoardId),
    /// The last load failed and no board is bound.
    Failed,
}

/// Live handles of the bound board.
struct Binding {
    phase: SessionPhase,
    board: Option<BoardId>,
    location: BoardLocation,
    board_listener: Option<ListenerHandle>,
    columns_listener: Option<ListenerHandle>,
    tasks_listener: Option<ListenerHandle>,
    presence: Option<Presence>,
}

impl Binding {
    fn new() -> Self {
        Self {
            phase: SessionPhase::Unbound,
            board: None,
            location: BoardLocation::none(),
            board_listener: None,
            columns_listener: None,
            tasks_listener: None,
            presence: None,
        }
    }

    /// Close every listener (board, columns, tasks, presence) and stop the
    /// heartbeat. Call under the binding stamp's lock.
    fn teardown(&mut self) -> Option<PresenceLeave> {
        if let Some(board) = self.board.take() {
            debug!(board = %board, "tearing down board binding");
        }
        for listener in [
            self.board_listener.take(),
            self.columns_listener.take(),
            self.tasks_listener.take(),
        ]
        .into_iter()
        .flatten()
        {
            listener.close();
        }
        self.presence.take().map(Presence::stop)
    }
}

/// State shared between the session handle and its listener pumps.
pub(crate) struct SessionShared {
    pub(crate) store: Arc<dyn DocumentStore>,
    pub(crate) state: AppState,
    pub(crate) user: UserId,
    pub(crate) config: Arc<ClientConfig>,
    pub(crate) notices: broadcast::Sender<Notice>,
    pub(crate) stamp: BindingStamp,
    binding: Mutex<Binding>,
}

impl Drop for SessionShared {
    fn drop(&mut self) {
        let binding = self.binding.get_mut();
        let _ = binding.teardown();
    }
}

/// A signed-in user's board session.
///
/// Cheap to clone; clones share the same binding and state.
#[derive(Clone)]
pub struct Session {
    shared: Arc<SessionShared>,
    commands: Commands,
}

impl Session {
    /// Session for an already-known user.
    pub fn new(store: Arc<dyn DocumentStore>, user: UserId, config: ClientConfig) -> Self {
        let config = Arc::new(config);
        let (notices, _) = broadcast::channel(config.notice_capacity.max(1));
        let state = AppState::new();
        state.set_current_user(Some(user));

        let commands = Commands::new(Arc::clone(&store), user, Arc::clone(&config));
        let shared = Arc::new(SessionShared {
            store,
            state,
            user,
            config,
            notices,
            stamp: BindingStamp::new(),
            binding: Mutex::new(Binding::new()),
        });
        Self { shared, commands }
    }

    /// Resolve the user through `auth` and start a session.
    ///
    /// Fails with `Initialization` if auth errors or does not answer within
    /// `auth_timeout`. There is no retry.
    pub async fn start(
        store: Arc<dyn DocumentStore>,
        auth: &dyn AuthProvider,
        config: ClientConfig,
    ) -> Result<Self> {
        let user = match tokio::time::timeout(config.auth_timeout, auth.current_user()).await {
            Ok(Ok(user)) => user,
            Ok(Err(e)) => {
                error!(error = %e, "authentication failed");
                return Err(BoardError::Initialization(e.to_string()));
            }
            Err(_) => {
                error!(timeout = ?config.auth_timeout, "authentication timed out");
                return Err(BoardError::Initialization("authentication timed out".into()));
            }
        };
        info!(user = %user, "session started");
        Ok(Self::new(store, user, config))
    }

    pub fn user(&self) -> UserId {
        self.shared.user
    }

    pub fn state(&self) -> &AppState {
        &self.shared.state
    }

    pub fn commands(&self) -> &Commands {
        &self.commands
    }

    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.shared.notices.subscribe()
    }

    pub fn phase(&self) -> SessionPhase {
        self.shared.binding.lock().phase
    }

    pub fn bound_board(&self) -> Option<BoardId> {
        self.shared.binding.lock().board
    }

    /// Current URL location (set by the last successful bind).
    pub fn location(&self) -> BoardLocation {
        self.shared.binding.lock().location
    }

    pub fn generation(&self) -> SyncGeneration {
        self.shared.stamp.current()
    }

    /// Whether a presence heartbeat is running.
    pub fn presence_active(&self) -> bool {
        self.shared.binding.lock().presence.is_some()
    }

    fn require_bound(&self) -> Result<BoardId> {
        self.bound_board().ok_or(BoardError::NotBound)
    }

    // ── Binding ─────────────────────────────────────────────────────────────

    /// Load and bind a board.
    ///
    /// Access requires ownership, or a collaborative board reached through a
    /// shared link (`from_link`). On success the board, columns, tasks, and
    /// presence listeners are open and the view switches to the board.
    pub async fn load_board(&self, id: BoardId, from_link: bool) -> Result<Board> {
        info!(board = %id, from_link, "loading board");
        {
            let mut binding = self.shared.binding.lock();
            if binding.board.is_none() {
                binding.phase = SessionPhase::Loading;
            }
        }

        let board = match self.fetch_accessible(id, from_link).await {
            Ok(board) => board,
            Err(e) => {
                warn!(board = %id, error = %e, "failed to load board");
                let unbound = {
                    let mut binding = self.shared.binding.lock();
                    let unbound = binding.board.is_none();
                    if unbound {
                        binding.phase = SessionPhase::Failed;
                    }
                    unbound
                };
                if unbound {
                    self.shared.state.set_view_mode(ViewMode::Dashboard);
                }
                notify(&self.shared.notices, NoticeLevel::Error, e.to_string());
                return Err(e);
            }
        };

        if let Some(leave) = self.shared.bind(board.clone()) {
            leave.run().await;
        }
        notify(&self.shared.notices, NoticeLevel::Success, "Board loaded successfully");
        Ok(board)
    }

    async fn fetch_accessible(&self, id: BoardId, from_link: bool) -> Result<Board> {
        let board = self.commands.fetch_board(id).await?;
        if board.is_owner || (board.is_collaborative && from_link) {
            Ok(board)
        } else {
            Err(BoardError::AccessDenied(
                "you do not have permission to view this board".into(),
            ))
        }
    }

    /// (Re)open the task listener for the bound board, closing any previous
    /// one first.
    pub fn listen_to_tasks(&self, board_id: BoardId) -> Result<()> {
        let shared = &self.shared;
        shared.stamp.with_current(|generation| {
            let mut binding = shared.binding.lock();
            if binding.board != Some(board_id) {
                return Err(BoardError::NotBound);
            }
            if let Some(previous) = binding.tasks_listener.take() {
                previous.close();
            }
            binding.tasks_listener = Some(shared.spawn_tasks_listener(board_id, generation));
            Ok(())
        })
    }

    /// Close every listener of the bound board and return to the dashboard.
    /// This user's presence record is deleted, best effort.
    pub async fn unbind(&self) {
        if let Some(leave) = self.shared.unbind_if(|_| true) {
            leave.run().await;
        }
    }

    /// Follow a browser-history event.
    pub async fn navigate(&self, event: NavEvent) -> Result<()> {
        match event {
            NavEvent::Push(id) => self.load_board(id, false).await.map(|_| ()),
            NavEvent::Pop(location) => match location.board {
                Some(id) if Some(id) != self.bound_board() => {
                    self.load_board(id, true).await.map(|_| ())
                }
                Some(_) => Ok(()),
                None => {
                    self.unbind().await;
                    Ok(())
                }
            },
        }
    }

    // ── Session-scoped commands ─────────────────────────────────────────────

    /// Delete a board; unbinds it first if it is the bound board.
    ///
    /// Ownership is checked before unbinding, and the binding is released
    /// before any document is deleted, so the deleted-board watch never fires
    /// for the owner's own delete.
    pub async fn delete_board(&self, id: BoardId) -> Result<()> {
        let board = self.commands.fetch_board(id).await?;
        if !board.is_owner {
            return Err(BoardError::AccessDenied(format!("only the owner can delete board {id}")));
        }
        if let Some(leave) = self.shared.unbind_if(|bound| bound == id) {
            leave.run().await;
        }
        self.commands.delete_board(id).await?;
        notify(&self.shared.notices, NoticeLevel::Success, "Board deleted");
        Ok(())
    }

    /// Apply a drag-and-drop event to the bound board.
    pub async fn apply_reorder(&self, event: ReorderEvent) -> Result<()> {
        let board = self.require_bound()?;
        self.commands.apply_reorder(board, event).await
    }

    /// Open the editor for a task of the bound board, as currently displayed.
    pub fn open_task(&self, id: TaskId) -> Result<TaskEditor> {
        let board = self.require_bound()?;
        let snapshot = self.shared.state.snapshot();
        let task = snapshot.task(id).ok_or_else(|| BoardError::NotFound(format!("task {id}")))?;
        Ok(TaskEditor::open(self.commands.clone(), board, task))
    }

    /// Open an editor for a new task in `column` of the bound board.
    pub fn new_task(&self, column: ColumnId) -> Result<TaskEditor> {
        let board = self.require_bound()?;
        Ok(TaskEditor::create(self.commands.clone(), board, column))
    }

    /// Share link for the bound board.
    pub fn share_link(&self, base: &str) -> Option<String> {
        self.location().share_link(base)
    }

    /// Statistics over the currently displayed columns and tasks.
    pub fn dashboard(&self) -> DashboardStats {
        let snapshot = self.shared.state.snapshot();
        let today = calendar_date(self.shared.store.now_millis()).unwrap_or_default();
        DashboardStats::compute(
            &snapshot.columns,
            &snapshot.tasks,
            today,
            self.shared.config.recent_task_limit,
        )
    }
}

impl SessionShared {
    /// Replace the current binding with `board`. Returns the presence leave
    /// of the previous board, to be run outside any lock.
    fn bind(self: &Arc<Self>, board: Board) -> Option<PresenceLeave> {
        let id = board.id;
        self.stamp.advance_with(|generation| {
            let leave = {
                let mut binding = self.binding.lock();
                let leave = binding.teardown();

                binding.board = Some(id);
                binding.phase = SessionPhase::Bound(id);
                binding.location = BoardLocation::board(id);
                binding.board_listener = Some(self.spawn_board_listener(id, generation));
                binding.columns_listener = Some(self.spawn_columns_listener(id, generation));
                binding.tasks_listener = Some(self.spawn_tasks_listener(id, generation));
                if board.is_collaborative {
                    binding.presence = Some(Presence::start(self, id, generation));
                }
                leave
            };

            // Listeners are blocked on the stamp until this closure returns
            self.state.set_board(Some(board));
            self.state.set_columns(Vec::new());
            self.state.set_tasks(Vec::new());
            self.state.set_active_users(Vec::new());
            self.state.set_view_mode(ViewMode::Board);

            info!(board = %id, ?generation, "bound board");
            leave
        })
    }

    /// Unbind if `pred` accepts the bound board.
    fn unbind_if(&self, pred: impl FnOnce(BoardId) -> bool) -> Option<PresenceLeave> {
        self.stamp.with_current(|_| {
            let mut binding = self.binding.lock();
            let bound = binding.board?;
            if !pred(bound) {
                return None;
            }
            self.stamp.advance();
            let leave = binding.teardown();
            binding.phase = SessionPhase::Unbound;
            binding.location = BoardLocation::none();
            drop(binding);

            self.state.set_board(None);
            self.state.set_columns(Vec::new());
            self.state.set_tasks(Vec::new());
            self.state.set_active_users(Vec::new());
            self.state.set_view_mode(ViewMode::Dashboard);

            info!(board = %bound, "unbound board");
            leave
        })
    }

    fn spawn_board_listener(
        self: &Arc<Self>,
        id: BoardId,
        generation: SyncGeneration,
    ) -> ListenerHandle {
        let subscription = self.store.watch_document(&schema::board(id));
        let weak = Arc::downgrade(self);
        spawn_listener(
            "board",
            subscription,
            self.stamp.clone(),
            generation,
            self.notices.clone(),
            move |docs| {
                if let Some(shared) = weak.upgrade() {
                    shared.apply_board_snapshot(id, generation, docs);
                }
            },
        )
    }

    /// An empty snapshot means the board was deleted under us.
    fn apply_board_snapshot(self: &Arc<Self>, id: BoardId, generation: SyncGeneration, docs: Vec<Document>) {
        let Some(doc) = docs.first() else {
            warn!(board = %id, "bound board was deleted");
            notify(&self.notices, NoticeLevel::Warning, "This board was deleted");
            let shared = Arc::clone(self);
            tokio::spawn(async move {
                if let Some(leave) = shared.unbind_if(|bound| bound == id) {
                    leave.run().await;
                }
            });
            return;
        };

        let board = match codec::decode_board(doc, self.user) {
            Ok(board) => board,
            Err(e) => {
                warn!(board = %id, error = %e, "ignoring undecodable board snapshot");
                return;
            }
        };
        let collaborative = board.is_collaborative;
        self.state.set_board(Some(board));

        // Presence follows the collaborative flag
        let leave = {
            let mut binding = self.binding.lock();
            match (binding.presence.is_some(), collaborative) {
                (false, true) => {
                    binding.presence = Some(Presence::start(self, id, generation));
                    None
                }
                (true, false) => binding.presence.take().map(Presence::stop),
                _ => None,
            }
        };
        if let Some(leave) = leave {
            self.state.set_active_users(Vec::new());
            tokio::spawn(leave.run());
        }
    }

    fn spawn_columns_listener(&self, id: BoardId, generation: SyncGeneration) -> ListenerHandle {
        let subscription = self.store.watch_query(&Query::collection(schema::columns(id)));
        let state = self.state.clone();
        spawn_listener(
            "columns",
            subscription,
            self.stamp.clone(),
            generation,
            self.notices.clone(),
            move |docs| state.set_columns(codec::decode_columns(&docs)),
        )
    }

    fn spawn_tasks_listener(&self, id: BoardId, generation: SyncGeneration) -> ListenerHandle {
        let query =
            Query::collection(schema::tasks(id)).order_by(field::CREATED_AT, Direction::Descending);
        let subscription = self.store.watch_query(&query);
        let state = self.state.clone();
        spawn_listener(
            "tasks",
            subscription,
            self.stamp.clone(),
            generation,
            self.notices.clone(),
            move |docs| {
                let mut tasks = codec::decode_tasks(&docs);
                sort_tasks(&mut tasks);
                state.set_tasks(tasks);
            },
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthError, StaticAuth};
    use async_trait::async_trait;
    use std::time::Duration;
    use taskweb_store::MemoryStore;

    struct SlowAuth;

    #[async_trait]
    impl AuthProvider for SlowAuth {
        async fn current_user(&self) -> std::result::Result<UserId, AuthError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(UserId::new())
        }
    }

    struct BrokenAuth;

    #[async_trait]
    impl AuthProvider for BrokenAuth {
        async fn current_user(&self) -> std::result::Result<UserId, AuthError> {
            Err(AuthError::SignInFailed("no network".into()))
        }
    }

    #[tokio::test]
    async fn test_start_with_static_auth() {
        let user = UserId::new();
        let session = Session::start(Arc::new(MemoryStore::new()), &StaticAuth(user), ClientConfig::default())
            .await
            .unwrap();
        assert_eq!(session.user(), user);
        assert_eq!(session.state().snapshot().current_user, Some(user));
        assert_eq!(session.phase(), SessionPhase::Unbound);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_times_out() {
        let result = Session::start(Arc::new(MemoryStore::new()), &SlowAuth, ClientConfig::default()).await;
        assert!(matches!(result, Err(BoardError::Initialization(_))));
    }

    #[tokio::test]
    async fn test_start_auth_failure_is_fatal() {
        let result = Session::start(Arc::new(MemoryStore::new()), &BrokenAuth, ClientConfig::default()).await;
        assert!(matches!(result, Err(BoardError::Initialization(msg)) if msg.contains("no network")));
    }

    #[tokio::test]
    async fn test_commands_need_bound_board() {
        let session = Session::new(Arc::new(MemoryStore::new()), UserId::new(), ClientConfig::default());
        assert!(matches!(session.new_task(ColumnId::new()), Err(BoardError::NotBound)));
        assert!(matches!(
            session.apply_reorder(ReorderEvent::ColumnsReordered(Vec::new())).await,
            Err(BoardError::NotBound)
        ));
        assert!(matches!(session.listen_to_tasks(BoardId::new()), Err(BoardError::NotBound)));
    }

    #[tokio::test]
    async fn test_failed_first_load_sets_failed_phase() {
        let session = Session::new(Arc::new(MemoryStore::new()), UserId::new(), ClientConfig::default());
        let mut notices = session.subscribe_notices();
        let err = session.load_board(BoardId::new(), true).await.unwrap_err();
        assert!(matches!(err, BoardError::NotFound(_)));
        assert_eq!(session.phase(), SessionPhase::Failed);
        assert_eq!(notices.recv().await.unwrap().level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn test_bind_and_unbind_phases() {
        let store = Arc::new(MemoryStore::new());
        let session = Session::new(store.clone(), UserId::new(), ClientConfig::default());
        let id = session.commands().create_board(false, None).await.unwrap();

        let before = session.generation();
        session.load_board(id, false).await.unwrap();
        assert_eq!(session.phase(), SessionPhase::Bound(id));
        assert!(session.generation() > before);
        assert_eq!(session.location(), BoardLocation::board(id));
        assert!(!session.presence_active());
        assert_eq!(store.watcher_count(), 3);

        session.unbind().await;
        assert_eq!(session.phase(), SessionPhase::Unbound);
        assert_eq!(session.state().snapshot().view_mode, ViewMode::Dashboard);
        assert_eq!(store.watcher_count(), 0);
    }

    #[tokio::test]
    async fn test_dropping_session_closes_listeners() {
        let store = Arc::new(MemoryStore::new());
        let session = Session::new(store.clone(), UserId::new(), ClientConfig::default());
        let id = session.commands().create_board(true, None).await.unwrap();
        session.load_board(id, false).await.unwrap();
        assert_eq!(store.watcher_count(), 4);

        drop(session);
        assert_eq!(store.watcher_count(), 0);
    }
}
