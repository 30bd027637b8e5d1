//! Realtime collaborative kanban client.
//!
//! Binds one board at a time to a [`DocumentStore`](taskweb_store::DocumentStore),
//! keeps a local [`AppState`] in sync through live listeners, and issues
//! board, column, and task commands. Collaborative boards add a presence
//! heartbeat and advisory per-task edit locks.
//!
//! ```text
//!   Session ──load_board──▶ listeners (board, columns, tasks, presence)
//!      │                        │
//!      │                        └──snapshots──▶ AppState ──▶ subscribers
//!      └──Commands──▶ DocumentStore
//! ```

pub mod auth;
pub mod codec;
pub mod commands;
pub mod config;
pub mod constants;
pub mod dashboard;
pub mod error;
pub mod location;
pub mod locks;
pub mod presence;
pub mod reorder;
pub mod schema;
pub mod session;
pub mod state;
pub mod subscriptions;

pub use auth::{AnonymousAuth, AuthError, AuthProvider, StaticAuth};
pub use commands::Commands;
pub use config::{ClientConfig, ConfigError};
pub use dashboard::{ColumnCount, DashboardStats, RecentTask, calendar_date, is_overdue};
pub use error::{BoardError, ConflictKind, Result};
pub use location::{BoardLocation, NavEvent};
pub use locks::TaskEditor;
pub use presence::{active_users, heartbeat};
pub use reorder::ReorderEvent;
pub use session::{Session, SessionPhase};
pub use state::{AppState, StateChange, StateSnapshot, Unsubscribe, ViewMode};
pub use subscriptions::{BindingStamp, Notice, NoticeLevel, SyncGeneration};
