//! Shared identity and record types for taskweb.
//!
//! This crate is the data model: typed IDs and the persisted shape of every
//! entity stored in the document store. It has **no internal taskweb
//! dependencies**, a pure leaf crate that the store and client build on.
//!
//! # Entity-Relationship Overview
//!
//! ```text
//! User (UserId)
//!     └── owns Board (BoardId, solo or collaborative)
//!     └── heartbeats Presence (one per user per board)
//!
//! Board (BoardId)
//!     └── contains Column (ColumnId, ordered by `order`)
//!     └── contains Task (TaskId, belongs to one Column at a time)
//!
//! Task
//!     └── lockedBy: UserId, advisory edit lock
//! ```
//!
//! # Key Types
//!
//! |--------------------|-------------------------------------------------|
//! | Type               | Purpose                                         |
//! |--------------------|-------------------------------------------------|
//! | [`Board`]          | Board as seen by one viewer (with `is_owner`)   |
//! | [`Column`]         | Ordered bucket of tasks                         |
//! | [`Task`]           | Unit of work with priority, due date, lock      |
//! | [`PresenceRecord`] | Per-user liveness heartbeat                     |
//! | [`TaskDraft`]      | Input for task creation                         |
//! | [`TaskPatch`]      | Partial task update                             |
//! |--------------------|-------------------------------------------------|

pub mod board;
pub mod ids;
pub mod presence;
pub mod task;

pub use board::{Board, BoardPatch, BoardRecord, Column, ColumnPatch, ColumnRecord, sort_columns};
pub use ids::{BoardId, ColumnId, TaskId, UserId};
pub use presence::PresenceRecord;
pub use task::{Priority, Task, TaskDraft, TaskPatch, TaskRecord, sort_tasks};
