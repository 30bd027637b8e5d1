//! Realtime document store abstraction for taskweb.
//!
//! The board client never talks to a database directly. It goes through
//! [`DocumentStore`]: hierarchical paths, point reads and writes, atomic
//! batches, equality queries, and live subscriptions that push complete
//! snapshots.
//!
//! # Semantics
//!
//! - **Writes**: last-write-wins per field. `ServerTimestamp` resolves to the
//!   store clock at commit; `Delete` removes the field.
//! - **Batches**: all-or-nothing. A failed batch applies no writes.
//! - **Subscriptions**: the first event is the current state, then one full
//!   snapshot per change. Errors arrive as events and do not close the
//!   stream. Nothing orders events across subscriptions.
//!
//! [`MemoryStore`] is the in-process implementation used by tests and the
//! simulator.

mod clock;
mod document;
mod error;
mod memory;
mod path;
mod query;
mod store;
mod subscription;

pub use clock::{Clock, ManualClock, SystemClock};
pub use document::{Document, FieldValue, Fields, SetMode, WriteBatch, WriteOp};
pub use error::StoreError;
pub use memory::{MemoryStore, WriteKind, WriteRecord};
pub use path::{CollectionPath, DocPath};
pub use query::{Direction, Query};
pub use store::DocumentStore;
pub use subscription::{SnapshotEvent, SnapshotSink, Subscription};

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
