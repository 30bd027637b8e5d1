//! Live listener plumbing: binding generations, listener pumps, and notices.
//!
//! Every live subscription is drained by a listener pump, a spawned task
//! that applies each snapshot to local state. Pumps never apply blindly:
//!
//! ```text
//!   store ──snapshot──▶ pump ──apply_if_current(gen)──▶ AppState
//!                          │
//!                          └── skipped when the session re-bound since
//!                              the pump was spawned (gen is stale)
//! ```
//!
//! The [`BindingStamp`] is advanced under its lock whenever the session
//! binds or unbinds a board, and pumps check-and-apply under that same
//! lock, so once a re-bind returns no snapshot for the previous board can
//! reach the state container.

use std::cell::Cell;
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::ReentrantMutex;
use taskweb_store::{Document, SnapshotEvent, Subscription};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

// ============================================================================
// Notices
// ============================================================================

/// Severity of a user-visible notice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A transient, user-visible message (a toast).
///
/// Subscribe via [`Session::subscribe_notices()`](crate::Session::subscribe_notices).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self { level, message: message.into() }
    }
}

/// Send a notice; nobody listening is fine.
pub(crate) fn notify(tx: &broadcast::Sender<Notice>, level: NoticeLevel, message: impl Into<String>) {
    let _ = tx.send(Notice::new(level, message));
}

// ============================================================================
// Binding generations
// ============================================================================

/// Monotonic binding generation, bumped on every bind and unbind.
///
/// A listener spawned under generation N applies snapshots only while the
/// stamp still reads N.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct SyncGeneration(pub u64);

/// The session's board-binding stamp.
#[derive(Clone, Default)]
pub struct BindingStamp {
    current: Arc<ReentrantMutex<Cell<u64>>>,
}

impl BindingStamp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> SyncGeneration {
        SyncGeneration(self.current.lock().get())
    }

    /// Bump the generation, invalidating every running listener.
    pub fn advance(&self) -> SyncGeneration {
        self.advance_with(|generation| generation)
    }

    /// Bump the generation and run `f` before any listener can observe it.
    pub fn advance_with<R>(&self, f: impl FnOnce(SyncGeneration) -> R) -> R {
        let guard = self.current.lock();
        let next = guard.get() + 1;
        guard.set(next);
        f(SyncGeneration(next))
    }

    /// Run `f` with the current generation held stable.
    pub fn with_current<R>(&self, f: impl FnOnce(SyncGeneration) -> R) -> R {
        let guard = self.current.lock();
        f(SyncGeneration(guard.get()))
    }

    /// Run `f` only if `generation` is still current. `None` means the
    /// snapshot was stale and dropped.
    pub fn apply_if_current<R>(&self, generation: SyncGeneration, f: impl FnOnce() -> R) -> Option<R> {
        let guard = self.current.lock();
        if guard.get() != generation.0 {
            return None;
        }
        Some(f())
    }
}

// ============================================================================
// Listener pump
// ============================================================================

/// Handle to a running listener pump.
pub(crate) struct ListenerHandle {
    name: &'static str,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    /// Stop delivery. Must be called under the binding stamp's lock for the
    /// no-stale-apply guarantee to hold.
    pub(crate) fn close(self) {
        debug!(listener = self.name, "closing listener");
        self.token.cancel();
        drop(self.task);
    }
}

/// Spawn a pump that feeds `subscription` into `on_snapshot`.
///
/// Listener errors are logged; permission errors also raise a notice. The
/// subscription stays open after an error, since the store may recover.
pub(crate) fn spawn_listener<F>(
    name: &'static str,
    mut subscription: Subscription,
    stamp: BindingStamp,
    generation: SyncGeneration,
    notices: broadcast::Sender<Notice>,
    mut on_snapshot: F,
) -> ListenerHandle
where
    F: FnMut(Vec<Document>) + Send + 'static,
{
    let token = subscription.cancel_token();
    let pump_token = token.clone();

    let task = tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                biased;
                _ = pump_token.cancelled() => break,
                event = subscription.next() => event,
            };
            match event {
                Some(SnapshotEvent::Snapshot(docs)) => {
                    let count = docs.len();
                    let applied = stamp.apply_if_current(generation, || {
                        if !pump_token.is_cancelled() {
                            on_snapshot(docs);
                        }
                    });
                    match applied {
                        Some(()) => trace!(listener = name, count, "applied snapshot"),
                        None => trace!(listener = name, ?generation, "dropped stale snapshot"),
                    }
                }
                Some(SnapshotEvent::Error(err)) => {
                    warn!(listener = name, error = %err, "listener error");
                    if err.is_permission_denied() && stamp.current() == generation {
                        notify(&notices, NoticeLevel::Error, format!("Permission denied ({name})"));
                    }
                }
                None => break,
            }
        }
        trace!(listener = name, "listener pump exited");
    });

    ListenerHandle { name, token, task }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;
    use taskweb_store::StoreError;

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_apply_if_current() {
        let stamp = BindingStamp::new();
        let generation = stamp.advance();
        assert_eq!(stamp.apply_if_current(generation, || 1), Some(1));
        stamp.advance();
        assert_eq!(stamp.apply_if_current(generation, || 1), None);
    }

    #[test]
    fn test_apply_may_reenter_stamp() {
        let stamp = BindingStamp::new();
        let generation = stamp.advance();
        let inner = stamp.clone();
        let seen = stamp.apply_if_current(generation, || inner.current());
        assert_eq!(seen, Some(generation));
    }

    #[tokio::test]
    async fn test_stale_snapshot_never_applied() {
        let stamp = BindingStamp::new();
        let (tx, _) = broadcast::channel(8);
        let (sink, sub) = Subscription::channel();
        let applied = Arc::new(Mutex::new(0usize));

        let generation = stamp.advance();
        let handle = {
            let applied = applied.clone();
            spawn_listener("test", sub, stamp.clone(), generation, tx, move |_| {
                *applied.lock() += 1;
            })
        };

        sink.send(SnapshotEvent::Snapshot(Vec::new()));
        settle().await;
        assert_eq!(*applied.lock(), 1);

        // Re-bind, then a late snapshot for the old generation arrives
        stamp.advance();
        sink.send(SnapshotEvent::Snapshot(Vec::new()));
        settle().await;
        assert_eq!(*applied.lock(), 1);
        handle.close();
    }

    #[tokio::test]
    async fn test_permission_error_raises_notice_and_keeps_listening() {
        let stamp = BindingStamp::new();
        let (tx, mut rx) = broadcast::channel(8);
        let (sink, sub) = Subscription::channel();
        let applied = Arc::new(Mutex::new(0usize));

        let generation = stamp.advance();
        let _handle = {
            let applied = applied.clone();
            spawn_listener("columns", sub, stamp.clone(), generation, tx, move |_| {
                *applied.lock() += 1;
            })
        };

        sink.send(SnapshotEvent::Error(StoreError::PermissionDenied("boards/x".into())));
        sink.send(SnapshotEvent::Snapshot(Vec::new()));

        let notice = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        settle().await;
        assert_eq!(*applied.lock(), 1);
    }

    #[tokio::test]
    async fn test_close_cancels_subscription() {
        let stamp = BindingStamp::new();
        let (tx, _) = broadcast::channel(8);
        let (sink, sub) = Subscription::channel();
        let handle = spawn_listener("board", sub, stamp.clone(), stamp.advance(), tx, |_| {});
        handle.close();
        settle().await;
        assert!(sink.is_closed());
    }
}
