//! Presence heartbeat for collaborative boards.
//!
//! While a collaborative board is bound, the session rewrites this user's
//! presence record every heartbeat interval (merge write of `lastActive` and
//! `joinedAt`, both server timestamps) and listens to every presence record
//! of the board. A user is active while their last heartbeat is younger than
//! the active window: `now - lastActive < window`, so a heartbeat exactly one
//! window old is already inactive. The active set includes this user.
//!
//! The set is recomputed on each presence snapshot. Heartbeats from any live
//! user (including this one) produce a snapshot every interval, which is
//! what ages silent users out.

use std::sync::Arc;
use std::time::Duration;

use taskweb_store::{DocPath, DocumentStore, Fields, Query, SetMode, StoreError};
use taskweb_types::{BoardId, PresenceRecord, UserId};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::codec;
use crate::schema::{self, field};
use crate::session::SessionShared;
use crate::subscriptions::{ListenerHandle, SyncGeneration, spawn_listener};

/// Users whose heartbeat is inside the active window at `now_ms`, sorted
/// and deduplicated.
pub fn active_users(records: &[PresenceRecord], now_ms: u64, window: Duration) -> Vec<UserId> {
    let window_ms = window.as_millis() as u64;
    let mut users: Vec<UserId> = records
        .iter()
        .filter(|r| r.is_active_at(now_ms, window_ms))
        .map(|r| r.user_id)
        .collect();
    users.sort();
    users.dedup();
    users
}

/// Write one heartbeat for `user` on `board`.
pub async fn heartbeat(store: &dyn DocumentStore, board: BoardId, user: UserId) -> Result<(), StoreError> {
    let fields = Fields::new()
        .set(field::USER_ID, user)
        .server_timestamp(field::LAST_ACTIVE)
        .server_timestamp(field::JOINED_AT);
    store.set(&schema::presence(board, user), fields, SetMode::Merge).await
}

/// A running heartbeat plus the presence listener for one board.
pub(crate) struct Presence {
    board: BoardId,
    heartbeat: CancellationToken,
    listener: ListenerHandle,
    store: Arc<dyn DocumentStore>,
    user: UserId,
}

impl Presence {
    /// Start heartbeating and listening. The first heartbeat is written
    /// immediately.
    pub(crate) fn start(shared: &SessionShared, board: BoardId, generation: SyncGeneration) -> Self {
        let store = Arc::clone(&shared.store);
        let user = shared.user;
        let heartbeat = CancellationToken::new();

        tokio::spawn(heartbeat_loop(
            Arc::clone(&store),
            board,
            user,
            shared.config.heartbeat_interval,
            heartbeat.clone(),
        ));

        let subscription = store.watch_query(&Query::collection(schema::presence_users(board)));
        let state = shared.state.clone();
        let clock = Arc::clone(&store);
        let window = shared.config.active_window;
        let listener = spawn_listener(
            "presence",
            subscription,
            shared.stamp.clone(),
            generation,
            shared.notices.clone(),
            move |docs| {
                let records = codec::decode_presence(&docs);
                state.set_active_users(active_users(&records, clock.now_millis(), window));
            },
        );

        debug!(board = %board, "presence started");
        Self { board, heartbeat, listener, store, user }
    }

    /// Stop the heartbeat timer and the presence listener. The returned
    /// [`PresenceLeave`] deletes this user's record when run.
    pub(crate) fn stop(self) -> PresenceLeave {
        self.heartbeat.cancel();
        self.listener.close();
        debug!(board = %self.board, "presence stopped");
        PresenceLeave { store: self.store, path: schema::presence(self.board, self.user) }
    }
}

/// Best-effort removal of this user's presence record.
pub(crate) struct PresenceLeave {
    store: Arc<dyn DocumentStore>,
    path: DocPath,
}

impl PresenceLeave {
    /// Failure is swallowed: a stale record ages out of everyone's window.
    pub(crate) async fn run(self) {
        if let Err(e) = self.store.delete(&self.path).await {
            debug!(path = %self.path, error = %e, "presence delete failed");
        }
    }
}

async fn heartbeat_loop(
    store: Arc<dyn DocumentStore>,
    board: BoardId,
    user: UserId,
    every: Duration,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(every.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                match heartbeat(store.as_ref(), board, user).await {
                    Ok(()) => trace!(board = %board, "heartbeat"),
                    // Rules may deny presence writes; not worth a warning each beat
                    Err(e) if e.is_permission_denied() => debug!(board = %board, "heartbeat denied"),
                    Err(e) => warn!(board = %board, error = %e, "heartbeat failed"),
                }
            }
        }
    }
    trace!(board = %board, "heartbeat loop exited");
}
