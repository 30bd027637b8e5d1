//! Presence heartbeat records.
//!
//! A presence record is ephemeral: rewritten on every heartbeat, deleted
//! best-effort when a user leaves, and otherwise left to age out.

use serde::{Deserialize, Serialize};

use crate::ids::UserId;

/// Persisted presence document (`boardPresence/{board}/users/{user}`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    pub user_id: UserId,
    /// Server time of the last heartbeat (Unix millis).
    #[serde(default)]
    pub last_active: Option<u64>,
    #[serde(default)]
    pub joined_at: Option<u64>,
}

impl PresenceRecord {
    /// Whether the last heartbeat is strictly younger than `window_ms` at `now_ms`.
    ///
    /// A record with no resolved `last_active` is never active. A heartbeat
    /// from the "future" (clock skew) counts as age zero.
    pub fn is_active_at(&self, now_ms: u64, window_ms: u64) -> bool {
        match self.last_active {
            Some(last) => now_ms.saturating_sub(last) < window_ms,
            None => false,
        }
    }
}
