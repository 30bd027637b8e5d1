//! Client configuration constants.
//!
//! Compile-time defaults for [`ClientConfig`](crate::ClientConfig). Every
//! value here can be overridden from the RON config file.

use std::time::Duration;

/// How often a collaborative board rewrites this user's presence record.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// A heartbeat younger than this marks its user active. 1.5x the heartbeat
/// interval, so one missed beat does not drop a user from the active set.
pub const ACTIVE_WINDOW: Duration = Duration::from_secs(15);

/// Startup fails if the auth provider has not resolved a user by then.
pub const AUTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Buffered notices per subscriber before the slowest one starts lagging.
pub const NOTICE_CAPACITY: usize = 256;

/// Number of tasks shown in the dashboard's "recently updated" list.
pub const RECENT_TASK_LIMIT: usize = 5;

/// Name given to a solo board created without one.
pub const DEFAULT_SOLO_NAME: &str = "My Solo Board";

/// Prefix of the generated name for unnamed collaborative boards.
pub const COLLABORATIVE_NAME_PREFIX: &str = "Collaborative Board";

/// Columns created with every new board, left to right.
pub const DEFAULT_COLUMNS: [&str; 3] = ["To Do", "In Progress", "Done"];

/// URL query parameter carrying the board ID.
pub const BOARD_QUERY_PARAM: &str = "board";

/// Calendar format for due dates and generated board names.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
