//! Store layout: collection paths and field names.
//!
//! ```text
//! boards/{board}
//! boards/{board}/columns/{column}
//! boards/{board}/tasks/{task}
//! boardPresence/{board}/users/{user}
//! ```

use taskweb_store::{CollectionPath, DocPath};
use taskweb_types::{BoardId, ColumnId, TaskId, UserId};

const BOARDS: &str = "boards";
const COLUMNS: &str = "columns";
const TASKS: &str = "tasks";
const PRESENCE: &str = "boardPresence";
const PRESENCE_USERS: &str = "users";

pub fn boards() -> CollectionPath {
    CollectionPath::root(BOARDS)
}

pub fn board(id: BoardId) -> DocPath {
    boards().doc(id)
}

pub fn columns(board_id: BoardId) -> CollectionPath {
    board(board_id).collection(COLUMNS)
}

pub fn column(board_id: BoardId, id: ColumnId) -> DocPath {
    columns(board_id).doc(id)
}

pub fn tasks(board_id: BoardId) -> CollectionPath {
    board(board_id).collection(TASKS)
}

pub fn task(board_id: BoardId, id: TaskId) -> DocPath {
    tasks(board_id).doc(id)
}

pub fn presence_users(board_id: BoardId) -> CollectionPath {
    CollectionPath::root(PRESENCE).doc(board_id).collection(PRESENCE_USERS)
}

pub fn presence(board_id: BoardId, user: UserId) -> DocPath {
    presence_users(board_id).doc(user)
}

/// Persisted field names (camelCase on the wire).
pub mod field {
    pub const NAME: &str = "name";
    pub const OWNER: &str = "owner";
    pub const IS_COLLABORATIVE: &str = "isCollaborative";
    pub const CREATED_AT: &str = "createdAt";
    pub const UPDATED_AT: &str = "updatedAt";

    pub const TITLE: &str = "title";
    pub const ORDER: &str = "order";

    pub const COLUMN_ID: &str = "columnId";
    pub const DESCRIPTION: &str = "description";
    pub const PRIORITY: &str = "priority";
    pub const DUE_DATE: &str = "dueDate";
    pub const CREATED_BY: &str = "createdBy";
    pub const LOCKED_BY: &str = "lockedBy";

    pub const USER_ID: &str = "userId";
    pub const LAST_ACTIVE: &str = "lastActive";
    pub const JOINED_AT: &str = "joinedAt";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let b = BoardId::new();
        let t = TaskId::new();
        let u = UserId::new();
        assert_eq!(task(b, t).as_str(), format!("boards/{b}/tasks/{t}"));
        assert_eq!(presence(b, u).as_str(), format!("boardPresence/{b}/users/{u}"));
        assert!(columns(b).contains(&column(b, ColumnId::new())));
    }
}
