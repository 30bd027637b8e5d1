//! Board and column records.
//!
//! Each entity comes in two shapes:
//!
//! - a `*Record`: exactly the fields persisted in the document store, with
//!   camelCase wire names and optional fields made explicit;
//! - the entity itself (`Board`, `Column`): the record plus its document ID,
//!   and for boards the derived `is_owner` flag.
//!
//! Unknown fields in stored documents are ignored on decode.

use serde::{Deserialize, Serialize};

use crate::ids::{BoardId, ColumnId, UserId};

/// Persisted board document (`boards/{id}`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardRecord {
    pub name: String,
    pub owner: UserId,
    #[serde(default)]
    pub is_collaborative: bool,
    /// Unix millis; `None` while a server timestamp is pending.
    #[serde(default)]
    pub created_at: Option<u64>,
    #[serde(default)]
    pub updated_at: Option<u64>,
}

/// A board as seen by one user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Board {
    pub id: BoardId,
    pub name: String,
    pub owner: UserId,
    pub is_collaborative: bool,
    pub created_at: Option<u64>,
    pub updated_at: Option<u64>,
    /// Derived client-side as `owner == viewer`. Never persisted, never an
    /// authorization decision on its own.
    pub is_owner: bool,
}

impl Board {
    /// Build the viewer-relative board from its stored record.
    pub fn from_record(id: BoardId, record: BoardRecord, viewer: UserId) -> Self {
        Self {
            id,
            is_owner: record.owner == viewer,
            name: record.name,
            owner: record.owner,
            is_collaborative: record.is_collaborative,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    /// "Collaborative" or "Solo", for board badges.
    pub fn kind_label(&self) -> &'static str {
        if self.is_collaborative { "Collaborative" } else { "Solo" }
    }
}

/// Persisted column document (`boards/{board}/columns/{id}`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnRecord {
    pub title: String,
    /// Display hint; not unique, gaps allowed.
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub created_at: Option<u64>,
    #[serde(default)]
    pub updated_at: Option<u64>,
}

/// A column of a board. The board ID is implicit in the document path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Column {
    pub id: ColumnId,
    pub title: String,
    pub order: i64,
    pub created_at: Option<u64>,
    pub updated_at: Option<u64>,
}

impl Column {
    pub fn from_record(id: ColumnId, record: ColumnRecord) -> Self {
        Self {
            id,
            title: record.title,
            order: record.order,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    /// Whether this column counts as "completed" on the dashboard.
    pub fn is_done_column(&self) -> bool {
        self.title.trim().eq_ignore_ascii_case("done")
    }
}

/// Sort columns for display: ascending `order`, ties broken by ID.
///
/// `sort_by` is stable and the ID tiebreak makes the result independent of
/// the order the store delivered the documents in.
pub fn sort_columns(columns: &mut [Column]) {
    columns.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
}

/// Partial board update.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BoardPatch {
    pub name: Option<String>,
}

/// Partial column update.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnPatch {
    pub title: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================
