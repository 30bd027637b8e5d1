//! Decoding store documents into typed entities.
//!
//! Snapshot decoding is lenient: a document that fails to decode is logged
//! and skipped so one malformed record cannot blank out a whole column or
//! board. Point reads (`decode_board`, `decode_task`) report the error.

use taskweb_store::{Document, StoreError};
use taskweb_types::{
    Board, BoardId, BoardRecord, Column, ColumnId, ColumnRecord, PresenceRecord, Task, TaskId,
    TaskRecord, UserId,
};
use tracing::warn;

fn bad_id(doc: &Document, err: uuid::Error) -> StoreError {
    StoreError::Decode { path: doc.path.to_string(), message: format!("bad document id: {err}") }
}

pub fn decode_board(doc: &Document, viewer: UserId) -> Result<Board, StoreError> {
    let id = BoardId::parse(doc.id()).map_err(|e| bad_id(doc, e))?;
    let record: BoardRecord = doc.decode()?;
    Ok(Board::from_record(id, record, viewer))
}

pub fn decode_column(doc: &Document) -> Result<Column, StoreError> {
    let id = ColumnId::parse(doc.id()).map_err(|e| bad_id(doc, e))?;
    let record: ColumnRecord = doc.decode()?;
    Ok(Column::from_record(id, record))
}

pub fn decode_task(doc: &Document) -> Result<Task, StoreError> {
    let id = TaskId::parse(doc.id()).map_err(|e| bad_id(doc, e))?;
    let record: TaskRecord = doc.decode()?;
    Ok(Task::from_record(id, record))
}

/// Decode every document, skipping (and logging) the ones that fail.
pub fn decode_all<T>(
    docs: &[Document],
    decode: impl Fn(&Document) -> Result<T, StoreError>,
) -> Vec<T> {
    docs.iter()
        .filter_map(|doc| match decode(doc) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(path = %doc.path, error = %e, "skipping undecodable document");
                None
            }
        })
        .collect()
}

pub fn decode_boards(docs: &[Document], viewer: UserId) -> Vec<Board> {
    decode_all(docs, |doc| decode_board(doc, viewer))
}

pub fn decode_columns(docs: &[Document]) -> Vec<Column> {
    decode_all(docs, decode_column)
}

pub fn decode_tasks(docs: &[Document]) -> Vec<Task> {
    decode_all(docs, decode_task)
}

pub fn decode_presence(docs: &[Document]) -> Vec<PresenceRecord> {
    decode_all(docs, |doc| doc.decode::<PresenceRecord>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;
    use serde_json::{Map, Value, json};

    fn doc(path: taskweb_store::DocPath, data: Value) -> Document {
        let Value::Object(map) = data else { return Document::new(path, Map::new()) };
        Document::new(path, map)
    }

    #[test]
    fn test_bad_documents_are_skipped() {
        let board = BoardId::new();
        let good = ColumnId::new();
        let docs = vec![
            doc(schema::column(board, good), json!({"title": "To Do", "order": 0})),
            doc(schema::column(board, ColumnId::new()), json!({"order": 1})),
            doc(schema::columns(board).doc("not-a-uuid"), json!({"title": "x"})),
        ];
        let columns = decode_columns(&docs);
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].id, good);
    }

    #[test]
    fn test_board_point_decode_reports_bad_id() {
        let d = doc(schema::boards().doc("nope"), json!({"name": "x", "owner": UserId::new()}));
        assert!(matches!(decode_board(&d, UserId::new()), Err(StoreError::Decode { .. })));
    }
}
