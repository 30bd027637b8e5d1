//! Collection queries: equality predicates plus an optional ordering.

use std::cmp::Ordering;

use serde::Serialize;
use serde_json::Value;

use crate::document::Document;
use crate::path::CollectionPath;

/// Sort direction for [`Query::order_by`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// A query over one collection.
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    pub collection: CollectionPath,
    filters: Vec<(String, Value)>,
    order: Option<(String, Direction)>,
}

impl Query {
    /// Every document in `collection`, in ID order.
    pub fn collection(collection: CollectionPath) -> Self {
        Self { collection, filters: Vec::new(), order: None }
    }

    /// Keep documents whose `field` equals `value`.
    pub fn where_eq(mut self, field: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.filters.push((field.to_string(), value));
        self
    }

    /// Order results by `field`. Ties (and missing fields) fall back to
    /// document ID so results are always totally ordered.
    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order = Some((field.to_string(), direction));
        self
    }

    /// Whether `doc` belongs to this query's result set.
    pub fn matches(&self, doc: &Document) -> bool {
        self.collection.contains(&doc.path)
            && self
                .filters
                .iter()
                .all(|(field, expected)| doc.get(field).unwrap_or(&Value::Null) == expected)
    }

    /// Sort a result set in place.
    pub fn sort(&self, docs: &mut [Document]) {
        match &self.order {
            Some((field, direction)) => docs.sort_by(|a, b| {
                let ord = compare_values(a.get(field), b.get(field));
                let ord = match direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                };
                ord.then_with(|| a.id().cmp(b.id()))
            }),
            None => docs.sort_by(|a, b| a.id().cmp(b.id())),
        }
    }
}

/// Total order over field values: missing < null < bool < number < string.
/// Other value kinds compare equal.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(_) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
