//! Slash-separated document and collection paths.
//!
//! Collections sit at odd depths (`boards`, `boards/{id}/tasks`), documents
//! at even depths (`boards/{id}`, `boards/{id}/tasks/{task}`).

use std::fmt;

/// Path to a collection of documents.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath(String);

/// Path to a single document.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocPath(String);

impl CollectionPath {
    /// A top-level collection.
    pub fn root(name: &str) -> Self {
        Self(name.to_string())
    }

    /// The document `id` inside this collection.
    pub fn doc(&self, id: impl fmt::Display) -> DocPath {
        DocPath(format!("{}/{}", self.0, id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `doc` is a direct child of this collection.
    pub fn contains(&self, doc: &DocPath) -> bool {
        doc.parent().as_ref() == Some(self)
    }
}

impl DocPath {
    /// Sub-collection `name` under this document.
    pub fn collection(&self, name: &str) -> CollectionPath {
        CollectionPath(format!("{}/{}", self.0, name))
    }

    /// The final path segment (the document ID).
    pub fn id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// The collection this document lives in.
    pub fn parent(&self) -> Option<CollectionPath> {
        self.0.rsplit_once('/').map(|(parent, _)| CollectionPath(parent.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
