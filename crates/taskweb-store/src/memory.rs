//! In-process realtime document store.
//!
//! `MemoryStore` implements the full [`DocumentStore`] contract in memory:
//! atomic batches, server timestamps, and live subscriptions that receive a
//! fresh snapshot after every commit touching their target. It backs the
//! test suites and the simulator.
//!
//! # Fault injection
//!
//! Tests reach the failure paths through explicit switches:
//!
//! - [`fail_next_commit_after`](MemoryStore::fail_next_commit_after): the next
//!   batch fails after staging `n` writes; nothing is applied.
//! - [`fail_writes_to`](MemoryStore::fail_writes_to): commits touching a path
//!   prefix are rejected with `PermissionDenied`.
//! - [`deny_subscriptions`](MemoryStore::deny_subscriptions): new watches on a
//!   prefix get a `PermissionDenied` event instead of snapshots.
//! - [`emit_error`](MemoryStore::emit_error): push a listener error into live
//!   subscriptions without closing them.
//! - [`set_unavailable`](MemoryStore::set_unavailable): every operation fails.
//!
//! Every applied write is appended to [`write_log`](MemoryStore::write_log).

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::clock::{Clock, SystemClock};
use crate::document::{Document, SetMode, WriteBatch, WriteOp};
use crate::error::StoreError;
use crate::path::DocPath;
use crate::query::Query;
use crate::store::DocumentStore;
use crate::subscription::{SnapshotEvent, SnapshotSink, Subscription};

/// Kind of an applied write, as recorded in the write log.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteKind {
    Set,
    Update,
    Delete,
}

/// One applied write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteRecord {
    pub path: DocPath,
    pub kind: WriteKind,
}

enum WatchTarget {
    Document(DocPath),
    Query(Query),
}

impl WatchTarget {
    fn affected_by(&self, path: &DocPath) -> bool {
        match self {
            Self::Document(target) => target == path,
            Self::Query(query) => query.collection.contains(path),
        }
    }

    fn path_str(&self) -> &str {
        match self {
            Self::Document(path) => path.as_str(),
            Self::Query(query) => query.collection.as_str(),
        }
    }
}

struct Watcher {
    target: WatchTarget,
    sink: SnapshotSink,
    denied: bool,
}

#[derive(Default)]
struct Faults {
    fail_next_commit_after: Option<usize>,
    failing_write_prefixes: Vec<String>,
    denied_watch_prefixes: Vec<String>,
    unavailable: bool,
}

#[derive(Default)]
struct Inner {
    docs: BTreeMap<DocPath, Map<String, Value>>,
    watchers: Vec<Watcher>,
    faults: Faults,
    write_log: Vec<WriteRecord>,
}

impl Inner {
    fn snapshot(&self, target: &WatchTarget) -> Vec<Document> {
        match target {
            WatchTarget::Document(path) => self
                .docs
                .get(path)
                .map(|data| vec![Document::new(path.clone(), data.clone())])
                .unwrap_or_default(),
            WatchTarget::Query(query) => self.run_query(query),
        }
    }

    fn run_query(&self, query: &Query) -> Vec<Document> {
        let mut docs: Vec<Document> = self
            .docs
            .iter()
            .map(|(path, data)| Document::new(path.clone(), data.clone()))
            .filter(|doc| query.matches(doc))
            .collect();
        query.sort(&mut docs);
        docs
    }

    /// Push fresh snapshots to every live watcher affected by `touched`.
    fn notify(&mut self, touched: &[DocPath]) {
        self.watchers.retain(|w| !w.sink.is_closed());
        for watcher in &self.watchers {
            if watcher.denied || !touched.iter().any(|p| watcher.target.affected_by(p)) {
                continue;
            }
            let docs = self.snapshot(&watcher.target);
            trace!(target_path = watcher.target.path_str(), count = docs.len(), "delivering snapshot");
            watcher.sink.send(SnapshotEvent::Snapshot(docs));
        }
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.faults.unavailable {
            return Err(StoreError::Unavailable("store offline".into()));
        }
        Ok(())
    }
}

/// An in-memory [`DocumentStore`].
pub struct MemoryStore {
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Store stamped by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Store stamped by `clock` (use a `ManualClock` for deterministic tests).
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { clock, inner: Mutex::new(Inner::default()) }
    }

    /// Seed a document directly, bypassing the write log. Live watchers
    /// still see the change.
    pub fn insert_raw(&self, path: DocPath, data: Value) {
        let mut inner = self.inner.lock();
        let data = match data {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        inner.docs.insert(path.clone(), data);
        inner.notify(&[path]);
    }

    /// Raw field map of a stored document.
    pub fn document(&self, path: &DocPath) -> Option<Map<String, Value>> {
        self.inner.lock().docs.get(path).cloned()
    }

    /// Every write applied so far, in commit order.
    pub fn write_log(&self) -> Vec<WriteRecord> {
        self.inner.lock().write_log.clone()
    }

    pub fn clear_write_log(&self) {
        self.inner.lock().write_log.clear();
    }

    /// Live (not cancelled) subscriptions.
    pub fn watcher_count(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.watchers.retain(|w| !w.sink.is_closed());
        inner.watchers.len()
    }

    /// Fail the next commit after staging `writes` operations.
    pub fn fail_next_commit_after(&self, writes: usize) {
        self.inner.lock().faults.fail_next_commit_after = Some(writes);
    }

    /// Reject commits touching any path under `prefix`.
    pub fn fail_writes_to(&self, prefix: impl Into<String>) {
        self.inner.lock().faults.failing_write_prefixes.push(prefix.into());
    }

    /// Deny new subscriptions under `prefix`.
    pub fn deny_subscriptions(&self, prefix: impl Into<String>) {
        self.inner.lock().faults.denied_watch_prefixes.push(prefix.into());
    }

    /// Remove every write/subscription fault.
    pub fn clear_faults(&self) {
        self.inner.lock().faults = Faults::default();
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.lock().faults.unavailable = unavailable;
    }

    /// Deliver `error` to every live subscription under `prefix`.
    pub fn emit_error(&self, prefix: &str, error: StoreError) {
        let inner = self.inner.lock();
        for watcher in &inner.watchers {
            if watcher.target.path_str().starts_with(prefix) {
                watcher.sink.send(SnapshotEvent::Error(error.clone()));
            }
        }
    }

    fn watch(&self, target: WatchTarget) -> Subscription {
        let (sink, subscription) = Subscription::channel();
        let mut inner = self.inner.lock();

        let denied = inner.faults.unavailable
            || inner
                .faults
                .denied_watch_prefixes
                .iter()
                .any(|prefix| target.path_str().starts_with(prefix.as_str()));

        if denied {
            debug!(target_path = target.path_str(), "subscription denied");
            sink.send(SnapshotEvent::Error(StoreError::PermissionDenied(
                target.path_str().to_string(),
            )));
        } else {
            sink.send(SnapshotEvent::Snapshot(inner.snapshot(&target)));
        }

        inner.watchers.push(Watcher { target, sink, denied });
        subscription
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }

    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        let inner = self.inner.lock();
        inner.check_available()?;
        Ok(inner.docs.get(path).map(|data| Document::new(path.clone(), data.clone())))
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        let inner = self.inner.lock();
        inner.check_available()?;
        Ok(inner.run_query(query))
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.check_available()?;

        let ops = batch.into_ops();
        for op in &ops {
            let path = op.path();
            if inner
                .faults
                .failing_write_prefixes
                .iter()
                .any(|prefix| path.starts_with(prefix))
            {
                return Err(StoreError::PermissionDenied(path.to_string()));
            }
        }

        let now = self.clock.now_millis();
        let fail_after = inner.faults.fail_next_commit_after.take();
        let injected = |applied: usize| {
            StoreError::BatchFailed(format!("injected failure after {applied} of {} writes", ops.len()))
        };

        // Stage every write first so a failure leaves the store untouched
        let mut staged: BTreeMap<DocPath, Option<Map<String, Value>>> = BTreeMap::new();
        for (applied, op) in ops.iter().enumerate() {
            if fail_after == Some(applied) {
                return Err(injected(applied));
            }
            let current = match staged.get(op.path()) {
                Some(doc) => doc.clone(),
                None => inner.docs.get(op.path()).cloned(),
            };
            let next = match op {
                WriteOp::Set { fields, mode, .. } => {
                    let mut data = match (mode, current) {
                        (SetMode::Merge, Some(existing)) => existing,
                        _ => Map::new(),
                    };
                    fields.apply_to(&mut data, now);
                    Some(data)
                }
                WriteOp::Update { path, fields } => {
                    let Some(mut data) = current else {
                        return Err(StoreError::NotFound(path.to_string()));
                    };
                    fields.apply_to(&mut data, now);
                    Some(data)
                }
                WriteOp::Delete { .. } => None,
            };
            staged.insert(op.path().clone(), next);
        }
        if fail_after.is_some() {
            return Err(injected(ops.len()));
        }

        for (path, doc) in staged {
            match doc {
                Some(data) => inner.docs.insert(path, data),
                None => inner.docs.remove(&path),
            };
        }

        let mut touched = Vec::with_capacity(ops.len());
        for op in &ops {
            let kind = match op {
                WriteOp::Set { .. } => WriteKind::Set,
                WriteOp::Update { .. } => WriteKind::Update,
                WriteOp::Delete { .. } => WriteKind::Delete,
            };
            inner.write_log.push(WriteRecord { path: op.path().clone(), kind });
            touched.push(op.path().clone());
        }
        debug!(writes = ops.len(), "batch committed");

        inner.notify(&touched);
        Ok(())
    }

    fn watch_document(&self, path: &DocPath) -> Subscription {
        self.watch(WatchTarget::Document(path.clone()))
    }

    fn watch_query(&self, query: &Query) -> Subscription {
        self.watch(WatchTarget::Query(query.clone()))
    }
}

// ============================================================================
// Tests
// ============================================================================
