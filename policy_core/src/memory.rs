//! In-memory reference collaborators.
//!
//! These back the CLI's scenario runner and the test suites. They are kept
//! deliberately small: a namespace map, a dispatch recorder, and a canned
//! query engine.

use crate::error::{PolicyError, Result};
use crate::matcher::MetadataEntry;
use crate::session::{PolicyInvoker, Query, QueryEngine, QueryRow, StorageSession};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Collection,
    DataObject,
}

#[derive(Debug)]
struct NamespaceEntry {
    kind: EntryKind,
    metadata: Vec<MetadataEntry>,
}

/// An in-memory storage namespace keyed by logical path.
#[derive(Debug, Default)]
pub struct MemoryNamespace {
    entries: RwLock<HashMap<String, NamespaceEntry>>,
}

impl MemoryNamespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_collection(&self, path: &str) {
        self.insert(path, EntryKind::Collection);
    }

    pub fn add_data_object(&self, path: &str) {
        self.insert(path, EntryKind::DataObject);
    }

    /// Attach a metadata entry to an existing path; unknown paths are
    /// created as collections first.
    pub fn attach_metadata(&self, path: &str, entry: MetadataEntry) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries
            .entry(path.to_string())
            .or_insert_with(|| NamespaceEntry {
                kind: EntryKind::Collection,
                metadata: Vec::new(),
            })
            .metadata
            .push(entry);
    }

    fn insert(&self, path: &str, kind: EntryKind) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            path.to_string(),
            NamespaceEntry {
                kind,
                metadata: Vec::new(),
            },
        );
    }

    fn kind_of(&self, path: &str) -> Option<EntryKind> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(path).map(|entry| entry.kind)
    }
}

#[async_trait]
impl StorageSession for MemoryNamespace {
    async fn is_data_object(&self, path: &str) -> Result<bool> {
        Ok(self.kind_of(path) == Some(EntryKind::DataObject))
    }

    async fn is_collection(&self, path: &str) -> Result<bool> {
        Ok(self.kind_of(path) == Some(EntryKind::Collection))
    }

    async fn metadata_for(&self, path: &str) -> Result<Vec<MetadataEntry>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        Ok(entries
            .get(path)
            .map(|entry| entry.metadata.clone())
            .unwrap_or_default())
    }
}

/// A dispatched nested policy invocation as recorded by [`CollectingInvoker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub policy: String,
    pub parameters: String,
    pub configuration: String,
}

/// Records every nested dispatch; optionally fails each one with a fixed
/// message so failure-handling paths can be exercised.
#[derive(Debug, Default)]
pub struct CollectingInvoker {
    dispatches: Mutex<Vec<Dispatch>>,
    fail_with: Option<String>,
}

impl CollectingInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            dispatches: Mutex::new(Vec::new()),
            fail_with: Some(message.into()),
        }
    }

    pub fn dispatches(&self) -> Vec<Dispatch> {
        self.dispatches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.dispatches.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PolicyInvoker for CollectingInvoker {
    async fn invoke(&self, policy: &str, parameters: &str, configuration: &str) -> Result<()> {
        debug!(policy, "recording nested dispatch");
        self.dispatches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Dispatch {
                policy: policy.to_string(),
                parameters: parameters.to_string(),
                configuration: configuration.to_string(),
            });

        match &self.fail_with {
            Some(message) => Err(PolicyError::Dispatch(message.clone())),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
enum QueryResponse {
    Rows(Vec<QueryRow>),
    NoRows,
    Fail { code: i32, message: String },
}

/// A query engine returning a canned response, recording each executed query
/// string so tests can assert on token substitution.
#[derive(Debug)]
pub struct FixedQueryEngine {
    response: QueryResponse,
    executed: Mutex<Vec<String>>,
}

impl FixedQueryEngine {
    pub fn with_rows(rows: Vec<QueryRow>) -> Self {
        Self {
            response: QueryResponse::Rows(rows),
            executed: Mutex::new(Vec::new()),
        }
    }

    /// An engine that reports the distinguished no-rows condition.
    pub fn no_rows() -> Self {
        Self {
            response: QueryResponse::NoRows,
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(code: i32, message: impl Into<String>) -> Self {
        Self {
            response: QueryResponse::Fail {
                code,
                message: message.into(),
            },
            executed: Mutex::new(Vec::new()),
        }
    }

    /// The query strings this engine has executed, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl QueryEngine for FixedQueryEngine {
    async fn execute(&self, query: &Query) -> Result<Vec<QueryRow>> {
        self.executed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(query.string.clone());

        match &self.response {
            QueryResponse::Rows(rows) => Ok(rows.clone()),
            QueryResponse::NoRows => Err(PolicyError::NoRows),
            QueryResponse::Fail { code, message } => Err(PolicyError::Query {
                code: *code,
                message: message.clone(),
            }),
        }
    }
}
