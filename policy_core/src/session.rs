//! Collaborator seams consumed by the policy plugins.
//!
//! The plugins never talk to the storage middleware directly; everything
//! flows through these traits so a deployment can bind them to the real
//! server APIs and tests can bind them to the in-memory implementations in
//! [`crate::memory`].

use crate::error::{PolicyError, Result};
use crate::matcher::MetadataEntry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Read access to the storage namespace for one invocation. Implementations
/// must tolerate concurrent read use; the query dispatcher shares the handle
/// across row jobs.
#[async_trait]
pub trait StorageSession: Send + Sync {
    async fn is_data_object(&self, path: &str) -> Result<bool>;
    async fn is_collection(&self, path: &str) -> Result<bool>;
    async fn metadata_for(&self, path: &str) -> Result<Vec<MetadataEntry>>;
}

/// The nested-dispatch seam: invoke a named downstream policy with the
/// serialized parameter and configuration payloads.
#[async_trait]
pub trait PolicyInvoker: Send + Sync {
    async fn invoke(&self, policy: &str, parameters: &str, configuration: &str) -> Result<()>;
}

/// Catalog query class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    General,
    Specific,
}

impl QueryType {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "general" => Ok(QueryType::General),
            "specific" => Ok(QueryType::Specific),
            other => Err(PolicyError::InvalidInput(format!(
                "unknown query type [{other}]"
            ))),
        }
    }
}

/// A fully substituted catalog query ready for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub string: String,
    pub limit: u32,
    pub query_type: QueryType,
}

/// One result row: the selected columns in query order.
pub type QueryRow = Vec<String>;

/// Catalog query execution. A query that matches nothing is reported as
/// [`PolicyError::NoRows`], which callers treat as success; any other failure
/// carries the engine's original code and message.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    async fn execute(&self, query: &Query) -> Result<Vec<QueryRow>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_type_parses_known_values() {
        assert_eq!(QueryType::parse("general").unwrap(), QueryType::General);
        assert_eq!(QueryType::parse("specific").unwrap(), QueryType::Specific);
        assert!(matches!(
            QueryType::parse("columnar"),
            Err(PolicyError::InvalidInput(_))
        ));
    }
}
