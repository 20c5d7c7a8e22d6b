//! Per-invocation context handed to every plugin.

use crate::session::{PolicyInvoker, QueryEngine, StorageSession};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Everything a plugin needs for one invocation: the dynamic parameter and
/// configuration payloads plus handles to the external collaborators. The
/// context lives for a single invocation; the parameter payload is only ever
/// cloned and augmented, never mutated in place.
pub struct PolicyContext {
    pub instance_name: String,
    pub invocation_id: Uuid,
    pub parameters: Value,
    pub configuration: Value,
    pub session: Arc<dyn StorageSession>,
    pub invoker: Arc<dyn PolicyInvoker>,
    pub query_engine: Arc<dyn QueryEngine>,
}

impl PolicyContext {
    pub fn new(
        instance_name: impl Into<String>,
        parameters: Value,
        configuration: Value,
        session: Arc<dyn StorageSession>,
        invoker: Arc<dyn PolicyInvoker>,
        query_engine: Arc<dyn QueryEngine>,
    ) -> Self {
        Self {
            instance_name: instance_name.into(),
            invocation_id: Uuid::new_v4(),
            parameters,
            configuration,
            session,
            invoker,
            query_engine,
        }
    }
}

impl fmt::Debug for PolicyContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyContext")
            .field("instance_name", &self.instance_name)
            .field("invocation_id", &self.invocation_id)
            .field("parameters", &self.parameters)
            .field("configuration", &self.configuration)
            .finish_non_exhaustive()
    }
}
