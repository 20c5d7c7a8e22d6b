use thiserror::Error;

pub type Result<T> = std::result::Result<T, PolicyError>;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("missing field: {0}")]
    MissingField(String),

    #[error("field {field} has the wrong type, expected {expected}")]
    FieldType { field: String, expected: &'static str },

    #[error("plugin not found: {0}")]
    PluginNotFound(String),

    #[error("registry error: {0}")]
    Registry(String),

    #[error("query failed [{code}]::[{message}]")]
    Query { code: i32, message: String },

    #[error("query matched no rows")]
    NoRows,

    #[error("query processor encountered an error for [{failed}] rows for query [{query}]")]
    RowErrors { failed: usize, query: String },

    #[error("policy dispatch failed: {0}")]
    Dispatch(String),

    #[error("session error: {0}")]
    Session(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
