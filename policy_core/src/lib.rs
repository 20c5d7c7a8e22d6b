pub mod context;
pub mod error;
pub mod matcher;
pub mod memory;
pub mod params;
pub mod paths;
pub mod plugins;
pub mod registry;
pub mod session;
pub mod tokens;

pub use context::PolicyContext;
pub use error::{PolicyError, Result};
pub use matcher::{MatchSpec, MetadataEntry};
pub use params::EventParameters;
pub use registry::{default_registry, PluginRegistry, PolicyPlugin};
pub use session::{PolicyInvoker, Query, QueryEngine, QueryRow, QueryType, StorageSession};
