//! Name-indexed plugin registry.
//!
//! The rule-engine host discovers handlers by name through this registry;
//! each handler implements the uniform `(context) -> result` contract of
//! [`PolicyPlugin`].

use crate::context::PolicyContext;
use crate::error::{PolicyError, Result};
use crate::plugins::{EventDelegate, QueryProcessor};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// A policy plugin as seen by the rule-engine host.
#[async_trait]
pub trait PolicyPlugin: Send + Sync {
    /// The registration name the host dispatches on.
    fn name(&self) -> &str;

    /// The plugin's static self-description: the upstream event interfaces
    /// that may invoke it. Informational only, never enforced at runtime.
    fn usage(&self) -> &Value;

    async fn invoke(&self, ctx: &PolicyContext) -> Result<()>;
}

/// Registry mapping plugin names to handlers.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: Arc<RwLock<HashMap<String, Arc<dyn PolicyPlugin>>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin under its own name, replacing any previous handler
    /// with that name.
    pub fn register(&self, plugin: Arc<dyn PolicyPlugin>) -> Result<()> {
        let name = plugin.name().to_string();
        debug!(plugin = %name, "registering plugin");
        let mut plugins = self
            .plugins
            .write()
            .map_err(|_| PolicyError::Registry("failed to acquire write lock".to_string()))?;
        plugins.insert(name, plugin);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn PolicyPlugin>> {
        let plugins = self
            .plugins
            .read()
            .map_err(|_| PolicyError::Registry("failed to acquire read lock".to_string()))?;
        plugins
            .get(name)
            .cloned()
            .ok_or_else(|| PolicyError::PluginNotFound(name.to_string()))
    }

    /// Registered plugin names, sorted for stable listing.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .plugins
            .read()
            .map(|plugins| plugins.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Look up a plugin by name and invoke it with the given context.
    pub async fn invoke(&self, name: &str, ctx: &PolicyContext) -> Result<()> {
        let plugin = self.get(name)?;
        debug!(
            plugin = name,
            invocation_id = %ctx.invocation_id,
            "invoking plugin"
        );
        plugin.invoke(ctx).await
    }
}

/// Build a registry carrying both built-in plugins.
pub fn default_registry() -> PluginRegistry {
    let registry = PluginRegistry::new();
    // Registration on a freshly built registry cannot observe a poisoned lock.
    let _ = registry.register(Arc::new(EventDelegate));
    let _ = registry.register(Arc::new(QueryProcessor));
    registry
}
