//! Collection-metadata event delegate.
//!
//! Walks the triggering path's ancestor collections looking for metadata
//! that matches a configured rule, and re-invokes the configured policy for
//! every ancestor that matches.

use super::EVENT_INTERFACE_USAGE;
use crate::context::PolicyContext;
use crate::error::{PolicyError, Result};
use crate::matcher::{match_metadata, MatchSpec, MetadataEntry};
use crate::params::EventParameters;
use crate::paths;
use crate::registry::PolicyPlugin;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error};

pub const PLUGIN_NAME: &str = "event_delegate_collection_metadata";

/// The `match` block of a policy descriptor.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchBlock {
    pub metadata: MatchSpec,
}

/// One configured downstream policy: its match rule, its name, and the
/// configuration payload forwarded on dispatch.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyDescriptor {
    #[serde(rename = "match")]
    pub match_block: Option<MatchBlock>,
    pub policy: String,
    #[serde(default)]
    pub configuration: Value,
}

/// What to do when a nested dispatch fails mid-walk. The default mirrors the
/// delegate's best-effort fan-out contract: log the failure and keep walking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchFailureMode {
    #[default]
    LogAndContinue,
    Propagate,
}

#[derive(Debug, Clone, Deserialize)]
struct DelegateConfig {
    #[serde(default)]
    policies_to_invoke: Vec<PolicyDescriptor>,
    #[serde(default)]
    on_dispatch_failure: DispatchFailureMode,
}

/// The event delegate plugin.
#[derive(Debug, Default)]
pub struct EventDelegate;

impl EventDelegate {
    /// Ascend from the triggering path to the root on behalf of one policy
    /// descriptor, dispatching at every ancestor whose metadata matches.
    /// The root itself is never evaluated.
    async fn walk(
        &self,
        ctx: &PolicyContext,
        event: &EventParameters,
        descriptor: &PolicyDescriptor,
        spec: &MatchSpec,
        trigger_entity_type: Option<&str>,
        failure_mode: DispatchFailureMode,
    ) -> Result<()> {
        let mut current = event.logical_path.clone();

        while !current.is_empty() && current != paths::ROOT {
            if ctx.session.is_data_object(&current).await? {
                current = paths::parent_of(&current);
                continue;
            }

            let metadata = ctx.session.metadata_for(&current).await?;
            if metadata.is_empty() {
                current = paths::parent_of(&current);
                continue;
            }

            let Some(matched) = match_metadata(spec, &metadata) else {
                current = paths::parent_of(&current);
                continue;
            };

            // Both sides must carry an entity type for the filter to apply.
            if let (Some(expected), Some(actual)) =
                (spec.entity_type.as_deref(), trigger_entity_type)
            {
                if expected != actual {
                    debug!(
                        path = %current,
                        expected,
                        actual,
                        "entity type mismatch, suppressing dispatch"
                    );
                    current = paths::parent_of(&current);
                    continue;
                }
            }

            debug!(
                policy = %descriptor.policy,
                path = %current,
                attribute = %matched.attribute,
                "ancestor metadata matched, dispatching policy"
            );

            let forwarded = forwarded_parameters(&ctx.parameters, matched);
            let parameters_text = forwarded.to_string();
            let configuration_text = descriptor.configuration.to_string();

            if let Err(cause) = ctx
                .invoker
                .invoke(&descriptor.policy, &parameters_text, &configuration_text)
                .await
            {
                match failure_mode {
                    DispatchFailureMode::LogAndContinue => {
                        error!(
                            policy = %descriptor.policy,
                            path = %current,
                            error = %cause,
                            "nested policy dispatch failed, continuing walk"
                        );
                    }
                    DispatchFailureMode::Propagate => return Err(cause),
                }
            }

            current = paths::parent_of(&current);
        }

        Ok(())
    }
}

/// Clone the invocation parameters and overwrite the embedded match metadata
/// with the entry that actually matched.
fn forwarded_parameters(parameters: &Value, matched: &MetadataEntry) -> Value {
    let mut forwarded = parameters.clone();
    if !forwarded.is_object() {
        forwarded = Value::Object(serde_json::Map::new());
    }
    // A non-object `match` value in the trigger parameters would make the
    // nested insert below panic; replace it the same way as the root.
    if let Some(stale) = forwarded.get_mut("match") {
        if !stale.is_object() {
            *stale = Value::Object(serde_json::Map::new());
        }
    }
    forwarded["match"]["metadata"] = json!({
        "attribute": matched.attribute,
        "value": matched.value,
        "units": matched.units,
    });
    forwarded
}

#[async_trait]
impl PolicyPlugin for EventDelegate {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn usage(&self) -> &Value {
        &EVENT_INTERFACE_USAGE
    }

    async fn invoke(&self, ctx: &PolicyContext) -> Result<()> {
        let config: DelegateConfig = serde_json::from_value(ctx.configuration.clone())?;
        if config.policies_to_invoke.is_empty() {
            return Err(PolicyError::InvalidInput(
                "policies_to_invoke is empty for event delegate".to_string(),
            ));
        }

        let event = EventParameters::capture(&ctx.parameters)?;
        let trigger_entity_type = ctx
            .parameters
            .get("metadata")
            .and_then(|metadata| metadata.get("entity_type"))
            .and_then(Value::as_str);

        for descriptor in &config.policies_to_invoke {
            let Some(spec) = descriptor.match_block.as_ref().map(|block| &block.metadata)
            else {
                error!(
                    policy = %descriptor.policy,
                    "policy descriptor does not carry match metadata"
                );
                continue;
            };

            self.walk(
                ctx,
                &event,
                descriptor,
                spec,
                trigger_entity_type,
                config.on_dispatch_failure,
            )
            .await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{CollectingInvoker, FixedQueryEngine, MemoryNamespace};
    use std::sync::Arc;

    fn namespace() -> MemoryNamespace {
        let ns = MemoryNamespace::new();
        ns.add_collection("/zone");
        ns.add_collection("/zone/a");
        ns.add_collection("/zone/a/b");
        ns.add_data_object("/zone/a/b/obj.txt");
        ns
    }

    fn delegate_config(policy: &str, spec: Value) -> Value {
        json!({
            "policies_to_invoke": [
                {
                    "match": { "metadata": spec },
                    "policy": policy,
                    "configuration": { "verbose": true }
                }
            ]
        })
    }

    fn context(
        parameters: Value,
        configuration: Value,
        ns: MemoryNamespace,
        invoker: Arc<CollectingInvoker>,
    ) -> PolicyContext {
        PolicyContext::new(
            "test-instance",
            parameters,
            configuration,
            Arc::new(ns),
            invoker,
            Arc::new(FixedQueryEngine::with_rows(Vec::new())),
        )
    }

    #[tokio::test]
    async fn empty_policy_list_is_invalid_input() {
        let invoker = Arc::new(CollectingInvoker::new());
        let ctx = context(
            json!({"logical_path": "/zone/a/b/obj.txt"}),
            json!({"policies_to_invoke": []}),
            namespace(),
            invoker,
        );

        let result = EventDelegate.invoke(&ctx).await;
        assert!(matches!(result, Err(PolicyError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn matching_ancestor_dispatches_once_with_matched_metadata() {
        let ns = namespace();
        ns.attach_metadata("/zone/a", MetadataEntry::new("x", "1", ""));

        let invoker = Arc::new(CollectingInvoker::new());
        let ctx = context(
            json!({"logical_path": "/zone/a/b/obj.txt"}),
            delegate_config("irods_policy_replication", json!({"attribute": "x", "value": "1"})),
            ns,
            Arc::clone(&invoker),
        );

        EventDelegate.invoke(&ctx).await.unwrap();

        let dispatches = invoker.dispatches();
        assert_eq!(dispatches.len(), 1);
        assert_eq!(dispatches[0].policy, "irods_policy_replication");

        let forwarded: Value = serde_json::from_str(&dispatches[0].parameters).unwrap();
        assert_eq!(
            forwarded["match"]["metadata"],
            json!({"attribute": "x", "value": "1", "units": ""})
        );
        let config: Value = serde_json::from_str(&dispatches[0].configuration).unwrap();
        assert_eq!(config, json!({"verbose": true}));
    }

    #[tokio::test]
    async fn every_matching_ancestor_dispatches_in_ascension_order() {
        let ns = namespace();
        ns.attach_metadata("/zone/a", MetadataEntry::new("x", "1", ""));
        ns.attach_metadata("/zone", MetadataEntry::new("x", "1", ""));

        let invoker = Arc::new(CollectingInvoker::new());
        let ctx = context(
            json!({"logical_path": "/zone/a/b/obj.txt"}),
            delegate_config("p", json!({"attribute": "x"})),
            ns,
            Arc::clone(&invoker),
        );

        EventDelegate.invoke(&ctx).await.unwrap();
        // /zone/a matches before /zone; the root is never evaluated.
        assert_eq!(invoker.len(), 2);
    }

    #[tokio::test]
    async fn entity_type_mismatch_suppresses_dispatch() {
        let ns = namespace();
        ns.attach_metadata("/zone/a", MetadataEntry::new("x", "1", ""));

        let invoker = Arc::new(CollectingInvoker::new());
        let ctx = context(
            json!({
                "logical_path": "/zone/a/b/obj.txt",
                "metadata": { "entity_type": "data_object" }
            }),
            delegate_config(
                "p",
                json!({"attribute": "x", "value": "1", "entity_type": "collection"}),
            ),
            ns,
            Arc::clone(&invoker),
        );

        EventDelegate.invoke(&ctx).await.unwrap();
        assert!(invoker.is_empty());
    }

    #[tokio::test]
    async fn entity_type_match_still_dispatches() {
        let ns = namespace();
        ns.attach_metadata("/zone/a", MetadataEntry::new("x", "1", ""));

        let invoker = Arc::new(CollectingInvoker::new());
        let ctx = context(
            json!({
                "logical_path": "/zone/a/b/obj.txt",
                "metadata": { "entity_type": "collection" }
            }),
            delegate_config(
                "p",
                json!({"attribute": "x", "value": "1", "entity_type": "collection"}),
            ),
            ns,
            Arc::clone(&invoker),
        );

        EventDelegate.invoke(&ctx).await.unwrap();
        assert_eq!(invoker.len(), 1);
    }

    #[tokio::test]
    async fn descriptor_without_match_metadata_is_skipped() {
        let ns = namespace();
        ns.attach_metadata("/zone/a", MetadataEntry::new("x", "1", ""));

        let invoker = Arc::new(CollectingInvoker::new());
        let ctx = context(
            json!({"logical_path": "/zone/a/b/obj.txt"}),
            json!({
                "policies_to_invoke": [
                    { "policy": "no_match_block" },
                    {
                        "match": { "metadata": { "attribute": "x" } },
                        "policy": "with_match_block"
                    }
                ]
            }),
            ns,
            Arc::clone(&invoker),
        );

        EventDelegate.invoke(&ctx).await.unwrap();
        let dispatches = invoker.dispatches();
        assert_eq!(dispatches.len(), 1);
        assert_eq!(dispatches[0].policy, "with_match_block");
    }

    #[tokio::test]
    async fn dispatch_failure_is_swallowed_by_default() {
        let ns = namespace();
        ns.attach_metadata("/zone/a", MetadataEntry::new("x", "1", ""));
        ns.attach_metadata("/zone", MetadataEntry::new("x", "1", ""));

        let invoker = Arc::new(CollectingInvoker::failing("downstream unavailable"));
        let ctx = context(
            json!({"logical_path": "/zone/a/b/obj.txt"}),
            delegate_config("p", json!({"attribute": "x"})),
            ns,
            Arc::clone(&invoker),
        );

        // Both ancestors are still attempted despite each dispatch failing.
        EventDelegate.invoke(&ctx).await.unwrap();
        assert_eq!(invoker.len(), 2);
    }

    #[tokio::test]
    async fn propagate_mode_aborts_the_walk() {
        let ns = namespace();
        ns.attach_metadata("/zone/a", MetadataEntry::new("x", "1", ""));
        ns.attach_metadata("/zone", MetadataEntry::new("x", "1", ""));

        let invoker = Arc::new(CollectingInvoker::failing("downstream unavailable"));
        let mut configuration =
            delegate_config("p", json!({"attribute": "x"}));
        configuration["on_dispatch_failure"] = json!("propagate");

        let ctx = context(
            json!({"logical_path": "/zone/a/b/obj.txt"}),
            configuration,
            ns,
            Arc::clone(&invoker),
        );

        let result = EventDelegate.invoke(&ctx).await;
        assert!(matches!(result, Err(PolicyError::Dispatch(_))));
        assert_eq!(invoker.len(), 1);
    }

    #[tokio::test]
    async fn stale_non_object_match_field_is_overwritten() {
        let ns = namespace();
        ns.attach_metadata("/zone/a", MetadataEntry::new("x", "1", ""));

        let invoker = Arc::new(CollectingInvoker::new());
        let ctx = context(
            json!({
                "logical_path": "/zone/a/b/obj.txt",
                "match": "stale-string-payload"
            }),
            delegate_config("p", json!({"attribute": "x", "value": "1"})),
            ns,
            Arc::clone(&invoker),
        );

        EventDelegate.invoke(&ctx).await.unwrap();

        let dispatches = invoker.dispatches();
        assert_eq!(dispatches.len(), 1);
        let forwarded: Value = serde_json::from_str(&dispatches[0].parameters).unwrap();
        assert_eq!(
            forwarded["match"]["metadata"],
            json!({"attribute": "x", "value": "1", "units": ""})
        );
    }

    #[tokio::test]
    async fn positional_parameters_are_normalized_before_walking() {
        let ns = namespace();
        ns.attach_metadata("/zone/a/b", MetadataEntry::new("tier", "cold", ""));

        let invoker = Arc::new(CollectingInvoker::new());
        let ctx = context(
            json!(["alice", "/zone/a/b", "obj.txt"]),
            delegate_config("p", json!({"attribute": "tier"})),
            ns,
            Arc::clone(&invoker),
        );

        EventDelegate.invoke(&ctx).await.unwrap();
        assert_eq!(invoker.len(), 1);
    }
}
