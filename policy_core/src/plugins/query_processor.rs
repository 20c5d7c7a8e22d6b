//! Query processor.
//!
//! Parameterizes a catalog query template, executes it, and dispatches a
//! configured downstream policy once per result row across a bounded pool
//! of concurrent jobs.

use super::EVENT_INTERFACE_USAGE;
use crate::context::PolicyContext;
use crate::error::{PolicyError, Result};
use crate::params::{self, EventParameters};
use crate::paths;
use crate::registry::PolicyPlugin;
use crate::session::{Query, QueryRow, QueryType};
use crate::tokens;
use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error};

pub const PLUGIN_NAME: &str = "query_processor";

/// The query processor plugin.
#[derive(Debug, Default)]
pub struct QueryProcessor;

/// Rewrite the query template's tokens with concrete runtime values.
fn substitute_tokens(
    query_string: &mut String,
    event: &EventParameters,
    target_is_collection: bool,
    lifetime: i64,
    now: i64,
) {
    if target_is_collection {
        tokens::replace_token(query_string, tokens::COLLECTION_NAME, &event.logical_path);
    } else {
        tokens::replace_token(
            query_string,
            tokens::COLLECTION_NAME,
            &paths::parent_of(&event.logical_path),
        );
        tokens::replace_token(
            query_string,
            tokens::DATA_NAME,
            paths::object_name(&event.logical_path),
        );
    }

    tokens::replace_numeric_token(query_string, tokens::LIFETIME, now - lifetime);
    tokens::replace_numeric_token(query_string, tokens::CURRENT_TIME, now);
    tokens::replace_token(
        query_string,
        tokens::SOURCE_RESOURCE_NAME,
        &event.source_resource,
    );
    tokens::replace_token(
        query_string,
        tokens::DESTINATION_RESOURCE_NAME,
        &event.destination_resource,
    );
}

/// Clamp a caller-supplied limit into the engine's range; negative limits
/// collapse to zero rather than wrapping.
fn clamp_limit(limit: i64) -> u32 {
    limit.clamp(0, i64::from(u32::MAX)) as u32
}

/// Clone the invocation parameters and embed one result row under the
/// `query_results` key.
fn row_parameters(parameters: &Value, row: &QueryRow) -> Value {
    let mut forwarded = parameters.clone();
    if !forwarded.is_object() {
        forwarded = Value::Object(serde_json::Map::new());
    }
    forwarded["query_results"] = Value::from(row.clone());
    forwarded
}

#[async_trait]
impl PolicyPlugin for QueryProcessor {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn usage(&self) -> &Value {
        &EVENT_INTERFACE_USAGE
    }

    async fn invoke(&self, ctx: &PolicyContext) -> Result<()> {
        let event = EventParameters::capture(&ctx.parameters)?;

        let number_of_threads = params::required_i64(&ctx.parameters, "number_of_threads")?;
        let query_limit = params::required_i64(&ctx.parameters, "query_limit")?;
        let query_type = QueryType::parse(params::required_str(&ctx.parameters, "query_type")?)?;
        let mut query_string =
            params::required_str(&ctx.parameters, "query_string")?.to_string();
        let policy_to_invoke =
            params::required_str(&ctx.parameters, "policy_to_invoke")?.to_string();

        let lifetime = params::optional_i64(&ctx.configuration, "lifetime").unwrap_or(0);
        let target_is_collection = ctx.session.is_collection(&event.logical_path).await?;

        substitute_tokens(
            &mut query_string,
            &event,
            target_is_collection,
            lifetime,
            Utc::now().timestamp(),
        );

        let query = Query {
            string: query_string,
            limit: clamp_limit(query_limit),
            query_type,
        };

        debug!(
            invocation_id = %ctx.invocation_id,
            query = %query.string,
            "executing parameterized query"
        );

        let rows = match ctx.query_engine.execute(&query).await {
            Ok(rows) => rows,
            // A query that matches nothing is not an error.
            Err(PolicyError::NoRows) => {
                debug!(query = %query.string, "query matched no rows");
                return Ok(());
            }
            Err(cause) => {
                error!(query = %query.string, error = %cause, "query execution failed");
                return Err(cause);
            }
        };

        // The downstream policy receives any configuration carried inside
        // the parameter payload, not this plugin's own configuration.
        let configuration_text = ctx
            .parameters
            .get("configuration")
            .map(Value::to_string)
            .unwrap_or_default();

        let workers = number_of_threads.max(1) as usize;
        let failures: Vec<PolicyError> = stream::iter(rows)
            .map(|row| {
                let forwarded = row_parameters(&ctx.parameters, &row);
                let policy = policy_to_invoke.clone();
                let configuration_text = configuration_text.clone();
                let invoker = Arc::clone(&ctx.invoker);
                async move {
                    invoker
                        .invoke(&policy, &forwarded.to_string(), &configuration_text)
                        .await
                }
            })
            .buffer_unordered(workers)
            .filter_map(|outcome| async move { outcome.err() })
            .collect()
            .await;

        if !failures.is_empty() {
            for cause in &failures {
                error!(query = %query.string, error = %cause, "query row dispatch failed");
            }
            return Err(PolicyError::RowErrors {
                failed: failures.len(),
                query: query.string,
            });
        }

        Ok(())
    }
}
