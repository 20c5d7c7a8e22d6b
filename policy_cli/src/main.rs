use clap::{Parser, Subcommand};
use policy_core::memory::{CollectingInvoker, FixedQueryEngine, MemoryNamespace};
use policy_core::{default_registry, MetadataEntry, PolicyContext, PolicyInvoker};
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "policy-cli", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List the registered policy plugins
    ListPlugins,
    /// Print a plugin's usage document
    Usage {
        /// Plugin name
        #[arg(long)]
        plugin: String,
    },
    /// Run a plugin against a TOML scenario file
    Invoke {
        /// Plugin name
        #[arg(long)]
        plugin: String,
        /// Path to the scenario file
        #[arg(long)]
        scenario: PathBuf,
    },
}

/// A self-contained invocation scenario: the payloads plus the in-memory
/// namespace and canned query response to run them against.
#[derive(Debug, Deserialize)]
struct Scenario {
    #[serde(default = "default_instance")]
    instance: String,
    #[serde(default)]
    parameters: Option<toml::Value>,
    #[serde(default)]
    configuration: Option<toml::Value>,
    #[serde(default)]
    namespace: NamespaceSpec,
    #[serde(default)]
    query: QuerySpec,
}

fn default_instance() -> String {
    "policy-cli".to_string()
}

#[derive(Debug, Default, Deserialize)]
struct NamespaceSpec {
    #[serde(default)]
    collections: Vec<String>,
    #[serde(default)]
    data_objects: Vec<String>,
    #[serde(default)]
    metadata: Vec<MetadataSpec>,
}

#[derive(Debug, Deserialize)]
struct MetadataSpec {
    path: String,
    attribute: String,
    value: String,
    #[serde(default)]
    units: String,
}

#[derive(Debug, Default, Deserialize)]
struct QuerySpec {
    #[serde(default)]
    rows: Vec<Vec<String>>,
    /// Report the engine's distinguished no-rows condition instead of rows.
    #[serde(default)]
    no_rows: bool,
}

async fn load_scenario(path: &PathBuf) -> Result<Scenario, String> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("failed to read scenario: {e}"))?;
    toml::from_str(&content).map_err(|e| format!("failed to parse scenario: {e}"))
}

fn to_json(value: Option<toml::Value>) -> Result<Value, String> {
    match value {
        Some(value) => {
            serde_json::to_value(value).map_err(|e| format!("failed to convert payload: {e}"))
        }
        None => Ok(Value::Object(serde_json::Map::new())),
    }
}

fn build_namespace(spec: &NamespaceSpec) -> MemoryNamespace {
    let ns = MemoryNamespace::new();
    for path in &spec.collections {
        ns.add_collection(path);
    }
    for path in &spec.data_objects {
        ns.add_data_object(path);
    }
    for entry in &spec.metadata {
        ns.attach_metadata(
            &entry.path,
            MetadataEntry::new(&entry.attribute, &entry.value, &entry.units),
        );
    }
    ns
}

async fn run_scenario(plugin: &str, scenario: Scenario) -> Result<(), String> {
    let parameters = to_json(scenario.parameters)?;
    let configuration = to_json(scenario.configuration)?;

    let invoker = Arc::new(CollectingInvoker::new());
    let engine = if scenario.query.no_rows {
        Arc::new(FixedQueryEngine::no_rows())
    } else {
        Arc::new(FixedQueryEngine::with_rows(scenario.query.rows))
    };

    let ctx = PolicyContext::new(
        scenario.instance,
        parameters,
        configuration,
        Arc::new(build_namespace(&scenario.namespace)),
        Arc::clone(&invoker) as Arc<dyn PolicyInvoker>,
        engine,
    );

    info!(plugin, invocation_id = %ctx.invocation_id, "invoking plugin");
    default_registry()
        .invoke(plugin, &ctx)
        .await
        .map_err(|e| e.to_string())?;

    let dispatches = invoker.dispatches();
    println!("Invocation succeeded with {} nested dispatch(es)", dispatches.len());
    for dispatch in dispatches {
        println!("  -> {}", dispatch.policy);
        println!("     parameters:    {}", dispatch.parameters);
        println!("     configuration: {}", dispatch.configuration);
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let registry = default_registry();

    match cli.command {
        Commands::ListPlugins => {
            println!("Registered plugins:");
            for name in registry.list() {
                println!("  {}", name);
            }
        }
        Commands::Usage { plugin } => match registry.get(&plugin) {
            Ok(plugin) => match serde_json::to_string_pretty(plugin.usage()) {
                Ok(usage) => println!("{usage}"),
                Err(e) => {
                    eprintln!("Error: failed to render usage: {e}");
                    std::process::exit(1);
                }
            },
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        },
        Commands::Invoke { plugin, scenario } => {
            let outcome = match load_scenario(&scenario).await {
                Ok(scenario) => run_scenario(&plugin, scenario).await,
                Err(e) => Err(e),
            };
            if let Err(e) = outcome {
                error!(plugin, error = %e, "invocation failed");
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
    }
}
