//! Dataflow developer tool.
//!
//! Provides the `dataflow` binary for inspecting templates and maintaining
//! the result cache outside the application:
//! - `signature`: print the cache signature of a calculation request
//! - `resolve`: print which modules, wires and terminals are satisfied
//! - `order`: print the processing order of a template or one node
//! - `validate`: check wires and literal configuration against a registry
//! - `cache`: show, prune or clear a cache database
//!
//! Registries are JSON arrays of module definitions. Output is JSON on
//! stdout; diagnostics go to stderr.

use std::path::Path;
use std::process;

use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Serialize;

use dataflow_cache::{
    canonical_json, compute_signature, horizon_millis, CacheStore, SqliteStore,
};
use dataflow_core::{
    resolve, CalculationRequest, ModuleDefinition, ModuleIndex, ModuleRegistry, Template,
};

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Dataflow template and cache tools.
#[derive(Parser)]
#[command(name = "dataflow", about = "Dataflow template and cache tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the signature of a calculation request.
    Signature {
        /// Module definitions (JSON array).
        #[arg(short, long)]
        registry: String,

        /// Calculation request (JSON).
        #[arg(short = 'q', long)]
        request: String,

        /// Also print the canonical text that is hashed.
        #[arg(long)]
        canonical: bool,
    },

    /// Print the satisfaction sets of a template.
    Resolve {
        #[arg(short, long)]
        registry: String,

        #[arg(short, long)]
        template: String,
    },

    /// Print the processing order of a template.
    Order {
        #[arg(short, long)]
        template: String,

        /// Only the modules needed to evaluate this node.
        #[arg(short, long)]
        node: Option<usize>,
    },

    /// Check a template's wires and configuration.
    Validate {
        #[arg(short, long)]
        registry: String,

        #[arg(short, long)]
        template: String,
    },

    /// Maintain a cache database.
    Cache {
        /// Path to the cache database file.
        #[arg(short, long)]
        db: String,

        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Entry count and age range.
    Stats,
    /// Delete entries older than the given number of days.
    Prune {
        #[arg(long, default_value_t = 90)]
        days: u64,
    },
    /// Delete every entry.
    Clear,
}

/// Failure of a subcommand, carrying its exit code.
struct Failure {
    code: i32,
    message: String,
}

impl Failure {
    fn input(message: impl Into<String>) -> Self {
        Failure {
            code: 1,
            message: message.into(),
        }
    }

    fn io(message: impl Into<String>) -> Self {
        Failure {
            code: 3,
            message: message.into(),
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Signature {
            registry,
            request,
            canonical,
        } => run_signature(&registry, &request, canonical),
        Commands::Resolve { registry, template } => run_resolve(&registry, &template),
        Commands::Order { template, node } => run_order(&template, node),
        Commands::Validate { registry, template } => run_validate(&registry, &template),
        Commands::Cache { db, action } => run_cache(&db, action),
    };

    match result {
        Ok(()) => process::exit(0),
        Err(failure) => {
            eprintln!("Error: {}", failure.message);
            process::exit(failure.code);
        }
    }
}

// ---------------------------------------------------------------------------
// Input helpers
// ---------------------------------------------------------------------------

fn read_json<T: DeserializeOwned>(path: &str) -> Result<T, Failure> {
    let text = std::fs::read_to_string(Path::new(path))
        .map_err(|e| Failure::io(format!("failed to read '{}': {}", path, e)))?;
    serde_json::from_str(&text).map_err(|e| Failure::input(format!("invalid JSON in '{}': {}", path, e)))
}

fn read_registry(path: &str) -> Result<ModuleRegistry, Failure> {
    let definitions: Vec<ModuleDefinition> = read_json(path)?;
    Ok(definitions.into_iter().collect())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Failure> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| Failure::input(format!("failed to serialize output: {}", e)))?;
    println!("{}", json);
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

fn run_signature(registry: &str, request: &str, canonical: bool) -> Result<(), Failure> {
    let registry = read_registry(registry)?;
    let request: CalculationRequest = read_json(request)?;

    let signature =
        compute_signature(&request, &registry).map_err(|e| Failure::input(e.to_string()))?;
    let mut out = serde_json::json!({ "signature": signature });
    if canonical {
        let text = canonical_json(&request, &registry).map_err(|e| Failure::input(e.to_string()))?;
        out["canonical"] = serde_json::Value::String(text);
    }
    print_json(&out)
}

fn run_resolve(registry: &str, template: &str) -> Result<(), Failure> {
    let registry = read_registry(registry)?;
    let template: Template = read_json(template)?;
    print_json(&resolve(&template, &registry))
}

fn run_order(template: &str, node: Option<usize>) -> Result<(), Failure> {
    let template: Template = read_json(template)?;
    let order = template
        .processing_order(node.map(ModuleIndex))
        .map_err(|e| Failure::input(e.to_string()))?;
    print_json(&order)
}

fn run_validate(registry: &str, template: &str) -> Result<(), Failure> {
    let registry = read_registry(registry)?;
    let template: Template = read_json(template)?;
    template
        .validate_wires(&registry)
        .and_then(|()| registry.validate_config(&template))
        .map_err(|e| Failure::input(e.to_string()))?;
    print_json(&serde_json::json!({ "valid": true, "modules": template.modules.len() }))
}

fn run_cache(db: &str, action: CacheAction) -> Result<(), Failure> {
    let mut store = SqliteStore::new(db)
        .map_err(|e| Failure::io(format!("failed to open cache '{}': {}", db, e)))?;
    let storage = |e: dataflow_cache::CacheError| Failure::io(e.to_string());

    match action {
        CacheAction::Stats => {
            let entries = store.entries().map_err(storage)?;
            let oldest = entries.iter().map(|(_, t)| *t).min();
            let newest = entries.iter().map(|(_, t)| *t).max();
            print_json(&serde_json::json!({
                "entries": entries.len(),
                "oldest_created_at": oldest,
                "newest_created_at": newest,
            }))
        }
        CacheAction::Prune { days } => {
            let age = std::time::Duration::from_secs(days.saturating_mul(SECONDS_PER_DAY));
            let removed = store
                .remove_older_than(horizon_millis(age))
                .map_err(storage)?;
            tracing::info!(removed, days, "pruned cache");
            print_json(&serde_json::json!({ "removed": removed }))
        }
        CacheAction::Clear => {
            store.clear().map_err(storage)?;
            print_json(&serde_json::json!({ "cleared": true }))
        }
    }
}
