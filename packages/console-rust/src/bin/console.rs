//! `golemdb-console`: offline schema tooling.
//!
//! Commands:
//! - golemdb-console check-schema <schema.json>
//! - golemdb-console validate <schema.json> <payload.json>
//! - golemdb-console skeleton <schema.json>
//! - golemdb-console schema-id <collection> <name> <version>
//! - golemdb-console sandbox --collection <name> --schema <schema.json> [payload.json...]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use golemdb_console::{CollectionService, ConsoleConfig, ConsoleContext, MemoryEntityStore};
use golemdb_core::{
    detect_primary, schema_to_skeleton, validate_payload, validate_schema_definition, SchemaId,
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "golemdb-console")]
#[command(version, about = "GolemDB console schema tooling", long_about = None)]
struct Cli {
    /// Log filter directives, e.g. `debug` or `golemdb_console=debug`
    #[arg(long, env = "RUST_LOG", default_value = "info", global = true)]
    log: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check a schema definition and print its primary key
    CheckSchema {
        schema: PathBuf,
    },

    /// Validate a payload against a schema
    Validate {
        schema: PathBuf,
        payload: PathBuf,
    },

    /// Print a starting payload for a schema
    Skeleton {
        schema: PathBuf,
    },

    /// Print the schema id for a collection, name, and version
    SchemaId {
        collection: String,
        name: String,
        version: u32,
    },

    /// Insert payloads into a collection of an in-memory store
    Sandbox(SandboxArgs),
}

#[derive(Args, Debug)]
struct SandboxArgs {
    #[arg(long)]
    collection: String,

    /// Schema document governing the inserted payloads
    #[arg(long)]
    schema: PathBuf,

    #[arg(long, default_value = "default")]
    schema_name: String,

    #[arg(long, default_value_t = 1)]
    schema_version: u32,

    /// Blocks-to-live for inserted payloads
    #[arg(long, env = "GOLEMDB_DEFAULT_BTL", default_value_t = 300)]
    btl: u64,

    /// Concurrent metadata fetches during uniqueness checks
    #[arg(long, env = "GOLEMDB_ENRICH_CONCURRENCY", default_value_t = 8)]
    concurrency: usize,

    /// Payload files, inserted in order
    payloads: Vec<PathBuf>,
}

impl SandboxArgs {
    fn config(&self) -> ConsoleConfig {
        ConsoleConfig {
            default_btl: self.btl,
            collection_enrich_concurrency: self.concurrency,
            ..ConsoleConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log);

    match run(cli.command).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(directives: &str) {
    let filter = EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(command: Command) -> anyhow::Result<ExitCode> {
    match command {
        Command::CheckSchema { schema } => {
            let schema = read_json(&schema)?;
            match validate_schema_definition(&schema) {
                Ok(Some(primary)) => {
                    let auto = if primary.autoincrement { " (autoincrement)" } else { "" };
                    println!("ok: primary key \"{}\"{auto}", primary.field);
                    Ok(ExitCode::SUCCESS)
                }
                Ok(None) => {
                    println!("ok: no primary key");
                    Ok(ExitCode::SUCCESS)
                }
                Err(err) => {
                    for error in &err.errors {
                        println!("{error}");
                    }
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Validate { schema, payload } => {
            let schema = read_json(&schema)?;
            let payload = read_json(&payload)?;
            let result = validate_payload(&schema, &payload);
            if result.is_valid() {
                println!("ok");
                return Ok(ExitCode::SUCCESS);
            }
            for error in result.errors() {
                println!("{error}");
            }
            Ok(ExitCode::FAILURE)
        }
        Command::Skeleton { schema } => {
            let schema = read_json(&schema)?;
            let primary = detect_primary(&schema);
            let skeleton = schema_to_skeleton(&schema, primary.as_ref());
            println!("{}", serde_json::to_string_pretty(&skeleton)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::SchemaId {
            collection,
            name,
            version,
        } => {
            println!("{}", SchemaId::new(collection.trim(), name.trim(), version));
            Ok(ExitCode::SUCCESS)
        }
        Command::Sandbox(args) => sandbox(args).await,
    }
}

async fn sandbox(args: SandboxArgs) -> anyhow::Result<ExitCode> {
    let schema = read_json(&args.schema)?;
    let ctx = ConsoleContext::new(Arc::new(MemoryEntityStore::new()), args.config());
    let collections = CollectionService::new(ctx);

    collections.create_collection(&args.collection, "").await?;
    let (schema_id, _) = collections
        .create_schema(&args.collection, &args.schema_name, args.schema_version, schema)
        .await?;
    let schema_id = schema_id.to_string();

    let mut failed = false;
    for path in &args.payloads {
        let text = read_text(path)?;
        match collections
            .create_in_collection(&args.collection, &schema_id, &text, None)
            .await
        {
            Ok(insert) => println!(
                "{}: {} {}",
                path.display(),
                insert.receipt.entity_key,
                insert.value
            ),
            Err(err) => {
                failed = true;
                println!("{}: {err}", path.display());
            }
        }
    }

    for summary in collections.list_collections().await? {
        println!("{}", serde_json::to_string(&summary)?);
    }
    Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

fn read_text(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let text = read_text(path)?;
    serde_json::from_str(&text).with_context(|| format!("parsing {} as JSON", path.display()))
}
