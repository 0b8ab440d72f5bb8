//! FormState CLI - JSON bridge over the schema registry
//!
//! Commands: schemas, validate
//! Outputs JSON to stdout, logs to stderr
//! Returns 2 on validation failure

use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use formstate_core::{SchemaError, SchemaRegistry, ENGINE_VERSION};

#[derive(Parser)]
#[command(name = "formstate-cli")]
#[command(about = "FormState CLI - form validation engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to schemas directory
    #[arg(short, long, default_value = "schemas")]
    schemas_dir: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List available form schemas
    Schemas,

    /// Validate submitted values against a schema
    Validate {
        /// Schema ID
        #[arg(short, long)]
        schema: String,

        /// JSON object of field name -> value
        #[arg(short, long)]
        payload: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let registry = match SchemaRegistry::load_from_dir(&cli.schemas_dir) {
        Ok(r) => r,
        Err(e) => {
            error!(error = %e, "failed to load schemas");
            print_json(&serde_json::json!({ "error": format!("Failed to load schemas: {}", e) }));
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Schemas => {
            let schemas: Vec<_> = registry
                .list()
                .iter()
                .map(|s| serde_json::json!({
                    "id": s.id,
                    "name": s.name,
                    "description": s.description,
                    "fields": s.fields.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(),
                }))
                .collect();
            print_json(&serde_json::json!({ "engineVersion": ENGINE_VERSION, "schemas": schemas }));
            ExitCode::SUCCESS
        }

        Commands::Validate { schema, payload } => match validate(&registry, &schema, &payload) {
            Ok(true) => ExitCode::SUCCESS,
            Ok(false) => ExitCode::from(2),
            Err(e) => {
                print_json(&serde_json::json!({ "valid": false, "error": e.to_string() }));
                ExitCode::FAILURE
            }
        },
    }
}

fn validate(
    registry: &SchemaRegistry,
    schema_id: &str,
    payload: &str,
) -> Result<bool, SchemaError> {
    let schema = registry.get(schema_id)?;
    let values: BTreeMap<String, String> = serde_json::from_str(payload)?;

    let mut engine = schema.engine();
    schema.apply(&mut engine, &values)?;
    let rules = schema.rules(&engine);
    let valid = engine.validate_form(&rules)?;
    debug!(schema = %schema.id, valid, "validated payload");

    let snapshot = engine.snapshot();
    print_json(&serde_json::json!({
        "schema": schema.id,
        "valid": valid,
        "form": snapshot,
    }));
    Ok(valid)
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => error!(error = %e, "failed to serialize output"),
    }
}
