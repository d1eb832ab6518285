use anyhow::Context;
use clap::Subcommand;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::backend::{MemoryBackend, Record};
use crate::cli::utils::{output_success, output_value, parse_params, read_json_file};
use crate::cli::OutputFormat;
use crate::config::config;
use crate::model::{FieldDefinition, ModelMapper};
use crate::services::DataService;

#[derive(Subcommand)]
pub enum DataCommands {
    #[command(about = "Count matching records")]
    Count {
        #[arg(help = "Collection name")]
        collection: String,
        #[arg(long, help = "Fixture JSON: { \"<collection>\": [objects] }")]
        fixture: PathBuf,
        #[arg(long, help = "Request JSON (filters)")]
        params: Option<String>,
    },

    #[command(about = "Find matching records")]
    Find {
        #[arg(help = "Collection name")]
        collection: String,
        #[arg(long, help = "Fixture JSON: { \"<collection>\": [objects] }")]
        fixture: PathBuf,
        #[arg(long, help = "Request JSON (filters, orders, includes)")]
        params: Option<String>,
        #[arg(long, help = "Model definitions JSON: { \"<collection>\": [fields] }")]
        schema: Option<PathBuf>,
    },

    #[command(about = "Fetch one record by id")]
    Get {
        #[arg(help = "Collection name")]
        collection: String,
        #[arg(help = "Record ID")]
        id: String,
        #[arg(long, help = "Fixture JSON: { \"<collection>\": [objects] }")]
        fixture: PathBuf,
        #[arg(long, help = "Request JSON (includes)")]
        params: Option<String>,
        #[arg(long, help = "Model definitions JSON: { \"<collection>\": [fields] }")]
        schema: Option<PathBuf>,
    },
}

pub async fn handle(cmd: DataCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        DataCommands::Count { collection, fixture, params } => {
            let service = seeded_service(&fixture)?;
            let params = parse_params(params.as_deref())?;
            match service.count(&collection, params.as_ref()).await {
                Ok(count) => output_success(
                    output_format,
                    &format!("{} matching records in {}", count, collection),
                    Some(json!({ "count": count })),
                ),
                Err(e) => Err(e.into()),
            }
        }
        DataCommands::Find { collection, fixture, params, schema } => {
            let service = seeded_service(&fixture)?;
            let params = parse_params(params.as_deref())?;
            let schema = load_schema(schema.as_deref())?;
            match service.get_all(&collection, params.as_ref()).await {
                Ok(records) => {
                    let items: Vec<Value> = records.iter().map(|r| render(&collection, r, schema.as_ref())).collect();
                    output_value(output_format, &Value::Array(items))
                }
                Err(e) => Err(e.into()),
            }
        }
        DataCommands::Get { collection, id, fixture, params, schema } => {
            let service = seeded_service(&fixture)?;
            let mut params = parse_params(params.as_deref())?.unwrap_or_default();
            params.id = Some(id);
            let schema = load_schema(schema.as_deref())?;
            match service.get(&collection, Some(&params)).await {
                Ok(record) => output_value(output_format, &render(&collection, &record, schema.as_ref())),
                Err(e) => Err(e.into()),
            }
        }
    }
}

fn seeded_service(fixture: &Path) -> anyhow::Result<DataService> {
    let backend = MemoryBackend::new();
    let seeded = backend
        .seed_fixture(&read_json_file(fixture)?)
        .with_context(|| format!("Failed to seed {}", fixture.display()))?;
    tracing::debug!("Seeded {} objects from {}", seeded, fixture.display());

    let service = DataService::new(Arc::new(backend));
    service.initialize(&config().backend);
    Ok(service)
}

fn load_schema(path: Option<&Path>) -> anyhow::Result<Option<HashMap<String, Vec<FieldDefinition>>>> {
    let Some(path) = path else { return Ok(None) };
    let schema = serde_json::from_value(read_json_file(path)?)
        .with_context(|| format!("Invalid model definitions in {}", path.display()))?;
    Ok(Some(schema))
}

fn render(collection: &str, record: &Record, schema: Option<&HashMap<String, Vec<FieldDefinition>>>) -> Value {
    match schema {
        Some(schema) => ModelMapper::new(collection, schema).to_plain_object(record).to_json(),
        None => record.to_json(),
    }
}
