use clap::{Parser, Subcommand, ValueEnum};
use jsonapi_orm::schema::parse_schema;
use jsonapi_orm::{Document, JsonApiMapper, MemoryStore};
use std::path::PathBuf;
use std::process;

/// jsonapi-orm CLI — normalize JSON:API documents against a model schema
#[derive(Parser)]
#[command(name = "jsonapi-orm", version, about)]
struct Cli {
    /// Path to the schema file
    #[arg(long, default_value = "schema.yaml")]
    schema: PathBuf,

    /// Output format
    #[arg(long, default_value = "yaml")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Parse documents in order into one store and print the normalized state
    Normalize {
        /// JSON:API document files
        #[arg(required = true)]
        documents: Vec<PathBuf>,
        /// Only print this model's collection
        #[arg(long)]
        model: Option<String>,
    },

    /// Show the resource type map and the compiled relationship table
    Relationships,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match run(&cli).and_then(|value| render(&value, &cli.format)) {
        Ok(output) => print!("{output}"),
        Err(e) => {
            eprintln!("ERROR:{e}");
            process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let schema = parse_schema(&cli.schema)?;
    let mapper = JsonApiMapper::new(&schema)?;

    match &cli.command {
        Command::Normalize { documents, model } => {
            let mut store = MemoryStore::new(mapper.index());
            for path in documents {
                log::info!("Normalizing {}", path.display());
                let document = Document::from_path(path)?;
                mapper.parse(&document, &mut store)?;
            }

            let snapshot = store.snapshot()?;
            match model {
                Some(name) => snapshot
                    .get(name)
                    .cloned()
                    .ok_or_else(|| format!("Model '{name}' not found in schema").into()),
                None => Ok(snapshot),
            }
        }

        Command::Relationships => {
            let index = mapper.index();
            let relationships: Vec<serde_json::Value> = index
                .descriptors()
                .into_values()
                .map(serde_json::to_value)
                .collect::<Result<_, _>>()?;

            let mut resource_types: Vec<_> = index.resource_type_map().iter().collect();
            resource_types.sort();
            let resource_types: serde_json::Map<String, serde_json::Value> = resource_types
                .into_iter()
                .map(|(rt, model)| (rt.clone(), serde_json::Value::String(model.clone())))
                .collect();

            Ok(serde_json::json!({
                "resource_types": resource_types,
                "join_models": index
                    .model_names()
                    .filter(|m| index.is_join_model(m))
                    .collect::<Vec<_>>(),
                "relationships": relationships,
            }))
        }
    }
}

fn render(value: &serde_json::Value, format: &OutputFormat) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        OutputFormat::Json => format!("{}\n", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    })
}
