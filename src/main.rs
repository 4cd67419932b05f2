use anyhow::Result;
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use dexgrid::csv_io::{self, ColumnMapping, MappingType};
use dexgrid::fetch::PokeApiClient;
use dexgrid::schema;
use dexgrid::store::TableStore;

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long)]
    log_level: Option<String>,
    /// Directory holding the persisted column registry
    #[clap(long, default_value = ".")]
    columns_dir: PathBuf,
    /// Import a CSV file as the dataset
    #[clap(short, long)]
    import: Option<PathBuf>,
    /// Fetch the full dataset from the public API
    #[clap(short, long)]
    fetch: bool,
    /// Write the dataset as CSV before exiting
    #[clap(short, long)]
    export: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    setup_logging(&args.log_level);

    let mut store = TableStore::with_columns(schema::load_columns(&args.columns_dir));

    if let Some(path) = &args.import {
        info!("Importing dataset from {}", path.display());
        let file = std::fs::File::open(path)?;
        let table = csv_io::parse_csv(file)?;
        let mappings = default_mappings(&table.headers);
        store.set_all(csv_io::map_rows(&table, &mappings));
    } else if args.fetch {
        info!("Fetching dataset from {}", dexgrid::fetch::API_BASE_URL);
        let client = PokeApiClient::new();
        let records = client
            .fetch_all(|current, total| info!("Fetched {}/{}", current, total))
            .await?;
        store.set_all(records);
    }

    command_loop(&mut store)?;

    if let Some(path) = &args.export {
        std::fs::write(path, store.export_csv())?;
        info!("Exported {} records to {}", store.records().len(), path.display());
    }
    schema::save_columns(&args.columns_dir, store.columns())?;
    Ok(())
}

/// Read command lines until EOF or an exit word, printing the report or
/// the usage hint per line.
fn command_loop(store: &mut TableStore) -> Result<()> {
    let stdin = io::stdin();
    print!("> ");
    io::stdout().flush()?;
    for line in stdin.lock().lines() {
        let line = line?;
        let line = line.trim();
        match line {
            "" => {}
            "exit" | "quit" => break,
            _ => match store.run_command(line) {
                Ok(report) => println!("{}", report),
                Err(e) => println!("{}", e),
            },
        }
        print!("> ");
        io::stdout().flush()?;
    }
    Ok(())
}

// Map well-known headers onto the fixed record fields, everything else
// onto dynamic text fields named after the header.
fn default_mappings(headers: &[String]) -> Vec<ColumnMapping> {
    headers
        .iter()
        .enumerate()
        .map(|(index, header)| {
            let target = match header.trim().to_lowercase().as_str() {
                "name" => ("name", MappingType::Text),
                "type" | "types" => ("types", MappingType::Text),
                "hp" => ("stats.0.base_stat", MappingType::Number),
                "attack" => ("stats.1.base_stat", MappingType::Number),
                "defense" => ("stats.2.base_stat", MappingType::Number),
                "special_attack" | "sp_atk" => ("stats.3.base_stat", MappingType::Number),
                "special_defense" | "sp_def" => ("stats.4.base_stat", MappingType::Number),
                "speed" => ("stats.5.base_stat", MappingType::Number),
                _ => ("", MappingType::Text),
            };
            match target {
                ("", _) => ColumnMapping::new(
                    index,
                    &header.trim().to_lowercase().replace(' ', "_"),
                    MappingType::Text,
                ),
                (field, data_type) => ColumnMapping::new(index, field, data_type),
            }
        })
        .collect()
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_ref()
        .unwrap_or(&"info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level.to_string()))
        .without_time()
        .init();
}
