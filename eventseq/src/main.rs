//! eventseq CLI - turn event tables into per-entity sequences
//!
//! # Main Commands
//!
//! ```bash
//! eventseq transform input.csv --config config.json   # CSV -> grouped JSON
//! eventseq example-config > config.json                # Starting configuration
//! eventseq validate-config config.json                 # Check a configuration
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! eventseq parse input.csv                             # Just parse CSV to JSON
//! eventseq group rows.json --id client_id              # Group already-encoded rows
//! ```

use clap::{Parser, Subcommand};
use eventseq::logs::LOG_BROADCASTER;
use eventseq::{
    example_config, format_delimiter, parse_csv_file_auto, table_from_json_rows, transform_csv,
    validate_preprocessor_config, EntityGrouper, OutputFormat, PreprocessorConfig,
    EVENT_TIME_COLUMN,
};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "eventseq")]
#[command(about = "Group event tables into per-entity sequences", long_about = None)]
struct Cli {
    /// Do not echo progress logs to stderr
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a CSV file and output JSON rows
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Group already-encoded JSON rows by entity
    Group {
        /// Input JSON file (array of row objects)
        input: PathBuf,

        /// Entity identifier column
        #[arg(long)]
        id: String,

        /// Event time column
        #[arg(long, default_value = EVENT_TIME_COLUMN)]
        time: String,

        /// Columns reduced to their earliest value (repeatable)
        #[arg(long = "first")]
        first: Vec<String>,

        /// Output one object of columns instead of a list of records
        #[arg(long)]
        columnar: bool,

        /// Assemble entities in parallel
        #[arg(long)]
        parallel: bool,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Full pipeline: CSV -> encoders -> grouped JSON
    Transform {
        /// Input CSV file
        input: PathBuf,

        /// Preprocessor configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a configuration file against the schema
    ValidateConfig {
        /// Configuration JSON file
        input: PathBuf,
    },

    /// Show example configuration
    ExampleConfig,
}

fn main() {
    let cli = Cli::parse();
    LOG_BROADCASTER.set_echo(!cli.quiet);

    let result = match cli.command {
        Commands::Parse { input, output } => cmd_parse(&input, output.as_deref()),

        Commands::Group {
            input,
            id,
            time,
            first,
            columnar,
            parallel,
            output,
        } => cmd_group(&input, &id, &time, first, columnar, parallel, output.as_deref()),

        Commands::Transform {
            input,
            config,
            output,
        } => cmd_transform(&input, &config, output.as_deref()),

        Commands::ValidateConfig { input } => cmd_validate_config(&input),

        Commands::ExampleConfig => cmd_example_config(),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_parse(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let result = parse_csv_file_auto(input)?;

    eprintln!("   Encoding: {}", result.encoding);
    eprintln!("   Delimiter: '{}'", format_delimiter(result.delimiter));
    eprintln!("   Columns: {}", result.table.headers().join(", "));
    eprintln!("✅ Parsed {} rows", result.table.num_rows());

    let json = serde_json::to_string_pretty(&result.table.to_json_rows())?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_group(
    input: &Path,
    id: &str,
    time: &str,
    first: Vec<String>,
    columnar: bool,
    parallel: bool,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📦 Grouping: {}", input.display());

    let content = fs::read_to_string(input)?;
    let rows: Vec<Value> = serde_json::from_str(&content)?;
    eprintln!("   {} rows", rows.len());

    let table = table_from_json_rows(&rows)?;
    let grouped = EntityGrouper::new(id)
        .with_event_time_column(time)
        .with_first_items(first)
        .with_output(OutputFormat::from_records_flag(!columnar))
        .with_parallel(parallel)
        .transform(&table)?;
    eprintln!("   {} entities", grouped.len());

    let json = serde_json::to_string_pretty(&grouped.to_json())?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_transform(
    input: &Path,
    config_path: &Path,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {}", input.display());

    let config = PreprocessorConfig::load(config_path)?;
    let result = transform_csv(input, &config)?;

    eprintln!("   Encoding: {}", result.csv_info.encoding);
    eprintln!("   Delimiter: '{}'", format_delimiter(result.csv_info.delimiter));
    eprintln!("   Rows: {}", result.csv_info.row_count);
    eprintln!("   Columns: {}", result.csv_info.headers.join(", "));
    eprintln!("\n📦 Grouped: {} entities", result.grouped.len());

    let json = serde_json::to_string_pretty(&result.grouped.to_json())?;
    write_output(&json, output)?;

    eprintln!("\n✨ Done!");
    Ok(())
}

fn cmd_validate_config(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("✔️  Validating: {}", input.display());

    let content = fs::read_to_string(input)?;
    let value: Value = serde_json::from_str(&content)?;

    if let Err(errors) = validate_preprocessor_config(&value) {
        eprintln!("\n❌ Invalid configuration:");
        for err in &errors {
            eprintln!("   - {}", err);
        }
        std::process::exit(1);
    }

    // Schema-valid; transformation names and column overlaps are checked separately.
    let config: PreprocessorConfig = serde_json::from_value(value)?;
    config.event_time_transformation()?;
    config.category_transformation()?;
    config.check_columns()?;

    eprintln!("✅ Configuration valid");
    Ok(())
}

fn cmd_example_config() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", example_config().to_json()?);
    Ok(())
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
