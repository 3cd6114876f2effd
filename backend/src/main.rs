//! layercv CLI - Reshape layer CV spreadsheets to long-format CSV
//!
//! # Main Commands
//!
//! ```bash
//! layercv reshape layer_CV.xlsx -o out.csv   # Wide spreadsheet to long CSV
//! layercv serve                              # Start HTTP server (port 3000)
//! layercv library search polyethylene        # Search the chemical library
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! layercv parse layer_CV.xlsx      # Show the parsed wide table as JSON
//! layercv setups                   # Show configured setups and their columns
//! ```

use clap::{Args, Parser, Subcommand};
use layercv::config::parse_setups;
use layercv::{
    export_csv, parse_file, process_file, write_csv_file, ChemicalLibrary, ReshapeConfig,
};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "layercv")]
#[command(about = "Reshape layer CV spreadsheets into long-format CSV", long_about = None)]
struct Cli {
    /// JSON config file (setups, skip_rows, has_header, library_path)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides shared by commands that read a wide table.
#[derive(Args)]
struct TableArgs {
    /// Leading header/metadata rows to skip
    #[arg(long)]
    skip_rows: Option<usize>,

    /// Comma-separated setup labels, in column-pair order
    #[arg(long)]
    setups: Option<String>,

    /// The row after the skipped rows is data, not column names
    #[arg(long)]
    no_header: bool,

    /// Delimiter for text input (auto-detect if not specified)
    #[arg(short, long)]
    delimiter: Option<char>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reshape a wide spreadsheet into setup,voltage,current CSV
    Reshape {
        /// Input file (.xlsx or delimited text)
        input: PathBuf,

        /// Output CSV file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        table: TableArgs,
    },

    /// Parse a spreadsheet and print the wide table as JSON
    Parse {
        /// Input file (.xlsx or delimited text)
        input: PathBuf,

        #[command(flatten)]
        table: TableArgs,
    },

    /// Show configured setups and the columns they read
    Setups,

    /// Chemical library commands
    Library {
        #[command(subcommand)]
        action: LibraryAction,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
}

#[derive(Subcommand)]
enum LibraryAction {
    /// List every chemical
    List,

    /// Case-insensitive search over chemical names and associated diseases
    Search {
        /// Search term
        term: String,
    },

    /// Replace the library with a CSV file
    Import {
        /// CSV file with a Chemical_Name column
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match load_config(cli.config.as_deref()) {
        Ok(config) => run(cli.command, config).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: ReshapeConfig) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Reshape { input, output, table } => {
            cmd_reshape(&input, output.as_deref(), &apply_table_args(config, &table)?)
        }
        Commands::Parse { input, table } => cmd_parse(&input, &apply_table_args(config, &table)?),
        Commands::Setups => cmd_setups(&config),
        Commands::Library { action } => cmd_library(action, &config),
        Commands::Serve { port } => cmd_serve(port, config).await,
    }
}

fn load_config(path: Option<&Path>) -> Result<ReshapeConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(p) => ReshapeConfig::from_file(p)?,
        None => ReshapeConfig::from_env()?,
    };
    Ok(config)
}

fn apply_table_args(
    mut config: ReshapeConfig,
    args: &TableArgs,
) -> Result<ReshapeConfig, Box<dyn std::error::Error>> {
    if let Some(skip_rows) = args.skip_rows {
        config.skip_rows = skip_rows;
    }
    if let Some(ref setups) = args.setups {
        config.setups = parse_setups(setups);
    }
    if args.no_header {
        config.has_header = false;
    }
    if args.delimiter.is_some() {
        config.delimiter = args.delimiter;
    }
    config.validate()?;
    Ok(config)
}

fn cmd_reshape(
    input: &Path,
    output: Option<&Path>,
    config: &ReshapeConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {}", input.display());

    let result = process_file(input, config)?;

    match output {
        Some(path) => {
            write_csv_file(&result.table, path)?;
            eprintln!("💾 Output written to: {}", path.display());
        }
        None => {
            let bytes = export_csv(&result.table)?;
            std::io::stdout().write_all(&bytes)?;
        }
    }

    eprintln!("✨ Done! {} records", result.table.len());
    Ok(())
}

fn cmd_parse(input: &Path, config: &ReshapeConfig) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing: {}", input.display());

    let parsed = parse_file(input, &config.parse_options())?;
    eprintln!("   Format: {}", parsed.format);
    if let Some(ref encoding) = parsed.encoding {
        eprintln!("   Encoding: {}", encoding);
    }
    if let Some(delimiter) = parsed.delimiter {
        eprintln!("   Delimiter: '{}'", layercv::transform::format_delimiter(delimiter));
    }
    eprintln!("   Columns: {}", parsed.table.column_count());
    eprintln!("✅ Parsed {} rows", parsed.table.len());

    println!("{}", serde_json::to_string_pretty(&parsed.table)?);
    Ok(())
}

fn cmd_setups(config: &ReshapeConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("Setups ({}), skipping {} rows:", config.setups.len(), config.skip_rows);
    for (i, setup) in config.setups.iter().enumerate() {
        println!("  [{}] {:<24} voltage: column {}, current: column {}", i, setup, 2 * i, 2 * i + 1);
    }
    Ok(())
}

fn cmd_library(action: LibraryAction, config: &ReshapeConfig) -> Result<(), Box<dyn std::error::Error>> {
    let path = &config.library_path;

    match action {
        LibraryAction::List => {
            let library = ChemicalLibrary::load(path)?;
            if library.is_empty() {
                eprintln!("📋 No chemical library data found at {}", path.display());
                eprintln!("   Use 'layercv library import <file>' to add one.");
                return Ok(());
            }
            eprintln!("📋 Loaded {} chemicals", library.len());
            std::io::stdout().write_all(&library.to_csv()?)?;
        }

        LibraryAction::Search { term } => {
            let library = ChemicalLibrary::load(path)?;
            let hits = library.search(&term);
            eprintln!("🔍 {} match(es) for '{}'", hits.len(), term);
            let maps = library.rows_as_maps(&hits);
            println!("{}", serde_json::to_string_pretty(&maps)?);
        }

        LibraryAction::Import { file } => {
            eprintln!("📥 Importing library from: {}", file.display());
            let library = ChemicalLibrary::from_csv_bytes(&fs::read(&file)?)?;
            library.save(path)?;
            eprintln!("✅ Saved {} chemicals to {}", library.len(), path.display());
        }
    }

    Ok(())
}

async fn cmd_serve(port: u16, config: ReshapeConfig) -> Result<(), Box<dyn std::error::Error>> {
    layercv::server::start_server(port, config).await
}
