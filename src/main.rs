use std::io::Read;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing::info;

use madraw::{Converter, LayoutConfig, MadrawError};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    /// The positioned graph as JSON.
    Json,
    /// Normalized DSL text with sidecar lines.
    Text,
}

#[derive(Parser)]
#[command(name = "madraw", about = "Convert diagram DSL text into a positioned graph and back")]
struct Cli {
    /// Input file (reads from stdin if not provided)
    file: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', value_enum, default_value = "json")]
    format: Format,

    /// JSON file overriding layout settings
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,
}

fn read_input(file: Option<&PathBuf>) -> Result<String, MadrawError> {
    match file {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn main() -> Result<(), MadrawError> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => LayoutConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => LayoutConfig::default(),
    };
    let input = read_input(cli.file.as_ref())?;

    let converter = Converter::new(config);
    let graph = converter.parse(&input);
    info!(dialect = graph.dialect.as_str(), nodes = graph.nodes.len(), "converted");

    match cli.format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&graph)?),
        Format::Text => print!("{}", converter.serialize(&graph)),
    }
    Ok(())
}
