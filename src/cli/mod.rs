pub mod app;

use clap::{Parser, Subcommand, ValueEnum};
use memokv::Format;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "memokv")]
#[command(about = "Read and edit a file-backed key-value map")]
pub struct Cli {
    /// Primary storage file
    #[arg(long, short)]
    pub file: Option<PathBuf>,

    /// YAML file with map settings; command-line flags take precedence
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Back up the existing file to <FILE>.bak before writing
    #[arg(long)]
    pub backup: bool,

    /// Octal file mode applied after writing, e.g. 0600
    #[arg(long, value_parser = parse_mode_arg)]
    pub mode: Option<u32>,

    /// Storage format (default: inferred from the file extension)
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,

    /// Delete and recreate the file instead of truncating it
    #[arg(long)]
    pub overwrite: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the value stored under KEY
    Get { key: String },
    /// Store VALUE (parsed as YAML, falling back to a plain string) under KEY
    Set { key: String, value: String },
    /// Remove KEY
    Delete { key: String },
    /// Print all keys
    List,
    /// Print the whole map
    Dump,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum FormatArg {
    Yaml,
    Json,
}

impl From<FormatArg> for Format {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Yaml => Format::Yaml,
            FormatArg::Json => Format::Json,
        }
    }
}

fn parse_mode_arg(text: &str) -> Result<u32, String> {
    memokv::core::config::parse_mode(text).map_err(|e| e.to_string())
}
