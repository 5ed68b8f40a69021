use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the live dashboard
    Start,
    /// Add a host to the monitored set
    Add(AddArgs),
    /// Upload a CSV file of hosts
    Import(ImportArgs),
    /// Write the current host table as CSV
    Export(ExportArgs),
    /// Print version information
    Version,
}

#[derive(Args, Debug)]
pub(crate) struct AddArgs {
    /// IP address or hostname
    pub address: String,
}

#[derive(Args, Debug)]
pub(crate) struct ImportArgs {
    /// CSV file with one host per row
    #[arg(value_name = "PATH")]
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub(crate) struct ExportArgs {
    /// Destination file; stdout when omitted
    #[arg(long, short, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

pub(crate) fn parse() -> Cli {
    Cli::parse()
}
