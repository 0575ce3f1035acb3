mod dump;

pub use dump::DumpArgs;

use clap::{Parser, Subcommand};

/// CSV stream server - line-buffered CSV reads over HTTP
#[derive(Parser)]
#[command(name = "csv-stream-server")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the server (default)
    Serve,

    /// Stream a local CSV file through the reader and print JSON batches
    Dump(DumpArgs),
}
