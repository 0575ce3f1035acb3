use anyhow::Context;
use clap::Args;
use std::io::Write;
use std::path::PathBuf;

use crate::stream::{OpenOutcome, StreamRegistry, DEFAULT_CHUNK_SIZE};

/// Arguments for the `dump` subcommand
#[derive(Args, Debug)]
pub struct DumpArgs {
    /// CSV file to read
    pub path: PathBuf,

    /// Treat the first line as the header
    #[arg(long)]
    pub header: bool,

    /// Lines per batch
    #[arg(short, long, default_value_t = 10)]
    pub lines: usize,

    /// Bytes pulled from the file per read call
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,
}

impl DumpArgs {
    /// Print every batch as one JSON document per line
    pub async fn execute<W: Write>(&self, out: &mut W) -> anyhow::Result<()> {
        anyhow::ensure!(self.lines > 0, "--lines must be at least 1");

        let file = std::fs::File::open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;

        let registry = StreamRegistry::with_capacity(1).with_chunk_size(self.chunk_size);
        let id = self.path.display().to_string();

        if let OpenOutcome::Header(fields) =
            registry.open(id.clone(), Box::new(file), self.header).await?
        {
            writeln!(out, "{}", serde_json::to_string(&fields)?)?;
        }

        loop {
            let batch = registry.read(&id, self.lines).await?;
            writeln!(out, "{}", serde_json::to_string(&batch)?)?;
            if !batch.more {
                break;
            }
        }
        Ok(())
    }
}
