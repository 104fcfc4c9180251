//! Ledgerscan CLI: inventory a directory tree into CSV, resuming from stored fingerprints.

use anyhow::Result;
use clap::Parser;
use ledgerscan::engine::arg_parser::Cli;
use ledgerscan::engine::handle_run;
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
