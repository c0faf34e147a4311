//! Binary crate for the `hko` command-line tool.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Interactive site configuration
//! - Hosting the coordinator and printing entity states

use clap::Parser;

mod cli;
mod logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cmd = cli::Cli::parse();
    logging::setup_logging(cmd.verbose);
    cmd.run().await
}
