//! Complexity CLI - patch-wise image complexity scores
//!
//! Command-line interface for scoring image datasets and preparing them from
//! URL lists.

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod commands;

use commands::compute::ComputeCommand;
use commands::prepare::PrepareCommand;

#[derive(Parser)]
#[command(
    name = "complexity",
    version,
    about = "Patch-wise image complexity metrics",
    long_about = "Score every patch of every image in a dataset with JPEG-size, local-variance\n\
                  or clustering-based complexity. Results are cached by dataset content and\n\
                  metric parameters.",
    after_help = "EXAMPLES:\n  \
                  # Whole-image JPEG and variance scores as CSV\n  \
                  complexity compute --metrics jpeg_50,variance ./images\n\n  \
                  # 32x32 patches with 4 decoder threads, JSON output\n  \
                  complexity compute --metrics meaningful --patch-size 32 --num-workers 4 \\\n      \
                  --format json --output scores.json ./images\n\n  \
                  # Download and crop a dataset described by a CSV file\n  \
                  complexity prepare --csv-file urls.csv --column url --output-dir ./images"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute complexity scores for a set of images
    Compute(ComputeCommand),

    /// Download and convert images listed in a CSV file
    Prepare(PrepareCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };

    // Logs go to stderr so scores written to stdout stay machine-readable
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    match cli.command {
        Commands::Compute(cmd) => cmd.execute(),
        Commands::Prepare(cmd) => cmd.execute(),
    }
}
