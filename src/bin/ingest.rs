//! Loads a CSV export of operations into the store.
//!
//! Usage:
//!   ./target/release/ingest data/operations_2024.csv [--dry-run]

use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use logistics_ops::config::StoreSettings;
use logistics_ops::display::{label, truncate};
use logistics_ops::ingest::{analyze_upload, commit};
use logistics_ops::telemetry;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "ingest")]
#[command(about = "Reconcile a CSV export against the store and load the new operations")]
struct Args {
    /// CSV export to load
    input: PathBuf,

    /// Report what would be loaded without writing anything
    #[arg(long)]
    dry_run: bool,

    #[command(flatten)]
    store: StoreSettings,
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init();
    let args = Args::parse();

    info!("Connecting to SurrealDB at {}", args.store.db_path);
    let store = args.store.connect().await?;

    let file = File::open(&args.input).with_context(|| format!("opening {}", args.input.display()))?;
    let source = args
        .input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| args.input.display().to_string());

    let batch = analyze_upload(&store, file, &source).await?;

    println!("\n{}", "═".repeat(60));
    println!("  {}", source);
    println!("{}", "═".repeat(60));
    println!("  New operations:        {:>8}", batch.new.len());
    println!("  Already stored:        {:>8}", batch.existing.len());
    println!("  Repeated in file:      {:>8}", batch.internal_duplicates.len());
    println!("  Without file number:   {:>8}", batch.invalid_key_rows);

    if !batch.quality.is_empty() {
        println!("\n  Missing values in new operations");
        println!("  {}", "─".repeat(40));
        for q in &batch.quality {
            println!("  {:<14} {:>6} {:>7.1}%", q.field, q.missing, q.percent);
        }
    }

    if !batch.internal_duplicates.is_empty() {
        println!("\n  Repeated file numbers");
        println!("  {}", "─".repeat(40));
        for op in batch.internal_duplicates.iter().take(20) {
            println!("  {:<16} {:<20}", truncate(&op.file, 16), truncate(label(&op.handler), 20));
        }
        if batch.internal_duplicates.len() > 20 {
            println!("  ... {} more", batch.internal_duplicates.len() - 20);
        }
    }
    println!();

    if args.dry_run {
        info!("Dry run, nothing written");
        return Ok(());
    }

    let outcome = commit(&store, &batch).await?;
    if !outcome.log_written {
        warn!("Load log entry was not written");
    }
    info!("Ingestion complete: {} operations inserted", outcome.inserted);
    Ok(())
}
