use anyhow::Result;
use clap::Parser;
use logistics_ops::config::StoreSettings;
use logistics_ops::models::OperationRecord;
use logistics_ops::reports;
use logistics_ops::store::{fetch_all_operations, latest_load_log};
use logistics_ops::telemetry;
use tracing::info;

/// Store overview: headline counts and the latest load.
#[derive(Parser, Debug)]
#[command(name = "logistics_ops")]
struct Args {
    #[command(flatten)]
    store: StoreSettings,
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init();
    let args = Args::parse();

    let store = args.store.connect().await?;
    info!("Connected to SurrealDB");

    let all = fetch_all_operations(&store).await?;
    let dated: Vec<OperationRecord> = all.iter().filter(|op| op.opened_on.is_some()).cloned().collect();
    let stats = reports::stats(&dated);

    info!("=== Store Statistics ===");
    info!("Stored operations:   {}", all.len());
    info!("With opening date:   {}", stats.total_operations);
    info!("Open / closed:       {} / {}", stats.open_operations, stats.closed_operations);
    info!("Handlers / clients:  {} / {}", stats.handlers, stats.clients);
    info!("Months spanned:      {}", stats.months_spanned);
    if let (Some(first), Some(last)) = (&stats.first_opened, &stats.last_opened) {
        info!("Opened between:      {} and {}", first, last);
    }

    match latest_load_log(&store).await? {
        Some(log) => info!(
            "Latest load:         {} from {} ({} new, {} discarded)",
            log.loaded_at.format("%Y-%m-%d %H:%M"),
            log.source,
            log.new_records,
            log.discarded_records
        ),
        None => info!("Latest load:         none"),
    }

    Ok(())
}
