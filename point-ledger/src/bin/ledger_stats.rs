//! Maintenance binary: open the point ledger store and print statistics

use point_ledger::{Config, MemoryMemberDirectory, PointLedger};
use std::error::Error;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!(data_dir = %config.data_dir.display(), "Opening point ledger");

    let ledger = PointLedger::open(config, Arc::new(MemoryMemberDirectory::new()))?;

    let stats = ledger.storage_stats()?;
    println!("entries:       ~{}", stats.total_entries);
    println!("keyed entries: ~{}", stats.total_relations);
    println!("next entry id: {}", stats.next_entry_id);

    Ok(())
}
