//! Sync command - run one ingestion pass over one or all targets

use crate::config::Config;
use crate::error::Result;
use crate::ingest::{ingest_all, ingest_target, PassSummary};
use crate::registry::RegistryDb;
use crate::source::MessageSource;

/// Run a single ingestion pass. With a target id, only that target; without,
/// every registered target in registry order with per-target isolation.
pub async fn cmd_sync(
    config: &Config,
    registry: &RegistryDb,
    source: &dyn MessageSource,
    target: Option<&str>,
) -> Result<PassSummary> {
    match target {
        Some(id) => {
            let outcome = ingest_target(config, registry, source, id).await?;
            Ok(PassSummary {
                outcomes: vec![outcome],
                failures: Vec::new(),
            })
        }
        None => ingest_all(config, registry, source).await,
    }
}

/// Print a pass summary to console
pub fn print_pass_summary(summary: &PassSummary) {
    println!("\nIngestion Pass Complete\n");

    for outcome in &summary.outcomes {
        let name = outcome.title.as_deref().unwrap_or(&outcome.target_id);
        if outcome.total_pending == 0 {
            println!("• {}: up to date (cursor {})", name, outcome.cursor);
            continue;
        }
        println!(
            "• {}: {} new, {} duplicate, {} failed, cursor {}",
            name, outcome.stored, outcome.duplicates, outcome.failed, outcome.cursor
        );
        if outcome.media_fetched > 0 {
            println!("  Media fetched: {}", outcome.media_fetched);
        }
        for error in &outcome.errors {
            println!("  ! {}", error);
        }
    }

    if !summary.failures.is_empty() {
        println!("\nFailed targets:");
        for (id, reason) in &summary.failures {
            println!("- {}: {}", id, reason);
        }
    }
}
