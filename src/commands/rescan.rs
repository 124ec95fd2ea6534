//! Rescan command - retry unresolved media downloads

use crate::archive::TargetArchive;
use crate::config::Config;
use crate::error::Result;
use crate::media::{rescan_media, RescanStats};
use crate::registry::RegistryDb;
use crate::source::MessageSource;

/// Re-attempt downloads for every stored row whose media never resolved
pub async fn cmd_rescan(
    config: &Config,
    registry: &RegistryDb,
    source: &dyn MessageSource,
    target_id: &str,
) -> Result<RescanStats> {
    // Ensures the target is actually registered before touching its archive
    registry.get_cursor(target_id).await?;

    let handle = source.resolve_target(target_id).await?;
    let archive = TargetArchive::open(&config.target_dir(target_id)).await?;
    rescan_media(source, &config.media, &handle, &archive).await
}

/// Print rescan results to console
pub fn print_rescan_stats(target_id: &str, stats: &RescanStats) {
    println!("\nMedia Re-scan Complete\n");
    println!("Target: {}", target_id);
    println!("Attempted: {}", stats.attempted);
    println!("Resolved: {}", stats.resolved);

    if !stats.errors.is_empty() {
        println!("\nErrors:");
        for error in &stats.errors {
            println!("- {}", error);
        }
    }
}
