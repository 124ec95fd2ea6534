//! Export command - per-target CSV/JSON snapshots

use crate::archive::TargetArchive;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::export::{export_target, ExportStats};
use crate::registry::RegistryDb;
use tracing::warn;

/// Export one target, or every registered target when none is given.
/// Per-target export failures are collected, not fatal.
pub async fn cmd_export(
    config: &Config,
    registry: &RegistryDb,
    target: Option<&str>,
) -> Result<Vec<ExportStats>> {
    let ids: Vec<String> = match target {
        Some(id) => vec![id.to_string()],
        None => registry
            .list_targets()
            .await?
            .into_iter()
            .map(|t| t.id)
            .collect(),
    };

    let mut results = Vec::new();
    for id in ids {
        match export_one(config, &id).await {
            Ok(stats) => results.push(stats),
            Err(e) => warn!("Export failed for {}: {}", id, e),
        }
    }
    Ok(results)
}

async fn export_one(config: &Config, id: &str) -> Result<ExportStats> {
    let dir = config.target_dir(id);
    if !dir.join(crate::archive::ARCHIVE_FILE).exists() {
        return Err(Error::TargetNotFound(format!(
            "no archive for {} (run a sync first)",
            id
        )));
    }
    let archive = TargetArchive::open(&dir).await?;
    export_target(&archive, &dir, id).await
}

/// Print export results to console
pub fn print_export_stats(results: &[ExportStats]) {
    println!("\nExport Complete\n");

    if results.is_empty() {
        println!("Nothing exported. Add and sync targets first.");
        return;
    }

    for stats in results {
        println!(
            "• {}: {} messages, {} members",
            stats.target_id, stats.messages, stats.members
        );
        for file in &stats.files {
            println!("  {}", file.display());
        }
    }
}
