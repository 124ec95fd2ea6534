//! Target management commands (add, remove, list)

use crate::archive::TargetArchive;
use crate::config::Config;
use crate::error::Result;
use crate::registry::RegistryDb;
use crate::source::MessageSource;
use serde::{Deserialize, Serialize};
use tracing::info;

/// A registered target with its stored-archive stats
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetInfo {
    pub id: String,
    pub title: Option<String>,
    pub kind: String,
    pub cursor: i64,
    pub added_at: String,
    pub messages: usize,
    pub members: usize,
}

/// Resolve a reference through the source and register the target.
/// Returns the resolved info and whether it was newly added.
pub async fn cmd_add_target(
    registry: &RegistryDb,
    source: &dyn MessageSource,
    reference: &str,
) -> Result<(String, bool)> {
    let handle = source.resolve_target(reference).await?;
    let added = registry.add_target(&handle).await?;
    if added {
        info!("Registered target {} ({})", handle.id, handle.title.as_deref().unwrap_or("untitled"));
    } else {
        // Already registered; refresh the cached title
        registry.update_title(&handle.id, handle.title.as_deref()).await?;
        info!("Target {} already registered", handle.id);
    }
    Ok((handle.id, added))
}

/// Remove a target from the registry. Its archive directory stays on disk.
pub async fn cmd_remove_target(registry: &RegistryDb, id: &str) -> Result<()> {
    registry.remove_target(id).await?;
    info!("Removed target {} (archive left on disk)", id);
    Ok(())
}

/// List registered targets with stored counts
pub async fn cmd_list_targets(config: &Config, registry: &RegistryDb) -> Result<Vec<TargetInfo>> {
    let targets = registry.list_targets().await?;
    let mut result = Vec::with_capacity(targets.len());

    for target in targets {
        let dir = config.target_dir(&target.id);
        let (messages, members) = if dir.join(crate::archive::ARCHIVE_FILE).exists() {
            let archive = TargetArchive::open(&dir).await?;
            (archive.message_count().await?, archive.member_count().await?)
        } else {
            (0, 0)
        };

        result.push(TargetInfo {
            id: target.id.clone(),
            title: target.title.clone(),
            kind: target.kind.clone(),
            cursor: target.cursor,
            added_at: target.added_at.clone(),
            messages,
            members,
        });
    }

    Ok(result)
}

/// Print targets to console
pub fn print_targets(targets: &[TargetInfo]) {
    println!("\nRegistered Targets\n");

    if targets.is_empty() {
        println!("No targets registered. Use 'archivist target add' to add one.");
        return;
    }

    for target in targets {
        println!(
            "• {} [{}]",
            target.title.as_deref().unwrap_or(&target.id),
            target.kind
        );
        println!("  ID: {}", target.id);
        println!("  Cursor: {}", target.cursor);
        println!("  Messages: {}, Members: {}", target.messages, target.members);
        println!("  Added: {}", target.added_at);
        println!();
    }
}
