//! Fleet listing command - enumerate account-visible targets

use crate::error::Result;
use crate::export::{export_fleet_csv, export_fleet_txt, FleetEntry};
use crate::source::{MessageSource, TargetKind};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Page size when enumerating the fleet for listing
const PAGE: usize = 50;

/// Everything the account can see, with per-kind totals
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetListing {
    pub entries: Vec<FleetEntry>,
    pub channels: usize,
    pub groups: usize,
}

/// Enumerate every target visible to the account
pub async fn cmd_fleet_list(source: &dyn MessageSource) -> Result<FleetListing> {
    let mut listing = FleetListing::default();
    let mut offset = 0;

    loop {
        let page = source.visible_targets(offset, PAGE).await?;
        if page.is_empty() {
            break;
        }
        offset += page.len();

        for handle in page {
            match handle.kind {
                TargetKind::Channel => listing.channels += 1,
                TargetKind::Group => listing.groups += 1,
            }
            listing.entries.push(FleetEntry {
                name: handle.title.clone().unwrap_or_else(|| handle.id.clone()),
                id: handle.id,
                members: handle.member_count.unwrap_or(0),
            });
        }
    }

    Ok(listing)
}

/// Export format for the fleet listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum FleetExportFormat {
    Csv,
    Txt,
}

/// Write the fleet listing in the requested format
pub fn export_fleet(entries: &[FleetEntry], format: FleetExportFormat, path: &Path) -> Result<()> {
    match format {
        FleetExportFormat::Csv => export_fleet_csv(entries, path),
        FleetExportFormat::Txt => export_fleet_txt(entries, path),
    }
}

/// Print the fleet listing with account totals
pub fn print_fleet(listing: &FleetListing) {
    println!("\nAccount Targets");
    println!("{}", "-".repeat(40));
    println!("Total: {}", listing.entries.len());
    println!("Channels: {}", listing.channels);
    println!("Groups: {}", listing.groups);
    println!(
        "Total members: {}",
        listing.entries.iter().map(|e| e.members).sum::<u64>()
    );
    println!("{}", "-".repeat(40));

    for entry in &listing.entries {
        println!("* {} (id: {}, members: {})", entry.name, entry.id, entry.members);
    }
}
