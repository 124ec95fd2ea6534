//! Sweep command - rate-limited fleet membership harvest

use crate::config::Config;
use crate::error::Result;
use crate::source::MessageSource;
use crate::sweep::{sweep_fleet, SweepSummary};

/// Run one fleet sweep over every visible target
pub async fn cmd_sweep(config: &Config, source: &dyn MessageSource) -> Result<SweepSummary> {
    sweep_fleet(config, source).await
}

/// Print a sweep summary to console
pub fn print_sweep_summary(summary: &SweepSummary) {
    let minutes = summary.elapsed_secs / 60;
    let seconds = summary.elapsed_secs % 60;

    println!("\nFleet Sweep Summary");
    println!("{}", "-".repeat(40));
    println!("Targets attempted: {}", summary.attempted);
    println!("Succeeded: {}", summary.succeeded);
    println!("Failed: {}", summary.failed);
    println!("\nMembers stored: {}", summary.members_stored);
    println!("Time taken: {}m {}s", minutes, seconds);

    if !summary.failures.is_empty() {
        println!("\nFailed targets:");
        for failure in &summary.failures {
            println!("- {}: {}", failure.label, failure.reason);
        }
    }
}
