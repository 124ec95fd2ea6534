//! Rate-limited fleet membership sweep.
//!
//! Visits every target visible to the account (not just the registry),
//! harvesting full membership into per-target archives. Targets are
//! enumerated lazily in pages, member batches are paced with a fixed delay
//! plus bounded random jitter, and a governor token bucket spanning the run
//! enforces the configured targets-per-hour cap. A failing target is
//! recorded with its reason and never stops the sweep.

use crate::archive::{MemberRecord, TargetArchive};
use crate::config::{Config, SweepConfig};
use crate::error::Result;
use crate::source::{MessageSource, TargetHandle};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

/// Page size when enumerating the visible-target fleet
const TARGET_PAGE: usize = 50;

/// One failed target and why it failed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetFailure {
    pub target_id: String,
    pub label: String,
    pub reason: String,
}

/// Per-target outcome of a sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSweep {
    pub target_id: String,
    pub label: String,
    pub members_stored: u64,
    /// Full batches harvested; each one triggered an inter-batch pause
    pub full_batches: u32,
}

/// Aggregate outcome of one fleet sweep (ephemeral; printed, not persisted)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepSummary {
    pub run_id: String,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub members_stored: u64,
    pub elapsed_secs: u64,
    pub visited: Vec<TargetSweep>,
    pub failures: Vec<TargetFailure>,
}

/// Derive the filesystem-safe storage label for a swept target: the
/// lowercased alphanumerics of the title, truncated, plus the raw id digits
/// so two targets with colliding titles get distinct directories.
pub fn storage_label(title: Option<&str>, id: &str) -> String {
    let cleaned: String = title
        .unwrap_or("")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .take(10)
        .collect();
    let digits: String = id.chars().filter(|c| c.is_ascii_digit()).collect();

    if cleaned.is_empty() {
        format!("target-{}", digits)
    } else {
        format!("{}-{}", cleaned, digits)
    }
}

fn batch_jitter(sweep: &SweepConfig) -> Duration {
    if sweep.jitter_max_ms == 0 {
        return Duration::ZERO;
    }
    let ms = rand::thread_rng().gen_range(sweep.jitter_min_ms..=sweep.jitter_max_ms);
    Duration::from_millis(ms)
}

/// Sweep the whole visible fleet
pub async fn sweep_fleet(config: &Config, source: &dyn MessageSource) -> Result<SweepSummary> {
    let started = Instant::now();
    let mut summary = SweepSummary {
        run_id: Uuid::new_v4().to_string(),
        ..Default::default()
    };

    let quota = Quota::per_hour(
        NonZeroU32::new(config.sweep.max_targets_per_hour).unwrap_or(nonzero!(1u32)),
    );
    let limiter = RateLimiter::direct(quota);

    info!("Starting fleet sweep {}", summary.run_id);

    let mut offset = 0;
    loop {
        let page = source.visible_targets(offset, TARGET_PAGE).await?;
        if page.is_empty() {
            break;
        }
        offset += page.len();

        for handle in page {
            limiter.until_ready().await;

            summary.attempted += 1;
            let label = storage_label(handle.title.as_deref(), &handle.id);
            info!(
                "[{}] Sweeping {} ({})",
                summary.attempted,
                handle.title.as_deref().unwrap_or("untitled"),
                handle.id
            );

            match harvest_target(config, source, &handle, &label).await {
                Ok(sweep) => {
                    summary.succeeded += 1;
                    summary.members_stored += sweep.members_stored;
                    summary.visited.push(sweep);
                }
                Err(e) => {
                    warn!("Sweep failed for {}: {}", label, e);
                    summary.failed += 1;
                    summary.failures.push(TargetFailure {
                        target_id: handle.id.clone(),
                        label,
                        reason: e.to_string(),
                    });
                }
            }

            tokio::time::sleep(config.sweep.target_delay()).await;
        }
    }

    summary.elapsed_secs = started.elapsed().as_secs();
    info!(
        "Fleet sweep {} done: {}/{} targets, {} members",
        summary.run_id, summary.succeeded, summary.attempted, summary.members_stored
    );
    Ok(summary)
}

/// Harvest one target's full membership in paced batches
pub async fn harvest_target(
    config: &Config,
    source: &dyn MessageSource,
    handle: &TargetHandle,
    label: &str,
) -> Result<TargetSweep> {
    let archive = TargetArchive::open(&config.target_dir(label)).await?;
    let mut sweep = TargetSweep {
        target_id: handle.id.clone(),
        label: label.to_string(),
        members_stored: 0,
        full_batches: 0,
    };

    let mut offset = 0;
    loop {
        let batch = source
            .members(handle, offset, config.sweep.batch_size)
            .await?;
        if batch.is_empty() {
            break;
        }
        offset += batch.len();

        for member in &batch {
            let record = MemberRecord::from_remote(member);
            // A persistence failure aborts this member only
            if let Err(e) = archive.upsert_member(&record).await {
                warn!("Failed to store member {} in {}: {}", member.user_id, label, e);
            } else {
                sweep.members_stored += 1;
            }
        }

        if batch.len() < config.sweep.batch_size {
            // Trailing partial batch: roster exhausted, no pause
            break;
        }
        sweep.full_batches += 1;
        tokio::time::sleep(config.sweep.batch_delay() + batch_jitter(&config.sweep)).await;
    }

    Ok(sweep)
}
