//! Continuous polling over the registered targets.
//!
//! Runs ingestion passes over every registered target, strictly
//! sequentially, then sleeps the configured interval and repeats. There is
//! no drift correction and no overlap: a slow pass simply stretches the
//! effective period. Cancellation is honored between targets and during the
//! sleep, never mid-message, so an in-flight message either completes or
//! fails under the pipeline's single-message isolation before the loop
//! halts.

use crate::config::Config;
use crate::error::Result;
use crate::ingest::ingest_target;
use crate::registry::RegistryDb;
use crate::source::MessageSource;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Run the poll loop until the shutdown flag flips to true
pub async fn watch_targets(
    config: &Config,
    registry: &RegistryDb,
    source: &dyn MessageSource,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let interval = Duration::from_secs(config.poll.interval_secs);
    info!(
        "Watching registered targets (poll interval {}s)",
        interval.as_secs()
    );

    loop {
        let targets = registry.list_targets().await?;

        for target in &targets {
            if *shutdown.borrow() {
                info!("Watch stopped between targets");
                return Ok(());
            }

            match ingest_target(config, registry, source, &target.id).await {
                Ok(outcome) => {
                    if outcome.stored > 0 || outcome.failed > 0 {
                        info!(
                            "{}: {} new messages, {} failed",
                            target.display_name(),
                            outcome.stored,
                            outcome.failed
                        );
                    }
                }
                Err(e) => {
                    // One target's failure never stops the loop
                    warn!("Pass failed for {}: {}", target.display_name(), e);
                }
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("Watch stopped during sleep");
                    return Ok(());
                }
            }
        }
    }
}
