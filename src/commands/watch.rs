//! Watch command - run the continuous poll loop until Ctrl-C

use crate::config::Config;
use crate::error::Result;
use crate::registry::RegistryDb;
use crate::source::MessageSource;
use crate::watch::watch_targets;
use tokio::sync::watch;
use tracing::info;

/// Run the continuous poll loop; Ctrl-C requests a stop that is honored
/// between targets or during the sleep.
pub async fn cmd_watch(
    config: &Config,
    registry: &RegistryDb,
    source: &dyn MessageSource,
) -> Result<()> {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Stop requested; finishing the current unit of work");
            let _ = tx.send(true);
        }
    });

    watch_targets(config, registry, source, rx).await
}
