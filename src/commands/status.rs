//! Status command implementation

use crate::config::Config;
use crate::error::Result;
use crate::registry::RegistryDb;
use crate::source::MessageSource;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub registry_path: String,
    pub base_dir: String,
    pub gateway_url: String,
    pub gateway_connected: bool,
    pub target_count: usize,
    pub media_enabled: bool,
}

/// Get system status
pub async fn cmd_status(
    config: &Config,
    registry: &RegistryDb,
    source: &dyn MessageSource,
) -> Result<StatusInfo> {
    info!("Getting status");

    let target_count = registry.target_count().await?;

    // A one-item listing doubles as a reachability probe
    let gateway_connected = match source.visible_targets(0, 1).await {
        Ok(_) => true,
        Err(e) => {
            tracing::debug!("Gateway probe failed: {:?}", e);
            false
        }
    };

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        registry_path: config.paths.registry_file.display().to_string(),
        base_dir: config.paths.base_dir.display().to_string(),
        gateway_url: config.gateway.url.clone(),
        gateway_connected,
        target_count,
        media_enabled: config.media.enabled,
    })
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    println!("\narchivist Status\n");
    println!("Configuration: {}", status.config_path);
    println!("Registry: {}", status.registry_path);
    println!("Archives: {}", status.base_dir);
    println!("\nGateway:");
    println!("  URL: {}", status.gateway_url);
    let connection = if status.gateway_connected {
        "✓ Connected"
    } else {
        "✗ Not connected"
    };
    println!("  Status: {}", connection);
    println!("\nTargets registered: {}", status.target_count);
    println!(
        "Media downloads: {}",
        if status.media_enabled { "enabled" } else { "disabled" }
    );
}
