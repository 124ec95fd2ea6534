//! Settings commands - show, set, reset the persisted settings object

use crate::config::Config;
use crate::error::Result;

/// Update one setting and write the config through to disk
pub async fn cmd_set_setting(config: &mut Config, key: &str, value: &str) -> Result<()> {
    config.set_value(key, value)?;
    config.save()?;
    println!("Set {} = {}", key, value);
    Ok(())
}

/// Reset all settings to defaults, keeping the storage paths
pub async fn cmd_reset_settings(config: &mut Config) -> Result<()> {
    let paths = config.paths.clone();
    *config = Config::default();
    config.paths = paths;
    config.save()?;
    println!("Settings reset to defaults.");
    Ok(())
}

/// Print the current settings to console
pub fn print_settings(config: &Config) {
    println!("\nCurrent Settings");
    println!("{}", "-".repeat(40));
    println!("\nGateway:");
    println!("- gateway.url: {}", config.gateway.url);
    println!("- gateway.timeout_secs: {}", config.gateway.timeout_secs);
    println!("\nMedia:");
    println!("- media.enabled: {}", config.media.enabled);
    println!("- media.max_retries: {}", config.media.max_retries);
    println!("- media.backoff_base_ms: {}", config.media.backoff_base_ms);
    println!("\nSweep:");
    println!("- sweep.batch_size: {}", config.sweep.batch_size);
    println!("- sweep.batch_delay_ms: {}", config.sweep.batch_delay_ms);
    println!("- sweep.target_delay_ms: {}", config.sweep.target_delay_ms);
    println!("- sweep.jitter_min_ms: {}", config.sweep.jitter_min_ms);
    println!("- sweep.jitter_max_ms: {}", config.sweep.jitter_max_ms);
    println!(
        "- sweep.max_targets_per_hour: {}",
        config.sweep.max_targets_per_hour
    );
    println!("\nPoll:");
    println!("- poll.interval_secs: {}", config.poll.interval_secs);
    println!("- poll.page_size: {}", config.poll.page_size);
    println!("\nPaths:");
    println!("- base_dir: {}", config.paths.base_dir.display());
}
