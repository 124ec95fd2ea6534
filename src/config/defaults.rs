//! Default values for configuration

/// Default provider gateway URL for local development
pub fn default_gateway_url() -> String {
    std::env::var("ARCHIVIST_GATEWAY_URL").unwrap_or_else(|_| "http://127.0.0.1:8787".to_string())
}

/// Default gateway request timeout in seconds
pub fn default_gateway_timeout() -> u64 {
    30
}

/// Default: fetch media attachments during ingestion
pub fn default_media_enabled() -> bool {
    true
}

/// Default maximum retry attempts for a transient media failure
pub fn default_media_max_retries() -> u32 {
    5
}

/// Default base backoff delay in milliseconds (doubles per attempt)
pub fn default_media_backoff_base_ms() -> u64 {
    2000
}

/// Default members fetched per batch during a fleet sweep
pub fn default_sweep_batch_size() -> usize {
    100
}

/// Default delay between member batches in milliseconds
pub fn default_sweep_batch_delay_ms() -> u64 {
    1000
}

/// Default delay between targets in milliseconds
pub fn default_sweep_target_delay_ms() -> u64 {
    3000
}

/// Default minimum random jitter added to the batch delay, in milliseconds
pub fn default_sweep_jitter_min_ms() -> u64 {
    500
}

/// Default maximum random jitter added to the batch delay, in milliseconds
pub fn default_sweep_jitter_max_ms() -> u64 {
    1500
}

/// Default cap on targets visited per hour during a sweep
pub fn default_sweep_max_targets_per_hour() -> u32 {
    20
}

/// Default sleep between continuous poll passes, in seconds
pub fn default_poll_interval_secs() -> u64 {
    60
}

/// Default page size when listing messages from the source
pub fn default_ingest_page_size() -> usize {
    200
}
