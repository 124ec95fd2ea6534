//! Checkpointed incremental message ingestion.
//!
//! A pass pulls messages strictly past the target's cursor in ascending id
//! order and processes them one at a time: resolve sender, insert-or-ignore
//! the row, fetch media, then advance the persisted cursor. A failed message
//! is logged and skipped, but it freezes the checkpoint: later messages in
//! the same pass are still stored (idempotently), while the cursor stays
//! behind the failure so the next pass retries exactly that message.
//! Combined with insert-or-ignore storage this gives at-least-once delivery
//! without duplication.

use crate::archive::{MessageRecord, TargetArchive};
use crate::config::Config;
use crate::error::Result;
use crate::media::fetch_media;
use crate::progress;
use crate::registry::RegistryDb;
use crate::source::{MessageSource, RemoteMessage, TargetHandle};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Result of one ingestion pass over one target
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub target_id: String,
    pub title: Option<String>,
    /// Pending total pre-computed before the pass (lookahead count)
    pub total_pending: u64,
    /// Newly stored rows
    pub stored: u32,
    /// Rows that already existed (idempotent re-processing)
    pub duplicates: u32,
    /// Messages that failed and will be retried next pass
    pub failed: u32,
    pub media_fetched: u32,
    /// Persisted cursor after the pass
    pub cursor: i64,
    pub errors: Vec<String>,
}

/// Result of a pass over every registered target
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PassSummary {
    pub outcomes: Vec<IngestOutcome>,
    /// Targets whose pass aborted entirely, with the reason
    pub failures: Vec<(String, String)>,
}

impl PassSummary {
    pub fn messages_stored(&self) -> u64 {
        self.outcomes.iter().map(|o| o.stored as u64).sum()
    }
}

struct ProcessedMessage {
    new_row: bool,
    media_resolved: bool,
}

/// Run one ingestion pass for a registered target
pub async fn ingest_target(
    config: &Config,
    registry: &RegistryDb,
    source: &dyn MessageSource,
    target_id: &str,
) -> Result<IngestOutcome> {
    let cursor = registry.get_cursor(target_id).await?;
    let handle = source.resolve_target(target_id).await?;
    registry
        .update_title(target_id, handle.title.as_deref())
        .await?;

    let mut outcome = IngestOutcome {
        target_id: target_id.to_string(),
        title: handle.title.clone(),
        cursor,
        ..Default::default()
    };

    outcome.total_pending = source.count_messages_after(&handle, cursor).await?;
    if outcome.total_pending == 0 {
        info!("No new messages for {}", handle_name(&handle));
        return Ok(outcome);
    }

    let archive = TargetArchive::open(&config.target_dir(target_id)).await?;
    let pb = progress::counting_bar(
        outcome.total_pending,
        &format!("Ingesting {}", handle_name(&handle)),
    );

    // The fetch position runs ahead independently of the persisted cursor:
    // once a message fails, the checkpoint freezes behind it while the rest
    // of the pass continues idempotently.
    let mut fetch_from = cursor;
    let mut checkpoint_frozen = false;

    loop {
        let page = source
            .messages_after(&handle, fetch_from, config.poll.page_size)
            .await?;
        let Some(last) = page.last() else { break };
        fetch_from = last.id;

        for message in &page {
            match process_message(config, source, &handle, &archive, message).await {
                Ok(processed) => {
                    if processed.new_row {
                        outcome.stored += 1;
                    } else {
                        outcome.duplicates += 1;
                    }
                    if processed.media_resolved {
                        outcome.media_fetched += 1;
                    }
                    if !checkpoint_frozen {
                        registry.advance_cursor(target_id, message.id).await?;
                        outcome.cursor = message.id;
                    }
                }
                Err(e) => {
                    warn!(
                        "Error processing message {} in {}: {}",
                        message.id,
                        handle_name(&handle),
                        e
                    );
                    outcome.errors.push(format!("message {}: {}", message.id, e));
                    outcome.failed += 1;
                    checkpoint_frozen = true;
                }
            }
            progress::tick(&pb);
        }
    }

    progress::finish(
        pb,
        &format!(
            "{}: {} new, {} failed",
            handle_name(&handle),
            outcome.stored,
            outcome.failed
        ),
    );
    Ok(outcome)
}

async fn process_message(
    config: &Config,
    source: &dyn MessageSource,
    handle: &TargetHandle,
    archive: &TargetArchive,
    message: &RemoteMessage,
) -> Result<ProcessedMessage> {
    // Sender resolution is best-effort: a failure stores null fields
    let sender = match message.sender_id {
        Some(sender_id) => match source.sender_profile(handle, sender_id).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!(
                    "Failed to resolve sender {} for message {}: {}",
                    sender_id, message.id, e
                );
                None
            }
        },
        None => None,
    };

    let record = MessageRecord::from_remote(message, sender.as_ref());
    let new_row = archive.insert_message(&record).await?;
    if !new_row {
        debug!("Message {} already stored", message.id);
    }

    let mut media_resolved = false;
    if config.media.enabled {
        if let Some(media) = &message.media {
            if let Some(path) = fetch_media(
                source,
                &config.media,
                handle,
                message.id,
                media,
                &archive.media_dir(),
            )
            .await?
            {
                archive.set_media_path(message.id, &path).await?;
                media_resolved = true;
            }
        }
    }

    Ok(ProcessedMessage {
        new_row,
        media_resolved,
    })
}

/// Run one ingestion pass over every registered target, in registry order.
/// A target whose pass aborts is recorded and does not stop the others.
pub async fn ingest_all(
    config: &Config,
    registry: &RegistryDb,
    source: &dyn MessageSource,
) -> Result<PassSummary> {
    let targets = registry.list_targets().await?;
    let mut summary = PassSummary::default();

    for target in targets {
        match ingest_target(config, registry, source, &target.id).await {
            Ok(outcome) => summary.outcomes.push(outcome),
            Err(e) => {
                warn!("Pass failed for target {}: {}", target.id, e);
                summary.failures.push((target.id, e.to_string()));
            }
        }
    }

    Ok(summary)
}

fn handle_name(handle: &TargetHandle) -> &str {
    handle.title.as_deref().unwrap_or(&handle.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::mock::{
        attachment, msg, msg_with_media, MockSource, MockTarget, ScriptedFailure,
    };
    use crate::source::{MediaKind, SenderProfile};
    use tempfile::TempDir;

    fn test_config(tmp: &TempDir) -> Config {
        let mut config = Config::default();
        config.paths.base_dir = tmp.path().to_path_buf();
        config.paths.config_file = tmp.path().join("config.toml");
        config.paths.registry_file = tmp.path().join("registry.db");
        config.media.backoff_base_ms = 1;
        config
    }

    async fn setup(tmp: &TempDir, target: MockTarget) -> (Config, RegistryDb, MockSource) {
        let config = test_config(tmp);
        let registry = RegistryDb::new(&config.paths.registry_file).await.unwrap();
        registry.add_target(&target.handle).await.unwrap();
        (config, registry, MockSource::single(target))
    }

    #[tokio::test]
    async fn test_end_to_end_pass_and_quiescent_rerun() {
        let tmp = TempDir::new().unwrap();
        let mut target = MockTarget::new("-1001", "chan");
        target.messages = vec![msg(101, "a"), msg(102, "b"), msg(103, "c")];
        let (config, registry, source) = setup(&tmp, target).await;

        let outcome = ingest_target(&config, &registry, &source, "-1001")
            .await
            .unwrap();
        assert_eq!(outcome.total_pending, 3);
        assert_eq!(outcome.stored, 3);
        assert_eq!(outcome.failed, 0);
        assert_eq!(outcome.cursor, 103);
        assert_eq!(registry.get_cursor("-1001").await.unwrap(), 103);

        let archive = TargetArchive::open(&config.target_dir("-1001")).await.unwrap();
        assert_eq!(archive.message_count().await.unwrap(), 3);
        // Cursor equals the maximum stored id after a successful pass
        assert_eq!(archive.max_message_id().await.unwrap(), Some(103));

        // A second pass finds nothing and changes nothing
        let rerun = ingest_target(&config, &registry, &source, "-1001")
            .await
            .unwrap();
        assert_eq!(rerun.total_pending, 0);
        assert_eq!(rerun.stored, 0);
        assert_eq!(rerun.cursor, 103);
        assert_eq!(archive.message_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_resume_after_interrupted_pass() {
        let tmp = TempDir::new().unwrap();
        let mut target = MockTarget::new("-1001", "chan");
        target.messages = vec![msg(101, "a"), msg(102, "b"), msg(103, "c")];
        let (config, registry, source) = setup(&tmp, target).await;

        // Simulate a crash after message 101 was stored but before the
        // cursor advanced: the row exists, the checkpoint still says 0.
        let archive = TargetArchive::open(&config.target_dir("-1001")).await.unwrap();
        let record = MessageRecord::from_remote(&msg(101, "a"), None);
        archive.insert_message(&record).await.unwrap();
        assert_eq!(registry.get_cursor("-1001").await.unwrap(), 0);

        let outcome = ingest_target(&config, &registry, &source, "-1001")
            .await
            .unwrap();

        // Same final state as an uninterrupted run: no loss, no duplication
        assert_eq!(outcome.stored + outcome.duplicates, 3);
        assert_eq!(outcome.duplicates, 1);
        assert_eq!(archive.message_count().await.unwrap(), 3);
        assert_eq!(registry.get_cursor("-1001").await.unwrap(), 103);
    }

    #[tokio::test]
    async fn test_failed_message_freezes_checkpoint() {
        let tmp = TempDir::new().unwrap();
        let mut target = MockTarget::new("-1001", "chan");
        target.messages = vec![
            msg(101, "a"),
            msg_with_media(102, MediaKind::Photo, None, None),
            msg(103, "c"),
        ];
        let (config, registry, mut source) = setup(&tmp, target).await;
        // A hard (non-transient) media failure makes message 102's unit fail
        source.script_attachment_failures(102, vec![ScriptedFailure::PermissionDenied]);

        let outcome = ingest_target(&config, &registry, &source, "-1001")
            .await
            .unwrap();

        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.errors.len(), 1);
        // 103 was still processed and stored...
        let archive = TargetArchive::open(&config.target_dir("-1001")).await.unwrap();
        assert_eq!(archive.message_count().await.unwrap(), 3);
        // ...but the checkpoint stayed behind the failure, so a rerun
        // retries exactly message 102
        assert_eq!(registry.get_cursor("-1001").await.unwrap(), 101);

        // Rerun with the failure cleared: converges without duplication
        source.attachments.insert(102, attachment(b"jpg", None, Some("image/jpeg")));
        let rerun = ingest_target(&config, &registry, &source, "-1001")
            .await
            .unwrap();
        assert_eq!(rerun.failed, 0);
        assert_eq!(rerun.stored + rerun.duplicates, 2);
        assert_eq!(archive.message_count().await.unwrap(), 3);
        assert_eq!(registry.get_cursor("-1001").await.unwrap(), 103);
    }

    #[tokio::test]
    async fn test_sender_failure_stores_null_fields() {
        let tmp = TempDir::new().unwrap();
        let mut target = MockTarget::new("-1001", "chan");
        let mut message = msg(101, "hello");
        message.sender_id = Some(77);
        target.messages = vec![message];
        let (config, registry, mut source) = setup(&tmp, target).await;
        source.senders.insert(
            77,
            SenderProfile {
                first_name: Some("Ada".into()),
                last_name: None,
                username: Some("ada".into()),
            },
        );
        source.failing_senders.push(77);

        let outcome = ingest_target(&config, &registry, &source, "-1001")
            .await
            .unwrap();
        assert_eq!(outcome.stored, 1);
        assert_eq!(outcome.failed, 0);

        let archive = TargetArchive::open(&config.target_dir("-1001")).await.unwrap();
        let stored = archive.get_message(101).await.unwrap().unwrap();
        // Resolution failed, so the display fields are null but the row is kept
        assert_eq!(stored.sender_id, Some(77));
        assert!(stored.sender_first_name.is_none());
        assert!(stored.sender_username.is_none());
        assert_eq!(registry.get_cursor("-1001").await.unwrap(), 101);
    }

    #[tokio::test]
    async fn test_media_stored_alongside_message() {
        let tmp = TempDir::new().unwrap();
        let mut target = MockTarget::new("-1001", "chan");
        target.messages = vec![msg_with_media(
            55,
            MediaKind::Document,
            Some("paper.pdf"),
            Some("application/pdf"),
        )];
        let (config, registry, mut source) = setup(&tmp, target).await;
        source
            .attachments
            .insert(55, attachment(b"%PDF", Some("paper.pdf"), Some("application/pdf")));

        let outcome = ingest_target(&config, &registry, &source, "-1001")
            .await
            .unwrap();
        assert_eq!(outcome.stored, 1);
        assert_eq!(outcome.media_fetched, 1);

        let archive = TargetArchive::open(&config.target_dir("-1001")).await.unwrap();
        let stored = archive.get_message(55).await.unwrap().unwrap();
        let path = stored.media_path.unwrap();
        assert!(path.ends_with("paper.pdf"));
        assert!(std::path::Path::new(&path).exists());
    }

    #[tokio::test]
    async fn test_media_disabled_leaves_path_unresolved() {
        let tmp = TempDir::new().unwrap();
        let mut target = MockTarget::new("-1001", "chan");
        target.messages = vec![msg_with_media(55, MediaKind::Photo, None, None)];
        let (mut config, registry, source) = setup(&tmp, target).await;
        config.media.enabled = false;

        let outcome = ingest_target(&config, &registry, &source, "-1001")
            .await
            .unwrap();
        assert_eq!(outcome.stored, 1);
        assert_eq!(outcome.media_fetched, 0);
        assert_eq!(source.attachment_call_count(55), 0);

        let archive = TargetArchive::open(&config.target_dir("-1001")).await.unwrap();
        assert_eq!(archive.unresolved_media().await.unwrap(), vec![55]);
    }

    #[tokio::test]
    async fn test_pass_over_all_targets_isolates_failures() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp);
        let registry = RegistryDb::new(&config.paths.registry_file).await.unwrap();

        let mut a = MockTarget::new("-1001", "alpha");
        a.messages = vec![msg(1, "a")];
        let mut c = MockTarget::new("-1003", "gamma");
        c.messages = vec![msg(9, "c")];
        let source = MockSource {
            targets: vec![a, c],
            ..Default::default()
        };

        registry.add_target(&source.targets[0].handle).await.unwrap();
        // "-1002" is registered but unknown to the source: its pass aborts
        registry
            .add_target(&crate::source::mock::handle("-1002", "beta"))
            .await
            .unwrap();
        registry.add_target(&source.targets[1].handle).await.unwrap();

        let summary = ingest_all(&config, &registry, &source).await.unwrap();

        assert_eq!(summary.outcomes.len(), 2);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].0, "-1002");
        assert_eq!(summary.messages_stored(), 2);
    }
}
