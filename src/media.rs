//! Bounded-retry, idempotent attachment downloads.
//!
//! Transient failures back off exponentially up to a fixed attempt budget.
//! Provider throttle signals are a separate condition: the mandated wait is
//! honored in full and does not consume the retry budget. Exhaustion leaves
//! the message row with a null media path, which a later `rescan` pass picks
//! up again.

use crate::archive::TargetArchive;
use crate::config::MediaConfig;
use crate::error::Result;
use crate::progress;
use crate::source::{MediaKind, MediaRef, MessageSource, TargetHandle};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Derive the local file name for an attachment, if one can be derived.
/// Photos default to a `jpg` extension, documents fall back to the
/// unknown-binary `bin` extension when the MIME type is unhelpful.
pub fn media_filename(message_id: i64, media: &MediaRef) -> Option<String> {
    if let Some(name) = media.suggested_name.as_deref().and_then(sanitize_filename) {
        return Some(name);
    }

    match media.kind {
        MediaKind::Photo => Some(format!(
            "{}.{}",
            message_id,
            mime_extension(media.mime_type.as_deref()).unwrap_or("jpg")
        )),
        MediaKind::Document => Some(format!(
            "{}.{}",
            message_id,
            mime_extension(media.mime_type.as_deref()).unwrap_or("bin")
        )),
        MediaKind::Other => None,
    }
}

/// Strip any path components from a provider-supplied name
fn sanitize_filename(name: &str) -> Option<String> {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty() && *n != "." && *n != "..")
        .map(|n| n.to_string())
}

fn mime_extension(mime_type: Option<&str>) -> Option<&'static str> {
    mime_guess::get_mime_extensions_str(mime_type?)
        .and_then(|exts| exts.last())
        .copied()
}

/// Download a message's attachment into `media_dir`.
///
/// Returns `Ok(None)` when the attachment is skipped (no derivable name) or
/// the transient-retry budget is exhausted; the caller proceeds with an
/// unresolved media path either way. Non-transient source failures
/// propagate.
pub async fn fetch_media(
    source: &dyn MessageSource,
    config: &MediaConfig,
    target: &TargetHandle,
    message_id: i64,
    media: &MediaRef,
    media_dir: &Path,
) -> Result<Option<PathBuf>> {
    let Some(provisional) = media_filename(message_id, media) else {
        warn!(
            "Unable to determine file name for message {} media ({}); skipping download",
            message_id, media.kind
        );
        return Ok(None);
    };

    let expected = media_dir.join(&provisional);
    if expected.exists() {
        debug!("Media file already exists: {}", expected.display());
        return Ok(Some(expected));
    }

    tokio::fs::create_dir_all(media_dir).await?;

    let mut attempts: u32 = 0;
    loop {
        match source.fetch_attachment(target, message_id).await {
            Ok(attachment) => {
                // A download-time name wins only when the listing had none
                let name = if media.suggested_name.is_some() {
                    provisional.clone()
                } else {
                    attachment
                        .suggested_name
                        .as_deref()
                        .and_then(sanitize_filename)
                        .unwrap_or_else(|| provisional.clone())
                };
                let path = media_dir.join(&name);
                if !path.exists() {
                    let staging = media_dir.join(format!(".{}.part", name));
                    tokio::fs::write(&staging, &attachment.bytes).await?;
                    tokio::fs::rename(&staging, &path).await?;
                }
                debug!("Downloaded media for message {} to {}", message_id, path.display());
                return Ok(Some(path));
            }
            Err(e) => {
                if let Some(wait) = e.throttle_wait() {
                    // Mandatory wait; does not count against the retry budget
                    warn!(
                        "Provider throttled while fetching media for message {}; waiting {}s",
                        message_id,
                        wait.as_secs()
                    );
                    tokio::time::sleep(wait).await;
                    continue;
                }

                if !e.is_transient() {
                    return Err(e);
                }

                attempts += 1;
                if attempts >= config.max_retries {
                    warn!(
                        "Giving up on media for message {} after {} attempts: {}",
                        message_id, attempts, e
                    );
                    return Ok(None);
                }

                let delay = std::time::Duration::from_millis(
                    config.backoff_base_ms.saturating_mul(1 << (attempts - 1).min(16)),
                );
                warn!(
                    "Retrying media download for message {} (attempt {}): {}",
                    message_id, attempts, e
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Statistics from a media re-scan pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RescanStats {
    pub attempted: usize,
    pub resolved: usize,
    pub errors: Vec<String>,
}

/// Re-attempt downloads for rows whose media never resolved
pub async fn rescan_media(
    source: &dyn MessageSource,
    config: &MediaConfig,
    target: &TargetHandle,
    archive: &TargetArchive,
) -> Result<RescanStats> {
    let pending = archive.unresolved_media().await?;
    let mut stats = RescanStats::default();

    if pending.is_empty() {
        info!("No unresolved media for target {}", target.id);
        return Ok(stats);
    }

    let media_dir = archive.media_dir();
    let pb = progress::counting_bar(pending.len() as u64, "Re-scanning media");

    for message_id in pending {
        stats.attempted += 1;

        let Some(record) = archive.get_message(message_id).await? else {
            progress::tick(&pb);
            continue;
        };
        let media = MediaRef {
            kind: match record.media_kind.as_deref().map(str::parse) {
                Some(Ok(kind)) => kind,
                _ => MediaKind::Other,
            },
            suggested_name: None,
            mime_type: None,
        };

        match fetch_media(source, config, target, message_id, &media, &media_dir).await {
            Ok(Some(path)) => {
                archive.set_media_path(message_id, &path).await?;
                stats.resolved += 1;
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Error re-scanning media for message {}: {}", message_id, e);
                stats.errors.push(format!("message {}: {}", message_id, e));
            }
        }
        progress::tick(&pb);
    }

    progress::finish(pb, "Media re-scan complete");
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::mock::{attachment, msg_with_media, MockSource, MockTarget, ScriptedFailure};
    use tempfile::TempDir;

    fn media_ref(kind: MediaKind, name: Option<&str>, mime: Option<&str>) -> MediaRef {
        MediaRef {
            kind,
            suggested_name: name.map(|s| s.to_string()),
            mime_type: mime.map(|s| s.to_string()),
        }
    }

    fn fast_config(max_retries: u32) -> MediaConfig {
        MediaConfig {
            enabled: true,
            max_retries,
            backoff_base_ms: 1,
        }
    }

    #[test]
    fn test_media_filename_derivation() {
        let photo = media_ref(MediaKind::Photo, None, None);
        assert_eq!(media_filename(12, &photo), Some("12.jpg".to_string()));

        let named = media_ref(MediaKind::Document, Some("report.pdf"), None);
        assert_eq!(media_filename(12, &named), Some("report.pdf".to_string()));

        let doc = media_ref(MediaKind::Document, None, Some("application/pdf"));
        assert_eq!(media_filename(12, &doc), Some("12.pdf".to_string()));

        let mystery = media_ref(MediaKind::Document, None, Some("application/x-unheard-of"));
        assert_eq!(media_filename(12, &mystery), Some("12.bin".to_string()));

        // No derivable name for non-file media
        let other = media_ref(MediaKind::Other, None, None);
        assert_eq!(media_filename(12, &other), None);

        // Provider names are stripped of path components
        let sneaky = media_ref(MediaKind::Document, Some("../../etc/passwd"), None);
        assert_eq!(media_filename(12, &sneaky), Some("passwd".to_string()));
    }

    #[tokio::test]
    async fn test_existing_file_skips_network() {
        let tmp = TempDir::new().unwrap();
        let media_dir = tmp.path().join("media");
        std::fs::create_dir_all(&media_dir).unwrap();
        std::fs::write(media_dir.join("9.jpg"), b"cached").unwrap();

        let mut target = MockTarget::new("-1001", "chan");
        target.messages = vec![msg_with_media(9, MediaKind::Photo, None, None)];
        let source = MockSource::single(target);
        let handle = source.targets[0].handle.clone();

        let media = media_ref(MediaKind::Photo, None, None);
        let path = fetch_media(&source, &fast_config(3), &handle, 9, &media, &media_dir)
            .await
            .unwrap();

        assert_eq!(path, Some(media_dir.join("9.jpg")));
        assert_eq!(source.attachment_call_count(9), 0);
    }

    #[tokio::test]
    async fn test_retry_budget_exhaustion_returns_none() {
        let tmp = TempDir::new().unwrap();
        let media_dir = tmp.path().join("media");

        let mut source = MockSource::single(MockTarget::new("-1001", "chan"));
        source.attachments.insert(9, attachment(b"bytes", None, None));
        source.script_attachment_failures(
            9,
            vec![
                ScriptedFailure::Transient,
                ScriptedFailure::Transient,
                ScriptedFailure::Transient,
            ],
        );
        let handle = source.targets[0].handle.clone();

        let media = media_ref(MediaKind::Photo, None, None);
        let path = fetch_media(&source, &fast_config(3), &handle, 9, &media, &media_dir)
            .await
            .unwrap();

        assert_eq!(path, None);
        assert_eq!(source.attachment_call_count(9), 3);
        assert!(!media_dir.join("9.jpg").exists());
    }

    #[tokio::test]
    async fn test_throttle_wait_not_counted_as_retry() {
        let tmp = TempDir::new().unwrap();
        let media_dir = tmp.path().join("media");

        let mut source = MockSource::single(MockTarget::new("-1001", "chan"));
        source
            .attachments
            .insert(9, attachment(b"payload", None, Some("image/jpeg")));
        // Two throttles and one transient failure with a budget of two:
        // only the transient failure consumes an attempt, so the download
        // still succeeds on the fourth call.
        source.script_attachment_failures(
            9,
            vec![
                ScriptedFailure::ThrottledMs(1),
                ScriptedFailure::Transient,
                ScriptedFailure::ThrottledMs(1),
            ],
        );
        let handle = source.targets[0].handle.clone();

        let media = media_ref(MediaKind::Photo, None, None);
        let path = fetch_media(&source, &fast_config(2), &handle, 9, &media, &media_dir)
            .await
            .unwrap();

        assert_eq!(path, Some(media_dir.join("9.jpg")));
        assert_eq!(source.attachment_call_count(9), 4);
        assert_eq!(std::fs::read(media_dir.join("9.jpg")).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_permission_denied_propagates() {
        let tmp = TempDir::new().unwrap();
        let media_dir = tmp.path().join("media");

        let source = MockSource::single(MockTarget::new("-1001", "chan"));
        source.script_attachment_failures(9, vec![ScriptedFailure::PermissionDenied]);
        let handle = source.targets[0].handle.clone();

        let media = media_ref(MediaKind::Photo, None, None);
        let result = fetch_media(&source, &fast_config(3), &handle, 9, &media, &media_dir).await;
        assert!(matches!(result, Err(crate::error::Error::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn test_rescan_resolves_pending_rows() {
        let tmp = TempDir::new().unwrap();
        let archive = TargetArchive::open(&tmp.path().join("-1001")).await.unwrap();

        let remote = msg_with_media(5, MediaKind::Document, None, Some("application/pdf"));
        let record = crate::archive::MessageRecord::from_remote(&remote, None);
        archive.insert_message(&record).await.unwrap();

        let mut source = MockSource::single(MockTarget::new("-1001", "chan"));
        source
            .attachments
            .insert(5, attachment(b"%PDF", Some("notes.pdf"), Some("application/pdf")));
        let handle = source.targets[0].handle.clone();

        let stats = rescan_media(&source, &fast_config(3), &handle, &archive)
            .await
            .unwrap();
        assert_eq!(stats.attempted, 1);
        assert_eq!(stats.resolved, 1);

        let stored = archive.get_message(5).await.unwrap().unwrap();
        let path = stored.media_path.unwrap();
        assert!(path.ends_with("notes.pdf"));
        assert!(archive.unresolved_media().await.unwrap().is_empty());
    }
}
