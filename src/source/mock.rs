//! Scripted in-memory source used by pipeline, sweep and loop tests.

use super::{
    canonical_target_id, Attachment, MediaKind, MediaRef, MessageSource, Presence, RemoteMember,
    RemoteMessage, SenderProfile, TargetHandle, TargetKind,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Failure kinds a test can script without holding non-Clone error values
#[derive(Debug, Clone, Copy)]
pub enum ScriptedFailure {
    Transient,
    ThrottledMs(u64),
    PermissionDenied,
    NotFound,
}

impl ScriptedFailure {
    fn into_error(self) -> Error {
        match self {
            ScriptedFailure::Transient => Error::Transient("scripted transient failure".into()),
            ScriptedFailure::ThrottledMs(ms) => Error::Throttled(Duration::from_millis(ms)),
            ScriptedFailure::PermissionDenied => {
                Error::PermissionDenied("scripted permission failure".into())
            }
            ScriptedFailure::NotFound => Error::TargetNotFound("scripted missing target".into()),
        }
    }
}

pub struct MockTarget {
    pub handle: TargetHandle,
    pub messages: Vec<RemoteMessage>,
    pub members: Vec<RemoteMember>,
    /// When set, member enumeration fails with this kind
    pub member_failure: Option<ScriptedFailure>,
}

impl MockTarget {
    pub fn new(id: &str, title: &str) -> Self {
        Self {
            handle: handle(id, title),
            messages: Vec::new(),
            members: Vec::new(),
            member_failure: None,
        }
    }
}

#[derive(Default)]
pub struct MockSource {
    pub targets: Vec<MockTarget>,
    pub senders: HashMap<i64, SenderProfile>,
    pub failing_senders: Vec<i64>,
    pub attachments: HashMap<i64, Attachment>,
    /// Failures returned, in order, before an attachment call succeeds
    pub attachment_script: Mutex<HashMap<i64, Vec<ScriptedFailure>>>,
    pub attachment_calls: Mutex<HashMap<i64, u32>>,
    /// (target id, offset) of every members() call, for pacing assertions
    pub member_pages: Mutex<Vec<(String, usize)>>,
}

impl MockSource {
    pub fn single(target: MockTarget) -> Self {
        Self {
            targets: vec![target],
            ..Default::default()
        }
    }

    pub fn attachment_call_count(&self, message_id: i64) -> u32 {
        *self
            .attachment_calls
            .lock()
            .unwrap()
            .get(&message_id)
            .unwrap_or(&0)
    }

    pub fn script_attachment_failures(&self, message_id: i64, failures: Vec<ScriptedFailure>) {
        self.attachment_script
            .lock()
            .unwrap()
            .insert(message_id, failures);
    }

    fn target(&self, id: &str) -> Result<&MockTarget> {
        self.targets
            .iter()
            .find(|t| t.handle.id == id)
            .ok_or_else(|| Error::TargetNotFound(id.to_string()))
    }
}

pub fn handle(id: &str, title: &str) -> TargetHandle {
    TargetHandle {
        id: id.to_string(),
        title: Some(title.to_string()),
        kind: TargetKind::Group,
        member_count: None,
    }
}

pub fn msg(id: i64, body: &str) -> RemoteMessage {
    RemoteMessage {
        id,
        posted_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        sender_id: Some(1),
        body: body.to_string(),
        media: None,
        reply_to: None,
    }
}

pub fn msg_with_media(
    id: i64,
    kind: MediaKind,
    suggested_name: Option<&str>,
    mime_type: Option<&str>,
) -> RemoteMessage {
    let mut m = msg(id, "");
    m.media = Some(MediaRef {
        kind,
        suggested_name: suggested_name.map(|s| s.to_string()),
        mime_type: mime_type.map(|s| s.to_string()),
    });
    m
}

pub fn member(user_id: i64, presence: Presence) -> RemoteMember {
    RemoteMember {
        user_id,
        username: Some(format!("user{}", user_id)),
        first_name: Some("Test".to_string()),
        last_name: None,
        phone: None,
        is_bot: false,
        is_verified: false,
        is_restricted: false,
        is_scam: false,
        is_fake: false,
        joined_at: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
        presence,
    }
}

pub fn attachment(bytes: &[u8], suggested_name: Option<&str>, mime_type: Option<&str>) -> Attachment {
    Attachment {
        bytes: bytes.to_vec(),
        suggested_name: suggested_name.map(|s| s.to_string()),
        mime_type: mime_type.map(|s| s.to_string()),
    }
}

#[async_trait]
impl MessageSource for MockSource {
    async fn resolve_target(&self, reference: &str) -> Result<TargetHandle> {
        let id = canonical_target_id(reference);
        self.target(&id).map(|t| t.handle.clone())
    }

    async fn count_messages_after(&self, target: &TargetHandle, after: i64) -> Result<u64> {
        let t = self.target(&target.id)?;
        Ok(t.messages.iter().filter(|m| m.id > after).count() as u64)
    }

    async fn messages_after(
        &self,
        target: &TargetHandle,
        after: i64,
        limit: usize,
    ) -> Result<Vec<RemoteMessage>> {
        let t = self.target(&target.id)?;
        let mut page: Vec<RemoteMessage> = t
            .messages
            .iter()
            .filter(|m| m.id > after)
            .cloned()
            .collect();
        page.sort_by_key(|m| m.id);
        page.truncate(limit);
        Ok(page)
    }

    async fn sender_profile(
        &self,
        _target: &TargetHandle,
        sender_id: i64,
    ) -> Result<SenderProfile> {
        if self.failing_senders.contains(&sender_id) {
            return Err(Error::Transient(format!(
                "profile lookup failed for {}",
                sender_id
            )));
        }
        Ok(self.senders.get(&sender_id).cloned().unwrap_or_default())
    }

    async fn fetch_attachment(
        &self,
        _target: &TargetHandle,
        message_id: i64,
    ) -> Result<Attachment> {
        *self
            .attachment_calls
            .lock()
            .unwrap()
            .entry(message_id)
            .or_insert(0) += 1;

        let mut script = self.attachment_script.lock().unwrap();
        if let Some(failures) = script.get_mut(&message_id) {
            if !failures.is_empty() {
                return Err(failures.remove(0).into_error());
            }
        }
        drop(script);

        self.attachments
            .get(&message_id)
            .cloned()
            .ok_or_else(|| Error::TargetNotFound(format!("attachment {}", message_id)))
    }

    async fn members(
        &self,
        target: &TargetHandle,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<RemoteMember>> {
        self.member_pages
            .lock()
            .unwrap()
            .push((target.id.clone(), offset));

        let t = self.target(&target.id)?;
        if let Some(failure) = t.member_failure {
            return Err(failure.into_error());
        }
        Ok(t.members
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn visible_targets(&self, offset: usize, limit: usize) -> Result<Vec<TargetHandle>> {
        Ok(self
            .targets
            .iter()
            .skip(offset)
            .take(limit)
            .map(|t| t.handle.clone())
            .collect())
    }
}
