//! The remote message/member source capability.
//!
//! The core pipeline never speaks the provider protocol itself; it consumes
//! this trait. The concrete [`HttpSource`] adapter talks to a local provider
//! gateway process that owns credentials and the real wire protocol.

mod http;
#[cfg(test)]
pub mod mock;

pub use http::HttpSource;

use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Kind of remote target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Channel,
    Group,
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetKind::Channel => write!(f, "channel"),
            TargetKind::Group => write!(f, "group"),
        }
    }
}

impl FromStr for TargetKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "channel" => Ok(TargetKind::Channel),
            "group" => Ok(TargetKind::Group),
            _ => Err(Error::Config(format!("Unknown target kind: {}", s))),
        }
    }
}

/// Last-seen presence of a member, as reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    Unknown,
    Offline,
    Online,
    Recently,
    LastWeek,
    LastMonth,
}

impl std::fmt::Display for Presence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Presence::Unknown => "unknown",
            Presence::Offline => "offline",
            Presence::Online => "online",
            Presence::Recently => "recently",
            Presence::LastWeek => "last_week",
            Presence::LastMonth => "last_month",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Presence {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "unknown" => Ok(Presence::Unknown),
            "offline" => Ok(Presence::Offline),
            "online" => Ok(Presence::Online),
            "recently" => Ok(Presence::Recently),
            "last_week" => Ok(Presence::LastWeek),
            "last_month" => Ok(Presence::LastMonth),
            _ => Err(Error::Config(format!("Unknown presence value: {}", s))),
        }
    }
}

/// Kind of attachment carried by a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Document,
    /// Webpages, polls, geo points and similar non-file media
    Other,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Photo => write!(f, "photo"),
            MediaKind::Document => write!(f, "document"),
            MediaKind::Other => write!(f, "other"),
        }
    }
}

impl FromStr for MediaKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "photo" => Ok(MediaKind::Photo),
            "document" => Ok(MediaKind::Document),
            "other" => Ok(MediaKind::Other),
            _ => Err(Error::Config(format!("Unknown media kind: {}", s))),
        }
    }
}

/// A resolved remote target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetHandle {
    /// Canonical provider id (`-100…` form)
    pub id: String,
    pub title: Option<String>,
    pub kind: TargetKind,
    /// Member count as advertised by the provider, when known
    pub member_count: Option<u64>,
}

/// Attachment metadata attached to a message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaRef {
    pub kind: MediaKind,
    pub suggested_name: Option<String>,
    pub mime_type: Option<String>,
}

/// A message as listed by the source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteMessage {
    pub id: i64,
    pub posted_at: DateTime<Utc>,
    pub sender_id: Option<i64>,
    #[serde(default)]
    pub body: String,
    pub media: Option<MediaRef>,
    pub reply_to: Option<i64>,
}

/// Sender display fields resolved on demand
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SenderProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

/// A member as enumerated by the source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteMember {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub is_restricted: bool,
    #[serde(default)]
    pub is_scam: bool,
    #[serde(default)]
    pub is_fake: bool,
    pub joined_at: Option<DateTime<Utc>>,
    pub presence: Presence,
}

/// Downloaded attachment bytes plus naming hints
#[derive(Debug, Clone)]
pub struct Attachment {
    pub bytes: Vec<u8>,
    pub suggested_name: Option<String>,
    pub mime_type: Option<String>,
}

/// Abstract source of remote messages and members.
///
/// All listing methods page with offset/limit so callers can enumerate large
/// fleets and member lists without holding them in memory. `messages_after`
/// returns messages with ids strictly greater than `after`, ascending.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Resolve a target reference (canonical id, bare numeric id, or
    /// `@username`) to a stable handle
    async fn resolve_target(&self, reference: &str) -> Result<TargetHandle>;

    /// Count messages with id strictly greater than `after`
    async fn count_messages_after(&self, target: &TargetHandle, after: i64) -> Result<u64>;

    /// List up to `limit` messages with id strictly greater than `after`,
    /// in ascending id order
    async fn messages_after(
        &self,
        target: &TargetHandle,
        after: i64,
        limit: usize,
    ) -> Result<Vec<RemoteMessage>>;

    /// Resolve the display fields of a message sender
    async fn sender_profile(&self, target: &TargetHandle, sender_id: i64)
        -> Result<SenderProfile>;

    /// Fetch a message's attachment bytes
    async fn fetch_attachment(&self, target: &TargetHandle, message_id: i64)
        -> Result<Attachment>;

    /// Enumerate members in offset/limit pages
    async fn members(
        &self,
        target: &TargetHandle,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<RemoteMember>>;

    /// Enumerate every target visible to the account, in offset/limit pages
    async fn visible_targets(&self, offset: usize, limit: usize) -> Result<Vec<TargetHandle>>;
}

/// Normalize a numeric target id to the canonical `-100…` form
pub fn canonical_target_id(raw: &str) -> String {
    let raw = raw.trim();
    if let Some(rest) = raw.strip_prefix("-100") {
        if !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()) {
            return raw.to_string();
        }
    }
    if let Some(rest) = raw.strip_prefix('-') {
        if !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()) {
            return format!("-100{}", rest);
        }
    }
    if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) {
        return format!("-100{}", raw);
    }
    raw.to_string()
}

/// Whether a reference is a numeric id (as opposed to a username)
pub fn is_numeric_reference(reference: &str) -> bool {
    let trimmed = reference.trim();
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

/// Validate a non-numeric reference as a plausible username handle
pub fn validate_username(reference: &str) -> Result<&str> {
    let name = reference.trim().trim_start_matches('@');
    let valid = regex::Regex::new(r"^[A-Za-z][A-Za-z0-9_]{3,31}$")
        .ok()
        .map(|re| re.is_match(name))
        .unwrap_or(false);
    if valid {
        Ok(name)
    } else {
        Err(Error::InvalidTarget(reference.to_string()))
    }
}
