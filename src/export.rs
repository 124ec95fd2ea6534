//! Full-table export snapshots.
//!
//! Exports are regenerated in full on every invocation, never incrementally:
//! per-target CSV/JSON snapshots of the message and member tables, plus the
//! fleet-level flat target summary. These are thin, stateless transforms
//! over the archive data model.

use crate::archive::{MemberRecord, MessageRecord, TargetArchive};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

const MESSAGE_FIELDS: [&str; 10] = [
    "message_id",
    "posted_at",
    "sender_id",
    "sender_first_name",
    "sender_last_name",
    "sender_username",
    "body",
    "media_kind",
    "media_path",
    "reply_to",
];

const MEMBER_FIELDS: [&str; 13] = [
    "user_id",
    "username",
    "first_name",
    "last_name",
    "phone",
    "is_bot",
    "is_verified",
    "is_restricted",
    "is_scam",
    "is_fake",
    "joined_at",
    "presence",
    "updated_at",
];

/// Files produced by one target export
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportStats {
    pub target_id: String,
    pub messages: usize,
    pub members: usize,
    pub files: Vec<PathBuf>,
}

/// One row of the fleet-level target summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetEntry {
    pub name: String,
    pub id: String,
    pub members: u64,
}

/// Quote a CSV field when it needs quoting
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_line<I: IntoIterator<Item = String>>(fields: I) -> String {
    fields
        .into_iter()
        .map(|f| csv_field(&f))
        .collect::<Vec<_>>()
        .join(",")
}

fn opt_str<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(|v| v.to_string()).unwrap_or_default()
}

fn message_row(m: &MessageRecord) -> Vec<String> {
    vec![
        m.message_id.to_string(),
        m.posted_at.clone(),
        opt_str(&m.sender_id),
        opt_str(&m.sender_first_name),
        opt_str(&m.sender_last_name),
        opt_str(&m.sender_username),
        m.body.clone(),
        opt_str(&m.media_kind),
        opt_str(&m.media_path),
        opt_str(&m.reply_to),
    ]
}

fn member_row(m: &MemberRecord) -> Vec<String> {
    vec![
        m.user_id.to_string(),
        opt_str(&m.username),
        opt_str(&m.first_name),
        opt_str(&m.last_name),
        opt_str(&m.phone),
        m.is_bot.to_string(),
        m.is_verified.to_string(),
        m.is_restricted.to_string(),
        m.is_scam.to_string(),
        m.is_fake.to_string(),
        opt_str(&m.joined_at),
        m.presence.clone(),
        m.updated_at.clone(),
    ]
}

fn write_csv(path: &Path, header: &[&str], rows: Vec<Vec<String>>) -> Result<()> {
    let mut out = String::new();
    out.push_str(&csv_line(header.iter().map(|h| h.to_string())));
    out.push('\n');
    for row in rows {
        out.push_str(&csv_line(row));
        out.push('\n');
    }
    std::fs::write(path, out)?;
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let json = serde_json::to_string_pretty(rows)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Export a target's message and member tables as CSV and JSON snapshots
/// written into its archive directory
pub async fn export_target(
    archive: &TargetArchive,
    target_dir: &Path,
    target_id: &str,
) -> Result<ExportStats> {
    let messages = archive.all_messages().await?;
    let members = archive.all_members().await?;

    let mut stats = ExportStats {
        target_id: target_id.to_string(),
        messages: messages.len(),
        members: members.len(),
        files: Vec::new(),
    };

    let messages_csv = target_dir.join("messages.csv");
    write_csv(
        &messages_csv,
        &MESSAGE_FIELDS,
        messages.iter().map(message_row).collect(),
    )?;
    stats.files.push(messages_csv);

    let messages_json = target_dir.join("messages.json");
    write_json(&messages_json, &messages)?;
    stats.files.push(messages_json);

    let members_csv = target_dir.join("members.csv");
    write_csv(
        &members_csv,
        &MEMBER_FIELDS,
        members.iter().map(member_row).collect(),
    )?;
    stats.files.push(members_csv);

    let members_json = target_dir.join("members.json");
    write_json(&members_json, &members)?;
    stats.files.push(members_json);

    info!(
        "Exported {}: {} messages, {} members",
        target_id, stats.messages, stats.members
    );
    Ok(stats)
}

/// Write the fleet summary as CSV
pub fn export_fleet_csv(entries: &[FleetEntry], path: &Path) -> Result<()> {
    write_csv(
        path,
        &["name", "id", "members"],
        entries
            .iter()
            .map(|e| vec![e.name.clone(), e.id.clone(), e.members.to_string()])
            .collect(),
    )
}

/// Write the fleet summary as plain text
pub fn export_fleet_txt(entries: &[FleetEntry], path: &Path) -> Result<()> {
    let mut out = String::from("Target List\n");
    out.push_str(&"-".repeat(40));
    out.push('\n');
    for entry in entries {
        out.push_str(&format!("Name: {}\n", entry.name));
        out.push_str(&format!("ID: {}\n", entry.id));
        out.push_str(&format!("Members: {}\n", entry.members));
        out.push_str(&"-".repeat(40));
        out.push('\n');
    }
    std::fs::write(path, out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::MessageRecord;
    use crate::source::mock::{member, msg};
    use crate::source::Presence;
    use tempfile::TempDir;

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("line\nbreak"), "\"line\nbreak\"");
    }

    #[tokio::test]
    async fn test_export_target_snapshots() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("-1001");
        let archive = TargetArchive::open(&dir).await.unwrap();

        let mut tricky = msg(101, "hello, \"world\"");
        tricky.reply_to = Some(90);
        archive
            .insert_message(&MessageRecord::from_remote(&tricky, None))
            .await
            .unwrap();
        archive
            .insert_message(&MessageRecord::from_remote(&msg(102, "plain"), None))
            .await
            .unwrap();
        archive
            .upsert_member(&crate::archive::MemberRecord::from_remote(&member(
                7,
                Presence::Recently,
            )))
            .await
            .unwrap();

        let stats = export_target(&archive, &dir, "-1001").await.unwrap();
        assert_eq!(stats.messages, 2);
        assert_eq!(stats.members, 1);
        assert_eq!(stats.files.len(), 4);

        let csv = std::fs::read_to_string(dir.join("messages.csv")).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap().split(',').next(), Some("message_id"));
        let first = lines.next().unwrap();
        assert!(first.starts_with("101,"));
        assert!(first.contains("\"hello, \"\"world\"\"\""));
        assert!(first.ends_with(",90"));

        let json = std::fs::read_to_string(dir.join("messages.json")).unwrap();
        let parsed: Vec<MessageRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].body, "hello, \"world\"");

        let members_csv = std::fs::read_to_string(dir.join("members.csv")).unwrap();
        assert!(members_csv.lines().nth(1).unwrap().starts_with("7,user7"));
    }

    #[tokio::test]
    async fn test_export_empty_archive_writes_headers() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("-1002");
        let archive = TargetArchive::open(&dir).await.unwrap();

        let stats = export_target(&archive, &dir, "-1002").await.unwrap();
        assert_eq!(stats.messages, 0);

        let csv = std::fs::read_to_string(dir.join("messages.csv")).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn test_fleet_exports() {
        let tmp = TempDir::new().unwrap();
        let entries = vec![
            FleetEntry {
                name: "Rust News".into(),
                id: "-1001".into(),
                members: 1200,
            },
            FleetEntry {
                name: "ops, internal".into(),
                id: "-1002".into(),
                members: 8,
            },
        ];

        let csv_path = tmp.path().join("targets.csv");
        export_fleet_csv(&entries, &csv_path).unwrap();
        let csv = std::fs::read_to_string(&csv_path).unwrap();
        assert_eq!(csv.lines().next(), Some("name,id,members"));
        assert!(csv.contains("\"ops, internal\",-1002,8"));

        let txt_path = tmp.path().join("targets.txt");
        export_fleet_txt(&entries, &txt_path).unwrap();
        let txt = std::fs::read_to_string(&txt_path).unwrap();
        assert!(txt.contains("Name: Rust News"));
        assert!(txt.contains("Members: 1200"));
    }
}
