//! Snapshot listing data model and JSON decoding.
//!
//! This module decodes the output of `restic snapshots --json --group-by host,tags`,
//! a JSON array of groups where every group carries its `group_key` and the
//! snapshots that belong to it.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer};

/// Timestamp type used throughout the snapshot listing (RFC3339 with nanoseconds).
pub type Timestamp = DateTime<FixedOffset>;

/// Identity of a snapshot group.
///
/// Two keys are equal iff the hostname and the full, ordered tag list match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize)]
pub struct GroupKey {
    #[serde(default, deserialize_with = "null_as_default")]
    pub hostname: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
}

impl GroupKey {
    /// Tags rendered the way they are exported as a label value.
    pub fn joined_tags(&self) -> String {
        self.tags.join(",")
    }
}

/// One group of snapshots as emitted by restic.
///
/// Snapshot order is the order of the source JSON, not sorted by time.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GroupData {
    #[serde(default)]
    pub group_key: GroupKey,
    #[serde(default, deserialize_with = "null_as_default")]
    pub snapshots: Vec<Snapshot>,
}

/// A single backup run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Snapshot {
    pub time: Timestamp,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hostname: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    /// Absent for snapshots written by restic versions before 0.17.
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: Summary,
}

/// Counters and byte totals recorded for one backup run.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Summary {
    pub backup_start: Option<Timestamp>,
    pub backup_end: Option<Timestamp>,
    pub files_new: u64,
    pub files_changed: u64,
    pub files_unmodified: u64,
    pub dirs_new: u64,
    pub dirs_changed: u64,
    pub dirs_unmodified: u64,
    pub data_blobs: u64,
    pub tree_blobs: u64,
    pub data_added: u64,
    pub data_added_packed: u64,
    pub total_files_processed: u64,
    pub total_bytes_processed: u64,
}

/// Error returned when the snapshot listing cannot be decoded.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("failed to decode snapshot listing: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Decodes the grouped snapshot listing.
///
/// Empty input and malformed JSON fail; `[]` yields an empty list.
/// Unknown fields are ignored.
pub fn parse_groups(data: &[u8]) -> Result<Vec<GroupData>, ParseError> {
    let groups = serde_json::from_slice(data)?;
    Ok(groups)
}

/// restic writes `null` for empty slices in several places.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_array() {
        let groups = parse_groups(b"[]").expect("empty array is valid");
        assert!(groups.is_empty());
    }

    #[test]
    fn test_parse_empty_input_fails() {
        assert!(parse_groups(b"").is_err());
    }

    #[test]
    fn test_parse_truncated_input_fails() {
        assert!(parse_groups(b"[{").is_err());
        assert!(parse_groups(b"{{").is_err());
    }

    #[test]
    fn test_parse_object_instead_of_array_fails() {
        assert!(parse_groups(br#"{"group_key":{}}"#).is_err());
    }

    #[test]
    fn test_null_tags_and_missing_summary() {
        let json = br#"[{
            "group_key": {"hostname": "h1", "tags": null},
            "snapshots": [{"time": "2025-10-08T05:23:10.031203027+02:00", "hostname": "h1"}]
        }]"#;
        let groups = parse_groups(json).expect("valid listing");
        assert_eq!(groups.len(), 1);
        assert!(groups[0].group_key.tags.is_empty());
        assert_eq!(groups[0].group_key.joined_tags(), "");

        let snapshot = &groups[0].snapshots[0];
        assert!(snapshot.tags.is_empty());
        assert_eq!(snapshot.summary, Summary::default());
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let json = br#"[{
            "group_key": {"hostname": "h1", "tags": ["a"], "paths": ["/srv"]},
            "snapshots": [{
                "time": "2025-10-08T05:23:10.031203027+02:00",
                "id": "4c1e6c1f",
                "short_id": "4c1e6c1f",
                "program_version": "restic 0.18.0",
                "summary": {"files_new": 3, "backup_start": "2025-10-08T05:23:10.031203027+02:00", "new_field": 1}
            }]
        }]"#;
        let groups = parse_groups(json).expect("valid listing");
        let summary = &groups[0].snapshots[0].summary;
        assert_eq!(summary.files_new, 3);
        assert!(summary.backup_start.is_some());
        assert!(summary.backup_end.is_none());
    }

    #[test]
    fn test_joined_tags_preserves_order() {
        let key = GroupKey {
            hostname: "h".into(),
            tags: vec!["daily".into(), "db".into()],
        };
        assert_eq!(key.joined_tags(), "daily,db");
    }
}
