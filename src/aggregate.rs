//! Per-group aggregation over a decoded snapshot listing.

use crate::snapshot::{GroupData, GroupKey, Snapshot, Timestamp};

/// Values of the latest snapshot of a group, as exported by the collector.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotMetrics {
    pub time: Timestamp,
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

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AggregateError {
    #[error("no snapshots found in group (hostname={hostname:?}, tags={tags:?})")]
    EmptyGroup { hostname: String, tags: Vec<String> },
}

/// Total number of snapshots across all groups.
pub fn total_snapshot_count(groups: &[GroupData]) -> usize {
    groups.iter().map(|g| g.snapshots.len()).sum()
}

/// Number of snapshots in a group. Works on an empty/default group.
pub fn snapshot_count_by_group(group: &GroupData) -> (&GroupKey, usize) {
    (&group.group_key, group.snapshots.len())
}

/// Picks the snapshot with the greatest timestamp.
///
/// On ties the first snapshot in listing order wins.
pub fn last_snapshot_by_group(group: &GroupData) -> Result<(&GroupKey, &Snapshot), AggregateError> {
    let mut iter = group.snapshots.iter();
    let first = iter.next().ok_or_else(|| AggregateError::EmptyGroup {
        hostname: group.group_key.hostname.clone(),
        tags: group.group_key.tags.clone(),
    })?;

    let last = iter.fold(first, |latest, snapshot| {
        if snapshot.time > latest.time {
            snapshot
        } else {
            latest
        }
    });

    Ok((&group.group_key, last))
}

/// Projects the latest snapshot of a group into exportable values.
pub fn snapshot_metrics_by_group(
    group: &GroupData,
) -> Result<(&GroupKey, SnapshotMetrics), AggregateError> {
    let (key, snapshot) = last_snapshot_by_group(group)?;
    let summary = &snapshot.summary;

    Ok((
        key,
        SnapshotMetrics {
            time: snapshot.time,
            backup_start: summary.backup_start,
            backup_end: summary.backup_end,
            files_new: summary.files_new,
            files_changed: summary.files_changed,
            files_unmodified: summary.files_unmodified,
            dirs_new: summary.dirs_new,
            dirs_changed: summary.dirs_changed,
            dirs_unmodified: summary.dirs_unmodified,
            data_blobs: summary.data_blobs,
            tree_blobs: summary.tree_blobs,
            data_added: summary.data_added,
            data_added_packed: summary.data_added_packed,
            total_files_processed: summary.total_files_processed,
            total_bytes_processed: summary.total_bytes_processed,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Summary;

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse_from_rfc3339(s).expect("valid timestamp")
    }

    fn snap(time: &str, files_new: u64) -> Snapshot {
        Snapshot {
            time: ts(time),
            hostname: "SK12".into(),
            tags: vec!["kuma".into()],
            summary: Summary {
                files_new,
                ..Summary::default()
            },
        }
    }

    #[test]
    fn test_tie_keeps_first_seen() {
        let group = GroupData {
            group_key: GroupKey::default(),
            snapshots: vec![
                snap("2025-10-12T05:23:09+02:00", 1),
                snap("2025-10-12T05:23:09+02:00", 2),
                snap("2025-10-08T05:23:10+02:00", 3),
            ],
        };
        let (_, last) = last_snapshot_by_group(&group).expect("non-empty group");
        assert_eq!(last.summary.files_new, 1);
    }

    #[test]
    fn test_equal_instants_in_different_offsets_tie() {
        let group = GroupData {
            group_key: GroupKey::default(),
            snapshots: vec![
                snap("2025-10-12T05:23:09+02:00", 1),
                snap("2025-10-12T03:23:09Z", 2),
            ],
        };
        let (_, last) = last_snapshot_by_group(&group).expect("non-empty group");
        assert_eq!(last.summary.files_new, 1);
    }

    #[test]
    fn test_empty_group_error_names_group() {
        let group = GroupData {
            group_key: GroupKey {
                hostname: "SK12".into(),
                tags: vec!["kuma".into()],
            },
            snapshots: vec![],
        };
        let err = last_snapshot_by_group(&group).unwrap_err();
        assert!(err.to_string().contains("SK12"));
    }
}
