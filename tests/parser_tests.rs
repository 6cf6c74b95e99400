//! Integration tests for snapshot listing decoding and aggregation.

use restic_exporter::aggregate::{
    last_snapshot_by_group, snapshot_count_by_group, snapshot_metrics_by_group,
    total_snapshot_count,
};
use restic_exporter::snapshot::{parse_groups, Timestamp};
use restic_exporter::{AggregateError, GroupData, GroupKey};

fn fixture(name: &str) -> Vec<u8> {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/testdata")
        .join(name);
    std::fs::read(&path).unwrap_or_else(|e| panic!("read {}: {}", path.display(), e))
}

fn ts(s: &str) -> Timestamp {
    Timestamp::parse_from_rfc3339(s).expect("valid timestamp")
}

#[test]
fn test_parse_valid_listing() {
    let groups = parse_groups(&fixture("input1.json")).expect("valid listing");
    assert_eq!(groups.len(), 2);

    assert_eq!(
        groups[0].group_key,
        GroupKey {
            hostname: "SK12".into(),
            tags: vec!["full-server".into()],
        }
    );
    assert_eq!(groups[0].snapshots.len(), 2);

    let first = &groups[0].snapshots[0];
    assert_eq!(first.time, ts("2025-10-07T17:56:01.685056163+02:00"));
    assert_eq!(first.hostname, "SK12");
    assert_eq!(first.tags, vec!["full-server".to_string()]);
    assert_eq!(
        first.summary.backup_end,
        Some(ts("2025-10-07T18:02:13.257197421+02:00"))
    );
    assert_eq!(first.summary.files_new, 72799);
    assert_eq!(first.summary.dirs_new, 10352);
    assert_eq!(first.summary.data_added, 3155414417);
    assert_eq!(first.summary.data_added_packed, 1241206301);
    assert_eq!(first.summary.total_bytes_processed, 3771315033);

    let kuma = &groups[1];
    assert_eq!(kuma.group_key.joined_tags(), "kuma");
    assert_eq!(kuma.snapshots[1].summary.files_unmodified, 6);
    assert_eq!(kuma.snapshots[1].summary.dirs_changed, 9);
}

#[test]
fn test_parse_empty_and_invalid() {
    assert!(parse_groups(&fixture("empty.json"))
        .expect("empty array")
        .is_empty());
    assert!(parse_groups(&fixture("invalid.json")).is_err());
}

#[test]
fn test_counts() {
    let groups = parse_groups(&fixture("multiple_groups.json")).expect("valid listing");
    assert_eq!(total_snapshot_count(&groups), 4);

    let (key, count) = snapshot_count_by_group(&groups[1]);
    assert_eq!(key.joined_tags(), "papermc");
    assert_eq!(count, 3);

    assert_eq!(total_snapshot_count(&[]), 0);
    let group = GroupData::default();
    let (key, count) = snapshot_count_by_group(&group);
    assert_eq!(key, &GroupKey::default());
    assert_eq!(count, 0);
}

#[test]
fn test_latest_snapshot_is_not_listing_order() {
    let groups = parse_groups(&fixture("multiple_groups.json")).expect("valid listing");

    // The newest papermc snapshot is the second of three
    let (_, latest) = last_snapshot_by_group(&groups[1]).expect("non-empty group");
    assert_eq!(latest.time, ts("2025-10-26T20:27:00.25+01:00"));

    let (key, metrics) = snapshot_metrics_by_group(&groups[1]).expect("non-empty group");
    assert_eq!(key.hostname, "DPC1");
    assert_eq!(metrics.time, latest.time);
    assert_eq!(metrics.files_unmodified, 288);
    assert_eq!(metrics.data_added, 0);
    assert_eq!(
        metrics.backup_end,
        Some(ts("2025-10-26T20:27:04.75+01:00"))
    );
}

#[test]
fn test_latest_of_input1() {
    let groups = parse_groups(&fixture("input1.json")).expect("valid listing");
    let (_, metrics) = snapshot_metrics_by_group(&groups[0]).expect("non-empty group");
    assert_eq!(metrics.time, ts("2025-10-12T00:35:01.347812525+02:00"));
    assert_eq!(metrics.files_changed, 69);
    assert_eq!(metrics.total_files_processed, 73110);
}

#[test]
fn test_empty_group_is_an_error() {
    let group = GroupData {
        group_key: GroupKey {
            hostname: "h".into(),
            tags: vec![],
        },
        snapshots: vec![],
    };
    assert_eq!(
        snapshot_metrics_by_group(&group).unwrap_err(),
        AggregateError::EmptyGroup {
            hostname: "h".into(),
            tags: vec![],
        }
    );
}
