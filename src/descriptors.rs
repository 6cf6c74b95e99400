//! Catalogue of every snapshot metric the exporter can emit.
//!
//! The table is immutable and built once per process; `describe` always
//! returns all of it, regardless of what a scrape actually produced.

use once_cell::sync::Lazy;
use prometheus::core::Desc;
use std::collections::HashMap;

use crate::exposition::MetricDef;

/// Label names attached to every per-group metric.
pub const GROUP_LABELS: [&str; 2] = ["restic_hostname", "restic_tags"];

/// Exit code exported when the command succeeded but its JSON output could
/// not be decoded. Chosen outside the range of restic's own exit codes.
pub const PARSE_FAILURE_EXIT_CODE: i32 = 1684;

/// Identifies one entry of the descriptor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SnapshotMetric {
    SnapshotCountTotal,
    SnapshotCount,
    LastSnapshotTime,
    LastSnapshotBackupStart,
    LastSnapshotBackupEnd,
    LastSnapshotFilesNew,
    LastSnapshotFilesChanged,
    LastSnapshotFilesUnmodified,
    LastSnapshotDirsNew,
    LastSnapshotDirsChanged,
    LastSnapshotDirsUnmodified,
    LastSnapshotDataBlobs,
    LastSnapshotTreeBlobs,
    LastSnapshotDataAdded,
    LastSnapshotDataAddedPacked,
    LastSnapshotTotalFilesProcessed,
    LastSnapshotTotalBytesProcessed,
    ExitCode,
}

impl SnapshotMetric {
    /// Every metric, in describe order.
    pub const ALL: [SnapshotMetric; 18] = [
        SnapshotMetric::SnapshotCountTotal,
        SnapshotMetric::SnapshotCount,
        SnapshotMetric::LastSnapshotTime,
        SnapshotMetric::LastSnapshotBackupStart,
        SnapshotMetric::LastSnapshotBackupEnd,
        SnapshotMetric::LastSnapshotFilesNew,
        SnapshotMetric::LastSnapshotFilesChanged,
        SnapshotMetric::LastSnapshotFilesUnmodified,
        SnapshotMetric::LastSnapshotDirsNew,
        SnapshotMetric::LastSnapshotDirsChanged,
        SnapshotMetric::LastSnapshotDirsUnmodified,
        SnapshotMetric::LastSnapshotDataBlobs,
        SnapshotMetric::LastSnapshotTreeBlobs,
        SnapshotMetric::LastSnapshotDataAdded,
        SnapshotMetric::LastSnapshotDataAddedPacked,
        SnapshotMetric::LastSnapshotTotalFilesProcessed,
        SnapshotMetric::LastSnapshotTotalBytesProcessed,
        SnapshotMetric::ExitCode,
    ];

    /// Per-group metrics taken from the latest snapshot, in emission order.
    pub const LAST_SNAPSHOT: [SnapshotMetric; 15] = [
        SnapshotMetric::LastSnapshotTime,
        SnapshotMetric::LastSnapshotBackupStart,
        SnapshotMetric::LastSnapshotBackupEnd,
        SnapshotMetric::LastSnapshotFilesNew,
        SnapshotMetric::LastSnapshotFilesChanged,
        SnapshotMetric::LastSnapshotFilesUnmodified,
        SnapshotMetric::LastSnapshotDirsNew,
        SnapshotMetric::LastSnapshotDirsChanged,
        SnapshotMetric::LastSnapshotDirsUnmodified,
        SnapshotMetric::LastSnapshotDataBlobs,
        SnapshotMetric::LastSnapshotTreeBlobs,
        SnapshotMetric::LastSnapshotDataAdded,
        SnapshotMetric::LastSnapshotDataAddedPacked,
        SnapshotMetric::LastSnapshotTotalFilesProcessed,
        SnapshotMetric::LastSnapshotTotalBytesProcessed,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SnapshotMetric::SnapshotCountTotal => "restic_snapshot_count_total",
            SnapshotMetric::SnapshotCount => "restic_snapshot_count",
            SnapshotMetric::LastSnapshotTime => "restic_last_snapshot_time_seconds",
            SnapshotMetric::LastSnapshotBackupStart => "restic_last_snapshot_backup_start_seconds",
            SnapshotMetric::LastSnapshotBackupEnd => "restic_last_snapshot_backup_end_seconds",
            SnapshotMetric::LastSnapshotFilesNew => "restic_last_snapshot_files_new",
            SnapshotMetric::LastSnapshotFilesChanged => "restic_last_snapshot_files_changed",
            SnapshotMetric::LastSnapshotFilesUnmodified => "restic_last_snapshot_files_unmodified",
            SnapshotMetric::LastSnapshotDirsNew => "restic_last_snapshot_dirs_new",
            SnapshotMetric::LastSnapshotDirsChanged => "restic_last_snapshot_dirs_changed",
            SnapshotMetric::LastSnapshotDirsUnmodified => "restic_last_snapshot_dirs_unmodified",
            SnapshotMetric::LastSnapshotDataBlobs => "restic_last_snapshot_data_blobs",
            SnapshotMetric::LastSnapshotTreeBlobs => "restic_last_snapshot_tree_blobs",
            SnapshotMetric::LastSnapshotDataAdded => "restic_last_snapshot_data_added_bytes",
            SnapshotMetric::LastSnapshotDataAddedPacked => {
                "restic_last_snapshot_data_added_packed_bytes"
            }
            SnapshotMetric::LastSnapshotTotalFilesProcessed => {
                "restic_last_snapshot_total_files_processed"
            }
            SnapshotMetric::LastSnapshotTotalBytesProcessed => {
                "restic_last_snapshot_total_bytes_processed"
            }
            SnapshotMetric::ExitCode => "restic_snapshot_exit_code",
        }
    }

    pub fn help(self) -> &'static str {
        match self {
            SnapshotMetric::SnapshotCountTotal => "Total number of snapshots in the repository",
            SnapshotMetric::SnapshotCount => "Number of snapshots",
            SnapshotMetric::LastSnapshotTime => "Unix timestamp of the last snapshot",
            SnapshotMetric::LastSnapshotBackupStart => {
                "Unix timestamp: start time of the last backup"
            }
            SnapshotMetric::LastSnapshotBackupEnd => "Unix timestamp: end time of the last backup",
            SnapshotMetric::LastSnapshotFilesNew => {
                "Number of newly added files in the last snapshot"
            }
            SnapshotMetric::LastSnapshotFilesChanged => "Number of changed files in the last snapshot",
            SnapshotMetric::LastSnapshotFilesUnmodified => {
                "Number of unmodified files in the last snapshot"
            }
            SnapshotMetric::LastSnapshotDirsNew => {
                "Number of newly added directories in the last snapshot"
            }
            SnapshotMetric::LastSnapshotDirsChanged => {
                "Number of changed directories in the last snapshot"
            }
            SnapshotMetric::LastSnapshotDirsUnmodified => {
                "Number of unmodified directories in the last snapshot"
            }
            SnapshotMetric::LastSnapshotDataBlobs => "Number of data blobs in the last snapshot",
            SnapshotMetric::LastSnapshotTreeBlobs => "Number of tree blobs in the last snapshot",
            SnapshotMetric::LastSnapshotDataAdded => {
                "Number of bytes added in the last snapshot (unpacked)"
            }
            SnapshotMetric::LastSnapshotDataAddedPacked => {
                "Number of bytes added in the last snapshot (packed)"
            }
            SnapshotMetric::LastSnapshotTotalFilesProcessed => {
                "Total number of files processed in the last snapshot"
            }
            SnapshotMetric::LastSnapshotTotalBytesProcessed => {
                "Total number of bytes processed in the last snapshot"
            }
            SnapshotMetric::ExitCode => {
                "Exit code of the list snapshots command. See restic exit codes, except 1684 for \
                 json output parsing errors: https://restic.readthedocs.io/en/stable/075_scripting.html#exit-codes"
            }
        }
    }

    /// Whether the metric carries the hostname/tags labels.
    pub fn is_grouped(self) -> bool {
        !matches!(
            self,
            SnapshotMetric::SnapshotCountTotal | SnapshotMetric::ExitCode
        )
    }

    pub fn label_names(self) -> &'static [&'static str] {
        if self.is_grouped() {
            &GROUP_LABELS
        } else {
            &[]
        }
    }

    /// Descriptor of this metric from the static table.
    pub fn desc(self) -> &'static Desc {
        &DESCRIPTORS[self as usize]
    }
}

impl MetricDef for SnapshotMetric {
    fn name(self) -> &'static str {
        SnapshotMetric::name(self)
    }

    fn help(self) -> &'static str {
        SnapshotMetric::help(self)
    }

    fn label_names(self) -> &'static [&'static str] {
        SnapshotMetric::label_names(self)
    }
}

/// Builds a descriptor for a fixed metric definition.
pub fn build_desc(name: &str, help: &str, labels: &[&str]) -> prometheus::Result<Desc> {
    Desc::new(
        name.to_string(),
        help.to_string(),
        labels.iter().map(|l| l.to_string()).collect(),
        HashMap::new(),
    )
}

/// Descriptors indexed by `SnapshotMetric as usize`.
static DESCRIPTORS: Lazy<Vec<Desc>> = Lazy::new(|| {
    SnapshotMetric::ALL
        .iter()
        .map(|m| {
            build_desc(m.name(), m.help(), m.label_names())
                .expect("static snapshot metric definitions are valid")
        })
        .collect()
});

/// All snapshot descriptors, in describe order.
pub fn snapshot_descriptors() -> Vec<&'static Desc> {
    SnapshotMetric::ALL.iter().map(|m| m.desc()).collect()
}
