//! Snapshot collector: one restic invocation per scrape.
//!
//! Every scrape runs the same sequence:
//!
//! 1. run `restic snapshots --json --no-lock --group-by host,tags`
//! 2. on invocation failure, export only the exit code
//! 3. decode the listing; on failure export only the exit code `1684`
//! 4. otherwise export the exit code, the total count and, per group in
//!    listing order, the group count plus the latest-snapshot gauges
//!
//! The exit code gauge is always the first and only-once sample. Nothing is
//! kept between scrapes, so concurrent scrapes are independent.

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use crate::aggregate::{
    snapshot_count_by_group, snapshot_metrics_by_group, total_snapshot_count, AggregateError,
    SnapshotMetrics,
};
use crate::descriptors::{snapshot_descriptors, SnapshotMetric, PARSE_FAILURE_EXIT_CODE};
use crate::exposition::{encode_samples, Sample};
use crate::invoker::{exit_code_of, CommandInvoker};
use crate::scrape_stats::{ScrapeResult, ScrapeStats};
use crate::snapshot::{parse_groups, Timestamp};

/// Default name of the restic executable.
pub const DEFAULT_RESTIC_BINARY: &str = "restic";

/// Arguments passed to restic for the grouped snapshot listing.
pub const SNAPSHOTS_ARGS: [&str; 5] = ["snapshots", "--json", "--no-lock", "--group-by", "host,tags"];

pub type SnapshotSample = Sample<SnapshotMetric>;

/// Terminal state of a scrape that did not hit an internal fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeOutcome {
    InvocationFailed { exit_code: i32 },
    DecodeFailed,
    Completed { groups: usize, snapshots: usize },
}

/// Fault in the collector itself, as opposed to restic or its output.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("internal inconsistency while aggregating snapshots: {0}")]
    Internal(#[from] AggregateError),
}

/// Result of one scrape: the samples emitted so far and how it ended.
#[derive(Debug)]
pub struct Scrape {
    pub samples: Vec<SnapshotSample>,
    pub outcome: Result<ScrapeOutcome, CollectError>,
}

impl Scrape {
    /// Value of the exit code gauge, if it was emitted.
    pub fn exit_code(&self) -> Option<f64> {
        self.samples
            .iter()
            .find(|s| s.metric == SnapshotMetric::ExitCode)
            .map(|s| s.value)
    }

    /// Result kind recorded in [`ScrapeStats`].
    pub fn result(&self) -> ScrapeResult {
        match &self.outcome {
            Ok(ScrapeOutcome::Completed { .. }) => ScrapeResult::Completed,
            Ok(ScrapeOutcome::InvocationFailed { .. }) => ScrapeResult::InvocationFailed,
            Ok(ScrapeOutcome::DecodeFailed) => ScrapeResult::DecodeFailed,
            Err(_) => ScrapeResult::InternalError,
        }
    }
}

pub struct SnapshotCollector {
    executable: String,
    invoker: Box<dyn CommandInvoker>,
    stats: Option<Arc<ScrapeStats>>,
}

impl SnapshotCollector {
    pub fn new(executable: impl Into<String>, invoker: impl CommandInvoker + 'static) -> Self {
        Self {
            executable: executable.into(),
            invoker: Box::new(invoker),
            stats: None,
        }
    }

    /// Records every scrape's outcome into `stats`.
    pub fn with_stats(mut self, stats: Arc<ScrapeStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Runs one scrape and returns its samples.
    pub fn scrape(&self) -> Scrape {
        let mut samples = Vec::new();
        let outcome = self.scrape_into(&mut samples);
        Scrape { samples, outcome }
    }

    fn scrape_into(&self, out: &mut Vec<SnapshotSample>) -> Result<ScrapeOutcome, CollectError> {
        let result = self.invoker.invoke(&self.executable, &SNAPSHOTS_ARGS);
        let exit_code = exit_code_of(&result);

        let output = match result {
            Ok(output) => output,
            Err(e) => {
                warn!("Listing snapshots failed (exit code {}): {}", exit_code, e);
                out.push(Sample::unlabeled(SnapshotMetric::ExitCode, f64::from(exit_code)));
                return Ok(ScrapeOutcome::InvocationFailed { exit_code });
            }
        };

        let groups = match parse_groups(&output) {
            Ok(groups) => groups,
            Err(e) => {
                warn!("{} ({} bytes of output)", e, output.len());
                out.push(Sample::unlabeled(
                    SnapshotMetric::ExitCode,
                    f64::from(PARSE_FAILURE_EXIT_CODE),
                ));
                return Ok(ScrapeOutcome::DecodeFailed);
            }
        };

        out.push(Sample::unlabeled(SnapshotMetric::ExitCode, f64::from(exit_code)));

        let total = total_snapshot_count(&groups);
        out.push(Sample::unlabeled(
            SnapshotMetric::SnapshotCountTotal,
            total as f64,
        ));

        for group in &groups {
            let (key, count) = snapshot_count_by_group(group);
            let labels = vec![key.hostname.clone(), key.joined_tags()];
            out.push(Sample::labeled(
                SnapshotMetric::SnapshotCount,
                labels.clone(),
                count as f64,
            ));

            if count == 0 {
                continue;
            }

            let (_, metrics) = snapshot_metrics_by_group(group)?;
            for (metric, value) in last_snapshot_values(&metrics) {
                out.push(Sample::labeled(metric, labels.clone(), value));
            }
        }

        debug!(
            "Collected {} snapshots in {} groups",
            total,
            groups.len()
        );
        Ok(ScrapeOutcome::Completed {
            groups: groups.len(),
            snapshots: total,
        })
    }
}

impl std::fmt::Debug for SnapshotCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotCollector")
            .field("executable", &self.executable)
            .finish_non_exhaustive()
    }
}

impl Collector for SnapshotCollector {
    fn desc(&self) -> Vec<&Desc> {
        snapshot_descriptors()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let start = Instant::now();
        let scrape = self.scrape();
        if let Err(e) = &scrape.outcome {
            error!("Snapshot scrape aborted: {}", e);
        }

        if let Some(stats) = &self.stats {
            record(stats, &scrape, start.elapsed());
        }

        encode_samples(&scrape.samples)
    }
}

fn record(stats: &ScrapeStats, scrape: &Scrape, duration: Duration) {
    let exit_code = scrape.exit_code().unwrap_or_default() as i32;
    stats.record_scrape(scrape.result(), exit_code, duration);
}

/// Latest-snapshot gauge values, in [`SnapshotMetric::LAST_SNAPSHOT`] order.
pub fn last_snapshot_values(metrics: &SnapshotMetrics) -> [(SnapshotMetric, f64); 15] {
    [
        (SnapshotMetric::LastSnapshotTime, unix_seconds(Some(metrics.time))),
        (SnapshotMetric::LastSnapshotBackupStart, unix_seconds(metrics.backup_start)),
        (SnapshotMetric::LastSnapshotBackupEnd, unix_seconds(metrics.backup_end)),
        (SnapshotMetric::LastSnapshotFilesNew, metrics.files_new as f64),
        (SnapshotMetric::LastSnapshotFilesChanged, metrics.files_changed as f64),
        (SnapshotMetric::LastSnapshotFilesUnmodified, metrics.files_unmodified as f64),
        (SnapshotMetric::LastSnapshotDirsNew, metrics.dirs_new as f64),
        (SnapshotMetric::LastSnapshotDirsChanged, metrics.dirs_changed as f64),
        (SnapshotMetric::LastSnapshotDirsUnmodified, metrics.dirs_unmodified as f64),
        (SnapshotMetric::LastSnapshotDataBlobs, metrics.data_blobs as f64),
        (SnapshotMetric::LastSnapshotTreeBlobs, metrics.tree_blobs as f64),
        (SnapshotMetric::LastSnapshotDataAdded, metrics.data_added as f64),
        (SnapshotMetric::LastSnapshotDataAddedPacked, metrics.data_added_packed as f64),
        (
            SnapshotMetric::LastSnapshotTotalFilesProcessed,
            metrics.total_files_processed as f64,
        ),
        (
            SnapshotMetric::LastSnapshotTotalBytesProcessed,
            metrics.total_bytes_processed as f64,
        ),
    ]
}

/// Whole Unix seconds; absent timestamps export as 0.
fn unix_seconds(ts: Option<Timestamp>) -> f64 {
    ts.map(|t| t.timestamp() as f64).unwrap_or(0.0)
}
