//! Repository statistics collector (`restic stats --mode raw-data`).
//!
//! Optional companion of the snapshot collector. Uses the same invoker seam
//! and the same exit code rules: the real exit code on success or failure of
//! the command, `1684` when its output cannot be decoded.

use once_cell::sync::Lazy;
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::descriptors::{build_desc, PARSE_FAILURE_EXIT_CODE};
use crate::exposition::{encode_samples, MetricDef, Sample};
use crate::invoker::{exit_code_of, CommandInvoker};
use crate::scrape_stats::{ScrapeResult, ScrapeStats};

/// Arguments passed to restic for raw repository statistics.
pub const STATS_ARGS: [&str; 5] = ["stats", "--json", "--no-lock", "--mode", "raw-data"];

/// Output of `restic stats --json --mode raw-data`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawDataStats {
    pub total_size: u64,
    pub total_uncompressed_size: u64,
    pub compression_ratio: f64,
    pub compression_progress: f64,
    pub compression_space_saving: f64,
    pub total_blob_count: u64,
    #[serde(rename = "snapshots_count")]
    pub snapshot_count: u64,
}

/// Decodes the raw-data statistics object. Empty input is an error.
pub fn parse_raw_data_stats(data: &[u8]) -> Result<RawDataStats, serde_json::Error> {
    serde_json::from_slice(data)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoStatsMetric {
    ExitCode,
    TotalSize,
    TotalUncompressedSize,
    CompressionRatio,
    CompressionProgress,
    CompressionSpaceSaving,
    TotalBlobCount,
    SnapshotCount,
}

impl RepoStatsMetric {
    pub const ALL: [RepoStatsMetric; 8] = [
        RepoStatsMetric::ExitCode,
        RepoStatsMetric::TotalSize,
        RepoStatsMetric::TotalUncompressedSize,
        RepoStatsMetric::CompressionRatio,
        RepoStatsMetric::CompressionProgress,
        RepoStatsMetric::CompressionSpaceSaving,
        RepoStatsMetric::TotalBlobCount,
        RepoStatsMetric::SnapshotCount,
    ];
}

impl MetricDef for RepoStatsMetric {
    fn name(self) -> &'static str {
        match self {
            RepoStatsMetric::ExitCode => "restic_stats_exit_code",
            RepoStatsMetric::TotalSize => "restic_stats_total_size_bytes",
            RepoStatsMetric::TotalUncompressedSize => "restic_stats_total_uncompressed_size_bytes",
            RepoStatsMetric::CompressionRatio => "restic_stats_compression_ratio",
            RepoStatsMetric::CompressionProgress => "restic_stats_compression_progress_percent",
            RepoStatsMetric::CompressionSpaceSaving => {
                "restic_stats_compression_space_saving_percent"
            }
            RepoStatsMetric::TotalBlobCount => "restic_stats_total_blob_count",
            RepoStatsMetric::SnapshotCount => "restic_stats_snapshots_count",
        }
    }

    fn help(self) -> &'static str {
        match self {
            RepoStatsMetric::ExitCode => {
                "Exit code of the stats command. See restic exit codes, except 1684 for json output parsing errors"
            }
            RepoStatsMetric::TotalSize => "Size of the repository data in bytes (packed)",
            RepoStatsMetric::TotalUncompressedSize => {
                "Size of the repository data in bytes before compression"
            }
            RepoStatsMetric::CompressionRatio => "Compression ratio of the repository data",
            RepoStatsMetric::CompressionProgress => {
                "Percentage of the repository data that is compressed"
            }
            RepoStatsMetric::CompressionSpaceSaving => {
                "Space saved by compression in percent"
            }
            RepoStatsMetric::TotalBlobCount => "Number of blobs in the repository",
            RepoStatsMetric::SnapshotCount => "Number of snapshots reported by restic stats",
        }
    }

    fn label_names(self) -> &'static [&'static str] {
        &[]
    }
}

static DESCRIPTORS: Lazy<Vec<Desc>> = Lazy::new(|| {
    RepoStatsMetric::ALL
        .iter()
        .map(|m| {
            build_desc(m.name(), m.help(), m.label_names())
                .expect("static repository stats metric definitions are valid")
        })
        .collect()
});

pub struct RepoStatsCollector {
    executable: String,
    invoker: Box<dyn CommandInvoker>,
    stats: Option<Arc<ScrapeStats>>,
}

impl RepoStatsCollector {
    pub fn new(executable: impl Into<String>, invoker: impl CommandInvoker + 'static) -> Self {
        Self {
            executable: executable.into(),
            invoker: Box::new(invoker),
            stats: None,
        }
    }

    pub fn with_stats(mut self, stats: Arc<ScrapeStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Runs one scrape and returns its samples together with the result kind.
    pub fn scrape(&self) -> (Vec<Sample<RepoStatsMetric>>, ScrapeResult) {
        let result = self.invoker.invoke(&self.executable, &STATS_ARGS);
        let exit_code = exit_code_of(&result);

        let output = match result {
            Ok(output) => output,
            Err(e) => {
                warn!("Repository stats failed (exit code {}): {}", exit_code, e);
                let sample = Sample::unlabeled(RepoStatsMetric::ExitCode, f64::from(exit_code));
                return (vec![sample], ScrapeResult::InvocationFailed);
            }
        };

        let stats = match parse_raw_data_stats(&output) {
            Ok(stats) => stats,
            Err(e) => {
                warn!("Failed to decode repository stats: {}", e);
                let sample = Sample::unlabeled(
                    RepoStatsMetric::ExitCode,
                    f64::from(PARSE_FAILURE_EXIT_CODE),
                );
                return (vec![sample], ScrapeResult::DecodeFailed);
            }
        };

        debug!(
            "Repository holds {} bytes in {} blobs",
            stats.total_size, stats.total_blob_count
        );

        let samples = vec![
            Sample::unlabeled(RepoStatsMetric::ExitCode, f64::from(exit_code)),
            Sample::unlabeled(RepoStatsMetric::TotalSize, stats.total_size as f64),
            Sample::unlabeled(
                RepoStatsMetric::TotalUncompressedSize,
                stats.total_uncompressed_size as f64,
            ),
            Sample::unlabeled(RepoStatsMetric::CompressionRatio, stats.compression_ratio),
            Sample::unlabeled(
                RepoStatsMetric::CompressionProgress,
                stats.compression_progress,
            ),
            Sample::unlabeled(
                RepoStatsMetric::CompressionSpaceSaving,
                stats.compression_space_saving,
            ),
            Sample::unlabeled(RepoStatsMetric::TotalBlobCount, stats.total_blob_count as f64),
            Sample::unlabeled(RepoStatsMetric::SnapshotCount, stats.snapshot_count as f64),
        ];
        (samples, ScrapeResult::Completed)
    }
}

impl std::fmt::Debug for RepoStatsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepoStatsCollector")
            .field("executable", &self.executable)
            .finish_non_exhaustive()
    }
}

impl Collector for RepoStatsCollector {
    fn desc(&self) -> Vec<&Desc> {
        DESCRIPTORS.iter().collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let start = Instant::now();
        let (samples, result) = self.scrape();

        if let Some(stats) = &self.stats {
            let exit_code = samples.first().map(|s| s.value as i32).unwrap_or_default();
            stats.record_scrape(result, exit_code, start.elapsed());
        }

        encode_samples(&samples)
    }
}
