//! Restic Snapshot Exporter Library
//!
//! This library turns the output of `restic snapshots --json --group-by host,tags`
//! into Prometheus gauges. It is framework-agnostic: the collectors implement
//! [`prometheus::core::Collector`] and can be registered in any registry.
//!
//! # Features
//!
//! - **Snapshot Metrics**: Total and per-group snapshot counts plus the
//!   summary of the latest snapshot of every (hostname, tags) group
//! - **Exit Code Reporting**: Command failures and undecodable output are
//!   exported as a gauge instead of failing the scrape
//! - **Pluggable Invocation**: The restic command runs behind the
//!   [`CommandInvoker`] trait, so tests can inject canned output
//! - **Repository Stats**: Optional raw-data statistics collector
//!
//! # Usage
//!
//! ```rust
//! use prometheus::{Encoder, Registry, TextEncoder};
//! use restic_exporter::{InvokeError, SnapshotCollector};
//!
//! let invoker = |_: &str, _: &[&str]| -> Result<Vec<u8>, InvokeError> {
//!     Ok(br#"[{"group_key":{"hostname":"h1","tags":["db"]},
//!             "snapshots":[{"time":"2025-10-08T05:23:10+02:00"}]}]"#.to_vec())
//! };
//!
//! let registry = Registry::new();
//! registry
//!     .register(Box::new(SnapshotCollector::new("restic", invoker)))
//!     .unwrap();
//!
//! let mut buffer = Vec::new();
//! TextEncoder::new()
//!     .encode(&registry.gather(), &mut buffer)
//!     .unwrap();
//! let text = String::from_utf8(buffer).unwrap();
//! assert!(text.contains("restic_snapshot_count_total 1"));
//! ```

pub mod aggregate;
pub mod collector;
pub mod descriptors;
pub mod exposition;
pub mod invoker;
pub mod repo_stats;
pub mod scrape_stats;
pub mod snapshot;

// Re-export main types for convenience
pub use aggregate::{AggregateError, SnapshotMetrics};
pub use collector::{CollectError, Scrape, ScrapeOutcome, SnapshotCollector};
pub use descriptors::{SnapshotMetric, PARSE_FAILURE_EXIT_CODE};
pub use invoker::{CommandInvoker, InvokeError, SystemInvoker, NO_EXIT_CODE};
pub use repo_stats::{RawDataStats, RepoStatsCollector};
pub use scrape_stats::{ScrapeResult, ScrapeStats};
pub use snapshot::{GroupData, GroupKey, ParseError, Snapshot, Summary};
