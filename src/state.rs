//! Application state management for the exporter.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers.

use prometheus::{Encoder, Gauge, Registry, TextEncoder};
use restic_exporter::{
    CommandInvoker, RepoStatsCollector, ScrapeStats, SnapshotCollector, SystemInvoker,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::config::Config;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Exporter self-metrics, kept in their own registry so they can be updated
/// after the restic collectors have been gathered.
pub struct Telemetry {
    pub registry: Registry,
    pub scrape_duration: Gauge,
    pub scrapes_total: Gauge,
    pub internal_errors_total: Gauge,
}

impl Telemetry {
    fn new() -> prometheus::Result<Self> {
        let telemetry = Self {
            registry: Registry::new(),
            scrape_duration: Gauge::new(
                "restic_exporter_scrape_duration_seconds",
                "Duration of the last restic metrics collection in seconds",
            )?,
            scrapes_total: Gauge::new(
                "restic_exporter_scrapes_total",
                "Number of snapshot listings since start",
            )?,
            internal_errors_total: Gauge::new(
                "restic_exporter_internal_errors_total",
                "Number of scrapes aborted by an internal error",
            )?,
        };
        let registry = &telemetry.registry;
        registry.register(Box::new(telemetry.scrape_duration.clone()))?;
        registry.register(Box::new(telemetry.scrapes_total.clone()))?;
        registry.register(Box::new(telemetry.internal_errors_total.clone()))?;
        Ok(telemetry)
    }

    /// Copies the scrape counters into the gauges.
    pub fn update(&self, stats: &ScrapeStats, duration_seconds: f64) {
        self.scrape_duration.set(duration_seconds);
        self.scrapes_total
            .set(stats.scrapes_total.load(Ordering::Relaxed) as f64);
        self.internal_errors_total
            .set(stats.internal_errors.load(Ordering::Relaxed) as f64);
    }
}

/// Global application state shared across requests.
pub struct AppState {
    pub registry: Registry,
    pub config: Arc<Config>,
    /// Outcomes of the snapshot listing; drives `/health`.
    pub scrape_stats: Arc<ScrapeStats>,
    /// Outcomes of `restic stats`, kept apart from the snapshot listing.
    pub repo_stats: Option<Arc<ScrapeStats>>,
    /// Present when telemetry is enabled.
    pub telemetry: Option<Telemetry>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Builds the registry with the snapshot collector and, depending on the
    /// configuration, the repository stats collector and telemetry gauges.
    pub fn new(config: Config) -> prometheus::Result<Self> {
        let timeout = config.effective_command_timeout();
        Self::with_invokers(config, SystemInvoker::new(timeout), SystemInvoker::new(timeout))
    }

    /// Same as [`AppState::new`] with the invokers of both collectors supplied.
    pub fn with_invokers(
        config: Config,
        snapshots_invoker: impl CommandInvoker + 'static,
        repo_stats_invoker: impl CommandInvoker + 'static,
    ) -> prometheus::Result<Self> {
        let registry = Registry::new();
        let scrape_stats = Arc::new(ScrapeStats::new());
        let binary = config.effective_restic_binary().to_string();

        let snapshots = SnapshotCollector::new(binary.clone(), snapshots_invoker)
            .with_stats(Arc::clone(&scrape_stats));
        registry.register(Box::new(snapshots))?;

        let repo_stats = if config.enable_repo_stats.unwrap_or(false) {
            let stats = Arc::new(ScrapeStats::new());
            let collector = RepoStatsCollector::new(binary, repo_stats_invoker)
                .with_stats(Arc::clone(&stats));
            registry.register(Box::new(collector))?;
            info!("Repository stats collector enabled");
            Some(stats)
        } else {
            None
        };

        let telemetry = if config.enable_telemetry.unwrap_or(true) {
            Some(Telemetry::new()?)
        } else {
            None
        };

        Ok(Self {
            registry,
            config: Arc::new(config),
            scrape_stats,
            repo_stats,
            telemetry,
            start_time: Instant::now(),
        })
    }

    /// Gathers every collector and renders the Prometheus text exposition.
    ///
    /// Blocks for as long as restic runs.
    pub fn render_metrics(&self) -> prometheus::Result<String> {
        let start = Instant::now();
        let mut families = self.registry.gather();

        if let Some(telemetry) = &self.telemetry {
            telemetry.update(&self.scrape_stats, start.elapsed().as_secs_f64());
            families.extend(telemetry.registry.gather());
        }

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
