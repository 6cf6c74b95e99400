//! Health check endpoint handler.
//!
//! This module provides the `/health` endpoint handler that returns
//! exporter health and scrape statistics.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use restic_exporter::ScrapeStats;
use tracing::{debug, instrument};

use crate::state::SharedState;

// Time conversion constants
const SECONDS_PER_HOUR: f64 = 3600.0;
const MINUTES_PER_HOUR: f64 = 60.0;
const HOURS_PER_DAY: f64 = 24.0;

/// Footer text for human-readable HTTP endpoints.
pub const FOOTER_TEXT: &str = "restic-exporter - restic exit codes: https://restic.readthedocs.io/en/stable/075_scripting.html#exit-codes";

/// Status of the snapshot listing: 200 until a scrape has run, afterwards
/// 503 while the latest scrape did not complete.
pub fn listing_status(stats: &ScrapeStats) -> (StatusCode, &'static str) {
    let scraped = stats
        .last_scrape_time
        .read()
        .map(|t| t.is_some())
        .unwrap_or(false);

    if !scraped {
        (StatusCode::OK, "OK - No scrape yet")
    } else if stats.is_healthy() {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Last scrape failed")
    }
}

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");

    let stats = &state.scrape_stats;
    let (status, message) = listing_status(stats);

    let uptime_hours = stats.get_uptime_seconds() as f64 / SECONDS_PER_HOUR;
    let uptime_str = if uptime_hours < 1.0 {
        format!("{:.1} minutes", uptime_hours * MINUTES_PER_HOUR)
    } else if uptime_hours < HOURS_PER_DAY {
        format!("{:.1} hours", uptime_hours)
    } else {
        format!("{:.1} days", uptime_hours / HOURS_PER_DAY)
    };

    let mut body = format!(
        "{message}\n\nUptime: {uptime_str}\n\nSNAPSHOT LISTING\n{}",
        stats.render_table()
    );
    if let Some(repo_stats) = &state.repo_stats {
        body.push_str("\nREPOSITORY STATS (not part of the health status)\n");
        body.push_str(&repo_stats.render_table());
    }
    body.push('\n');
    body.push_str(FOOTER_TEXT);

    debug!("Health check: {} - {}", status, message);
    (
        status,
        [("Content-Type", "text/plain; charset=utf-8")],
        body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use restic_exporter::ScrapeResult;
    use std::time::Duration;

    #[test]
    fn test_listing_status() {
        let stats = ScrapeStats::new();
        assert_eq!(listing_status(&stats).0, StatusCode::OK);

        stats.record_scrape(ScrapeResult::InvocationFailed, 10, Duration::from_millis(5));
        assert_eq!(listing_status(&stats).0, StatusCode::SERVICE_UNAVAILABLE);

        stats.record_scrape(ScrapeResult::Completed, 0, Duration::from_millis(5));
        assert_eq!(listing_status(&stats), (StatusCode::OK, "OK"));
    }
}
