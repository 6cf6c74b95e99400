//! Landing page listing the exporter's endpoints.

use axum::{
    extract::State,
    response::{Html, IntoResponse},
};
use tracing::{debug, instrument};

use crate::handlers::health::FOOTER_TEXT;
use crate::state::SharedState;

const PAGE_STYLE: &str = "body { font-family: sans-serif; max-width: 720px; margin: 2em auto; color: #222; }
dt { font-family: monospace; font-weight: bold; margin-top: 1em; }
dd { margin-left: 1.5em; color: #555; }
footer { margin-top: 3em; font-size: 0.85em; color: #777; }";

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing / request");

    let uptime = state.start_time.elapsed().as_secs();
    let uptime_str = format!(
        "{}h {}m {}s",
        uptime / 3600,
        (uptime % 3600) / 60,
        uptime % 60
    );

    let mut endpoints = vec![(
        "/metrics",
        "Snapshot metrics in Prometheus text format. Runs restic on every request.",
    )];
    if state.config.enable_health.unwrap_or(true) {
        endpoints.push(("/health", "Scrape statistics, 503 while the last scrape failed"));
    }
    endpoints.push(("/config", "Effective configuration (read-only)"));

    let items: String = endpoints
        .iter()
        .map(|(path, desc)| format!("<dt><a href=\"{path}\">{path}</a></dt><dd>{desc}</dd>\n"))
        .collect();

    let html = format!(
        "<!DOCTYPE html>
<html lang=\"en\">
<head>
<meta charset=\"UTF-8\">
<title>Restic Exporter</title>
<style>{style}</style>
</head>
<body>
<h1>Restic Exporter</h1>
<p>Version {version}, up {uptime}, restic binary <code>{binary}</code></p>
<dl>
{items}</dl>
<footer>{footer}</footer>
</body>
</html>",
        style = PAGE_STYLE,
        version = env!("CARGO_PKG_VERSION"),
        uptime = uptime_str,
        binary = state.config.effective_restic_binary(),
        items = items,
        footer = FOOTER_TEXT
    );

    Html(html)
}
