//! Configuration display endpoint handler.
//!
//! This module provides the `/config` endpoint handler that displays
//! the current exporter configuration.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::fmt::Write as FmtWrite;
use tracing::{debug, instrument};

use crate::config::ENV_REPOSITORY;
use crate::handlers::health::FOOTER_TEXT;
use crate::state::SharedState;

/// Handler for the /config endpoint.
#[instrument(skip(state))]
pub async fn config_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /config request");

    let cfg = &state.config;
    let mut out = String::new();

    writeln!(out, "RESTIC EXPORTER - CONFIGURATION").ok();
    writeln!(out, "===============================").ok();
    writeln!(out).ok();

    writeln!(out, "SERVER CONFIGURATION").ok();
    writeln!(out, "--------------------").ok();
    writeln!(out, "bind:                       {}", cfg.effective_bind()).ok();
    writeln!(out, "port:                       {}", cfg.effective_port()).ok();
    writeln!(out).ok();

    writeln!(out, "RESTIC").ok();
    writeln!(out, "------").ok();
    writeln!(
        out,
        "restic_binary:              {}",
        cfg.effective_restic_binary()
    )
    .ok();
    writeln!(
        out,
        "command_timeout_secs:       {}",
        cfg.effective_command_timeout().as_secs()
    )
    .ok();
    // The repository may embed credentials, only report whether it is set.
    let repository_set = std::env::var(ENV_REPOSITORY).is_ok_and(|v| !v.is_empty());
    writeln!(
        out,
        "{:28}{}",
        format!("{}:", ENV_REPOSITORY.to_lowercase()),
        if repository_set { "set" } else { "unset" }
    )
    .ok();
    writeln!(out).ok();

    writeln!(out, "FEATURE FLAGS").ok();
    writeln!(out, "-------------").ok();
    writeln!(
        out,
        "enable_health:              {}",
        cfg.enable_health.unwrap_or(true)
    )
    .ok();
    writeln!(
        out,
        "enable_telemetry:           {}",
        cfg.enable_telemetry.unwrap_or(true)
    )
    .ok();
    writeln!(
        out,
        "enable_repo_stats:          {}",
        cfg.enable_repo_stats.unwrap_or(false)
    )
    .ok();
    writeln!(out).ok();

    writeln!(out, "LOGGING").ok();
    writeln!(out, "-------").ok();
    writeln!(
        out,
        "log_level:                  {}",
        cfg.log_level.as_deref().unwrap_or("info")
    )
    .ok();
    writeln!(out).ok();
    writeln!(out, "{}", FOOTER_TEXT).ok();

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        out,
    )
}
