//! Startup requirement validation for restic-exporter.
//!
//! This module validates that the exporter has everything restic needs
//! before starting the HTTP server.

use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::config::ENV_REPOSITORY;

/// Validate all runtime requirements
pub fn validate_requirements(restic_binary: &str) -> Result<(), ValidationError> {
    info!("🔍 Validating runtime requirements...");

    check_env_value(ENV_REPOSITORY, std::env::var(ENV_REPOSITORY).ok().as_deref())?;
    info!("✅ {} is set", ENV_REPOSITORY);

    check_executable(restic_binary);

    info!("✅ All runtime requirements validated");
    Ok(())
}

/// Fails if a required environment variable is unset or empty.
pub fn check_env_value(name: &str, value: Option<&str>) -> Result<(), ValidationError> {
    match value {
        None => {
            error!("❌ Environment variable {} is not set", name);
            Err(ValidationError::MissingEnv(name.to_string()))
        }
        Some("") => {
            error!("❌ Environment variable {} is empty", name);
            Err(ValidationError::EmptyEnv(name.to_string()))
        }
        Some(_) => Ok(()),
    }
}

/// Resolves the restic executable on PATH. Not fatal: a failing lookup
/// shows up as an exit code on every scrape.
pub fn check_executable(restic_binary: &str) -> Option<PathBuf> {
    match which::which(restic_binary) {
        Ok(path) => {
            info!("✅ restic executable: {}", path.display());
            Some(path)
        }
        Err(e) => {
            warn!("⚠️  Cannot resolve restic executable '{}': {}", restic_binary, e);
            warn!("   Scrapes will report exit code -1 until it is installed");
            None
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Environment variable {0} is not set")]
    MissingEnv(String),

    #[error("Environment variable {0} is empty")]
    EmptyEnv(String),
}
