//! Configuration management for restic-exporter.
//!
//! This module handles loading, merging, and validating configuration from files,
//! environment variables and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat};
use restic_exporter::collector::DEFAULT_RESTIC_BINARY;
use restic_exporter::invoker::DEFAULT_COMMAND_TIMEOUT;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 2112;

/// Overrides the restic executable (between CLI flag and config file).
pub const ENV_EXECUTABLE_PATH: &str = "RESTIC_EXECUTABLE_PATH";
/// Repository location, read by restic itself. Required at startup.
pub const ENV_REPOSITORY: &str = "RESTIC_REPOSITORY";

/// Accepted values of `log_level`.
pub const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

const DEFAULT_CONFIG_PATHS: [&str; 6] = [
    "/etc/restic-exporter/config.yaml",
    "/etc/restic-exporter/config.yml",
    "/etc/restic-exporter/config.json",
    "./restic-exporter.yaml",
    "./restic-exporter.yml",
    "./restic-exporter.json",
];

/// Exporter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // restic invocation
    #[serde(alias = "restic-binary")]
    pub restic_binary: Option<String>,
    #[serde(alias = "command-timeout-secs")]
    pub command_timeout_secs: Option<u64>,

    // Feature flags
    pub enable_health: Option<bool>,
    pub enable_telemetry: Option<bool>,
    #[serde(alias = "enable-repo-stats")]
    pub enable_repo_stats: Option<bool>,

    // Logging
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            port: Some(DEFAULT_PORT),
            restic_binary: Some(DEFAULT_RESTIC_BINARY.to_string()),
            command_timeout_secs: Some(DEFAULT_COMMAND_TIMEOUT.as_secs()),
            enable_health: Some(true),
            enable_telemetry: Some(true),
            enable_repo_stats: Some(false),
            log_level: Some("info".into()),
        }
    }
}

impl Config {
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    pub fn effective_bind(&self) -> &str {
        self.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR)
    }

    pub fn effective_restic_binary(&self) -> &str {
        self.restic_binary.as_deref().unwrap_or(DEFAULT_RESTIC_BINARY)
    }

    pub fn effective_command_timeout(&self) -> Duration {
        self.command_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_COMMAND_TIMEOUT)
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if cfg.command_timeout_secs == Some(0) {
        return Err("command_timeout_secs must be greater than 0".into());
    }

    if cfg
        .restic_binary
        .as_deref()
        .is_some_and(|b| b.trim().is_empty())
    {
        return Err("restic_binary must not be empty".into());
    }

    if let Some(level) = cfg.log_level.as_deref() {
        if !LOG_LEVELS.contains(&level) {
            return Err(format!(
                "Invalid log_level '{}', expected one of {}",
                level,
                LOG_LEVELS.join(", ")
            )
            .into());
        }
    }

    if let Some(bind) = cfg.bind.as_deref() {
        if bind.parse::<std::net::IpAddr>().is_err() {
            return Err(format!("Invalid bind address '{}'", bind).into());
        }
    }

    Ok(())
}

/// Resolves configuration from CLI args, environment, config file, and defaults.
/// This enforces precedence: CLI (if provided) > environment > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    resolve_config_with_env(args, |key| std::env::var(key).ok())
}

/// Same as [`resolve_config`] with an injectable environment lookup.
pub fn resolve_config_with_env<F>(args: &Args, env: F) -> Result<Config, Box<dyn std::error::Error>>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref().and_then(|p| p.to_str()))?
    };

    // Environment overrides the file
    if let Some(path) = env(ENV_EXECUTABLE_PATH).filter(|p| !p.is_empty()) {
        config.restic_binary = Some(path);
    }

    // Override with CLI args
    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }

    // Only override port if the user supplied it on the CLI.
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }

    if let Some(binary) = &args.restic_binary {
        config.restic_binary = Some(binary.clone());
    }
    if let Some(timeout) = args.command_timeout {
        config.command_timeout_secs = Some(timeout);
    }
    if let Some(level) = &args.log_level {
        config.log_level = Some(level.as_str().to_string());
    }

    // Feature flags
    if args.enable_repo_stats {
        config.enable_repo_stats = Some(true);
    }
    if args.disable_health {
        config.enable_health = Some(false);
    }
    if args.disable_telemetry {
        config.enable_telemetry = Some(false);
    }

    Ok(config)
}

/// Configuration loading with multiple format support
pub fn load_config(path: Option<&str>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = if let Some(p) = path {
        PathBuf::from(p)
    } else {
        DEFAULT_CONFIG_PATHS
            .iter()
            .find(|p| Path::new(p).exists())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(""))
    };

    if !path.exists() || path.to_string_lossy().is_empty() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&path)?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Renders configuration in the requested format
pub fn render_config(
    config: &Config,
    format: &ConfigFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };
    Ok(output)
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_config(config, &format)?);
    Ok(())
}
