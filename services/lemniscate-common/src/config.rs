//! Configuration management for the Lemniscate scanner.
//!
//! The scanner reads a single configuration file at `~/.lemniscate/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (LEMNISCATE_* prefix)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `LEMNISCATE_HOST` → server.host
//! - `LEMNISCATE_PORT` → server.port
//! - `LEMNISCATE_LOG_LEVEL` → observability.log_level
//! - `LEMNISCATE_LOG_FORMAT` → observability.log_format
//! - `LEMNISCATE_DB_PATH` → storage.db_path
//! - `LEMNISCATE_UNIVERSE` → scanner.universe (comma separated)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::logging::LogFormat;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".lemniscate"),
        |dirs| dirs.home_dir().join(".lemniscate"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Result store location
    #[serde(default)]
    pub storage: StorageConfig,

    /// Market conventions (ticker suffix, week boundary offset)
    #[serde(default)]
    pub market: MarketConfig,

    /// Universe scan settings
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// Upstream market data provider
    #[serde(default)]
    pub provider: ProviderConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides applied.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("LEMNISCATE_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("LEMNISCATE_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Ok(level) = std::env::var("LEMNISCATE_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Ok(format) = std::env::var("LEMNISCATE_LOG_FORMAT") {
            self.observability.log_format = format;
        }
        if let Ok(path) = std::env::var("LEMNISCATE_DB_PATH") {
            self.storage.db_path = PathBuf::from(path);
        }
        if let Ok(universe) = std::env::var("LEMNISCATE_UNIVERSE") {
            self.scanner.universe = parse_universe(&universe);
        }
    }

    /// Reject configurations the scanner cannot run with.
    pub fn validate(&self) -> std::result::Result<(), Error> {
        if self.scanner.universe.iter().all(|t| t.trim().is_empty()) {
            return Err(Error::Config("scanner.universe must not be empty".into()));
        }
        if self.scanner.concurrency == 0 {
            return Err(Error::Config("scanner.concurrency must be at least 1".into()));
        }
        if self.scanner.lookback_bars < 50 {
            return Err(Error::Config(format!(
                "scanner.lookback_bars must be at least 50, got {}",
                self.scanner.lookback_bars
            )));
        }
        if self.scanner.snapshot_size == 0 {
            return Err(Error::Config("scanner.snapshot_size must be at least 1".into()));
        }
        if self.scanner.requests_per_minute == 0 {
            return Err(Error::Config(
                "scanner.requests_per_minute must be at least 1".into(),
            ));
        }
        if !self.market.ticker_suffix.starts_with('.') || self.market.ticker_suffix.len() < 2 {
            return Err(Error::Config(format!(
                "market.ticker_suffix must look like \".IS\", got {:?}",
                self.market.ticker_suffix
            )));
        }
        if !(-12..=14).contains(&self.market.utc_offset_hours) {
            return Err(Error::Config(format!(
                "market.utc_offset_hours out of range: {}",
                self.market.utc_offset_hours
            )));
        }
        self.observability
            .log_format
            .parse::<LogFormat>()
            .map(|_| ())
            .map_err(Error::Config)
    }
}

/// Split a comma separated ticker list, dropping blanks.
fn parse_universe(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

// ============================================================================
// Sections
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets pinned to `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

/// Result store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Market conventions shared by the write and read paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Exchange suffix appended during canonicalization (e.g. ".IS")
    #[serde(default = "default_ticker_suffix")]
    pub ticker_suffix: String,

    /// Fixed UTC offset of the exchange, used to assign scans to ISO weeks
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            ticker_suffix: default_ticker_suffix(),
            utc_offset_hours: default_utc_offset_hours(),
        }
    }
}

/// Universe scan configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Tickers to scan, raw or canonical
    #[serde(default = "default_universe")]
    pub universe: Vec<String>,

    /// Trailing daily bars requested per ticker
    #[serde(default = "default_lookback_bars")]
    pub lookback_bars: usize,

    /// Maximum tickers fetched concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-ticker fetch timeout in seconds
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Provider request budget shared by scans and price refreshes
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    /// Scores at or above this value are tiered "High"
    #[serde(default = "default_high_tier_threshold")]
    pub high_tier_threshold: f64,

    /// Number of leaders frozen into the weekly snapshot
    #[serde(default = "default_snapshot_size")]
    pub snapshot_size: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            universe: default_universe(),
            lookback_bars: default_lookback_bars(),
            concurrency: default_concurrency(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            requests_per_minute: default_requests_per_minute(),
            high_tier_threshold: default_high_tier_threshold(),
            snapshot_size: default_snapshot_size(),
        }
    }
}

/// Upstream market data provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the chart API
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,

    /// HTTP client timeout in seconds
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_base_url(),
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

// ============================================================================
// Defaults
// ============================================================================

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    4460
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}
fn default_db_path() -> PathBuf {
    config_dir().join("scores.db")
}
fn default_ticker_suffix() -> String {
    ".IS".to_string()
}
fn default_utc_offset_hours() -> i32 {
    3
}
fn default_universe() -> Vec<String> {
    [
        "AKBNK", "ASELS", "BIMAS", "EREGL", "FROTO", "GARAN", "ISCTR", "KCHOL", "PGSUS",
        "SAHOL", "SISE", "TCELL", "THYAO", "TUPRS", "YKBNK",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_lookback_bars() -> usize {
    150
}
fn default_concurrency() -> usize {
    8
}
fn default_fetch_timeout_secs() -> u64 {
    15
}
fn default_requests_per_minute() -> u32 {
    120
}
fn default_high_tier_threshold() -> f64 {
    5.5
}
fn default_snapshot_size() -> usize {
    10
}
fn default_provider_base_url() -> String {
    "https://query1.finance.yahoo.com".to_string()
}
fn default_provider_timeout_secs() -> u64 {
    20
}
