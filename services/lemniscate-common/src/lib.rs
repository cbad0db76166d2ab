//! Lemniscate Common - Shared configuration, error types and logging for the
//! Lemniscate scanner.
//!
//! This crate provides:
//! - Configuration types and loading
//! - The unified error type used at the service surface
//! - Logging setup with noise filtering

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;

pub use config::{
    Config, MarketConfig, ObservabilityConfig, ProviderConfig, ScannerConfig, ServerConfig,
    StorageConfig,
};
pub use error::{Error, Result};
pub use logging::LogFormat;
