//! Structured logging initialization
//!
//! The binding layer only emits `tracing` events; installing a subscriber is
//! the embedding application's job. This module offers the default setup:
//! an [`EnvFilter`] plus JSON (production) or pretty (development) output.

use anyhow::{Context, Result};
use std::env;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Log format: JSON for production, pretty-print for development
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// trace/debug/info/warn/error
    pub log_level: String,
    pub format: LogFormat,
    /// Extra filter directives, comma-separated (e.g. `brrtbind::dispatcher=debug`)
    pub target_filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            format: LogFormat::Json,
            target_filter: None,
        }
    }
}

impl LogConfig {
    /// Parse configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            log_level: env::var("BRRTB_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: LogFormat::parse(
                &env::var("BRRTB_LOG_FORMAT").unwrap_or_else(|_| "json".to_string()),
            ),
            target_filter: env::var("BRRTB_LOG_TARGET_FILTER").ok(),
        }
    }

    /// Combined filter directive string handed to [`EnvFilter`].
    #[must_use]
    pub fn directives(&self) -> String {
        match &self.target_filter {
            Some(extra) if !extra.trim().is_empty() => format!("{},{}", self.log_level, extra),
            _ => self.log_level.clone(),
        }
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.directives())
        .with_context(|| format!("invalid log filter '{}'", config.directives()))?;

    let fmt_layer = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().with_target(true).boxed(),
    };

    Registry::default()
        .with(fmt_layer)
        .with(filter)
        .try_init()
        .context("failed to install tracing subscriber")?;
    Ok(())
}
