//! # Configuration Module
//!
//! Runtime configuration for the binding layer, loaded from an optional YAML
//! file and then overridden by environment variables.
//!
//! ## YAML
//!
//! ```yaml
//! validate_output: true
//! square_brackets: true
//! auth_backends: [session, token]
//! token_validity_days: 4
//! ```
//!
//! ## Environment Variables
//!
//! ### `BRRTB_VALIDATE_OUTPUT`
//!
//! Default for endpoints that do not set `validate_output` explicitly.
//! Accepts `true/false/1/0`. Default: `true`.
//!
//! ### `BRRTB_SQUARE_BRACKETS`
//!
//! Enables `name[]` / `name[key]` expansion of query, form and file keys.
//! Default: `true`.
//!
//! ### `BRRTB_AUTH_BACKENDS`
//!
//! Comma-separated, ordered list of backend names tried for endpoints that
//! require authentication without naming their own backends.
//! Default: `session,token`.
//!
//! ### `BRRTB_TOKEN_VALIDITY_DAYS`
//!
//! Lifetime of tokens issued by the in-memory token store. Default: `4`.
//!
//! ## Usage
//!
//! ```rust
//! use brrtbind::config::BindConfig;
//!
//! let config = BindConfig::from_yaml_str("validate_output: false").unwrap();
//! assert!(!config.validate_output);
//! assert_eq!(config.auth_backends, vec!["session", "token"]);
//! ```

use crate::error::ConfigError;
use serde::Deserialize;
use std::env;
use std::path::Path;
use tracing::{debug, warn};

fn default_true() -> bool {
    true
}

fn default_backends() -> Vec<String> {
    vec!["session".to_string(), "token".to_string()]
}

fn default_validity() -> u32 {
    4
}

/// Binding-layer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BindConfig {
    /// Validate handler output against the declared return type
    #[serde(default = "default_true")]
    pub validate_output: bool,
    /// Expand bracket-suffixed keys into nested maps/lists
    #[serde(default = "default_true")]
    pub square_brackets: bool,
    /// Ordered default authentication backends
    #[serde(default = "default_backends")]
    pub auth_backends: Vec<String>,
    /// Days before an issued token expires
    #[serde(default = "default_validity")]
    pub token_validity_days: u32,
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            validate_output: true,
            square_brackets: true,
            auth_backends: default_backends(),
            token_validity_days: default_validity(),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl BindConfig {
    /// Defaults overridden by the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_with(|key| env::var(key).ok());
        config
    }

    /// Parse a YAML document. Missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read a YAML file, then apply environment overrides.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::ConfigIo {
                path: path.to_path_buf(),
                source,
            })?;
        let mut config = Self::from_yaml_str(&contents)?;
        config.apply_env_with(|key| env::var(key).ok());
        debug!(path = %path.display(), ?config, "Binding configuration loaded");
        Ok(config)
    }

    /// Apply `BRRTB_*` overrides read through `lookup`.
    ///
    /// Unparseable values are ignored with a warning.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("BRRTB_VALIDATE_OUTPUT") {
            match parse_bool(&raw) {
                Some(v) => self.validate_output = v,
                None => warn!(value = %raw, "Ignoring invalid BRRTB_VALIDATE_OUTPUT"),
            }
        }
        if let Some(raw) = lookup("BRRTB_SQUARE_BRACKETS") {
            match parse_bool(&raw) {
                Some(v) => self.square_brackets = v,
                None => warn!(value = %raw, "Ignoring invalid BRRTB_SQUARE_BRACKETS"),
            }
        }
        if let Some(raw) = lookup("BRRTB_AUTH_BACKENDS") {
            self.auth_backends = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(raw) = lookup("BRRTB_TOKEN_VALIDITY_DAYS") {
            match raw.trim().parse() {
                Ok(days) => self.token_validity_days = days,
                Err(_) => warn!(value = %raw, "Ignoring invalid BRRTB_TOKEN_VALIDITY_DAYS"),
            }
        }
    }
}
