//! Resolver configuration.
//!
//! Every recursion the resolver performs is bounded by a limit from
//! [`ResolveConfig`]. Configuration can be set programmatically, parsed from
//! TOML, or loaded from environment variables.
//!
//! # Environment Variables
//!
//! All environment variables use the `RSRESOLVE_` prefix:
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `RSRESOLVE_MAX_AUTODEREF_STEPS` | Longest autoderef chain explored | 32 |
//! | `RSRESOLVE_MAX_SELECTION_DEPTH` | Nesting limit for where-clause evaluation | 64 |
//! | `RSRESOLVE_MAX_NORMALIZE_DEPTH` | Nesting limit for projection normalization | 32 |
//! | `RSRESOLVE_MAX_ELABORATED_PREDICATES` | Cap on predicates derived from one scope | 512 |
//! | `RSRESOLVE_INTEGER_FALLBACK` | Fall back to `i32`/`f64` on retry ("true"/"false") | true |
//! | `RSRESOLVE_LOG_LEVEL` | Log level (off/error/warn/info/debug/trace) | warn |
//!
//! # Example
//!
//! ```rust
//! use rsresolve::config::ResolveConfig;
//!
//! let config = ResolveConfig::builder()
//!     .max_autoderef_steps(8)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.max_autoderef_steps, 8);
//!
//! let from_toml = ResolveConfig::from_toml_str("max_selection_depth = 16").unwrap();
//! assert_eq!(from_toml.max_selection_depth, 16);
//! ```

use std::env;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;

/// Log level hint for embedders wiring up a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// No logging.
    Off,
    /// Error messages only.
    Error,
    /// Warnings and errors (default).
    #[default]
    Warn,
    /// Informational messages.
    Info,
    /// Debug messages.
    Debug,
    /// Trace-level messages.
    Trace,
}

impl LogLevel {
    /// Parse a log level from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "off" | "none" | "0" => Some(LogLevel::Off),
            "error" | "err" | "1" => Some(LogLevel::Error),
            "warn" | "warning" | "2" => Some(LogLevel::Warn),
            "info" | "3" => Some(LogLevel::Info),
            "debug" | "4" => Some(LogLevel::Debug),
            "trace" | "5" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// The matching `tracing` level, or `None` for [`LogLevel::Off`].
    pub fn to_tracing(self) -> Option<tracing::Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(tracing::Level::ERROR),
            LogLevel::Warn => Some(tracing::Level::WARN),
            LogLevel::Info => Some(tracing::Level::INFO),
            LogLevel::Debug => Some(tracing::Level::DEBUG),
            LogLevel::Trace => Some(tracing::Level::TRACE),
        }
    }
}

/// Limits and policies for one resolution session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolveConfig {
    /// Longest autoderef chain explored before giving up.
    /// Default: 32.
    pub max_autoderef_steps: usize,

    /// How deeply where-clause evaluation may nest.
    /// Default: 64.
    pub max_selection_depth: usize,

    /// How many projections may be normalized inside one another.
    /// Default: 32.
    pub max_normalize_depth: usize,

    /// Cap on predicates derived from a scope through supertraits and
    /// associated type bounds.
    /// Default: 512.
    pub max_elaborated_predicates: usize,

    /// Whether a deferred call's retry binds unconstrained literal
    /// variables to `i32` / `f64` first.
    /// Default: true.
    pub integer_fallback: bool,

    /// Log level hint.
    /// Default: Warn.
    pub log_level: LogLevel,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            max_autoderef_steps: 32,
            max_selection_depth: 64,
            max_normalize_depth: 32,
            max_elaborated_predicates: 512,
            integer_fallback: true,
            log_level: LogLevel::default(),
        }
    }
}

impl ResolveConfig {
    /// Create a new builder for ResolveConfig.
    pub fn builder() -> ResolveConfigBuilder {
        ResolveConfigBuilder::new()
    }

    /// Load configuration from environment variables.
    ///
    /// Unset variables keep their defaults. Invalid values are logged as
    /// warnings and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        let usize_var = |name: &str| -> Option<usize> {
            let raw = lookup(name)?;
            match raw.trim().parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(var = name, value = %raw, "ignoring invalid environment value");
                    None
                }
            }
        };

        if let Some(val) = usize_var("RSRESOLVE_MAX_AUTODEREF_STEPS") {
            config.max_autoderef_steps = val;
        }
        if let Some(val) = usize_var("RSRESOLVE_MAX_SELECTION_DEPTH") {
            config.max_selection_depth = val;
        }
        if let Some(val) = usize_var("RSRESOLVE_MAX_NORMALIZE_DEPTH") {
            config.max_normalize_depth = val;
        }
        if let Some(val) = usize_var("RSRESOLVE_MAX_ELABORATED_PREDICATES") {
            config.max_elaborated_predicates = val;
        }
        if let Some(raw) = lookup("RSRESOLVE_INTEGER_FALLBACK") {
            match parse_bool(&raw) {
                Some(val) => config.integer_fallback = val,
                None => warn!(var = "RSRESOLVE_INTEGER_FALLBACK", value = %raw, "ignoring invalid environment value"),
            }
        }
        if let Some(raw) = lookup("RSRESOLVE_LOG_LEVEL") {
            match LogLevel::parse(&raw) {
                Some(level) => config.log_level = level,
                None => warn!(var = "RSRESOLVE_LOG_LEVEL", value = %raw, "ignoring invalid environment value"),
            }
        }

        config
    }

    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: ResolveConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration and return any errors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_autoderef_steps == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_autoderef_steps".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.max_selection_depth == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_selection_depth".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.max_normalize_depth == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_normalize_depth".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Builder for ResolveConfig.
#[derive(Debug, Clone, Default)]
pub struct ResolveConfigBuilder {
    config: ResolveConfig,
}

impl ResolveConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_autoderef_steps(mut self, steps: usize) -> Self {
        self.config.max_autoderef_steps = steps;
        self
    }

    pub fn max_selection_depth(mut self, depth: usize) -> Self {
        self.config.max_selection_depth = depth;
        self
    }

    pub fn max_normalize_depth(mut self, depth: usize) -> Self {
        self.config.max_normalize_depth = depth;
        self
    }

    pub fn max_elaborated_predicates(mut self, count: usize) -> Self {
        self.config.max_elaborated_predicates = count;
        self
    }

    pub fn integer_fallback(mut self, enabled: bool) -> Self {
        self.config.integer_fallback = enabled;
        self
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.log_level = level;
        self
    }

    /// Build the configuration, validating it first.
    pub fn build(self) -> Result<ResolveConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = ResolveConfig::default();
        assert_eq!(config.max_autoderef_steps, 32);
        assert_eq!(config.max_selection_depth, 64);
        assert!(config.integer_fallback);
        assert_eq!(config.log_level, LogLevel::Warn);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ResolveConfig::builder()
            .max_autoderef_steps(4)
            .integer_fallback(false)
            .log_level(LogLevel::Trace)
            .build()
            .unwrap();
        assert_eq!(config.max_autoderef_steps, 4);
        assert!(!config.integer_fallback);
        assert_eq!(config.log_level.to_tracing(), Some(tracing::Level::TRACE));
    }

    #[test]
    fn test_builder_validation() {
        assert!(ResolveConfig::builder().max_selection_depth(0).build().is_err());
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("RSRESOLVE_MAX_AUTODEREF_STEPS", "7"),
            ("RSRESOLVE_INTEGER_FALLBACK", "off"),
            ("RSRESOLVE_LOG_LEVEL", "debug"),
            ("RSRESOLVE_MAX_SELECTION_DEPTH", "lots"),
        ]
        .into_iter()
        .collect();
        let config = ResolveConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(config.max_autoderef_steps, 7);
        assert!(!config.integer_fallback);
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.max_selection_depth, 64);
    }

    #[test]
    fn test_from_toml() {
        let config = ResolveConfig::from_toml_str(
            r#"
            max_autoderef_steps = 10
            log_level = "info"
            "#,
        )
        .unwrap();
        assert_eq!(config.max_autoderef_steps, 10);
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.max_normalize_depth, 32);
    }

    #[test]
    fn test_from_toml_rejects_unknown_keys_and_zero_limits() {
        assert!(matches!(
            ResolveConfig::from_toml_str("max_depth = 3"),
            Err(ConfigError::ParseError(_))
        ));
        assert!(matches!(
            ResolveConfig::from_toml_str("max_autoderef_steps = 0"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
