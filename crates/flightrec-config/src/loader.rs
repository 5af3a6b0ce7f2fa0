//! Loading and checking `FlightConfig`.

use std::path::Path;

use tracing::debug;

use flightrec_contracts::error::{FlightError, FlightResult};

use crate::schema::FlightConfig;

/// Largest accepted `reader.default_limit`.
pub const MAX_READER_LIMIT: usize = 100;

/// One day.
const MAX_WINDOW_SECS: u64 = 86_400;

/// One week.
const MAX_CLEANUP_INTERVAL_SECS: u64 = 604_800;

impl FlightConfig {
    /// Parse `s` as TOML and check the resulting values.
    ///
    /// Returns `FlightError::ConfigError` if the TOML is malformed, contains
    /// unknown keys, or holds out-of-range values.
    pub fn from_toml_str(s: &str) -> FlightResult<Self> {
        let config: FlightConfig = toml::from_str(s).map_err(|e| FlightError::ConfigError {
            reason: format!("failed to parse config TOML: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read the file at `path` and parse it as TOML configuration.
    pub fn from_file(path: &Path) -> FlightResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| FlightError::ConfigError {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        let config = Self::from_toml_str(&contents)?;
        debug!(path = %path.display(), log = %config.log.path.display(), "configuration loaded");
        Ok(config)
    }

    /// Check value ranges that the type system cannot express.
    pub fn validate(&self) -> FlightResult<()> {
        if self.log.path.as_os_str().is_empty() {
            return Err(config_error("log.path must not be empty"));
        }
        if self.reader.default_limit == 0 || self.reader.default_limit > MAX_READER_LIMIT {
            return Err(config_error(format!(
                "reader.default_limit must be within 1..={}, got {}",
                MAX_READER_LIMIT, self.reader.default_limit
            )));
        }
        if self.ingress.max_requests == 0 {
            return Err(config_error("ingress.max_requests must be at least 1"));
        }
        if self.ingress.window_secs == 0 || self.ingress.window_secs > MAX_WINDOW_SECS {
            return Err(config_error(format!(
                "ingress.window_secs must be within 1..={}, got {}",
                MAX_WINDOW_SECS, self.ingress.window_secs
            )));
        }
        if self.ingress.cleanup_interval_secs == 0
            || self.ingress.cleanup_interval_secs > MAX_CLEANUP_INTERVAL_SECS
        {
            return Err(config_error(format!(
                "ingress.cleanup_interval_secs must be within 1..={}, got {}",
                MAX_CLEANUP_INTERVAL_SECS, self.ingress.cleanup_interval_secs
            )));
        }
        Ok(())
    }
}

fn config_error(reason: impl Into<String>) -> FlightError {
    FlightError::ConfigError {
        reason: reason.into(),
    }
}
