//! Configuration schema.
//!
//! Every table and every key is optional; omitted values take the defaults
//! below, so an empty file is a valid configuration.
//!
//! Example:
//! ```toml
//! [log]
//! path = ".agent/logs/flight_recorder.jsonl"
//! fsync = true
//!
//! [reader]
//! default_limit = 100
//!
//! [ingress]
//! max_requests = 100
//! window_secs = 60
//! cleanup_interval_secs = 300
//! ```

use std::path::PathBuf;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use flightrec_core::RateLimitPolicy;

/// Default location of the log file, relative to the working directory.
pub const DEFAULT_LOG_PATH: &str = ".agent/logs/flight_recorder.jsonl";

/// The top-level structure deserialized from a TOML config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlightConfig {
    pub log: LogConfig,
    pub reader: ReaderConfig,
    pub ingress: IngressConfig,
}

/// Where and how the log is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    pub path: PathBuf,

    /// Call `sync_data` after every append.  Turning this off trades
    /// durability on power loss for append latency.
    pub fsync: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_LOG_PATH),
            fsync: true,
        }
    }
}

/// Defaults for the read surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReaderConfig {
    /// Entries returned when the caller does not ask for a specific number.
    /// Must be within `1..=100`.
    pub default_limit: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self { default_limit: 100 }
    }
}

/// Request-rate limits applied by the ingress gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngressConfig {
    pub max_requests: u32,
    pub window_secs: u64,
    pub cleanup_interval_secs: u64,
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_secs: 60,
            cleanup_interval_secs: 300,
        }
    }
}

impl IngressConfig {
    pub fn rate_limit_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy {
            max_requests: self.max_requests,
            window: Duration::seconds(self.window_secs as i64),
            cleanup_interval: Duration::seconds(self.cleanup_interval_secs as i64),
        }
    }
}
