//! # flightrec-config
//!
//! TOML configuration for the agent flight recorder.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use flightrec_config::FlightConfig;
//!
//! let config = FlightConfig::from_file(Path::new("flightrec.toml"))?;
//! let appender = FileAppender::new(&config.log.path).with_fsync(config.log.fsync);
//! ```
//!
//! Every key is optional.  `FlightConfig::default()` is what an empty file
//! produces.

pub mod loader;
pub mod schema;

pub use schema::{FlightConfig, IngressConfig, LogConfig, ReaderConfig, DEFAULT_LOG_PATH};

// ── Tests ─────────────────────────────────────────────────────────────────────
