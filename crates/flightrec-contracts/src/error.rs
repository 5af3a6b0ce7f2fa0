//! Error types for the flight recorder.
//!
//! All fallible operations return `FlightResult<T>`.  Variants carry enough
//! context for the ingress collaborator to decide on a retry policy and for
//! operators to locate the problem in the log file.
//!
//! Chain-integrity violations are deliberately absent: the verifier reports
//! them as data in a `VerifyReport`, never as an error.

use thiserror::Error;

/// The unified error type for the flight recorder crates.
#[derive(Debug, Error)]
pub enum FlightError {
    /// The append request was malformed and was rejected before storage was
    /// touched.
    #[error("invalid append request: {reason}")]
    Validation { reason: String },

    /// The ingress gate refused the request because the caller exhausted its
    /// request window.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// The appender could not persist a record.
    ///
    /// Fatal to the call: an accepted action that cannot be recorded must
    /// never be reported as recorded.
    #[error("audit write failed: {reason}")]
    AuditWriteFailed { reason: String },

    /// The last line of the log is not a parsable record, so there is no tail
    /// hash to link the next record to.
    #[error("log tail at line {line} is not a valid record: {reason}")]
    CorruptTail { line: usize, reason: String },

    /// The log file exists but could not be read.
    #[error("audit log read failed: {reason}")]
    LogReadFailed { reason: String },

    /// A configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },
}

/// Convenience alias used throughout the flight recorder crates.
pub type FlightResult<T> = Result<T, FlightError>;
