//! The ingress gate: the path every external append request takes.
//!
//!   Rate limit → Validate → [AuditSink::append] → Receipt
//!
//! `AuditSink::append()` is never called for a request that was refused by
//! the rate limiter or failed validation.  Storage failures from the sink are
//! returned unchanged so the caller can decide on a retry policy.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use flightrec_contracts::{
    action::AppendRequest,
    entry::AuditEntry,
    error::{FlightError, FlightResult},
};

use crate::{
    rate_limit::RateLimiter,
    traits::{AuditSink, Clock, SystemClock},
};

/// What a caller gets back for an accepted request.
#[derive(Debug, Clone)]
pub struct Receipt {
    /// The entry exactly as it was stored.
    pub entry: AuditEntry,
    /// Requests still admissible for this caller in the current window.
    pub remaining: u32,
    /// When the caller's window closes.
    pub reset_at: DateTime<Utc>,
}

/// Front door for append requests.
///
/// Owns the rate limiter and a handle to the single audit sink.  Cheap to
/// share behind an `Arc`; all mutable state lives in the limiter and sink.
pub struct IngressGate {
    sink: Arc<dyn AuditSink>,
    limiter: Arc<RateLimiter>,
    clock: Arc<dyn Clock>,
}

impl IngressGate {
    pub fn new(sink: Arc<dyn AuditSink>, limiter: Arc<RateLimiter>) -> Self {
        Self::with_clock(sink, limiter, Arc::new(SystemClock))
    }

    /// Use `clock` when computing `Retry-After` values.  Pass the same clock
    /// the limiter was built with.
    pub fn with_clock(
        sink: Arc<dyn AuditSink>,
        limiter: Arc<RateLimiter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sink,
            limiter,
            clock,
        }
    }

    /// Admit, validate, and record one request from `caller`.
    ///
    /// # Errors
    ///
    /// - `RateLimited` when `caller` exhausted its window
    /// - `Validation` when the request is malformed
    /// - whatever the sink returns when the append itself fails
    pub fn submit(&self, caller: &str, request: AppendRequest) -> FlightResult<Receipt> {
        let decision = self.limiter.check(caller);
        if !decision.allowed {
            let retry_after_secs = decision.retry_after_secs(self.clock.now());
            warn!(
                caller = %caller,
                retry_after_secs,
                "append request refused by rate limiter"
            );
            return Err(FlightError::RateLimited { retry_after_secs });
        }

        let action = request.validate().map_err(|e| {
            debug!(caller = %caller, error = %e, "append request failed validation");
            e
        })?;

        let entry = self.sink.append(action)?;

        info!(
            caller = %caller,
            agent = %entry.agent,
            hash = %entry.hash,
            "agent action recorded"
        );

        Ok(Receipt {
            entry,
            remaining: decision.remaining,
            reset_at: decision.reset_at,
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
