//! Core trait definitions for the flight recorder.
//!
//! - `AuditSink` — trusted sink (the only authority that adds records)
//! - `Clock`     — source of wall-clock time, injected so timestamps and
//!   rate-limit windows can be driven deterministically in tests
//!
//! The ingress gate depends only on these seams; the file-backed and
//! in-memory appenders in `flightrec-audit` implement `AuditSink`.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use flightrec_contracts::{action::AgentAction, entry::AuditEntry, error::FlightResult};

/// The audit sink: the immutable record of agent decisions.
///
/// Implementations must serialize all appends so that no two records ever
/// link to the same predecessor.  A failed append is fatal to the call and
/// must be returned as `FlightError::AuditWriteFailed` (or `CorruptTail`),
/// never swallowed.
pub trait AuditSink: Send + Sync {
    /// Stamp, chain, and durably append one validated action.
    ///
    /// Returns the stored entry, including its `timestamp`, `prev_hash`
    /// and `hash`.
    fn append(&self, action: AgentAction) -> FlightResult<AuditEntry>;

    /// The `hash` of the current last record, or `None` for an empty log.
    fn head(&self) -> FlightResult<Option<String>>;
}

/// A source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
