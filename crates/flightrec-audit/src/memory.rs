//! In-memory implementation of `AuditSink`.
//!
//! `InMemoryAppender` keeps the chain in a `Vec` protected by a `Mutex`.  It
//! applies exactly the same sealing rules as `FileAppender`, which makes it
//! the sink of choice for exercising the ingress gate without touching the
//! filesystem, and for producing reference chains in tests.

use std::sync::{Arc, Mutex};

use tracing::debug;

use flightrec_contracts::{
    action::AgentAction,
    entry::{AuditEntry, GENESIS_HASH},
    error::{FlightError, FlightResult},
    verify::VerifyReport,
};
use flightrec_core::traits::{AuditSink, Clock, SystemClock};

use crate::{chain::seal, verifier::verify_entries};

// ── Internal mutable state ────────────────────────────────────────────────────

pub(crate) struct InMemoryState {
    /// All entries appended so far, in chain order.
    pub(crate) entries: Vec<AuditEntry>,

    /// The `hash` of the last entry, or `GENESIS_HASH` before the first.
    pub(crate) last_hash: String,
}

// ── Public appender ───────────────────────────────────────────────────────────

/// An in-memory, append-only audit sink backed by the same hash chain as the
/// log file.
pub struct InMemoryAppender {
    clock: Arc<dyn Clock>,
    pub(crate) state: Mutex<InMemoryState>,
}

impl InMemoryAppender {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: Mutex::new(InMemoryState {
                entries: Vec::new(),
                last_hash: GENESIS_HASH.to_string(),
            }),
        }
    }

    /// A copy of every entry, oldest first.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .clone()
    }

    /// Replay the in-memory chain with the verifier's rules.
    pub fn verify(&self) -> VerifyReport {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        verify_entries(&state.entries)
    }
}

impl Default for InMemoryAppender {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditSink for InMemoryAppender {
    fn append(&self, action: AgentAction) -> FlightResult<AuditEntry> {
        let mut state = self.state.lock().map_err(|e| FlightError::AuditWriteFailed {
            reason: format!("audit state lock poisoned: {}", e),
        })?;

        let entry = seal(action, self.clock.now(), &state.last_hash);
        state.last_hash = entry.hash.clone();
        state.entries.push(entry.clone());

        debug!(
            sequence = state.entries.len(),
            hash = %entry.hash,
            "appended in-memory audit entry"
        );

        Ok(entry)
    }

    fn head(&self) -> FlightResult<Option<String>> {
        let state = self.state.lock().map_err(|e| FlightError::LogReadFailed {
            reason: format!("audit state lock poisoned: {}", e),
        })?;
        Ok(state.entries.last().map(|e| e.hash.clone()))
    }
}
