//! Best-effort, newest-first read surface for dashboards.
//!
//! Unlike the verifier this path never judges the chain: any line that does
//! not parse (including a half-written final line) is silently skipped.

use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::debug;

use flightrec_contracts::{
    entry::AuditEntry,
    error::{FlightError, FlightResult},
};

/// Entries returned when the caller does not ask for a number.
pub const DEFAULT_RECENT_LIMIT: usize = 100;

/// Hard cap on entries returned by one call.
pub const MAX_RECENT_LIMIT: usize = 100;

/// Filters applied before truncation.
#[derive(Debug, Clone, Default)]
pub struct RecentQuery {
    /// Clamped to `MAX_RECENT_LIMIT`; defaults to `DEFAULT_RECENT_LIMIT`.
    pub limit: Option<usize>,
    /// Only entries from this agent (case-insensitive).
    pub agent: Option<String>,
    /// Only entries stamped at or after this instant.
    pub since: Option<DateTime<Utc>>,
}

impl RecentQuery {
    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_RECENT_LIMIT)
            .min(MAX_RECENT_LIMIT)
    }
}

/// Up to `limit` of the most recent entries, newest first.
pub fn recent(path: &Path, limit: usize) -> FlightResult<Vec<AuditEntry>> {
    query(
        path,
        &RecentQuery {
            limit: Some(limit),
            ..RecentQuery::default()
        },
    )
}

/// The most recent entries matching `q`, newest first.
///
/// A missing log yields an empty list.
pub fn query(path: &Path, q: &RecentQuery) -> FlightResult<Vec<AuditEntry>> {
    let contents = match fs::read(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(FlightError::LogReadFailed {
                reason: format!("failed to read audit log '{}': {}", path.display(), e),
            })
        }
    };

    let agent = q.agent.as_deref().map(str::to_lowercase);
    let mut skipped = 0usize;

    let entries: Vec<AuditEntry> = contents
        .split(|&b| b == b'\n')
        .rev()
        .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
        .filter_map(|line| match serde_json::from_slice::<AuditEntry>(line) {
            Ok(entry) => Some(entry),
            Err(_) => {
                skipped += 1;
                None
            }
        })
        .filter(|entry| {
            agent
                .as_deref()
                .map_or(true, |a| entry.agent.to_lowercase() == a)
        })
        .filter(|entry| q.since.map_or(true, |since| entry.timestamp >= since))
        .take(q.effective_limit())
        .collect();

    if skipped > 0 {
        debug!(skipped, path = %path.display(), "skipped unparsable audit lines");
    }

    Ok(entries)
}
