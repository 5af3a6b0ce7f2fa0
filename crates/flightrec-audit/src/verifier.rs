//! Chain verifier: replays a log and reports every integrity finding.
//!
//! The scan is strictly sequential.  Each record's expected `_prevHash` is
//! the *stored* `_hash` of the record before it, so after a mismatch the
//! scan re-anchors on what is actually in the file and later records are
//! still judged on their own.
//!
//! Policy per line (1-based physical line numbers):
//! - blank line: skipped
//! - unterminated final line that does not parse: a write still in
//!   progress; ignored and flagged as `pending_tail`
//! - any other unparsable line: one corrupted line; the next record's
//!   linkage cannot be judged and is not checked
//! - parsed record: checked for linkage and for digest correctness; one or
//!   both failures count the line once as corrupted

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use tracing::{debug, info, warn};

use flightrec_contracts::{
    entry::{AuditEntry, GENESIS_HASH},
    error::{FlightError, FlightResult},
    verify::{ChainStatus, Finding, FindingKind, VerifyReport},
};

use crate::chain::entry_digest;

/// Verify the log file at `path`.
///
/// A missing file is an empty log and verifies as `OK`.
pub fn verify_file(path: &Path) -> FlightResult<VerifyReport> {
    info!(path = %path.display(), "verifying audit log");

    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "audit log does not exist; nothing to verify");
            return Ok(VerifyReport::empty());
        }
        Err(e) => {
            return Err(FlightError::LogReadFailed {
                reason: format!("failed to open audit log '{}': {}", path.display(), e),
            })
        }
    };

    verify_reader(BufReader::new(file))
}

/// Verify a log supplied as a byte stream.
pub fn verify_reader<R: BufRead>(mut reader: R) -> FlightResult<VerifyReport> {
    let mut scan = ChainScan::new();
    let mut buf = Vec::new();
    let mut line = 0usize;

    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| FlightError::LogReadFailed {
                reason: format!("failed to read line {}: {}", line + 1, e),
            })?;
        if read == 0 {
            break;
        }
        line += 1;
        let terminated = buf.last() == Some(&b'\n');
        scan.line(line, &buf, terminated);
    }

    let report = scan.finish();
    info!(
        valid = report.valid_count,
        corrupted = report.corrupted_count,
        status = ?report.status,
        "audit log verification finished"
    );
    Ok(report)
}

/// Verify an in-memory chain.  Entry `i` is reported as line `i + 1`.
pub fn verify_entries(entries: &[AuditEntry]) -> VerifyReport {
    let mut scan = ChainScan::new();
    for (i, entry) in entries.iter().enumerate() {
        scan.entry(i + 1, entry);
    }
    scan.finish()
}

/// Accumulates the state of one sequential pass.
struct ChainScan {
    /// `None` after an unparsable line, when the predecessor's hash is
    /// unknown.
    expected_prev: Option<String>,
    valid: usize,
    corrupted: usize,
    first_corruption: Option<usize>,
    findings: Vec<Finding>,
    pending_tail: bool,
}

impl ChainScan {
    fn new() -> Self {
        Self {
            expected_prev: Some(GENESIS_HASH.to_string()),
            valid: 0,
            corrupted: 0,
            first_corruption: None,
            findings: Vec::new(),
            pending_tail: false,
        }
    }

    fn line(&mut self, line: usize, raw: &[u8], terminated: bool) {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return;
        }

        match serde_json::from_slice::<AuditEntry>(raw) {
            Ok(entry) => self.entry(line, &entry),
            Err(e) if !terminated => {
                debug!(line, error = %e, "ignoring incomplete trailing line");
                self.pending_tail = true;
            }
            Err(e) => {
                self.record(
                    line,
                    vec![FindingKind::Unparsable {
                        reason: e.to_string(),
                    }],
                );
                self.expected_prev = None;
            }
        }
    }

    fn entry(&mut self, line: usize, entry: &AuditEntry) {
        let mut kinds = Vec::new();

        if let Some(expected) = &self.expected_prev {
            if entry.prev_hash != *expected {
                kinds.push(FindingKind::PrevHashMismatch {
                    expected: expected.clone(),
                    actual: entry.prev_hash.clone(),
                });
            }
        }

        let recomputed = entry_digest(entry);
        if recomputed != entry.hash {
            kinds.push(FindingKind::HashMismatch {
                expected: recomputed,
                actual: entry.hash.clone(),
            });
        }

        self.record(line, kinds);
        self.expected_prev = Some(entry.hash.clone());
    }

    fn record(&mut self, line: usize, kinds: Vec<FindingKind>) {
        if kinds.is_empty() {
            self.valid += 1;
            return;
        }

        self.corrupted += 1;
        self.first_corruption.get_or_insert(line);
        for kind in kinds {
            warn!(line, finding = ?kind, "audit chain corruption");
            self.findings.push(Finding { line, kind });
        }
    }

    fn finish(self) -> VerifyReport {
        VerifyReport {
            valid_count: self.valid,
            corrupted_count: self.corrupted,
            first_corruption_line: self.first_corruption,
            status: if self.corrupted == 0 {
                ChainStatus::Ok
            } else {
                ChainStatus::Corrupted
            },
            findings: self.findings,
            pending_tail: self.pending_tail,
        }
    }
}
