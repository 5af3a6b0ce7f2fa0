//! Chain verification report types.
//!
//! The chain verifier never fails on a broken chain.  It returns a
//! `VerifyReport` whose findings carry enough detail (line number, expected
//! vs. actual digest) to support a governance review.

use serde::{Deserialize, Serialize};

/// Terminal state of one verification run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChainStatus {
    /// No line was found corrupted.
    Ok,
    /// At least one line was found corrupted.
    Corrupted,
}

/// What was wrong with a single line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FindingKind {
    /// The line is not a well-formed record.
    Unparsable { reason: String },

    /// `_prevHash` does not link to the previous record's `_hash`.
    PrevHashMismatch { expected: String, actual: String },

    /// The stored `_hash` differs from the digest recomputed over the
    /// record's content.  This is the tamper signal.
    HashMismatch { expected: String, actual: String },
}

/// A single integrity finding, located by 1-based line number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub line: usize,
    #[serde(flatten)]
    pub kind: FindingKind,
}

/// The result of replaying a whole log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    /// Records that passed every check.
    pub valid_count: usize,

    /// Lines with at least one finding.  A line counts once even when it
    /// fails both the linkage and the digest check.
    pub corrupted_count: usize,

    /// Line number of the first corrupted line, if any.
    pub first_corruption_line: Option<usize>,

    pub status: ChainStatus,

    /// Every finding in file order.
    pub findings: Vec<Finding>,

    /// True when the final line was an incomplete, unterminated write that
    /// was ignored rather than judged.
    pub pending_tail: bool,
}

impl VerifyReport {
    /// The report for a log with no records.
    pub fn empty() -> Self {
        Self {
            valid_count: 0,
            corrupted_count: 0,
            first_corruption_line: None,
            status: ChainStatus::Ok,
            findings: Vec::new(),
            pending_tail: false,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ChainStatus::Ok
    }

    /// Human-readable one-line summary.
    pub fn summary(&self) -> String {
        match self.first_corruption_line {
            None => format!("OK: {} valid entries", self.valid_count),
            Some(line) => format!(
                "CORRUPTED: {} valid, {} corrupted, first corruption at line {}",
                self.valid_count, self.corrupted_count, line
            ),
        }
    }
}
