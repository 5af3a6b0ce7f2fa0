//! Hash-chain primitives: hashing and canonical serialization.
//!
//! The digest of an entry is SHA-256 over an explicit canonical encoding,
//! never over whatever bytes happen to be stored on disk.  The stored JSON
//! may reorder keys or change whitespace without affecting the digest; any
//! change to a field's value does.
//!
//! Canonical layout, version 1 — a compact JSON array, elements in order:
//!   1. the tag `"flightrec/v1"`
//!   2. agent
//!   3. intent
//!   4. tool, or `null`
//!   5. trust score as the shortest round-trip decimal (`9`, `7.5`)
//!   6. result
//!   7. verification, or `null`
//!   8. timestamp as `YYYY-MM-DDTHH:MM:SS.mmmZ`
//!   9. previous hash
//!
//! The entry's own `hash` is never part of its input.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};

use flightrec_contracts::{
    action::AgentAction,
    entry::{timestamp, AuditEntry},
};

/// Version tag leading every canonical encoding.
pub const CANONICAL_TAG: &str = "flightrec/v1";

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// True for exactly 64 lowercase hex characters.
pub fn is_hex_digest(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// The canonical byte encoding of `entry`, excluding `entry.hash`.
pub fn canonical_bytes(entry: &AuditEntry) -> Vec<u8> {
    let fields = [
        json_str(CANONICAL_TAG),
        json_str(&entry.agent),
        json_str(&entry.intent),
        json_opt(entry.tool.as_deref()),
        entry.trust_score.to_string(),
        json_str(&entry.result),
        json_opt(entry.verification.as_deref()),
        json_str(&timestamp::format(&entry.timestamp)),
        json_str(&entry.prev_hash),
    ];

    let mut out = Vec::with_capacity(fields.iter().map(|f| f.len() + 1).sum::<usize>() + 1);
    out.push(b'[');
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(b',');
        }
        out.extend_from_slice(field.as_bytes());
    }
    out.push(b']');
    out
}

/// `sha256_hex(canonical_bytes(entry))`.
pub fn entry_digest(entry: &AuditEntry) -> String {
    sha256_hex(&canonical_bytes(entry))
}

/// Build the stored form of `action`: stamp it, link it to `prev_hash`, and
/// compute its hash.
pub fn seal(action: AgentAction, at: DateTime<Utc>, prev_hash: &str) -> AuditEntry {
    let mut entry = AuditEntry {
        agent: action.agent().to_string(),
        intent: action.intent().to_string(),
        tool: action.tool().map(str::to_string),
        trust_score: action.trust_score(),
        result: action.result().to_string(),
        verification: action.verification().map(str::to_string),
        timestamp: timestamp::truncate(at),
        prev_hash: prev_hash.to_string(),
        hash: String::new(),
    };
    entry.hash = entry_digest(&entry);
    entry
}

fn json_str(s: &str) -> String {
    Value::from(s).to_string()
}

fn json_opt(s: Option<&str>) -> String {
    s.map(json_str).unwrap_or_else(|| "null".to_string())
}
