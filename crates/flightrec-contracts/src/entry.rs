//! The audit record stored in the flight recorder log.
//!
//! One `AuditEntry` is serialized per line of the log file.  The JSON keys
//! are part of the storage format and must not change: `trustScore`,
//! `_prevHash` and `_hash` keep their camelCase / underscore-prefixed names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The sentinel `_prevHash` of the first entry in every log.
///
/// 64 hex zeros, the same length as a SHA-256 hex digest.
pub const GENESIS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Placeholder stored in `result` when the caller did not report one.
pub const RESULT_NOT_REPORTED: &str = "N/A";

/// A single, immutable record of one agent decision.
///
/// Created exactly once by the appender.  Editing any field after the fact
/// invalidates `hash`, which the chain verifier detects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditEntry {
    /// The acting subsystem, e.g. a role name such as `"ARQUITETO"`.
    pub agent: String,

    /// Human-readable description of the action taken.
    pub intent: String,

    /// The named capability invoked, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,

    /// Trust score in `[0, 10]`.
    #[serde(rename = "trustScore")]
    pub trust_score: f64,

    /// Short outcome string.
    pub result: String,

    /// Free-form verification note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<String>,

    /// Write time assigned by the appender, millisecond precision.
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,

    /// Digest of the preceding entry, or `GENESIS_HASH`.
    #[serde(rename = "_prevHash")]
    pub prev_hash: String,

    /// Digest of this entry's canonical serialization.
    #[serde(rename = "_hash")]
    pub hash: String,
}

impl AuditEntry {
    /// One-line description for log messages.
    pub fn summary(&self) -> String {
        format!(
            "[{}] {} (tool: {}, score: {}, result: {})",
            self.agent,
            self.intent,
            self.tool.as_deref().unwrap_or("N/A"),
            self.trust_score,
            self.result
        )
    }
}

/// Fixed textual form of entry timestamps.
///
/// Serialization always emits `YYYY-MM-DDTHH:MM:SS.mmmZ`.  Deserialization
/// only accepts that exact rendering, so the stored text and the value fed
/// to the canonical serializer can never drift apart.
pub mod timestamp {
    use chrono::{DateTime, SubsecRound, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

    pub fn format(ts: &DateTime<Utc>) -> String {
        ts.format(FORMAT).to_string()
    }

    /// Drop sub-millisecond precision so the value survives a format/parse
    /// round trip unchanged.
    pub fn truncate(ts: DateTime<Utc>) -> DateTime<Utc> {
        ts.trunc_subsecs(3)
    }

    pub fn parse(raw: &str) -> Result<DateTime<Utc>, String> {
        let parsed = DateTime::parse_from_rfc3339(raw)
            .map_err(|e| format!("invalid timestamp '{}': {}", raw, e))?
            .with_timezone(&Utc);
        if format(&parsed) != raw {
            return Err(format!(
                "timestamp '{}' is not in canonical form '{}'",
                raw,
                format(&parsed)
            ));
        }
        Ok(parsed)
    }

    pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format(ts))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(de::Error::custom)
    }
}
