//! Append requests and their validated form.
//!
//! `AppendRequest` is what the ingress collaborator receives over the wire.
//! `AgentAction` is the only input the appender accepts; the sole way to
//! obtain one from untrusted input is `AppendRequest::validate()`.

use serde::{Deserialize, Serialize};

use crate::{
    entry::RESULT_NOT_REPORTED,
    error::{FlightError, FlightResult},
};

/// Lowest accepted trust score.
pub const TRUST_SCORE_MIN: f64 = 0.0;

/// Highest accepted trust score.
pub const TRUST_SCORE_MAX: f64 = 10.0;

/// An unvalidated request to record one agent decision.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendRequest {
    #[serde(default)]
    pub agent: String,
    #[serde(default)]
    pub intent: String,
    #[serde(default)]
    pub tool: Option<String>,
    pub trust_score: f64,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub verification: Option<String>,
}

/// A validated agent decision, ready to be stamped and chained.
///
/// Fields are private: a value of this type always satisfies the checks in
/// `AppendRequest::validate()`, so sinks never re-validate.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentAction {
    agent: String,
    intent: String,
    tool: Option<String>,
    trust_score: f64,
    result: String,
    verification: Option<String>,
}

impl AgentAction {
    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn intent(&self) -> &str {
        &self.intent
    }

    pub fn tool(&self) -> Option<&str> {
        self.tool.as_deref()
    }

    /// Finite, within `[0, 10]`, never `-0.0`.
    pub fn trust_score(&self) -> f64 {
        self.trust_score
    }

    pub fn result(&self) -> &str {
        &self.result
    }

    pub fn verification(&self) -> Option<&str> {
        self.verification.as_deref()
    }
}

impl AppendRequest {
    /// Check the request and convert it into an `AgentAction`.
    ///
    /// `agent` and `intent` are trimmed and must be non-empty.  `trust_score`
    /// must be finite and within `[0, 10]`.  Blank optional strings are
    /// treated as absent; an absent `result` is stored as `"N/A"`.
    pub fn validate(self) -> FlightResult<AgentAction> {
        let agent = required("agent", &self.agent)?;
        let intent = required("intent", &self.intent)?;

        if !self.trust_score.is_finite()
            || self.trust_score < TRUST_SCORE_MIN
            || self.trust_score > TRUST_SCORE_MAX
        {
            return Err(FlightError::Validation {
                reason: format!(
                    "trustScore must be within [{}, {}], got {}",
                    TRUST_SCORE_MIN, TRUST_SCORE_MAX, self.trust_score
                ),
            });
        }

        // `-0.0` passes the range check but renders as "-0".
        let trust_score = if self.trust_score == 0.0 {
            0.0
        } else {
            self.trust_score
        };

        Ok(AgentAction {
            agent,
            intent,
            tool: optional(self.tool),
            trust_score,
            result: optional(self.result).unwrap_or_else(|| RESULT_NOT_REPORTED.to_string()),
            verification: optional(self.verification),
        })
    }
}

fn required(field: &str, value: &str) -> FlightResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(FlightError::Validation {
            reason: format!("'{}' is required and must not be empty", field),
        });
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
