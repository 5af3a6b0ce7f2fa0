//! # flightrec-core
//!
//! Seams and request plumbing for the agent flight recorder.
//!
//! This crate provides:
//! - The core traits (`AuditSink`, `Clock`)
//! - `RateLimiter`, an injectable per-caller request-rate gate
//! - The `IngressGate` that wires rate limiting, validation and the sink
//!   together in the correct order
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use flightrec_core::{IngressGate, RateLimiter, RateLimitPolicy};
//!
//! let limiter = Arc::new(RateLimiter::new(RateLimitPolicy::default()));
//! let gate = IngressGate::new(sink, limiter);
//! let receipt = gate.submit("10.0.0.1", request)?;
//! ```

pub mod ingress;
pub mod rate_limit;
pub mod traits;

pub use ingress::{IngressGate, Receipt};
pub use rate_limit::{RateDecision, RateLimitPolicy, RateLimiter};
pub use traits::{AuditSink, Clock, ManualClock, SystemClock};

// ── Tests ─────────────────────────────────────────────────────────────────────
