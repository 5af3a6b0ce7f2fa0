//! # flightrec-contracts
//!
//! Shared types, validation, and error contracts for the agent flight
//! recorder.
//!
//! All crates in the workspace import from here. No I/O lives in this crate.
//! It holds data definitions, request validation, and error types.

pub mod action;
pub mod entry;
pub mod error;
pub mod verify;
