//! Fatal encoder errors.
//!
//! Every per-row anomaly (unknown organization, unparseable date, missing
//! page markers) is absorbed into blank output fields. The only failures that
//! abort a run are the ones below: once the encoder is unavailable or
//! inconsistent, no vector in the session can be trusted.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncodingFailure {
    #[error("embedding provider '{provider}' unavailable: {reason}")]
    Unavailable { provider: String, reason: String },

    #[error("embedding provider '{provider}' timed out after {secs}s")]
    Timeout { provider: String, secs: u64 },

    #[error("embedding provider '{provider}' returned {actual} vectors for {expected} inputs")]
    CountMismatch {
        provider: String,
        expected: usize,
        actual: usize,
    },

    #[error("embedding dimensionality mismatch from '{provider}': expected {expected}, got {actual}")]
    DimensionMismatch {
        provider: String,
        expected: usize,
        actual: usize,
    },
}
