// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

/// Structured error type for ncpd core APIs.
///
/// # Error Philosophy
/// - Error messages are operational and actionable.
/// - Variants are structured for reliable pattern matching.
/// - Expected failures are represented as `NcpdError` (not panics).
/// - Oracle failures propagate immediately; there is no retry logic.
#[derive(thiserror::Error, Debug)]
pub enum NcpdError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("factorization oracle failure: {0}")]
    OracleFailure(String),
    #[error("degenerate sample: {0}")]
    DegenerateSample(String),
    #[error("resource limit exceeded: {0}")]
    ResourceLimit(String),
    #[error("cancelled")]
    Cancelled,
}

impl NcpdError {
    /// Creates a `NcpdError::InvalidInput`.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Creates a `NcpdError::OracleFailure`.
    pub fn oracle_failure(msg: impl Into<String>) -> Self {
        Self::OracleFailure(msg.into())
    }

    /// Creates a `NcpdError::DegenerateSample`.
    pub fn degenerate_sample(msg: impl Into<String>) -> Self {
        Self::DegenerateSample(msg.into())
    }

    /// Creates a `NcpdError::ResourceLimit`.
    pub fn resource_limit(msg: impl Into<String>) -> Self {
        Self::ResourceLimit(msg.into())
    }

    /// Creates a `NcpdError::Cancelled`.
    pub fn cancelled() -> Self {
        Self::Cancelled
    }
}
