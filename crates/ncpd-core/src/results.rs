// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::{Diagnostics, NcpdError};

/// Per-candidate significance outcome, mirroring the run's alpha policy.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TestOutcome {
    /// Reject/accept decision at the configured threshold.
    Significant(bool),
    /// BH-adjusted p-value, decision left to the caller.
    AdjustedP(f64),
}

/// One admitted candidate with its significance evidence.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChangePoint {
    /// Start of the right segment, 0-based: rows `[time, ..)` follow the break.
    pub time: usize,
    /// Residual improvement that admitted the candidate (negative by construction).
    pub delta: f64,
    /// Raw p-value from the configured two-sample test.
    pub raw_p: f64,
    /// Benjamini-Hochberg adjusted p-value.
    pub adjusted_p: f64,
    pub outcome: TestOutcome,
}

/// Output of one detection run.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionResult {
    /// Factorization rank the run actually used.
    pub rank: usize,
    /// Candidates in ascending time order.
    pub change_points: Vec<ChangePoint>,
    pub diagnostics: Diagnostics,
}

impl DetectionResult {
    /// Times of all change points, ascending.
    pub fn times(&self) -> Vec<usize> {
        self.change_points.iter().map(|cp| cp.time).collect()
    }

    /// Change points whose outcome rejects the null (threshold mode only).
    pub fn significant(&self) -> Vec<&ChangePoint> {
        self.change_points
            .iter()
            .filter(|cp| matches!(cp.outcome, TestOutcome::Significant(true)))
            .collect()
    }
}

/// Validates the structural invariants of a change-point list.
///
/// Times must be strictly ascending (which implies uniqueness) and every
/// p-value must lie in `[0, 1]`.
pub fn validate_change_points(change_points: &[ChangePoint]) -> Result<(), NcpdError> {
    for pair in change_points.windows(2) {
        if pair[1].time <= pair[0].time {
            return Err(NcpdError::invalid_input(format!(
                "change-point times must be strictly ascending: {} then {}",
                pair[0].time, pair[1].time
            )));
        }
    }

    for cp in change_points {
        for (label, p) in [("raw_p", cp.raw_p), ("adjusted_p", cp.adjusted_p)] {
            if !(0.0..=1.0).contains(&p) {
                return Err(NcpdError::invalid_input(format!(
                    "change point at time {} has {label}={p} outside [0, 1]",
                    cp.time
                )));
            }
        }
    }

    Ok(())
}
