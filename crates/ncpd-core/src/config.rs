// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::NcpdError;

const DEFAULT_CANCEL_CHECK_EVERY: usize = 16;
const DEFAULT_SEED: u64 = 0;

/// Factorization rank policy for a detection run.
///
/// Exactly one rank value is used for the whole run; `Auto` resolves it once
/// via the permutation-comparison heuristic before any segmentation happens.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RankChoice {
    Fixed(usize),
    #[default]
    Auto,
}

/// Significance output policy.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Alpha {
    /// Emit boolean reject/accept decisions at this level.
    Threshold(f64),
    /// Emit BH-adjusted p-values and leave the decision to the caller.
    RawPValues,
}

impl Default for Alpha {
    fn default() -> Self {
        Alpha::Threshold(0.05)
    }
}

/// Two-sample test comparing the refit distribution against the null.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TestKind {
    /// Welch two-sample t-test.
    #[default]
    Welch,
    /// Wilcoxon rank-sum with normal approximation and tie correction.
    RankSum,
    /// Two-sample one-sided Kolmogorov-Smirnov.
    KolmogorovSmirnov,
}

/// Configuration for one detection run.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct DetectConfig {
    /// Minimum distance between any split and a window boundary.
    pub mindist: usize,
    /// Random restarts per oracle call.
    pub restarts: usize,
    /// Samples per refit/null distribution.
    pub n_rep: usize,
    pub alpha: Alpha,
    pub rank: RankChoice,
    pub test_kind: TestKind,
    pub seed: u64,
    /// Cancellation poll cadence, in oracle calls.
    pub cancel_check_every: usize,
    /// Worker count for the permutation phase; `None` uses the ambient pool.
    /// Ignored by sequential builds of the detector.
    pub permutation_threads: Option<usize>,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            mindist: 20,
            restarts: 5,
            n_rep: 100,
            alpha: Alpha::default(),
            rank: RankChoice::Auto,
            test_kind: TestKind::default(),
            seed: DEFAULT_SEED,
            cancel_check_every: DEFAULT_CANCEL_CHECK_EVERY,
            permutation_threads: None,
        }
    }
}

impl DetectConfig {
    pub fn validate(&self) -> Result<(), NcpdError> {
        if self.mindist == 0 {
            return Err(NcpdError::invalid_input(
                "DetectConfig.mindist must be >= 1; got 0",
            ));
        }
        if self.restarts == 0 {
            return Err(NcpdError::invalid_input(
                "DetectConfig.restarts must be >= 1; got 0",
            ));
        }
        // n_rep >= 2 keeps every downstream two-sample test non-degenerate.
        if self.n_rep < 2 {
            return Err(NcpdError::invalid_input(format!(
                "DetectConfig.n_rep must be >= 2; got {}",
                self.n_rep
            )));
        }
        if let Alpha::Threshold(level) = self.alpha
            && !(level > 0.0 && level < 1.0)
        {
            return Err(NcpdError::invalid_input(format!(
                "DetectConfig.alpha threshold must be in (0, 1); got {level}"
            )));
        }
        if let RankChoice::Fixed(rank) = self.rank
            && rank == 0
        {
            return Err(NcpdError::invalid_input(
                "DetectConfig.rank must be >= 1 when fixed; got 0",
            ));
        }
        if matches!(self.permutation_threads, Some(0)) {
            return Err(NcpdError::invalid_input(
                "DetectConfig.permutation_threads must be >= 1 when provided; got 0",
            ));
        }

        Ok(())
    }

    pub fn normalized_cancel_check_every(&self) -> usize {
        self.cancel_check_every.max(1)
    }
}
