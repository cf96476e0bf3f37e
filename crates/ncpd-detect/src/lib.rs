// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Offline change-point detection for strictly positive multivariate series.
//!
//! The pipeline factorizes data blocks with a pluggable low-rank oracle,
//! bisects the timeline into candidate splits, and vets each admitted
//! candidate with a permutation significance test. Entry point:
//! [`NmfChangePointDetector::detect`].

mod detector;
mod rank;
mod resample;
mod segment;
mod significance;

pub use detector::NmfChangePointDetector;
pub use rank::select_rank;
pub use resample::{enclosing_blocks, permutation_distributions, refit_distributions};
pub use segment::{CandidateSplit, RuntimeStats, find_splits};
pub use significance::{benjamini_hochberg, test_candidates};
