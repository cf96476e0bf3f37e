// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Factorization oracles: the pluggable model layer of the detector.
//!
//! The search and significance machinery only ever sees a scalar residual per
//! block, so any low-rank (or otherwise structured) model can stand in for
//! NMF by implementing [`FactorizationOracle`].

mod nmf;

pub use nmf::{MultiplicativeNmf, NmfConfig};

use ncpd_core::{BlockView, NcpdError, StableRng};

/// Fits a rank-`k` model to a block and reports the reconstruction residual.
///
/// Implementations must be deterministic given `rng`: the same block, rank,
/// restart count, and generator state must yield the same residual. They must
/// also be `Send + Sync`, since the resampling phase calls `residual`
/// concurrently from worker threads with disjoint generators.
pub trait FactorizationOracle: Send + Sync {
    /// Short stable identifier, used in diagnostics.
    fn name(&self) -> &'static str;

    /// Best (minimum) residual over `restarts` independent fits.
    ///
    /// The residual scale is oracle-defined but must be non-negative, finite,
    /// and comparable across blocks of different lengths within one run.
    fn residual(
        &self,
        block: &BlockView<'_>,
        rank: usize,
        restarts: usize,
        rng: StableRng,
    ) -> Result<f64, NcpdError>;
}

impl<O: FactorizationOracle + ?Sized> FactorizationOracle for &O {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn residual(
        &self,
        block: &BlockView<'_>,
        rank: usize,
        restarts: usize,
        rng: StableRng,
    ) -> Result<f64, NcpdError> {
        (**self).residual(block, rank, restarts, rng)
    }
}
