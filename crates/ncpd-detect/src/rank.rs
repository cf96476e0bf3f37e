// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use ncpd_core::{
    ExecutionContext, NcpdError, SeriesView, StreamPurpose, derive_stream, shuffled_indices,
};
use ncpd_factorize::FactorizationOracle;

use crate::segment::{RuntimeStats, checked_counter_increment};

const ORIGINAL_STREAM: u64 = 0;
const PERMUTED_STREAM: u64 = 1;

/// Permutes each variable's values independently across time.
///
/// A whole-row shuffle would leave the factorization residual unchanged
/// (reordering rows only reorders the left factor), so the probe copy
/// shuffles per column instead, destroying the cross-variable structure the
/// rank is supposed to capture.
fn column_shuffled(series: SeriesView<'_>, seed: u64) -> Result<Vec<f64>, NcpdError> {
    let (n, p) = (series.n_rows(), series.n_vars());
    let shuffle_rng = derive_stream(seed, 0, 0, StreamPurpose::RankProbe);

    let mut values = vec![0.0; n * p];
    for var in 0..p {
        let mut rng = shuffle_rng.fork(var as u64);
        let order = shuffled_indices(&mut rng, n)?;
        for (t, &src) in order.iter().enumerate() {
            values[t * p + var] = series.row(src)[var];
        }
    }
    Ok(values)
}

/// Resolves the factorization rank by comparing against a permuted baseline.
///
/// The series is column-shuffled once; for increasing `k` the oracle scores
/// both copies, and the rank keeps growing while the real data's residual
/// decrease outpaces the shuffled copy's. The first `k` where the real
/// benefit no longer exceeds the chance benefit is returned. The search is
/// capped at the variable count: exhausting the cap means the comparison
/// never stabilized, which is surfaced as an oracle failure rather than an
/// arbitrary rank.
pub fn select_rank<O: FactorizationOracle>(
    series: SeriesView<'_>,
    oracle: &O,
    restarts: usize,
    seed: u64,
    ctx: &ExecutionContext<'_>,
) -> Result<(usize, RuntimeStats), NcpdError> {
    if restarts == 0 {
        return Err(NcpdError::invalid_input("restarts must be >= 1; got 0"));
    }

    let original = series.full_block();
    let permuted_values = column_shuffled(series, seed)?;
    let permuted = SeriesView::new(&permuted_values, series.n_rows(), series.n_vars())?;

    let mut stats = RuntimeStats::default();
    let mut score = |block: &ncpd_core::BlockView<'_>,
                     rank: usize,
                     stream: u64,
                     stats: &mut RuntimeStats|
     -> Result<f64, NcpdError> {
        checked_counter_increment(&mut stats.oracle_calls, "oracle_calls")?;
        let rng = derive_stream(seed, rank as u64, stream, StreamPurpose::RankProbe);
        oracle.residual(block, rank, restarts, rng)
    };

    let mut prev_orig = score(&original, 1, ORIGINAL_STREAM, &mut stats)?;
    let mut prev_perm = score(&permuted.full_block(), 1, PERMUTED_STREAM, &mut stats)?;

    for k in 2..=series.n_vars() {
        ctx.check_cancelled()?;

        let orig = score(&original, k, ORIGINAL_STREAM, &mut stats)?;
        let perm = score(&permuted.full_block(), k, PERMUTED_STREAM, &mut stats)?;

        let orig_change = orig - prev_orig;
        let perm_change = perm - prev_perm;
        if orig_change >= perm_change {
            return Ok((k, stats));
        }

        prev_orig = orig;
        prev_perm = perm;
    }

    Err(NcpdError::oracle_failure(format!(
        "rank search reached the variable count ({}) without the residual \
         comparison stabilizing",
        series.n_vars()
    )))
}
