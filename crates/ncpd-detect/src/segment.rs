// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use ncpd_core::{ExecutionContext, NcpdError, SeriesView, StreamPurpose, derive_stream};
use ncpd_factorize::FactorizationOracle;

/// One proposed split, in discovery order.
///
/// `split_time` is the 0-based start of the right segment. `delta` compares
/// the split fit of the symmetric `2*mindist` evaluation window against its
/// unsplit fit; `delta < 0` means splitting improved the fit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CandidateSplit {
    pub split_time: usize,
    pub delta: f64,
}

/// Counters accumulated while the search runs.
#[derive(Clone, Copy, Debug, Default)]
pub struct RuntimeStats {
    pub oracle_calls: u64,
}

pub(crate) fn checked_counter_increment(counter: &mut u64, what: &str) -> Result<(), NcpdError> {
    *counter = counter
        .checked_add(1)
        .ok_or_else(|| NcpdError::resource_limit(format!("{what} counter overflow")))?;
    Ok(())
}

struct SearchState<'a, O: FactorizationOracle> {
    series: SeriesView<'a>,
    oracle: &'a O,
    rank: usize,
    restarts: usize,
    mindist: usize,
    seed: u64,
    ctx: &'a ExecutionContext<'a>,
    cancel_every: usize,
    stats: RuntimeStats,
}

impl<O: FactorizationOracle> SearchState<'_, O> {
    /// Oracle residual over rows `[start, end)`, with a stream keyed by the
    /// window bounds so scores do not depend on evaluation order.
    fn score(&mut self, start: usize, end: usize) -> Result<f64, NcpdError> {
        checked_counter_increment(&mut self.stats.oracle_calls, "oracle_calls")?;
        self.ctx.check_cancelled_every(
            usize::try_from(self.stats.oracle_calls).unwrap_or(usize::MAX),
            self.cancel_every,
        )?;

        let block = self.series.block(start, end)?;
        let rng = derive_stream(
            self.seed,
            start as u64,
            end as u64,
            StreamPurpose::Segmentation,
        );
        self.oracle.residual(&block, self.rank, self.restarts, rng)
    }

    /// Narrows the candidate interval `[lo, hi]` to a single split position.
    ///
    /// Each round bisects the interval, scores the data each half could place
    /// a split in (half plus its `mindist` margin), and keeps the half with
    /// the smaller residual. Exact ties keep the left half so the interval
    /// always shrinks.
    fn resolve_split(&mut self, mut lo: usize, mut hi: usize) -> Result<usize, NcpdError> {
        while lo < hi {
            let count = hi - lo + 1;
            // Midpoint rounds up on odd interval length.
            let mid = lo + count.div_ceil(2) - 1;

            let left = self.score(lo - self.mindist, mid)?;
            let right = self.score(mid + 1, hi + self.mindist)?;
            if left <= right {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        Ok(lo)
    }

    /// Fit improvement of splitting the symmetric window around `split`.
    fn split_delta(&mut self, split: usize) -> Result<f64, NcpdError> {
        let left = self.score(split - self.mindist, split)?;
        let right = self.score(split, split + self.mindist)?;
        let unsplit = self.score(split - self.mindist, split + self.mindist)?;
        Ok(left + right - unsplit)
    }
}

/// Recursive bisection search over `[0, T)`.
///
/// Returns candidates in discovery (pre-order) order together with run
/// counters; callers must time-sort before downstream use. Windows too short
/// to hold a split at distance `mindist` from both boundaries terminate their
/// branch silently, so a too-large `mindist` yields an empty list, not an
/// error.
pub fn find_splits<O: FactorizationOracle>(
    series: SeriesView<'_>,
    oracle: &O,
    rank: usize,
    restarts: usize,
    mindist: usize,
    seed: u64,
    ctx: &ExecutionContext<'_>,
    cancel_every: usize,
) -> Result<(Vec<CandidateSplit>, RuntimeStats), NcpdError> {
    if mindist == 0 {
        return Err(NcpdError::invalid_input("mindist must be >= 1; got 0"));
    }
    if rank == 0 {
        return Err(NcpdError::invalid_input("rank must be >= 1; got 0"));
    }

    let mut state = SearchState {
        series,
        oracle,
        rank,
        restarts,
        mindist,
        seed,
        ctx,
        cancel_every,
        stats: RuntimeStats::default(),
    };

    let mut splits = Vec::new();
    // Explicit work stack; left branch pushed last so it pops first,
    // preserving pre-order discovery.
    let mut windows = vec![(0usize, series.n_rows())];
    while let Some((lower, upper)) = windows.pop() {
        if upper - lower < 2 * mindist {
            continue;
        }
        let lo = lower + mindist;
        let hi = upper - mindist;

        let split = state.resolve_split(lo, hi)?;
        let delta = state.split_delta(split)?;
        splits.push(CandidateSplit {
            split_time: split,
            delta,
        });

        windows.push((split, upper));
        windows.push((lower, split));
    }

    Ok((splits, state.stats))
}
