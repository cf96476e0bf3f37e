// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use ncpd_core::{
    ExecutionContext, NcpdError, SeriesView, StreamPurpose, derive_stream, shuffled_indices,
};
use ncpd_factorize::FactorizationOracle;

use crate::segment::RuntimeStats;

const LEFT_FORK: u64 = 0;
const RIGHT_FORK: u64 = 1;
const SHUFFLE_FORK: u64 = 2;

/// Enclosing block `[start, end)` per admitted split, from midpoints between
/// neighbors and the series bounds at the outside.
///
/// `times` must be strictly ascending and interior to `[0, n_rows)`.
pub fn enclosing_blocks(times: &[usize], n_rows: usize) -> Result<Vec<(usize, usize)>, NcpdError> {
    for pair in times.windows(2) {
        if pair[1] <= pair[0] {
            return Err(NcpdError::invalid_input(format!(
                "split times must be strictly ascending: {} then {}",
                pair[0], pair[1]
            )));
        }
    }
    if let Some((&first, &last)) = times.first().zip(times.last())
        && (first == 0 || last >= n_rows)
    {
        return Err(NcpdError::invalid_input(format!(
            "split times must be interior to [0, {n_rows}): got {first}..={last}"
        )));
    }

    let mut blocks = Vec::with_capacity(times.len());
    let mut start = 0;
    for (i, &time) in times.iter().enumerate() {
        let end = match times.get(i + 1) {
            Some(&next) => (time + next) / 2,
            None => n_rows,
        };
        blocks.push((start, end));
        start = end;
    }
    Ok(blocks)
}

/// One residual-sum sample: left and right partitions of rows `[start, end)`
/// at `split`, scored with forked generators and summed.
fn split_sample<O: FactorizationOracle>(
    series: SeriesView<'_>,
    start: usize,
    split: usize,
    end: usize,
    rank: usize,
    restarts: usize,
    rng: ncpd_core::StableRng,
    oracle: &O,
) -> Result<f64, NcpdError> {
    let left = series.block(start, split)?;
    let right = series.block(split, end)?;
    let left_res = oracle.residual(&left, rank, restarts, rng.fork(LEFT_FORK))?;
    let right_res = oracle.residual(&right, rank, restarts, rng.fork(RIGHT_FORK))?;
    Ok(left_res + right_res)
}

/// Same sample after permuting the enclosing block's rows with `rng`'s
/// shuffle fork; the split stays at its original index.
fn permuted_sample<O: FactorizationOracle>(
    series: SeriesView<'_>,
    start: usize,
    split: usize,
    end: usize,
    rank: usize,
    restarts: usize,
    rng: ncpd_core::StableRng,
    oracle: &O,
) -> Result<f64, NcpdError> {
    let block = series.block(start, end)?;
    let mut shuffle_rng = rng.fork(SHUFFLE_FORK);
    let order = shuffled_indices(&mut shuffle_rng, end - start)?;
    let permuted = block.reordered(&order)?;

    let left = permuted.block(0, split - start)?;
    let right = permuted.block(split - start, end - start)?;
    let left_res = oracle.residual(&left, rank, restarts, rng.fork(LEFT_FORK))?;
    let right_res = oracle.residual(&right, rank, restarts, rng.fork(RIGHT_FORK))?;
    Ok(left_res + right_res)
}

fn sample_count(times: usize, n_rep: usize) -> Result<u64, NcpdError> {
    let calls = (times as u64)
        .checked_mul(n_rep as u64)
        .and_then(|v| v.checked_mul(2))
        .ok_or_else(|| NcpdError::resource_limit("oracle_calls counter overflow"))?;
    Ok(calls)
}

/// Refit distributions: `n_rep` independent refits of the true segmentation
/// per admitted split, keyed by split time.
///
/// No shuffling happens here; the spread comes entirely from restart
/// randomness, which is why each repetition draws its own keyed stream.
pub fn refit_distributions<O: FactorizationOracle>(
    series: SeriesView<'_>,
    times: &[usize],
    rank: usize,
    restarts: usize,
    n_rep: usize,
    seed: u64,
    ctx: &ExecutionContext<'_>,
    cancel_every: usize,
    oracle: &O,
) -> Result<(BTreeMap<usize, Vec<f64>>, RuntimeStats), NcpdError> {
    let blocks = enclosing_blocks(times, series.n_rows())?;

    let mut out = BTreeMap::new();
    for (&split, &(start, end)) in times.iter().zip(blocks.iter()) {
        ctx.check_cancelled()?;
        let mut samples = Vec::with_capacity(n_rep);
        for rep in 0..n_rep {
            ctx.check_cancelled_every(rep, cancel_every)?;
            let rng = derive_stream(seed, split as u64, rep as u64, StreamPurpose::Refit);
            samples.push(split_sample(
                series, start, split, end, rank, restarts, rng, oracle,
            )?);
        }
        out.insert(split, samples);
    }

    Ok((
        out,
        RuntimeStats {
            oracle_calls: sample_count(times.len(), n_rep)?,
        },
    ))
}

/// Permutation null distributions: `n_rep` row-shuffled refits per admitted
/// split, keyed by split time.
///
/// Repetitions are mutually independent and draw keyed streams, so the
/// returned samples are identical whether they ran sequentially or across
/// any number of workers. With the `rayon` feature, `threads` selects a pool
/// scoped to this call; `None` uses the ambient pool.
pub fn permutation_distributions<O: FactorizationOracle>(
    series: SeriesView<'_>,
    times: &[usize],
    rank: usize,
    restarts: usize,
    n_rep: usize,
    seed: u64,
    ctx: &ExecutionContext<'_>,
    cancel_every: usize,
    threads: Option<usize>,
    oracle: &O,
) -> Result<(BTreeMap<usize, Vec<f64>>, RuntimeStats), NcpdError> {
    let blocks = enclosing_blocks(times, series.n_rows())?;

    #[cfg(feature = "rayon")]
    let out = {
        use rayon::prelude::*;

        let run = || -> Result<BTreeMap<usize, Vec<f64>>, NcpdError> {
            let mut out = BTreeMap::new();
            for (&split, &(start, end)) in times.iter().zip(blocks.iter()) {
                ctx.check_cancelled()?;
                // Collected in repetition order, so the result is independent
                // of worker count and scheduling.
                let samples = (0..n_rep)
                    .into_par_iter()
                    .map(|rep| {
                        ctx.check_cancelled_every(rep, cancel_every)?;
                        let rng =
                            derive_stream(seed, split as u64, rep as u64, StreamPurpose::Permutation);
                        permuted_sample(series, start, split, end, rank, restarts, rng, oracle)
                    })
                    .collect::<Result<Vec<f64>, NcpdError>>()?;
                out.insert(split, samples);
            }
            Ok(out)
        };

        match threads {
            Some(n) => {
                // Pool is scoped to this call and torn down on all exit paths.
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| {
                        NcpdError::resource_limit(format!("permutation pool build failed: {e}"))
                    })?;
                pool.install(run)?
            }
            None => run()?,
        }
    };

    #[cfg(not(feature = "rayon"))]
    let out = {
        let _ = threads;
        let mut out = BTreeMap::new();
        for (&split, &(start, end)) in times.iter().zip(blocks.iter()) {
            ctx.check_cancelled()?;
            let mut samples = Vec::with_capacity(n_rep);
            for rep in 0..n_rep {
                ctx.check_cancelled_every(rep, cancel_every)?;
                let rng = derive_stream(seed, split as u64, rep as u64, StreamPurpose::Permutation);
                samples.push(permuted_sample(
                    series, start, split, end, rank, restarts, rng, oracle,
                )?);
            }
            out.insert(split, samples);
        }
        out
    };

    Ok((
        out,
        RuntimeStats {
            oracle_calls: sample_count(times.len(), n_rep)?,
        },
    ))
}
