// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::time::Instant;

use ncpd_core::{
    DetectConfig, DetectionResult, Diagnostics, ExecutionContext, NcpdError, RankChoice,
    SeriesView, validate_change_points,
};
use ncpd_factorize::FactorizationOracle;

use crate::rank::select_rank;
use crate::resample::{permutation_distributions, refit_distributions};
use crate::segment::{CandidateSplit, find_splits};
use crate::significance::test_candidates;

const ALGORITHM_NAME: &str = "binary-segmentation";

/// Full detection pipeline over a strictly positive multivariate series.
///
/// Sequences rank resolution, the bisection search, refit and permutation
/// resampling, and significance testing. The detector owns its oracle and
/// configuration; one instance can serve many series.
#[derive(Clone, Debug)]
pub struct NmfChangePointDetector<O> {
    oracle: O,
    config: DetectConfig,
}

impl<O: FactorizationOracle> NmfChangePointDetector<O> {
    pub fn new(oracle: O, config: DetectConfig) -> Result<Self, NcpdError> {
        config.validate()?;
        Ok(Self { oracle, config })
    }

    pub fn config(&self) -> &DetectConfig {
        &self.config
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Runs the whole pipeline and assembles the result with diagnostics.
    ///
    /// Fails fast on invalid input or oracle failure; a `mindist` too large
    /// for the series is not an error and yields an empty result, as does a
    /// search where no candidate improves the fit.
    pub fn detect(
        &self,
        series: SeriesView<'_>,
        ctx: &ExecutionContext<'_>,
    ) -> Result<DetectionResult, NcpdError> {
        let started = Instant::now();
        let cancel_every = self.config.normalized_cancel_check_every();

        let mut diagnostics = Diagnostics {
            n_rows: series.n_rows(),
            n_vars: series.n_vars(),
            algorithm: ALGORITHM_NAME.into(),
            oracle: self.oracle.name().into(),
            seed: self.config.seed,
            thread_count: self.thread_count(),
            ..Diagnostics::default()
        };

        let rank = match self.config.rank {
            RankChoice::Fixed(rank) => rank,
            RankChoice::Auto => {
                let (rank, stats) = select_rank(
                    series,
                    &self.oracle,
                    self.config.restarts,
                    self.config.seed,
                    ctx,
                )?;
                diagnostics.oracle_calls += stats.oracle_calls;
                diagnostics.push_note(format!("rank resolved to {rank} by permutation comparison"));
                rank
            }
        };
        if self.config.mindist < rank {
            return Err(NcpdError::invalid_input(format!(
                "mindist ({}) must be >= rank ({rank}) so every scored window \
                 supports the factorization",
                self.config.mindist
            )));
        }
        ctx.report_progress(0.1);

        let (splits, search_stats) = find_splits(
            series,
            &self.oracle,
            rank,
            self.config.restarts,
            self.config.mindist,
            self.config.seed,
            ctx,
            cancel_every,
        )?;
        diagnostics.oracle_calls += search_stats.oracle_calls;
        ctx.record_scalar("detect.candidates", splits.len() as f64);
        ctx.report_progress(0.4);

        let admitted = admitted_candidates(&splits);
        ctx.record_scalar("detect.admitted", admitted.len() as f64);
        if admitted.is_empty() {
            if splits.is_empty() {
                diagnostics.push_note(format!(
                    "mindist {} leaves no admissible split position in {} rows",
                    self.config.mindist, series.n_rows()
                ));
            } else {
                diagnostics
                    .push_note("no candidate improved the fit; significance phases skipped");
            }
            return Ok(self.finish(rank, Vec::new(), diagnostics, started, ctx));
        }

        let times: Vec<usize> = admitted.iter().map(|c| c.split_time).collect();
        let (refit, refit_stats) = refit_distributions(
            series,
            &times,
            rank,
            self.config.restarts,
            self.config.n_rep,
            self.config.seed,
            ctx,
            cancel_every,
            &self.oracle,
        )?;
        diagnostics.oracle_calls += refit_stats.oracle_calls;
        ctx.report_progress(0.7);

        let (null, null_stats) = permutation_distributions(
            series,
            &times,
            rank,
            self.config.restarts,
            self.config.n_rep,
            self.config.seed,
            ctx,
            cancel_every,
            self.config.permutation_threads,
            &self.oracle,
        )?;
        diagnostics.oracle_calls += null_stats.oracle_calls;
        ctx.report_progress(0.9);

        let change_points = test_candidates(
            &admitted,
            &refit,
            &null,
            self.config.alpha,
            self.config.test_kind,
        )?;
        validate_change_points(&change_points)?;

        Ok(self.finish(rank, change_points, diagnostics, started, ctx))
    }

    fn finish(
        &self,
        rank: usize,
        change_points: Vec<ncpd_core::ChangePoint>,
        mut diagnostics: Diagnostics,
        started: Instant,
        ctx: &ExecutionContext<'_>,
    ) -> DetectionResult {
        diagnostics.runtime_ms = started.elapsed().as_secs_f64() * 1e3;
        ctx.record_scalar("detect.oracle_calls", diagnostics.oracle_calls as f64);
        ctx.record_scalar("detect.runtime_ms", diagnostics.runtime_ms);
        ctx.report_progress(1.0);

        DetectionResult {
            rank,
            change_points,
            diagnostics,
        }
    }

    fn thread_count(&self) -> usize {
        #[cfg(feature = "rayon")]
        {
            self.config
                .permutation_threads
                .unwrap_or_else(rayon::current_num_threads)
        }
        #[cfg(not(feature = "rayon"))]
        {
            1
        }
    }
}

/// Admitted candidates, time-sorted. Split times are unique by construction
/// (each recursion branch works a disjoint window), so no dedup is needed.
fn admitted_candidates(splits: &[CandidateSplit]) -> Vec<CandidateSplit> {
    let mut admitted: Vec<CandidateSplit> =
        splits.iter().filter(|s| s.delta < 0.0).copied().collect();
    admitted.sort_by_key(|s| s.split_time);
    admitted
}
