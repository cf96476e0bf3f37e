// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end pipeline runs against synthetic series with known structure,
//! using the real multiplicative-update NMF oracle.

use ncpd_core::{Alpha, DetectConfig, ExecutionContext, RankChoice, SeriesView, TestKind};
use ncpd_detect::{NmfChangePointDetector, select_rank};
use ncpd_eval::{StationaryConfig, TwoRegimeConfig};
use ncpd_factorize::MultiplicativeNmf;

fn series_view(values: &[f64], n_rows: usize, n_vars: usize) -> SeriesView<'_> {
    SeriesView::new(values, n_rows, n_vars).expect("generated series should be valid input")
}

#[test]
fn recovers_the_reference_single_break() {
    // Two correlation regimes over 200x80 switching at row 100; mindist 99
    // pins the candidate interval onto the break.
    let values = TwoRegimeConfig::default()
        .generate()
        .expect("generation should succeed");
    let view = series_view(&values, 200, 80);

    let detector = NmfChangePointDetector::new(
        MultiplicativeNmf::default(),
        DetectConfig {
            mindist: 99,
            restarts: 2,
            n_rep: 20,
            rank: RankChoice::Fixed(3),
            test_kind: TestKind::Welch,
            seed: 0,
            ..DetectConfig::default()
        },
    )
    .expect("config should be valid");

    let result = detector
        .detect(view, &ExecutionContext::default())
        .expect("detection should succeed");

    assert_eq!(result.rank, 3);
    assert_eq!(
        result.change_points.len(),
        1,
        "exactly one admissible split exists at mindist 99"
    );
    let cp = &result.change_points[0];
    assert!(
        cp.time.abs_diff(100) <= 2,
        "break reported at {} instead of ~100",
        cp.time
    );
    assert!(cp.delta < 0.0, "delta was {}", cp.delta);
    assert!(cp.raw_p < 0.5, "raw p was {}", cp.raw_p);
}

#[test]
fn detection_output_is_identical_across_worker_counts() {
    let values = TwoRegimeConfig {
        n_rows: 120,
        n_vars: 10,
        break_at: 60,
        latent_rank: 2,
        noise_sd: 0.1,
        seed: 3,
    }
    .generate()
    .expect("generation should succeed");
    let view = series_view(&values, 120, 10);

    let run = |threads: Option<usize>| {
        NmfChangePointDetector::new(
            MultiplicativeNmf::default(),
            DetectConfig {
                mindist: 40,
                restarts: 1,
                n_rep: 8,
                rank: RankChoice::Fixed(2),
                seed: 11,
                permutation_threads: threads,
                ..DetectConfig::default()
            },
        )
        .expect("config should be valid")
        .detect(view, &ExecutionContext::default())
        .expect("detection should succeed")
    };

    let sequentialish = run(Some(1));
    let parallel = run(Some(3));
    let ambient = run(None);

    assert_eq!(sequentialish.change_points, parallel.change_points);
    assert_eq!(sequentialish.change_points, ambient.change_points);
    assert_eq!(sequentialish.rank, parallel.rank);
}

#[test]
fn repeated_runs_with_one_seed_are_byte_identical() {
    let values = TwoRegimeConfig {
        n_rows: 120,
        n_vars: 10,
        break_at: 60,
        latent_rank: 2,
        noise_sd: 0.1,
        seed: 5,
    }
    .generate()
    .expect("generation should succeed");
    let view = series_view(&values, 120, 10);

    let run = || {
        NmfChangePointDetector::new(
            MultiplicativeNmf::default(),
            DetectConfig {
                mindist: 40,
                restarts: 2,
                n_rep: 10,
                rank: RankChoice::Fixed(2),
                alpha: Alpha::RawPValues,
                seed: 42,
                ..DetectConfig::default()
            },
        )
        .expect("config should be valid")
        .detect(view, &ExecutionContext::default())
        .expect("detection should succeed")
    };

    let first = run();
    let second = run();
    assert_eq!(first.rank, second.rank);
    assert_eq!(first.change_points, second.change_points);
}

#[test]
fn stationary_series_rarely_yield_significant_points() {
    // Statistical property over several seeds: with no structural break,
    // most runs should end with no significant change point.
    let mut flagged = 0usize;
    let seeds = [0u64, 1, 2, 3, 4, 5];
    for &seed in &seeds {
        let values = StationaryConfig {
            n_rows: 120,
            n_vars: 10,
            latent_rank: 2,
            noise_sd: 0.1,
            seed,
        }
        .generate()
        .expect("generation should succeed");
        let view = series_view(&values, 120, 10);

        let result = NmfChangePointDetector::new(
            MultiplicativeNmf::default(),
            DetectConfig {
                mindist: 40,
                restarts: 1,
                n_rep: 10,
                rank: RankChoice::Fixed(2),
                seed,
                ..DetectConfig::default()
            },
        )
        .expect("config should be valid")
        .detect(view, &ExecutionContext::default())
        .expect("detection should succeed");

        if !result.significant().is_empty() {
            flagged += 1;
        }
    }

    assert!(
        flagged <= seeds.len() / 2,
        "{flagged} of {} stationary seeds produced significant change points",
        seeds.len()
    );
}

#[test]
fn oversized_mindist_returns_empty_without_error() {
    let values = StationaryConfig {
        n_rows: 100,
        n_vars: 8,
        latent_rank: 2,
        noise_sd: 0.1,
        seed: 0,
    }
    .generate()
    .expect("generation should succeed");
    let view = series_view(&values, 100, 8);

    let result = NmfChangePointDetector::new(
        MultiplicativeNmf::default(),
        DetectConfig {
            mindist: 50,
            restarts: 1,
            n_rep: 5,
            rank: RankChoice::Fixed(2),
            ..DetectConfig::default()
        },
    )
    .expect("config should be valid")
    .detect(view, &ExecutionContext::default())
    .expect("oversized mindist is not an error");

    assert!(result.change_points.is_empty());
    assert_eq!(result.diagnostics.oracle_calls, 0);
}

#[test]
fn rank_selection_is_idempotent_on_real_data() {
    let values = TwoRegimeConfig {
        n_rows: 120,
        n_vars: 10,
        break_at: 60,
        latent_rank: 2,
        noise_sd: 0.1,
        seed: 9,
    }
    .generate()
    .expect("generation should succeed");
    let view = series_view(&values, 120, 10);

    let oracle = MultiplicativeNmf::default();
    let ctx = ExecutionContext::default();
    let (first, _) = select_rank(view, &oracle, 2, 21, &ctx).expect("first selection");
    let (second, _) = select_rank(view, &oracle, 2, 21, &ctx).expect("second selection");

    assert_eq!(first, second);
    assert!(first >= 2, "rank search starts its comparison at 2");
    assert!(first <= 10, "rank is capped by the variable count");
}
