// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use ncpd_core::{Alpha, ChangePoint, NcpdError, TestKind, TestOutcome};
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

use crate::segment::CandidateSplit;

fn validate_samples(samples: &[f64], label: &str) -> Result<(), NcpdError> {
    if samples.len() < 2 {
        return Err(NcpdError::degenerate_sample(format!(
            "{label} distribution has {} sample(s); minimum is 2",
            samples.len()
        )));
    }
    if let Some(bad) = samples.iter().find(|v| !v.is_finite()) {
        return Err(NcpdError::invalid_input(format!(
            "{label} distribution contains non-finite sample {bad}"
        )));
    }
    Ok(())
}

fn mean_and_variance(samples: &[f64]) -> (f64, f64) {
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let variance = samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, variance)
}

/// One-sided Welch t-test, alternative "refit mean is smaller".
fn welch_p(refit: &[f64], null: &[f64]) -> Result<f64, NcpdError> {
    validate_samples(refit, "refit")?;
    validate_samples(null, "null")?;

    let (m1, v1) = mean_and_variance(refit);
    let (m2, v2) = mean_and_variance(null);
    let (n1, n2) = (refit.len() as f64, null.len() as f64);

    let se2 = v1 / n1 + v2 / n2;
    if se2 <= 0.0 {
        // Both samples constant: the statistic degenerates to a sign test.
        return Ok(if m1 < m2 {
            0.0
        } else if m1 > m2 {
            1.0
        } else {
            0.5
        });
    }

    // Welch-Satterthwaite degrees of freedom.
    let df = se2.powi(2) / ((v1 / n1).powi(2) / (n1 - 1.0) + (v2 / n2).powi(2) / (n2 - 1.0));
    let t = (m1 - m2) / se2.sqrt();

    let dist = StudentsT::new(0.0, 1.0, df).map_err(|e| {
        NcpdError::degenerate_sample(format!("t distribution with df={df} is invalid: {e}"))
    })?;
    Ok(dist.cdf(t))
}

/// Average ranks (1-based) of the combined sample, ties sharing their mean
/// rank, plus the tie-group sizes for the variance correction.
fn average_ranks(combined: &mut [(f64, usize)]) -> (Vec<f64>, Vec<usize>) {
    combined.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut ranks = vec![0.0; combined.len()];
    let mut tie_sizes = Vec::new();
    let mut i = 0;
    while i < combined.len() {
        let mut j = i;
        while j < combined.len() && combined[j].0 == combined[i].0 {
            j += 1;
        }
        let shared = (i + 1 + j) as f64 / 2.0;
        for entry in &combined[i..j] {
            ranks[entry.1] = shared;
        }
        if j - i > 1 {
            tie_sizes.push(j - i);
        }
        i = j;
    }
    (ranks, tie_sizes)
}

/// One-sided Wilcoxon rank-sum (Mann-Whitney) with normal approximation,
/// tie and continuity corrections; alternative "refit is smaller".
fn rank_sum_p(refit: &[f64], null: &[f64]) -> Result<f64, NcpdError> {
    validate_samples(refit, "refit")?;
    validate_samples(null, "null")?;

    let (n1, n2) = (refit.len(), null.len());
    let n = n1 + n2;
    let mut combined: Vec<(f64, usize)> = refit
        .iter()
        .chain(null.iter())
        .copied()
        .enumerate()
        .map(|(i, v)| (v, i))
        .collect();
    let (ranks, tie_sizes) = average_ranks(&mut combined);

    let r1: f64 = ranks[..n1].iter().sum();
    let u1 = r1 - (n1 * (n1 + 1)) as f64 / 2.0;

    let mu = (n1 * n2) as f64 / 2.0;
    let tie_term: f64 = tie_sizes
        .iter()
        .map(|&t| (t * t * t - t) as f64)
        .sum::<f64>()
        / (n * (n - 1)) as f64;
    let sigma2 = (n1 * n2) as f64 / 12.0 * ((n + 1) as f64 - tie_term);
    if sigma2 <= 0.0 {
        // Every observation identical: no ordering evidence either way.
        return Ok(0.5);
    }

    let z = (u1 - mu + 0.5) / sigma2.sqrt();
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| NcpdError::degenerate_sample(format!("standard normal unavailable: {e}")))?;
    Ok(normal.cdf(z))
}

/// One-sided two-sample Kolmogorov-Smirnov, alternative "refit is smaller"
/// (refit CDF above the null CDF), with the asymptotic tail approximation
/// `p = exp(-2 d^2 m n / (m + n))`.
fn ks_p(refit: &[f64], null: &[f64]) -> Result<f64, NcpdError> {
    validate_samples(refit, "refit")?;
    validate_samples(null, "null")?;

    let mut r = refit.to_vec();
    let mut s = null.to_vec();
    r.sort_by(f64::total_cmp);
    s.sort_by(f64::total_cmp);

    let (m, n) = (r.len(), s.len());
    let (mut i, mut j) = (0usize, 0usize);
    let mut d_plus: f64 = 0.0;
    while i < m || j < n {
        let v = match (r.get(i), s.get(j)) {
            (Some(&a), Some(&b)) => a.min(b),
            (Some(&a), None) => a,
            (None, Some(&b)) => b,
            (None, None) => break,
        };
        while i < m && r[i] <= v {
            i += 1;
        }
        while j < n && s[j] <= v {
            j += 1;
        }
        d_plus = d_plus.max(i as f64 / m as f64 - j as f64 / n as f64);
    }

    let scale = (m * n) as f64 / (m + n) as f64;
    Ok((-2.0 * d_plus * d_plus * scale).exp().min(1.0))
}

/// Benjamini-Hochberg step-up adjustment.
///
/// Returned values are in input order, each clamped to `[raw, 1]`.
pub fn benjamini_hochberg(raw: &[f64]) -> Vec<f64> {
    let m = raw.len();
    if m == 0 {
        return Vec::new();
    }

    let mut order: Vec<usize> = (0..m).collect();
    order.sort_by(|&a, &b| raw[a].total_cmp(&raw[b]));

    let mut adjusted = vec![0.0; m];
    let mut running_min = 1.0f64;
    for (i, &idx) in order.iter().enumerate().rev() {
        let scaled = raw[idx] * m as f64 / (i + 1) as f64;
        running_min = running_min.min(scaled).min(1.0);
        adjusted[idx] = running_min;
    }
    adjusted
}

fn raw_p(test_kind: TestKind, refit: &[f64], null: &[f64]) -> Result<f64, NcpdError> {
    let p = match test_kind {
        TestKind::Welch => welch_p(refit, null)?,
        TestKind::RankSum => rank_sum_p(refit, null)?,
        TestKind::KolmogorovSmirnov => ks_p(refit, null)?,
    };
    if !p.is_finite() {
        return Err(NcpdError::degenerate_sample(format!(
            "two-sample test produced non-finite p-value {p}"
        )));
    }
    Ok(p.clamp(0.0, 1.0))
}

/// Tests each admitted candidate's refit distribution against its permutation
/// null and applies BH correction across the tested set.
///
/// `candidates` must be time-sorted with `delta < 0`; the output preserves
/// that order. The correction count is the number of candidates tested here,
/// not the number the segmentation originally proposed.
pub fn test_candidates(
    candidates: &[CandidateSplit],
    refit: &BTreeMap<usize, Vec<f64>>,
    null: &BTreeMap<usize, Vec<f64>>,
    alpha: Alpha,
    test_kind: TestKind,
) -> Result<Vec<ChangePoint>, NcpdError> {
    let mut raw = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let time = candidate.split_time;
        let refit_samples = refit.get(&time).ok_or_else(|| {
            NcpdError::invalid_input(format!("no refit distribution for split {time}"))
        })?;
        let null_samples = null.get(&time).ok_or_else(|| {
            NcpdError::invalid_input(format!("no null distribution for split {time}"))
        })?;
        raw.push(raw_p(test_kind, refit_samples, null_samples)?);
    }

    let adjusted = benjamini_hochberg(&raw);

    Ok(candidates
        .iter()
        .zip(raw.iter().zip(adjusted.iter()))
        .map(|(candidate, (&raw_p, &adjusted_p))| ChangePoint {
            time: candidate.split_time,
            delta: candidate.delta,
            raw_p,
            adjusted_p,
            outcome: match alpha {
                Alpha::Threshold(level) => TestOutcome::Significant(adjusted_p < level),
                Alpha::RawPValues => TestOutcome::AdjustedP(adjusted_p),
            },
        })
        .collect())
}
