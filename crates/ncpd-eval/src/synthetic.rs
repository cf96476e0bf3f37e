// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use ncpd_core::NcpdError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;

const FACTOR_LOADING: f64 = 0.8;

/// Variable-to-factor assignment, giving each regime its own correlation
/// structure. `Interleaved` groups variables `j % rank`; `Blocked` groups
/// them in contiguous runs. Two regimes using different schemes co-group
/// different variable pairs, which is exactly the structure the detector
/// looks for.
#[derive(Clone, Copy, Debug)]
enum Grouping {
    Interleaved,
    Blocked,
}

impl Grouping {
    fn factor_of(self, var: usize, n_vars: usize, rank: usize) -> usize {
        match self {
            Grouping::Interleaved => var % rank,
            Grouping::Blocked => (var * rank / n_vars).min(rank - 1),
        }
    }
}

fn validate_shape(n_rows: usize, n_vars: usize, rank: usize, noise_sd: f64) -> Result<(), NcpdError> {
    if n_rows == 0 {
        return Err(NcpdError::invalid_input("n_rows must be >= 1"));
    }
    if n_vars == 0 {
        return Err(NcpdError::invalid_input("n_vars must be >= 1"));
    }
    if rank == 0 || rank > n_vars {
        return Err(NcpdError::invalid_input(format!(
            "latent_rank must be in 1..={n_vars}; got {rank}"
        )));
    }
    if !(noise_sd.is_finite() && noise_sd >= 0.0) {
        return Err(NcpdError::invalid_input(format!(
            "noise_sd must be finite and >= 0; got {noise_sd}"
        )));
    }
    Ok(())
}

fn emit_rows(
    values: &mut Vec<f64>,
    n_rows: usize,
    n_vars: usize,
    rank: usize,
    grouping: Grouping,
    noise_sd: f64,
    rng: &mut StdRng,
    standard: Normal<f64>,
) {
    for _ in 0..n_rows {
        let factors: Vec<f64> = (0..rank).map(|_| rng.sample(standard)).collect();
        for j in 0..n_vars {
            let latent = FACTOR_LOADING * factors[grouping.factor_of(j, n_vars, rank)];
            let noise = noise_sd * rng.sample(standard);
            // exp keeps every entry strictly positive.
            values.push((latent + noise).exp());
        }
    }
}

fn standard_normal() -> Result<Normal<f64>, NcpdError> {
    Normal::new(0.0, 1.0)
        .map_err(|e| NcpdError::invalid_input(format!("standard normal unavailable: {e}")))
}

/// Two latent-factor regimes switching grouping scheme at `break_at`.
///
/// Rows `[0, break_at)` use interleaved variable grouping, rows
/// `[break_at, n_rows)` use blocked grouping; the marginal scale of every
/// variable stays the same, so only the correlation structure changes.
#[derive(Clone, Copy, Debug)]
pub struct TwoRegimeConfig {
    pub n_rows: usize,
    pub n_vars: usize,
    pub break_at: usize,
    pub latent_rank: usize,
    pub noise_sd: f64,
    pub seed: u64,
}

impl Default for TwoRegimeConfig {
    fn default() -> Self {
        Self {
            n_rows: 200,
            n_vars: 80,
            break_at: 100,
            latent_rank: 3,
            noise_sd: 0.1,
            seed: 0,
        }
    }
}

impl TwoRegimeConfig {
    pub fn validate(&self) -> Result<(), NcpdError> {
        validate_shape(self.n_rows, self.n_vars, self.latent_rank, self.noise_sd)?;
        if self.break_at == 0 || self.break_at >= self.n_rows {
            return Err(NcpdError::invalid_input(format!(
                "break_at must be interior to [0, {}); got {}",
                self.n_rows, self.break_at
            )));
        }
        if self.latent_rank < 2 {
            return Err(NcpdError::invalid_input(
                "latent_rank must be >= 2 so the two groupings differ",
            ));
        }
        Ok(())
    }

    /// Row-major `n_rows * n_vars` values, strictly positive.
    pub fn generate(&self) -> Result<Vec<f64>, NcpdError> {
        self.validate()?;
        let standard = standard_normal()?;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut values = Vec::with_capacity(self.n_rows * self.n_vars);

        emit_rows(
            &mut values,
            self.break_at,
            self.n_vars,
            self.latent_rank,
            Grouping::Interleaved,
            self.noise_sd,
            &mut rng,
            standard,
        );
        emit_rows(
            &mut values,
            self.n_rows - self.break_at,
            self.n_vars,
            self.latent_rank,
            Grouping::Blocked,
            self.noise_sd,
            &mut rng,
            standard,
        );
        Ok(values)
    }
}

/// One latent-factor regime for the whole series; no structural break.
#[derive(Clone, Copy, Debug)]
pub struct StationaryConfig {
    pub n_rows: usize,
    pub n_vars: usize,
    pub latent_rank: usize,
    pub noise_sd: f64,
    pub seed: u64,
}

impl Default for StationaryConfig {
    fn default() -> Self {
        Self {
            n_rows: 200,
            n_vars: 80,
            latent_rank: 3,
            noise_sd: 0.1,
            seed: 0,
        }
    }
}

impl StationaryConfig {
    pub fn validate(&self) -> Result<(), NcpdError> {
        validate_shape(self.n_rows, self.n_vars, self.latent_rank, self.noise_sd)
    }

    /// Row-major `n_rows * n_vars` values, strictly positive.
    pub fn generate(&self) -> Result<Vec<f64>, NcpdError> {
        self.validate()?;
        let standard = standard_normal()?;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut values = Vec::with_capacity(self.n_rows * self.n_vars);
        emit_rows(
            &mut values,
            self.n_rows,
            self.n_vars,
            self.latent_rank,
            Grouping::Interleaved,
            self.noise_sd,
            &mut rng,
            standard,
        );
        Ok(values)
    }
}
