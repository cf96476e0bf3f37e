// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use nalgebra::DMatrix;
use ncpd_core::{BlockView, NcpdError, StableRng};

use crate::FactorizationOracle;

/// Tuning knobs for the multiplicative-update NMF solver.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NmfConfig {
    /// Update iterations per restart.
    pub max_iter: usize,
    /// Relative residual change below which a restart stops early.
    pub tol: f64,
    /// Denominator floor keeping multiplicative updates finite.
    pub eps: f64,
}

impl Default for NmfConfig {
    fn default() -> Self {
        Self {
            max_iter: 200,
            tol: 1e-4,
            eps: 1e-9,
        }
    }
}

impl NmfConfig {
    pub fn validate(&self) -> Result<(), NcpdError> {
        if self.max_iter == 0 {
            return Err(NcpdError::invalid_input(
                "NmfConfig.max_iter must be >= 1; got 0",
            ));
        }
        if !(self.tol.is_finite() && self.tol >= 0.0) {
            return Err(NcpdError::invalid_input(format!(
                "NmfConfig.tol must be finite and >= 0; got {}",
                self.tol
            )));
        }
        if !(self.eps.is_finite() && self.eps > 0.0) {
            return Err(NcpdError::invalid_input(format!(
                "NmfConfig.eps must be finite and > 0; got {}",
                self.eps
            )));
        }
        Ok(())
    }
}

/// Lee-Seung multiplicative-update NMF with Frobenius objective.
///
/// Factors a block `V` (rows x vars) as `W * H` with `W >= 0`, `H >= 0`, and
/// reports the Frobenius norm `||V - W H||` of the best restart. Restarts
/// differ only in their random initialization; the iteration itself is
/// deterministic, so the oracle as a whole is a pure function of
/// `(block, rank, restarts, rng)`.
#[derive(Clone, Copy, Debug, Default)]
pub struct MultiplicativeNmf {
    config: NmfConfig,
}

impl MultiplicativeNmf {
    pub fn new(config: NmfConfig) -> Result<Self, NcpdError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &NmfConfig {
        &self.config
    }

    fn fit_once(&self, v: &DMatrix<f64>, rank: usize, rng: &mut StableRng) -> f64 {
        let (n, p) = (v.nrows(), v.ncols());
        // Init around sqrt(mean(V)/k) so W*H starts on V's scale.
        let scale = (v.mean() / rank as f64).sqrt().max(self.config.eps);
        let mut w = DMatrix::from_fn(n, rank, |_, _| rng.next_open01() * scale);
        let mut h = DMatrix::from_fn(rank, p, |_, _| rng.next_open01() * scale);

        let eps = self.config.eps;
        let mut prev_residual = f64::INFINITY;
        for _ in 0..self.config.max_iter {
            // H <- H .* (W'V) ./ (W'WH + eps)
            let wt = w.transpose();
            let numer_h = &wt * v;
            let denom_h = &wt * &w * &h;
            h.zip_zip_apply(&numer_h, &denom_h, |hij, num, den| {
                *hij *= num / (den + eps);
            });

            // W <- W .* (VH') ./ (WHH' + eps)
            let ht = h.transpose();
            let numer_w = v * &ht;
            let denom_w = &w * &h * &ht;
            w.zip_zip_apply(&numer_w, &denom_w, |wij, num, den| {
                *wij *= num / (den + eps);
            });

            let residual = (v - &w * &h).norm();
            if prev_residual.is_finite() {
                let change = (prev_residual - residual).abs() / prev_residual.max(eps);
                if change < self.config.tol {
                    return residual;
                }
            }
            prev_residual = residual;
        }

        prev_residual
    }
}

impl FactorizationOracle for MultiplicativeNmf {
    fn name(&self) -> &'static str {
        "nmf-multiplicative"
    }

    fn residual(
        &self,
        block: &BlockView<'_>,
        rank: usize,
        restarts: usize,
        rng: StableRng,
    ) -> Result<f64, NcpdError> {
        if rank == 0 {
            return Err(NcpdError::invalid_input("nmf rank must be >= 1; got 0"));
        }
        if restarts == 0 {
            return Err(NcpdError::invalid_input("nmf restarts must be >= 1; got 0"));
        }
        if block.n_rows() < rank {
            return Err(NcpdError::invalid_input(format!(
                "block with {} rows cannot support rank {rank}",
                block.n_rows()
            )));
        }

        let v = DMatrix::from_row_slice(block.n_rows(), block.n_vars(), block.values());

        let mut best = f64::INFINITY;
        let mut rng = rng;
        for _ in 0..restarts {
            let residual = self.fit_once(&v, rank, &mut rng);
            if !residual.is_finite() {
                return Err(NcpdError::oracle_failure(format!(
                    "nmf produced non-finite residual at rank {rank} on a {}x{} block",
                    block.n_rows(),
                    block.n_vars()
                )));
            }
            if residual < best {
                best = residual;
            }
        }

        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use ncpd_core::{SeriesView, StableRng};

    use super::{MultiplicativeNmf, NmfConfig};
    use crate::FactorizationOracle;

    fn low_rank_series(n_rows: usize, n_vars: usize, rank: usize, seed: u64) -> Vec<f64> {
        let mut rng = StableRng::new(seed);
        let w: Vec<f64> = (0..n_rows * rank).map(|_| rng.next_open01() + 0.1).collect();
        let h: Vec<f64> = (0..rank * n_vars).map(|_| rng.next_open01() + 0.1).collect();

        let mut values = vec![0.0; n_rows * n_vars];
        for t in 0..n_rows {
            for j in 0..n_vars {
                let mut acc = 0.0;
                for k in 0..rank {
                    acc += w[t * rank + k] * h[k * n_vars + j];
                }
                values[t * n_vars + j] = acc;
            }
        }
        values
    }

    #[test]
    fn config_validation_rejects_bad_values() {
        assert!(NmfConfig::default().validate().is_ok());
        assert!(
            NmfConfig {
                max_iter: 0,
                ..NmfConfig::default()
            }
            .validate()
            .is_err()
        );
        assert!(
            NmfConfig {
                tol: -1.0,
                ..NmfConfig::default()
            }
            .validate()
            .is_err()
        );
        assert!(
            NmfConfig {
                eps: 0.0,
                ..NmfConfig::default()
            }
            .validate()
            .is_err()
        );
        assert!(MultiplicativeNmf::new(NmfConfig::default()).is_ok());
    }

    #[test]
    fn residual_rejects_zero_rank_restarts_and_short_blocks() {
        let values = low_rank_series(6, 4, 2, 1);
        let view = SeriesView::new(&values, 6, 4).expect("series should be valid");
        let block = view.full_block();
        let oracle = MultiplicativeNmf::default();

        assert!(oracle.residual(&block, 0, 1, StableRng::new(0)).is_err());
        assert!(oracle.residual(&block, 2, 0, StableRng::new(0)).is_err());

        let short = view.block(0, 1).expect("single-row block");
        assert!(oracle.residual(&short, 2, 1, StableRng::new(0)).is_err());
    }

    #[test]
    fn residual_is_deterministic_for_fixed_generator() {
        let values = low_rank_series(20, 8, 3, 2);
        let view = SeriesView::new(&values, 20, 8).expect("series should be valid");
        let block = view.full_block();
        let oracle = MultiplicativeNmf::default();

        let a = oracle
            .residual(&block, 3, 4, StableRng::new(17))
            .expect("fit should succeed");
        let b = oracle
            .residual(&block, 3, 4, StableRng::new(17))
            .expect("fit should succeed");
        assert_eq!(a, b);

        let c = oracle
            .residual(&block, 3, 4, StableRng::new(18))
            .expect("fit should succeed");
        assert_ne!(a, c, "different generators should explore different inits");
    }

    #[test]
    fn exact_low_rank_data_fits_nearly_perfectly() {
        let values = low_rank_series(30, 10, 2, 5);
        let view = SeriesView::new(&values, 30, 10).expect("series should be valid");
        let block = view.full_block();
        let oracle = MultiplicativeNmf::new(NmfConfig {
            max_iter: 500,
            tol: 1e-9,
            ..NmfConfig::default()
        })
        .expect("config should be valid");

        let data_norm: f64 = values.iter().map(|v| v * v).sum::<f64>().sqrt();
        let residual = oracle
            .residual(&block, 2, 5, StableRng::new(3))
            .expect("fit should succeed");
        assert!(
            residual < 0.05 * data_norm,
            "rank-2 data should be reconstructed well: residual {residual}, norm {data_norm}"
        );
    }

    #[test]
    fn larger_rank_never_fits_worse() {
        let values = low_rank_series(24, 12, 3, 9);
        let view = SeriesView::new(&values, 24, 12).expect("series should be valid");
        let block = view.full_block();
        let oracle = MultiplicativeNmf::new(NmfConfig {
            max_iter: 400,
            tol: 1e-8,
            ..NmfConfig::default()
        })
        .expect("config should be valid");

        let r1 = oracle
            .residual(&block, 1, 6, StableRng::new(4))
            .expect("rank-1 fit");
        let r3 = oracle
            .residual(&block, 3, 6, StableRng::new(4))
            .expect("rank-3 fit");
        assert!(
            r3 <= r1 * 1.05,
            "rank 3 should fit rank-3 data at least as well as rank 1: {r3} vs {r1}"
        );
    }

    #[test]
    fn more_restarts_never_increase_the_reported_residual() {
        let values = low_rank_series(16, 6, 2, 11);
        let view = SeriesView::new(&values, 16, 6).expect("series should be valid");
        let block = view.full_block();
        let oracle = MultiplicativeNmf::default();

        let one = oracle
            .residual(&block, 2, 1, StableRng::new(8))
            .expect("single restart");
        let many = oracle
            .residual(&block, 2, 8, StableRng::new(8))
            .expect("eight restarts");
        assert!(many <= one, "min over restarts: {many} > {one}");
    }
}
