// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::NcpdError;

/// Zero-copy view over a T x p row-major series of strictly positive values.
///
/// Rows are time-ordered observations, columns are variables. Strict
/// positivity is a precondition of the non-negative factorization oracle and
/// is validated once at construction; every block taken from a valid view is
/// therefore also valid oracle input.
#[derive(Clone, Copy, Debug)]
pub struct SeriesView<'a> {
    values: &'a [f64],
    n_rows: usize,
    n_vars: usize,
}

impl<'a> SeriesView<'a> {
    /// Constructs a validated `SeriesView`.
    pub fn new(values: &'a [f64], n_rows: usize, n_vars: usize) -> Result<Self, NcpdError> {
        if n_rows == 0 {
            return Err(NcpdError::invalid_input("n_rows must be >= 1"));
        }
        if n_vars == 0 {
            return Err(NcpdError::invalid_input("n_vars must be >= 1"));
        }

        let expected_len = n_rows.checked_mul(n_vars).ok_or_else(|| {
            NcpdError::invalid_input("n_rows*n_vars overflow while validating shape")
        })?;
        if values.len() != expected_len {
            return Err(NcpdError::invalid_input(format!(
                "value length mismatch: got {}, expected {expected_len} (n_rows={n_rows}, n_vars={n_vars})",
                values.len()
            )));
        }

        if let Some((idx, value)) = values
            .iter()
            .copied()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || *v <= 0.0)
        {
            return Err(NcpdError::invalid_input(format!(
                "all entries must be finite and strictly positive: index {idx} (row {}, var {}) has {value}",
                idx / n_vars,
                idx % n_vars
            )));
        }

        Ok(Self {
            values,
            n_rows,
            n_vars,
        })
    }

    /// Number of time-ordered rows (T).
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of variables per observation (p).
    pub fn n_vars(&self) -> usize {
        self.n_vars
    }

    /// Returns row `t` as a slice of `n_vars` values.
    pub fn row(&self, t: usize) -> &'a [f64] {
        let start = t * self.n_vars;
        &self.values[start..start + self.n_vars]
    }

    /// Returns a view over the half-open row range `[start, end)`.
    pub fn block(&self, start: usize, end: usize) -> Result<BlockView<'a>, NcpdError> {
        if start >= end {
            return Err(NcpdError::invalid_input(format!(
                "block range must be non-empty: [{start}, {end})"
            )));
        }
        if end > self.n_rows {
            return Err(NcpdError::invalid_input(format!(
                "block range [{start}, {end}) exceeds n_rows={}",
                self.n_rows
            )));
        }

        Ok(BlockView {
            values: &self.values[start * self.n_vars..end * self.n_vars],
            n_rows: end - start,
            n_vars: self.n_vars,
        })
    }

    /// Returns a view over the full series.
    pub fn full_block(&self) -> BlockView<'a> {
        BlockView {
            values: self.values,
            n_rows: self.n_rows,
            n_vars: self.n_vars,
        }
    }
}

/// Borrowed contiguous block of rows taken from a [`SeriesView`].
#[derive(Clone, Copy, Debug)]
pub struct BlockView<'a> {
    values: &'a [f64],
    n_rows: usize,
    n_vars: usize,
}

impl<'a> BlockView<'a> {
    /// Number of rows in the block.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of variables per row.
    pub fn n_vars(&self) -> usize {
        self.n_vars
    }

    /// Row-major backing slice of length `n_rows * n_vars`.
    pub fn values(&self) -> &'a [f64] {
        self.values
    }

    /// Returns row `i` (block-local index) as a slice of `n_vars` values.
    pub fn row(&self, i: usize) -> &'a [f64] {
        let start = i * self.n_vars;
        &self.values[start..start + self.n_vars]
    }

    /// Materializes an owned block with rows copied in `order`.
    ///
    /// `order` must be a permutation of `0..n_rows`; only its length and
    /// bounds are checked here, duplicates are the caller's responsibility
    /// (Fisher-Yates output satisfies both).
    pub fn reordered(&self, order: &[usize]) -> Result<Block, NcpdError> {
        if order.len() != self.n_rows {
            return Err(NcpdError::invalid_input(format!(
                "row order length mismatch: got {}, expected {}",
                order.len(),
                self.n_rows
            )));
        }

        let mut values = Vec::with_capacity(self.values.len());
        for &src in order {
            if src >= self.n_rows {
                return Err(NcpdError::invalid_input(format!(
                    "row order index {src} out of bounds for block with {} rows",
                    self.n_rows
                )));
            }
            values.extend_from_slice(self.row(src));
        }

        Ok(Block {
            values,
            n_rows: self.n_rows,
            n_vars: self.n_vars,
        })
    }
}

/// Owned row-major block, used where permuted rows must be materialized.
#[derive(Clone, Debug)]
pub struct Block {
    values: Vec<f64>,
    n_rows: usize,
    n_vars: usize,
}

impl Block {
    /// Borrows the owned block as a [`BlockView`].
    pub fn as_view(&self) -> BlockView<'_> {
        BlockView {
            values: &self.values,
            n_rows: self.n_rows,
            n_vars: self.n_vars,
        }
    }

    /// Returns a view over the half-open row range `[start, end)`.
    pub fn block(&self, start: usize, end: usize) -> Result<BlockView<'_>, NcpdError> {
        if start >= end || end > self.n_rows {
            return Err(NcpdError::invalid_input(format!(
                "block range [{start}, {end}) invalid for owned block with {} rows",
                self.n_rows
            )));
        }
        Ok(BlockView {
            values: &self.values[start * self.n_vars..end * self.n_vars],
            n_rows: end - start,
            n_vars: self.n_vars,
        })
    }
}
