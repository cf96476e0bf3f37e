// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::borrow::Cow;

/// Run metadata attached to every detection result.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Diagnostics {
    /// Rows in the analyzed series (T).
    pub n_rows: usize,
    /// Variables per row (p).
    pub n_vars: usize,
    /// Wall-clock runtime of the whole run.
    pub runtime_ms: f64,
    /// Search algorithm identifier.
    pub algorithm: Cow<'static, str>,
    /// Factorization oracle identifier.
    pub oracle: Cow<'static, str>,
    /// Seed the run was keyed on.
    pub seed: u64,
    /// Worker threads used for the resampling phase (1 when sequential).
    pub thread_count: usize,
    /// Total oracle invocations across all phases.
    pub oracle_calls: u64,
    /// Informational notes (rank resolution, empty-result reasons).
    pub notes: Vec<String>,
    /// Conditions worth surfacing that did not abort the run.
    pub warnings: Vec<String>,
}

impl Diagnostics {
    pub fn push_note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }
}
