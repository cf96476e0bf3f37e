// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::NcpdError;

/// Cooperative cancellation token shared between caller and detector.
///
/// Cloning shares the underlying flag; once cancelled, the token stays
/// cancelled for every holder.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Receives coarse progress fractions in `[0, 1]`.
pub trait ProgressSink: Send + Sync {
    fn report(&self, fraction: f64);
}

/// Receives named scalar observations (counters, timings).
pub trait TelemetrySink: Send + Sync {
    fn record_scalar(&self, name: &str, value: f64);
}

/// Progress sink that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopProgressSink;

impl ProgressSink for NoopProgressSink {
    fn report(&self, _fraction: f64) {}
}

/// Telemetry sink that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopTelemetrySink;

impl TelemetrySink for NoopTelemetrySink {
    fn record_scalar(&self, _name: &str, _value: f64) {}
}

static NOOP_PROGRESS: NoopProgressSink = NoopProgressSink;
static NOOP_TELEMETRY: NoopTelemetrySink = NoopTelemetrySink;

/// Per-run execution environment: cancellation, progress, telemetry.
///
/// All hooks are optional; the default context never cancels and discards
/// all observations, so library code can report unconditionally.
#[derive(Clone)]
pub struct ExecutionContext<'a> {
    cancel: Option<&'a CancelToken>,
    progress: &'a dyn ProgressSink,
    telemetry: &'a dyn TelemetrySink,
}

impl Default for ExecutionContext<'_> {
    fn default() -> Self {
        Self {
            cancel: None,
            progress: &NOOP_PROGRESS,
            telemetry: &NOOP_TELEMETRY,
        }
    }
}

impl<'a> ExecutionContext<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel_token(mut self, token: &'a CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_progress(mut self, sink: &'a dyn ProgressSink) -> Self {
        self.progress = sink;
        self
    }

    pub fn with_telemetry(mut self, sink: &'a dyn TelemetrySink) -> Self {
        self.telemetry = sink;
        self
    }

    /// Returns `Err(Cancelled)` if the run was cancelled.
    pub fn check_cancelled(&self) -> Result<(), NcpdError> {
        match self.cancel {
            Some(token) if token.is_cancelled() => Err(NcpdError::cancelled()),
            _ => Ok(()),
        }
    }

    /// Polls for cancellation only when `step` is a multiple of `every`.
    ///
    /// `every` is clamped to at least 1 so a zero cadence still polls.
    pub fn check_cancelled_every(&self, step: usize, every: usize) -> Result<(), NcpdError> {
        if step.is_multiple_of(every.max(1)) {
            self.check_cancelled()
        } else {
            Ok(())
        }
    }

    /// Reports progress as a fraction, clamped to `[0, 1]`.
    pub fn report_progress(&self, fraction: f64) {
        if fraction.is_finite() {
            self.progress.report(fraction.clamp(0.0, 1.0));
        }
    }

    pub fn record_scalar(&self, name: &str, value: f64) {
        self.telemetry.record_scalar(name, value);
    }
}

impl std::fmt::Debug for ExecutionContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("has_cancel_token", &self.cancel.is_some())
            .finish_non_exhaustive()
    }
}
