// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Shared types and contracts for NMF-based network change-point detection.

mod config;
mod context;
mod diagnostics;
mod error;
mod results;
mod rng;
mod series;

pub use config::{Alpha, DetectConfig, RankChoice, TestKind};
pub use context::{
    CancelToken, ExecutionContext, NoopProgressSink, NoopTelemetrySink, ProgressSink,
    TelemetrySink,
};
pub use diagnostics::Diagnostics;
pub use error::NcpdError;
pub use results::{ChangePoint, DetectionResult, TestOutcome, validate_change_points};
pub use rng::{StableRng, StreamPurpose, derive_stream, shuffled_indices};
pub use series::{Block, BlockView, SeriesView};
