// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Synthetic strictly-positive series with known latent structure, for
//! exercising the detection pipeline against planted ground truth.

mod synthetic;

pub use synthetic::{StationaryConfig, TwoRegimeConfig};
