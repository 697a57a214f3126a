//! Adaptive round selection: weighting, sampling and round assembly.

mod round;
mod sampler;
mod stats_index;
mod weight;

pub use round::{Round, RoundBuilder, RoundDiagnostic};
pub use sampler::sample_without_replacement;
pub use stats_index::StatsIndex;
pub use weight::WeightFunction;
