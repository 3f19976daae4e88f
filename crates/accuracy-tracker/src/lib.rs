//! Signal accuracy tracking and the adaptive-weight feedback loop.
//!
//! Aged signals are judged against realised forward returns; the
//! outcomes drive both the accuracy dashboard statistics and the
//! history-derived factor weights fed back into the fusion engine.

pub mod evaluator;
pub mod stats;
pub mod weights;

pub use evaluator::{AccuracySummary, AccuracyTracker};
pub use stats::{accuracy_stats, AccuracyStats, DirectionStats};
pub use weights::compute_adaptive_weights;
