pub mod combiner;
pub mod thresholds;

pub use combiner::{batch_combine, combine_signals, FactorInputs, FusedSignal, FusionDiagnostics};
pub use thresholds::{adaptive_thresholds, AdaptiveThresholds};
