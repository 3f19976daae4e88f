pub mod indicators;
pub mod patterns;
pub mod scorer;

pub use indicators::*;
pub use patterns::{detect_patterns, PatternMatch, PatternScan};
pub use scorer::{compute_technical_signal, IndicatorSnapshot, TechnicalSignal};
