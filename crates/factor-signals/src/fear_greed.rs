//! Contrarian fear & greed signal.
//!
//! The raw 0-100 index is mapped so extreme fear becomes a buy tailwind
//! and extreme greed a sell tailwind.

use fusion_core::FearGreedSignal;

pub fn fg_label(value: f64) -> &'static str {
    if value <= 25.0 {
        "Extreme Fear"
    } else if value <= 45.0 {
        "Fear"
    } else if value <= 55.0 {
        "Neutral"
    } else if value <= 75.0 {
        "Greed"
    } else {
        "Extreme Greed"
    }
}

/// Map the 0-100 index to a contrarian score in [-1, +1]
pub fn score_fear_greed(value: f64) -> f64 {
    if value <= 25.0 {
        0.40 + (25.0 - value) / 25.0 * 0.40
    } else if value <= 45.0 {
        0.20 + (45.0 - value) / 20.0 * 0.20
    } else if value <= 55.0 {
        0.0
    } else if value <= 75.0 {
        -0.15 * (value - 55.0) / 20.0
    } else {
        -0.15 + (value - 75.0) / 25.0 * (-0.15)
    }
}

/// Build the signal from a fetched index value. `label` overrides the
/// derived classification when the vendor supplies its own.
pub fn compute_fear_greed_signal(index: f64, label: Option<String>) -> FearGreedSignal {
    FearGreedSignal {
        score: score_fear_greed(index),
        confidence: 0.80,
        index,
        label: label.unwrap_or_else(|| fg_label(index).to_string()),
    }
}

/// Explicit neutral used when no vendor responded
pub fn neutral() -> FearGreedSignal {
    FearGreedSignal {
        score: 0.0,
        confidence: 0.0,
        index: 50.0,
        label: "Neutral".to_string(),
    }
}
