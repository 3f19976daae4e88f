//! Short interest: squeeze tailwind or bearish confirmation.
//!
//! High short float combined with upward momentum flags squeeze risk
//! (bullish), while high short float with falling prices confirms the
//! bears. Days-to-cover above 10 amplifies an active squeeze.

use fusion_core::ShortInterestSignal;

/// Map (short float, 5-day momentum %, days-to-cover) to score + regime.
/// Score stays within [-0.50, +0.50].
pub fn score_short(
    short_float: Option<f64>,
    momentum_5d: Option<f64>,
    short_ratio: Option<f64>,
) -> (f64, &'static str) {
    let Some(short_float) = short_float else {
        return (0.0, "N/A");
    };

    let mom = momentum_5d.unwrap_or(0.0);
    let ratio = short_ratio.unwrap_or(0.0);

    let (score, regime) = if short_float > 0.20 {
        if mom > 3.0 {
            let mut score = 0.25 + ((mom - 3.0) * 0.03).min(0.15);
            if ratio > 10.0 {
                score = (score + 0.05).min(0.50);
            }
            (score, "SQUEEZE")
        } else if mom > 1.0 {
            (0.15, "SQUEEZE_BUILD")
        } else if mom < -3.0 {
            (-0.10, "BEAR_CONFIRM")
        } else {
            (0.0, "HIGH_SHORT")
        }
    } else if short_float > 0.10 {
        if mom > 2.0 {
            (0.10, "MILD_SQUEEZE")
        } else if mom < -2.0 {
            (-0.05, "MILD_CONFIRM")
        } else {
            (0.05, "MILD")
        }
    } else {
        (0.0, "NEUTRAL")
    };

    (score.clamp(-0.50, 0.50), regime)
}

pub fn compute_short_interest_signal(
    short_float: Option<f64>,
    momentum_5d: Option<f64>,
    short_ratio: Option<f64>,
) -> ShortInterestSignal {
    let (score, regime) = score_short(short_float, momentum_5d, short_ratio);
    let confidence = match short_float {
        Some(sf) => (0.40 + sf * 1.5).min(0.70),
        None => 0.0,
    };

    ShortInterestSignal {
        score,
        confidence,
        regime: regime.to_string(),
        short_float,
    }
}
