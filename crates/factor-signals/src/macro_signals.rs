//! Macro environment score from VIX, yield curve, and dollar strength.
//!
//! Each sub-signal is scored on [-1, +1] and combined at fixed weights
//! (VIX 0.50, yield 0.30, DXY 0.20). Missing sub-fetches degrade
//! confidence by a third each instead of failing the whole signal.

use fusion_core::{MacroRegime, MacroSignal};

const W_VIX: f64 = 0.50;
const W_YIELD: f64 = 0.30;
const W_DXY: f64 = 0.20;

/// Raw macro observations handed in by the fetch layer
#[derive(Debug, Clone, Default)]
pub struct MacroInputs {
    pub vix_level: Option<f64>,
    /// VIX 20-day % change
    pub vix_change_20d: Option<f64>,
    /// 10Y - 3M Treasury spread in percentage points
    pub yield_spread: Option<f64>,
    /// DXY 20-day % change
    pub dxy_change_20d: Option<f64>,
}

/// High VIX (fear) scores negative; low VIX (complacency) positive.
pub fn score_vix(vix_level: f64, vix_change_20d: Option<f64>) -> f64 {
    let base = if vix_level > 40.0 {
        -1.0
    } else if vix_level > 30.0 {
        -0.75 - 0.025 * (vix_level - 30.0)
    } else if vix_level > 20.0 {
        -0.20 - 0.030 * (vix_level - 20.0)
    } else if vix_level > 15.0 {
        -0.040 * (vix_level - 15.0)
    } else if vix_level > 12.0 {
        0.30 - (0.20 / 3.0) * (vix_level - 12.0)
    } else {
        0.30
    };

    // Rising VIX is an extra penalty, falling VIX a bonus, capped at 0.2
    let roc_adj = vix_change_20d
        .map(|c| (-c / 50.0).clamp(-0.2, 0.2))
        .unwrap_or(0.0);

    (base + roc_adj).clamp(-1.0, 1.0)
}

/// Inverted curve scores negative, steep curve positive.
pub fn score_yield(spread: f64) -> f64 {
    if spread < -0.5 {
        -0.6
    } else if spread < 0.0 {
        -0.30 - 0.60 * (-spread / 0.5)
    } else if spread < 0.5 {
        -0.20 + 0.40 * (spread / 0.5)
    } else if spread < 2.0 {
        0.10 + (0.30 / 1.5) * (spread - 0.5)
    } else {
        0.40
    }
}

/// Strong USD rise is a headwind for risk assets.
pub fn score_dxy(dxy_change_20d: f64) -> f64 {
    let pct = dxy_change_20d;
    if pct > 5.0 {
        -0.30
    } else if pct > 2.0 {
        -0.10 - (0.20 / 3.0) * (pct - 2.0)
    } else if pct > -2.0 {
        0.0
    } else if pct > -5.0 {
        0.10 + (0.20 / 3.0) * (-pct - 2.0)
    } else {
        0.30
    }
}

pub fn regime_label(score: f64) -> MacroRegime {
    if score <= -0.4 {
        MacroRegime::RiskOff
    } else if score <= -0.1 {
        MacroRegime::Cautious
    } else if score <= 0.1 {
        MacroRegime::Neutral
    } else if score <= 0.35 {
        MacroRegime::Constructive
    } else {
        MacroRegime::RiskOn
    }
}

/// Combine available macro observations into the composite signal.
/// All inputs absent produces the UNKNOWN regime with zero confidence.
pub fn compute_macro_signal(inputs: &MacroInputs) -> MacroSignal {
    let mut fetched = 0usize;

    let vix_score = match inputs.vix_level {
        Some(level) => {
            fetched += 1;
            score_vix(level, inputs.vix_change_20d)
        }
        None => 0.0,
    };

    let yield_score = match inputs.yield_spread {
        Some(spread) => {
            fetched += 1;
            score_yield(spread)
        }
        None => 0.0,
    };

    let dxy_score = match inputs.dxy_change_20d {
        Some(change) => {
            fetched += 1;
            score_dxy(change)
        }
        None => 0.0,
    };

    if fetched == 0 {
        return MacroSignal {
            score: 0.0,
            confidence: 0.0,
            regime: MacroRegime::Unknown,
            vix_score: 0.0,
            yield_score: 0.0,
            dxy_score: 0.0,
            vix_level: None,
            yield_spread: None,
            dxy_change_20d: None,
        };
    }

    let missing = 3 - fetched;
    let confidence = (1.0 - missing as f64 / 3.0).max(0.0);
    let composite =
        (W_VIX * vix_score + W_YIELD * yield_score + W_DXY * dxy_score).clamp(-1.0, 1.0);

    MacroSignal {
        score: composite,
        confidence,
        regime: regime_label(composite),
        vix_score,
        yield_score,
        dxy_score,
        vix_level: inputs.vix_level,
        yield_spread: inputs.yield_spread,
        dxy_change_20d: inputs.dxy_change_20d,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vix_extremes() {
        assert!((score_vix(45.0, None) + 1.0).abs() < 1e-9);
        assert!((score_vix(10.0, None) - 0.30).abs() < 1e-9);
        // Band boundaries are continuous
        assert!((score_vix(30.0, None) - score_vix(30.001, None)).abs() < 0.01);
    }

    #[test]
    fn rising_vix_penalised() {
        let flat = score_vix(22.0, Some(0.0));
        let rising = score_vix(22.0, Some(30.0));
        assert!(rising < flat);
    }

    #[test]
    fn inverted_curve_is_bearish() {
        assert!(score_yield(-0.8) < -0.5);
        assert!(score_yield(1.5) > 0.0);
    }

    #[test]
    fn all_missing_is_unknown() {
        let sig = compute_macro_signal(&MacroInputs::default());
        assert_eq!(sig.regime, MacroRegime::Unknown);
        assert_eq!(sig.confidence, 0.0);
    }

    #[test]
    fn partial_fetch_degrades_confidence() {
        let sig = compute_macro_signal(&MacroInputs {
            vix_level: Some(18.0),
            ..Default::default()
        });
        assert!((sig.confidence - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn fearful_inputs_map_to_risk_off() {
        let sig = compute_macro_signal(&MacroInputs {
            vix_level: Some(45.0),
            vix_change_20d: Some(40.0),
            yield_spread: Some(-1.0),
            dxy_change_20d: Some(6.0),
        });
        assert_eq!(sig.regime, MacroRegime::RiskOff);
        assert!(sig.score < -0.4);
        assert!((sig.confidence - 1.0).abs() < 1e-9);
    }
}
