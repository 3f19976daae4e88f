//! Regime-aware BUY/SELL thresholds.
//!
//! Instead of applying the static config thresholds to every market
//! condition, the bar for signalling is raised in fearful environments
//! (high VIX, risk-off macro, poor breadth) and slightly lowered in calm
//! ones. All adjustments are additive and independently applied, then the
//! result is clamped to a safe range.

use fusion_core::{BaseThresholds, BreadthRegime, MacroRegime};
use serde::{Deserialize, Serialize};

/// Effective thresholds plus the human-readable list of applied deltas
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveThresholds {
    pub buy_threshold: f64,
    pub buy_conf_min: f64,
    pub sell_threshold: f64,
    pub sell_conf_min: f64,
    pub adjustments: Vec<String>,
}

/// Derive regime-aware thresholds from the base configuration.
/// Deterministic: same inputs always produce the same output.
pub fn adaptive_thresholds(
    base: &BaseThresholds,
    vix_level: Option<f64>,
    macro_regime: Option<MacroRegime>,
    breadth_regime: Option<BreadthRegime>,
) -> AdaptiveThresholds {
    let mut buy_thresh = base.buy_threshold;
    let mut buy_conf = base.buy_confidence_min;
    let sell_thresh = base.sell_threshold;
    let sell_conf = base.sell_confidence_min;

    let mut adjustments: Vec<String> = Vec::new();

    if let Some(vix) = vix_level.filter(|v| *v > 0.0) {
        if vix > 40.0 {
            buy_thresh += 0.15;
            buy_conf += 0.10;
            adjustments.push(format!("VIX {vix:.0} (extreme) +0.15 thresh / +0.10 conf"));
        } else if vix > 30.0 {
            buy_thresh += 0.10;
            buy_conf += 0.07;
            adjustments.push(format!("VIX {vix:.0} (high) +0.10 thresh / +0.07 conf"));
        } else if vix > 20.0 {
            buy_thresh += 0.05;
            buy_conf += 0.03;
            adjustments.push(format!("VIX {vix:.0} (elevated) +0.05 thresh / +0.03 conf"));
        } else if vix < 12.0 {
            buy_thresh -= 0.05;
            buy_conf -= 0.03;
            adjustments.push(format!("VIX {vix:.0} (very calm) -0.05 thresh / -0.03 conf"));
        }
    }

    match macro_regime {
        Some(MacroRegime::RiskOff) => {
            buy_thresh += 0.08;
            buy_conf += 0.05;
            adjustments.push("macro RISK_OFF +0.08 thresh / +0.05 conf".to_string());
        }
        Some(MacroRegime::Cautious) => {
            buy_thresh += 0.04;
            buy_conf += 0.02;
            adjustments.push("macro CAUTIOUS +0.04 thresh / +0.02 conf".to_string());
        }
        Some(MacroRegime::RiskOn) => {
            buy_thresh -= 0.03;
            adjustments.push("macro RISK_ON -0.03 thresh".to_string());
        }
        Some(MacroRegime::Constructive) => {
            buy_thresh -= 0.01;
            adjustments.push("macro CONSTRUCTIVE -0.01 thresh".to_string());
        }
        _ => {}
    }

    match breadth_regime {
        Some(BreadthRegime::Poor) => {
            buy_thresh += 0.06;
            buy_conf += 0.04;
            adjustments.push("breadth POOR +0.06 thresh / +0.04 conf".to_string());
        }
        Some(BreadthRegime::Weak) => {
            buy_thresh += 0.03;
            buy_conf += 0.02;
            adjustments.push("breadth WEAK +0.03 thresh / +0.02 conf".to_string());
        }
        Some(BreadthRegime::Healthy) => {
            buy_thresh -= 0.02;
            adjustments.push("breadth HEALTHY -0.02 thresh".to_string());
        }
        _ => {}
    }

    AdaptiveThresholds {
        buy_threshold: buy_thresh.clamp(0.15, 0.55),
        buy_conf_min: buy_conf.clamp(0.50, 0.85),
        sell_threshold: sell_thresh.clamp(-0.50, -0.10),
        sell_conf_min: sell_conf.clamp(0.40, 0.75),
        adjustments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> BaseThresholds {
        BaseThresholds::default()
    }

    #[test]
    fn no_inputs_returns_base() {
        let t = adaptive_thresholds(&base(), None, None, None);
        assert!((t.buy_threshold - 0.30).abs() < 1e-9);
        assert!((t.buy_conf_min - 0.65).abs() < 1e-9);
        assert!((t.sell_threshold + 0.20).abs() < 1e-9);
        assert!((t.sell_conf_min - 0.50).abs() < 1e-9);
        assert!(t.adjustments.is_empty());
    }

    #[test]
    fn extreme_fear_raises_the_bar() {
        let t = adaptive_thresholds(
            &base(),
            Some(45.0),
            Some(MacroRegime::RiskOff),
            Some(BreadthRegime::Poor),
        );
        // 0.30 + 0.15 + 0.08 + 0.06 = 0.59, clamped to 0.55
        assert!((t.buy_threshold - 0.55).abs() < 1e-9);
        // 0.65 + 0.10 + 0.05 + 0.04 = 0.84
        assert!((t.buy_conf_min - 0.84).abs() < 1e-9);
        assert_eq!(t.adjustments.len(), 3);
    }

    #[test]
    fn calm_market_lowers_the_bar() {
        let t = adaptive_thresholds(
            &base(),
            Some(10.0),
            Some(MacroRegime::RiskOn),
            Some(BreadthRegime::Healthy),
        );
        // 0.30 - 0.05 - 0.03 - 0.02 = 0.20
        assert!((t.buy_threshold - 0.20).abs() < 1e-9);
        // 0.65 - 0.03 = 0.62
        assert!((t.buy_conf_min - 0.62).abs() < 1e-9);
    }

    #[test]
    fn effective_values_stay_in_clamp_range() {
        for vix in [5.0, 15.0, 25.0, 35.0, 60.0] {
            for regime in [
                Some(MacroRegime::RiskOff),
                Some(MacroRegime::RiskOn),
                None,
            ] {
                for breadth in [Some(BreadthRegime::Poor), Some(BreadthRegime::Healthy), None] {
                    let t = adaptive_thresholds(&base(), Some(vix), regime, breadth);
                    assert!((0.15..=0.55).contains(&t.buy_threshold));
                    assert!((0.50..=0.85).contains(&t.buy_conf_min));
                    assert!((-0.50..=-0.10).contains(&t.sell_threshold));
                    assert!((0.40..=0.75).contains(&t.sell_conf_min));
                }
            }
        }
    }

    #[test]
    fn elevated_vix_band() {
        let t = adaptive_thresholds(&base(), Some(25.0), None, None);
        assert!((t.buy_threshold - 0.35).abs() < 1e-9);
        assert!((t.buy_conf_min - 0.68).abs() < 1e-9);
    }
}
