//! Multi-factor signal fusion.
//!
//! Combines the required technical / sentiment / ML factors with any
//! available optional factors into a single directional signal. Purely
//! functional: no I/O, never fails; absent optional factors are simply
//! skipped. The composite is re-clipped to [-1, +1] after every blend.

use fusion_core::{
    AnalystSignal, BaseThresholds, BreadthRegime, BreadthSignal, CrossAssetRegime, Direction,
    EarningsFilter, FactorScore, FactorWeights, FearGreedSignal, IntermarketSignal, MacroRegime,
    MacroSignal, MtfSignal, OptionsSignal, RiskLevel, SectorSignal, ShortInterestSignal,
};
use serde::{Deserialize, Serialize};

/// All factor inputs for one symbol. The three required factors are
/// plain scores; everything else is optional and modelled as such.
#[derive(Debug, Clone, Default)]
pub struct FactorInputs {
    pub technical: FactorScore,
    pub sentiment: FactorScore,
    pub ml: FactorScore,
    pub macro_signal: Option<MacroSignal>,
    pub mtf: Option<MtfSignal>,
    pub earnings: Option<EarningsFilter>,
    pub breadth: Option<BreadthSignal>,
    pub analyst: Option<AnalystSignal>,
    pub intermarket: Option<IntermarketSignal>,
    pub fear_greed: Option<FearGreedSignal>,
    pub sector: Option<SectorSignal>,
    pub short_interest: Option<ShortInterestSignal>,
    pub options: Option<OptionsSignal>,
}

/// Diagnostic bundle attached to every fused signal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionDiagnostics {
    pub weights_used: FactorWeights,
    /// Weights actually applied after any macro redistribution
    pub effective_weights: FactorWeights,
    pub buy_threshold: f64,
    pub buy_conf_min: f64,
    pub sell_threshold: f64,
    pub sell_conf_min: f64,
    pub base_buy_threshold: f64,
    pub base_sell_threshold: f64,
    pub threshold_adjustments: Vec<String>,
    /// 1 - population std of the core factor scores
    pub factor_agreement: f64,
    pub divergence_penalty: f64,
    pub mtf_alignment: f64,
    pub breadth_regime: Option<BreadthRegime>,
    pub intermarket_regime: Option<CrossAssetRegime>,
    pub sector_regime: Option<String>,
    pub short_interest_regime: Option<String>,
    pub options_regime: Option<String>,
    pub fg_index: Option<f64>,
    pub fg_label: Option<String>,
    pub analyst_label: Option<String>,
}

/// Result of one fusion decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusedSignal {
    pub symbol: Option<String>,
    pub direction: Direction,
    /// Composite score, clipped to [-1, +1]
    pub strength: f64,
    pub confidence: f64,
    pub risk_level: RiskLevel,
    /// Factor scores after blending (technical after MTF, sentiment
    /// after analyst / fear-greed / options)
    pub technical_score: f64,
    pub sentiment_score: f64,
    pub ml_score: f64,
    pub macro_score: f64,
    pub macro_regime: MacroRegime,
    pub earnings_warning: Option<String>,
    pub diagnostics: FusionDiagnostics,
}

fn clip(v: f64) -> f64 {
    v.clamp(-1.0, 1.0)
}

fn clip01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

/// Population standard deviation
fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Combine all factor inputs into a final recommendation.
pub fn combine_signals(
    inputs: &FactorInputs,
    weights: &FactorWeights,
    base: &BaseThresholds,
) -> FusedSignal {
    let mut t_score = inputs.technical.score;
    let mut s_score = inputs.sentiment.score;
    let m_score = inputs.ml.score;

    let mut t_conf = inputs.technical.confidence;
    let s_conf = inputs.sentiment.confidence;
    let m_conf = inputs.ml.confidence;

    // Analyst consensus blends into sentiment: 70% original, 30% analyst
    let analyst_active = inputs
        .analyst
        .as_ref()
        .filter(|a| a.total_ratings > 0);
    if let Some(analyst) = analyst_active {
        s_score = 0.70 * s_score + 0.30 * analyst.score;
    }

    // Fear & greed is contrarian and blends into sentiment at 20%
    if let Some(fg) = inputs.fear_greed.as_ref().filter(|f| f.confidence > 0.0) {
        s_score = 0.80 * s_score + 0.20 * fg.score;
    }

    // Multi-timeframe confluence blends into technical at 30%; alignment
    // moves technical confidence by up to +-0.15
    let mut mtf_alignment = 0.5;
    if let Some(mtf) = inputs
        .mtf
        .as_ref()
        .filter(|m| !m.timeframes_available.is_empty())
    {
        t_score = 0.70 * t_score + 0.30 * mtf.score;
        mtf_alignment = mtf.alignment;
        let alignment_delta = (mtf.alignment - 0.5) * 0.30;
        t_conf = clip01(t_conf + alignment_delta);
    }

    // Macro weight: when the macro factor is unavailable its weight is
    // redistributed proportionally to the other three
    let (wt, ws, wm, wmacro, macro_score, macro_conf, macro_regime) =
        match inputs.macro_signal.as_ref() {
            Some(m) => (
                weights.technical,
                weights.sentiment,
                weights.ml,
                weights.macro_,
                m.score,
                m.confidence,
                m.regime,
            ),
            None => {
                let other_sum = weights.technical + weights.sentiment + weights.ml;
                let scale = if other_sum > 0.0 {
                    (other_sum + weights.macro_) / other_sum
                } else {
                    1.0
                };
                (
                    weights.technical * scale,
                    weights.sentiment * scale,
                    weights.ml * scale,
                    0.0,
                    0.0,
                    0.0,
                    MacroRegime::Unknown,
                )
            }
        };

    let mut composite = clip(wt * t_score + ws * s_score + wm * m_score + wmacro * macro_score);

    let base_confidence = if wmacro > 0.0 {
        wt * t_conf + ws * s_conf + wm * m_conf + wmacro * macro_conf
    } else {
        let total_w = wt + ws + wm;
        let total_w = if total_w > 0.0 { total_w } else { 1.0 };
        (wt * t_conf + ws * s_conf + wm * m_conf) / total_w
    };

    // Divergence penalty: factors pointing in opposite directions are a
    // stronger warning than merely dispersed scores
    let mut scores = vec![t_score, s_score, m_score];
    if inputs.macro_signal.is_some() {
        scores.push(macro_score);
    }
    let score_std = std_dev(&scores);
    let mut signs: Vec<i32> = scores
        .iter()
        .filter(|s| s.abs() > 0.05)
        .map(|s| if *s > 0.0 { 1 } else { -1 })
        .collect();
    signs.sort_unstable();
    signs.dedup();

    let divergence_penalty = if signs.len() >= 2 {
        0.30
    } else if score_std > 0.3 {
        0.15
    } else {
        0.0
    };

    let mut confidence = clip01(base_confidence - divergence_penalty);

    // Earnings filter multiplies whatever confidence is left
    let mut earnings_warning = None;
    let mut is_earnings_today = false;
    if let Some(earnings) = inputs.earnings.as_ref() {
        confidence = clip01(confidence * earnings.confidence_multiplier);
        earnings_warning = earnings.warning.clone();
        is_earnings_today = earnings.is_earnings_today;
    }

    // Market breadth scales conviction with the health of the tape
    let breadth_regime = inputs.breadth.as_ref().map(|b| b.regime);
    match breadth_regime {
        Some(BreadthRegime::Poor) => confidence = clip01(confidence * 0.75),
        Some(BreadthRegime::Weak) => confidence = clip01(confidence * 0.88),
        Some(BreadthRegime::Healthy) if composite.abs() > 0.2 => {
            confidence = clip01(confidence * 1.05)
        }
        _ => {}
    }

    // Strongly aligned analyst consensus adds a small conviction bonus
    if let Some(analyst) = analyst_active {
        if (composite > 0.1 && analyst.score > 0.3) || (composite < -0.1 && analyst.score < -0.3)
        {
            confidence = clip01(confidence + 0.05);
        }
    }

    // Cross-asset regime: small composite blend plus a headwind/tailwind
    // confidence modifier for long signals
    let intermarket_regime = inputs.intermarket.as_ref().map(|im| im.regime);
    if let Some(im) = inputs.intermarket.as_ref() {
        composite = clip(0.90 * composite + 0.10 * im.score);
        match im.regime {
            CrossAssetRegime::RiskOff if composite > 0.1 => {
                confidence = clip01(confidence * 0.88)
            }
            CrossAssetRegime::RiskOn if composite > 0.1 => {
                confidence = clip01(confidence * 1.04)
            }
            _ => {}
        }
    }

    // Sector rotation tailwind / headwind
    let sector_regime = inputs
        .sector
        .as_ref()
        .filter(|s| s.regime != "N/A")
        .map(|s| s.regime.clone());
    if let Some(sector) = inputs.sector.as_ref().filter(|s| s.regime != "N/A") {
        composite = clip(composite + sector.modifier);
    }

    // Short interest: squeeze tailwind or bearish confirmation
    let short_regime = inputs
        .short_interest
        .as_ref()
        .filter(|s| s.regime != "N/A")
        .map(|s| s.regime.clone());
    if let Some(si) = inputs.short_interest.as_ref().filter(|s| s.regime != "N/A") {
        if si.confidence > 0.3 && si.score.abs() > 0.05 {
            composite = clip(0.95 * composite + 0.05 * si.score);
            if (si.regime == "SQUEEZE" || si.regime == "SQUEEZE_BUILD") && composite > 0.05 {
                confidence = clip01(confidence + 0.04);
            }
        }
    }

    // Options positioning blends into the reported sentiment score and
    // confirms direction
    let options_regime = inputs
        .options
        .as_ref()
        .filter(|o| o.regime != "N/A")
        .map(|o| o.regime.clone());
    if let Some(options) = inputs.options.as_ref().filter(|o| o.regime != "N/A") {
        if options.confidence > 0.3 && options.score.abs() > 0.05 {
            s_score = clip(0.92 * s_score + 0.08 * options.score);
            if (options.score > 0.05 && composite > 0.0)
                || (options.score < -0.05 && composite < 0.0)
            {
                confidence = clip01(confidence + 0.04);
            }
        }
    }

    // Regime-aware thresholds
    let vix_level = inputs
        .macro_signal
        .as_ref()
        .and_then(|m| m.vix_level)
        .filter(|v| *v > 0.0);
    let adaptive = crate::thresholds::adaptive_thresholds(
        base,
        vix_level,
        inputs.macro_signal.as_ref().map(|m| m.regime),
        breadth_regime,
    );

    let direction = if is_earnings_today {
        Direction::Hold
    } else if composite > adaptive.buy_threshold && confidence >= adaptive.buy_conf_min {
        Direction::Buy
    } else if composite < adaptive.sell_threshold && confidence >= adaptive.sell_conf_min {
        Direction::Sell
    } else {
        Direction::Hold
    };

    let abs_strength = composite.abs();
    let risk_level = if abs_strength > 0.5 && confidence > 0.7 {
        RiskLevel::Low
    } else if abs_strength > 0.3 && confidence > 0.5 {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    };

    FusedSignal {
        symbol: None,
        direction,
        strength: clip(composite),
        confidence,
        risk_level,
        technical_score: t_score,
        sentiment_score: s_score,
        ml_score: m_score,
        macro_score,
        macro_regime,
        earnings_warning,
        diagnostics: FusionDiagnostics {
            weights_used: *weights,
            effective_weights: FactorWeights {
                technical: wt,
                sentiment: ws,
                ml: wm,
                macro_: wmacro,
            },
            buy_threshold: adaptive.buy_threshold,
            buy_conf_min: adaptive.buy_conf_min,
            sell_threshold: adaptive.sell_threshold,
            sell_conf_min: adaptive.sell_conf_min,
            base_buy_threshold: base.buy_threshold,
            base_sell_threshold: base.sell_threshold,
            threshold_adjustments: adaptive.adjustments,
            factor_agreement: 1.0 - score_std,
            divergence_penalty,
            mtf_alignment,
            breadth_regime,
            intermarket_regime,
            sector_regime,
            short_interest_regime: short_regime,
            options_regime,
            fg_index: inputs.fear_greed.as_ref().map(|f| f.index),
            fg_label: inputs.fear_greed.as_ref().map(|f| f.label.clone()),
            analyst_label: inputs.analyst.as_ref().map(|a| a.rating_label.clone()),
        },
    }
}

/// Combine signals for multiple symbols and rank them: BUY signals first
/// (strongest leading), then HOLD, then SELL.
pub fn batch_combine(
    signals_by_symbol: Vec<(String, FactorInputs)>,
    weights: &FactorWeights,
    base: &BaseThresholds,
) -> Vec<FusedSignal> {
    let mut results: Vec<FusedSignal> = signals_by_symbol
        .into_iter()
        .map(|(symbol, inputs)| {
            let mut fused = combine_signals(&inputs, weights, base);
            fused.symbol = Some(symbol);
            fused
        })
        .collect();

    let order = |d: Direction| match d {
        Direction::Buy => 0,
        Direction::Hold => 1,
        Direction::Sell => 2,
    };
    results.sort_by(|a, b| {
        order(a.direction)
            .cmp(&order(b.direction))
            .then(b.strength.abs().partial_cmp(&a.strength.abs()).unwrap_or(std::cmp::Ordering::Equal))
    });
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> (FactorWeights, BaseThresholds) {
        (FactorWeights::default(), BaseThresholds::default())
    }

    fn core_inputs(t: (f64, f64), s: (f64, f64), m: (f64, f64)) -> FactorInputs {
        FactorInputs {
            technical: FactorScore::new(t.0, t.1),
            sentiment: FactorScore::new(s.0, s.1),
            ml: FactorScore::new(m.0, m.1),
            ..Default::default()
        }
    }

    // Scenario: strong agreement across all three required factors
    #[test]
    fn strong_buy() {
        let (w, b) = defaults();
        let inputs = core_inputs((0.8, 0.9), (0.6, 0.8), (0.7, 0.85));
        let fused = combine_signals(&inputs, &w, &b);

        assert_eq!(fused.direction, Direction::Buy);
        assert!(
            fused.strength >= 0.65 && fused.strength <= 0.80,
            "strength {} out of range",
            fused.strength
        );
        assert!(fused.confidence >= 0.50 && fused.confidence <= 0.90);
        assert_eq!(fused.risk_level, RiskLevel::Low);
    }

    // Scenario: conflicting factors lose confidence and stay on HOLD
    #[test]
    fn conflicting_factors_hold() {
        let (w, b) = defaults();
        let inputs = core_inputs((0.5, 0.7), (-0.4, 0.6), (0.1, 0.5));
        let fused = combine_signals(&inputs, &w, &b);

        assert_eq!(fused.direction, Direction::Hold);

        // Confidence must be strictly below the weight-normalised mean of
        // the factor confidences
        let scale = 1.0 / (w.technical + w.sentiment + w.ml);
        let weighted_mean =
            (w.technical * 0.7 + w.sentiment * 0.6 + w.ml * 0.5) * scale;
        assert!(fused.confidence < weighted_mean);
        assert!((fused.diagnostics.divergence_penalty - 0.30).abs() < 1e-9);
    }

    // Scenario: earnings today forces HOLD regardless of the factors
    #[test]
    fn earnings_today_forces_hold() {
        let (w, b) = defaults();
        let mut inputs = core_inputs((0.8, 0.9), (0.6, 0.8), (0.7, 0.85));
        let pre = combine_signals(&inputs, &w, &b);

        inputs.earnings = Some(EarningsFilter {
            confidence_multiplier: 0.30,
            days_to_earnings: Some(0),
            earnings_date: None,
            warning: Some("EARNINGS TODAY".to_string()),
            is_earnings_today: true,
        });
        let fused = combine_signals(&inputs, &w, &b);

        assert_eq!(fused.direction, Direction::Hold);
        assert!(fused.earnings_warning.is_some());
        assert!((fused.confidence - pre.confidence * 0.30).abs() < 1e-9);
    }

    #[test]
    fn absent_macro_redistributes_weight() {
        let (w, b) = defaults();
        let inputs = core_inputs((1.0, 0.9), (1.0, 0.9), (1.0, 0.9));
        let fused = combine_signals(&inputs, &w, &b);

        // With unit factor scores the composite is the sum of the
        // effective weights, which must absorb the macro prior
        let eff = &fused.diagnostics.effective_weights;
        assert!((eff.technical + eff.sentiment + eff.ml - 1.0).abs() < 1e-9);
        assert_eq!(eff.macro_, 0.0);
        assert!((fused.strength - 1.0).abs() < 1e-9);
    }

    #[test]
    fn macro_present_contributes_score() {
        let (w, b) = defaults();
        let mut inputs = core_inputs((0.5, 0.8), (0.5, 0.8), (0.5, 0.8));
        inputs.macro_signal = Some(MacroSignal {
            score: -1.0,
            confidence: 0.9,
            regime: MacroRegime::RiskOff,
            vix_score: -1.0,
            yield_score: 0.0,
            dxy_score: 0.0,
            vix_level: Some(35.0),
            yield_spread: None,
            dxy_change_20d: None,
        });
        let fused = combine_signals(&inputs, &w, &b);

        // 0.85 * 0.5 - 0.15 = 0.275
        assert!((fused.strength - 0.275).abs() < 1e-6);
        assert_eq!(fused.macro_regime, MacroRegime::RiskOff);
        // RISK_OFF macro + VIX 35 raises the buy bar well above 0.275
        assert_eq!(fused.direction, Direction::Hold);
        assert!(!fused.diagnostics.threshold_adjustments.is_empty());
    }

    #[test]
    fn mtf_blends_technical() {
        let (w, b) = defaults();
        let mut inputs = core_inputs((1.0, 0.5), (0.0, 0.5), (0.0, 0.5));
        inputs.mtf = Some(MtfSignal {
            score: 0.0,
            confidence: 0.5,
            alignment: 1.0,
            tf_scores: vec![],
            timeframes_available: vec!["1D".to_string(), "1W".to_string()],
        });
        let fused = combine_signals(&inputs, &w, &b);
        assert!((fused.technical_score - 0.70).abs() < 1e-9);
        assert!((fused.diagnostics.mtf_alignment - 1.0).abs() < 1e-9);
    }

    #[test]
    fn breadth_poor_cuts_confidence() {
        let (w, b) = defaults();
        let mut inputs = core_inputs((0.8, 0.9), (0.6, 0.8), (0.7, 0.85));
        let pre = combine_signals(&inputs, &w, &b);

        inputs.breadth = Some(BreadthSignal {
            score: -0.6,
            regime: BreadthRegime::Poor,
            pct_above_200ma: 0.2,
            ad_ratio: 0.3,
            advance_count: 6,
            decline_count: 14,
            basket_total: 20,
        });
        let fused = combine_signals(&inputs, &w, &b);
        assert!((fused.confidence - pre.confidence * 0.75).abs() < 1e-9);
    }

    #[test]
    fn fused_outputs_always_bounded() {
        let (w, b) = defaults();
        for t in [-1.0, -0.5, 0.0, 0.5, 1.0] {
            for s in [-1.0, 0.0, 1.0] {
                for m in [-1.0, 0.0, 1.0] {
                    let inputs = core_inputs((t, 0.9), (s, 0.9), (m, 0.9));
                    let fused = combine_signals(&inputs, &w, &b);
                    assert!(fused.strength >= -1.0 && fused.strength <= 1.0);
                    assert!(fused.confidence >= 0.0 && fused.confidence <= 1.0);
                }
            }
        }
    }

    #[test]
    fn deterministic_for_same_inputs() {
        let (w, b) = defaults();
        let mut inputs = core_inputs((0.4, 0.7), (0.2, 0.6), (0.5, 0.8));
        inputs.fear_greed = Some(FearGreedSignal {
            score: 0.3,
            confidence: 0.6,
            index: 20.0,
            label: "Extreme Fear".to_string(),
        });
        let a = combine_signals(&inputs, &w, &b);
        let c = combine_signals(&inputs, &w, &b);
        assert_eq!(a.strength, c.strength);
        assert_eq!(a.confidence, c.confidence);
        assert_eq!(a.direction, c.direction);
    }

    #[test]
    fn batch_combine_ranks_buys_first() {
        let (w, b) = defaults();
        let pairs = vec![
            ("HOLD1".to_string(), core_inputs((0.1, 0.5), (0.0, 0.5), (0.1, 0.5))),
            ("BUY1".to_string(), core_inputs((0.8, 0.9), (0.6, 0.8), (0.7, 0.85))),
            ("SELL1".to_string(), core_inputs((-0.8, 0.9), (-0.7, 0.8), (-0.8, 0.85))),
        ];
        let ranked = batch_combine(pairs, &w, &b);
        assert_eq!(ranked[0].symbol.as_deref(), Some("BUY1"));
        assert_eq!(ranked[0].direction, Direction::Buy);
        assert_eq!(ranked.last().unwrap().direction, Direction::Sell);
    }

    #[test]
    fn short_interest_squeeze_boosts_confidence() {
        let (w, b) = defaults();
        let mut inputs = core_inputs((0.6, 0.8), (0.4, 0.7), (0.5, 0.8));
        let pre = combine_signals(&inputs, &w, &b);

        inputs.short_interest = Some(ShortInterestSignal {
            score: 0.30,
            confidence: 0.6,
            regime: "SQUEEZE".to_string(),
            short_float: Some(0.25),
        });
        let fused = combine_signals(&inputs, &w, &b);
        assert!(fused.confidence > pre.confidence);
    }
}
