//! Cross-asset regime from BTC, DXY, gold, oil and long Treasuries.
//!
//! Each asset's 20-day return maps through a piecewise score; the
//! weighted average classifies the environment as risk-on or risk-off.

use fusion_core::{CrossAssetRegime, IntermarketSignal};

/// 20-day % returns of the tracked assets, where available
#[derive(Debug, Clone, Copy, Default)]
pub struct IntermarketReturns {
    pub btc_20d: Option<f64>,
    pub dxy_20d: Option<f64>,
    pub gold_20d: Option<f64>,
    pub oil_20d: Option<f64>,
    pub tlt_20d: Option<f64>,
}

/// BTC as a risk-appetite proxy
pub fn score_btc(ret20: f64) -> f64 {
    if ret20 > 10.0 {
        0.30
    } else if ret20 > 5.0 {
        0.15 + 0.03 * (ret20 - 5.0)
    } else if ret20 > -5.0 {
        ret20 * 0.03
    } else if ret20 > -10.0 {
        -0.15 - 0.03 * (-ret20 - 5.0)
    } else {
        -0.30
    }
}

/// Rising dollar is a headwind for risk assets
pub fn score_dxy(ret20: f64) -> f64 {
    if ret20 > 3.0 {
        -0.25
    } else if ret20 > 1.0 {
        -0.25 * (ret20 - 1.0) / 2.0
    } else if ret20 > -1.0 {
        0.0
    } else if ret20 > -3.0 {
        0.25 * (-ret20 - 1.0) / 2.0
    } else {
        0.25
    }
}

/// Rising gold signals safe-haven demand
pub fn score_gold(ret20: f64) -> f64 {
    if ret20 > 5.0 {
        -0.20
    } else if ret20 > 2.0 {
        -0.20 * (ret20 - 2.0) / 3.0
    } else if ret20 > -2.0 {
        0.0
    } else {
        0.10
    }
}

/// Oil as cost-push inflation vs demand-relief signal
pub fn score_oil(ret20: f64) -> f64 {
    if ret20 > 10.0 {
        -0.10
    } else if ret20 > 3.0 {
        -0.10 * (ret20 - 3.0) / 7.0
    } else if ret20 > -5.0 {
        0.0
    } else if ret20 > -10.0 {
        0.15 * (-ret20 - 5.0) / 5.0
    } else {
        0.15
    }
}

/// Long Treasuries as a rates proxy: TLT falling means yields rising
pub fn score_tlt(ret20: f64) -> f64 {
    if ret20 > 3.0 {
        0.20
    } else if ret20 > 1.0 {
        0.10 * (ret20 - 1.0) / 2.0
    } else if ret20 > -1.0 {
        0.0
    } else if ret20 > -3.0 {
        -0.20 * (-ret20 - 1.0) / 2.0
    } else {
        -0.20
    }
}

pub fn regime_label(score: f64) -> CrossAssetRegime {
    if score > 0.25 {
        CrossAssetRegime::RiskOn
    } else if score > -0.15 {
        CrossAssetRegime::Neutral
    } else {
        CrossAssetRegime::RiskOff
    }
}

/// Combine available asset scores; confidence is the fetched fraction.
pub fn compute_intermarket_signal(returns: &IntermarketReturns) -> IntermarketSignal {
    type Scorer = fn(f64) -> f64;
    let components: [(&str, Option<f64>, Scorer, f64); 5] = [
        ("BTC", returns.btc_20d, score_btc, 0.30),
        ("DXY", returns.dxy_20d, score_dxy, 0.25),
        ("Gold", returns.gold_20d, score_gold, 0.20),
        ("Oil", returns.oil_20d, score_oil, 0.10),
        ("TLT", returns.tlt_20d, score_tlt, 0.15),
    ];

    let mut component_scores = Vec::new();
    let mut weighted_sum = 0.0;
    let mut total_w = 0.0;
    let mut fetched = 0usize;

    for (name, ret, scorer, weight) in components {
        if let Some(r) = ret {
            let s = scorer(r);
            component_scores.push((name.to_string(), s));
            weighted_sum += weight * s;
            total_w += weight;
            fetched += 1;
        }
    }

    let composite = if total_w > 0.0 {
        (weighted_sum / total_w).clamp(-1.0, 1.0)
    } else {
        0.0
    };

    IntermarketSignal {
        score: composite,
        confidence: fetched as f64 / 5.0,
        regime: regime_label(composite),
        component_scores,
    }
}
