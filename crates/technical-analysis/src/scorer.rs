//! Composite technical scoring over the latest bar.
//!
//! Each indicator contributes a bounded sub-score in [-1, +1]; the
//! composite is their weighted sum (RSI 0.20, MACD 0.25, Bollinger 0.15,
//! MA trend 0.25, Stochastic 0.15), then adjusted by relative volume and
//! chart patterns.

use fusion_core::Bar;
use serde::{Deserialize, Serialize};

use crate::indicators::*;
use crate::patterns::{detect_patterns, PatternMatch};

/// Latest values of every computed indicator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub close: f64,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_hist: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_lower: Option<f64>,
    pub bb_pct: Option<f64>,
    pub sma_20: Option<f64>,
    pub sma_50: Option<f64>,
    pub sma_200: Option<f64>,
    pub stoch_k: Option<f64>,
    pub stoch_d: Option<f64>,
    pub atr: Option<f64>,
    pub obv: Option<f64>,
    pub vwap: Option<f64>,
    pub rel_vol: Option<f64>,
}

/// Per-indicator sub-scores after scoring
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubScores {
    pub rsi: f64,
    pub macd: f64,
    pub bollinger: f64,
    pub ma_trend: f64,
    pub stochastic: f64,
    pub volume_confirmation: f64,
    pub pattern: f64,
}

/// Output of the technical scorer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TechnicalSignal {
    pub score: f64,
    pub confidence: f64,
    pub details: SubScores,
    pub snapshot: IndicatorSnapshot,
    pub patterns: Vec<PatternMatch>,
    pub pattern_score: f64,
}

/// Compute every indicator's latest value from a bar series
pub fn compute_snapshot(bars: &[Bar]) -> IndicatorSnapshot {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let close = closes.last().copied().unwrap_or(0.0);

    let macd_result = macd(&closes, 12, 26, 9);
    let bb = bollinger_bands(&closes, 20, 2.0);
    let stoch = stochastic(bars, 14, 3);

    let bb_upper = bb.upper.last().copied();
    let bb_lower = bb.lower.last().copied();
    let bb_pct = match (bb_upper, bb_lower) {
        (Some(u), Some(l)) if (u - l).abs() > f64::EPSILON => Some((close - l) / (u - l)),
        _ => None,
    };

    IndicatorSnapshot {
        close,
        rsi: rsi(&closes, 14).last().copied(),
        macd: macd_result.macd_line.last().copied(),
        macd_signal: macd_result.signal_line.last().copied(),
        macd_hist: macd_result.histogram.last().copied(),
        bb_upper,
        bb_lower,
        bb_pct,
        sma_20: sma(&closes, 20).last().copied(),
        sma_50: sma(&closes, 50).last().copied(),
        sma_200: sma(&closes, 200).last().copied(),
        stoch_k: stoch.k.last().copied(),
        stoch_d: stoch.d.last().copied(),
        atr: latest_atr(bars, 14),
        obv: obv(bars).last().copied(),
        vwap: vwap(bars).last().copied(),
        rel_vol: relative_volume(bars, 20),
    }
}

/// Oversold RSI scores toward buy, overbought toward sell
pub fn score_rsi(rsi_val: f64) -> f64 {
    if rsi_val < 30.0 {
        0.5 + (30.0 - rsi_val) / 60.0
    } else if rsi_val > 70.0 {
        -0.5 - (rsi_val - 70.0) / 60.0
    } else {
        (50.0 - rsi_val) / 40.0
    }
}

pub fn score_macd(signal_val: f64, hist: f64) -> f64 {
    let scaled = hist / (signal_val.abs() + 1e-8) * 0.5;
    scaled.clamp(-1.0, 1.0)
}

pub fn score_bollinger(bb_pct: f64) -> f64 {
    if bb_pct < 0.1 {
        0.6
    } else if bb_pct > 0.9 {
        -0.6
    } else {
        (0.5 - bb_pct) * 0.8
    }
}

pub fn score_ma_trend(
    close: f64,
    sma_20: Option<f64>,
    sma_50: Option<f64>,
    sma_200: Option<f64>,
) -> f64 {
    let mut score: f64 = 0.0;
    if let Some(s20) = sma_20 {
        score += if close > s20 { 0.2 } else { -0.2 };
    }
    if let Some(s50) = sma_50 {
        score += if close > s50 { 0.2 } else { -0.2 };
    }
    if let Some(s200) = sma_200 {
        score += if close > s200 { 0.3 } else { -0.3 };
    }
    if let (Some(s20), Some(s50)) = (sma_20, sma_50) {
        score += if s20 > s50 { 0.15 } else { -0.15 };
    }
    score.clamp(-1.0, 1.0)
}

pub fn score_stochastic(k: f64, d: f64) -> f64 {
    if k < 20.0 && d < 20.0 {
        0.5
    } else if k > 80.0 && d > 80.0 {
        -0.5
    } else if k > d {
        0.2
    } else {
        -0.2
    }
}

const W_RSI: f64 = 0.20;
const W_MACD: f64 = 0.25;
const W_BOLLINGER: f64 = 0.15;
const W_MA_TREND: f64 = 0.25;
const W_STOCHASTIC: f64 = 0.15;

/// Compute the composite technical signal for the latest bar of `bars`.
/// Never fails: with too little data the result is neutral with zero
/// confidence.
pub fn compute_technical_signal(bars: &[Bar]) -> TechnicalSignal {
    if bars.is_empty() {
        return TechnicalSignal::default();
    }

    let snapshot = compute_snapshot(bars);
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

    let mut details = SubScores {
        rsi: snapshot.rsi.map(score_rsi).unwrap_or(0.0),
        macd: match (snapshot.macd_signal, snapshot.macd_hist) {
            (Some(s), Some(h)) => score_macd(s, h),
            _ => 0.0,
        },
        bollinger: snapshot.bb_pct.map(score_bollinger).unwrap_or(0.0),
        ma_trend: score_ma_trend(snapshot.close, snapshot.sma_20, snapshot.sma_50, snapshot.sma_200),
        stochastic: match (snapshot.stoch_k, snapshot.stoch_d) {
            (Some(k), Some(d)) => score_stochastic(k, d),
            _ => 0.0,
        },
        volume_confirmation: 0.0,
        pattern: 0.0,
    };

    let mut composite = W_RSI * details.rsi
        + W_MACD * details.macd
        + W_BOLLINGER * details.bollinger
        + W_MA_TREND * details.ma_trend
        + W_STOCHASTIC * details.stochastic;

    // Confidence: participation (how many indicators have a view) scaled
    // by agreement (how strongly those views share a direction). All
    // neutral -> confidence 0, not an artificial floor.
    let sub_scores = [
        details.rsi,
        details.macd,
        details.bollinger,
        details.ma_trend,
        details.stochastic,
    ];
    let directions: Vec<i32> = sub_scores
        .iter()
        .map(|s| {
            if *s > 0.1 {
                1
            } else if *s < -0.1 {
                -1
            } else {
                0
            }
        })
        .collect();
    let non_neutral: Vec<i32> = directions.iter().copied().filter(|d| *d != 0).collect();
    let mut confidence = if non_neutral.is_empty() {
        0.0
    } else {
        let agreement =
            (non_neutral.iter().sum::<i32>().abs() as f64) / non_neutral.len() as f64;
        let participation = non_neutral.len() as f64 / directions.len() as f64;
        (participation * (0.3 + 0.7 * agreement)).min(1.0)
    };

    // Relative volume: heavy participation confirms the leaning, thin
    // volume drains conviction.
    let rel_vol = snapshot.rel_vol.unwrap_or(1.0);
    if rel_vol > 2.0 {
        if composite.abs() > 0.05 {
            confidence = (confidence + 0.06).min(1.0);
            let vol_confirm = if composite > 0.0 { 0.5 } else { -0.5 };
            composite = (0.95 * composite + 0.05 * vol_confirm).clamp(-1.0, 1.0);
        }
        details.volume_confirmation = if composite > 0.0 { 0.5 } else { -0.5 };
    } else if rel_vol < 0.3 {
        confidence = (confidence - 0.04).max(0.0);
    }

    // Chart patterns blend in at 15% weight; aligned patterns add conviction
    let scan = detect_patterns(&closes, None);
    let pattern_score = scan.score;
    if !scan.patterns.is_empty() {
        details.pattern = pattern_score;
        composite = (0.85 * composite + 0.15 * pattern_score).clamp(-1.0, 1.0);
        if (pattern_score > 0.05 && composite > 0.0) || (pattern_score < -0.05 && composite < 0.0)
        {
            confidence = (confidence + 0.05 * scan.patterns.len() as f64).min(1.0);
        }
    }

    TechnicalSignal {
        score: composite.clamp(-1.0, 1.0),
        confidence,
        details,
        snapshot,
        patterns: scan.patterns,
        pattern_score,
    }
}
