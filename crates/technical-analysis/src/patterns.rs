//! Chart pattern recognition for classic multi-bar formations.
//!
//! Bullish patterns score positive, bearish negative. Individual scores
//! stay within [-0.40, +0.40]; the composite over all detected patterns
//! is clipped to [-1, +1] and confidence is min(1, 0.3 + 0.15 * n).

use serde::{Deserialize, Serialize};

/// A single detected formation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternMatch {
    pub name: String,
    pub bullish: bool,
    pub score: f64,
    /// Bar index of the pattern's confirming extremum
    pub bar: usize,
    pub detail: String,
}

/// Result of a full pattern scan
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternScan {
    pub score: f64,
    pub confidence: f64,
    pub patterns: Vec<PatternMatch>,
}

const DEFAULT_LOOKBACK: usize = 120;

/// Merge nearby extrema (within `order` bars) keeping the best per cluster.
/// Prevents flat-top candles from counting as two separate peaks/troughs.
fn deduplicate_extrema(indices: &[usize], prices: &[f64], order: usize, keep_max: bool) -> Vec<usize> {
    if indices.is_empty() {
        return vec![];
    }
    let better = |a: usize, b: usize| -> usize {
        let pick_a = if keep_max {
            prices[a] >= prices[b]
        } else {
            prices[a] <= prices[b]
        };
        if pick_a { a } else { b }
    };

    let mut result = Vec::new();
    let mut best = indices[0];
    let mut last = indices[0];
    for &idx in &indices[1..] {
        if idx - last <= order {
            best = better(best, idx);
        } else {
            result.push(best);
            best = idx;
        }
        last = idx;
    }
    result.push(best);
    result
}

/// Indices of local maxima: bar i is a peak if it is the max of the
/// [i-order, i+order] window, not lower than either neighbour, and at
/// least one neighbour is strictly lower (skips flat plateaus).
fn local_peaks(prices: &[f64], order: usize) -> Vec<usize> {
    let n = prices.len();
    if n < 2 * order + 1 {
        return vec![];
    }
    let mut peaks = Vec::new();
    for i in order..n - order {
        let window = &prices[i - order..=i + order];
        let window_max = window.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        if prices[i] < window_max {
            continue;
        }
        let left_ok = prices[i] >= prices[i - 1];
        let right_ok = prices[i] >= prices[i + 1];
        let strict = prices[i] > prices[i - 1] || prices[i] > prices[i + 1];
        if left_ok && right_ok && strict {
            peaks.push(i);
        }
    }
    deduplicate_extrema(&peaks, prices, order, true)
}

fn local_troughs(prices: &[f64], order: usize) -> Vec<usize> {
    let n = prices.len();
    if n < 2 * order + 1 {
        return vec![];
    }
    let mut troughs = Vec::new();
    for i in order..n - order {
        let window = &prices[i - order..=i + order];
        let window_min = window.iter().cloned().fold(f64::INFINITY, f64::min);
        if prices[i] > window_min {
            continue;
        }
        let left_ok = prices[i] <= prices[i - 1];
        let right_ok = prices[i] <= prices[i + 1];
        let strict = prices[i] < prices[i - 1] || prices[i] < prices[i + 1];
        if left_ok && right_ok && strict {
            troughs.push(i);
        }
    }
    deduplicate_extrema(&troughs, prices, order, false)
}

fn slice_max(prices: &[f64]) -> f64 {
    prices.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
}

fn slice_min(prices: &[f64]) -> f64 {
    prices.iter().cloned().fold(f64::INFINITY, f64::min)
}

fn slice_mean(prices: &[f64]) -> f64 {
    if prices.is_empty() {
        return 0.0;
    }
    prices.iter().sum::<f64>() / prices.len() as f64
}

/// Last two peaks at similar height with a valley in between
fn double_top(prices: &[f64], peaks: &[usize]) -> Option<PatternMatch> {
    const TOL: f64 = 0.03;
    if peaks.len() < 2 {
        return None;
    }
    let (p1, p2) = (peaks[peaks.len() - 2], peaks[peaks.len() - 1]);
    let (h1, h2) = (prices[p1], prices[p2]);
    if h1 <= 0.0 || h2 <= 0.0 {
        return None;
    }
    if (h1 - h2).abs() / h1.max(h2) > TOL {
        return None;
    }
    let valley = slice_min(&prices[p1..=p2]);
    let depth = (h1.min(h2) - valley) / h1.min(h2);
    if depth < 0.03 {
        return None;
    }
    // Confirm the decline off the second peak
    if prices.len() > p2 + 2 && prices[prices.len() - 1] >= h2 * 0.99 {
        return None;
    }
    Some(PatternMatch {
        name: "Double Top".to_string(),
        bullish: false,
        score: -0.20 - (depth * 0.5).min(0.10),
        bar: p2,
        detail: format!("peaks~{h1:.2}/{h2:.2}, depth={:.1}%", depth * 100.0),
    })
}

/// Last two troughs at similar depth with a peak in between
fn double_bottom(prices: &[f64], troughs: &[usize]) -> Option<PatternMatch> {
    const TOL: f64 = 0.03;
    if troughs.len() < 2 {
        return None;
    }
    let (t1, t2) = (troughs[troughs.len() - 2], troughs[troughs.len() - 1]);
    let (lo1, lo2) = (prices[t1], prices[t2]);
    if lo1 <= 0.0 || lo2 <= 0.0 {
        return None;
    }
    if (lo1 - lo2).abs() / lo1.max(lo2) > TOL {
        return None;
    }
    let peak = slice_max(&prices[t1..=t2]);
    let rise = (peak - lo1.max(lo2)) / lo1.max(lo2);
    if rise < 0.03 {
        return None;
    }
    if prices.len() > t2 + 2 && prices[prices.len() - 1] <= lo2 * 1.01 {
        return None;
    }
    Some(PatternMatch {
        name: "Double Bottom".to_string(),
        bullish: true,
        score: 0.20 + (rise * 0.5).min(0.10),
        bar: t2,
        detail: format!("troughs~{lo1:.2}/{lo2:.2}, rise={:.1}%", rise * 100.0),
    })
}

/// Three peaks with the centre tallest and shoulders roughly level
fn head_and_shoulders(prices: &[f64], peaks: &[usize]) -> Option<PatternMatch> {
    const TOL: f64 = 0.05;
    if peaks.len() < 3 {
        return None;
    }
    let (ls, hd, rs) = (
        peaks[peaks.len() - 3],
        peaks[peaks.len() - 2],
        peaks[peaks.len() - 1],
    );
    let (h_ls, h_hd, h_rs) = (prices[ls], prices[hd], prices[rs]);
    if h_hd <= 0.0 || !(h_hd > h_ls && h_hd > h_rs) {
        return None;
    }
    if (h_ls - h_rs).abs() / h_ls.max(h_rs) > TOL {
        return None;
    }
    let neckline = (slice_min(&prices[ls..=hd]) + slice_min(&prices[hd..=rs])) / 2.0;
    // Price near or below the neckline confirms the pattern
    if prices[prices.len() - 1] > neckline * 1.03 {
        return None;
    }
    let depth = (h_hd - neckline) / h_hd;
    Some(PatternMatch {
        name: "Head & Shoulders".to_string(),
        bullish: false,
        score: -0.25 - (depth * 0.3).min(0.10),
        bar: rs,
        detail: format!("head={h_hd:.2}, neckline={neckline:.2}"),
    })
}

/// Three troughs with the centre deepest
fn inv_head_and_shoulders(prices: &[f64], troughs: &[usize]) -> Option<PatternMatch> {
    const TOL: f64 = 0.05;
    if troughs.len() < 3 {
        return None;
    }
    let (ls, hd, rs) = (
        troughs[troughs.len() - 3],
        troughs[troughs.len() - 2],
        troughs[troughs.len() - 1],
    );
    let (lo_ls, lo_hd, lo_rs) = (prices[ls], prices[hd], prices[rs]);
    if lo_hd <= 0.0 || !(lo_hd < lo_ls && lo_hd < lo_rs) {
        return None;
    }
    if (lo_ls - lo_rs).abs() / lo_ls.max(lo_rs) > TOL {
        return None;
    }
    let neckline = (slice_max(&prices[ls..=hd]) + slice_max(&prices[hd..=rs])) / 2.0;
    if prices[prices.len() - 1] < neckline * 0.97 {
        return None;
    }
    let rise = (neckline - lo_hd) / neckline;
    Some(PatternMatch {
        name: "Inv Head & Shoulders".to_string(),
        bullish: true,
        score: 0.25 + (rise * 0.3).min(0.10),
        bar: rs,
        detail: format!("head={lo_hd:.2}, neckline={neckline:.2}"),
    })
}

/// Strong upward pole, tight consolidation, upward breakout
fn bull_flag(prices: &[f64]) -> Option<PatternMatch> {
    const WINDOW: usize = 60;
    const FLAG_BARS: usize = 15;
    if prices.len() < WINDOW + FLAG_BARS {
        return None;
    }
    let pole = &prices[prices.len() - WINDOW - FLAG_BARS..prices.len() - FLAG_BARS];
    let flag = &prices[prices.len() - FLAG_BARS..];
    let pole_return = pole[pole.len() - 1] / pole[0] - 1.0;
    if pole_return < 0.08 {
        return None;
    }
    let flag_range = (slice_max(flag) - slice_min(flag)) / slice_mean(flag);
    if flag_range > 0.06 {
        return None;
    }
    if flag[flag.len() - 1] < slice_max(flag) * 0.98 {
        return None;
    }
    Some(PatternMatch {
        name: "Bull Flag".to_string(),
        bullish: true,
        score: 0.15,
        bar: prices.len() - 1,
        detail: format!(
            "pole={:.1}%, flag_range={:.1}%",
            pole_return * 100.0,
            flag_range * 100.0
        ),
    })
}

/// Strong downward pole, tight bounce, downward breakdown
fn bear_flag(prices: &[f64]) -> Option<PatternMatch> {
    const WINDOW: usize = 60;
    const FLAG_BARS: usize = 15;
    if prices.len() < WINDOW + FLAG_BARS {
        return None;
    }
    let pole = &prices[prices.len() - WINDOW - FLAG_BARS..prices.len() - FLAG_BARS];
    let flag = &prices[prices.len() - FLAG_BARS..];
    let pole_return = pole[pole.len() - 1] / pole[0] - 1.0;
    if pole_return > -0.08 {
        return None;
    }
    let flag_range = (slice_max(flag) - slice_min(flag)) / slice_mean(flag);
    if flag_range > 0.06 {
        return None;
    }
    if flag[flag.len() - 1] > slice_min(flag) * 1.02 {
        return None;
    }
    Some(PatternMatch {
        name: "Bear Flag".to_string(),
        bullish: false,
        score: -0.15,
        bar: prices.len() - 1,
        detail: format!(
            "pole={:.1}%, flag_range={:.1}%",
            pole_return * 100.0,
            flag_range * 100.0
        ),
    })
}

/// Tight range (<=5%) followed by a directional breakout in the last bars
fn consolidation_breakout(prices: &[f64]) -> Option<PatternMatch> {
    const CONSOL_BARS: usize = 20;
    const BREAKOUT_BARS: usize = 5;
    if prices.len() < CONSOL_BARS + BREAKOUT_BARS {
        return None;
    }
    let consol =
        &prices[prices.len() - CONSOL_BARS - BREAKOUT_BARS..prices.len() - BREAKOUT_BARS];
    let last = prices[prices.len() - 1];
    let rng = (slice_max(consol) - slice_min(consol)) / slice_mean(consol);
    if rng > 0.05 {
        return None;
    }
    let consol_high = slice_max(consol);
    let consol_low = slice_min(consol);
    if last > consol_high * 1.02 {
        let move_pct = (last - consol_high) / consol_high;
        Some(PatternMatch {
            name: "Consolidation Breakout Up".to_string(),
            bullish: true,
            score: (0.10 + move_pct * 2.0).min(0.20),
            bar: prices.len() - 1,
            detail: format!("range={:.1}%, breakout={:.1}%", rng * 100.0, move_pct * 100.0),
        })
    } else if last < consol_low * 0.98 {
        let move_pct = (consol_low - last) / consol_low;
        Some(PatternMatch {
            name: "Consolidation Breakout Dn".to_string(),
            bullish: false,
            score: -(0.10 + move_pct * 2.0).min(0.20),
            bar: prices.len() - 1,
            detail: format!("range={:.1}%, breakdown={:.1}%", rng * 100.0, move_pct * 100.0),
        })
    } else {
        None
    }
}

/// Scan a close-price series for classic chart patterns over the last
/// `lookback` bars (default 120).
pub fn detect_patterns(closes: &[f64], lookback: Option<usize>) -> PatternScan {
    let lookback = lookback.unwrap_or(DEFAULT_LOOKBACK);
    if closes.len() < 30 {
        return PatternScan::default();
    }
    let start = closes.len().saturating_sub(lookback);
    let prices = &closes[start..];

    let peaks = local_peaks(prices, 5);
    let troughs = local_troughs(prices, 5);

    let mut found: Vec<PatternMatch> = Vec::new();
    // Double top/bottom and H&S families share extrema, so a triple-peak
    // formation can surface both; the composite sums them deliberately.
    for detector in [
        double_top(prices, &peaks),
        double_bottom(prices, &troughs),
        head_and_shoulders(prices, &peaks),
        inv_head_and_shoulders(prices, &troughs),
        bull_flag(prices),
        bear_flag(prices),
        consolidation_breakout(prices),
    ] {
        if let Some(mut m) = detector {
            m.bar += start;
            found.push(m);
        }
    }

    if found.is_empty() {
        return PatternScan::default();
    }

    let total: f64 = found.iter().map(|p| p.score).sum();
    PatternScan {
        score: total.clamp(-1.0, 1.0),
        confidence: (0.30 + 0.15 * found.len() as f64).min(1.0),
        patterns: found,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two equal peaks at 110 with a valley at 100, declining tail
    fn double_top_series() -> Vec<f64> {
        let mut prices = vec![100.0; 10];
        // Ramp to first peak
        for i in 0..10 {
            prices.push(100.0 + i as f64);
        }
        prices.push(110.0);
        for i in (0..10).rev() {
            prices.push(100.0 + i as f64);
        }
        // Valley floor
        prices.extend(vec![100.0; 5]);
        // Second peak
        for i in 0..10 {
            prices.push(100.0 + i as f64);
        }
        prices.push(110.0);
        for i in (0..10).rev() {
            prices.push(100.0 + i as f64);
        }
        // Confirming decline
        prices.extend(vec![99.0, 98.0, 97.0, 96.0, 95.0, 94.0]);
        prices
    }

    #[test]
    fn detects_double_top() {
        let prices = double_top_series();
        let scan = detect_patterns(&prices, None);
        assert!(
            scan.patterns.iter().any(|p| p.name == "Double Top"),
            "expected a double top in {:?}",
            scan.patterns.iter().map(|p| p.name.clone()).collect::<Vec<_>>()
        );
        assert!(scan.score < 0.0);
        assert!(scan.confidence >= 0.45);
    }

    #[test]
    fn detects_double_bottom() {
        // Mirror of the double-top series around 105
        let prices: Vec<f64> = double_top_series().iter().map(|p| 210.0 - p).collect();
        let scan = detect_patterns(&prices, None);
        assert!(scan.patterns.iter().any(|p| p.name == "Double Bottom"));
        assert!(scan.score > 0.0);
    }

    #[test]
    fn detects_bull_flag() {
        let mut prices = Vec::new();
        // Pole: +20% over 60 bars
        for i in 0..60 {
            prices.push(100.0 * (1.0 + 0.2 * i as f64 / 59.0));
        }
        // Flag: tight range near the high, ending at the flag top
        for i in 0..15 {
            prices.push(119.0 + if i % 2 == 0 { 0.5 } else { 0.0 });
        }
        *prices.last_mut().unwrap() = 119.6;
        let scan = detect_patterns(&prices, None);
        assert!(scan.patterns.iter().any(|p| p.name == "Bull Flag"));
    }

    #[test]
    fn no_patterns_in_flat_series() {
        let prices = vec![100.0; 150];
        let scan = detect_patterns(&prices, None);
        // A perfectly flat series is a consolidation with no breakout
        assert!(scan.patterns.is_empty());
        assert_eq!(scan.score, 0.0);
    }

    #[test]
    fn composite_clipped_and_confidence_bounded() {
        let prices = double_top_series();
        let scan = detect_patterns(&prices, None);
        assert!(scan.score >= -1.0 && scan.score <= 1.0);
        assert!(scan.confidence <= 1.0);
    }
}
