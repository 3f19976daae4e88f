use fusion_core::Bar;

/// Return val if it is finite, otherwise return default.
#[inline]
pub fn finite_or(val: f64, default: f64) -> f64 {
    if val.is_finite() {
        val
    } else {
        default
    }
}

/// Simple Moving Average. Output is aligned to the end of the input:
/// `result[0]` covers `data[0..period]`.
pub fn sma(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.len() < period {
        return vec![];
    }

    let mut result = Vec::with_capacity(data.len() - period + 1);
    for i in period - 1..data.len() {
        let sum: f64 = data[i + 1 - period..=i].iter().sum();
        result.push(finite_or(sum / period as f64, 0.0));
    }
    result
}

/// Exponential Moving Average, seeded with the SMA of the first `period`
/// values. Output length matches input length so callers can line values
/// up with bars (MACD relies on this).
pub fn ema(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.is_empty() {
        return vec![];
    }

    if data.len() < period {
        let avg = data.iter().sum::<f64>() / data.len() as f64;
        return vec![finite_or(avg, 0.0)];
    }

    let mut result = Vec::with_capacity(data.len());
    let multiplier = 2.0 / (period as f64 + 1.0);

    let sma_seed: f64 = data[..period].iter().sum::<f64>() / period as f64;
    let sma_seed = finite_or(sma_seed, 0.0);
    for _ in 0..period {
        result.push(sma_seed);
    }

    for i in period..data.len() {
        let prev_ema = result[i - 1];
        let ema_val = (data[i] - prev_ema) * multiplier + prev_ema;
        result.push(finite_or(ema_val, prev_ema));
    }

    result
}

/// Relative Strength Index (Wilder smoothing)
pub fn rsi(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.len() < period + 1 {
        return vec![];
    }

    let mut gains = Vec::new();
    let mut losses = Vec::new();

    for i in 1..data.len() {
        let change = data[i] - data[i - 1];
        if change > 0.0 {
            gains.push(change);
            losses.push(0.0);
        } else {
            gains.push(0.0);
            losses.push(change.abs());
        }
    }

    let mut avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period as f64;

    let mut rsi_values = Vec::with_capacity(data.len() - period);

    for i in period..gains.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[i]) / period as f64;

        let rs = if avg_loss == 0.0 {
            100.0
        } else {
            avg_gain / avg_loss
        };

        let rsi = 100.0 - (100.0 / (1.0 + rs));
        rsi_values.push(finite_or(rsi, 50.0));
    }

    rsi_values
}

/// MACD (Moving Average Convergence Divergence)
pub struct MacdResult {
    pub macd_line: Vec<f64>,
    pub signal_line: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub fn macd(
    data: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> MacdResult {
    if fast_period == 0 || slow_period == 0 || signal_period == 0 || slow_period < fast_period {
        return MacdResult {
            macd_line: vec![],
            signal_line: vec![],
            histogram: vec![],
        };
    }

    let ema_fast = ema(data, fast_period);
    let ema_slow = ema(data, slow_period);
    if ema_fast.len() != data.len() || ema_slow.len() != data.len() {
        return MacdResult {
            macd_line: vec![],
            signal_line: vec![],
            histogram: vec![],
        };
    }

    let macd_line: Vec<f64> = ema_fast
        .iter()
        .zip(ema_slow.iter())
        .map(|(f, s)| f - s)
        .collect();

    let signal_line = ema(&macd_line, signal_period);

    let hist_offset = macd_line.len().saturating_sub(signal_line.len());
    let histogram: Vec<f64> = signal_line
        .iter()
        .enumerate()
        .map(|(i, s)| macd_line[i + hist_offset] - s)
        .collect();

    MacdResult {
        macd_line,
        signal_line,
        histogram,
    }
}

/// Bollinger Bands
pub struct BollingerBands {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

pub fn bollinger_bands(data: &[f64], period: usize, std_dev: f64) -> BollingerBands {
    if period == 0 || data.len() < period {
        return BollingerBands {
            upper: vec![],
            middle: vec![],
            lower: vec![],
        };
    }

    let middle = sma(data, period);
    let mut upper = Vec::with_capacity(middle.len());
    let mut lower = Vec::with_capacity(middle.len());

    for i in period - 1..data.len() {
        let slice = &data[i + 1 - period..=i];
        let mean = middle[i + 1 - period];
        let variance: f64 = slice.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / period as f64;
        let std = variance.sqrt();

        upper.push(finite_or(mean + std_dev * std, mean));
        lower.push(finite_or(mean - std_dev * std, mean));
    }

    BollingerBands {
        upper,
        middle,
        lower,
    }
}

/// Average True Range (Wilder smoothing)
pub fn atr(bars: &[Bar], period: usize) -> Vec<f64> {
    if period == 0 || bars.len() < period + 1 {
        return vec![];
    }

    let mut true_ranges = Vec::new();

    for i in 1..bars.len() {
        let high_low = bars[i].high - bars[i].low;
        let high_close = (bars[i].high - bars[i - 1].close).abs();
        let low_close = (bars[i].low - bars[i - 1].close).abs();

        let tr = high_low.max(high_close).max(low_close);
        true_ranges.push(tr);
    }

    let mut atr_values = Vec::new();
    let mut atr = true_ranges[..period].iter().sum::<f64>() / period as f64;
    atr = finite_or(atr, 0.0);
    atr_values.push(atr);

    for tr in &true_ranges[period..] {
        atr = (atr * (period - 1) as f64 + tr) / period as f64;
        atr_values.push(finite_or(atr, 0.0));
    }

    atr_values
}

/// Latest ATR value, if enough bars exist
pub fn latest_atr(bars: &[Bar], period: usize) -> Option<f64> {
    atr(bars, period).last().copied().filter(|v| *v > 0.0)
}

/// Stochastic Oscillator
pub struct StochasticResult {
    pub k: Vec<f64>,
    pub d: Vec<f64>,
}

pub fn stochastic(bars: &[Bar], k_period: usize, d_period: usize) -> StochasticResult {
    if k_period == 0 || bars.len() < k_period {
        return StochasticResult { k: vec![], d: vec![] };
    }

    let mut k_values = Vec::new();

    for i in k_period - 1..bars.len() {
        let slice = &bars[i + 1 - k_period..=i];
        let highest = slice
            .iter()
            .map(|b| b.high)
            .fold(f64::NEG_INFINITY, f64::max);
        let lowest = slice.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);

        let k = if highest == lowest {
            50.0
        } else {
            100.0 * (bars[i].close - lowest) / (highest - lowest)
        };

        k_values.push(finite_or(k, 50.0));
    }

    let d_values = sma(&k_values, d_period);

    StochasticResult {
        k: k_values,
        d: d_values,
    }
}

/// On-Balance Volume
pub fn obv(bars: &[Bar]) -> Vec<f64> {
    if bars.is_empty() {
        return vec![];
    }

    let mut result = Vec::with_capacity(bars.len());
    let mut running = 0.0;
    result.push(0.0);

    for i in 1..bars.len() {
        if bars[i].close > bars[i - 1].close {
            running += bars[i].volume;
        } else if bars[i].close < bars[i - 1].close {
            running -= bars[i].volume;
        }
        result.push(running);
    }

    result
}

/// Volume-Weighted Average Price, cumulative over the series
pub fn vwap(bars: &[Bar]) -> Vec<f64> {
    if bars.is_empty() {
        return vec![];
    }

    let mut result = Vec::with_capacity(bars.len());
    let mut cum_vol = 0.0;
    let mut cum_tp_vol = 0.0;

    for bar in bars {
        let typical = (bar.high + bar.low + bar.close) / 3.0;
        cum_vol += bar.volume;
        cum_tp_vol += typical * bar.volume;
        if cum_vol > 0.0 {
            result.push(finite_or(cum_tp_vol / cum_vol, typical));
        } else {
            result.push(typical);
        }
    }

    result
}

/// Latest volume relative to its trailing average (e.g. 20-day).
/// Values above 2.0 flag unusual participation.
pub fn relative_volume(bars: &[Bar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period {
        return None;
    }
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
    let avg = sma(&volumes, period).last().copied()?;
    if avg <= 0.0 {
        return None;
    }
    Some(volumes.last()? / avg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                    + chrono::Duration::days(i as i64),
                open: c,
                high: c * 1.01,
                low: c * 0.99,
                close: c,
                volume: 1_000_000.0,
            })
            .collect()
    }

    #[test]
    fn sma_basic() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = sma(&data, 3);
        assert_eq!(result, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn sma_insufficient_data() {
        assert!(sma(&[1.0, 2.0], 5).is_empty());
    }

    #[test]
    fn ema_length_matches_input() {
        let data: Vec<f64> = (1..=50).map(|i| i as f64).collect();
        assert_eq!(ema(&data, 12).len(), data.len());
    }

    #[test]
    fn rsi_rising_series_is_high() {
        let data: Vec<f64> = (1..=40).map(|i| i as f64).collect();
        let values = rsi(&data, 14);
        assert!(*values.last().unwrap() > 70.0);
    }

    #[test]
    fn rsi_falling_series_is_low() {
        let data: Vec<f64> = (1..=40).rev().map(|i| i as f64).collect();
        let values = rsi(&data, 14);
        assert!(*values.last().unwrap() < 30.0);
    }

    #[test]
    fn macd_histogram_positive_in_uptrend() {
        let data: Vec<f64> = (0..120).map(|i| 100.0 + i as f64).collect();
        let result = macd(&data, 12, 26, 9);
        assert!(!result.histogram.is_empty());
        assert!(*result.histogram.last().unwrap() >= 0.0);
    }

    #[test]
    fn bollinger_bands_contain_middle() {
        let data: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let bb = bollinger_bands(&data, 20, 2.0);
        for i in 0..bb.middle.len() {
            assert!(bb.upper[i] >= bb.middle[i]);
            assert!(bb.lower[i] <= bb.middle[i]);
        }
    }

    #[test]
    fn atr_positive() {
        let bars = bars_from_closes(&(1..=40).map(|i| 100.0 + i as f64).collect::<Vec<_>>());
        let values = atr(&bars, 14);
        assert!(!values.is_empty());
        assert!(values.iter().all(|v| *v > 0.0));
    }

    #[test]
    fn stochastic_bounded() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.3).cos() * 10.0).collect();
        let bars = bars_from_closes(&closes);
        let stoch = stochastic(&bars, 14, 3);
        assert!(stoch.k.iter().all(|k| (0.0..=100.0).contains(k)));
    }

    #[test]
    fn obv_accumulates_on_up_days() {
        let bars = bars_from_closes(&[100.0, 101.0, 102.0, 103.0]);
        let values = obv(&bars);
        assert_eq!(values.len(), 4);
        assert!((values[3] - 3_000_000.0).abs() < 1.0);
    }

    #[test]
    fn relative_volume_detects_spike() {
        let mut bars = bars_from_closes(&(0..30).map(|i| 100.0 + i as f64).collect::<Vec<_>>());
        bars.last_mut().unwrap().volume = 5_000_000.0;
        let rv = relative_volume(&bars, 20).unwrap();
        assert!(rv > 2.0);
    }
}
