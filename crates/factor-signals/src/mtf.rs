//! Multi-timeframe confluence.
//!
//! The same technical scorer runs on several timeframes; agreement
//! across them raises conviction and conflict lowers it.
//!
//! Timeframe weights: 1W 0.30 (structural trend), 1D 0.40 (primary),
//! 4H 0.20 (confirmation), 1H 0.10 (entry timing).

use chrono::{Datelike, Timelike};
use fusion_core::{AssetClass, Bar, FactorScore, MtfSignal};
use technical_analysis::compute_technical_signal;

fn tf_weight(tf: &str) -> f64 {
    match tf {
        "1W" => 0.30,
        "1D" => 0.40,
        "4H" => 0.20,
        "1H" => 0.10,
        _ => 0.15,
    }
}

fn merge_group(group: &[Bar]) -> Bar {
    Bar {
        timestamp: group[group.len() - 1].timestamp,
        open: group[0].open,
        high: group.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max),
        low: group.iter().map(|b| b.low).fold(f64::INFINITY, f64::min),
        close: group[group.len() - 1].close,
        volume: group.iter().map(|b| b.volume).sum(),
    }
}

fn resample_by_key<K: PartialEq>(bars: &[Bar], key: impl Fn(&Bar) -> K) -> Vec<Bar> {
    let mut result = Vec::new();
    let mut group: Vec<Bar> = Vec::new();
    for bar in bars {
        if let Some(first) = group.first() {
            if key(first) != key(bar) {
                result.push(merge_group(&group));
                group.clear();
            }
        }
        group.push(bar.clone());
    }
    if !group.is_empty() {
        result.push(merge_group(&group));
    }
    result
}

/// Aggregate daily bars into ISO-week bars
pub fn resample_weekly(daily: &[Bar]) -> Vec<Bar> {
    resample_by_key(daily, |b| {
        let week = b.timestamp.iso_week();
        (week.year(), week.week())
    })
}

/// Aggregate 1-hour bars into 4-hour bars
pub fn resample_4h(hourly: &[Bar]) -> Vec<Bar> {
    resample_by_key(hourly, |b| (b.timestamp.date_naive(), b.timestamp.hour() / 4))
}

/// Compute multi-timeframe confluence. `intraday_1h` is stocks-only;
/// crypto scans pass None and use the daily-derived timeframes.
pub fn compute_mtf_signal(
    asset_class: AssetClass,
    daily: &[Bar],
    intraday_1h: Option<&[Bar]>,
) -> MtfSignal {
    let mut tf_results: Vec<(String, FactorScore)> = Vec::new();

    if daily.len() >= 30 {
        let sig = compute_technical_signal(daily);
        tf_results.push(("1D".to_string(), FactorScore::new(sig.score, sig.confidence)));

        let weekly = resample_weekly(daily);
        if weekly.len() >= 15 {
            let sig = compute_technical_signal(&weekly);
            tf_results.push(("1W".to_string(), FactorScore::new(sig.score, sig.confidence)));
        }
    }

    if asset_class == AssetClass::Stock {
        if let Some(hourly) = intraday_1h.filter(|h| !h.is_empty()) {
            if hourly.len() >= 26 {
                let sig = compute_technical_signal(hourly);
                tf_results.push(("1H".to_string(), FactorScore::new(sig.score, sig.confidence)));
            }
            let four_h = resample_4h(hourly);
            if four_h.len() >= 20 {
                let sig = compute_technical_signal(&four_h);
                tf_results.push(("4H".to_string(), FactorScore::new(sig.score, sig.confidence)));
            }
        }
    }

    if tf_results.is_empty() {
        return MtfSignal {
            score: 0.0,
            confidence: 0.0,
            alignment: 0.5,
            tf_scores: vec![],
            timeframes_available: vec![],
        };
    }

    let mut weighted_score = 0.0;
    let mut total_weight = 0.0;
    for (tf, score) in &tf_results {
        let w = tf_weight(tf);
        weighted_score += w * score.score;
        total_weight += w;
    }
    let composite = if total_weight > 0.0 {
        weighted_score / total_weight
    } else {
        0.0
    };

    // Alignment: share of ALL timeframes (neutral included) agreeing with
    // the dominant non-neutral direction
    let directions: Vec<i32> = tf_results
        .iter()
        .map(|(_, s)| {
            if s.score > 0.05 {
                1
            } else if s.score < -0.05 {
                -1
            } else {
                0
            }
        })
        .collect();
    let non_neutral: Vec<i32> = directions.iter().copied().filter(|d| *d != 0).collect();
    let alignment = if non_neutral.is_empty() {
        0.5
    } else {
        let ups = non_neutral.iter().filter(|d| **d > 0).count();
        let downs = non_neutral.len() - ups;
        ups.max(downs) as f64 / directions.len() as f64
    };

    let avg_conf = tf_results.iter().map(|(_, s)| s.confidence).sum::<f64>()
        / tf_results.len() as f64;
    let confidence = (avg_conf * (0.5 + 0.5 * alignment)).clamp(0.0, 1.0);

    let timeframes_available = tf_results.iter().map(|(tf, _)| tf.clone()).collect();

    MtfSignal {
        score: composite.clamp(-1.0, 1.0),
        confidence,
        alignment,
        tf_scores: tf_results,
        timeframes_available,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn daily_bars(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                timestamp: Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap()
                    + chrono::Duration::days(i as i64),
                open: c * 0.995,
                high: c * 1.01,
                low: c * 0.99,
                close: c,
                volume: 1_000_000.0,
            })
            .collect()
    }

    #[test]
    fn weekly_resample_reduces_bar_count() {
        let daily = daily_bars(&(0..140).map(|i| 100.0 + i as f64 * 0.1).collect::<Vec<_>>());
        let weekly = resample_weekly(&daily);
        assert!(weekly.len() >= 19 && weekly.len() <= 21, "got {}", weekly.len());
        // OHLC of the first week covers the first 7 calendar days
        assert!(weekly[0].high >= weekly[0].open);
        assert!(weekly[0].low <= weekly[0].close);
    }

    #[test]
    fn four_hour_resample_groups_by_block() {
        let hourly: Vec<Bar> = (0..48)
            .map(|i| Bar {
                timestamp: Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap()
                    + chrono::Duration::hours(i),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0 + i as f64 * 0.1,
                volume: 1000.0,
            })
            .collect();
        let four_h = resample_4h(&hourly);
        assert_eq!(four_h.len(), 12);
        assert!((four_h[0].volume - 4000.0).abs() < 1e-9);
    }

    #[test]
    fn too_little_data_returns_empty_signal() {
        let sig = compute_mtf_signal(AssetClass::Stock, &daily_bars(&[100.0; 10]), None);
        assert!(sig.timeframes_available.is_empty());
        assert_eq!(sig.confidence, 0.0);
        assert!((sig.alignment - 0.5).abs() < 1e-9);
    }

    #[test]
    fn daily_and_weekly_available_for_long_history() {
        let closes: Vec<f64> = (0..200).map(|i| 100.0 + i as f64 * 0.2).collect();
        let sig = compute_mtf_signal(AssetClass::Crypto, &daily_bars(&closes), None);
        assert!(sig.timeframes_available.contains(&"1D".to_string()));
        assert!(sig.timeframes_available.contains(&"1W".to_string()));
        assert!(sig.score >= -1.0 && sig.score <= 1.0);
    }

    #[test]
    fn aligned_timeframes_boost_confidence() {
        let trending: Vec<f64> = (0..200).map(|i| 100.0 + i as f64 * 0.5).collect();
        let sig = compute_mtf_signal(AssetClass::Crypto, &daily_bars(&trending), None);
        if sig.timeframes_available.len() >= 2 {
            assert!(sig.alignment >= 0.5);
        }
    }
}
