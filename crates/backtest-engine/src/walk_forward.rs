//! Anchored walk-forward validation.
//!
//! The in-sample window grows monotonically while each successive
//! out-of-sample slice is a fresh, unseen period. Per-fold metrics come
//! from running the backtester over the union of in-sample + OOS data
//! with the same entry rules; only OOS placement is reported per fold.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use fusion_core::{Bar, SignalError};
use serde::{Deserialize, Serialize};

use crate::engine::{BacktestEngine, SignalFn};
use crate::models::BacktestConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardFold {
    pub fold: usize,
    pub oos_start: NaiveDate,
    pub oos_end: NaiveDate,
    pub total_return: f64,
    pub annual_return: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub total_trades: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalkForwardResult {
    pub folds: Vec<WalkForwardFold>,
    pub n_folds: usize,
    pub oos_sharpe_mean: f64,
    pub oos_sharpe_std: f64,
    pub oos_return_mean: f64,
    pub oos_max_dd_mean: f64,
    pub oos_positive_folds: usize,
}

pub struct WalkForwardValidator {
    pub in_sample_bars: usize,
    pub out_of_sample_bars: usize,
    pub config: BacktestConfig,
}

impl WalkForwardValidator {
    pub fn new(in_sample_bars: usize, out_of_sample_bars: usize, config: BacktestConfig) -> Self {
        Self {
            in_sample_bars,
            out_of_sample_bars,
            config,
        }
    }

    /// Run anchored walk-forward validation over the given series.
    pub fn run(
        &self,
        price_data: &HashMap<String, Vec<Bar>>,
        signal_fn: Option<&SignalFn>,
    ) -> Result<WalkForwardResult, SignalError> {
        if self.out_of_sample_bars == 0 {
            return Err(SignalError::BadInput(
                "out_of_sample_bars must be positive".to_string(),
            ));
        }

        let all_dates: Vec<NaiveDate> = price_data
            .values()
            .flat_map(|bars| bars.iter().map(|b| b.date()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let total_bars = all_dates.len();

        let mut folds: Vec<WalkForwardFold> = Vec::new();
        let mut fold_idx = 0usize;
        let mut oos_end = self.in_sample_bars + self.out_of_sample_bars;

        while oos_end <= total_bars {
            let oos_start_idx = oos_end - self.out_of_sample_bars;
            let window_dates: BTreeSet<NaiveDate> =
                all_dates[..oos_end].iter().copied().collect();

            // Slice each symbol's data to the current window; symbols
            // without enough history sit this fold out
            let mut window_data: HashMap<String, Vec<Bar>> = HashMap::new();
            for (symbol, bars) in price_data {
                let sliced: Vec<Bar> = bars
                    .iter()
                    .filter(|b| window_dates.contains(&b.date()))
                    .cloned()
                    .collect();
                if sliced.len() >= self.in_sample_bars + 10 {
                    window_data.insert(symbol.clone(), sliced);
                }
            }

            if !window_data.is_empty() {
                let engine = BacktestEngine::new(self.config.clone());
                match engine.run(&window_data, signal_fn) {
                    Ok(report) => {
                        let m = &report.metrics;
                        folds.push(WalkForwardFold {
                            fold: fold_idx,
                            oos_start: all_dates[oos_start_idx],
                            oos_end: all_dates[oos_end - 1],
                            total_return: m.total_return,
                            annual_return: m.annual_return,
                            sharpe_ratio: m.sharpe_ratio,
                            sortino_ratio: m.sortino_ratio,
                            calmar_ratio: m.calmar_ratio,
                            max_drawdown: m.max_drawdown,
                            win_rate: m.win_rate,
                            total_trades: m.total_trades,
                        });
                    }
                    Err(e) => {
                        tracing::warn!("walk-forward fold {} failed: {}", fold_idx, e);
                    }
                }
            }

            oos_end += self.out_of_sample_bars;
            fold_idx += 1;
        }

        if folds.is_empty() {
            return Ok(WalkForwardResult::default());
        }

        let sharpes: Vec<f64> = folds.iter().map(|f| f.sharpe_ratio).collect();
        let returns: Vec<f64> = folds.iter().map(|f| f.total_return).collect();
        let max_dds: Vec<f64> = folds.iter().map(|f| f.max_drawdown).collect();

        let mean = |v: &[f64]| v.iter().sum::<f64>() / v.len() as f64;
        let sharpe_mean = mean(&sharpes);
        let sharpe_std = (sharpes
            .iter()
            .map(|s| (s - sharpe_mean).powi(2))
            .sum::<f64>()
            / sharpes.len() as f64)
            .sqrt();

        let n_folds = folds.len();
        let oos_positive_folds = returns.iter().filter(|r| **r > 0.0).count();

        Ok(WalkForwardResult {
            folds,
            n_folds,
            oos_sharpe_mean: sharpe_mean,
            oos_sharpe_std: sharpe_std,
            oos_return_mean: mean(&returns),
            oos_max_dd_mean: mean(&max_dds),
            oos_positive_folds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use fusion_core::FactorScore;

    fn bars(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| {
                let c = 100.0 + (i as f64 * 0.15).sin() * 8.0 + i as f64 * 0.05;
                Bar {
                    timestamp: Utc.with_ymd_and_hms(2022, 1, 3, 0, 0, 0).unwrap()
                        + chrono::Duration::days(i as i64),
                    open: c * 0.995,
                    high: c * 1.01,
                    low: c * 0.99,
                    close: c,
                    volume: 1_000_000.0,
                }
            })
            .collect()
    }

    // Scenario: 500 bars, in-sample 252, OOS 63 -> exactly 3 folds
    // (315, 378, 441 fit; 504 exceeds 500)
    #[test]
    fn fold_count_matches_window_arithmetic() {
        let mut data = HashMap::new();
        data.insert("TEST".to_string(), bars(500));

        let validator = WalkForwardValidator::new(252, 63, BacktestConfig::default());
        let result = validator.run(&data, None).unwrap();

        assert_eq!(result.n_folds, 3);
        assert!(result.oos_positive_folds <= 3);
    }

    #[test]
    fn oos_windows_never_overlap_and_advance() {
        let mut data = HashMap::new();
        data.insert("TEST".to_string(), bars(500));

        let validator = WalkForwardValidator::new(252, 63, BacktestConfig::default());
        let result = validator.run(&data, None).unwrap();

        for pair in result.folds.windows(2) {
            assert!(pair[1].oos_start > pair[0].oos_end);
        }
    }

    #[test]
    fn too_little_data_yields_no_folds() {
        let mut data = HashMap::new();
        data.insert("TEST".to_string(), bars(100));

        let validator = WalkForwardValidator::new(252, 63, BacktestConfig::default());
        let result = validator.run(&data, None).unwrap();
        assert_eq!(result.n_folds, 0);
    }

    #[test]
    fn aggregates_match_folds() {
        let mut data = HashMap::new();
        data.insert("TEST".to_string(), bars(450));

        let always_buy: Box<SignalFn> =
            Box::new(|_| FactorScore::new(0.9, 0.9));
        let validator = WalkForwardValidator::new(252, 63, BacktestConfig::default());
        let result = validator.run(&data, Some(&*always_buy)).unwrap();

        assert_eq!(result.n_folds, result.folds.len());
        if result.n_folds > 0 {
            let mean_ret: f64 = result.folds.iter().map(|f| f.total_return).sum::<f64>()
                / result.n_folds as f64;
            assert!((result.oos_return_mean - mean_ret).abs() < 1e-9);
        }
    }
}
