//! Monte Carlo bootstrap over the trade P&L sequence.
//!
//! Answers how much of a backtest result is due to trade ordering luck:
//! the observed P&L values are reshuffled N times, each shuffle rebuilds
//! an equity curve, and the metric distributions are reported as
//! percentiles. A fixed seed makes the whole run reproducible.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::engine::percentile;

/// {p5, p25, p50, p75, p95} of one simulated metric
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PercentileBand {
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
}

impl PercentileBand {
    fn from_samples(samples: &[f64]) -> Self {
        Self {
            p5: percentile(samples, 5.0),
            p25: percentile(samples, 25.0),
            p50: percentile(samples, 50.0),
            p75: percentile(samples, 75.0),
            p95: percentile(samples, 95.0),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonteCarloResult {
    pub n_simulations: usize,
    pub n_trades: usize,
    pub total_return: PercentileBand,
    pub max_drawdown: PercentileBand,
    pub sharpe_ratio: PercentileBand,
    pub final_value: PercentileBand,
    /// Fraction of simulations ending with a positive return
    pub prob_positive: f64,
    /// Fraction of simulations whose max drawdown exceeded 20%
    pub prob_drawdown_over_20pct: f64,
}

fn max_drawdown(equity: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0f64;
    for &v in equity {
        peak = peak.max(v);
        if peak > 0.0 {
            max_dd = max_dd.max((peak - v) / peak);
        }
    }
    max_dd
}

fn sharpe(equity: &[f64]) -> f64 {
    if equity.len() < 2 {
        return 0.0;
    }
    let returns: Vec<f64> = equity
        .windows(2)
        .map(|w| if w[0] != 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect();
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
    let std = var.sqrt();
    if std < 1e-12 {
        return 0.0;
    }
    (mean - 0.04 / 252.0) / std * 252.0_f64.sqrt()
}

/// Run the bootstrap. `trade_pnls` are dollar P&L values per closed
/// trade; `seed` of None picks an arbitrary seed (non-reproducible).
pub fn run_monte_carlo(
    trade_pnls: &[f64],
    initial_capital: f64,
    n_simulations: usize,
    seed: Option<u64>,
) -> MonteCarloResult {
    if trade_pnls.is_empty() || n_simulations == 0 {
        return MonteCarloResult::default();
    }

    let base_seed = seed.unwrap_or_else(rand::random);

    // Each simulation derives its own seed so the batch parallelises
    // without losing determinism
    let sims: Vec<(f64, f64, f64, f64)> = (0..n_simulations)
        .into_par_iter()
        .map(|i| {
            let mut rng = StdRng::seed_from_u64(base_seed.wrapping_add(i as u64));
            let mut shuffled = trade_pnls.to_vec();
            shuffled.shuffle(&mut rng);

            let mut equity = Vec::with_capacity(shuffled.len() + 1);
            equity.push(initial_capital);
            let mut running = initial_capital;
            for pnl in shuffled {
                running += pnl;
                equity.push(running);
            }

            let total_return = (equity[equity.len() - 1] - equity[0]) / equity[0];
            (
                total_return,
                max_drawdown(&equity),
                sharpe(&equity),
                equity[equity.len() - 1],
            )
        })
        .collect();

    let returns: Vec<f64> = sims.iter().map(|s| s.0).collect();
    let drawdowns: Vec<f64> = sims.iter().map(|s| s.1).collect();
    let sharpes: Vec<f64> = sims.iter().map(|s| s.2).collect();
    let finals: Vec<f64> = sims.iter().map(|s| s.3).collect();

    let positive = returns.iter().filter(|r| **r > 0.0).count();
    let deep_dd = drawdowns.iter().filter(|d| **d > 0.20).count();

    MonteCarloResult {
        n_simulations,
        n_trades: trade_pnls.len(),
        total_return: PercentileBand::from_samples(&returns),
        max_drawdown: PercentileBand::from_samples(&drawdowns),
        sharpe_ratio: PercentileBand::from_samples(&sharpes),
        final_value: PercentileBand::from_samples(&finals),
        prob_positive: positive as f64 / n_simulations as f64,
        prob_drawdown_over_20pct: deep_dd as f64 / n_simulations as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_seed_is_reproducible() {
        let pnls = vec![500.0, -300.0, 800.0, -150.0, 200.0, -600.0, 1000.0];
        let a = run_monte_carlo(&pnls, 100_000.0, 200, Some(42));
        let b = run_monte_carlo(&pnls, 100_000.0, 200, Some(42));
        assert_eq!(a.total_return.p50, b.total_return.p50);
        assert_eq!(a.max_drawdown.p95, b.max_drawdown.p95);
        assert_eq!(a.prob_positive, b.prob_positive);
    }

    #[test]
    fn different_seeds_differ() {
        let pnls = vec![500.0, -300.0, 800.0, -150.0, 200.0, -600.0, 1000.0];
        let a = run_monte_carlo(&pnls, 100_000.0, 200, Some(1));
        let b = run_monte_carlo(&pnls, 100_000.0, 200, Some(2));
        // Total return is order-independent so it matches; drawdowns are
        // order-dependent and should differ between seeds
        assert!((a.total_return.p50 - b.total_return.p50).abs() < 1e-9);
        assert!(a.max_drawdown.p50 != b.max_drawdown.p50 || a.sharpe_ratio.p50 != b.sharpe_ratio.p50);
    }

    #[test]
    fn total_return_is_shuffle_invariant() {
        let pnls = vec![1000.0, 2000.0, -500.0];
        let result = run_monte_carlo(&pnls, 100_000.0, 50, Some(7));
        let expected = 2500.0 / 100_000.0;
        assert!((result.total_return.p5 - expected).abs() < 1e-9);
        assert!((result.total_return.p95 - expected).abs() < 1e-9);
        assert_eq!(result.prob_positive, 1.0);
    }

    #[test]
    fn all_losing_trades_never_positive() {
        let pnls = vec![-1000.0; 10];
        let result = run_monte_carlo(&pnls, 100_000.0, 100, Some(3));
        assert_eq!(result.prob_positive, 0.0);
        assert!(result.max_drawdown.p50 > 0.0);
    }

    #[test]
    fn empty_input_is_empty_result() {
        let result = run_monte_carlo(&[], 100_000.0, 100, Some(1));
        assert_eq!(result.n_simulations, 0);
        assert_eq!(result.n_trades, 0);
    }
}
