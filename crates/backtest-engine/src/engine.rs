//! Event-driven backtester.
//!
//! Walks the sorted union of trading days across all symbols. On each
//! bar: mark-to-market, trailing-stop maintenance and stop exits, a
//! drawdown-halt gate for new entries, then signal evaluation over
//! history up to and including the current bar. Signals never see
//! future bars.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use fusion_core::{Bar, FactorScore, SignalError};
use signal_fusion::{combine_signals, FactorInputs};
use technical_analysis::{compute_technical_signal, latest_atr};

use crate::models::*;

/// Scoring function over history up to and including the current bar
pub type SignalFn = dyn Fn(&[Bar]) -> FactorScore + Send + Sync;

/// Default technical-mode scorer
pub fn technical_signal_fn() -> Box<SignalFn> {
    Box::new(|bars| {
        let sig = compute_technical_signal(bars);
        FactorScore::new(sig.score, sig.confidence)
    })
}

/// AI-mode scorer: composes the technical factor with an ML score
/// through the fusion engine, using neutral placeholders for the
/// live-only factors (sentiment feeds are not replayable offline).
pub fn ai_signal_fn(
    ml: impl Fn(&[Bar]) -> FactorScore + Send + Sync + 'static,
) -> Box<SignalFn> {
    Box::new(move |bars| {
        let tech = compute_technical_signal(bars);
        let inputs = FactorInputs {
            technical: FactorScore::new(tech.score, tech.confidence),
            sentiment: FactorScore::new(0.0, 0.3),
            ml: ml(bars),
            ..Default::default()
        };
        let fused = combine_signals(&inputs, &Default::default(), &Default::default());
        FactorScore::new(fused.strength, fused.confidence)
    })
}

struct OpenPosition {
    quantity: f64,
    entry_price: f64,
    stop_loss: f64,
    trailing_stop: f64,
    highest: f64,
}

pub struct BacktestEngine {
    config: BacktestConfig,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Self {
        Self { config }
    }

    /// Run the backtest over per-symbol daily series. `signal_fn`
    /// defaults to the technical scorer.
    pub fn run(
        &self,
        price_data: &HashMap<String, Vec<Bar>>,
        signal_fn: Option<&SignalFn>,
    ) -> Result<BacktestReport, SignalError> {
        if price_data.is_empty() {
            return Err(SignalError::BadInput("no price data supplied".to_string()));
        }

        let default_fn = technical_signal_fn();
        let signal_fn = signal_fn.unwrap_or(&*default_fn);

        // Index bars by (symbol, date) and build the unified timeline
        let mut all_dates: BTreeSet<NaiveDate> = BTreeSet::new();
        let mut by_symbol_date: HashMap<&str, HashMap<NaiveDate, usize>> = HashMap::new();
        for (symbol, bars) in price_data {
            let mut date_map = HashMap::new();
            for (idx, bar) in bars.iter().enumerate() {
                all_dates.insert(bar.date());
                date_map.insert(bar.date(), idx);
            }
            by_symbol_date.insert(symbol.as_str(), date_map);
        }
        let all_dates: Vec<NaiveDate> = all_dates.into_iter().collect();

        // Deterministic symbol iteration order
        let mut symbols: Vec<&String> = price_data.keys().collect();
        symbols.sort();

        let mut cash = self.config.initial_capital;
        let mut positions: HashMap<String, OpenPosition> = HashMap::new();
        let mut trades: Vec<BacktestTrade> = Vec::new();
        let mut equity_curve: Vec<f64> = Vec::with_capacity(all_dates.len());
        let mut running_peak = self.config.initial_capital;

        for &date in &all_dates {
            // 1. Mark-to-market, O(1) peak maintenance
            let mut port_value = cash;
            for (symbol, pos) in &positions {
                let close = by_symbol_date
                    .get(symbol.as_str())
                    .and_then(|m| m.get(&date))
                    .map(|&i| price_data[symbol][i].close)
                    .unwrap_or(pos.entry_price);
                port_value += pos.quantity * close;
            }
            running_peak = running_peak.max(port_value);
            equity_curve.push(port_value);

            // 2. Trailing-stop lift, then stop exits
            let mut closed: Vec<String> = Vec::new();
            for (symbol, pos) in positions.iter_mut() {
                let Some(&bar_idx) = by_symbol_date
                    .get(symbol.as_str())
                    .and_then(|m| m.get(&date))
                else {
                    continue;
                };
                let price = price_data[symbol][bar_idx].close;

                if price > pos.highest {
                    pos.highest = price;
                    pos.trailing_stop = price * (1.0 - self.config.stops.trailing);
                }

                let stop = pos.stop_loss.max(pos.trailing_stop);
                if price <= stop {
                    let proceeds = pos.quantity * price * (1.0 - self.config.commission);
                    cash += proceeds;
                    let pnl = (price - pos.entry_price) * pos.quantity;
                    trades.push(BacktestTrade {
                        symbol: symbol.clone(),
                        action: "SELL (STOP)".to_string(),
                        date,
                        price,
                        quantity: pos.quantity,
                        pnl,
                    });
                    closed.push(symbol.clone());
                }
            }
            for symbol in closed {
                positions.remove(&symbol);
            }

            // 3. Drawdown halt: no new entries while deep under water
            let current_dd = if running_peak > 0.0 {
                (running_peak - port_value) / running_peak
            } else {
                0.0
            };
            if current_dd >= self.config.limits.drawdown_halt {
                continue;
            }

            // 4. Evaluate signals over history <= today
            for symbol in &symbols {
                let Some(&bar_idx) = by_symbol_date
                    .get(symbol.as_str())
                    .and_then(|m| m.get(&date))
                else {
                    continue;
                };
                if bar_idx < self.config.min_history_bars {
                    continue;
                }

                let bars = &price_data[*symbol];
                let history = &bars[..=bar_idx];
                let signal = signal_fn(history);
                let price = bars[bar_idx].close;

                if !positions.contains_key(*symbol)
                    && signal.score > self.config.thresholds.buy_threshold
                    && signal.confidence >= self.config.thresholds.buy_confidence_min
                {
                    let position_value = port_value * self.config.position_size_pct;
                    let quantity = position_value / price;
                    let cost = quantity * price * (1.0 + self.config.commission);
                    if cost <= cash {
                        cash -= cost;
                        let stop = match latest_atr(history, 14) {
                            Some(atr) => price - self.config.stops.atr_multiplier * atr,
                            None => price * 0.95,
                        };
                        positions.insert(
                            (*symbol).clone(),
                            OpenPosition {
                                quantity,
                                entry_price: price,
                                stop_loss: stop,
                                trailing_stop: price * (1.0 - self.config.stops.trailing),
                                highest: price,
                            },
                        );
                        trades.push(BacktestTrade {
                            symbol: (*symbol).clone(),
                            action: "BUY".to_string(),
                            date,
                            price,
                            quantity,
                            pnl: 0.0,
                        });
                    }
                } else if positions.contains_key(*symbol)
                    && signal.score < self.config.thresholds.sell_threshold
                    && signal.confidence >= self.config.thresholds.sell_confidence_min
                {
                    let pos = positions.remove(*symbol).unwrap();
                    let proceeds = pos.quantity * price * (1.0 - self.config.commission);
                    cash += proceeds;
                    let pnl = (price - pos.entry_price) * pos.quantity;
                    trades.push(BacktestTrade {
                        symbol: (*symbol).clone(),
                        action: "SELL (SIGNAL)".to_string(),
                        date,
                        price,
                        quantity: pos.quantity,
                        pnl,
                    });
                }
            }
        }

        // 5. Close any remaining positions at the last available price
        if let Some(&last_date) = all_dates.last() {
            let mut open_symbols: Vec<String> = positions.keys().cloned().collect();
            open_symbols.sort();
            for symbol in open_symbols {
                let pos = positions.remove(&symbol).unwrap();
                let last_price = price_data[&symbol]
                    .last()
                    .map(|b| b.close)
                    .unwrap_or(pos.entry_price);
                cash += pos.quantity * last_price * (1.0 - self.config.commission);
                let pnl = (last_price - pos.entry_price) * pos.quantity;
                trades.push(BacktestTrade {
                    symbol,
                    action: "CLOSE".to_string(),
                    date: last_date,
                    price: last_price,
                    quantity: pos.quantity,
                    pnl,
                });
            }
        }

        let benchmark = self.compute_benchmark(price_data, &all_dates);
        let mut metrics = compute_metrics(&equity_curve, &trades);
        metrics.information_ratio = information_ratio(&equity_curve, &benchmark);

        Ok(BacktestReport {
            metrics,
            equity_curve,
            dates: all_dates,
            trades,
            benchmark,
        })
    }

    /// Equal-weight buy-and-hold benchmark over the same date axis
    fn compute_benchmark(
        &self,
        price_data: &HashMap<String, Vec<Bar>>,
        dates: &[NaiveDate],
    ) -> Vec<f64> {
        if price_data.is_empty() || dates.is_empty() {
            return vec![];
        }

        let n_assets = price_data.len();
        let alloc = self.config.initial_capital / n_assets as f64;

        let mut shares: HashMap<&str, f64> = HashMap::new();
        let mut by_date: HashMap<&str, HashMap<NaiveDate, f64>> = HashMap::new();
        for (symbol, bars) in price_data {
            if let Some(first) = bars.first() {
                if first.close > 0.0 {
                    shares.insert(symbol.as_str(), alloc / first.close);
                }
            }
            by_date.insert(
                symbol.as_str(),
                bars.iter().map(|b| (b.date(), b.close)).collect(),
            );
        }

        let mut benchmark: Vec<f64> = Vec::with_capacity(dates.len());
        for date in dates {
            let mut val = 0.0;
            for (symbol, share_count) in &shares {
                if let Some(close) = by_date.get(symbol).and_then(|m| m.get(date)) {
                    val += share_count * close;
                } else if let Some(prev) = benchmark.last() {
                    val += prev / n_assets as f64;
                }
            }
            benchmark.push(if val > 0.0 {
                val
            } else {
                self.config.initial_capital
            });
        }
        benchmark
    }
}

const RISK_FREE_ANNUAL: f64 = 0.04;
const TRADING_DAYS: f64 = 252.0;

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation
fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

/// Linear-interpolation percentile over a sorted copy (numpy-style)
pub(crate) fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = rank - lower as f64;
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

fn daily_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| if w[0] != 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect()
}

/// Compute aggregate performance metrics from an equity curve and the
/// trade log.
pub fn compute_metrics(equity_curve: &[f64], trades: &[BacktestTrade]) -> BacktestMetrics {
    if equity_curve.len() < 2 {
        return BacktestMetrics::default();
    }

    let initial = equity_curve[0];
    let final_value = equity_curve[equity_curve.len() - 1];
    let total_return = final_value / initial - 1.0;

    let years = (equity_curve.len() as f64 / TRADING_DAYS).max(0.01);
    let annual_return = if total_return > -1.0 {
        (1.0 + total_return).powf(1.0 / years) - 1.0
    } else {
        -1.0
    };

    let returns = daily_returns(equity_curve);
    let ret_std = std_dev(&returns);
    let rf_daily = RISK_FREE_ANNUAL / TRADING_DAYS;

    let sharpe = if !returns.is_empty() && ret_std > 0.0 {
        (mean(&returns) - rf_daily) / ret_std * TRADING_DAYS.sqrt()
    } else {
        0.0
    };

    // Sortino: downside deviation only; with no losing days fall back to
    // the Sharpe value
    let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    let downside_std = std_dev(&downside);
    let sortino = if downside_std > 1e-12 {
        (mean(&returns) - rf_daily) / downside_std * TRADING_DAYS.sqrt()
    } else if ret_std > 1e-12 {
        sharpe
    } else {
        0.0
    };

    // Max drawdown from the running peak
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0f64;
    for &v in equity_curve {
        peak = peak.max(v);
        if peak > 0.0 {
            max_dd = max_dd.max((peak - v) / peak);
        }
    }

    let calmar = if max_dd > 1e-6 {
        annual_return / max_dd
    } else {
        0.0
    };

    let (var_95, cvar_95) = if returns.is_empty() {
        (0.0, 0.0)
    } else {
        let var = percentile(&returns, 5.0);
        let tail: Vec<f64> = returns.iter().copied().filter(|r| *r <= var).collect();
        (var, if tail.is_empty() { var } else { mean(&tail) })
    };

    // Win rate and profit factor over closed trades
    let exits: Vec<&BacktestTrade> = trades.iter().filter(|t| t.is_exit()).collect();
    let wins = exits.iter().filter(|t| t.pnl > 0.0).count();
    let win_rate = if exits.is_empty() {
        0.0
    } else {
        wins as f64 / exits.len() as f64
    };

    let gross_profit: f64 = exits.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl).sum();
    let gross_loss: f64 = exits
        .iter()
        .filter(|t| t.pnl < 0.0)
        .map(|t| t.pnl.abs())
        .sum();
    let profit_factor = if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else if gross_profit > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };

    BacktestMetrics {
        total_return,
        annual_return,
        sharpe_ratio: sharpe,
        sortino_ratio: sortino,
        calmar_ratio: calmar,
        max_drawdown: max_dd,
        var_95,
        cvar_95,
        win_rate,
        total_trades: exits.len(),
        profit_factor,
        information_ratio: 0.0,
        initial_value: initial,
        final_value,
    }
}

/// Annualised information ratio of the strategy vs the benchmark
pub fn information_ratio(equity_curve: &[f64], benchmark: &[f64]) -> f64 {
    let n = equity_curve.len().min(benchmark.len());
    if n < 2 {
        return 0.0;
    }
    let strat = daily_returns(&equity_curve[..n]);
    let bench = daily_returns(&benchmark[..n]);
    let excess: Vec<f64> = strat.iter().zip(bench.iter()).map(|(s, b)| s - b).collect();
    let te = std_dev(&excess);
    if te < 1e-12 {
        return 0.0;
    }
    mean(&excess) / te * TRADING_DAYS.sqrt()
}
