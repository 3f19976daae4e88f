use chrono::NaiveDate;
use fusion_core::{BaseThresholds, RiskLimits, StopLossConfig};
use serde::{Deserialize, Serialize};

/// Backtest run parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    /// Fraction of portfolio value allocated per new position
    pub position_size_pct: f64,
    /// Per-side commission rate
    pub commission: f64,
    /// Bars of history required before a symbol may generate signals
    pub min_history_bars: usize,
    pub thresholds: BaseThresholds,
    pub limits: RiskLimits,
    pub stops: StopLossConfig,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: 100_000.0,
            position_size_pct: 0.10,
            commission: 0.001,
            min_history_bars: 200,
            thresholds: BaseThresholds::default(),
            limits: RiskLimits::default(),
            stops: StopLossConfig::default(),
        }
    }
}

/// One fill in the backtest trade log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestTrade {
    pub symbol: String,
    pub action: String,
    pub date: NaiveDate,
    pub price: f64,
    pub quantity: f64,
    pub pnl: f64,
}

impl BacktestTrade {
    /// Entries carry no P&L; everything else is a close of some kind
    pub fn is_exit(&self) -> bool {
        self.action != "BUY"
    }
}

/// Aggregate performance metrics over one run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BacktestMetrics {
    pub total_return: f64,
    pub annual_return: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub max_drawdown: f64,
    pub var_95: f64,
    pub cvar_95: f64,
    pub win_rate: f64,
    pub total_trades: usize,
    pub profit_factor: f64,
    pub information_ratio: f64,
    pub initial_value: f64,
    pub final_value: f64,
}

/// Full result of one backtest run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    pub metrics: BacktestMetrics,
    pub equity_curve: Vec<f64>,
    pub dates: Vec<NaiveDate>,
    pub trades: Vec<BacktestTrade>,
    /// Equal-weight buy-and-hold benchmark over the same dates
    pub benchmark: Vec<f64>,
}
