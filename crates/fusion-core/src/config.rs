use serde::{Deserialize, Serialize};

/// Factor weights used by the fusion engine. Must sum to 1.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FactorWeights {
    pub technical: f64,
    pub sentiment: f64,
    pub ml: f64,
    #[serde(rename = "macro")]
    pub macro_: f64,
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            technical: 0.30,
            sentiment: 0.20,
            ml: 0.35,
            macro_: 0.15,
        }
    }
}

impl FactorWeights {
    pub fn sum(&self) -> f64 {
        self.technical + self.sentiment + self.ml + self.macro_
    }

    /// Rescale so the four weights sum to 1
    pub fn normalized(&self) -> Self {
        let total = self.sum();
        if total <= 0.0 {
            return Self::default();
        }
        Self {
            technical: self.technical / total,
            sentiment: self.sentiment / total,
            ml: self.ml / total,
            macro_: self.macro_ / total,
        }
    }
}

/// Base signal thresholds before regime adjustment
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BaseThresholds {
    pub buy_threshold: f64,
    pub buy_confidence_min: f64,
    pub sell_threshold: f64,
    pub sell_confidence_min: f64,
}

impl Default for BaseThresholds {
    fn default() -> Self {
        Self {
            buy_threshold: 0.30,
            buy_confidence_min: 0.65,
            sell_threshold: -0.20,
            sell_confidence_min: 0.50,
        }
    }
}

/// Portfolio-level risk limits
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Max fraction of the portfolio in a single position
    pub max_single_position: f64,
    /// Max fraction of the portfolio in crypto overall
    pub max_crypto_allocation: f64,
    /// Max fraction of the portfolio risked per trade
    pub max_trade_risk: f64,
    /// Minimum cash reserve as a fraction of the portfolio
    pub min_cash_reserve: f64,
    pub drawdown_warning: f64,
    pub drawdown_halt: f64,
    pub drawdown_reduce: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_single_position: 0.15,
            max_crypto_allocation: 0.30,
            max_trade_risk: 0.01,
            min_cash_reserve: 0.10,
            drawdown_warning: 0.08,
            drawdown_halt: 0.12,
            drawdown_reduce: 0.15,
        }
    }
}

/// Stop-loss parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StopLossConfig {
    /// ATR-based stop: entry - multiplier * ATR
    pub atr_multiplier: f64,
    /// Fixed percentage stop below entry
    pub percentage: f64,
    /// Trailing stop distance from the highest price seen
    pub trailing: f64,
}

impl Default for StopLossConfig {
    fn default() -> Self {
        Self {
            atr_multiplier: 2.0,
            percentage: 0.05,
            trailing: 0.07,
        }
    }
}

/// ML model parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlParams {
    pub retrain_interval_days: i64,
    pub forward_days: i64,
    pub lstm_window: usize,
    pub xgboost_weight: f64,
    pub lstm_weight: f64,
}

impl Default for MlParams {
    fn default() -> Self {
        Self {
            retrain_interval_days: 60,
            forward_days: 5,
            lstm_window: 60,
            xgboost_weight: 0.25,
            lstm_weight: 0.25,
        }
    }
}

/// Cache TTLs per data class, in minutes
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CacheTtl {
    pub price_minutes: i64,
    pub news_minutes: i64,
    pub sentiment_minutes: i64,
    pub ml_prediction_minutes: i64,
    pub global_signal_minutes: i64,
    pub analyst_minutes: i64,
    pub earnings_minutes: i64,
    pub options_minutes: i64,
    pub short_interest_minutes: i64,
    pub sector_minutes: i64,
    pub adaptive_weights_minutes: i64,
}

impl Default for CacheTtl {
    fn default() -> Self {
        Self {
            price_minutes: 15,
            news_minutes: 30,
            sentiment_minutes: 60,
            ml_prediction_minutes: 120,
            global_signal_minutes: 4 * 60,
            analyst_minutes: 24 * 60,
            earnings_minutes: 12 * 60,
            options_minutes: 2 * 60,
            short_interest_minutes: 24 * 60,
            sector_minutes: 4 * 60,
            adaptive_weights_minutes: 60,
        }
    }
}

pub const DEFAULT_WATCHLIST_STOCKS: &[&str] = &[
    "AAPL", "MSFT", "GOOGL", "AMZN", "NVDA", "META", "TSLA", "SPY", "QQQ",
];

pub const DEFAULT_WATCHLIST_CRYPTO: &[&str] =
    &["BTC/USDT", "ETH/USDT", "SOL/USDT", "ADA/USDT"];
