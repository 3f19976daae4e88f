use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV bar data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// Latest quote for a symbol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub price: f64,
    pub change: f64,
    pub change_pct: f64,
}

/// Asset class of a watchlist symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Stock,
    Crypto,
}

impl AssetClass {
    /// Crypto pairs are written with a slash (e.g. "BTC/USDT")
    pub fn of_symbol(symbol: &str) -> Self {
        if symbol.contains('/') {
            AssetClass::Crypto
        } else {
            AssetClass::Stock
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetClass::Stock => "stock",
            AssetClass::Crypto => "crypto",
        }
    }
}

/// Final trade direction of a fused signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
    Hold,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Buy => "BUY",
            Direction::Sell => "SELL",
            Direction::Hold => "HOLD",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "BUY" => Direction::Buy,
            "SELL" => Direction::Sell,
            _ => Direction::Hold,
        }
    }
}

/// Risk label attached to a fused signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }
}

/// Macro environment regime derived from VIX, yield curve and DXY
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MacroRegime {
    RiskOff,
    Cautious,
    Neutral,
    Constructive,
    RiskOn,
    Unknown,
}

impl MacroRegime {
    pub fn as_str(&self) -> &'static str {
        match self {
            MacroRegime::RiskOff => "RISK_OFF",
            MacroRegime::Cautious => "CAUTIOUS",
            MacroRegime::Neutral => "NEUTRAL",
            MacroRegime::Constructive => "CONSTRUCTIVE",
            MacroRegime::RiskOn => "RISK_ON",
            MacroRegime::Unknown => "UNKNOWN",
        }
    }
}

/// Market breadth regime over the benchmark basket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreadthRegime {
    Healthy,
    Neutral,
    Weak,
    Poor,
}

impl BreadthRegime {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreadthRegime::Healthy => "HEALTHY",
            BreadthRegime::Neutral => "NEUTRAL",
            BreadthRegime::Weak => "WEAK",
            BreadthRegime::Poor => "POOR",
        }
    }
}

/// Cross-asset (inter-market) regime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossAssetRegime {
    RiskOn,
    Neutral,
    RiskOff,
}

impl CrossAssetRegime {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrossAssetRegime::RiskOn => "RISK_ON",
            CrossAssetRegime::Neutral => "NEUTRAL",
            CrossAssetRegime::RiskOff => "RISK_OFF",
        }
    }
}

/// A single factor's contribution: score in [-1, +1], confidence in [0, 1]
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FactorScore {
    pub score: f64,
    pub confidence: f64,
}

impl FactorScore {
    pub fn new(score: f64, confidence: f64) -> Self {
        Self { score, confidence }
    }

    /// Explicit "no view" factor: score 0, confidence 0
    pub fn neutral() -> Self {
        Self { score: 0.0, confidence: 0.0 }
    }
}

/// Macro-economic signal (global, shared across symbols per scan)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroSignal {
    pub score: f64,
    pub confidence: f64,
    pub regime: MacroRegime,
    pub vix_score: f64,
    pub yield_score: f64,
    pub dxy_score: f64,
    pub vix_level: Option<f64>,
    pub yield_spread: Option<f64>,
    pub dxy_change_20d: Option<f64>,
}

/// Market breadth signal over the index basket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreadthSignal {
    pub score: f64,
    pub regime: BreadthRegime,
    pub pct_above_200ma: f64,
    pub ad_ratio: f64,
    pub advance_count: usize,
    pub decline_count: usize,
    pub basket_total: usize,
}

/// Cross-asset regime signal from BTC / DXY / gold / oil / long bonds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntermarketSignal {
    pub score: f64,
    pub confidence: f64,
    pub regime: CrossAssetRegime,
    pub component_scores: Vec<(String, f64)>,
}

/// Contrarian fear & greed signal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FearGreedSignal {
    pub score: f64,
    pub confidence: f64,
    pub index: f64,
    pub label: String,
}

/// Sector rotation modifier for one symbol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorSignal {
    pub score: f64,
    pub regime: String,
    pub sector: Option<String>,
    pub modifier: f64,
}

/// Short-interest squeeze / confirmation signal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortInterestSignal {
    pub score: f64,
    pub confidence: f64,
    pub regime: String,
    pub short_float: Option<f64>,
}

/// Options positioning signal (put/call ratio + IV skew, contrarian)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionsSignal {
    pub score: f64,
    pub confidence: f64,
    pub regime: String,
    pub pcr: Option<f64>,
    pub iv_skew: Option<f64>,
}

/// Aggregated analyst consensus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalystSignal {
    pub score: f64,
    pub rating_label: String,
    pub total_ratings: u32,
    pub target_price: Option<f64>,
    pub target_upside_pct: Option<f64>,
}

/// Earnings proximity filter: multiplies final confidence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarningsFilter {
    pub confidence_multiplier: f64,
    pub days_to_earnings: Option<i64>,
    pub earnings_date: Option<NaiveDate>,
    pub warning: Option<String>,
    pub is_earnings_today: bool,
}

impl EarningsFilter {
    /// No upcoming earnings in the caution window
    pub fn none() -> Self {
        Self {
            confidence_multiplier: 1.0,
            days_to_earnings: None,
            earnings_date: None,
            warning: None,
            is_earnings_today: false,
        }
    }
}

/// Multi-timeframe confluence signal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MtfSignal {
    pub score: f64,
    pub confidence: f64,
    /// Fraction of timeframes agreeing on the dominant direction (0-1)
    pub alignment: f64,
    pub tf_scores: Vec<(String, FactorScore)>,
    pub timeframes_available: Vec<String>,
}

/// Prediction from one ML model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlPrediction {
    pub signal_score: f64,
    pub confidence: f64,
    pub model: String,
}

/// Sentiment model output for one text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentScore {
    pub label: SentimentLabel,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentScore {
    /// Signed sentiment value in [-1, +1]
    pub fn signed_value(&self) -> f64 {
        match self.label {
            SentimentLabel::Positive => self.score,
            SentimentLabel::Negative => -self.score,
            SentimentLabel::Neutral => 0.0,
        }
    }
}

/// News article from an external source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    pub description: Option<String>,
    pub source: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// Social media post treated as opaque text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialPost {
    pub title: String,
    pub text: String,
    pub score: i64,
    pub subreddit: Option<String>,
    pub created: Option<DateTime<Utc>>,
}

/// How a signal was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Scheduled,
    OnDemand,
    Combined,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Scheduled => "scheduled",
            SignalKind::OnDemand => "on_demand",
            SignalKind::Combined => "combined",
        }
    }
}

/// Immutable record of one fusion decision, as persisted.
/// Outcome fields are filled later by the accuracy evaluator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalRecord {
    pub id: Option<i64>,
    pub symbol: String,
    pub kind: SignalKind,
    pub direction: Direction,
    pub strength: f64,
    pub confidence: f64,
    pub technical_score: f64,
    pub sentiment_score: f64,
    pub ml_score: f64,
    pub macro_score: f64,
    pub macro_regime: Option<String>,
    pub created_at: DateTime<Utc>,
    pub outcome_return_5d: Option<f64>,
    pub outcome_return_10d: Option<f64>,
    pub outcome_correct: Option<bool>,
    pub outcome_checked_at: Option<DateTime<Utc>>,
}

/// Raw short-interest observations from the facts vendor
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ShortInterestFacts {
    /// Short float as a fraction (0.25 = 25% of float short)
    pub short_float: f64,
    /// Days to cover
    pub short_ratio: Option<f64>,
}

/// Options chain summary from the facts vendor
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OptionsChainFacts {
    pub put_call_ratio: Option<f64>,
    /// Average put IV / average call IV
    pub iv_skew: Option<f64>,
    pub total_volume: Option<f64>,
}

/// Analyst consensus raw counts from the facts vendor
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AnalystRatingFacts {
    pub strong_buy: u32,
    pub buy: u32,
    pub hold: u32,
    pub sell: u32,
    pub strong_sell: u32,
    pub upgrades_30d: u32,
    pub downgrades_30d: u32,
    pub target_price: Option<f64>,
}

/// Risk alert raised by the risk manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAlert {
    pub alert_type: String,
    pub severity: AlertSeverity,
    pub message: String,
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    High,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "info",
            AlertSeverity::Warning => "warning",
            AlertSeverity::High => "high",
            AlertSeverity::Critical => "critical",
        }
    }
}
