use fusion_core::{Direction, RiskAlert};
use serde::{Deserialize, Serialize};

/// Result of the position-limit check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionLimitCheck {
    pub allowed: bool,
    pub violations: Vec<String>,
    pub warnings: Vec<String>,
}

/// Candidate stop levels; `recommended` is the tightest (highest) one
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StopLossLevels {
    pub atr_stop: Option<f64>,
    pub pct_stop: f64,
    pub trailing_stop: f64,
    pub recommended: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrawdownStatus {
    Ok,
    Warning,
    Halt,
    Critical,
}

impl DrawdownStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DrawdownStatus::Ok => "OK",
            DrawdownStatus::Warning => "WARNING",
            DrawdownStatus::Halt => "HALT",
            DrawdownStatus::Critical => "CRITICAL",
        }
    }
}

/// Drawdown analysis over the equity curve. The alert, when present, is
/// persisted by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawdownCheck {
    pub current_drawdown: f64,
    pub max_drawdown: f64,
    pub status: DrawdownStatus,
    pub actions: Vec<String>,
    pub alert: Option<RiskAlert>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashReserveCheck {
    pub cash: f64,
    pub cash_pct: f64,
    pub min_required: f64,
    pub ok: bool,
    pub message: Option<String>,
}

/// Concrete trade specification produced from a directional signal after
/// the drawdown and cash-reserve gates have been applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionPlan {
    pub action: Direction,
    pub shares: f64,
    pub entry_price: f64,
    pub position_value: f64,
    pub position_pct: f64,
    pub stop_loss: f64,
    pub stop_loss_pct: f64,
    pub total_risk: f64,
    pub risk_pct: f64,
    pub target_price: Option<f64>,
    pub risk_reward: String,
    pub warnings: Vec<String>,
    pub blocked: bool,
    pub blocked_reason: Option<String>,
}

impl ActionPlan {
    /// Empty plan for HOLD signals and blocked trades
    pub fn empty(action: Direction, entry_price: f64) -> Self {
        Self {
            action,
            shares: 0.0,
            entry_price,
            position_value: 0.0,
            position_pct: 0.0,
            stop_loss: 0.0,
            stop_loss_pct: 0.0,
            total_risk: 0.0,
            risk_pct: 0.0,
            target_price: None,
            risk_reward: "N/A".to_string(),
            warnings: Vec::new(),
            blocked: false,
            blocked_reason: None,
        }
    }
}
