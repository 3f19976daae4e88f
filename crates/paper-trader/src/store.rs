//! Storage contract for the paper-trading engine.
//!
//! The engine is dependency-injected over this trait: production binds
//! the SQLite store, tests run against the in-memory implementation.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use fusion_core::SignalError;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeAction {
    Buy,
    Sell,
    Stop,
}

impl TradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Buy => "BUY",
            TradeAction::Sell => "SELL",
            TradeAction::Stop => "STOP",
        }
    }
}

/// State of one virtual trade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperPosition {
    pub id: i64,
    pub symbol: String,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub quantity: f64,
    pub stop_loss: Option<f64>,
    pub trailing_stop: Option<f64>,
    /// Running max of every tick observed since the position opened
    pub highest_price: f64,
    pub status: PositionStatus,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub close_price: Option<f64>,
    pub realized_pnl: Option<f64>,
}

/// One row of the append-only paper execution log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperTradeRecord {
    pub symbol: String,
    pub action: TradeAction,
    pub price: f64,
    pub quantity: f64,
    pub pnl: f64,
    pub reason: String,
    pub executed_at: DateTime<Utc>,
}

/// Persistence operations required by the paper trader. The open and
/// close paths must be atomic: a failed BUY leaves no position and no
/// trade row behind.
#[async_trait]
pub trait PaperStore: Send + Sync {
    async fn open_positions(&self) -> Result<Vec<PaperPosition>, SignalError>;

    async fn open_position(
        &self,
        symbol: &str,
        entry_price: f64,
        quantity: f64,
        stop_loss: Option<f64>,
        trailing_stop: f64,
    ) -> Result<i64, SignalError>;

    async fn update_position_stops(
        &self,
        position_id: i64,
        highest_price: f64,
        trailing_stop: f64,
    ) -> Result<(), SignalError>;

    async fn close_position(
        &self,
        position_id: i64,
        close_price: f64,
        realized_pnl: f64,
    ) -> Result<(), SignalError>;

    async fn add_trade(&self, trade: &PaperTradeRecord) -> Result<(), SignalError>;

    async fn trades(&self, limit: usize) -> Result<Vec<PaperTradeRecord>, SignalError>;

    async fn reset(&self) -> Result<(), SignalError>;

    /// Open a position and log its entry trade. Transactional stores
    /// override this so a failure leaves neither row behind.
    async fn open_position_logged(
        &self,
        symbol: &str,
        entry_price: f64,
        quantity: f64,
        stop_loss: Option<f64>,
        trailing_stop: f64,
        trade: &PaperTradeRecord,
    ) -> Result<i64, SignalError> {
        let id = self
            .open_position(symbol, entry_price, quantity, stop_loss, trailing_stop)
            .await?;
        self.add_trade(trade).await?;
        Ok(id)
    }

    /// Close a position and log its exit trade in one step.
    async fn close_position_logged(
        &self,
        position_id: i64,
        close_price: f64,
        realized_pnl: f64,
        trade: &PaperTradeRecord,
    ) -> Result<(), SignalError> {
        self.close_position(position_id, close_price, realized_pnl)
            .await?;
        self.add_trade(trade).await
    }
}

/// In-memory store for tests and dry runs
#[derive(Default)]
pub struct MemoryPaperStore {
    inner: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    positions: Vec<PaperPosition>,
    trades: Vec<PaperTradeRecord>,
}

impl MemoryPaperStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test helper: all positions regardless of status
    pub fn all_positions(&self) -> Vec<PaperPosition> {
        self.inner.lock().unwrap().positions.clone()
    }
}

#[async_trait]
impl PaperStore for MemoryPaperStore {
    async fn open_positions(&self) -> Result<Vec<PaperPosition>, SignalError> {
        let state = self.inner.lock().unwrap();
        Ok(state
            .positions
            .iter()
            .filter(|p| p.status == PositionStatus::Open)
            .cloned()
            .collect())
    }

    async fn open_position(
        &self,
        symbol: &str,
        entry_price: f64,
        quantity: f64,
        stop_loss: Option<f64>,
        trailing_stop: f64,
    ) -> Result<i64, SignalError> {
        let mut state = self.inner.lock().unwrap();
        if state
            .positions
            .iter()
            .any(|p| p.symbol == symbol && p.status == PositionStatus::Open)
        {
            return Err(SignalError::InvariantViolation(format!(
                "open position already exists for {symbol}"
            )));
        }
        state.next_id += 1;
        let id = state.next_id;
        let now = Utc::now();
        state.positions.push(PaperPosition {
            id,
            symbol: symbol.to_string(),
            entry_date: now.date_naive(),
            entry_price,
            quantity,
            stop_loss,
            trailing_stop: Some(trailing_stop),
            highest_price: entry_price,
            status: PositionStatus::Open,
            opened_at: now,
            closed_at: None,
            close_price: None,
            realized_pnl: None,
        });
        Ok(id)
    }

    async fn update_position_stops(
        &self,
        position_id: i64,
        highest_price: f64,
        trailing_stop: f64,
    ) -> Result<(), SignalError> {
        let mut state = self.inner.lock().unwrap();
        let pos = state
            .positions
            .iter_mut()
            .find(|p| p.id == position_id)
            .ok_or_else(|| {
                SignalError::InvariantViolation(format!("unknown position id {position_id}"))
            })?;
        pos.highest_price = highest_price;
        pos.trailing_stop = Some(trailing_stop);
        Ok(())
    }

    async fn close_position(
        &self,
        position_id: i64,
        close_price: f64,
        realized_pnl: f64,
    ) -> Result<(), SignalError> {
        let mut state = self.inner.lock().unwrap();
        let pos = state
            .positions
            .iter_mut()
            .find(|p| p.id == position_id)
            .ok_or_else(|| {
                SignalError::InvariantViolation(format!("unknown position id {position_id}"))
            })?;
        pos.status = PositionStatus::Closed;
        pos.closed_at = Some(Utc::now());
        pos.close_price = Some(close_price);
        pos.realized_pnl = Some(realized_pnl);
        Ok(())
    }

    async fn add_trade(&self, trade: &PaperTradeRecord) -> Result<(), SignalError> {
        self.inner.lock().unwrap().trades.push(trade.clone());
        Ok(())
    }

    async fn trades(&self, limit: usize) -> Result<Vec<PaperTradeRecord>, SignalError> {
        let state = self.inner.lock().unwrap();
        let mut trades: Vec<PaperTradeRecord> = state.trades.clone();
        trades.reverse();
        trades.truncate(limit);
        Ok(trades)
    }

    async fn reset(&self) -> Result<(), SignalError> {
        let mut state = self.inner.lock().unwrap();
        state.positions.clear();
        state.trades.clear();
        Ok(())
    }
}
