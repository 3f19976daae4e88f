//! SQLite binding of the paper-trading storage contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fusion_core::SignalError;
use paper_trader::{PaperPosition, PaperStore, PaperTradeRecord, PositionStatus, TradeAction};
use sqlx::FromRow;

use crate::db::{storage_err, MarketStore};

/// Paper-trading store backed by the shared SQLite database.
#[derive(Clone)]
pub struct SqlitePaperStore {
    store: MarketStore,
}

impl SqlitePaperStore {
    pub fn new(store: MarketStore) -> Self {
        Self { store }
    }
}

#[derive(FromRow)]
struct PositionRow {
    id: i64,
    symbol: String,
    entry_date: String,
    entry_price: f64,
    quantity: f64,
    stop_loss: Option<f64>,
    trailing_stop: Option<f64>,
    highest_price: f64,
    status: String,
    opened_at: String,
    closed_at: Option<String>,
    close_price: Option<f64>,
    realized_pnl: Option<f64>,
}

fn parse_ts(raw: &str) -> DateTime<Utc> {
    raw.parse().unwrap_or_else(|_| Utc::now())
}

impl From<PositionRow> for PaperPosition {
    fn from(row: PositionRow) -> Self {
        PaperPosition {
            id: row.id,
            symbol: row.symbol,
            entry_date: row.entry_date.parse().unwrap_or_else(|_| Utc::now().date_naive()),
            entry_price: row.entry_price,
            quantity: row.quantity,
            stop_loss: row.stop_loss,
            trailing_stop: row.trailing_stop,
            highest_price: row.highest_price,
            status: if row.status == "closed" {
                PositionStatus::Closed
            } else {
                PositionStatus::Open
            },
            opened_at: parse_ts(&row.opened_at),
            closed_at: row.closed_at.as_deref().map(parse_ts),
            close_price: row.close_price,
            realized_pnl: row.realized_pnl,
        }
    }
}

#[derive(FromRow)]
struct TradeRow {
    symbol: String,
    action: String,
    price: f64,
    quantity: f64,
    pnl: f64,
    reason: String,
    executed_at: String,
}

impl From<TradeRow> for PaperTradeRecord {
    fn from(row: TradeRow) -> Self {
        PaperTradeRecord {
            symbol: row.symbol,
            action: match row.action.as_str() {
                "SELL" => TradeAction::Sell,
                "STOP" => TradeAction::Stop,
                _ => TradeAction::Buy,
            },
            price: row.price,
            quantity: row.quantity,
            pnl: row.pnl,
            reason: row.reason,
            executed_at: parse_ts(&row.executed_at),
        }
    }
}

const POSITION_COLUMNS: &str = "id, symbol, entry_date, entry_price, quantity, stop_loss, \
     trailing_stop, highest_price, status, opened_at, closed_at, close_price, realized_pnl";

#[async_trait]
impl PaperStore for SqlitePaperStore {
    async fn open_positions(&self) -> Result<Vec<PaperPosition>, SignalError> {
        let rows: Vec<PositionRow> = sqlx::query_as(&format!(
            "SELECT {POSITION_COLUMNS} FROM paper_positions
             WHERE status = 'open' ORDER BY opened_at DESC"
        ))
        .fetch_all(self.store.pool())
        .await
        .map_err(storage_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn open_position(
        &self,
        symbol: &str,
        entry_price: f64,
        quantity: f64,
        stop_loss: Option<f64>,
        trailing_stop: f64,
    ) -> Result<i64, SignalError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO paper_positions
                (symbol, entry_date, entry_price, quantity, stop_loss,
                 trailing_stop, highest_price, status, opened_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, 'open', ?)
            "#,
        )
        .bind(symbol)
        .bind(now.date_naive().to_string())
        .bind(entry_price)
        .bind(quantity)
        .bind(stop_loss)
        .bind(trailing_stop)
        .bind(entry_price)
        .bind(now.to_rfc3339())
        .execute(self.store.pool())
        .await
        .map_err(storage_err)?;
        Ok(result.last_insert_rowid())
    }

    async fn update_position_stops(
        &self,
        position_id: i64,
        highest_price: f64,
        trailing_stop: f64,
    ) -> Result<(), SignalError> {
        sqlx::query(
            "UPDATE paper_positions SET highest_price = ?, trailing_stop = ? WHERE id = ?",
        )
        .bind(highest_price)
        .bind(trailing_stop)
        .bind(position_id)
        .execute(self.store.pool())
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn close_position(
        &self,
        position_id: i64,
        close_price: f64,
        realized_pnl: f64,
    ) -> Result<(), SignalError> {
        sqlx::query(
            "UPDATE paper_positions
             SET status = 'closed', closed_at = ?, close_price = ?, realized_pnl = ?
             WHERE id = ?",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(close_price)
        .bind(realized_pnl)
        .bind(position_id)
        .execute(self.store.pool())
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn add_trade(&self, trade: &PaperTradeRecord) -> Result<(), SignalError> {
        sqlx::query(
            "INSERT INTO paper_trades (symbol, action, price, quantity, pnl, reason, executed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&trade.symbol)
        .bind(trade.action.as_str())
        .bind(trade.price)
        .bind(trade.quantity)
        .bind(trade.pnl)
        .bind(&trade.reason)
        .bind(trade.executed_at.to_rfc3339())
        .execute(self.store.pool())
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn trades(&self, limit: usize) -> Result<Vec<PaperTradeRecord>, SignalError> {
        let rows: Vec<TradeRow> = sqlx::query_as(
            "SELECT symbol, action, price, quantity, pnl, reason, executed_at
             FROM paper_trades ORDER BY executed_at DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(self.store.pool())
        .await
        .map_err(storage_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn reset(&self) -> Result<(), SignalError> {
        let mut tx = self.store.pool().begin().await.map_err(storage_err)?;
        sqlx::query("DELETE FROM paper_positions")
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        sqlx::query("DELETE FROM paper_trades")
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        tx.commit().await.map_err(storage_err)?;
        Ok(())
    }

    /// Position open plus entry-trade log as one transaction.
    async fn open_position_logged(
        &self,
        symbol: &str,
        entry_price: f64,
        quantity: f64,
        stop_loss: Option<f64>,
        trailing_stop: f64,
        trade: &PaperTradeRecord,
    ) -> Result<i64, SignalError> {
        let now = Utc::now();
        let mut tx = self.store.pool().begin().await.map_err(storage_err)?;

        let existing: Option<(i64,)> = sqlx::query_as(
            "SELECT id FROM paper_positions WHERE symbol = ? AND status = 'open'",
        )
        .bind(symbol)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage_err)?;
        if existing.is_some() {
            return Err(SignalError::InvariantViolation(format!(
                "open position already exists for {symbol}"
            )));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO paper_positions
                (symbol, entry_date, entry_price, quantity, stop_loss,
                 trailing_stop, highest_price, status, opened_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, 'open', ?)
            "#,
        )
        .bind(symbol)
        .bind(now.date_naive().to_string())
        .bind(entry_price)
        .bind(quantity)
        .bind(stop_loss)
        .bind(trailing_stop)
        .bind(entry_price)
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;
        let id = result.last_insert_rowid();

        sqlx::query(
            "INSERT INTO paper_trades (symbol, action, price, quantity, pnl, reason, executed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&trade.symbol)
        .bind(trade.action.as_str())
        .bind(trade.price)
        .bind(trade.quantity)
        .bind(trade.pnl)
        .bind(&trade.reason)
        .bind(trade.executed_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        tx.commit().await.map_err(storage_err)?;
        Ok(id)
    }

    /// Position close plus exit-trade log as one transaction.
    async fn close_position_logged(
        &self,
        position_id: i64,
        close_price: f64,
        realized_pnl: f64,
        trade: &PaperTradeRecord,
    ) -> Result<(), SignalError> {
        let mut tx = self.store.pool().begin().await.map_err(storage_err)?;
        sqlx::query(
            "UPDATE paper_positions
             SET status = 'closed', closed_at = ?, close_price = ?, realized_pnl = ?
             WHERE id = ?",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(close_price)
        .bind(realized_pnl)
        .bind(position_id)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            "INSERT INTO paper_trades (symbol, action, price, quantity, pnl, reason, executed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&trade.symbol)
        .bind(trade.action.as_str())
        .bind(trade.price)
        .bind(trade.quantity)
        .bind(trade.pnl)
        .bind(&trade.reason)
        .bind(trade.executed_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        tx.commit().await.map_err(storage_err)?;
        Ok(())
    }
}
