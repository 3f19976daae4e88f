//! Signal persistence and outcome write-back.

use chrono::{DateTime, Duration, Utc};
use fusion_core::{Direction, SignalError, SignalKind, SignalRecord};
use sqlx::FromRow;

use crate::db::{storage_err, MarketStore};

#[derive(FromRow)]
struct SignalRow {
    id: i64,
    symbol: String,
    signal_type: String,
    direction: String,
    strength: f64,
    confidence: f64,
    technical_score: f64,
    sentiment_score: f64,
    ml_score: f64,
    macro_score: f64,
    macro_regime: Option<String>,
    created_at: String,
    outcome_return_5d: Option<f64>,
    outcome_return_10d: Option<f64>,
    outcome_correct: Option<i64>,
    outcome_checked_at: Option<String>,
}

fn parse_ts(raw: &str) -> DateTime<Utc> {
    raw.parse().unwrap_or_else(|_| Utc::now())
}

impl From<SignalRow> for SignalRecord {
    fn from(row: SignalRow) -> Self {
        SignalRecord {
            id: Some(row.id),
            symbol: row.symbol,
            kind: match row.signal_type.as_str() {
                "on_demand" => SignalKind::OnDemand,
                "combined" => SignalKind::Combined,
                _ => SignalKind::Scheduled,
            },
            direction: Direction::from_str(&row.direction),
            strength: row.strength,
            confidence: row.confidence,
            technical_score: row.technical_score,
            sentiment_score: row.sentiment_score,
            ml_score: row.ml_score,
            macro_score: row.macro_score,
            macro_regime: row.macro_regime,
            created_at: parse_ts(&row.created_at),
            outcome_return_5d: row.outcome_return_5d,
            outcome_return_10d: row.outcome_return_10d,
            outcome_correct: row.outcome_correct.map(|v| v != 0),
            outcome_checked_at: row.outcome_checked_at.as_deref().map(parse_ts),
        }
    }
}

/// Outcome fields written back after evaluation
#[derive(Debug, Clone, Copy)]
pub struct SignalOutcome {
    pub return_5d: Option<f64>,
    pub return_10d: Option<f64>,
    pub correct: Option<bool>,
}

const SELECT_COLUMNS: &str = "id, symbol, signal_type, direction, strength, confidence, \
     technical_score, sentiment_score, ml_score, macro_score, macro_regime, \
     created_at, outcome_return_5d, outcome_return_10d, outcome_correct, outcome_checked_at";

impl MarketStore {
    /// Persist a freshly fused signal; outcome fields start empty.
    pub async fn save_signal(&self, record: &SignalRecord) -> Result<i64, SignalError> {
        let result = sqlx::query(
            r#"
            INSERT INTO signals (symbol, signal_type, direction, strength, confidence,
                technical_score, sentiment_score, ml_score, macro_score, macro_regime,
                created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.symbol)
        .bind(record.kind.as_str())
        .bind(record.direction.as_str())
        .bind(record.strength)
        .bind(record.confidence)
        .bind(record.technical_score)
        .bind(record.sentiment_score)
        .bind(record.ml_score)
        .bind(record.macro_score)
        .bind(&record.macro_regime)
        .bind(record.created_at.to_rfc3339())
        .execute(self.pool())
        .await
        .map_err(storage_err)?;

        Ok(result.last_insert_rowid())
    }

    pub async fn latest_signals(&self, limit: i64) -> Result<Vec<SignalRecord>, SignalError> {
        let rows: Vec<SignalRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM signals ORDER BY created_at DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(storage_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn signal_history(
        &self,
        symbol: &str,
        days: i64,
    ) -> Result<Vec<SignalRecord>, SignalError> {
        let cutoff = (Utc::now() - Duration::days(days)).to_rfc3339();
        let rows: Vec<SignalRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM signals
             WHERE symbol = ? AND created_at >= ?
             ORDER BY created_at"
        ))
        .bind(symbol)
        .bind(cutoff)
        .fetch_all(self.pool())
        .await
        .map_err(storage_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Signals old enough to judge and not yet evaluated, oldest first.
    pub async fn unchecked_signals(
        &self,
        min_age_days: i64,
        limit: i64,
    ) -> Result<Vec<SignalRecord>, SignalError> {
        let cutoff = (Utc::now() - Duration::days(min_age_days)).to_rfc3339();
        let rows: Vec<SignalRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM signals
             WHERE outcome_checked_at IS NULL AND created_at <= ?
             ORDER BY created_at
             LIMIT ?"
        ))
        .bind(cutoff)
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(storage_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Write all outcome fields plus the checked-at stamp in one
    /// transaction.
    pub async fn update_signal_outcome(
        &self,
        signal_id: i64,
        outcome: &SignalOutcome,
    ) -> Result<(), SignalError> {
        let mut tx = self.pool().begin().await.map_err(storage_err)?;
        sqlx::query(
            r#"
            UPDATE signals SET
                outcome_return_5d = ?,
                outcome_return_10d = ?,
                outcome_correct = ?,
                outcome_checked_at = ?
            WHERE id = ?
            "#,
        )
        .bind(outcome.return_5d)
        .bind(outcome.return_10d)
        .bind(outcome.correct.map(|c| c as i64))
        .bind(Utc::now().to_rfc3339())
        .bind(signal_id)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;
        tx.commit().await.map_err(storage_err)?;
        Ok(())
    }

    /// Every signal with a recorded outcome, for accuracy statistics.
    pub async fn evaluated_signals(&self) -> Result<Vec<SignalRecord>, SignalError> {
        let rows: Vec<SignalRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM signals
             WHERE outcome_correct IS NOT NULL
             ORDER BY created_at"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(storage_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Evaluated, non-HOLD signals for the adaptive-weight learner.
    pub async fn evaluated_directional_signals(
        &self,
    ) -> Result<Vec<SignalRecord>, SignalError> {
        let rows: Vec<SignalRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM signals
             WHERE outcome_correct IS NOT NULL AND direction IN ('BUY', 'SELL')
             ORDER BY created_at"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(storage_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
