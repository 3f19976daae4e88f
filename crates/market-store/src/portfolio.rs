//! Holdings, transaction log, risk alerts, and backtest results.

use chrono::Utc;
use fusion_core::{AssetClass, RiskAlert, SignalError};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::db::{storage_err, MarketStore};

/// A portfolio position, keyed uniquely by symbol
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Holding {
    pub symbol: String,
    pub asset_class: String,
    pub quantity: f64,
    pub avg_cost: f64,
    pub entry_date: Option<String>,
    pub sector: Option<String>,
    pub stop_loss: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TransactionRecord {
    pub id: i64,
    pub symbol: String,
    pub action: String,
    pub quantity: f64,
    pub price: f64,
    pub note: String,
    pub executed_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RiskAlertRecord {
    pub id: i64,
    pub alert_type: String,
    pub severity: String,
    pub message: String,
    pub symbol: Option<String>,
    pub created_at: String,
    pub acknowledged: i64,
}

/// Persisted summary of one backtest run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResultRecord {
    pub name: String,
    pub config: serde_json::Value,
    pub total_return: f64,
    pub annual_return: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: Option<f64>,
    pub calmar_ratio: Option<f64>,
    pub max_drawdown: f64,
    pub var_95: Option<f64>,
    pub cvar_95: Option<f64>,
    pub win_rate: f64,
    pub total_trades: i64,
    pub equity_curve: Vec<f64>,
}

impl MarketStore {
    pub async fn holdings(&self) -> Result<Vec<Holding>, SignalError> {
        sqlx::query_as(
            "SELECT symbol, asset_class, quantity, avg_cost, entry_date, sector, stop_loss
             FROM holdings ORDER BY symbol",
        )
        .fetch_all(self.pool())
        .await
        .map_err(storage_err)
    }

    pub async fn upsert_holding(
        &self,
        symbol: &str,
        asset_class: AssetClass,
        quantity: f64,
        avg_cost: f64,
        sector: Option<&str>,
    ) -> Result<(), SignalError> {
        if quantity < 0.0 {
            return Err(SignalError::BadInput(format!(
                "negative quantity {quantity} for {symbol}"
            )));
        }
        sqlx::query(
            r#"
            INSERT INTO holdings (symbol, asset_class, quantity, avg_cost, entry_date, sector)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(symbol) DO UPDATE SET
                quantity = excluded.quantity,
                avg_cost = excluded.avg_cost,
                sector = excluded.sector
            "#,
        )
        .bind(symbol)
        .bind(asset_class.as_str())
        .bind(quantity)
        .bind(avg_cost)
        .bind(Utc::now().to_rfc3339())
        .bind(sector)
        .execute(self.pool())
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    pub async fn remove_holding(&self, symbol: &str) -> Result<(), SignalError> {
        sqlx::query("DELETE FROM holdings WHERE symbol = ?")
            .bind(symbol)
            .execute(self.pool())
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    pub async fn add_transaction(
        &self,
        symbol: &str,
        action: &str,
        quantity: f64,
        price: f64,
        note: &str,
    ) -> Result<(), SignalError> {
        sqlx::query(
            "INSERT INTO transactions (symbol, action, quantity, price, note, executed_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(symbol)
        .bind(action)
        .bind(quantity)
        .bind(price)
        .bind(note)
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool())
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    pub async fn transactions(&self, limit: i64) -> Result<Vec<TransactionRecord>, SignalError> {
        sqlx::query_as(
            "SELECT id, symbol, action, quantity, price, note, executed_at
             FROM transactions ORDER BY executed_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(storage_err)
    }

    pub async fn add_risk_alert(&self, alert: &RiskAlert) -> Result<(), SignalError> {
        sqlx::query(
            "INSERT INTO risk_alerts (alert_type, severity, message, symbol, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&alert.alert_type)
        .bind(alert.severity.as_str())
        .bind(&alert.message)
        .bind(&alert.symbol)
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool())
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    pub async fn risk_alerts(
        &self,
        limit: i64,
        unacknowledged_only: bool,
    ) -> Result<Vec<RiskAlertRecord>, SignalError> {
        let query = if unacknowledged_only {
            "SELECT id, alert_type, severity, message, symbol, created_at, acknowledged
             FROM risk_alerts WHERE acknowledged = 0
             ORDER BY created_at DESC LIMIT ?"
        } else {
            "SELECT id, alert_type, severity, message, symbol, created_at, acknowledged
             FROM risk_alerts ORDER BY created_at DESC LIMIT ?"
        };
        sqlx::query_as(query)
            .bind(limit)
            .fetch_all(self.pool())
            .await
            .map_err(storage_err)
    }

    pub async fn acknowledge_alert(&self, id: i64) -> Result<(), SignalError> {
        sqlx::query("UPDATE risk_alerts SET acknowledged = 1 WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    pub async fn save_backtest_result(
        &self,
        record: &BacktestResultRecord,
    ) -> Result<(), SignalError> {
        sqlx::query(
            r#"
            INSERT INTO backtest_results
                (name, config, total_return, annual_return, sharpe_ratio, sortino_ratio,
                 calmar_ratio, max_drawdown, var_95, cvar_95, win_rate, total_trades,
                 equity_curve, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.name)
        .bind(record.config.to_string())
        .bind(record.total_return)
        .bind(record.annual_return)
        .bind(record.sharpe_ratio)
        .bind(record.sortino_ratio)
        .bind(record.calmar_ratio)
        .bind(record.max_drawdown)
        .bind(record.var_95)
        .bind(record.cvar_95)
        .bind(record.win_rate)
        .bind(record.total_trades)
        .bind(serde_json::to_string(&record.equity_curve).unwrap_or_default())
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool())
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    pub async fn backtest_results(
        &self,
        limit: i64,
    ) -> Result<Vec<BacktestResultRecord>, SignalError> {
        #[derive(FromRow)]
        struct Row {
            name: String,
            config: String,
            total_return: f64,
            annual_return: f64,
            sharpe_ratio: f64,
            sortino_ratio: Option<f64>,
            calmar_ratio: Option<f64>,
            max_drawdown: f64,
            var_95: Option<f64>,
            cvar_95: Option<f64>,
            win_rate: f64,
            total_trades: i64,
            equity_curve: String,
        }

        let rows: Vec<Row> = sqlx::query_as(
            "SELECT name, config, total_return, annual_return, sharpe_ratio, sortino_ratio,
                    calmar_ratio, max_drawdown, var_95, cvar_95, win_rate, total_trades,
                    equity_curve
             FROM backtest_results ORDER BY created_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(storage_err)?;

        Ok(rows
            .into_iter()
            .map(|r| BacktestResultRecord {
                name: r.name,
                config: serde_json::from_str(&r.config).unwrap_or(serde_json::Value::Null),
                total_return: r.total_return,
                annual_return: r.annual_return,
                sharpe_ratio: r.sharpe_ratio,
                sortino_ratio: r.sortino_ratio,
                calmar_ratio: r.calmar_ratio,
                max_drawdown: r.max_drawdown,
                var_95: r.var_95,
                cvar_95: r.cvar_95,
                win_rate: r.win_rate,
                total_trades: r.total_trades,
                equity_curve: serde_json::from_str(&r.equity_curve).unwrap_or_default(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fusion_core::AlertSeverity;

    #[tokio::test]
    async fn holding_upsert_replaces() {
        let store = MarketStore::connect("sqlite::memory:").await.unwrap();
        store
            .upsert_holding("AAPL", AssetClass::Stock, 10.0, 150.0, Some("Technology"))
            .await
            .unwrap();
        store
            .upsert_holding("AAPL", AssetClass::Stock, 15.0, 155.0, Some("Technology"))
            .await
            .unwrap();

        let holdings = store.holdings().await.unwrap();
        assert_eq!(holdings.len(), 1);
        assert!((holdings[0].quantity - 15.0).abs() < 1e-9);

        store.remove_holding("AAPL").await.unwrap();
        assert!(store.holdings().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn negative_quantity_rejected() {
        let store = MarketStore::connect("sqlite::memory:").await.unwrap();
        let result = store
            .upsert_holding("AAPL", AssetClass::Stock, -1.0, 150.0, None)
            .await;
        assert!(matches!(result, Err(SignalError::BadInput(_))));
    }

    #[tokio::test]
    async fn alerts_filter_unacknowledged() {
        let store = MarketStore::connect("sqlite::memory:").await.unwrap();
        store
            .add_risk_alert(&RiskAlert {
                alert_type: "drawdown".to_string(),
                severity: AlertSeverity::High,
                message: "Drawdown 13%".to_string(),
                symbol: None,
            })
            .await
            .unwrap();

        let alerts = store.risk_alerts(10, true).await.unwrap();
        assert_eq!(alerts.len(), 1);
        store.acknowledge_alert(alerts[0].id).await.unwrap();
        assert!(store.risk_alerts(10, true).await.unwrap().is_empty());
        assert_eq!(store.risk_alerts(10, false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn backtest_result_round_trip() {
        let store = MarketStore::connect("sqlite::memory:").await.unwrap();
        store
            .save_backtest_result(&BacktestResultRecord {
                name: "tech-daily".to_string(),
                config: serde_json::json!({"position_size_pct": 0.1}),
                total_return: 0.23,
                annual_return: 0.18,
                sharpe_ratio: 1.4,
                sortino_ratio: Some(1.9),
                calmar_ratio: Some(1.1),
                max_drawdown: 0.16,
                var_95: Some(-0.018),
                cvar_95: Some(-0.025),
                win_rate: 0.58,
                total_trades: 42,
                equity_curve: vec![100_000.0, 101_000.0, 123_000.0],
            })
            .await
            .unwrap();

        let results = store.backtest_results(5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].equity_curve.len(), 3);
        assert!((results[0].sharpe_ratio - 1.4).abs() < 1e-9);
    }
}
