use fusion_core::SignalError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Shared handle over the embedded SQLite database.
#[derive(Clone)]
pub struct MarketStore {
    pool: SqlitePool,
}

pub(crate) fn storage_err(e: sqlx::Error) -> SignalError {
    SignalError::Storage(e.to_string())
}

impl MarketStore {
    /// Open (or create) the database at `url` and ensure the schema.
    /// `sqlite::memory:` works for tests.
    pub async fn connect(url: &str) -> Result<Self, SignalError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(storage_err)?
            .create_if_missing(true);
        // An in-memory database exists per connection, so the pool must
        // not spread it across several
        let max_connections = if url.contains(":memory:") { 1 } else { 8 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(storage_err)?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Idempotent schema creation, run once at startup.
    async fn init_schema(&self) -> Result<(), SignalError> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS signals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                signal_type TEXT NOT NULL,
                direction TEXT NOT NULL,
                strength REAL NOT NULL,
                confidence REAL NOT NULL,
                technical_score REAL NOT NULL DEFAULT 0,
                sentiment_score REAL NOT NULL DEFAULT 0,
                ml_score REAL NOT NULL DEFAULT 0,
                macro_score REAL NOT NULL DEFAULT 0,
                macro_regime TEXT,
                created_at TEXT NOT NULL,
                outcome_return_5d REAL,
                outcome_return_10d REAL,
                outcome_correct INTEGER,
                outcome_checked_at TEXT
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_signals_symbol ON signals(symbol)",
            "CREATE INDEX IF NOT EXISTS idx_signals_unchecked
                ON signals(outcome_checked_at, created_at)",
            r#"
            CREATE TABLE IF NOT EXISTS price_cache (
                symbol TEXT NOT NULL,
                date TEXT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume REAL NOT NULL,
                asset_class TEXT NOT NULL,
                fetched_at TEXT NOT NULL,
                PRIMARY KEY (symbol, date, asset_class)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS news_cache (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                source TEXT NOT NULL,
                url TEXT NOT NULL,
                published_at TEXT,
                fetched_at TEXT NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_news_symbol ON news_cache(symbol, fetched_at)",
            r#"
            CREATE TABLE IF NOT EXISTS sentiment_scores (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                source TEXT NOT NULL,
                score REAL NOT NULL,
                label TEXT NOT NULL,
                computed_at TEXT NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_sentiment_symbol
                ON sentiment_scores(symbol, computed_at)",
            r#"
            CREATE TABLE IF NOT EXISTS ml_predictions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                model TEXT NOT NULL,
                signal_score REAL NOT NULL,
                confidence REAL NOT NULL,
                computed_at TEXT NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_ml_symbol ON ml_predictions(symbol, computed_at)",
            r#"
            CREATE TABLE IF NOT EXISTS holdings (
                symbol TEXT PRIMARY KEY,
                asset_class TEXT NOT NULL,
                quantity REAL NOT NULL,
                avg_cost REAL NOT NULL,
                entry_date TEXT,
                sector TEXT,
                stop_loss REAL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                action TEXT NOT NULL,
                quantity REAL NOT NULL,
                price REAL NOT NULL,
                note TEXT NOT NULL DEFAULT '',
                executed_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS paper_positions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                entry_date TEXT NOT NULL,
                entry_price REAL NOT NULL,
                quantity REAL NOT NULL,
                stop_loss REAL,
                trailing_stop REAL,
                highest_price REAL NOT NULL,
                status TEXT NOT NULL DEFAULT 'open',
                opened_at TEXT NOT NULL,
                closed_at TEXT,
                close_price REAL,
                realized_pnl REAL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_paper_positions_status
                ON paper_positions(status, symbol)",
            r#"
            CREATE TABLE IF NOT EXISTS paper_trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                action TEXT NOT NULL,
                price REAL NOT NULL,
                quantity REAL NOT NULL,
                pnl REAL NOT NULL DEFAULT 0,
                reason TEXT NOT NULL DEFAULT '',
                executed_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS backtest_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                config TEXT NOT NULL,
                total_return REAL NOT NULL,
                annual_return REAL NOT NULL,
                sharpe_ratio REAL NOT NULL,
                sortino_ratio REAL,
                calmar_ratio REAL,
                max_drawdown REAL NOT NULL,
                var_95 REAL,
                cvar_95 REAL,
                win_rate REAL NOT NULL,
                total_trades INTEGER NOT NULL,
                equity_curve TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS risk_alerts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                alert_type TEXT NOT NULL,
                severity TEXT NOT NULL,
                message TEXT NOT NULL,
                symbol TEXT,
                created_at TEXT NOT NULL,
                acknowledged INTEGER NOT NULL DEFAULT 0
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
        ];

        for stmt in statements {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(storage_err)?;
        }
        Ok(())
    }
}
