//! SQLite-backed caches with per-class TTLs.
//!
//! Price rows are keyed by (symbol, date, asset_class) so overlapping
//! date ranges deduplicate on insert; freshness for every class is
//! judged from the newest row's fetch stamp.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use fusion_core::{AssetClass, Bar, NewsArticle, SignalError};
use sqlx::FromRow;

use crate::db::{storage_err, MarketStore};

fn is_stale(fetched_at: &str, ttl_minutes: i64) -> bool {
    match fetched_at.parse::<DateTime<Utc>>() {
        Ok(ts) => Utc::now() - ts > Duration::minutes(ttl_minutes),
        Err(_) => {
            tracing::warn!("unparseable cache timestamp '{}', treating as stale", fetched_at);
            true
        }
    }
}

#[derive(FromRow)]
struct PriceRow {
    date: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

#[derive(FromRow)]
struct NewsRow {
    title: String,
    description: Option<String>,
    source: String,
    url: String,
    published_at: Option<String>,
}

/// A cached sentiment observation
#[derive(Debug, Clone, FromRow)]
pub struct CachedSentiment {
    pub source: String,
    pub score: f64,
    pub label: String,
}

/// A cached ML prediction
#[derive(Debug, Clone, FromRow)]
pub struct CachedPrediction {
    pub model: String,
    pub signal_score: f64,
    pub confidence: f64,
}

impl MarketStore {
    /// Upsert OHLCV rows; overlapping dates are replaced, not duplicated.
    pub async fn cache_price_data(
        &self,
        symbol: &str,
        asset_class: AssetClass,
        bars: &[Bar],
    ) -> Result<(), SignalError> {
        if bars.is_empty() {
            return Ok(());
        }
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool().begin().await.map_err(storage_err)?;
        for bar in bars {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO price_cache
                    (symbol, date, open, high, low, close, volume, asset_class, fetched_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(symbol)
            .bind(bar.date().to_string())
            .bind(bar.open)
            .bind(bar.high)
            .bind(bar.low)
            .bind(bar.close)
            .bind(bar.volume)
            .bind(asset_class.as_str())
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        }
        tx.commit().await.map_err(storage_err)?;
        Ok(())
    }

    /// Return cached bars if the newest row is still fresh; None forces
    /// a refetch.
    pub async fn cached_price_data(
        &self,
        symbol: &str,
        asset_class: AssetClass,
        days: i64,
        ttl_minutes: i64,
    ) -> Result<Option<Vec<Bar>>, SignalError> {
        let newest: Option<(String,)> = sqlx::query_as(
            "SELECT fetched_at FROM price_cache
             WHERE symbol = ? AND asset_class = ?
             ORDER BY date DESC LIMIT 1",
        )
        .bind(symbol)
        .bind(asset_class.as_str())
        .fetch_optional(self.pool())
        .await
        .map_err(storage_err)?;

        let Some((fetched_at,)) = newest else {
            return Ok(None);
        };
        if is_stale(&fetched_at, ttl_minutes) {
            return Ok(None);
        }

        let cutoff = (Utc::now() - Duration::days(days)).date_naive().to_string();
        let rows: Vec<PriceRow> = sqlx::query_as(
            "SELECT date, open, high, low, close, volume FROM price_cache
             WHERE symbol = ? AND asset_class = ? AND date >= ?
             ORDER BY date",
        )
        .bind(symbol)
        .bind(asset_class.as_str())
        .bind(cutoff)
        .fetch_all(self.pool())
        .await
        .map_err(storage_err)?;

        if rows.is_empty() {
            return Ok(None);
        }

        let bars = rows
            .into_iter()
            .filter_map(|r| {
                let date: NaiveDate = r.date.parse().ok()?;
                Some(Bar {
                    timestamp: Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?),
                    open: r.open,
                    high: r.high,
                    low: r.low,
                    close: r.close,
                    volume: r.volume,
                })
            })
            .collect();
        Ok(Some(bars))
    }

    pub async fn cache_news(
        &self,
        symbol: &str,
        articles: &[NewsArticle],
    ) -> Result<(), SignalError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool().begin().await.map_err(storage_err)?;
        // Replace the symbol's previous batch so stale headlines age out
        sqlx::query("DELETE FROM news_cache WHERE symbol = ?")
            .bind(symbol)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        for article in articles {
            sqlx::query(
                "INSERT INTO news_cache
                    (symbol, title, description, source, url, published_at, fetched_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(symbol)
            .bind(&article.title)
            .bind(&article.description)
            .bind(&article.source)
            .bind(&article.url)
            .bind(article.published_at.map(|t| t.to_rfc3339()))
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        }
        tx.commit().await.map_err(storage_err)?;
        Ok(())
    }

    pub async fn cached_news(
        &self,
        symbol: &str,
        limit: i64,
        ttl_minutes: i64,
    ) -> Result<Option<Vec<NewsArticle>>, SignalError> {
        let newest: Option<(String,)> = sqlx::query_as(
            "SELECT fetched_at FROM news_cache
             WHERE symbol = ? ORDER BY fetched_at DESC LIMIT 1",
        )
        .bind(symbol)
        .fetch_optional(self.pool())
        .await
        .map_err(storage_err)?;

        let Some((fetched_at,)) = newest else {
            return Ok(None);
        };
        if is_stale(&fetched_at, ttl_minutes) {
            return Ok(None);
        }

        let rows: Vec<NewsRow> = sqlx::query_as(
            "SELECT title, description, source, url, published_at FROM news_cache
             WHERE symbol = ? ORDER BY published_at DESC LIMIT ?",
        )
        .bind(symbol)
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(storage_err)?;

        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(
            rows.into_iter()
                .map(|r| NewsArticle {
                    title: r.title,
                    description: r.description,
                    source: r.source,
                    url: r.url,
                    published_at: r.published_at.and_then(|t| t.parse().ok()),
                })
                .collect(),
        ))
    }

    pub async fn cache_sentiment(
        &self,
        symbol: &str,
        source: &str,
        score: f64,
        label: &str,
    ) -> Result<(), SignalError> {
        sqlx::query(
            "INSERT INTO sentiment_scores (symbol, source, score, label, computed_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(symbol)
        .bind(source)
        .bind(score)
        .bind(label)
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool())
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    pub async fn cached_sentiment(
        &self,
        symbol: &str,
        ttl_minutes: i64,
    ) -> Result<Option<Vec<CachedSentiment>>, SignalError> {
        let newest: Option<(String,)> = sqlx::query_as(
            "SELECT computed_at FROM sentiment_scores
             WHERE symbol = ? ORDER BY computed_at DESC LIMIT 1",
        )
        .bind(symbol)
        .fetch_optional(self.pool())
        .await
        .map_err(storage_err)?;

        let Some((computed_at,)) = newest else {
            return Ok(None);
        };
        if is_stale(&computed_at, ttl_minutes) {
            return Ok(None);
        }

        let rows: Vec<CachedSentiment> = sqlx::query_as(
            "SELECT source, score, label FROM sentiment_scores
             WHERE symbol = ? ORDER BY computed_at DESC LIMIT 50",
        )
        .bind(symbol)
        .fetch_all(self.pool())
        .await
        .map_err(storage_err)?;
        Ok(if rows.is_empty() { None } else { Some(rows) })
    }

    pub async fn cache_ml_prediction(
        &self,
        symbol: &str,
        model: &str,
        signal_score: f64,
        confidence: f64,
    ) -> Result<(), SignalError> {
        sqlx::query(
            "INSERT INTO ml_predictions (symbol, model, signal_score, confidence, computed_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(symbol)
        .bind(model)
        .bind(signal_score)
        .bind(confidence)
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool())
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    pub async fn cached_ml_predictions(
        &self,
        symbol: &str,
        ttl_minutes: i64,
    ) -> Result<Option<Vec<CachedPrediction>>, SignalError> {
        let newest: Option<(String,)> = sqlx::query_as(
            "SELECT computed_at FROM ml_predictions
             WHERE symbol = ? ORDER BY computed_at DESC LIMIT 1",
        )
        .bind(symbol)
        .fetch_optional(self.pool())
        .await
        .map_err(storage_err)?;

        let Some((computed_at,)) = newest else {
            return Ok(None);
        };
        if is_stale(&computed_at, ttl_minutes) {
            return Ok(None);
        }

        let rows: Vec<CachedPrediction> = sqlx::query_as(
            "SELECT model, signal_score, confidence FROM ml_predictions
             WHERE symbol = ? ORDER BY computed_at DESC LIMIT 10",
        )
        .bind(symbol)
        .fetch_all(self.pool())
        .await
        .map_err(storage_err)?;
        Ok(if rows.is_empty() { None } else { Some(rows) })
    }

    /// Drop cached rows by class ("price", "news", "sentiment",
    /// "predictions", or "all").
    pub async fn clear_cache(&self, class: &str) -> Result<(), SignalError> {
        let tables: &[&str] = match class {
            "price" => &["price_cache"],
            "news" => &["news_cache"],
            "sentiment" => &["sentiment_scores"],
            "predictions" => &["ml_predictions"],
            _ => &["price_cache", "news_cache", "sentiment_scores", "ml_predictions"],
        };
        for table in tables {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(self.pool())
                .await
                .map_err(storage_err)?;
        }
        Ok(())
    }
}
