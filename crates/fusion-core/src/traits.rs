use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::{
    AnalystRatingFacts, AssetClass, Bar, MlPrediction, NewsArticle, OptionsChainFacts, Quote,
    SentimentScore, ShortInterestFacts, SignalError, SocialPost,
};

/// Daily price history provider for one asset class.
/// Implementations deliver naive-UTC timestamps and retry transient
/// failures themselves; errors surface as an empty series / NoData.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch(&self, symbol: &str, days: i64) -> Result<Vec<Bar>, SignalError>;
    async fn quote(&self, symbol: &str) -> Result<Quote, SignalError>;
}

/// News headline provider. Articles are deduplicated by title downstream.
#[async_trait]
pub trait NewsSource: Send + Sync {
    async fn fetch(&self, symbol: &str) -> Result<Vec<NewsArticle>, SignalError>;
}

/// Social feed provider. Content is treated as opaque text.
#[async_trait]
pub trait SocialSource: Send + Sync {
    async fn fetch_posts(
        &self,
        symbol: &str,
        asset_class: AssetClass,
    ) -> Result<Vec<SocialPost>, SignalError>;

    async fn fetch_short_messages(&self, symbol: &str) -> Result<Vec<String>, SignalError>;
}

/// NLP sentiment model over a batch of texts
#[async_trait]
pub trait SentimentModel: Send + Sync {
    async fn analyze(&self, texts: &[String]) -> Result<Vec<SentimentScore>, SignalError>;
}

/// Opaque ML scorer (gradient-boosted trees, LSTM, ...). Models are
/// persisted per symbol; `trained_at` drives the staleness check.
#[async_trait]
pub trait MlScorer: Send + Sync {
    async fn train(&self, symbol: &str, bars: &[Bar]) -> Result<(), SignalError>;
    async fn predict(&self, symbol: &str, bars: &[Bar]) -> Result<MlPrediction, SignalError>;
    async fn trained_at(&self, symbol: &str) -> Option<DateTime<Utc>>;
}

/// Best-effort outbound notification channel. Failures never propagate.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str);
}

/// Per-symbol market facts beyond the price feed: earnings calendar,
/// short interest, options chain summaries, analyst consensus, sector
/// membership, and the fear & greed index. Every method returns None
/// when the vendor has nothing for the symbol.
#[async_trait]
pub trait MarketFacts: Send + Sync {
    async fn next_earnings_date(&self, symbol: &str) -> Result<Option<NaiveDate>, SignalError>;

    async fn short_interest(
        &self,
        symbol: &str,
    ) -> Result<Option<ShortInterestFacts>, SignalError>;

    async fn options_chain(&self, symbol: &str) -> Result<Option<OptionsChainFacts>, SignalError>;

    async fn analyst_ratings(
        &self,
        symbol: &str,
    ) -> Result<Option<AnalystRatingFacts>, SignalError>;

    async fn sector_of(&self, symbol: &str) -> Result<Option<String>, SignalError>;

    /// Raw 0-100 index plus the vendor's own classification label
    async fn fear_greed_index(
        &self,
        asset_class: AssetClass,
    ) -> Result<Option<(f64, Option<String>)>, SignalError>;
}
