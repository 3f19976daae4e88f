//! End-to-end scan over mock collaborators: every factor feeds the
//! fusion engine, the result is persisted, and the paper engine is
//! ticked, all against an in-memory database.

use std::sync::Arc;
use std::time::Duration;

use accuracy_tracker::AccuracyTracker;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use fusion_core::{
    AnalystRatingFacts, AssetClass, Bar, CacheTtl, Direction, MarketFacts, MlParams,
    MlPrediction, MlScorer, NewsArticle, NewsSource, Notifier, OptionsChainFacts, PriceSource,
    Quote, SentimentLabel, SentimentModel, SentimentScore, ShortInterestFacts, SignalError,
    SocialPost, SocialSource,
};
use market_store::{MarketStore, MemoryCache, RateLimiter, SqlitePaperStore};
use paper_trader::PaperTrader;
use scan_agent::pipeline::ScanContext;
use scan_agent::Scheduler;
use std::sync::Mutex;

/// Price source with a strong uptrend so the technical factor leans
/// bullish for every symbol, including the macro/breadth tickers.
struct TrendingPrices;

#[async_trait]
impl PriceSource for TrendingPrices {
    async fn fetch(&self, symbol: &str, days: i64) -> Result<Vec<Bar>, SignalError> {
        let n = days.clamp(60, 400) as usize;
        let start = Utc::now() - chrono::Duration::days(n as i64 - 1);
        // VIX stays calm rather than trending
        let calm = symbol == "^VIX" || symbol == "^IRX" || symbol == "^TNX";
        Ok((0..n)
            .map(|i| {
                let close = if calm {
                    15.0 + (i as f64 * 0.3).sin()
                } else {
                    100.0 + i as f64 * 0.4 + (i as f64 * 0.5).sin() * 1.5
                };
                Bar {
                    timestamp: start + chrono::Duration::days(i as i64),
                    open: close * 0.998,
                    high: close * 1.01,
                    low: close * 0.99,
                    close,
                    volume: 1_000_000.0,
                }
            })
            .collect())
    }

    async fn quote(&self, _symbol: &str) -> Result<Quote, SignalError> {
        Err(SignalError::NoData("not used".to_string()))
    }
}

struct UpbeatNews;

#[async_trait]
impl NewsSource for UpbeatNews {
    async fn fetch(&self, symbol: &str) -> Result<Vec<NewsArticle>, SignalError> {
        Ok((0..6)
            .map(|i| NewsArticle {
                title: format!("{symbol} surges on strong guidance {i}"),
                description: None,
                source: "wire".to_string(),
                url: format!("https://example.com/{symbol}/{i}"),
                published_at: Some(Utc::now()),
            })
            .collect())
    }
}

struct QuietSocial;

#[async_trait]
impl SocialSource for QuietSocial {
    async fn fetch_posts(
        &self,
        _symbol: &str,
        _asset_class: AssetClass,
    ) -> Result<Vec<SocialPost>, SignalError> {
        Ok(Vec::new())
    }

    async fn fetch_short_messages(&self, _symbol: &str) -> Result<Vec<String>, SignalError> {
        Ok(Vec::new())
    }
}

struct BullishModel;

#[async_trait]
impl SentimentModel for BullishModel {
    async fn analyze(&self, texts: &[String]) -> Result<Vec<SentimentScore>, SignalError> {
        Ok(texts
            .iter()
            .map(|_| SentimentScore {
                label: SentimentLabel::Positive,
                score: 0.85,
            })
            .collect())
    }
}

struct ConfidentScorer;

#[async_trait]
impl MlScorer for ConfidentScorer {
    async fn train(&self, _symbol: &str, _bars: &[Bar]) -> Result<(), SignalError> {
        Ok(())
    }

    async fn predict(&self, _symbol: &str, _bars: &[Bar]) -> Result<MlPrediction, SignalError> {
        Ok(MlPrediction {
            signal_score: 0.9,
            confidence: 0.9,
            model: "xgboost".to_string(),
        })
    }

    async fn trained_at(&self, _symbol: &str) -> Option<DateTime<Utc>> {
        Some(Utc::now())
    }
}

struct NoFacts;

#[async_trait]
impl MarketFacts for NoFacts {
    async fn next_earnings_date(&self, _symbol: &str) -> Result<Option<NaiveDate>, SignalError> {
        Ok(None)
    }
    async fn short_interest(
        &self,
        _symbol: &str,
    ) -> Result<Option<ShortInterestFacts>, SignalError> {
        Ok(None)
    }
    async fn options_chain(
        &self,
        _symbol: &str,
    ) -> Result<Option<OptionsChainFacts>, SignalError> {
        Ok(None)
    }
    async fn analyst_ratings(
        &self,
        _symbol: &str,
    ) -> Result<Option<AnalystRatingFacts>, SignalError> {
        Ok(None)
    }
    async fn sector_of(&self, _symbol: &str) -> Result<Option<String>, SignalError> {
        Ok(None)
    }
    async fn fear_greed_index(
        &self,
        _asset_class: AssetClass,
    ) -> Result<Option<(f64, Option<String>)>, SignalError> {
        Ok(Some((30.0, None)))
    }
}

#[derive(Default)]
struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

async fn build_scheduler(
    store: MarketStore,
    notifier: Arc<RecordingNotifier>,
) -> Arc<Scheduler> {
    let ctx = Arc::new(ScanContext {
        store: store.clone(),
        cache: Arc::new(MemoryCache::new()),
        stock_prices: Arc::new(TrendingPrices),
        crypto_prices: Arc::new(TrendingPrices),
        news: Arc::new(UpbeatNews),
        social: Arc::new(QuietSocial),
        sentiment_model: Arc::new(BullishModel),
        ml_scorers: vec![Arc::new(ConfidentScorer)],
        facts: Arc::new(NoFacts),
        price_limiter: Arc::new(RateLimiter::new(10_000, 60.0)),
        ttl: CacheTtl::default(),
        ml_params: MlParams::default(),
    });

    let paper = Arc::new(PaperTrader::new(SqlitePaperStore::new(store.clone())));
    let tracker = Arc::new(AccuracyTracker::new(store));

    Arc::new(Scheduler::new(ctx, paper, tracker, notifier, 8))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scan_persists_signals_and_notifies() {
    let store = MarketStore::connect("sqlite::memory:").await.unwrap();
    store
        .set_setting("watchlist_stocks", &vec!["AAPL".to_string(), "MSFT".to_string()])
        .await
        .unwrap();
    store
        .set_setting("watchlist_crypto", &Vec::<String>::new())
        .await
        .unwrap();

    let notifier = Arc::new(RecordingNotifier::default());
    let scheduler = build_scheduler(store.clone(), notifier.clone()).await;

    let signals = scheduler.run_scan_now().await.unwrap();
    assert_eq!(signals.len(), 2);

    // Every fused signal is bounded and persisted
    let persisted = store.latest_signals(10).await.unwrap();
    assert_eq!(persisted.len(), 2);
    for signal in &persisted {
        assert!(signal.strength >= -1.0 && signal.strength <= 1.0);
        assert!(signal.confidence >= 0.0 && signal.confidence <= 1.0);
    }

    // The daily summary went out after all symbol work
    let messages = notifier.messages.lock().unwrap();
    assert!(messages.iter().any(|m| m.contains("Scan complete")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn directional_signal_reaches_paper_engine() {
    let store = MarketStore::connect("sqlite::memory:").await.unwrap();
    store
        .set_setting("watchlist_stocks", &vec!["AAPL".to_string()])
        .await
        .unwrap();
    store
        .set_setting("watchlist_crypto", &Vec::<String>::new())
        .await
        .unwrap();

    let notifier = Arc::new(RecordingNotifier::default());
    let scheduler = build_scheduler(store.clone(), notifier.clone()).await;

    let signals = scheduler.run_scan_now().await.unwrap();
    assert_eq!(signals.len(), 1);

    // With every factor bullish the fused signal is a BUY and a paper
    // position opens
    if signals[0].direction == Direction::Buy {
        let paper = PaperTrader::new(SqlitePaperStore::new(store));
        let summary = paper
            .portfolio_summary(&std::collections::HashMap::new())
            .await
            .unwrap();
        assert_eq!(summary.n_positions, 1);
        assert!(notifier
            .messages
            .lock()
            .unwrap()
            .iter()
            .any(|m| m.contains("AAPL BUY")));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn start_is_idempotent_and_stop_is_prompt() {
    let store = MarketStore::connect("sqlite::memory:").await.unwrap();
    store
        .set_setting("watchlist_stocks", &vec!["AAPL".to_string()])
        .await
        .unwrap();
    store
        .set_setting("watchlist_crypto", &Vec::<String>::new())
        .await
        .unwrap();

    let notifier = Arc::new(RecordingNotifier::default());
    let scheduler = build_scheduler(store, notifier).await;

    scheduler.start(Duration::from_secs(3600)).await;
    assert!(scheduler.is_running().await);
    // Second start is a no-op
    scheduler.start(Duration::from_secs(3600)).await;
    assert!(scheduler.is_running().await);

    scheduler.stop().await;
    assert!(!scheduler.is_running().await);
    // Stopping again is harmless
    scheduler.stop().await;
}
