//! Per-scan data pipeline: once-per-scan global signals and the
//! per-symbol factor computation feeding the fusion engine.
//!
//! Every external read goes through a cache: price, news, sentiment and
//! ML predictions live in SQLite with per-class TTLs; the global
//! signals and symbol facts go through the shared in-process cache so a
//! scan over many symbols performs each fetch once.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use fusion_core::{
    AnalystRatingFacts, AssetClass, Bar, BreadthSignal, CacheTtl, EarningsFilter, FactorScore,
    FearGreedSignal, IntermarketSignal, MacroSignal, MarketFacts, MlParams, MlPrediction,
    MlScorer, NewsSource, OptionsChainFacts, PriceSource, SentimentLabel, SentimentModel,
    SentimentScore, ShortInterestFacts, SignalError, SocialSource,
};
use factor_signals::analyst::RatingCounts;
use factor_signals::breadth::BreadthComponent;
use factor_signals::intermarket::IntermarketReturns;
use factor_signals::macro_signals::MacroInputs;
use factor_signals::sector::SectorStrength;
use market_store::{MarketStore, MemoryCache, RateLimiter};
use signal_fusion::{combine_signals, FactorInputs, FusedSignal};
use technical_analysis::{compute_technical_signal, latest_atr};

/// Index proxy basket for market breadth
const BREADTH_BASKET: &[&str] = &[
    "AAPL", "MSFT", "NVDA", "AVGO", "ORCL", "JPM", "BAC", "V", "GS", "UNH", "JNJ", "LLY",
    "AMZN", "TSLA", "HD", "GOOGL", "META",
];

/// Sector ETF per GICS sector, measured against SPY
const SECTOR_ETFS: &[(&str, &str)] = &[
    ("Technology", "XLK"),
    ("Financials", "XLF"),
    ("Energy", "XLE"),
    ("Healthcare", "XLV"),
    ("Industrials", "XLI"),
    ("ConsumerDiscr", "XLY"),
    ("ConsumerStaples", "XLP"),
    ("Utilities", "XLU"),
    ("RealEstate", "XLRE"),
    ("Materials", "XLB"),
    ("Communication", "XLC"),
];

/// Everything one scan shares across its per-symbol workers
pub struct ScanContext {
    pub store: MarketStore,
    pub cache: Arc<MemoryCache>,
    pub stock_prices: Arc<dyn PriceSource>,
    pub crypto_prices: Arc<dyn PriceSource>,
    pub news: Arc<dyn NewsSource>,
    pub social: Arc<dyn SocialSource>,
    pub sentiment_model: Arc<dyn SentimentModel>,
    pub ml_scorers: Vec<Arc<dyn MlScorer>>,
    pub facts: Arc<dyn MarketFacts>,
    /// Shared by every task hitting the price vendor
    pub price_limiter: Arc<RateLimiter>,
    pub ttl: CacheTtl,
    pub ml_params: MlParams,
}

impl ScanContext {
    fn prices_for(&self, asset_class: AssetClass) -> &dyn PriceSource {
        match asset_class {
            AssetClass::Crypto => self.crypto_prices.as_ref(),
            AssetClass::Stock => self.stock_prices.as_ref(),
        }
    }
}

/// Global signals fetched once per scan and shared by every symbol
#[derive(Debug, Clone, Default)]
pub struct GlobalSignals {
    pub macro_signal: Option<MacroSignal>,
    pub breadth: Option<BreadthSignal>,
    pub intermarket: Option<IntermarketSignal>,
    pub fear_greed_stock: Option<FearGreedSignal>,
    pub fear_greed_crypto: Option<FearGreedSignal>,
    pub sector_overview: Vec<SectorStrength>,
}

fn last_close(bars: &[Bar]) -> Option<f64> {
    bars.last().map(|b| b.close)
}

/// Percent change over the last `window` bars
fn pct_change(bars: &[Bar], window: usize) -> Option<f64> {
    if bars.len() < window + 1 {
        return None;
    }
    let last = bars[bars.len() - 1].close;
    let prev = bars[bars.len() - 1 - window].close;
    if prev <= 0.0 {
        return None;
    }
    Some((last / prev - 1.0) * 100.0)
}

/// Daily price history through the cache; a fetch failure yields an
/// empty series.
pub async fn price_history(
    ctx: &ScanContext,
    symbol: &str,
    asset_class: AssetClass,
    days: i64,
) -> Vec<Bar> {
    match ctx
        .store
        .cached_price_data(symbol, asset_class, days, ctx.ttl.price_minutes)
        .await
    {
        Ok(Some(bars)) => return bars,
        Ok(None) => {}
        Err(e) => tracing::warn!("price cache read failed for {}: {}", symbol, e),
    }

    ctx.price_limiter.acquire().await;
    match ctx.prices_for(asset_class).fetch(symbol, days).await {
        Ok(bars) => {
            if let Err(e) = ctx.store.cache_price_data(symbol, asset_class, &bars).await {
                tracing::warn!("price cache write failed for {}: {}", symbol, e);
            }
            bars
        }
        Err(e) => {
            tracing::warn!("price fetch failed for {}: {}", symbol, e);
            Vec::new()
        }
    }
}

async fn fetch_macro(ctx: &ScanContext) -> Result<MacroSignal, SignalError> {
    let vix = price_history(ctx, "^VIX", AssetClass::Stock, 90).await;
    let tnx = price_history(ctx, "^TNX", AssetClass::Stock, 90).await;
    let irx = price_history(ctx, "^IRX", AssetClass::Stock, 90).await;
    let dxy = price_history(ctx, "DX-Y.NYB", AssetClass::Stock, 90).await;

    let yield_spread = match (last_close(&tnx), last_close(&irx)) {
        (Some(ten_year), Some(three_month)) => Some(ten_year - three_month),
        _ => None,
    };

    Ok(factor_signals::macro_signals::compute_macro_signal(
        &MacroInputs {
            vix_level: last_close(&vix),
            vix_change_20d: pct_change(&vix, 20),
            yield_spread,
            dxy_change_20d: pct_change(&dxy, 20),
        },
    ))
}

async fn fetch_breadth(ctx: &ScanContext) -> Result<BreadthSignal, SignalError> {
    let mut components = Vec::new();
    for symbol in BREADTH_BASKET {
        let bars = price_history(ctx, symbol, AssetClass::Stock, 400).await;
        if bars.len() < 2 {
            continue;
        }
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let sma_200 = technical_analysis::sma(&closes, 200).last().copied();
        let last = closes[closes.len() - 1];
        let prev = closes[closes.len() - 2];
        components.push(BreadthComponent {
            above_200ma: sma_200.map(|s| last > s).unwrap_or(false),
            daily_change: if prev > 0.0 { (last / prev - 1.0) * 100.0 } else { 0.0 },
        });
    }
    Ok(factor_signals::breadth::compute_market_breadth(
        &components,
        BREADTH_BASKET.len(),
    ))
}

async fn fetch_intermarket(ctx: &ScanContext) -> Result<IntermarketSignal, SignalError> {
    let btc = price_history(ctx, "BTC-USD", AssetClass::Stock, 90).await;
    let dxy = price_history(ctx, "DX-Y.NYB", AssetClass::Stock, 90).await;
    let gold = price_history(ctx, "GLD", AssetClass::Stock, 90).await;
    let oil = price_history(ctx, "USO", AssetClass::Stock, 90).await;
    let tlt = price_history(ctx, "TLT", AssetClass::Stock, 90).await;

    Ok(factor_signals::intermarket::compute_intermarket_signal(
        &IntermarketReturns {
            btc_20d: pct_change(&btc, 20),
            dxy_20d: pct_change(&dxy, 20),
            gold_20d: pct_change(&gold, 20),
            oil_20d: pct_change(&oil, 20),
            tlt_20d: pct_change(&tlt, 20),
        },
    ))
}

async fn fetch_fear_greed(
    ctx: &ScanContext,
    asset_class: AssetClass,
) -> Result<FearGreedSignal, SignalError> {
    match ctx.facts.fear_greed_index(asset_class).await {
        Ok(Some((index, label))) => Ok(factor_signals::fear_greed::compute_fear_greed_signal(
            index, label,
        )),
        Ok(None) => Ok(factor_signals::fear_greed::neutral()),
        Err(e) => {
            tracing::warn!("fear/greed fetch failed ({:?}): {}", asset_class, e);
            Ok(factor_signals::fear_greed::neutral())
        }
    }
}

async fn fetch_sector_overview(ctx: &ScanContext) -> Result<Vec<SectorStrength>, SignalError> {
    let benchmark = price_history(ctx, "SPY", AssetClass::Stock, 220).await;
    if benchmark.is_empty() {
        return Ok(Vec::new());
    }
    let benchmark_closes: Vec<f64> = benchmark.iter().map(|b| b.close).collect();

    let mut sectors = Vec::new();
    for (name, etf) in SECTOR_ETFS {
        let bars = price_history(ctx, etf, AssetClass::Stock, 220).await;
        if !bars.is_empty() {
            sectors.push((name.to_string(), bars.iter().map(|b| b.close).collect()));
        }
    }
    Ok(factor_signals::sector::compute_sector_overview(
        &sectors,
        &benchmark_closes,
    ))
}

/// Fetch the four global signal families (plus the sector overview)
/// exactly once per TTL window; concurrent scans share one fetch.
pub async fn fetch_global_signals(ctx: &ScanContext) -> GlobalSignals {
    let ttl = ctx.ttl.global_signal_minutes;

    let macro_signal = ctx
        .cache
        .get_or_compute("macro", "global", ttl, || fetch_macro(ctx))
        .await
        .map_err(|e| tracing::warn!("macro signal unavailable: {}", e))
        .ok();

    let breadth = ctx
        .cache
        .get_or_compute("breadth", "global", ttl, || fetch_breadth(ctx))
        .await
        .map_err(|e| tracing::warn!("breadth signal unavailable: {}", e))
        .ok();

    let intermarket = ctx
        .cache
        .get_or_compute("intermarket", "global", ttl, || fetch_intermarket(ctx))
        .await
        .map_err(|e| tracing::warn!("intermarket signal unavailable: {}", e))
        .ok();

    let fear_greed_stock = ctx
        .cache
        .get_or_compute("fear_greed", "stock", ttl, || {
            fetch_fear_greed(ctx, AssetClass::Stock)
        })
        .await
        .ok();

    let fear_greed_crypto = ctx
        .cache
        .get_or_compute("fear_greed", "crypto", ttl, || {
            fetch_fear_greed(ctx, AssetClass::Crypto)
        })
        .await
        .ok();

    let sector_overview = ctx
        .cache
        .get_or_compute("sector_overview", "global", ctx.ttl.sector_minutes, || {
            fetch_sector_overview(ctx)
        })
        .await
        .unwrap_or_default();

    GlobalSignals {
        macro_signal,
        breadth,
        intermarket,
        fear_greed_stock,
        fear_greed_crypto,
        sector_overview,
    }
}

fn label_of(raw: &str) -> SentimentLabel {
    match raw {
        "positive" => SentimentLabel::Positive,
        "negative" => SentimentLabel::Negative,
        _ => SentimentLabel::Neutral,
    }
}

/// News + social sentiment through the NLP model, cached by class TTLs.
async fn sentiment_factor(
    ctx: &ScanContext,
    symbol: &str,
    asset_class: AssetClass,
) -> FactorScore {
    // Fresh cached scores short-circuit the whole pipeline
    if let Ok(Some(cached)) = ctx
        .store
        .cached_sentiment(symbol, ctx.ttl.sentiment_minutes)
        .await
    {
        let news: Vec<SentimentScore> = cached
            .iter()
            .filter(|c| c.source == "news")
            .map(|c| SentimentScore { label: label_of(&c.label), score: c.score })
            .collect();
        let social: Vec<SentimentScore> = cached
            .iter()
            .filter(|c| c.source == "social")
            .map(|c| SentimentScore { label: label_of(&c.label), score: c.score })
            .collect();
        let sig = factor_signals::sentiment::compute_sentiment_signal(&news, &social);
        return FactorScore::new(sig.score, sig.confidence);
    }

    // News headlines (titles carry the signal), deduplicated
    let articles = match ctx.store.cached_news(symbol, 50, ctx.ttl.news_minutes).await {
        Ok(Some(articles)) => articles,
        _ => match ctx.news.fetch(symbol).await {
            Ok(articles) => {
                let deduped = factor_signals::sentiment::dedupe_by_title(articles);
                if let Err(e) = ctx.store.cache_news(symbol, &deduped).await {
                    tracing::warn!("news cache write failed for {}: {}", symbol, e);
                }
                deduped
            }
            Err(e) => {
                tracing::debug!("news fetch failed for {}: {}", symbol, e);
                Vec::new()
            }
        },
    };
    let news_texts: Vec<String> = articles.iter().map(|a| a.title.clone()).collect();

    // Social feed text
    let mut social_texts: Vec<String> = Vec::new();
    match ctx.social.fetch_posts(symbol, asset_class).await {
        Ok(posts) => {
            social_texts.extend(posts.into_iter().map(|p| {
                if p.text.is_empty() {
                    p.title
                } else {
                    format!("{} {}", p.title, p.text)
                }
            }));
        }
        Err(e) => tracing::debug!("social fetch failed for {}: {}", symbol, e),
    }
    if let Ok(messages) = ctx.social.fetch_short_messages(symbol).await {
        social_texts.extend(messages);
    }

    if news_texts.is_empty() && social_texts.is_empty() {
        return FactorScore::neutral();
    }

    async fn analyze(
        ctx: &ScanContext,
        symbol: &str,
        texts: &[String],
    ) -> Vec<SentimentScore> {
        if texts.is_empty() {
            return Vec::new();
        }
        match ctx.sentiment_model.analyze(texts).await {
            Ok(scores) => scores,
            Err(e) => {
                tracing::warn!("sentiment model failed for {}: {}", symbol, e);
                Vec::new()
            }
        }
    }
    let news_scores = analyze(ctx, symbol, &news_texts).await;
    let social_scores = analyze(ctx, symbol, &social_texts).await;

    for score in &news_scores {
        let label = serde_json::to_value(score.label)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "neutral".to_string());
        let _ = ctx
            .store
            .cache_sentiment(symbol, "news", score.score, &label)
            .await;
    }
    for score in &social_scores {
        let label = serde_json::to_value(score.label)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "neutral".to_string());
        let _ = ctx
            .store
            .cache_sentiment(symbol, "social", score.score, &label)
            .await;
    }

    let sig = factor_signals::sentiment::compute_sentiment_signal(&news_scores, &social_scores);
    FactorScore::new(sig.score, sig.confidence)
}

/// ML factor: retrain stale models, predict, blend. Cached predictions
/// short-circuit both steps.
async fn ml_factor(ctx: &ScanContext, symbol: &str, bars: &[Bar]) -> FactorScore {
    if let Ok(Some(cached)) = ctx
        .store
        .cached_ml_predictions(symbol, ctx.ttl.ml_prediction_minutes)
        .await
    {
        let predictions: Vec<MlPrediction> = cached
            .into_iter()
            .map(|c| MlPrediction {
                signal_score: c.signal_score,
                confidence: c.confidence,
                model: c.model,
            })
            .collect();
        return factor_signals::ml::blend_predictions(&predictions, &ctx.ml_params);
    }

    let mut predictions = Vec::new();
    for scorer in &ctx.ml_scorers {
        let trained_at = scorer.trained_at(symbol).await;
        if factor_signals::ml::is_model_stale(trained_at, Utc::now(), &ctx.ml_params) {
            if let Err(e) = scorer.train(symbol, bars).await {
                tracing::warn!("model training failed for {}: {}", symbol, e);
                continue;
            }
        }
        match scorer.predict(symbol, bars).await {
            Ok(prediction) => {
                let _ = ctx
                    .store
                    .cache_ml_prediction(
                        symbol,
                        &prediction.model,
                        prediction.signal_score,
                        prediction.confidence,
                    )
                    .await;
                predictions.push(prediction);
            }
            Err(e) => tracing::debug!("model prediction failed for {}: {}", symbol, e),
        }
    }

    factor_signals::ml::blend_predictions(&predictions, &ctx.ml_params)
}

async fn earnings_factor(ctx: &ScanContext, symbol: &str) -> Option<EarningsFilter> {
    let facts = ctx.facts.clone();
    let owned = symbol.to_string();
    let next: Option<NaiveDate> = ctx
        .cache
        .get_or_compute("earnings", symbol, ctx.ttl.earnings_minutes, || async move {
            facts.next_earnings_date(&owned).await
        })
        .await
        .ok()?;
    Some(factor_signals::earnings::earnings_filter(
        AssetClass::Stock,
        Utc::now().date_naive(),
        next,
    ))
}

/// Output of one symbol's factor pipeline
pub struct SymbolScan {
    pub fused: FusedSignal,
    pub current_price: Option<f64>,
    pub atr: Option<f64>,
}

/// Compute every factor for a symbol and fuse them. Failing optional
/// factors degrade to absent; a missing price history yields an error
/// since nothing can be computed.
pub async fn process_symbol(
    ctx: &ScanContext,
    symbol: &str,
    globals: &GlobalSignals,
    weights: &fusion_core::FactorWeights,
    base: &fusion_core::BaseThresholds,
) -> Result<SymbolScan, SignalError> {
    let asset_class = AssetClass::of_symbol(symbol);
    let bars = price_history(ctx, symbol, asset_class, 730).await;
    if bars.is_empty() {
        return Err(SignalError::NoData(format!("no price history for {symbol}")));
    }

    let technical = compute_technical_signal(&bars);
    let sentiment = sentiment_factor(ctx, symbol, asset_class).await;
    let ml = ml_factor(ctx, symbol, &bars).await;
    let mtf = factor_signals::mtf::compute_mtf_signal(asset_class, &bars, None);

    let fear_greed = match asset_class {
        AssetClass::Crypto => globals.fear_greed_crypto.clone(),
        AssetClass::Stock => globals.fear_greed_stock.clone(),
    }
    .filter(|f| f.confidence > 0.0);

    // Equity-only factors
    let (earnings, analyst, sector, short_interest, options) = if asset_class == AssetClass::Stock
    {
        let earnings = earnings_factor(ctx, symbol).await;

        let facts = ctx.facts.clone();
        let owned = symbol.to_string();
        let rating_facts: Option<AnalystRatingFacts> = ctx
            .cache
            .get_or_compute("analyst", symbol, ctx.ttl.analyst_minutes, || async move {
                facts.analyst_ratings(&owned).await
            })
            .await
            .ok()
            .flatten();
        let analyst = rating_facts.map(|f| {
            factor_signals::analyst::compute_analyst_signal(
                &RatingCounts {
                    strong_buy: f.strong_buy,
                    buy: f.buy,
                    hold: f.hold,
                    sell: f.sell,
                    strong_sell: f.strong_sell,
                },
                f.upgrades_30d,
                f.downgrades_30d,
                f.target_price,
                last_close(&bars),
            )
        });

        let facts = ctx.facts.clone();
        let owned = symbol.to_string();
        let sector_name: Option<String> = ctx
            .cache
            .get_or_compute("sector_symbol", symbol, ctx.ttl.sector_minutes, || async move {
                facts.sector_of(&owned).await
            })
            .await
            .ok()
            .flatten();
        let sector = Some(factor_signals::sector::sector_signal(
            asset_class,
            sector_name.as_deref(),
            &globals.sector_overview,
        ));

        let facts = ctx.facts.clone();
        let owned = symbol.to_string();
        let si_facts: Option<ShortInterestFacts> = ctx
            .cache
            .get_or_compute(
                "short_interest",
                symbol,
                ctx.ttl.short_interest_minutes,
                || async move { facts.short_interest(&owned).await },
            )
            .await
            .ok()
            .flatten();
        let short_interest = si_facts.map(|f| {
            factor_signals::short_interest::compute_short_interest_signal(
                Some(f.short_float),
                pct_change(&bars, 5),
                f.short_ratio,
            )
        });

        let facts = ctx.facts.clone();
        let owned = symbol.to_string();
        let chain: Option<OptionsChainFacts> = ctx
            .cache
            .get_or_compute("options", symbol, ctx.ttl.options_minutes, || async move {
                facts.options_chain(&owned).await
            })
            .await
            .ok()
            .flatten();
        let options = chain.map(|c| {
            factor_signals::options::compute_options_signal(
                c.put_call_ratio,
                c.iv_skew,
                c.total_volume,
            )
        });

        (earnings, analyst, sector, short_interest, options)
    } else {
        (None, None, None, None, None)
    };

    let inputs = FactorInputs {
        technical: FactorScore::new(technical.score, technical.confidence),
        sentiment,
        ml,
        macro_signal: globals.macro_signal.clone(),
        mtf: Some(mtf),
        earnings,
        breadth: globals.breadth.clone(),
        analyst,
        intermarket: globals.intermarket.clone(),
        fear_greed,
        sector,
        short_interest,
        options,
    };

    let mut fused = combine_signals(&inputs, weights, base);
    fused.symbol = Some(symbol.to_string());

    Ok(SymbolScan {
        fused,
        current_price: last_close(&bars),
        atr: latest_atr(&bars, 14),
    })
}
