use std::sync::Arc;
use std::time::Duration;

use accuracy_tracker::AccuracyTracker;
use anyhow::Result;
use fusion_core::{CacheTtl, MlParams, Notifier};
use market_store::{MarketStore, MemoryCache, RateLimiter, SqlitePaperStore};
use paper_trader::PaperTrader;
use tokio::signal::unix::SignalKind;

use scan_agent::config::AgentConfig;
use scan_agent::notifier::WebhookNotifier;
use scan_agent::pipeline::ScanContext;
use scan_agent::scheduler::Scheduler;
use scan_agent::sources;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    tracing::info!("starting signal scan agent");

    let config = AgentConfig::from_env()?;
    tracing::info!("  database: {}", config.database_url);
    tracing::info!("  scan interval: {}s", config.scan_interval_seconds);
    tracing::info!("  fan-out: {} concurrent symbols", config.max_concurrent_symbols);
    tracing::info!("  paper capital: {:.0}", config.initial_paper_capital);

    let store = MarketStore::connect(&config.database_url).await?;
    tracing::info!("persistence initialized");

    let notifier: Arc<dyn Notifier> =
        Arc::new(WebhookNotifier::new(config.webhook_url.clone())?);

    let vendors = sources::build_from_env()?;

    let ctx = Arc::new(ScanContext {
        store: store.clone(),
        cache: Arc::new(MemoryCache::new()),
        stock_prices: vendors.stock_prices,
        crypto_prices: vendors.crypto_prices,
        news: vendors.news,
        social: vendors.social,
        sentiment_model: vendors.sentiment_model,
        ml_scorers: vendors.ml_scorers,
        facts: vendors.facts,
        price_limiter: Arc::new(RateLimiter::new(30, 60.0)),
        ttl: CacheTtl::default(),
        ml_params: MlParams::default(),
    });

    let paper = Arc::new(
        PaperTrader::new(SqlitePaperStore::new(store.clone()))
            .with_capital(config.initial_paper_capital),
    );
    let tracker = Arc::new(AccuracyTracker::new(store.clone()));

    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&ctx),
        paper,
        tracker,
        Arc::clone(&notifier),
        config.max_concurrent_symbols,
    ));

    scheduler
        .start(Duration::from_secs(config.scan_interval_seconds))
        .await;

    notifier
        .send(&format!(
            "**Scan agent started** - interval {}s",
            config.scan_interval_seconds
        ))
        .await;

    // Graceful shutdown on SIGINT or SIGTERM
    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received SIGINT");
        }
        _ = sigterm.recv() => {
            tracing::info!("received SIGTERM");
        }
    }

    scheduler.stop().await;
    tracing::info!("shutdown complete");
    Ok(())
}
