//! Collaborator bindings.
//!
//! The core only talks to the outside world through the trait contracts
//! in `fusion-core`; deployments register vendor-backed clients here.
//! The default build wires the offline implementations, which serve
//! nothing and let every factor degrade to its explicit neutral - the
//! scan loop, persistence, accuracy feedback, and paper engine all run
//! unchanged against them, which is also how integration environments
//! exercise the agent without API keys.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use fusion_core::{
    AnalystRatingFacts, AssetClass, Bar, MarketFacts, MlPrediction, MlScorer, NewsArticle,
    NewsSource, OptionsChainFacts, PriceSource, Quote, SentimentModel, SentimentScore,
    ShortInterestFacts, SignalError, SocialPost, SocialSource,
};

pub struct Vendors {
    pub stock_prices: Arc<dyn PriceSource>,
    pub crypto_prices: Arc<dyn PriceSource>,
    pub news: Arc<dyn NewsSource>,
    pub social: Arc<dyn SocialSource>,
    pub sentiment_model: Arc<dyn SentimentModel>,
    pub ml_scorers: Vec<Arc<dyn MlScorer>>,
    pub facts: Arc<dyn MarketFacts>,
}

/// Build the collaborator set. Currently always the offline suite;
/// vendor clients plug in per deployment.
pub fn build_from_env() -> Result<Vendors> {
    let offline = Arc::new(Offline);
    Ok(Vendors {
        stock_prices: offline.clone(),
        crypto_prices: offline.clone(),
        news: offline.clone(),
        social: offline.clone(),
        sentiment_model: offline.clone(),
        ml_scorers: vec![],
        facts: offline,
    })
}

/// No-vendor implementation of every collaborator contract.
pub struct Offline;

#[async_trait]
impl PriceSource for Offline {
    async fn fetch(&self, symbol: &str, _days: i64) -> Result<Vec<Bar>, SignalError> {
        Err(SignalError::NoData(format!("no price vendor bound for {symbol}")))
    }

    async fn quote(&self, symbol: &str) -> Result<Quote, SignalError> {
        Err(SignalError::NoData(format!("no price vendor bound for {symbol}")))
    }
}

#[async_trait]
impl NewsSource for Offline {
    async fn fetch(&self, _symbol: &str) -> Result<Vec<NewsArticle>, SignalError> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl SocialSource for Offline {
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

#[async_trait]
impl SentimentModel for Offline {
    async fn analyze(&self, _texts: &[String]) -> Result<Vec<SentimentScore>, SignalError> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl MlScorer for Offline {
    async fn train(&self, _symbol: &str, _bars: &[Bar]) -> Result<(), SignalError> {
        Err(SignalError::NoData("no ML backend bound".to_string()))
    }

    async fn predict(&self, _symbol: &str, _bars: &[Bar]) -> Result<MlPrediction, SignalError> {
        Err(SignalError::NoData("no ML backend bound".to_string()))
    }

    async fn trained_at(&self, _symbol: &str) -> Option<DateTime<Utc>> {
        None
    }
}

#[async_trait]
impl MarketFacts for Offline {
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
        Ok(None)
    }
}
