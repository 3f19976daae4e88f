//! Outcome evaluation of aged signals.
//!
//! A signal is judged once it is at least five days old: the first
//! trading day at or after its creation date anchors the base price,
//! and the 5- and 10-day forward returns decide correctness. When
//! price data is unavailable the signal stays pending and is retried
//! on a later scan.

use fusion_core::{AssetClass, Direction, FactorWeights, PriceSource, SignalError, SignalRecord};
use market_store::signals::SignalOutcome;
use market_store::{MarketStore, MemoryCache};
use serde::{Deserialize, Serialize};

use crate::weights::compute_adaptive_weights;

/// Minimum age before a signal is judged
const MIN_AGE_DAYS: i64 = 5;
/// Signals pulled per scan
const BATCH_LIMIT: i64 = 100;
/// HOLD is correct when the move stays inside this band
const HOLD_BAND: f64 = 0.02;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AccuracySummary {
    /// Signals whose outcome was written this pass
    pub checked: usize,
    /// Of those, how many had a judgeable 5-day return
    pub evaluated: usize,
    pub correct: usize,
    pub accuracy: f64,
}

pub struct AccuracyTracker {
    store: MarketStore,
}

impl AccuracyTracker {
    pub fn new(store: MarketStore) -> Self {
        Self { store }
    }

    /// Judge one signal against forward prices. None means price data
    /// was unavailable and the signal stays pending.
    async fn evaluate_signal(
        &self,
        prices: &dyn PriceSource,
        signal: &SignalRecord,
    ) -> Option<SignalOutcome> {
        let age_days = (chrono::Utc::now() - signal.created_at).num_days().max(0);
        let fetch_days = age_days + 15;

        let bars = match prices.fetch(&signal.symbol, fetch_days).await {
            Ok(bars) if !bars.is_empty() => bars,
            Ok(_) => return None,
            Err(e) => {
                tracing::warn!(
                    "accuracy evaluation fetch failed for {}: {}",
                    signal.symbol,
                    e
                );
                return None;
            }
        };

        // First trading day at or after the signal's creation date
        let signal_date = signal.created_at.date_naive();
        let base_idx = bars.iter().position(|b| b.date() >= signal_date)?;
        let base_price = bars[base_idx].close;
        if base_price == 0.0 {
            return None;
        }

        let forward = &bars[base_idx + 1..];
        let return_5d = forward.get(4).map(|b| b.close / base_price - 1.0);
        let return_10d = forward.get(9).map(|b| b.close / base_price - 1.0);

        let correct = return_5d.map(|r| match signal.direction {
            Direction::Buy => r > 0.0,
            Direction::Sell => r < 0.0,
            Direction::Hold => r.abs() < HOLD_BAND,
        });

        Some(SignalOutcome {
            return_5d,
            return_10d,
            correct,
        })
    }

    /// Evaluate all pending signals old enough to judge. Per-symbol
    /// failures leave the signal pending; they never abort the pass.
    pub async fn run_accuracy_check(
        &self,
        stock_prices: &dyn PriceSource,
        crypto_prices: &dyn PriceSource,
    ) -> Result<AccuracySummary, SignalError> {
        let unchecked = self.store.unchecked_signals(MIN_AGE_DAYS, BATCH_LIMIT).await?;

        let mut summary = AccuracySummary::default();
        for signal in &unchecked {
            let source = match AssetClass::of_symbol(&signal.symbol) {
                AssetClass::Crypto => crypto_prices,
                AssetClass::Stock => stock_prices,
            };
            let Some(outcome) = self.evaluate_signal(source, signal).await else {
                continue;
            };

            let Some(id) = signal.id else {
                continue;
            };
            self.store.update_signal_outcome(id, &outcome).await?;
            summary.checked += 1;
            if let Some(correct) = outcome.correct {
                summary.evaluated += 1;
                if correct {
                    summary.correct += 1;
                }
            }
        }

        summary.accuracy = if summary.evaluated > 0 {
            summary.correct as f64 / summary.evaluated as f64
        } else {
            0.0
        };

        tracing::info!(
            "accuracy check: {} written, {}/{} correct",
            summary.checked,
            summary.correct,
            summary.evaluated
        );
        Ok(summary)
    }

    /// History-derived factor weights, cached for an hour so repeated
    /// signal calls avoid a full table scan.
    pub async fn adaptive_weights(
        &self,
        cache: &MemoryCache,
        priors: &FactorWeights,
    ) -> Result<FactorWeights, SignalError> {
        let store = self.store.clone();
        let priors = *priors;
        cache
            .get_or_compute("adaptive_weights", "global", 60, || async move {
                let history = store.evaluated_directional_signals().await?;
                Ok(compute_adaptive_weights(&history, &priors, 30))
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use fusion_core::{Bar, Quote, SignalKind};

    /// Price source replaying a fixed daily series ending today
    struct FixedPrices {
        closes: Vec<f64>,
    }

    #[async_trait]
    impl PriceSource for FixedPrices {
        async fn fetch(&self, _symbol: &str, _days: i64) -> Result<Vec<Bar>, SignalError> {
            // Daily series ending today
            let start = Utc::now() - Duration::days(self.closes.len() as i64 - 1);
            Ok(self
                .closes
                .iter()
                .enumerate()
                .map(|(i, &c)| Bar {
                    timestamp: start + Duration::days(i as i64),
                    open: c,
                    high: c,
                    low: c,
                    close: c,
                    volume: 1000.0,
                })
                .collect())
        }

        async fn quote(&self, _symbol: &str) -> Result<Quote, SignalError> {
            Err(SignalError::NoData("not used".to_string()))
        }
    }

    /// Source that always fails, leaving signals pending
    struct DeadSource;

    #[async_trait]
    impl PriceSource for DeadSource {
        async fn fetch(&self, _symbol: &str, _days: i64) -> Result<Vec<Bar>, SignalError> {
            Err(SignalError::NoData("delisted".to_string()))
        }
        async fn quote(&self, _symbol: &str) -> Result<Quote, SignalError> {
            Err(SignalError::NoData("delisted".to_string()))
        }
    }

    fn aged_signal(symbol: &str, direction: Direction, age_days: i64) -> SignalRecord {
        SignalRecord {
            id: None,
            symbol: symbol.to_string(),
            kind: SignalKind::Scheduled,
            direction,
            strength: 0.5,
            confidence: 0.7,
            technical_score: 0.4,
            sentiment_score: 0.1,
            ml_score: 0.3,
            macro_score: 0.0,
            macro_regime: None,
            created_at: Utc::now() - Duration::days(age_days),
            outcome_return_5d: None,
            outcome_return_10d: None,
            outcome_correct: None,
            outcome_checked_at: None,
        }
    }

    #[tokio::test]
    async fn unavailable_data_leaves_signal_pending() {
        let store = MarketStore::connect("sqlite::memory:").await.unwrap();
        store
            .save_signal(&aged_signal("GONE", Direction::Buy, 10))
            .await
            .unwrap();

        let tracker = AccuracyTracker::new(store.clone());
        let summary = tracker
            .run_accuracy_check(&DeadSource, &DeadSource)
            .await
            .unwrap();
        assert_eq!(summary.checked, 0);

        // Still pending: the next pass will retry it
        let unchecked = store.unchecked_signals(5, 100).await.unwrap();
        assert_eq!(unchecked.len(), 1);
    }

    #[tokio::test]
    async fn young_signals_are_not_judged() {
        let store = MarketStore::connect("sqlite::memory:").await.unwrap();
        store
            .save_signal(&aged_signal("AAPL", Direction::Buy, 1))
            .await
            .unwrap();

        let tracker = AccuracyTracker::new(store.clone());
        let rising = FixedPrices {
            closes: (0..40).map(|i| 100.0 + i as f64).collect(),
        };
        let summary = tracker.run_accuracy_check(&rising, &rising).await.unwrap();
        assert_eq!(summary.checked, 0);
    }

    #[tokio::test]
    async fn buy_into_rising_market_is_correct() {
        let store = MarketStore::connect("sqlite::memory:").await.unwrap();
        store
            .save_signal(&aged_signal("AAPL", Direction::Buy, 10))
            .await
            .unwrap();

        let tracker = AccuracyTracker::new(store.clone());
        // Steadily rising series spanning well past the signal date
        let rising = FixedPrices {
            closes: (0..400).map(|i| 100.0 + i as f64 * 0.5).collect(),
        };
        let summary = tracker.run_accuracy_check(&rising, &rising).await.unwrap();

        assert_eq!(summary.checked, 1);
        assert_eq!(summary.evaluated, 1);
        assert_eq!(summary.correct, 1);
        assert!((summary.accuracy - 1.0).abs() < 1e-9);

        let evaluated = store.evaluated_signals().await.unwrap();
        assert_eq!(evaluated.len(), 1);
        assert!(evaluated[0].outcome_return_5d.unwrap() > 0.0);
        assert_eq!(evaluated[0].outcome_correct, Some(true));
    }

    #[tokio::test]
    async fn sell_into_rising_market_is_wrong() {
        let store = MarketStore::connect("sqlite::memory:").await.unwrap();
        store
            .save_signal(&aged_signal("AAPL", Direction::Sell, 10))
            .await
            .unwrap();

        let tracker = AccuracyTracker::new(store.clone());
        let rising = FixedPrices {
            closes: (0..400).map(|i| 100.0 + i as f64 * 0.5).collect(),
        };
        let summary = tracker.run_accuracy_check(&rising, &rising).await.unwrap();
        assert_eq!(summary.evaluated, 1);
        assert_eq!(summary.correct, 0);
    }
}
