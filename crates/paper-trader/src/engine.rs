//! Paper-trading engine: executes live signals against a virtual
//! portfolio. Cash accounting is strict: cash is always the initial
//! capital minus the cost basis of open positions, and at most one open
//! position exists per symbol.

use std::collections::HashMap;

use chrono::Utc;
use fusion_core::{BaseThresholds, Direction, SignalError, StopLossConfig};
use serde::{Deserialize, Serialize};

use crate::store::{PaperStore, PaperTradeRecord, TradeAction};

/// Action the engine took for a processed signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaperAction {
    Buy,
    Sell,
}

/// A position closed by the stop handler during a tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoppedPosition {
    pub symbol: String,
    pub close_price: f64,
    pub pnl: f64,
    pub effective_stop: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionView {
    pub symbol: String,
    pub entry_price: f64,
    pub current_price: f64,
    pub quantity: f64,
    pub unrealized_pnl: f64,
    pub pct_change: f64,
    pub stop_loss: Option<f64>,
    pub dist_to_stop_pct: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub initial_capital: f64,
    pub total_value: f64,
    pub cash: f64,
    pub invested: f64,
    pub unrealized_pnl: f64,
    pub realized_pnl: f64,
    pub total_return: f64,
    pub n_positions: usize,
    pub positions: Vec<PositionView>,
}

pub struct PaperTrader<S: PaperStore> {
    store: S,
    initial_capital: f64,
    position_size_pct: f64,
    commission: f64,
    thresholds: BaseThresholds,
    stops: StopLossConfig,
}

impl<S: PaperStore> PaperTrader<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            initial_capital: 100_000.0,
            position_size_pct: 0.10,
            commission: 0.001,
            thresholds: BaseThresholds::default(),
            stops: StopLossConfig::default(),
        }
    }

    pub fn with_capital(mut self, initial_capital: f64) -> Self {
        self.initial_capital = initial_capital;
        self
    }

    pub fn with_position_size_pct(mut self, pct: f64) -> Self {
        self.position_size_pct = pct;
        self
    }

    pub fn with_stops(mut self, stops: StopLossConfig) -> Self {
        self.stops = stops;
        self
    }

    pub fn with_thresholds(mut self, thresholds: BaseThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Open or close a virtual position from a fused signal.
    ///
    /// Returns the action taken, or None when the signal did not clear
    /// the bar (weak signal, existing position, or insufficient cash).
    /// A rejected BUY leaves no side effects.
    pub async fn process_signal(
        &self,
        symbol: &str,
        direction: Direction,
        strength: f64,
        confidence: f64,
        current_price: f64,
        atr: Option<f64>,
    ) -> Result<Option<PaperAction>, SignalError> {
        if current_price <= 0.0 {
            return Err(SignalError::BadInput(format!(
                "non-positive price {current_price} for {symbol}"
            )));
        }

        let open_positions = self.store.open_positions().await?;
        let existing = open_positions.iter().find(|p| p.symbol == symbol);

        match direction {
            Direction::Buy
                if strength >= self.thresholds.buy_threshold
                    && confidence >= self.thresholds.buy_confidence_min
                    && existing.is_none() =>
            {
                let portfolio_value = self.portfolio_value_internal(&open_positions, None);
                let position_value = portfolio_value * self.position_size_pct;
                let quantity = position_value / current_price;

                let cost = quantity * current_price * (1.0 + self.commission);
                let cash = self.available_cash(&open_positions);
                if cost > cash {
                    tracing::info!(
                        "paper BUY skipped for {}: insufficient cash ({:.0} < {:.0})",
                        symbol,
                        cash,
                        cost
                    );
                    return Ok(None);
                }

                let stop = match atr.filter(|a| *a > 0.0) {
                    Some(atr) => current_price - self.stops.atr_multiplier * atr,
                    None => current_price * (1.0 - self.stops.percentage),
                };
                let trailing = current_price * (1.0 - self.stops.trailing);

                self.store
                    .open_position_logged(
                        symbol,
                        current_price,
                        quantity,
                        Some(stop),
                        trailing,
                        &PaperTradeRecord {
                            symbol: symbol.to_string(),
                            action: TradeAction::Buy,
                            price: current_price,
                            quantity,
                            pnl: 0.0,
                            reason: format!("Signal BUY (str={strength:.2} conf={confidence:.2})"),
                            executed_at: Utc::now(),
                        },
                    )
                    .await?;
                tracing::info!(
                    "paper BUY {} @ {:.4} qty={:.4} stop={:.4}",
                    symbol,
                    current_price,
                    quantity,
                    stop
                );
                Ok(Some(PaperAction::Buy))
            }
            Direction::Sell => {
                let Some(pos) = existing else {
                    return Ok(None);
                };
                if pos.quantity < 0.0 {
                    return Err(SignalError::InvariantViolation(format!(
                        "open position for {} has negative quantity {}",
                        symbol, pos.quantity
                    )));
                }
                let pnl = (current_price - pos.entry_price) * pos.quantity
                    - pos.quantity * current_price * self.commission;
                self.store
                    .close_position_logged(
                        pos.id,
                        current_price,
                        pnl,
                        &PaperTradeRecord {
                            symbol: symbol.to_string(),
                            action: TradeAction::Sell,
                            price: current_price,
                            quantity: pos.quantity,
                            pnl,
                            reason: format!("Signal SELL (str={strength:.2})"),
                            executed_at: Utc::now(),
                        },
                    )
                    .await?;
                tracing::info!("paper SELL {} @ {:.4} pnl={:.2}", symbol, current_price, pnl);
                Ok(Some(PaperAction::Sell))
            }
            _ => Ok(None),
        }
    }

    /// Per-scan tick: lift trailing stops on new highs, then close any
    /// position whose price is at or below its effective stop.
    pub async fn update_positions(
        &self,
        current_prices: &HashMap<String, f64>,
    ) -> Result<Vec<StoppedPosition>, SignalError> {
        let mut stopped = Vec::new();

        for pos in self.store.open_positions().await? {
            let Some(&price) = current_prices.get(&pos.symbol) else {
                continue;
            };

            // Trailing stop only ever rises
            let mut highest = pos.highest_price.max(pos.entry_price);
            let mut trailing = pos.trailing_stop.unwrap_or(0.0);
            if price > highest {
                highest = price;
                trailing = price * (1.0 - self.stops.trailing);
                self.store
                    .update_position_stops(pos.id, highest, trailing)
                    .await?;
            }

            let effective_stop = pos.stop_loss.unwrap_or(0.0).max(trailing);
            if effective_stop > 0.0 && price <= effective_stop {
                let pnl = (price - pos.entry_price) * pos.quantity
                    - pos.quantity * price * self.commission;
                self.store
                    .close_position_logged(
                        pos.id,
                        price,
                        pnl,
                        &PaperTradeRecord {
                            symbol: pos.symbol.clone(),
                            action: TradeAction::Stop,
                            price,
                            quantity: pos.quantity,
                            pnl,
                            reason: format!("Stop-loss triggered @ {effective_stop:.4}"),
                            executed_at: Utc::now(),
                        },
                    )
                    .await?;
                tracing::info!(
                    "paper STOP {} @ {:.4} stop={:.4} pnl={:.2}",
                    pos.symbol,
                    price,
                    effective_stop,
                    pnl
                );
                stopped.push(StoppedPosition {
                    symbol: pos.symbol,
                    close_price: price,
                    pnl,
                    effective_stop,
                });
            }
        }

        Ok(stopped)
    }

    /// Snapshot of the virtual portfolio, marked to the given prices
    /// (entry prices when a symbol has no quote).
    pub async fn portfolio_summary(
        &self,
        current_prices: &HashMap<String, f64>,
    ) -> Result<PortfolioSummary, SignalError> {
        let open_positions = self.store.open_positions().await?;
        let all_trades = self.store.trades(500).await?;

        let invested_cost: f64 = open_positions
            .iter()
            .map(|p| p.entry_price * p.quantity)
            .sum();
        let cash = (self.initial_capital - invested_cost).max(0.0);

        let mut invested_value = 0.0;
        let mut unrealized_pnl = 0.0;
        let mut views = Vec::with_capacity(open_positions.len());
        for pos in &open_positions {
            let price = current_prices
                .get(&pos.symbol)
                .copied()
                .unwrap_or(pos.entry_price);
            let value = pos.quantity * price;
            let upnl = (price - pos.entry_price) * pos.quantity;
            invested_value += value;
            unrealized_pnl += upnl;

            let pct = if pos.entry_price > 0.0 {
                (price / pos.entry_price - 1.0) * 100.0
            } else {
                0.0
            };
            let stop = pos.stop_loss.unwrap_or(0.0).max(pos.trailing_stop.unwrap_or(0.0));
            let dist = if stop > 0.0 && price > 0.0 {
                Some((price - stop) / price * 100.0)
            } else {
                None
            };
            views.push(PositionView {
                symbol: pos.symbol.clone(),
                entry_price: pos.entry_price,
                current_price: price,
                quantity: pos.quantity,
                unrealized_pnl: upnl,
                pct_change: pct,
                stop_loss: if stop > 0.0 { Some(stop) } else { None },
                dist_to_stop_pct: dist,
            });
        }

        let realized_pnl: f64 = all_trades
            .iter()
            .filter(|t| matches!(t.action, TradeAction::Sell | TradeAction::Stop))
            .map(|t| t.pnl)
            .sum();

        let total_value = cash + invested_value;
        let total_return = (total_value - self.initial_capital) / self.initial_capital;

        Ok(PortfolioSummary {
            initial_capital: self.initial_capital,
            total_value,
            cash,
            invested: invested_value,
            unrealized_pnl,
            realized_pnl,
            total_return,
            n_positions: open_positions.len(),
            positions: views,
        })
    }

    /// Wipe all positions and trades
    pub async fn reset(&self) -> Result<(), SignalError> {
        self.store.reset().await?;
        tracing::info!(
            "paper portfolio reset to initial capital {:.0}",
            self.initial_capital
        );
        Ok(())
    }

    fn available_cash(&self, open_positions: &[crate::store::PaperPosition]) -> f64 {
        let invested_cost: f64 = open_positions
            .iter()
            .map(|p| p.entry_price * p.quantity)
            .sum();
        (self.initial_capital - invested_cost).max(0.0)
    }

    fn portfolio_value_internal(
        &self,
        open_positions: &[crate::store::PaperPosition],
        prices: Option<&HashMap<String, f64>>,
    ) -> f64 {
        let cash = self.available_cash(open_positions);
        let invested: f64 = open_positions
            .iter()
            .map(|p| {
                let price = prices
                    .and_then(|m| m.get(&p.symbol))
                    .copied()
                    .unwrap_or(p.entry_price);
                p.quantity * price
            })
            .sum();
        cash + invested
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryPaperStore, PositionStatus};

    fn trader() -> PaperTrader<MemoryPaperStore> {
        PaperTrader::new(MemoryPaperStore::new())
    }

    fn prices(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(s, p)| (s.to_string(), *p)).collect()
    }

    #[tokio::test]
    async fn buy_opens_one_position() {
        let t = trader();
        let action = t
            .process_signal("AAPL", Direction::Buy, 0.6, 0.8, 100.0, Some(2.0))
            .await
            .unwrap();
        assert_eq!(action, Some(PaperAction::Buy));

        let open = t.store().open_positions().await.unwrap();
        assert_eq!(open.len(), 1);
        // 10% of 100k at $100
        assert!((open[0].quantity - 100.0).abs() < 1e-9);
        assert!((open[0].stop_loss.unwrap() - 96.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn duplicate_buy_is_rejected() {
        let t = trader();
        t.process_signal("AAPL", Direction::Buy, 0.6, 0.8, 100.0, None)
            .await
            .unwrap();
        let action = t
            .process_signal("AAPL", Direction::Buy, 0.9, 0.9, 101.0, None)
            .await
            .unwrap();
        assert_eq!(action, None);
        assert_eq!(t.store().open_positions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn weak_signal_is_ignored() {
        let t = trader();
        // Below the 0.30 strength bar
        let action = t
            .process_signal("AAPL", Direction::Buy, 0.2, 0.9, 100.0, None)
            .await
            .unwrap();
        assert_eq!(action, None);
        // Below the 0.65 confidence bar
        let action = t
            .process_signal("AAPL", Direction::Buy, 0.6, 0.5, 100.0, None)
            .await
            .unwrap();
        assert_eq!(action, None);
        assert!(t.store().open_positions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sell_books_realized_pnl() {
        let t = trader();
        t.process_signal("AAPL", Direction::Buy, 0.6, 0.8, 100.0, None)
            .await
            .unwrap();
        let action = t
            .process_signal("AAPL", Direction::Sell, -0.5, 0.7, 110.0, None)
            .await
            .unwrap();
        assert_eq!(action, Some(PaperAction::Sell));

        let summary = t.portfolio_summary(&HashMap::new()).await.unwrap();
        assert_eq!(summary.n_positions, 0);
        // (110 - 100) * 100 - 0.001 * 100 * 110 = 1000 - 11
        assert!((summary.realized_pnl - 989.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn sell_without_position_is_noop() {
        let t = trader();
        let action = t
            .process_signal("AAPL", Direction::Sell, -0.5, 0.7, 100.0, None)
            .await
            .unwrap();
        assert_eq!(action, None);
    }

    // Scenario: BUY at 100 with ATR 4 (stop 92) and 5% trailing; ticks
    // 100, 110, 108, 104, 103. The 110 tick lifts the trailing stop to
    // 104.5, so the 104 tick closes the position.
    #[tokio::test]
    async fn trailing_stop_follows_highs_then_fires() {
        let t = trader().with_stops(StopLossConfig {
            atr_multiplier: 2.0,
            percentage: 0.05,
            trailing: 0.05,
        });
        t.process_signal("AAPL", Direction::Buy, 0.6, 0.8, 100.0, Some(4.0))
            .await
            .unwrap();

        let open = &t.store().open_positions().await.unwrap()[0];
        assert!((open.stop_loss.unwrap() - 92.0).abs() < 1e-9);
        let quantity = open.quantity;

        for (tick, expect_closed) in [(100.0, false), (110.0, false), (108.0, false)] {
            let stopped = t.update_positions(&prices(&[("AAPL", tick)])).await.unwrap();
            assert_eq!(!stopped.is_empty(), expect_closed, "tick {tick}");
        }

        // After the 110 tick the trailing stop sits at 104.5
        let open = &t.store().open_positions().await.unwrap()[0];
        assert!((open.highest_price - 110.0).abs() < 1e-9);
        assert!((open.trailing_stop.unwrap() - 104.5).abs() < 1e-9);

        let stopped = t.update_positions(&prices(&[("AAPL", 104.0)])).await.unwrap();
        assert_eq!(stopped.len(), 1);
        assert!((stopped[0].effective_stop - 104.5).abs() < 1e-9);
        assert!((stopped[0].close_price - 104.0).abs() < 1e-9);
        let expected_pnl = (104.0 - 100.0) * quantity - quantity * 104.0 * 0.001;
        assert!((stopped[0].pnl - expected_pnl).abs() < 1e-6);

        // Position is closed; a later tick does nothing
        let stopped = t.update_positions(&prices(&[("AAPL", 103.0)])).await.unwrap();
        assert!(stopped.is_empty());
        assert!(t.store().open_positions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn highest_price_is_running_max_of_ticks() {
        let t = trader();
        t.process_signal("AAPL", Direction::Buy, 0.6, 0.8, 100.0, Some(10.0))
            .await
            .unwrap();

        let ticks = [101.0, 105.0, 103.0, 107.0, 102.0];
        let mut running_max: f64 = 100.0;
        for tick in ticks {
            t.update_positions(&prices(&[("AAPL", tick)])).await.unwrap();
            running_max = running_max.max(tick);
            let open = &t.store().open_positions().await.unwrap()[0];
            assert!((open.highest_price - running_max).abs() < 1e-9, "tick {tick}");
        }
    }

    #[tokio::test]
    async fn cash_plus_open_cost_equals_initial() {
        let t = trader();
        t.process_signal("AAPL", Direction::Buy, 0.6, 0.8, 100.0, None)
            .await
            .unwrap();
        t.process_signal("MSFT", Direction::Buy, 0.6, 0.8, 200.0, None)
            .await
            .unwrap();

        let summary = t
            .portfolio_summary(&prices(&[("AAPL", 120.0), ("MSFT", 180.0)]))
            .await
            .unwrap();
        let open = t.store().open_positions().await.unwrap();
        let open_cost: f64 = open.iter().map(|p| p.entry_price * p.quantity).sum();
        assert!((summary.cash + open_cost - 100_000.0).abs() < 1e-6);
        assert_eq!(summary.n_positions, 2);
    }

    #[tokio::test]
    async fn insufficient_cash_has_no_side_effects() {
        // Tiny portfolio sized so the second buy cannot be funded
        let t = PaperTrader::new(MemoryPaperStore::new())
            .with_capital(1_000.0)
            .with_position_size_pct(0.95);
        t.process_signal("AAPL", Direction::Buy, 0.6, 0.8, 100.0, None)
            .await
            .unwrap();
        let action = t
            .process_signal("MSFT", Direction::Buy, 0.6, 0.8, 100.0, None)
            .await
            .unwrap();
        assert_eq!(action, None);

        let open = t.store().open_positions().await.unwrap();
        assert_eq!(open.len(), 1);
        let trades = t.store().trades(10).await.unwrap();
        assert_eq!(trades.len(), 1);
    }

    #[tokio::test]
    async fn summary_reports_distance_to_stop() {
        let t = trader();
        t.process_signal("AAPL", Direction::Buy, 0.6, 0.8, 100.0, Some(2.0))
            .await
            .unwrap();

        let summary = t.portfolio_summary(&prices(&[("AAPL", 104.0)])).await.unwrap();
        let view = &summary.positions[0];
        // Stop 96 vs price 104: (104 - 96) / 104
        assert!((view.dist_to_stop_pct.unwrap() - 8.0 / 104.0 * 100.0).abs() < 1e-6);
        assert!((view.pct_change - 4.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn reset_wipes_everything() {
        let t = trader();
        t.process_signal("AAPL", Direction::Buy, 0.6, 0.8, 100.0, None)
            .await
            .unwrap();
        t.reset().await.unwrap();
        assert!(t.store().open_positions().await.unwrap().is_empty());
        assert!(t.store().trades(10).await.unwrap().is_empty());
        assert!(t.store().all_positions().is_empty());
    }

    #[tokio::test]
    async fn closed_position_retains_close_fields() {
        let t = trader();
        t.process_signal("AAPL", Direction::Buy, 0.6, 0.8, 100.0, None)
            .await
            .unwrap();
        t.process_signal("AAPL", Direction::Sell, -0.5, 0.7, 95.0, None)
            .await
            .unwrap();

        let all = t.store().all_positions();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, PositionStatus::Closed);
        assert!(all[0].close_price.is_some());
        assert!(all[0].realized_pnl.unwrap() < 0.0);
        assert!(all[0].closed_at.is_some());
    }
}
