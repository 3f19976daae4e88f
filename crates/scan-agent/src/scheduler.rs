//! Scan scheduler: Idle -> Running -> Stopping -> Idle.
//!
//! `start` is idempotent and `stop` is cooperative: a watch channel
//! wakes the sleep between scans and is observed between symbols inside
//! a scan, so shutdown never interrupts an in-flight indicator.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use accuracy_tracker::AccuracyTracker;
use fusion_core::{
    AssetClass, BaseThresholds, FactorWeights, Notifier, RiskLimits, SignalError, SignalKind,
    SignalRecord, StopLossConfig,
};
use fusion_core::{Direction, MacroRegime};
use market_store::SqlitePaperStore;
use risk_manager::{check_drawdown, generate_action_plan};
use paper_trader::PaperTrader;
use signal_fusion::FusedSignal;
use tokio::sync::{watch, Mutex, Semaphore};
use tokio::task::JoinSet;

use crate::notifier::{format_daily_summary, format_signal_message};
use crate::pipeline::{fetch_global_signals, process_symbol, ScanContext, SymbolScan};

enum RunState {
    Idle,
    Running {
        stop_tx: watch::Sender<bool>,
        handle: tokio::task::JoinHandle<()>,
    },
}

pub struct Scheduler {
    ctx: Arc<ScanContext>,
    paper: Arc<PaperTrader<SqlitePaperStore>>,
    tracker: Arc<AccuracyTracker>,
    notifier: Arc<dyn Notifier>,
    max_concurrent: usize,
    state: Mutex<RunState>,
}

impl Scheduler {
    pub fn new(
        ctx: Arc<ScanContext>,
        paper: Arc<PaperTrader<SqlitePaperStore>>,
        tracker: Arc<AccuracyTracker>,
        notifier: Arc<dyn Notifier>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            ctx,
            paper,
            tracker,
            notifier,
            max_concurrent: max_concurrent.clamp(1, 8),
            state: Mutex::new(RunState::Idle),
        }
    }

    pub async fn is_running(&self) -> bool {
        matches!(*self.state.lock().await, RunState::Running { .. })
    }

    /// Start the background scan loop. A no-op when already running.
    pub async fn start(self: &Arc<Self>, interval: Duration) {
        let mut state = self.state.lock().await;
        if matches!(*state, RunState::Running { .. }) {
            tracing::info!("scheduler already running");
            return;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut stop_rx = stop_rx;
            loop {
                tracing::info!("scheduler: starting scan");
                match scheduler.run_scan(Some(stop_rx.clone())).await {
                    Ok(signals) => {
                        tracing::info!("scan complete: {} signals generated", signals.len())
                    }
                    Err(e) => tracing::error!("scan failed: {}", e),
                }

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = stop_rx.changed() => {
                        tracing::info!("scheduler: stop observed");
                        break;
                    }
                }
            }
        });

        *state = RunState::Running { stop_tx, handle };
        tracing::info!("scheduler started (interval: {:?})", interval);
    }

    /// Cooperative stop: wakes the sleeping loop and waits for the
    /// current scan to finish its in-flight symbol.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        if let RunState::Running { stop_tx, handle } =
            std::mem::replace(&mut *state, RunState::Idle)
        {
            let _ = stop_tx.send(true);
            if let Err(e) = handle.await {
                tracing::warn!("scheduler task join failed: {}", e);
            }
            tracing::info!("scheduler stopped");
        }
    }

    /// Run a single scan immediately (blocking the caller).
    pub async fn run_scan_now(&self) -> Result<Vec<FusedSignal>, SignalError> {
        self.run_scan(None).await
    }

    async fn run_scan(
        &self,
        stop_rx: Option<watch::Receiver<bool>>,
    ) -> Result<Vec<FusedSignal>, SignalError> {
        let stopped = || stop_rx.as_ref().map(|rx| *rx.borrow()).unwrap_or(false);

        // 1. Judge aged signals before producing new ones
        if let Err(e) = self
            .tracker
            .run_accuracy_check(
                self.ctx.stock_prices.as_ref(),
                self.ctx.crypto_prices.as_ref(),
            )
            .await
        {
            tracing::warn!("accuracy check failed: {}", e);
        }

        // 2. Global signals, shared by every symbol via the TTL cache
        let globals = Arc::new(fetch_global_signals(&self.ctx).await);

        // 3. Run-time configuration
        let store = &self.ctx.store;
        let stocks: Vec<String> = store
            .setting(
                "watchlist_stocks",
                fusion_core::DEFAULT_WATCHLIST_STOCKS
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            )
            .await?;
        let cryptos: Vec<String> = store
            .setting(
                "watchlist_crypto",
                fusion_core::DEFAULT_WATCHLIST_CRYPTO
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            )
            .await?;

        let priors: FactorWeights = store
            .setting("signal_weights", FactorWeights::default())
            .await?;
        let weights = self
            .tracker
            .adaptive_weights(&self.ctx.cache, &priors)
            .await
            .unwrap_or(priors);

        let limits: RiskLimits = store.setting("risk", RiskLimits::default()).await?;
        let stops: StopLossConfig = store.setting("stop_loss", StopLossConfig::default()).await?;

        let defaults = BaseThresholds::default();
        let base = BaseThresholds {
            buy_threshold: store.setting("buy_threshold", defaults.buy_threshold).await?,
            buy_confidence_min: store
                .setting("buy_confidence_min", defaults.buy_confidence_min)
                .await?,
            sell_threshold: store
                .setting("sell_threshold", defaults.sell_threshold)
                .await?,
            sell_confidence_min: store
                .setting("sell_confidence_min", defaults.sell_confidence_min)
                .await?,
        };

        // 4. Bounded per-symbol fan-out; stop is observed between
        // symbols, never inside one
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks: JoinSet<(String, Result<SymbolScan, SignalError>)> = JoinSet::new();

        for symbol in stocks.iter().chain(cryptos.iter()) {
            if stopped() {
                tracing::info!("scan cancelled before {}", symbol);
                break;
            }
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| SignalError::InvariantViolation(e.to_string()))?;
            let ctx = Arc::clone(&self.ctx);
            let globals = Arc::clone(&globals);
            let symbol = symbol.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let result = process_symbol(&ctx, &symbol, &globals, &weights, &base).await;
                (symbol, result)
            });
        }

        // 5. Persist, notify, and tick the paper engine as results land
        let mut fused_signals = Vec::new();
        let mut price_map: HashMap<String, f64> = HashMap::new();

        while let Some(joined) = tasks.join_next().await {
            let (symbol, result) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::error!("symbol task panicked: {}", e);
                    continue;
                }
            };
            let scan = match result {
                Ok(scan) => scan,
                Err(e) => {
                    tracing::warn!("scan failed for {}: {}", symbol, e);
                    continue;
                }
            };

            if let Err(e) = store.save_signal(&to_record(&symbol, &scan.fused)).await {
                tracing::error!("failed to persist signal for {}: {}", symbol, e);
                continue;
            }

            if scan.fused.direction != Direction::Hold {
                let mut message = format_signal_message(&symbol, &scan.fused);

                // Risk-gated action plan against the paper portfolio;
                // a blocked plan is reported, never masked as HOLD
                if let Some(price) = scan.current_price {
                    match self.paper.portfolio_summary(&price_map).await {
                        Ok(summary) => {
                            let equity_curve = [summary.initial_capital, summary.total_value];
                            let dd = check_drawdown(&equity_curve, &limits);
                            if let Some(alert) = &dd.alert {
                                if let Err(e) = store.add_risk_alert(alert).await {
                                    tracing::warn!("failed to persist risk alert: {}", e);
                                }
                            }
                            let plan = generate_action_plan(
                                scan.fused.direction,
                                price,
                                scan.atr,
                                summary.total_value,
                                summary.cash,
                                AssetClass::of_symbol(&symbol),
                                &equity_curve,
                                &limits,
                                &stops,
                            );
                            if plan.blocked {
                                message.push_str(&format!(
                                    "\nBLOCKED: {}",
                                    plan.blocked_reason.as_deref().unwrap_or("risk gate")
                                ));
                            } else if plan.shares > 0.0 {
                                message.push_str(&format!(
                                    "\nPlan: {:.4} units @ {:.2}, stop {:.2}, target {:.2}",
                                    plan.shares,
                                    plan.entry_price,
                                    plan.stop_loss,
                                    plan.target_price.unwrap_or(0.0)
                                ));
                            }
                        }
                        Err(e) => tracing::warn!("portfolio summary failed: {}", e),
                    }
                }

                self.notifier.send(&message).await;
            }

            if let Some(price) = scan.current_price {
                price_map.insert(symbol.clone(), price);
                if let Err(e) = self
                    .paper
                    .process_signal(
                        &symbol,
                        scan.fused.direction,
                        scan.fused.strength,
                        scan.fused.confidence,
                        price,
                        scan.atr,
                    )
                    .await
                {
                    tracing::warn!("paper engine rejected {}: {}", symbol, e);
                }
            }

            tracing::info!(
                "scheduled signal for {}: {}",
                symbol,
                scan.fused.direction.as_str()
            );
            fused_signals.push(scan.fused);
        }

        // 6. One stop-maintenance tick per scan over every open position
        if let Err(e) = self.paper.update_positions(&price_map).await {
            tracing::warn!("paper stop maintenance failed: {}", e);
        }

        // 7. Daily summary after all symbol work is done
        self.notifier.send(&format_daily_summary(&fused_signals)).await;

        Ok(fused_signals)
    }
}

fn to_record(symbol: &str, fused: &FusedSignal) -> SignalRecord {
    SignalRecord {
        id: None,
        symbol: symbol.to_string(),
        kind: SignalKind::Scheduled,
        direction: fused.direction,
        strength: fused.strength,
        confidence: fused.confidence,
        technical_score: fused.technical_score,
        sentiment_score: fused.sentiment_score,
        ml_score: fused.ml_score,
        macro_score: fused.macro_score,
        macro_regime: if fused.macro_regime == MacroRegime::Unknown {
            None
        } else {
            Some(fused.macro_regime.as_str().to_string())
        },
        created_at: chrono::Utc::now(),
        outcome_return_5d: None,
        outcome_return_10d: None,
        outcome_correct: None,
        outcome_checked_at: None,
    }
}
