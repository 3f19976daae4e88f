//! Best-effort webhook notifier. A missing URL or failed delivery is
//! logged and swallowed; notifications never block or fail a scan.

use async_trait::async_trait;
use fusion_core::Notifier;
use signal_fusion::FusedSignal;
use std::time::Duration;

pub struct WebhookNotifier {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

impl WebhookNotifier {
    pub fn new(webhook_url: Option<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            webhook_url,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, message: &str) {
        let Some(url) = &self.webhook_url else {
            tracing::debug!("no webhook configured, dropping notification");
            return;
        };
        let payload = serde_json::json!({ "content": message });
        match self.client.post(url).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => {
                tracing::warn!("webhook returned {}", resp.status());
            }
            Err(e) => {
                tracing::warn!("webhook delivery failed: {}", e);
            }
        }
    }
}

/// Format a directional signal for the notification channel.
pub fn format_signal_message(symbol: &str, signal: &FusedSignal) -> String {
    format!(
        "**{} {}**\n\
         Strength: {:+.3}\n\
         Confidence: {:.0}%\n\
         Risk Level: {}\n\
         Factors: tech {:+.3} / sent {:+.3} / ml {:+.3} / macro {:+.3}",
        symbol,
        signal.direction.as_str(),
        signal.strength,
        signal.confidence * 100.0,
        signal.risk_level.as_str(),
        signal.technical_score,
        signal.sentiment_score,
        signal.ml_score,
        signal.macro_score,
    )
}

/// One-shot end-of-scan summary.
pub fn format_daily_summary(signals: &[FusedSignal]) -> String {
    use fusion_core::Direction;

    let buys = signals.iter().filter(|s| s.direction == Direction::Buy).count();
    let sells = signals.iter().filter(|s| s.direction == Direction::Sell).count();
    let holds = signals.len() - buys - sells;

    let mut message = format!(
        "**Scan complete** - {} symbols: {} BUY / {} SELL / {} HOLD",
        signals.len(),
        buys,
        sells,
        holds
    );

    for signal in signals.iter().filter(|s| s.direction != Direction::Hold) {
        if let Some(symbol) = &signal.symbol {
            message.push_str(&format!(
                "\n  {} {} (str {:+.2}, conf {:.0}%)",
                symbol,
                signal.direction.as_str(),
                signal.strength,
                signal.confidence * 100.0
            ));
        }
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use fusion_core::{BaseThresholds, FactorScore, FactorWeights};
    use signal_fusion::{combine_signals, FactorInputs};

    fn fused(symbol: &str, t: f64, s: f64, m: f64) -> FusedSignal {
        let inputs = FactorInputs {
            technical: FactorScore::new(t, 0.9),
            sentiment: FactorScore::new(s, 0.8),
            ml: FactorScore::new(m, 0.85),
            ..Default::default()
        };
        let mut sig = combine_signals(
            &inputs,
            &FactorWeights::default(),
            &BaseThresholds::default(),
        );
        sig.symbol = Some(symbol.to_string());
        sig
    }

    #[test]
    fn signal_message_names_symbol_and_direction() {
        let sig = fused("AAPL", 0.8, 0.6, 0.7);
        let message = format_signal_message("AAPL", &sig);
        assert!(message.contains("AAPL BUY"));
        assert!(message.contains("Confidence"));
    }

    #[test]
    fn summary_counts_directions() {
        let signals = vec![
            fused("AAPL", 0.8, 0.6, 0.7),
            fused("MSFT", 0.0, 0.0, 0.0),
            fused("TSLA", -0.9, -0.7, -0.8),
        ];
        let summary = format_daily_summary(&signals);
        assert!(summary.contains("1 BUY / 1 SELL / 1 HOLD"));
        assert!(summary.contains("AAPL BUY"));
        assert!(summary.contains("TSLA SELL"));
    }

    #[tokio::test]
    async fn missing_webhook_is_silent() {
        let notifier = WebhookNotifier::new(None).unwrap();
        // Must not panic or error
        notifier.send("hello").await;
    }
}
