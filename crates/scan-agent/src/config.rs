use anyhow::{Context, Result};

/// Bootstrap configuration from the environment. Run-time tunables
/// (weights, thresholds, watchlists) live in the settings table.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub database_url: String,
    pub webhook_url: Option<String>,
    pub scan_interval_seconds: u64,
    /// Bounded fan-out degree for per-symbol work
    pub max_concurrent_symbols: usize,
    pub initial_paper_capital: f64,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:signals.db".to_string());

        let webhook_url = std::env::var("NOTIFY_WEBHOOK_URL").ok().filter(|u| !u.is_empty());

        let scan_interval_seconds = std::env::var("SCAN_INTERVAL_SECONDS")
            .ok()
            .map(|v| v.parse::<u64>())
            .transpose()
            .context("SCAN_INTERVAL_SECONDS must be an integer")?
            .unwrap_or(3600);
        if scan_interval_seconds < 60 {
            anyhow::bail!("SCAN_INTERVAL_SECONDS must be at least 60");
        }

        let max_concurrent_symbols = std::env::var("MAX_CONCURRENT_SYMBOLS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(8)
            .clamp(1, 8);

        let initial_paper_capital = std::env::var("PAPER_INITIAL_CAPITAL")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(100_000.0);
        if initial_paper_capital <= 0.0 {
            anyhow::bail!("PAPER_INITIAL_CAPITAL must be positive");
        }

        Ok(Self {
            database_url,
            webhook_url,
            scan_interval_seconds,
            max_concurrent_symbols,
            initial_paper_capital,
        })
    }
}
