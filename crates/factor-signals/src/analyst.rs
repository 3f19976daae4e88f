//! Analyst consensus: rating mix, recent revisions, and price targets.

use fusion_core::AnalystSignal;

/// Rating counts from the consensus feed
#[derive(Debug, Clone, Copy, Default)]
pub struct RatingCounts {
    pub strong_buy: u32,
    pub buy: u32,
    pub hold: u32,
    pub sell: u32,
    pub strong_sell: u32,
}

impl RatingCounts {
    pub fn total(&self) -> u32 {
        self.strong_buy + self.buy + self.hold + self.sell + self.strong_sell
    }
}

fn rating_label(score: f64) -> &'static str {
    if score > 0.4 {
        "Strong Buy"
    } else if score > 0.1 {
        "Buy"
    } else if score > -0.1 {
        "Hold"
    } else if score > -0.4 {
        "Sell"
    } else {
        "Strong Sell"
    }
}

/// Base consensus score:
/// (strongBuy*1 + buy*0.5 + hold*0 + sell*-0.5 + strongSell*-1) / total
pub fn consensus_score(counts: &RatingCounts) -> Option<f64> {
    let total = counts.total();
    if total == 0 {
        return None;
    }
    let score = (counts.strong_buy as f64 * 1.0 + counts.buy as f64 * 0.5
        - counts.sell as f64 * 0.5
        - counts.strong_sell as f64 * 1.0)
        / total as f64;
    Some(score.clamp(-1.0, 1.0))
}

/// Build the analyst signal. Recent upgrades/downgrades add a momentum
/// bonus of +-0.05 each, capped at +-0.20.
pub fn compute_analyst_signal(
    counts: &RatingCounts,
    upgrades_30d: u32,
    downgrades_30d: u32,
    target_price: Option<f64>,
    current_price: Option<f64>,
) -> AnalystSignal {
    let Some(base) = consensus_score(counts) else {
        return AnalystSignal {
            score: 0.0,
            rating_label: "N/A".to_string(),
            total_ratings: 0,
            target_price: None,
            target_upside_pct: None,
        };
    };

    let bonus =
        ((upgrades_30d as f64 - downgrades_30d as f64) * 0.05).clamp(-0.20, 0.20);
    let final_score = (base + bonus).clamp(-1.0, 1.0);

    let target_upside_pct = match (target_price, current_price) {
        (Some(target), Some(current)) if current > 0.0 => {
            Some((target - current) / current * 100.0)
        }
        _ => None,
    };

    AnalystSignal {
        score: final_score,
        rating_label: rating_label(final_score).to_string(),
        total_ratings: counts.total(),
        target_price,
        target_upside_pct,
    }
}
