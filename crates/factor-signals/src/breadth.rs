//! Market breadth over an index proxy basket.
//!
//! Score is a weighted combination of the fraction of basket members
//! above their 200-day SMA (60%) and the advance/decline ratio (40%).

use fusion_core::{BreadthRegime, BreadthSignal};

/// Per-member observation from the fetch layer
#[derive(Debug, Clone, Copy)]
pub struct BreadthComponent {
    pub above_200ma: bool,
    pub daily_change: f64,
}

pub fn regime_label(score: f64) -> BreadthRegime {
    if score > 0.30 {
        BreadthRegime::Healthy
    } else if score > -0.20 {
        BreadthRegime::Neutral
    } else if score > -0.50 {
        BreadthRegime::Weak
    } else {
        BreadthRegime::Poor
    }
}

/// Compute breadth from whatever subset of the basket was fetched.
/// An empty slice yields a neutral signal.
pub fn compute_market_breadth(components: &[BreadthComponent], basket_total: usize) -> BreadthSignal {
    if components.is_empty() {
        return BreadthSignal {
            score: 0.0,
            regime: BreadthRegime::Neutral,
            pct_above_200ma: 0.5,
            ad_ratio: 0.5,
            advance_count: 0,
            decline_count: 0,
            basket_total,
        };
    }

    let fetched = components.len();
    let above = components.iter().filter(|c| c.above_200ma).count();
    let pct_above = above as f64 / fetched as f64;

    let advances = components.iter().filter(|c| c.daily_change > 0.0).count();
    let declines = components.iter().filter(|c| c.daily_change < 0.0).count();
    let ad_ratio = advances as f64 / fetched as f64;

    let above_score = 2.0 * pct_above - 1.0;
    let ad_score = 2.0 * ad_ratio - 1.0;
    let composite = (0.60 * above_score + 0.40 * ad_score).clamp(-1.0, 1.0);

    BreadthSignal {
        score: composite,
        regime: regime_label(composite),
        pct_above_200ma: pct_above,
        ad_ratio,
        advance_count: advances,
        decline_count: declines,
        basket_total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(above: bool, change: f64) -> BreadthComponent {
        BreadthComponent { above_200ma: above, daily_change: change }
    }

    #[test]
    fn all_strong_is_healthy() {
        let comps: Vec<_> = (0..20).map(|_| component(true, 1.0)).collect();
        let b = compute_market_breadth(&comps, 20);
        assert_eq!(b.regime, BreadthRegime::Healthy);
        assert!((b.score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn all_weak_is_poor() {
        let comps: Vec<_> = (0..20).map(|_| component(false, -1.0)).collect();
        let b = compute_market_breadth(&comps, 20);
        assert_eq!(b.regime, BreadthRegime::Poor);
        assert!((b.score + 1.0).abs() < 1e-9);
    }

    #[test]
    fn split_market_is_neutral() {
        let mut comps = vec![component(true, 1.0); 10];
        comps.extend(vec![component(false, -1.0); 10]);
        let b = compute_market_breadth(&comps, 20);
        assert_eq!(b.regime, BreadthRegime::Neutral);
        assert!(b.score.abs() < 1e-9);
    }

    #[test]
    fn empty_fetch_is_neutral() {
        let b = compute_market_breadth(&[], 20);
        assert_eq!(b.regime, BreadthRegime::Neutral);
        assert_eq!(b.score, 0.0);
    }
}
