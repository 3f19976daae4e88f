//! Sector rotation: which sectors lead or lag the broad market.
//!
//! Relative strength vs the benchmark is measured over 1m/3m/6m windows
//! (weights 0.20/0.50/0.30), z-scored across all sectors and squashed
//! through tanh. A stock in a LEADING sector gets a +0.05 composite
//! tailwind, a LAGGING sector a -0.05 headwind.

use fusion_core::{AssetClass, SectorSignal};
use serde::{Deserialize, Serialize};

const W_1M: f64 = 0.20;
const W_3M: f64 = 0.50;
const W_6M: f64 = 0.30;

/// Relative strength of one sector after the overview pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorStrength {
    pub name: String,
    pub score: f64,
    pub regime: String,
    pub rs_1m: f64,
    pub rs_3m: f64,
    pub rs_6m: f64,
}

/// Log relative return of a sector vs the benchmark over `window` bars
pub fn rel_return(sector_closes: &[f64], bench_closes: &[f64], window: usize) -> f64 {
    if sector_closes.len() < window + 1 || bench_closes.len() < window + 1 {
        return 0.0;
    }
    let sec_last = sector_closes[sector_closes.len() - 1];
    let sec_prev = sector_closes[sector_closes.len() - 1 - window];
    let ben_last = bench_closes[bench_closes.len() - 1];
    let ben_prev = bench_closes[bench_closes.len() - 1 - window];
    if sec_prev <= 0.0 || ben_prev <= 0.0 {
        return 0.0;
    }
    (sec_last / sec_prev).ln() - (ben_last / ben_prev).ln()
}

fn regime_of(score: f64) -> &'static str {
    if score > 0.15 {
        "LEADING"
    } else if score < -0.15 {
        "LAGGING"
    } else {
        "NEUTRAL"
    }
}

/// Rank all sectors by relative strength against the benchmark closes.
pub fn compute_sector_overview(
    sectors: &[(String, Vec<f64>)],
    benchmark: &[f64],
) -> Vec<SectorStrength> {
    if sectors.is_empty() || benchmark.is_empty() {
        return vec![];
    }

    let raw: Vec<(String, f64, f64, f64, f64)> = sectors
        .iter()
        .map(|(name, closes)| {
            let rs_1m = rel_return(closes, benchmark, 21);
            let rs_3m = rel_return(closes, benchmark, 63);
            let rs_6m = rel_return(closes, benchmark, 126);
            let composite = W_1M * rs_1m + W_3M * rs_3m + W_6M * rs_6m;
            (name.clone(), composite, rs_1m, rs_3m, rs_6m)
        })
        .collect();

    let composites: Vec<f64> = raw.iter().map(|(_, c, ..)| *c).collect();
    let mean = composites.iter().sum::<f64>() / composites.len() as f64;
    let var = composites.iter().map(|c| (c - mean).powi(2)).sum::<f64>()
        / composites.len() as f64;
    let std = var.sqrt();

    raw.into_iter()
        .map(|(name, composite, rs_1m, rs_3m, rs_6m)| {
            let z = (composite - mean) / (std + 1e-9);
            let score = z.tanh().clamp(-1.0, 1.0);
            SectorStrength {
                name,
                score,
                regime: regime_of(score).to_string(),
                rs_1m,
                rs_3m,
                rs_6m,
            }
        })
        .collect()
}

/// Per-symbol sector modifier. Crypto and unmapped symbols get "N/A".
pub fn sector_signal(
    asset_class: AssetClass,
    symbol_sector: Option<&str>,
    overview: &[SectorStrength],
) -> SectorSignal {
    let na = SectorSignal {
        score: 0.0,
        regime: "N/A".to_string(),
        sector: symbol_sector.map(|s| s.to_string()),
        modifier: 0.0,
    };

    if asset_class == AssetClass::Crypto {
        return SectorSignal { sector: None, ..na };
    }
    let Some(sector_name) = symbol_sector else {
        return na;
    };
    let Some(strength) = overview.iter().find(|s| s.name == sector_name) else {
        return na;
    };

    let modifier = match strength.regime.as_str() {
        "LEADING" => 0.05,
        "LAGGING" => -0.05,
        _ => 0.0,
    };

    SectorSignal {
        score: strength.score,
        regime: strength.regime.clone(),
        sector: Some(sector_name.to_string()),
        modifier,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Geometric series of daily closes with the given total growth
    fn closes(days: usize, total_growth: f64) -> Vec<f64> {
        let daily = (1.0 + total_growth).powf(1.0 / days as f64);
        (0..=days).map(|i| 100.0 * daily.powi(i as i32)).collect()
    }

    #[test]
    fn outperformer_leads_laggard_lags() {
        let benchmark = closes(140, 0.10);
        let sectors = vec![
            ("Hot".to_string(), closes(140, 0.40)),
            ("Mid".to_string(), closes(140, 0.10)),
            ("Cold".to_string(), closes(140, -0.20)),
        ];
        let overview = compute_sector_overview(&sectors, &benchmark);
        let hot = overview.iter().find(|s| s.name == "Hot").unwrap();
        let cold = overview.iter().find(|s| s.name == "Cold").unwrap();
        assert_eq!(hot.regime, "LEADING");
        assert_eq!(cold.regime, "LAGGING");
        assert!(hot.score > cold.score);
    }

    #[test]
    fn leading_sector_gives_positive_modifier() {
        let benchmark = closes(140, 0.10);
        let sectors = vec![
            ("Hot".to_string(), closes(140, 0.40)),
            ("Cold".to_string(), closes(140, -0.20)),
        ];
        let overview = compute_sector_overview(&sectors, &benchmark);
        let sig = sector_signal(AssetClass::Stock, Some("Hot"), &overview);
        assert!((sig.modifier - 0.05).abs() < 1e-9);
        let sig = sector_signal(AssetClass::Stock, Some("Cold"), &overview);
        assert!((sig.modifier + 0.05).abs() < 1e-9);
    }

    #[test]
    fn crypto_and_unknown_are_na() {
        let overview = vec![];
        let crypto = sector_signal(AssetClass::Crypto, Some("Technology"), &overview);
        assert_eq!(crypto.regime, "N/A");
        let unknown = sector_signal(AssetClass::Stock, None, &overview);
        assert_eq!(unknown.regime, "N/A");
        assert_eq!(unknown.modifier, 0.0);
    }

    #[test]
    fn short_history_scores_zero_rel_return() {
        assert_eq!(rel_return(&[100.0, 101.0], &[100.0, 100.5], 21), 0.0);
    }
}
