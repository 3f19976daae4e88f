//! Options positioning: put/call ratio and IV skew, read contrarian.
//!
//! A high put/call ratio and rich put premium mean the options market is
//! fearful, which historically marks better entry points; extreme call
//! bias is complacency. Composite is clipped to [-0.40, +0.40].

use fusion_core::OptionsSignal;

/// Contrarian score from the put/call volume ratio
pub fn score_pcr(pcr: f64) -> f64 {
    if pcr > 1.5 {
        0.25
    } else if pcr > 1.2 {
        0.12
    } else if pcr >= 0.8 {
        0.0
    } else if pcr >= 0.6 {
        -0.10
    } else {
        -0.22
    }
}

/// Score from avg put IV / avg call IV
pub fn score_iv_skew(skew: f64) -> f64 {
    if skew > 1.30 {
        0.08
    } else if skew > 1.15 {
        0.04
    } else if skew < 0.70 {
        -0.08
    } else if skew < 0.85 {
        -0.04
    } else {
        0.0
    }
}

fn classify_regime(score: f64) -> &'static str {
    if score >= 0.15 {
        "FEAR"
    } else if score <= -0.12 {
        "COMPLACENCY"
    } else {
        "NEUTRAL"
    }
}

/// Combine chain observations into the options signal. Confidence grows
/// with total traded volume, capped at 0.70. No chain data yields "N/A".
pub fn compute_options_signal(
    pcr: Option<f64>,
    iv_skew: Option<f64>,
    total_volume: Option<f64>,
) -> OptionsSignal {
    if pcr.is_none() && iv_skew.is_none() {
        return OptionsSignal {
            score: 0.0,
            confidence: 0.0,
            regime: "N/A".to_string(),
            pcr: None,
            iv_skew: None,
        };
    }

    let pcr_score = pcr.map(score_pcr).unwrap_or(0.0);
    let skew_score = iv_skew.map(score_iv_skew).unwrap_or(0.0);
    let composite = (pcr_score + skew_score).clamp(-0.40, 0.40);

    let confidence = total_volume
        .map(|v| (0.35 + v / 500_000.0).min(0.70))
        .unwrap_or(0.35);

    OptionsSignal {
        score: composite,
        confidence,
        regime: classify_regime(composite).to_string(),
        pcr,
        iv_skew,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heavy_put_buying_is_fear() {
        let sig = compute_options_signal(Some(1.8), Some(1.4), Some(200_000.0));
        assert_eq!(sig.regime, "FEAR");
        assert!((sig.score - 0.33).abs() < 1e-9);
    }

    #[test]
    fn call_frenzy_is_complacency() {
        let sig = compute_options_signal(Some(0.5), Some(0.6), None);
        assert_eq!(sig.regime, "COMPLACENCY");
        assert!((sig.score + 0.30).abs() < 1e-9);
    }

    #[test]
    fn balanced_chain_is_neutral() {
        let sig = compute_options_signal(Some(1.0), Some(1.0), Some(50_000.0));
        assert_eq!(sig.regime, "NEUTRAL");
        assert_eq!(sig.score, 0.0);
    }

    #[test]
    fn no_chain_is_na() {
        let sig = compute_options_signal(None, None, None);
        assert_eq!(sig.regime, "N/A");
        assert_eq!(sig.confidence, 0.0);
    }

    #[test]
    fn confidence_capped_by_volume() {
        let sig = compute_options_signal(Some(1.0), None, Some(10_000_000.0));
        assert!((sig.confidence - 0.70).abs() < 1e-9);
    }
}
