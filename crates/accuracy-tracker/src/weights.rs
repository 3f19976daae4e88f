//! Adaptive factor weights from historical accuracy.
//!
//! Each factor's sign-adjusted score is correlated with realised
//! correctness over evaluated directional signals. Factors that
//! predicted well earn weight; the result is blended 50/50 with the
//! configured priors so the learner can only tilt, never dominate.
//! The macro weight stays at its prior: macro is a global regime
//! signal, so per-signal correlation is ill-defined for it.

use fusion_core::{Direction, FactorWeights, SignalRecord};

/// Pearson correlation between two equal-length series; 0 when either
/// side has no variance.
fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return 0.0;
    }
    let mean_x = xs[..n].iter().sum::<f64>() / n as f64;
    let mean_y = ys[..n].iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for i in 0..n {
        let dx = xs[i] - mean_x;
        let dy = ys[i] - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x < 1e-12 || var_y < 1e-12 {
        return 0.0;
    }
    cov / (var_x.sqrt() * var_y.sqrt())
}

/// Compute history-informed factor weights. Falls back to the priors
/// when the sample is too small or no factor shows predictive power.
pub fn compute_adaptive_weights(
    history: &[SignalRecord],
    priors: &FactorWeights,
    min_samples: usize,
) -> FactorWeights {
    let evaluated: Vec<&SignalRecord> = history
        .iter()
        .filter(|s| s.outcome_correct.is_some() && s.direction != Direction::Hold)
        .collect();

    if evaluated.len() < min_samples {
        return *priors;
    }

    // Sign-adjust so an "aligned" prediction is positive for both BUY
    // and SELL signals
    let sign = |s: &SignalRecord| match s.direction {
        Direction::Buy => 1.0,
        Direction::Sell => -1.0,
        Direction::Hold => 0.0,
    };
    let correct: Vec<f64> = evaluated
        .iter()
        .map(|s| if s.outcome_correct == Some(true) { 1.0 } else { 0.0 })
        .collect();

    let tech: Vec<f64> = evaluated.iter().map(|s| s.technical_score * sign(s)).collect();
    let sent: Vec<f64> = evaluated.iter().map(|s| s.sentiment_score * sign(s)).collect();
    let ml: Vec<f64> = evaluated.iter().map(|s| s.ml_score * sign(s)).collect();

    let corr_tech = pearson(&tech, &correct).max(0.0);
    let corr_sent = pearson(&sent, &correct).max(0.0);
    let corr_ml = pearson(&ml, &correct).max(0.0);

    let corr_sum = corr_tech + corr_sent + corr_ml;
    if corr_sum < 1e-9 {
        return *priors;
    }

    // Normalise the data-driven part over the non-macro mass, keep
    // macro at prior, then blend 50/50 with the priors
    let data_mass = 1.0 - priors.macro_;
    let data = FactorWeights {
        technical: corr_tech / corr_sum * data_mass,
        sentiment: corr_sent / corr_sum * data_mass,
        ml: corr_ml / corr_sum * data_mass,
        macro_: priors.macro_,
    };

    FactorWeights {
        technical: 0.5 * data.technical + 0.5 * priors.technical,
        sentiment: 0.5 * data.sentiment + 0.5 * priors.sentiment,
        ml: 0.5 * data.ml + 0.5 * priors.ml,
        macro_: 0.5 * data.macro_ + 0.5 * priors.macro_,
    }
    .normalized()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fusion_core::SignalKind;

    fn signal(
        direction: Direction,
        tech: f64,
        sent: f64,
        ml: f64,
        correct: bool,
    ) -> SignalRecord {
        SignalRecord {
            id: None,
            symbol: "TEST".to_string(),
            kind: SignalKind::Scheduled,
            direction,
            strength: 0.5,
            confidence: 0.7,
            technical_score: tech,
            sentiment_score: sent,
            ml_score: ml,
            macro_score: 0.0,
            macro_regime: None,
            created_at: Utc::now(),
            outcome_return_5d: Some(if correct { 0.03 } else { -0.03 }),
            outcome_return_10d: None,
            outcome_correct: Some(correct),
            outcome_checked_at: Some(Utc::now()),
        }
    }

    #[test]
    fn pearson_of_identical_series_is_one() {
        let xs = vec![1.0, 2.0, 3.0, 4.0];
        assert!((pearson(&xs, &xs) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn pearson_of_constant_series_is_zero() {
        let xs = vec![1.0, 2.0, 3.0];
        let ys = vec![5.0, 5.0, 5.0];
        assert_eq!(pearson(&xs, &ys), 0.0);
    }

    #[test]
    fn small_sample_returns_priors() {
        let priors = FactorWeights::default();
        let history: Vec<SignalRecord> = (0..10)
            .map(|i| signal(Direction::Buy, 0.5, 0.1, 0.3, i % 2 == 0))
            .collect();
        let weights = compute_adaptive_weights(&history, &priors, 30);
        assert!((weights.technical - priors.technical).abs() < 1e-9);
    }

    #[test]
    fn predictive_factor_gains_weight() {
        let priors = FactorWeights::default();
        // Technical score tracks correctness perfectly; sentiment and
        // ml are pure noise
        let mut history = Vec::new();
        for i in 0..60 {
            let correct = i % 2 == 0;
            let noise = if i % 3 == 0 { 0.4 } else { -0.2 };
            history.push(signal(
                Direction::Buy,
                if correct { 0.8 } else { -0.2 },
                noise,
                -noise,
                correct,
            ));
        }
        let weights = compute_adaptive_weights(&history, &priors, 30);
        assert!(weights.technical > priors.technical);
        assert!((weights.sum() - 1.0).abs() < 1e-9);
        // Macro never leaves its prior before the final renormalisation
        assert!((weights.macro_ - priors.macro_).abs() < 0.02);
    }

    #[test]
    fn hold_signals_are_excluded() {
        let priors = FactorWeights::default();
        let history: Vec<SignalRecord> = (0..100)
            .map(|i| signal(Direction::Hold, 0.5, 0.1, 0.3, i % 2 == 0))
            .collect();
        // All HOLD: below min_samples after filtering -> priors
        let weights = compute_adaptive_weights(&history, &priors, 30);
        assert!((weights.ml - priors.ml).abs() < 1e-9);
    }

    #[test]
    fn zero_correlation_returns_priors() {
        let priors = FactorWeights::default();
        // Constant factor scores: no variance, correlation 0
        let history: Vec<SignalRecord> = (0..60)
            .map(|i| signal(Direction::Buy, 0.5, 0.5, 0.5, i % 2 == 0))
            .collect();
        let weights = compute_adaptive_weights(&history, &priors, 30);
        assert!((weights.technical - priors.technical).abs() < 1e-9);
        assert!((weights.sentiment - priors.sentiment).abs() < 1e-9);
    }

    #[test]
    fn result_is_a_probability_simplex() {
        let priors = FactorWeights::default();
        let mut history = Vec::new();
        for i in 0..80 {
            let correct = i % 3 != 0;
            history.push(signal(
                if i % 2 == 0 { Direction::Buy } else { Direction::Sell },
                if correct { 0.6 } else { -0.1 },
                0.2,
                if correct { 0.3 } else { -0.3 },
                correct,
            ));
        }
        let weights = compute_adaptive_weights(&history, &priors, 30);
        assert!((weights.sum() - 1.0).abs() < 1e-9);
        for w in [weights.technical, weights.sentiment, weights.ml, weights.macro_] {
            assert!(w >= 0.0 && w <= 1.0);
        }
    }
}
