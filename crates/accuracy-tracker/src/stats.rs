//! Accuracy roll-ups over evaluated signals.

use std::collections::HashMap;

use fusion_core::{Direction, SignalRecord};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectionStats {
    pub total: usize,
    pub correct: usize,
    pub accuracy: f64,
    pub avg_return_5d: f64,
}

/// Mean factor scores split by outcome
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactorMeans {
    pub avg_technical: f64,
    pub avg_sentiment: f64,
    pub avg_ml: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccuracyStats {
    pub total_evaluated: usize,
    pub correct: usize,
    pub overall_accuracy: f64,
    pub by_direction: HashMap<String, DirectionStats>,
    pub factor_means_correct: FactorMeans,
    pub factor_means_incorrect: FactorMeans,
}

fn factor_means(signals: &[&SignalRecord]) -> FactorMeans {
    if signals.is_empty() {
        return FactorMeans::default();
    }
    let n = signals.len() as f64;
    FactorMeans {
        avg_technical: signals.iter().map(|s| s.technical_score).sum::<f64>() / n,
        avg_sentiment: signals.iter().map(|s| s.sentiment_score).sum::<f64>() / n,
        avg_ml: signals.iter().map(|s| s.ml_score).sum::<f64>() / n,
    }
}

/// Summarise evaluated signals: overall and per-direction hit rates,
/// plus average factor scores for correct vs incorrect calls.
pub fn accuracy_stats(evaluated: &[SignalRecord]) -> AccuracyStats {
    let judged: Vec<&SignalRecord> = evaluated
        .iter()
        .filter(|s| s.outcome_correct.is_some())
        .collect();

    let correct_signals: Vec<&SignalRecord> = judged
        .iter()
        .copied()
        .filter(|s| s.outcome_correct == Some(true))
        .collect();
    let incorrect_signals: Vec<&SignalRecord> = judged
        .iter()
        .copied()
        .filter(|s| s.outcome_correct == Some(false))
        .collect();

    let mut by_direction = HashMap::new();
    for direction in [Direction::Buy, Direction::Sell, Direction::Hold] {
        let of_dir: Vec<&SignalRecord> = judged
            .iter()
            .copied()
            .filter(|s| s.direction == direction)
            .collect();
        let correct = of_dir
            .iter()
            .filter(|s| s.outcome_correct == Some(true))
            .count();
        let with_return: Vec<f64> = of_dir
            .iter()
            .filter_map(|s| s.outcome_return_5d)
            .collect();
        by_direction.insert(
            direction.as_str().to_string(),
            DirectionStats {
                total: of_dir.len(),
                correct,
                accuracy: if of_dir.is_empty() {
                    0.0
                } else {
                    correct as f64 / of_dir.len() as f64
                },
                avg_return_5d: if with_return.is_empty() {
                    0.0
                } else {
                    with_return.iter().sum::<f64>() / with_return.len() as f64
                },
            },
        );
    }

    AccuracyStats {
        total_evaluated: judged.len(),
        correct: correct_signals.len(),
        overall_accuracy: if judged.is_empty() {
            0.0
        } else {
            correct_signals.len() as f64 / judged.len() as f64
        },
        by_direction,
        factor_means_correct: factor_means(&correct_signals),
        factor_means_incorrect: factor_means(&incorrect_signals),
    }
}
