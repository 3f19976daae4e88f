//! ML signal blending and model staleness.
//!
//! The learners themselves are external collaborators behind the
//! `MlScorer` trait; this module owns the blend of their outputs and the
//! retrain-interval policy.

use chrono::{DateTime, Utc};
use fusion_core::{FactorScore, MlParams, MlPrediction};

/// A model is stale when its last training run is older than the
/// configured retrain interval. Untrained models are always stale.
pub fn is_model_stale(
    trained_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    params: &MlParams,
) -> bool {
    match trained_at {
        Some(at) => (now - at).num_days() >= params.retrain_interval_days,
        None => true,
    }
}

fn model_weight(model: &str, params: &MlParams) -> f64 {
    match model {
        "xgboost" => params.xgboost_weight,
        "lstm" => params.lstm_weight,
        _ => 0.0,
    }
}

/// Weighted combination of available model predictions. A model that
/// failed to predict simply contributes nothing.
pub fn blend_predictions(predictions: &[MlPrediction], params: &MlParams) -> FactorScore {
    let mut score = 0.0;
    let mut confidence = 0.0;

    for pred in predictions {
        let w = model_weight(&pred.model, params);
        score += w * pred.signal_score;
        confidence += w * pred.confidence;
    }

    FactorScore {
        score: score.clamp(-1.0, 1.0),
        confidence: confidence.min(1.0),
    }
}
