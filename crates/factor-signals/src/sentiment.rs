//! Composite sentiment from news headlines and social chatter.

use fusion_core::{NewsArticle, SentimentScore};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SentimentSignal {
    pub score: f64,
    pub confidence: f64,
    pub news_sentiment: f64,
    pub social_sentiment: f64,
    pub news_count: usize,
    pub social_count: usize,
}

/// Drop articles whose title was already seen (case-insensitive).
/// News vendors frequently syndicate the same headline.
pub fn dedupe_by_title(articles: Vec<NewsArticle>) -> Vec<NewsArticle> {
    let mut seen = std::collections::HashSet::new();
    articles
        .into_iter()
        .filter(|a| seen.insert(a.title.trim().to_lowercase()))
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

/// Combine model outputs for news and social texts into one signal.
/// News is weighted 60/40 over social when both are present. Confidence
/// grows with sample size and agreement between the individual scores.
pub fn compute_sentiment_signal(
    news_scores: &[SentimentScore],
    social_scores: &[SentimentScore],
) -> SentimentSignal {
    let news_values: Vec<f64> = news_scores.iter().map(|s| s.signed_value()).collect();
    let social_values: Vec<f64> = social_scores.iter().map(|s| s.signed_value()).collect();

    let news_avg = mean(&news_values);
    let social_avg = mean(&social_values);

    let composite = match (news_values.is_empty(), social_values.is_empty()) {
        (false, false) => 0.6 * news_avg + 0.4 * social_avg,
        (false, true) => news_avg,
        (true, false) => social_avg,
        (true, true) => 0.0,
    };

    let total_samples = news_values.len() + social_values.len();
    let sample_factor = (total_samples as f64 / 20.0).min(1.0);

    let all_values: Vec<f64> = news_values
        .iter()
        .chain(social_values.iter())
        .copied()
        .collect();
    let agreement_factor = if all_values.is_empty() {
        0.0
    } else {
        (1.0 - std_dev(&all_values)).max(0.0)
    };

    let confidence = (0.3 + 0.4 * sample_factor + 0.3 * agreement_factor).min(1.0);

    SentimentSignal {
        score: composite.clamp(-1.0, 1.0),
        confidence,
        news_sentiment: news_avg,
        social_sentiment: social_avg,
        news_count: news_values.len(),
        social_count: social_values.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fusion_core::SentimentLabel;

    fn score(label: SentimentLabel, s: f64) -> SentimentScore {
        SentimentScore { label, score: s }
    }

    #[test]
    fn empty_inputs_are_neutral_low_confidence() {
        let sig = compute_sentiment_signal(&[], &[]);
        assert_eq!(sig.score, 0.0);
        assert!((sig.confidence - 0.3).abs() < 1e-9);
    }

    #[test]
    fn positive_news_scores_positive() {
        let news = vec![
            score(SentimentLabel::Positive, 0.9),
            score(SentimentLabel::Positive, 0.8),
            score(SentimentLabel::Neutral, 0.9),
        ];
        let sig = compute_sentiment_signal(&news, &[]);
        assert!(sig.score > 0.3);
        assert_eq!(sig.news_count, 3);
        assert_eq!(sig.social_count, 0);
    }

    #[test]
    fn news_weighted_over_social() {
        let news = vec![score(SentimentLabel::Positive, 1.0)];
        let social = vec![score(SentimentLabel::Negative, 1.0)];
        let sig = compute_sentiment_signal(&news, &social);
        // 0.6 * 1.0 + 0.4 * (-1.0) = 0.2
        assert!((sig.score - 0.2).abs() < 1e-9);
    }

    #[test]
    fn more_samples_increase_confidence() {
        let few = vec![score(SentimentLabel::Positive, 0.8); 2];
        let many = vec![score(SentimentLabel::Positive, 0.8); 25];
        let low = compute_sentiment_signal(&few, &[]);
        let high = compute_sentiment_signal(&many, &[]);
        assert!(high.confidence > low.confidence);
    }

    #[test]
    fn dedupe_drops_repeated_titles() {
        let make = |title: &str| NewsArticle {
            title: title.to_string(),
            description: None,
            source: "wire".to_string(),
            url: "https://example.com".to_string(),
            published_at: None,
        };
        let articles = vec![make("Apple beats"), make("apple beats "), make("Other story")];
        let deduped = dedupe_by_title(articles);
        assert_eq!(deduped.len(), 2);
    }
}
