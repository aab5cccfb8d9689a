//! Sentiment-model classifier: maps generic sentiment labels onto the
//! productive/unproductive space.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::error::SentimentError;
use crate::pipeline::types::{Category, ClassificationResult, ClassifierOutcome, Source};
use crate::sentiment::{SentimentProvider, SentimentScore};

const POSITIVE_MARKERS: &[&str] = &["positive", "pos", "5", "4", "excellent", "good"];
const NEGATIVE_MARKERS: &[&str] = &["negative", "neg", "1", "2", "bad", "terrible"];

/// Neutral and unrecognized labels count as productive above this score.
const NEUTRAL_PRODUCTIVE_SCORE: f32 = 0.6;

/// Optional sentiment classifier.
pub struct SentimentClassifier {
    provider: Option<Arc<dyn SentimentProvider>>,
    timeout: Duration,
}

impl SentimentClassifier {
    pub fn new(provider: Arc<dyn SentimentProvider>, timeout: Duration) -> Self {
        Self {
            provider: Some(provider),
            timeout,
        }
    }

    /// A classifier that never contributes a result.
    pub fn disabled() -> Self {
        Self {
            provider: None,
            timeout: Duration::ZERO,
        }
    }

    pub fn is_available(&self) -> bool {
        self.provider.is_some()
    }

    /// Classify normalized text.
    pub async fn classify(&self, text: &str) -> ClassifierOutcome {
        let Some(ref provider) = self.provider else {
            return ClassifierOutcome::Unavailable;
        };
        if text.trim().is_empty() {
            return ClassifierOutcome::Unavailable;
        }

        let scores = match tokio::time::timeout(self.timeout, provider.score(text)).await {
            Ok(Ok(scores)) => scores,
            Ok(Err(e)) => {
                error!(model = provider.model_name(), error = %e, "Sentiment classification failed");
                return ClassifierOutcome::TransientError(e.to_string());
            }
            Err(_) => {
                let e = SentimentError::Timeout {
                    model: provider.model_name().to_string(),
                    timeout: self.timeout,
                };
                warn!(error = %e, "Sentiment classification timed out");
                return ClassifierOutcome::TransientError(e.to_string());
            }
        };

        match map_scores(&scores) {
            Some(result) => {
                debug!(
                    category = %result.category,
                    confidence = result.confidence,
                    "Sentiment classification"
                );
                ClassifierOutcome::Success(result)
            }
            None => ClassifierOutcome::TransientError("sentiment model returned no labels".into()),
        }
    }
}

/// Pick the top label and map it to a category.
pub fn map_scores(scores: &[SentimentScore]) -> Option<ClassificationResult> {
    let best = scores
        .iter()
        .max_by(|a, b| a.score.total_cmp(&b.score))?;

    let category = map_label(&best.label, best.score);
    Some(ClassificationResult::new(
        category,
        best.score,
        Source::SentimentModel.tag(),
        format!("Sentiment model: {} ({:.2})", best.label, best.score),
    ))
}

/// Map a sentiment or star-rating label to a category.
pub fn map_label(label: &str, score: f32) -> Category {
    let label = label.to_lowercase();
    if POSITIVE_MARKERS.iter().any(|m| label.contains(m)) {
        Category::Productive
    } else if NEGATIVE_MARKERS.iter().any(|m| label.contains(m)) {
        Category::Unproductive
    } else if score > NEUTRAL_PRODUCTIVE_SCORE {
        // neutral / 3 stars / unknown labels
        Category::Productive
    } else {
        Category::Unproductive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    use crate::error::SentimentError;

    struct FixedSentiment(Vec<SentimentScore>);

    #[async_trait]
    impl SentimentProvider for FixedSentiment {
        fn model_name(&self) -> &str {
            "fixed"
        }

        async fn score(&self, _text: &str) -> Result<Vec<SentimentScore>, SentimentError> {
            Ok(self.0.clone())
        }
    }

    struct FailingSentiment;

    #[async_trait]
    impl SentimentProvider for FailingSentiment {
        fn model_name(&self) -> &str {
            "failing"
        }

        async fn score(&self, _text: &str) -> Result<Vec<SentimentScore>, SentimentError> {
            Err(SentimentError::ModelLoading {
                model: "failing".into(),
            })
        }
    }

    struct SlowSentiment;

    #[async_trait]
    impl SentimentProvider for SlowSentiment {
        fn model_name(&self) -> &str {
            "slow"
        }

        async fn score(&self, _text: &str) -> Result<Vec<SentimentScore>, SentimentError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![])
        }
    }

    fn score(label: &str, score: f32) -> SentimentScore {
        SentimentScore {
            label: label.into(),
            score,
        }
    }

    #[test]
    fn positive_labels_map_to_productive() {
        assert_eq!(map_label("positive", 0.3), Category::Productive);
        assert_eq!(map_label("5 stars", 0.3), Category::Productive);
        assert_eq!(map_label("LABEL_POS", 0.3), Category::Productive);
    }

    #[test]
    fn negative_labels_map_to_unproductive() {
        assert_eq!(map_label("negative", 0.99), Category::Unproductive);
        assert_eq!(map_label("1 star", 0.99), Category::Unproductive);
        assert_eq!(map_label("2 stars", 0.99), Category::Unproductive);
    }

    #[test]
    fn neutral_and_unknown_labels_use_score() {
        assert_eq!(map_label("neutral", 0.7), Category::Productive);
        assert_eq!(map_label("neutral", 0.6), Category::Unproductive);
        assert_eq!(map_label("3 stars", 0.65), Category::Productive);
        assert_eq!(map_label("LABEL_X", 0.4), Category::Unproductive);
    }

    #[test]
    fn map_scores_picks_highest_label() {
        let result = map_scores(&[score("negative", 0.1), score("positive", 0.8), score("neutral", 0.1)])
            .unwrap();
        assert_eq!(result.category, Category::Productive);
        assert!((result.confidence - 0.8).abs() < 1e-6);
        assert_eq!(result.method, "sentiment-model");
        assert!(result.reasoning.contains("positive"));
    }

    #[test]
    fn map_scores_empty_is_none() {
        assert!(map_scores(&[]).is_none());
    }

    #[tokio::test]
    async fn disabled_classifier_is_unavailable() {
        let classifier = SentimentClassifier::disabled();
        assert!(!classifier.is_available());
        assert_eq!(
            classifier.classify("qualquer texto").await,
            ClassifierOutcome::Unavailable
        );
    }

    #[tokio::test]
    async fn empty_text_is_unavailable() {
        let classifier = SentimentClassifier::new(
            Arc::new(FixedSentiment(vec![score("positive", 0.9)])),
            Duration::from_secs(1),
        );
        assert_eq!(classifier.classify("  ").await, ClassifierOutcome::Unavailable);
    }

    #[tokio::test]
    async fn provider_result_is_mapped() {
        let classifier = SentimentClassifier::new(
            Arc::new(FixedSentiment(vec![score("negative", 0.9)])),
            Duration::from_secs(1),
        );
        match classifier.classify("boleto atrasado").await {
            ClassifierOutcome::Success(result) => {
                assert_eq!(result.category, Category::Unproductive);
            }
            other => panic!("Expected Success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn provider_error_is_transient() {
        let classifier = SentimentClassifier::new(Arc::new(FailingSentiment), Duration::from_secs(1));
        assert!(classifier.is_available());
        match classifier.classify("boleto atrasado").await {
            ClassifierOutcome::TransientError(reason) => {
                assert!(reason.contains("timed out after 100ms"), "{reason}");
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_label_list_is_transient() {
        let classifier =
            SentimentClassifier::new(Arc::new(FixedSentiment(vec![])), Duration::from_secs(1));
        match classifier.classify("boleto atrasado").await {
            ClassifierOutcome::TransientError(reason) => {
                assert!(reason.contains("timed out after 100ms"), "{reason}");
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let classifier = SentimentClassifier::new(Arc::new(SlowSentiment), Duration::from_millis(100));
        match classifier.classify("boleto atrasado").await {
            ClassifierOutcome::TransientError(reason) => {
                assert!(reason.contains("timed out after 100ms"), "{reason}");
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
