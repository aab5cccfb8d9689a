//! Email analyzer: validation, normalization, arbitration, reply.
//!
//! Flow:
//! 1. Validation: inputs below the minimum length short-circuit
//! 2. Normalizer → tokens for the remote classifiers
//! 3. Arbiter → one classification (rules always included)
//! 4. Composer → reply text and suggested actions
//!
//! `analyze` never fails; every degraded path still yields a complete
//! outcome.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::config::AnalyzerConfig;
use crate::llm::provider::LlmProvider;
use crate::pipeline::arbiter::Arbiter;
use crate::pipeline::composer::{ResponseComposer, template_response};
use crate::pipeline::llm_classifier::LlmClassifier;
use crate::pipeline::normalizer::{NormalizedText, Normalizer};
use crate::pipeline::rules::RulesEngine;
use crate::pipeline::sentiment::SentimentClassifier;
use crate::pipeline::types::{AnalysisOutcome, Category, ClassificationResult, METHOD_VALIDATION};
use crate::sentiment::SentimentProvider;

/// Hybrid email classifier.
///
/// Holds only immutable state, so one instance is shared across requests
/// behind an `Arc`.
pub struct EmailAnalyzer {
    normalizer: Normalizer,
    arbiter: Arbiter,
    composer: ResponseComposer,
    min_text_length: usize,
}

impl EmailAnalyzer {
    /// Create an analyzer with the built-in rule tables.
    ///
    /// Missing providers simply disable their classifier.
    pub fn new(
        config: AnalyzerConfig,
        llm: Option<Arc<dyn LlmProvider>>,
        sentiment: Option<Arc<dyn SentimentProvider>>,
    ) -> Self {
        let rules = RulesEngine::default_rules(config.rules.clone());
        Self::with_rules(config, rules, llm, sentiment)
    }

    /// Create an analyzer with a caller-supplied rules engine.
    pub fn with_rules(
        config: AnalyzerConfig,
        rules: RulesEngine,
        llm: Option<Arc<dyn LlmProvider>>,
        sentiment: Option<Arc<dyn SentimentProvider>>,
    ) -> Self {
        let llm = Arc::new(match llm {
            Some(provider) => LlmClassifier::new(provider, config.llm.clone()),
            None => LlmClassifier::disabled(),
        });
        let sentiment = match sentiment {
            Some(provider) => SentimentClassifier::new(provider, config.remote_timeout),
            None => SentimentClassifier::disabled(),
        };

        Self {
            normalizer: Normalizer::new(config.normalizer),
            arbiter: Arbiter::new(rules, sentiment, Arc::clone(&llm), config.arbiter),
            composer: ResponseComposer::new(llm, config.composer),
            min_text_length: config.min_text_length,
        }
    }

    /// Classify an email and compose a reply.
    pub async fn analyze(&self, text: &str) -> AnalysisOutcome {
        let id = Uuid::new_v4();
        self.run(text)
            .instrument(info_span!("analysis", id = %id))
            .await
    }

    async fn run(&self, text: &str) -> AnalysisOutcome {
        let length = text.trim().chars().count();
        if length < self.min_text_length {
            warn!(length, min = self.min_text_length, "Email too short for analysis");
            let classification = ClassificationResult::new(
                Category::Unproductive,
                0.5,
                METHOD_VALIDATION,
                format!(
                    "Email too short (minimum {} characters)",
                    self.min_text_length
                ),
            );
            return AnalysisOutcome::new(classification, template_response(Category::Unproductive));
        }

        let normalized = self.normalize(text);
        let classification = self.arbiter.decide(text, &normalized).await;
        let composed = self.composer.compose(&normalized, &classification).await;

        info!(
            category = %classification.category,
            method = %classification.method,
            confidence = classification.confidence,
            generated_by = ?composed.generated_by,
            "Email analyzed"
        );

        AnalysisOutcome::new(classification, composed)
    }

    fn normalize(&self, text: &str) -> String {
        normalize_or_raw(text, |t| self.normalizer.normalize(t))
    }
}

/// Normalized text, or the lower-cased raw text when `normalize` panics or
/// leaves nothing.
pub fn normalize_or_raw<F>(text: &str, normalize: F) -> String
where
    F: FnOnce(&str) -> NormalizedText,
{
    let fallback = || text.to_lowercase().trim().to_string();
    match panic::catch_unwind(AssertUnwindSafe(|| normalize(text))) {
        Ok(normalized) if !normalized.is_empty() => normalized.joined,
        Ok(_) => {
            warn!("Normalized text is empty, using raw text");
            fallback()
        }
        Err(_) => {
            error!("Normalization failed, using raw text");
            fallback()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::error::{LlmError, SentimentError};
    use crate::llm::provider::{CompletionRequest, CompletionResponse, Role};
    use crate::pipeline::types::GeneratedBy;
    use crate::sentiment::SentimentScore;

    const LOAN_EMAIL: &str = "Bom dia, gostaria de saber o status da minha solicitação de \
                              empréstimo. Preciso de uma atualização urgente.";

    const GREETING: &str = "Feliz Natal e próspero ano novo! Obrigado pela parceria \
                            durante todo o ano.";

    const GENERATED: &str = "Recebemos sua solicitação de empréstimo e retornaremos em breve.";

    /// LLM stub: answers classification prompts with a label and reply
    /// prompts with a canned reply, recording every request.
    struct ScriptedLlm {
        label: &'static str,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedLlm {
        fn new(label: &'static str) -> Arc<Self> {
            Arc::new(Self {
                label,
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            let is_classification = request
                .messages
                .iter()
                .filter(|m| m.role == Role::User)
                .any(|m| m.content.contains("PRODUTIVO ou IMPRODUTIVO"));
            self.requests.lock().unwrap().push(request);
            let content = if is_classification {
                self.label
            } else {
                GENERATED
            };
            Ok(CompletionResponse {
                content: content.to_string(),
                input_tokens: 0,
                output_tokens: 1,
            })
        }
    }

    struct QuotaLlm;

    #[async_trait]
    impl LlmProvider for QuotaLlm {
        fn model_name(&self) -> &str {
            "quota"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            Err(LlmError::QuotaExceeded {
                provider: "quota".into(),
                reason: "insufficient_quota".into(),
            })
        }
    }

    struct HangingSentiment;

    #[async_trait]
    impl SentimentProvider for HangingSentiment {
        fn model_name(&self) -> &str {
            "hanging"
        }

        async fn score(&self, _text: &str) -> Result<Vec<SentimentScore>, SentimentError> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(vec![])
        }
    }

    fn rules_only() -> EmailAnalyzer {
        EmailAnalyzer::new(AnalyzerConfig::default(), None, None)
    }

    #[tokio::test]
    async fn short_input_is_rejected_by_validation() {
        let outcome = rules_only().analyze("Oi").await;
        assert_eq!(outcome.classification.category, Category::Unproductive);
        assert!((outcome.classification.confidence - 0.5).abs() < 1e-6);
        assert_eq!(outcome.classification.method, "validation");
        assert!(outcome.classification.reasoning.contains("10"));
        assert_eq!(outcome.generated_by, GeneratedBy::Template);
        assert!(!outcome.response.is_empty());
    }

    #[tokio::test]
    async fn whitespace_padding_does_not_pass_validation() {
        let outcome = rules_only().analyze("   oi    \n\n     ").await;
        assert_eq!(outcome.classification.method, "validation");
    }

    #[tokio::test]
    async fn loan_status_email_is_productive() {
        let outcome = rules_only().analyze(LOAN_EMAIL).await;
        assert_eq!(outcome.classification.category, Category::Productive);
        assert!(outcome.classification.confidence > 0.7);
        assert_eq!(outcome.classification.method, "rules");
        assert_eq!(outcome.suggested_actions.len(), 5);
        assert_eq!(outcome.generated_by, GeneratedBy::Template);
    }

    #[tokio::test]
    async fn christmas_greeting_is_unproductive() {
        let outcome = rules_only().analyze(GREETING).await;
        assert_eq!(outcome.classification.category, Category::Unproductive);
        assert_eq!(outcome.suggested_actions.len(), 3);
    }

    #[tokio::test]
    async fn text_that_normalizes_to_nothing_still_classifies() {
        let outcome = rules_only().analyze("!!! ??? ... 12345 ###").await;
        assert_eq!(outcome.classification.method, "rules");
        assert!(!outcome.response.is_empty());
    }

    #[tokio::test]
    async fn llm_takes_part_and_generates_reply() {
        let llm = ScriptedLlm::new("PRODUTIVO");
        let analyzer = EmailAnalyzer::new(
            AnalyzerConfig::default(),
            Some(llm.clone() as Arc<dyn LlmProvider>),
            None,
        );
        let outcome = analyzer.analyze(LOAN_EMAIL).await;

        assert_eq!(outcome.classification.category, Category::Productive);
        assert_eq!(outcome.classification.method, "hybrid(rules+llm)");
        assert_eq!(outcome.generated_by, GeneratedBy::Llm);
        assert_eq!(outcome.response, GENERATED);

        let requests = llm.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        // Remote sources see normalized text, not the raw email.
        assert!(
            requests[0]
                .messages
                .iter()
                .all(|m| !m.content.contains("Bom dia,"))
        );
    }

    #[tokio::test]
    async fn exhausted_llm_quota_degrades_to_rules() {
        let analyzer =
            EmailAnalyzer::new(AnalyzerConfig::default(), Some(Arc::new(QuotaLlm)), None);
        let outcome = analyzer.analyze(LOAN_EMAIL).await;
        assert_eq!(outcome.classification.method, "rules");
        assert_eq!(outcome.classification.category, Category::Productive);
        assert_eq!(outcome.generated_by, GeneratedBy::Template);
    }

    #[tokio::test]
    async fn hanging_sentiment_model_degrades_to_rules() {
        let config = AnalyzerConfig {
            remote_timeout: Duration::from_millis(50),
            ..AnalyzerConfig::default()
        };
        let analyzer = EmailAnalyzer::new(config, None, Some(Arc::new(HangingSentiment)));
        let outcome = analyzer.analyze(GREETING).await;
        assert_eq!(outcome.classification.method, "rules");
        assert_eq!(outcome.classification.category, Category::Unproductive);
    }

    #[test]
    fn panicking_normalizer_falls_back_to_raw_text() {
        let text = normalize_or_raw("  Preciso do BOLETO  ", |_| panic!("normalizer exploded"));
        assert_eq!(text, "preciso do boleto");
    }

    #[test]
    fn empty_normalization_falls_back_to_raw_text() {
        let text = normalize_or_raw("Oi!", |_| NormalizedText::default());
        assert_eq!(text, "oi!");
    }

    #[test]
    fn successful_normalization_is_kept() {
        let text = normalize_or_raw("Preciso do boleto", |t| Normalizer::default().normalize(t));
        assert!(text.contains("bolet"));
        assert!(!text.contains("do "));
    }

    #[tokio::test]
    async fn custom_rules_engine_is_used() {
        use crate::pipeline::rules::{RulesConfig, Signal};

        let mut rules = RulesEngine::empty(RulesConfig::default());
        rules.add_pattern(r"\bpix\b", Signal::Productive).unwrap();
        let analyzer = EmailAnalyzer::with_rules(AnalyzerConfig::default(), rules, None, None);
        let outcome = analyzer.analyze("pix pix pix recusado").await;
        assert_eq!(outcome.classification.category, Category::Productive);
    }
}
