//! LLM classifier and reply generator.
//!
//! Both calls are bounded by a timeout and never propagate errors: every
//! provider failure is logged and collapses to "no result".

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::error::LlmError;
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::pipeline::types::{Category, ClassificationResult, ClassifierOutcome, Source};

/// Confidence for a recognized one-word answer.
const CONFIDENCE_HIGH: f32 = 0.9;

/// Confidence when the answer could not be recognized.
const CONFIDENCE_LOW: f32 = 0.6;

const CLASSIFICATION_SYSTEM_PROMPT: &str =
    "Você é um especialista em classificação de emails corporativos do setor financeiro. \
     Seja preciso e conciso.";

const REPLY_SYSTEM_PROMPT: &str = "Você é um assistente corporativo. Seja conciso e profissional.";

/// Settings for LLM calls.
#[derive(Debug, Clone)]
pub struct LlmClassifierConfig {
    /// Token budget for the classification answer. Replies get twice this.
    pub max_tokens: u32,
    /// Temperature for classification (deterministic-leaning).
    pub temperature: f32,
    /// Temperature for reply generation.
    pub reply_temperature: f32,
    /// Upper bound on each remote call.
    pub timeout: Duration,
    /// Texts shorter than this are not sent.
    pub min_text_length: usize,
}

impl Default for LlmClassifierConfig {
    fn default() -> Self {
        Self {
            max_tokens: 10,
            temperature: 0.1,
            reply_temperature: 0.5,
            timeout: Duration::from_secs(30),
            min_text_length: 10,
        }
    }
}

/// Optional LLM-backed classifier.
pub struct LlmClassifier {
    llm: Option<Arc<dyn LlmProvider>>,
    config: LlmClassifierConfig,
}

impl LlmClassifier {
    pub fn new(llm: Arc<dyn LlmProvider>, config: LlmClassifierConfig) -> Self {
        Self {
            llm: Some(llm),
            config,
        }
    }

    /// A classifier with no credential configured.
    pub fn disabled() -> Self {
        Self {
            llm: None,
            config: LlmClassifierConfig::default(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.llm.is_some()
    }

    /// Classify normalized text.
    pub async fn classify(&self, text: &str) -> ClassifierOutcome {
        let Some(ref llm) = self.llm else {
            return ClassifierOutcome::Unavailable;
        };
        let trimmed = text.trim();
        if trimmed.chars().count() < self.config.min_text_length {
            warn!(
                length = trimmed.chars().count(),
                "Text too short for LLM classification"
            );
            return ClassifierOutcome::Unavailable;
        }

        let request = CompletionRequest::new(vec![
            ChatMessage::system(CLASSIFICATION_SYSTEM_PROMPT),
            ChatMessage::user(build_classification_prompt(trimmed)),
        ])
        .with_max_tokens(self.config.max_tokens)
        .with_temperature(self.config.temperature);

        match self.call(llm.as_ref(), request).await {
            Ok(content) => {
                let result = parse_classification_reply(&content);
                debug!(
                    raw = %content,
                    category = %result.category,
                    confidence = result.confidence,
                    "LLM classification"
                );
                ClassifierOutcome::Success(result)
            }
            Err(e) => {
                log_failure("classification", &e);
                ClassifierOutcome::TransientError(e.to_string())
            }
        }
    }

    /// Generate a reply for an already-classified email.
    pub async fn generate_reply(&self, text: &str, category: Category) -> Option<String> {
        let llm = self.llm.as_ref()?;

        let request = CompletionRequest::new(vec![
            ChatMessage::system(REPLY_SYSTEM_PROMPT),
            ChatMessage::user(build_reply_prompt(text, category)),
        ])
        .with_max_tokens(self.config.max_tokens.saturating_mul(2))
        .with_temperature(self.config.reply_temperature);

        match self.call(llm.as_ref(), request).await {
            Ok(content) => {
                let reply = content.trim();
                if reply.is_empty() {
                    None
                } else {
                    info!(chars = reply.chars().count(), "LLM reply generated");
                    Some(reply.to_string())
                }
            }
            Err(e) => {
                log_failure("reply generation", &e);
                None
            }
        }
    }

    async fn call(
        &self,
        llm: &dyn LlmProvider,
        request: CompletionRequest,
    ) -> Result<String, LlmError> {
        match tokio::time::timeout(self.config.timeout, llm.complete(request)).await {
            Ok(response) => response.map(|r| r.content),
            Err(_) => Err(LlmError::Timeout {
                provider: llm.model_name().to_string(),
                timeout: self.config.timeout,
            }),
        }
    }
}

fn log_failure(operation: &str, e: &LlmError) {
    match e {
        LlmError::QuotaExceeded { .. } => error!(
            operation,
            error = %e,
            "LLM quota exhausted, continuing without LLM"
        ),
        LlmError::RateLimited { .. } => warn!(operation, error = %e, "LLM rate limited"),
        LlmError::Timeout { .. } => warn!(operation, error = %e, "LLM call timed out"),
        _ => error!(operation, error = %e, "LLM call failed"),
    }
}

// ── Prompt construction ─────────────────────────────────────────────

fn build_classification_prompt(text: &str) -> String {
    format!(
        "Classifique este email como PRODUTIVO ou IMPRODUTIVO:\n\n\
         Email: {text}\n\n\
         Responda apenas: PRODUTIVO ou IMPRODUTIVO"
    )
}

fn build_reply_prompt(text: &str, category: Category) -> String {
    match category {
        Category::Productive => format!(
            "Gere uma resposta profissional para este email produtivo:\n\n\
             Email: {text}\n\n\
             Responda de forma concisa confirmando que será processado."
        ),
        Category::Unproductive => format!(
            "Gere uma resposta educada para este email:\n\n\
             Email: {text}\n\n\
             Responda de forma breve e profissional."
        ),
    }
}

// ── Response parsing ────────────────────────────────────────────────

/// Parse the model's one-word answer.
///
/// Matching is exact after trimming punctuation: "improdutivo" contains
/// "produtivo", so substring checks would misread it.
pub fn parse_classification_reply(raw: &str) -> ClassificationResult {
    let answer = raw
        .trim()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();

    let category = match answer.as_str() {
        "produtivo" | "productive" => Some(Category::Productive),
        "improdutivo" | "unproductive" => Some(Category::Unproductive),
        _ => None,
    };

    match category {
        Some(category) => ClassificationResult::new(
            category,
            CONFIDENCE_HIGH,
            Source::Llm.tag(),
            format!("LLM classification: {}", raw.trim()),
        ),
        None => ClassificationResult::new(
            Category::Unproductive,
            CONFIDENCE_LOW,
            Source::Llm.tag(),
            format!("Ambiguous LLM classification: {}", raw.trim()),
        ),
    }
}
