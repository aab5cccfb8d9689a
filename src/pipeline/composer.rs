//! Response composer: reply text and follow-up actions for a classification.
//!
//! A generated reply is attempted only for confident decisions the LLM took
//! part in; everything else gets the per-category template.

use std::sync::Arc;

use tracing::debug;

use crate::pipeline::llm_classifier::LlmClassifier;
use crate::pipeline::types::{Category, ClassificationResult, ComposedResponse, GeneratedBy, Source};

const PRODUCTIVE_TEMPLATE: &str = "Obrigado pelo contato. Sua solicitação foi registrada e \
     está sendo processada pela nossa equipe. Retornaremos em até 24 horas úteis com as \
     informações solicitadas.";

const UNPRODUCTIVE_TEMPLATE: &str = "Obrigado pela mensagem. Caso tenha alguma solicitação \
     específica sobre nossos serviços, estamos à disposição para ajudar.";

const PRODUCTIVE_ACTIONS: &[&str] = &[
    "Registrar no sistema de tickets",
    "Verificar status da solicitação",
    "Processar conforme procedimento",
    "Arquivar na pasta do cliente",
    "Responder em até 24h úteis",
];

const UNPRODUCTIVE_ACTIONS: &[&str] = &[
    "Arquivar como comunicação social",
    "Não requer ação específica",
    "Manter para referência futura",
];

const UNKNOWN_ACTIONS: &[&str] = &[
    "Avaliar necessidade de resposta",
    "Arquivar para análise posterior",
];

#[derive(Debug, Clone)]
pub struct ComposerConfig {
    /// Generated replies are attempted only above this confidence.
    pub min_confidence: f32,
    /// Generated replies must be longer than this many chars.
    pub min_response_length: usize,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.8,
            min_response_length: 20,
        }
    }
}

pub struct ResponseComposer {
    llm: Arc<LlmClassifier>,
    config: ComposerConfig,
}

impl ResponseComposer {
    pub fn new(llm: Arc<LlmClassifier>, config: ComposerConfig) -> Self {
        Self { llm, config }
    }

    /// Build the reply for a classified email.
    pub async fn compose(
        &self,
        normalized: &str,
        classification: &ClassificationResult,
    ) -> ComposedResponse {
        let category = classification.category;

        if self.wants_generated_reply(classification)
            && let Some(reply) = self.llm.generate_reply(normalized, category).await
        {
            if reply.chars().count() > self.config.min_response_length {
                return ComposedResponse {
                    response: reply,
                    suggested_actions: suggested_actions_for(Some(category)),
                    generated_by: GeneratedBy::Llm,
                };
            }
            debug!(
                chars = reply.chars().count(),
                "Generated reply too short, using template"
            );
        }

        template_response(category)
    }

    fn wants_generated_reply(&self, classification: &ClassificationResult) -> bool {
        self.llm.is_available()
            && classification.involves(Source::Llm)
            && classification.confidence > self.config.min_confidence
    }
}

/// The fixed reply for a category.
pub fn template_response(category: Category) -> ComposedResponse {
    let response = match category {
        Category::Productive => PRODUCTIVE_TEMPLATE,
        Category::Unproductive => UNPRODUCTIVE_TEMPLATE,
    };
    ComposedResponse {
        response: response.to_string(),
        suggested_actions: suggested_actions_for(Some(category)),
        generated_by: GeneratedBy::Template,
    }
}

/// Follow-up actions for a category; `None` when the category is unknown.
pub fn suggested_actions_for(category: Option<Category>) -> Vec<String> {
    let actions = match category {
        Some(Category::Productive) => PRODUCTIVE_ACTIONS,
        Some(Category::Unproductive) => UNPRODUCTIVE_ACTIONS,
        None => UNKNOWN_ACTIONS,
    };
    actions.iter().map(|a| a.to_string()).collect()
}
