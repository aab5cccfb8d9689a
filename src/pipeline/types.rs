//! Shared types for the classification pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Category ────────────────────────────────────────────────────────

/// Business category of an email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Requires operational action (request, status check, problem report).
    Productive,
    /// Needs no action beyond acknowledgment (greetings, thanks, chatter).
    Unproductive,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Productive => "productive",
            Self::Unproductive => "unproductive",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Sources & method tags ───────────────────────────────────────────

/// Identity of a classifier contributing to a decision.
///
/// Declaration order is the fixed reporting order used by the arbiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Source {
    Rules,
    Llm,
    SentimentModel,
}

impl Source {
    /// Method tag reported in `ClassificationResult::method`.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Rules => "rules",
            Self::Llm => "llm",
            Self::SentimentModel => "sentiment-model",
        }
    }
}

/// Method tag for results short-circuited by input validation.
pub const METHOD_VALIDATION: &str = "validation";

/// Method tag when no classifier produced a usable result.
pub const METHOD_FALLBACK: &str = "fallback";

/// Build a composite method tag, e.g. `hybrid(rules+llm)`.
pub fn hybrid_method(sources: &[Source]) -> String {
    let tags: Vec<&str> = sources.iter().map(Source::tag).collect();
    format!("hybrid({})", tags.join("+"))
}

// ── Classification result ───────────────────────────────────────────

/// Output of any classifier and of the arbiter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub category: Category,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    /// Provenance tag (`rules`, `llm`, `sentiment-model`, `hybrid(...)`, ...).
    pub method: String,
    /// Human-readable justification.
    pub reasoning: String,
}

impl ClassificationResult {
    pub fn new(
        category: Category,
        confidence: f32,
        method: impl Into<String>,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            category,
            confidence: confidence.clamp(0.0, 1.0),
            method: method.into(),
            reasoning: reasoning.into(),
        }
    }

    /// Whether the given source took part in this decision.
    pub fn involves(&self, source: Source) -> bool {
        self.method
            .split(|c| c == '(' || c == ')' || c == '+')
            .any(|part| part == source.tag())
    }
}

// ── Classifier outcome ──────────────────────────────────────────────

/// What an optional classifier produced for one call.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifierOutcome {
    /// The classifier produced a result.
    Success(ClassificationResult),
    /// The classifier is disabled, unconfigured, or not applicable to the input.
    Unavailable,
    /// The classifier is configured but the call failed.
    TransientError(String),
}

impl ClassifierOutcome {
    /// The result, if the call succeeded.
    pub fn success(self) -> Option<ClassificationResult> {
        match self {
            Self::Success(result) => Some(result),
            Self::Unavailable | Self::TransientError(_) => None,
        }
    }

    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Unavailable => "unavailable",
            Self::TransientError(_) => "transient_error",
        }
    }
}

// ── Weighted vote ───────────────────────────────────────────────────

/// A classifier result paired with its source's trust weight.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedVote {
    pub source: Source,
    pub result: ClassificationResult,
    pub weight: f32,
}

// ── Analysis outcome ────────────────────────────────────────────────

/// Who produced the reply text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratedBy {
    Template,
    Llm,
}

/// Reply text plus follow-up actions for a classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposedResponse {
    pub response: String,
    pub suggested_actions: Vec<String>,
    pub generated_by: GeneratedBy,
}

/// Complete result of analyzing one email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub classification: ClassificationResult,
    pub response: String,
    pub suggested_actions: Vec<String>,
    pub generated_by: GeneratedBy,
}

impl AnalysisOutcome {
    pub fn new(classification: ClassificationResult, composed: ComposedResponse) -> Self {
        Self {
            classification,
            response: composed.response,
            suggested_actions: composed.suggested_actions,
            generated_by: composed.generated_by,
        }
    }

    /// Confidence rendered as a percentage, e.g. `87.5%`.
    pub fn confidence_percent(&self) -> String {
        format!("{:.1}%", self.classification.confidence * 100.0)
    }
}
