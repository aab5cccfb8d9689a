//! Arbiter: fuses classifier results into one decision.
//!
//! Two policies are supported:
//! - **WeightedVote** (default): rules always vote; sentiment and LLM votes
//!   are gathered concurrently and counted when they clear their gates.
//! - **StrictPrecedence**: a confident LLM answer wins outright, otherwise
//!   sentiment is reconciled with rules, otherwise rules decide alone.
//!
//! The rules engine runs on every call, whatever the policy.

use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;

use crate::error::ConfigError;
use crate::pipeline::llm_classifier::LlmClassifier;
use crate::pipeline::rules::RulesEngine;
use crate::pipeline::sentiment::SentimentClassifier;
use crate::pipeline::types::{
    Category, ClassificationResult, ClassifierOutcome, METHOD_FALLBACK, Source, WeightedVote,
    hybrid_method,
};

/// How classifier results are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArbiterPolicy {
    #[default]
    WeightedVote,
    StrictPrecedence,
}

impl FromStr for ArbiterPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "weighted" | "weighted_vote" => Ok(Self::WeightedVote),
            "precedence" | "strict_precedence" => Ok(Self::StrictPrecedence),
            other => Err(ConfigError::InvalidValue {
                key: "ARBITER_POLICY".to_string(),
                message: format!("unknown policy '{other}' (expected weighted or precedence)"),
            }),
        }
    }
}

/// Weights, gates and caps for both policies.
#[derive(Debug, Clone)]
pub struct ArbiterConfig {
    pub policy: ArbiterPolicy,
    pub rules_weight: f32,
    pub llm_weight: f32,
    pub sentiment_weight: f32,
    /// LLM votes count only above this confidence.
    pub llm_gate: f32,
    /// Sentiment votes count only above this confidence.
    pub sentiment_gate: f32,
    /// Added to the winning normalized score.
    pub ensemble_boost: f32,
    pub max_confidence: f32,
    /// StrictPrecedence: LLM answers above this win outright.
    pub precedence_llm_gate: f32,
    /// StrictPrecedence: sentiment share of the blended confidence.
    pub blend_sentiment: f32,
    /// StrictPrecedence: rules share of the blended confidence.
    pub blend_rules: f32,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            policy: ArbiterPolicy::WeightedVote,
            rules_weight: 0.6,
            llm_weight: 0.3,
            sentiment_weight: 0.1,
            llm_gate: 0.3,
            sentiment_gate: 0.2,
            ensemble_boost: 0.1,
            max_confidence: 0.95,
            precedence_llm_gate: 0.7,
            blend_sentiment: 0.7,
            blend_rules: 0.3,
        }
    }
}

impl ArbiterConfig {
    fn weight(&self, source: Source) -> f32 {
        match source {
            Source::Rules => self.rules_weight,
            Source::Llm => self.llm_weight,
            Source::SentimentModel => self.sentiment_weight,
        }
    }
}

/// Runs the classifiers and applies the configured policy.
pub struct Arbiter {
    rules: RulesEngine,
    sentiment: SentimentClassifier,
    llm: Arc<LlmClassifier>,
    config: ArbiterConfig,
}

impl Arbiter {
    pub fn new(
        rules: RulesEngine,
        sentiment: SentimentClassifier,
        llm: Arc<LlmClassifier>,
        config: ArbiterConfig,
    ) -> Self {
        Self {
            rules,
            sentiment,
            llm,
            config,
        }
    }

    /// Classify one email. Rules see the raw text; remote sources see the
    /// normalized text.
    pub async fn decide(&self, raw: &str, normalized: &str) -> ClassificationResult {
        let rules = self.rules.classify(raw);
        debug!(
            source = Source::Rules.tag(),
            category = %rules.category,
            confidence = rules.confidence,
            "Rules vote"
        );

        match self.config.policy {
            ArbiterPolicy::WeightedVote => {
                let (sentiment, llm) = tokio::join!(
                    self.sentiment.classify(normalized),
                    self.llm.classify(normalized)
                );
                log_outcome(Source::SentimentModel, &sentiment);
                log_outcome(Source::Llm, &llm);

                let mut votes = vec![WeightedVote {
                    source: Source::Rules,
                    weight: self.config.rules_weight,
                    result: rules,
                }];
                votes.extend(self.gate(Source::Llm, llm, self.config.llm_gate));
                votes.extend(self.gate(
                    Source::SentimentModel,
                    sentiment,
                    self.config.sentiment_gate,
                ));
                weighted_vote(votes, &self.config)
            }
            ArbiterPolicy::StrictPrecedence => {
                let llm = self.llm.classify(normalized).await;
                log_outcome(Source::Llm, &llm);
                let llm = llm.success();
                if llm
                    .as_ref()
                    .is_some_and(|r| r.confidence > self.config.precedence_llm_gate)
                {
                    return precedence(llm, None, rules, &self.config);
                }

                let sentiment = self.sentiment.classify(normalized).await;
                log_outcome(Source::SentimentModel, &sentiment);
                precedence(llm, sentiment.success(), rules, &self.config)
            }
        }
    }

    fn gate(&self, source: Source, outcome: ClassifierOutcome, gate: f32) -> Option<WeightedVote> {
        let result = outcome.success()?;
        if result.confidence > gate {
            Some(WeightedVote {
                source,
                weight: self.config.weight(source),
                result,
            })
        } else {
            debug!(
                source = source.tag(),
                confidence = result.confidence,
                gate,
                "Vote below gate, ignored"
            );
            None
        }
    }
}

fn log_outcome(source: Source, outcome: &ClassifierOutcome) {
    match outcome {
        ClassifierOutcome::Success(result) => debug!(
            source = source.tag(),
            category = %result.category,
            confidence = result.confidence,
            "Classifier vote"
        ),
        other => debug!(source = source.tag(), outcome = other.label(), "No vote"),
    }
}

/// Result used when nothing produced a usable vote.
pub fn fallback_result() -> ClassificationResult {
    ClassificationResult::new(
        Category::Unproductive,
        0.5,
        METHOD_FALLBACK,
        "No classifier produced a usable result",
    )
}

/// Combine gated votes by normalized weighted confidence.
///
/// Votes are reported in source order regardless of the order given.
pub fn weighted_vote(mut votes: Vec<WeightedVote>, config: &ArbiterConfig) -> ClassificationResult {
    votes.sort_by_key(|v| v.source);

    match votes.len() {
        0 => return fallback_result(),
        1 => return votes.remove(0).result,
        _ => {}
    }

    let mut productive = 0.0_f32;
    let mut unproductive = 0.0_f32;
    let mut total_weight = 0.0_f32;
    for vote in &votes {
        let contribution = vote.weight * vote.result.confidence;
        match vote.result.category {
            Category::Productive => productive += contribution,
            Category::Unproductive => unproductive += contribution,
        }
        total_weight += vote.weight;
    }
    if total_weight > 0.0 {
        productive /= total_weight;
        unproductive /= total_weight;
    }

    let (category, score) = if productive > unproductive {
        (Category::Productive, productive)
    } else {
        (Category::Unproductive, unproductive)
    };

    let mut confidence = (score + config.ensemble_boost).min(config.max_confidence);
    if votes.iter().all(|v| v.result.category == category) {
        let strongest = votes
            .iter()
            .map(|v| v.result.confidence)
            .fold(0.0_f32, f32::max);
        confidence = confidence.max(strongest.min(config.max_confidence));
    }

    let sources: Vec<Source> = votes.iter().map(|v| v.source).collect();
    let details: Vec<String> = votes
        .iter()
        .map(|v| format!("{}: {}", v.source.tag(), v.result.reasoning))
        .collect();

    ClassificationResult::new(
        category,
        confidence,
        hybrid_method(&sources),
        format!(
            "Weighted vote: {productive:.2} productive vs {unproductive:.2} unproductive. {}",
            details.join("; ")
        ),
    )
}

/// Strict precedence: confident LLM, then sentiment reconciled with rules,
/// then rules alone.
pub fn precedence(
    llm: Option<ClassificationResult>,
    sentiment: Option<ClassificationResult>,
    rules: ClassificationResult,
    config: &ArbiterConfig,
) -> ClassificationResult {
    if let Some(llm) = llm
        && llm.confidence > config.precedence_llm_gate
    {
        return llm;
    }

    let Some(sentiment) = sentiment.filter(|s| s.confidence > config.sentiment_gate) else {
        return rules;
    };

    if sentiment.category == rules.category {
        let blended =
            config.blend_sentiment * sentiment.confidence + config.blend_rules * rules.confidence;
        return ClassificationResult::new(
            rules.category,
            blended,
            hybrid_method(&[Source::SentimentModel, Source::Rules]),
            format!(
                "Sentiment and rules agree. {}: {}; {}: {}",
                sentiment.method, sentiment.reasoning, rules.method, rules.reasoning
            ),
        );
    }

    let (winner, loser) = if sentiment.confidence > rules.confidence {
        (sentiment, rules)
    } else if rules.confidence > sentiment.confidence {
        (rules, sentiment)
    } else if sentiment.category == Category::Unproductive {
        (sentiment, rules)
    } else {
        (rules, sentiment)
    };

    let reasoning = format!(
        "conflict resolved: {} ({:.2}) > {} ({:.2}). {}",
        winner.method, winner.confidence, loser.method, loser.confidence, winner.reasoning
    );
    ClassificationResult {
        reasoning,
        ..winner
    }
}
