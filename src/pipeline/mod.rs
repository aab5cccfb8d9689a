//! Hybrid classification pipeline.
//!
//! Every email flows through:
//! 1. `Normalizer::normalize()`: PII redaction, stop-words, stemming
//! 2. `Arbiter::decide()`: rules (always) plus optional sentiment and LLM
//! 3. `ResponseComposer::compose()`: generated or template reply
//!
//! `EmailAnalyzer` wires the stages together.

pub mod arbiter;
pub mod composer;
pub mod llm_classifier;
pub mod normalizer;
pub mod processor;
pub mod rules;
pub mod sentiment;
pub mod types;

pub use processor::EmailAnalyzer;
