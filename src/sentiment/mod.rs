//! Sentiment-scoring capability.
//!
//! The classifier pipeline only needs a list of `(label, score)` pairs
//! for a piece of text. `HuggingFaceProvider` serves them from a hosted
//! inference endpoint; tests plug in stubs.

mod huggingface;

pub use huggingface::{HuggingFaceConfig, HuggingFaceProvider};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SentimentError;

/// One label emitted by a sentiment model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentScore {
    pub label: String,
    pub score: f32,
}

/// Sentiment-scoring capability.
#[async_trait]
pub trait SentimentProvider: Send + Sync {
    /// Model identifier.
    fn model_name(&self) -> &str;

    /// Score a text, returning every label the model produced.
    async fn score(&self, text: &str) -> Result<Vec<SentimentScore>, SentimentError>;
}
