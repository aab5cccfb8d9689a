//! Configuration types.
//!
//! Everything is read once at startup by `AppConfig::from_env()` and passed
//! down explicitly; nothing reads the environment after that.

use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};
use crate::pipeline::arbiter::{ArbiterConfig, ArbiterPolicy};
use crate::pipeline::composer::ComposerConfig;
use crate::pipeline::llm_classifier::LlmClassifierConfig;
use crate::pipeline::normalizer::NormalizerConfig;
use crate::pipeline::rules::RulesConfig;
use crate::sentiment::HuggingFaceConfig;

/// Settings for the analysis pipeline itself.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Inputs with fewer trimmed chars are rejected by validation.
    pub min_text_length: usize,
    pub normalizer: NormalizerConfig,
    pub rules: RulesConfig,
    pub arbiter: ArbiterConfig,
    pub llm: LlmClassifierConfig,
    pub composer: ComposerConfig,
    /// Upper bound on each sentiment model call.
    pub remote_timeout: Duration,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            min_text_length: 10,
            normalizer: NormalizerConfig::default(),
            rules: RulesConfig::default(),
            arbiter: ArbiterConfig::default(),
            llm: LlmClassifierConfig::default(),
            composer: ComposerConfig::default(),
            remote_timeout: Duration::from_secs(30),
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub max_file_size_mb: usize,
    pub analyzer: AnalyzerConfig,
    /// `None` when no API key is set for the chosen backend.
    pub llm: Option<LlmConfig>,
    /// `None` unless `HUGGINGFACE_ENABLED` is true.
    pub huggingface: Option<HuggingFaceConfig>,
}

impl AppConfig {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let port = env.parse_or("PORT", 5000)?;
        let max_file_size_mb = env.parse_or("MAX_FILE_SIZE_MB", 10)?;
        let min_text_length = env.parse_or("MIN_TEXT_LENGTH", 10)?;
        let min_token_length = env.parse_or("MIN_TOKEN_LENGTH", 2)?;
        let remote_timeout = Duration::from_secs(env.parse_or("REMOTE_TIMEOUT_SECS", 30)?);
        let policy: ArbiterPolicy = env.parse_or("ARBITER_POLICY", ArbiterPolicy::WeightedVote)?;

        let llm_classifier = LlmClassifierConfig {
            max_tokens: env.parse_or("LLM_MAX_TOKENS", 10)?,
            temperature: env.parse_or("LLM_TEMPERATURE", 0.1)?,
            timeout: remote_timeout,
            min_text_length,
            ..LlmClassifierConfig::default()
        };

        let analyzer = AnalyzerConfig {
            min_text_length,
            normalizer: NormalizerConfig {
                min_token_length,
                ..NormalizerConfig::default()
            },
            arbiter: ArbiterConfig {
                policy,
                ..ArbiterConfig::default()
            },
            llm: llm_classifier,
            remote_timeout,
            ..AnalyzerConfig::default()
        };

        let backend: LlmBackend = env.parse_or("LLM_BACKEND", LlmBackend::OpenAi)?;
        let llm = env.get(backend.api_key_var()).map(|key| LlmConfig {
            backend,
            api_key: SecretString::from(key),
            model: env
                .get("LLM_MODEL")
                .unwrap_or_else(|| default_model(backend).to_string()),
        });

        let huggingface = if env.parse_or("HUGGINGFACE_ENABLED", false)? {
            let defaults = HuggingFaceConfig::default();
            Some(HuggingFaceConfig {
                model: env.get("HUGGINGFACE_MODEL").unwrap_or(defaults.model),
                base_url: env.get("HUGGINGFACE_BASE_URL").unwrap_or(defaults.base_url),
                api_key: env.get("HUGGINGFACE_API_KEY").map(SecretString::from),
            })
        } else {
            None
        };

        Ok(Self {
            port,
            max_file_size_mb,
            analyzer,
            llm,
            huggingface,
        })
    }

    /// Request body limit in bytes.
    pub fn max_body_bytes(&self) -> usize {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

fn default_model(backend: LlmBackend) -> &'static str {
    match backend {
        LlmBackend::OpenAi => "gpt-4o-mini",
        LlmBackend::Anthropic => "claude-3-5-haiku-latest",
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Non-empty value for `key`.
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("'{raw}': {e}"),
            }),
        }
    }
}
