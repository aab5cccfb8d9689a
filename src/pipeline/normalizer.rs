//! Text normalization for the classifiers.
//!
//! Pipeline: lower-case → PII redaction → punctuation/digit stripping →
//! whitespace collapse → tokenization → stop-word removal → length filter
//! → stemming. Each stage is a standalone function so it can be tested in
//! isolation.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::LazyLock;

use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use tracing::warn;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\w.+-]+@[\w-]+(?:\.[\w-]+)+").unwrap());

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:https?://|www\.)\S+").unwrap());

/// `(DD) DDDD-DDDD` and `(DD) DDDDD-DDDD`.
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\d{2}\)\s?\d{4,5}-\d{4}").unwrap());

/// National-ID-like numbers: `DD.DDD.DDD-DD` (and the 3-digit-prefix variant).
static NATIONAL_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{2,3}\.\d{3}\.\d{3}-\d{2}\b").unwrap());

static NON_WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]|_").unwrap());

static DIGIT_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d+\b").unwrap());

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").unwrap());

const STOP_WORDS: &[&str] = &[
    "a", "à", "ao", "aos", "aquela", "aquelas", "aquele", "aqueles", "aquilo", "as", "às",
    "até", "com", "como", "da", "das", "de", "dela", "delas", "dele", "deles", "depois", "do",
    "dos", "e", "é", "ela", "elas", "ele", "eles", "em", "entre", "era", "eram", "éramos",
    "essa", "essas", "esse", "esses", "esta", "está", "estamos", "estão", "estar", "estas",
    "estava", "estavam", "este", "esteja", "estes", "esteve", "estive", "estou", "eu", "foi",
    "fomos", "for", "foram", "fosse", "fossem", "fui", "há", "isso", "isto", "já", "lhe",
    "lhes", "mais", "mas", "me", "mesmo", "meu", "meus", "minha", "minhas", "muito", "na",
    "não", "nas", "nem", "no", "nos", "nós", "nossa", "nossas", "nosso", "nossos", "num",
    "numa", "o", "os", "ou", "para", "pela", "pelas", "pelo", "pelos", "por", "qual",
    "quando", "que", "quem", "são", "se", "seja", "sejam", "sem", "ser", "será", "seu",
    "seus", "só", "somos", "sou", "sua", "suas", "também", "te", "tem", "têm", "temos",
    "tenho", "ter", "teu", "teus", "tu", "tua", "tuas", "um", "uma", "você", "vocês", "vos",
];

/// Stop-words that must survive filtering: negations flip meaning, and the
/// rest carry urgency or follow-up intent. Entries must be longer than the
/// minimum token length or the length filter drops them anyway.
const KEEP_WORDS: &[&str] = &[
    "não", "nao", "nem", "nunca", "jamais", "sem", "quando", "mais", "muito",
];

static STOP_SET: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    let keep: HashSet<&str> = KEEP_WORDS.iter().copied().collect();
    STOP_WORDS
        .iter()
        .copied()
        .filter(|w| !keep.contains(w))
        .collect()
});

/// Normalizer settings.
#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    /// Tokens at or below this many chars are dropped.
    pub min_token_length: usize,
    /// Apply Portuguese stemming to surviving tokens.
    pub stemming: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            min_token_length: 2,
            stemming: true,
        }
    }
}

/// Tokens produced for one analysis call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedText {
    pub tokens: Vec<String>,
    pub joined: String,
}

impl NormalizedText {
    fn from_tokens(tokens: Vec<String>) -> Self {
        let joined = tokens.join(" ");
        Self { tokens, joined }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Text normalizer.
pub struct Normalizer {
    config: NormalizerConfig,
    stemmer: Stemmer,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self {
            config,
            stemmer: Stemmer::create(Algorithm::Portuguese),
        }
    }

    /// Normalize text into filtered, stemmed tokens.
    ///
    /// Input length is not validated here; the joined output normalizes
    /// to the same tokens when stemming is off.
    pub fn normalize(&self, text: &str) -> NormalizedText {
        let lowered = text.to_lowercase();
        let cleaned = collapse_whitespace(&strip_punctuation(&redact_pii(lowered.trim())));
        if cleaned.is_empty() {
            return NormalizedText::default();
        }

        let tokens = tokenize_or_split(&cleaned, tokenize);

        let tokens = remove_stop_words(tokens)
            .into_iter()
            .filter(|t| t.chars().count() > self.config.min_token_length)
            .filter_map(|t| self.stem(t))
            .collect();

        NormalizedText::from_tokens(tokens)
    }

    /// Stem one token, keeping the original when the stem is too short.
    fn stem(&self, token: String) -> Option<String> {
        let min = self.config.min_token_length;
        if !self.config.stemming {
            return (token.chars().count() > min).then_some(token);
        }
        let stemmed = self.stemmer.stem(&token);
        if stemmed.chars().count() > min {
            Some(stemmed.into_owned())
        } else if token.chars().count() > min {
            Some(token)
        } else {
            None
        }
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(NormalizerConfig::default())
    }
}

/// Replace e-mail addresses, URLs, phone numbers and ID numbers with a space.
pub fn redact_pii(text: &str) -> String {
    let text = URL_RE.replace_all(text, " ");
    let text = EMAIL_RE.replace_all(&text, " ");
    let text = PHONE_RE.replace_all(&text, " ");
    NATIONAL_ID_RE.replace_all(&text, " ").into_owned()
}

/// Drop punctuation, underscores and standalone digit runs.
pub fn strip_punctuation(text: &str) -> String {
    let text = NON_WORD_RE.replace_all(text, " ");
    DIGIT_RUN_RE.replace_all(&text, " ").into_owned()
}

/// Collapse whitespace runs into one space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text, " ").trim().to_string()
}

/// Split into word tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    WORD_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Run `tokenizer`, falling back to a whitespace split if it panics.
pub fn tokenize_or_split<F>(text: &str, tokenizer: F) -> Vec<String>
where
    F: Fn(&str) -> Vec<String>,
{
    match panic::catch_unwind(AssertUnwindSafe(|| tokenizer(text))) {
        Ok(tokens) => tokens,
        Err(_) => {
            warn!("Tokenizer failed, falling back to whitespace split");
            text.split_whitespace().map(str::to_string).collect()
        }
    }
}

/// Remove stop-words, keeping negations and domain-salient terms.
pub fn remove_stop_words(tokens: Vec<String>) -> Vec<String> {
    tokens
        .into_iter()
        .filter(|t| !STOP_SET.contains(t.as_str()))
        .collect()
}
