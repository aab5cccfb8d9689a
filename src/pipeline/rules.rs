//! Rule-based classifier: weighted regex pattern density.
//!
//! Always available and infallible. Scores the raw email text against a
//! productive-signal table and an unproductive-signal table:
//! - matches per table are normalized by word count (×100) into a density
//! - a density above its threshold decides the category
//! - otherwise the larger density wins with a weak fixed confidence
//!
//! This is the classifier of last resort; the arbiter never skips it.

use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::pipeline::types::{Category, ClassificationResult, Source};

/// Portuguese vocabulary of requests, status checks, problems, and finance.
const PRODUCTIVE_PATTERNS: &[&str] = &[
    r"\b(status|situação|andamento|progresso|atualização|atualizar)\b",
    r"\b(requisição|solicitação|pedido|demanda|solicitar|requerer)\b",
    r"\b(processo|protocolo|ticket|chamado|processar)\b",
    r"\b(problema|erro|bug|falha|não\s+funciona|dificuldade)\b",
    r"\b(documento|arquivo|anexo|comprovante|certificado)\b",
    r"\b(aprovar|rejeitar|validar|confirmar|autorizar)\b",
    r"\b(urgente|emergência|crítico|prioridade|importante)\b",
    r"\b(compliance|regulamentação|auditoria|conformidade)\b",
    r"\b(suporte|assistência|orientação)\b",
    r"\b(empréstimo|financiamento|crédito|cartão)\b",
    r"\b(pagamento|cobrança|fatura|boleto)\b",
    r"\b(cadastro|informação|dados\s+da\s+conta)\b",
    r"\b(relatório|extrato|demonstrativo)\b",
    r"\b(reunião|agendamento|compromisso)\b",
    r"\b(preciso\s+de|necessito|gostaria\s+de)\b",
    r"\b(quando\s+será|quando\s+posso|quando\s+está)\b",
    r"\b(por\s+favor|favor\s+verificar)\b",
    r"\b(solicitação\s+de\s+crédito|pedido\s+de\s+crédito|crédito\s+solicitado)\b",
    r"\b(abri\s+na\s+semana|abri\s+ontem|abri\s+hoje|abri\s+na\s+quinta|abri\s+na\s+sexta)\b",
    r"\b(já\s+há|já\s+existe|já\s+tem|já\s+foi)\b",
    r"\b(alguma\s+atualização|atualização|novidade|informação)\b",
    r"\b(referente\s+à|sobre\s+a|relacionado\s+à|sobre\s+o)\b",
    r"\b(saber\s+se|gostaria\s+de\s+saber|quero\s+saber|preciso\s+saber)\b",
];

/// Greetings, celebrations, marketing, and small talk.
const UNPRODUCTIVE_PATTERNS: &[&str] = &[
    r"\b(feliz\s+natal|boas\s+férias|feliz\s+ano\s+novo|felicitações)\b",
    r"\b(parabéns|felicitações|comemoração|celebração)\b",
    r"\b(olá\s*$|oi\s*$|bom\s+dia\s*$|boa\s+tarde\s*$|boa\s+noite\s*$)\b",
    r"\b(promoção|oferta|desconto|cupom|marketing)\b",
    r"\b(pessoal|particular|privado|familiar)\b",
    r"\b(conversa|bate-papo|fofoca|rumor)\b",
    r"\b(como\s+vai|tudo\s+bem|espero\s+que\s+esteja\s+bem)\b",
    r"\b(apenas\s+para\s+dizer|só\s+para\s+cumprimentar|só\s+passando)\b",
    r"\b(divulgando|compartilhando|curtir|seguir)\b",
    r"\b(redes\s+sociais|facebook|instagram|whatsapp)\b",
];

/// Which category a pattern signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Productive,
    Unproductive,
}

/// A single compiled pattern.
#[derive(Debug, Clone)]
pub struct PatternRule {
    /// Source pattern text.
    pub pattern: String,
    /// Compiled, case-insensitive regex.
    pub regex: Regex,
    /// Category this pattern is evidence for.
    pub signal: Signal,
}

/// Decision thresholds for the rules classifier.
#[derive(Debug, Clone)]
pub struct RulesConfig {
    /// Productive density (matches per 100 words) that decides Productive.
    pub productive_threshold: f32,
    /// Unproductive density that decides Unproductive.
    pub unproductive_threshold: f32,
    /// Confidence when a threshold is crossed, before the density margin.
    pub base_confidence: f32,
    /// Confidence gained per point of density margin.
    pub margin_slope: f32,
    /// Upper bound on confidence.
    pub max_confidence: f32,
    /// Confidence when neither threshold is crossed.
    pub weak_confidence: f32,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            productive_threshold: 10.0,
            unproductive_threshold: 5.0,
            base_confidence: 0.7,
            margin_slope: 0.01,
            max_confidence: 0.95,
            weak_confidence: 0.6,
        }
    }
}

/// Match counts and densities for one text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternScores {
    pub productive_matches: usize,
    pub unproductive_matches: usize,
    pub productive_density: f32,
    pub unproductive_density: f32,
}

/// Pattern-density classifier.
pub struct RulesEngine {
    rules: Vec<PatternRule>,
    config: RulesConfig,
}

impl RulesEngine {
    /// Create a rules engine with the built-in pattern tables.
    pub fn default_rules(config: RulesConfig) -> Self {
        let productive = PRODUCTIVE_PATTERNS
            .iter()
            .map(|p| compile_rule(p, Signal::Productive).unwrap());
        let unproductive = UNPRODUCTIVE_PATTERNS
            .iter()
            .map(|p| compile_rule(p, Signal::Unproductive).unwrap());

        Self {
            rules: productive.chain(unproductive).collect(),
            config,
        }
    }

    /// Create an empty rules engine (for testing).
    pub fn empty(config: RulesConfig) -> Self {
        Self {
            rules: Vec::new(),
            config,
        }
    }

    /// Add a custom pattern.
    pub fn add_pattern(&mut self, pattern: &str, signal: Signal) -> Result<(), regex::Error> {
        self.rules.push(compile_rule(pattern, signal)?);
        Ok(())
    }

    /// Number of loaded patterns.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Count matches per signal and derive densities.
    pub fn score(&self, text: &str) -> PatternScores {
        let lowered = text.to_lowercase();
        let lowered = lowered.trim();

        let mut productive_matches = 0;
        let mut unproductive_matches = 0;
        for rule in &self.rules {
            let count = rule.regex.find_iter(lowered).count();
            if count > 0 {
                debug!(pattern = %rule.pattern, signal = ?rule.signal, count, "Pattern matched");
            }
            match rule.signal {
                Signal::Productive => productive_matches += count,
                Signal::Unproductive => unproductive_matches += count,
            }
        }

        let words = lowered.split_whitespace().count().max(1) as f32;
        PatternScores {
            productive_matches,
            unproductive_matches,
            productive_density: productive_matches as f32 / words * 100.0,
            unproductive_density: unproductive_matches as f32 / words * 100.0,
        }
    }

    /// Classify raw email text.
    pub fn classify(&self, text: &str) -> ClassificationResult {
        let scores = self.score(text);
        let cfg = &self.config;
        let p = scores.productive_density;
        let u = scores.unproductive_density;

        let margin_confidence =
            |margin: f32| (cfg.base_confidence + margin * cfg.margin_slope).min(cfg.max_confidence);

        let (category, confidence) = if p > cfg.productive_threshold {
            (Category::Productive, margin_confidence(p - u))
        } else if u > cfg.unproductive_threshold {
            (Category::Unproductive, margin_confidence(u - p))
        } else if p > u {
            (Category::Productive, cfg.weak_confidence)
        } else {
            (Category::Unproductive, cfg.weak_confidence)
        };

        debug!(
            productive = scores.productive_matches,
            unproductive = scores.unproductive_matches,
            productive_density = p,
            unproductive_density = u,
            category = %category,
            "Rules classification"
        );

        ClassificationResult::new(
            category,
            confidence,
            Source::Rules.tag(),
            format!(
                "Patterns found: {} productive, {} unproductive",
                scores.productive_matches, scores.unproductive_matches
            ),
        )
    }
}

fn compile_rule(pattern: &str, signal: Signal) -> Result<PatternRule, regex::Error> {
    let regex = RegexBuilder::new(pattern).case_insensitive(true).build()?;
    Ok(PatternRule {
        pattern: pattern.to_string(),
        regex,
        signal,
    })
}
