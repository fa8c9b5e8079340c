pub mod sections;
pub mod lexicon;
pub mod extractors;
pub mod rule_based;
pub mod llm;
pub mod orchestrator;

use thiserror::Error;

/// The LLM parse path is unavailable. Recovered locally by falling back
/// to the rule-based parser; never surfaced past the orchestrator.
#[derive(Error, Debug)]
pub enum ParserUnavailable {
    #[error("LLM parser disabled by feature flag")]
    Disabled,

    #[error("no LLM credential configured")]
    NoCredential,

    #[error("daily token budget exhausted ({used} of {limit} tokens used)")]
    BudgetExhausted { used: u64, limit: u64 },

    #[error("LLM provider error: {0}")]
    Provider(String),

    #[error("LLM output failed schema validation: {0}")]
    SchemaValidation(String),

    #[error("hallucination bound exceeded: {unaligned} of {total} rules have unlocatable evidence")]
    HallucinationBound { unaligned: usize, total: usize },

    #[error("degenerate LLM output: {0}")]
    DegenerateOutput(String),
}
