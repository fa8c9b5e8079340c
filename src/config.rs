use std::env;

use crate::models::enums::RuleField;

/// Application-level constants
pub const APP_NAME: &str = "Trialscout";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> String {
    "info,trialscout=debug".to_string()
}

/// Configuration for the LLM eligibility parser and its gates.
///
/// Every threshold here is policy, not structure: the gate ORDER is fixed
/// in `parser::llm::parser`, but the values are tunable per deployment.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Feature flag. Disabled means the rule-based parser runs alone.
    pub enabled: bool,
    /// Provider credential. Absent credential disables the LLM path
    /// before any network call.
    pub api_key: Option<String>,
    /// OpenAI-compatible chat-completions endpoint base URL.
    pub base_url: String,
    pub model: String,
    /// Per-call HTTP timeout. A stuck provider never blocks a batch.
    pub timeout_secs: u64,
    /// Hard daily cost ceiling in tokens, shared across parse requests.
    pub daily_token_budget: u64,
    /// Maximum tolerated fraction of rules whose evidence cannot be
    /// located in the source text.
    pub hallucination_threshold: f32,
    /// Absolute minimum rule count for an LLM parse to be accepted.
    pub min_rules: usize,
    /// Minimum ratio of LLM rule count to the rule-based baseline count.
    pub min_rule_ratio: f32,
    /// Fields backfilled from the rule-based baseline when the LLM
    /// output omits them entirely.
    pub critical_fields: Vec<RuleField>,
    /// Eligibility text is truncated to this many characters before
    /// being sent to the provider.
    pub max_input_chars: usize,
    /// Completion-size allowance added to the prompt estimate when
    /// reserving budget ahead of a call.
    pub completion_token_allowance: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 60,
            daily_token_budget: 500_000,
            hallucination_threshold: 0.2,
            min_rules: 1,
            min_rule_ratio: 0.5,
            critical_fields: vec![RuleField::Age, RuleField::Sex, RuleField::History],
            max_input_chars: 24_000,
            completion_token_allowance: 1_024,
        }
    }
}

impl LlmConfig {
    /// Load configuration from the environment, falling back to defaults.
    ///
    /// `LLM_DAILY_TOKEN_BUDGET` is the authoritative cost ceiling name;
    /// the remaining knobs are prefixed `TRIALSCOUT_`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: env_bool("TRIALSCOUT_LLM_ENABLED", defaults.enabled),
            api_key: env::var("TRIALSCOUT_LLM_API_KEY").ok().filter(|k| !k.is_empty()),
            base_url: env::var("TRIALSCOUT_LLM_BASE_URL").unwrap_or(defaults.base_url),
            model: env::var("TRIALSCOUT_LLM_MODEL").unwrap_or(defaults.model),
            timeout_secs: env_parse("TRIALSCOUT_LLM_TIMEOUT_SECS", defaults.timeout_secs),
            daily_token_budget: env_parse("LLM_DAILY_TOKEN_BUDGET", defaults.daily_token_budget),
            hallucination_threshold: env_parse(
                "TRIALSCOUT_HALLUCINATION_THRESHOLD",
                defaults.hallucination_threshold,
            ),
            min_rules: env_parse("TRIALSCOUT_LLM_MIN_RULES", defaults.min_rules),
            min_rule_ratio: env_parse("TRIALSCOUT_LLM_MIN_RULE_RATIO", defaults.min_rule_ratio),
            critical_fields: defaults.critical_fields,
            max_input_chars: defaults.max_input_chars,
            completion_token_allowance: defaults.completion_token_allowance,
        }
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
