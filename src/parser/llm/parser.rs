//! The gated LLM eligibility parser (llm_v1).
//!
//! Gate order is fixed: feature flag/credential, budget reservation,
//! provider call, schema validation (one repair retry), evidence
//! alignment, rule-count sanity, critical-field backfill. Any gate
//! failure raises ParserUnavailable and the caller falls back to the
//! rule-based output. Every attempt is logged with token counts.

use super::budget::{estimate_tokens, TokenBudget};
use super::client::LlmClient;
use super::gates::{align_evidence, backfill_critical_fields, check_count_sanity};
use super::prompt::{build_user_prompt, repair_suffix, sanitize_for_llm, ELIGIBILITY_SYSTEM_PROMPT};
use super::schema;
use crate::config::LlmConfig;
use crate::models::rule::EligibilityRule;
use crate::parser::rule_based::RuleBasedParse;
use crate::parser::ParserUnavailable;

/// Initial call plus one repair retry after a schema failure.
const MAX_ATTEMPTS: usize = 2;

pub struct LlmParser {
    config: LlmConfig,
    client: Box<dyn LlmClient + Send + Sync>,
}

impl LlmParser {
    pub fn new(config: LlmConfig, client: Box<dyn LlmClient + Send + Sync>) -> Self {
        Self { config, client }
    }

    /// Parse eligibility text through the LLM, gated against the shared
    /// daily budget and the rule-based baseline for the same text.
    pub fn parse(
        &self,
        eligibility_text: &str,
        baseline: &RuleBasedParse,
        budget: &TokenBudget,
    ) -> Result<Vec<EligibilityRule>, ParserUnavailable> {
        if !self.config.enabled {
            return Err(ParserUnavailable::Disabled);
        }
        if self.config.api_key.is_none() {
            return Err(ParserUnavailable::NoCredential);
        }

        let sanitized = sanitize_for_llm(eligibility_text, self.config.max_input_chars);
        let base_prompt = build_user_prompt(&sanitized);

        let mut prompt = base_prompt.clone();
        let mut last_schema_error = String::new();
        let mut rules: Option<Vec<EligibilityRule>> = None;

        for attempt in 0..MAX_ATTEMPTS {
            let estimate = estimate_tokens(&prompt)
                + estimate_tokens(ELIGIBILITY_SYSTEM_PROMPT)
                + self.config.completion_token_allowance;

            // Hard cost ceiling: reserve before any network traffic.
            budget
                .try_reserve(estimate)
                .map_err(|(used, limit)| ParserUnavailable::BudgetExhausted { used, limit })?;

            let completion =
                match self
                    .client
                    .complete(&self.config.model, ELIGIBILITY_SYSTEM_PROMPT, &prompt)
                {
                    Ok(completion) => completion,
                    Err(e) => {
                        tracing::warn!(
                            attempt,
                            estimated_tokens = estimate,
                            error = %e,
                            "LLM parse attempt failed at provider"
                        );
                        return Err(ParserUnavailable::Provider(e.to_string()));
                    }
                };

            let actual = completion.usage.map(|u| u.total()).unwrap_or(estimate);
            budget.settle(estimate, actual);
            tracing::info!(
                attempt,
                prompt_tokens = completion.usage.map(|u| u.prompt_tokens).unwrap_or(0),
                completion_tokens = completion.usage.map(|u| u.completion_tokens).unwrap_or(0),
                total_tokens = actual,
                budget_used = budget.used(),
                "LLM parse attempt completed"
            );

            match self.convert(&completion.content) {
                Ok(converted) => {
                    rules = Some(converted);
                    break;
                }
                Err(error) => {
                    tracing::warn!(attempt, %error, "LLM output failed schema validation");
                    last_schema_error = error;
                    if attempt + 1 < MAX_ATTEMPTS {
                        prompt = format!("{base_prompt}{}", repair_suffix(&last_schema_error));
                    }
                }
            }
        }

        let rules = rules.ok_or(ParserUnavailable::SchemaValidation(last_schema_error))?;

        // Evidence alignment: reject the parse wholesale past the
        // hallucination threshold; drop stray unaligned rules below it.
        let outcome = align_evidence(rules, eligibility_text);
        if outcome.unaligned_fraction() > self.config.hallucination_threshold {
            return Err(ParserUnavailable::HallucinationBound {
                unaligned: outcome.unaligned,
                total: outcome.total,
            });
        }
        let mut rules = outcome.aligned;

        check_count_sanity(
            rules.len(),
            baseline.rules.len(),
            self.config.min_rules,
            self.config.min_rule_ratio,
        )
        .map_err(ParserUnavailable::DegenerateOutput)?;

        backfill_critical_fields(&mut rules, &baseline.rules, &self.config.critical_fields);

        for (i, rule) in rules.iter_mut().enumerate() {
            rule.id = format!("r{:03}", i + 1);
        }
        Ok(rules)
    }

    /// Deserialize and contract-validate the model response. Individual
    /// invalid rules are dropped; a response where nothing survives is
    /// a schema failure (worth the repair retry).
    fn convert(&self, response: &str) -> Result<Vec<EligibilityRule>, String> {
        let raw = schema::parse_llm_rules(response)?;
        let raw_count = raw.len();

        let mut converted = Vec::with_capacity(raw_count);
        for item in &raw {
            match schema::to_rule(item, &format!("r{:03}", converted.len() + 1)) {
                Ok(rule) => converted.push(rule),
                Err(error) => {
                    tracing::warn!(field = %item.field, %error, "dropping invalid LLM rule");
                }
            }
        }

        if converted.is_empty() && raw_count > 0 {
            return Err(format!("all {raw_count} rules failed contract validation"));
        }
        Ok(converted)
    }
}
