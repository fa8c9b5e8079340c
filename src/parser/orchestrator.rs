//! Parser orchestration: rule-based first, LLM as an upgrade.
//!
//! The rule-based parse always runs and is the output of record when
//! the LLM path is unavailable for any reason. LLM failures are local
//! events logged here; callers always receive a criteria set.

use std::sync::Arc;

use chrono::Utc;

use crate::config::LlmConfig;
use crate::models::criteria::{CoverageStats, TrialCriteriaSet};
use crate::models::enums::ParserVersion;
use crate::models::trial::TrialRecord;

use super::llm::{HttpLlmClient, LlmClient, LlmParser, TokenBudget};
use super::rule_based::RuleBasedParser;

pub struct ParserPipeline {
    llm: Option<LlmParser>,
    budget: Arc<TokenBudget>,
}

impl ParserPipeline {
    /// Build the pipeline from configuration. The LLM path is wired up
    /// only when enabled with a credential; a client construction
    /// failure degrades to rule-based-only rather than failing startup.
    pub fn new(config: LlmConfig) -> Self {
        let budget = Arc::new(TokenBudget::new(config.daily_token_budget));

        let llm = match config.api_key.clone() {
            Some(key) if config.enabled => {
                match HttpLlmClient::new(&config.base_url, &key, config.timeout_secs) {
                    Ok(client) => Some(LlmParser::new(config, Box::new(client))),
                    Err(e) => {
                        tracing::warn!(error = %e, "LLM client unavailable, running rule-based only");
                        None
                    }
                }
            }
            _ => None,
        };

        Self { llm, budget }
    }

    /// Rule-based parsing only, no LLM wiring at all.
    pub fn rule_based_only() -> Self {
        Self {
            llm: None,
            budget: Arc::new(TokenBudget::new(0)),
        }
    }

    /// Test and embedding seam: LLM path with an injected client.
    pub fn with_client(config: LlmConfig, client: Box<dyn LlmClient + Send + Sync>) -> Self {
        let budget = Arc::new(TokenBudget::new(config.daily_token_budget));
        Self {
            llm: Some(LlmParser::new(config, client)),
            budget,
        }
    }

    pub fn budget(&self) -> &TokenBudget {
        &self.budget
    }

    /// Parse one trial's eligibility text into a criteria set.
    ///
    /// Never fails: a trial whose text yields nothing still produces an
    /// empty rule_v1 set so browsing can surface it as unavailable.
    pub fn parse_trial(&self, trial: &TrialRecord) -> TrialCriteriaSet {
        let baseline = RuleBasedParser::parse(&trial.eligibility_text);

        if let Some(llm) = &self.llm {
            match llm.parse(&trial.eligibility_text, &baseline, &self.budget) {
                Ok(rules) => {
                    // A sentence can yield several rules; coverage
                    // counts distinct evidence passages, capped at the
                    // sentence total so the ratio stays a proportion.
                    let total = baseline.stats.total;
                    let distinct_evidence = rules
                        .iter()
                        .map(|r| r.evidence_text.as_str())
                        .collect::<std::collections::HashSet<_>>()
                        .len();
                    let known = distinct_evidence.min(total);
                    let stats =
                        CoverageStats::new(total, known, total.saturating_sub(known), 0);
                    tracing::info!(
                        trial_id = %trial.nct_id,
                        rules = known,
                        coverage = stats.ratio,
                        "LLM parse accepted"
                    );
                    return TrialCriteriaSet {
                        trial_id: trial.nct_id.clone(),
                        parser_version: ParserVersion::LlmV1,
                        rules,
                        coverage_stats: stats,
                        created_at: Utc::now(),
                    };
                }
                Err(reason) => {
                    tracing::info!(
                        trial_id = %trial.nct_id,
                        %reason,
                        "LLM parse unavailable, falling back to rule-based"
                    );
                }
            }
        }

        tracing::info!(
            trial_id = %trial.nct_id,
            rules = baseline.rules.len(),
            coverage = baseline.stats.ratio,
            "rule-based parse is the output of record"
        );
        TrialCriteriaSet {
            trial_id: trial.nct_id.clone(),
            parser_version: ParserVersion::RuleV1,
            rules: baseline.rules,
            coverage_stats: baseline.stats,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::llm::MockLlmClient;

    const ELIGIBILITY: &str = "Inclusion Criteria:\n\
        - Aged 18 years or older.\n\
        - HbA1c must be <= 8.0%.\n\
        \n\
        Exclusion Criteria:\n\
        - Major surgery within the last 6 months.\n";

    fn trial() -> TrialRecord {
        TrialRecord {
            nct_id: "NCT01234567".into(),
            eligibility_text: ELIGIBILITY.into(),
            status: "Recruiting".into(),
            phase: Some("Phase 3".into()),
            conditions: vec!["Type 2 Diabetes".into()],
            locations: vec![],
            fetched_at: Utc::now(),
        }
    }

    fn llm_response() -> String {
        r#"```json
{
  "rules": [
    {"clause_type": "INCLUSION", "field": "age", "operator": ">=", "value": 18,
     "unit": "years", "certainty": "high", "evidence_text": "Aged 18 years or older."},
    {"clause_type": "INCLUSION", "field": "lab", "operator": "<=", "value": 8.0,
     "unit": "%", "certainty": "high", "evidence_text": "HbA1c must be <= 8.0%."},
    {"clause_type": "EXCLUSION", "field": "procedure", "operator": "WITHIN_LAST", "value": 6,
     "unit": "months", "certainty": "high", "evidence_text": "Major surgery within the last 6 months."}
  ]
}
```"#
        .to_string()
    }

    fn enabled_config() -> LlmConfig {
        LlmConfig {
            enabled: true,
            api_key: Some("test-key".into()),
            ..LlmConfig::default()
        }
    }

    #[test]
    fn rule_based_only_pipeline_stamps_rule_v1() {
        let pipeline = ParserPipeline::rule_based_only();
        let set = pipeline.parse_trial(&trial());
        assert_eq!(set.parser_version, ParserVersion::RuleV1);
        assert_eq!(set.trial_id, "NCT01234567");
        assert!(set.criteria_available());
    }

    #[test]
    fn accepted_llm_parse_stamps_llm_v1() {
        let pipeline =
            ParserPipeline::with_client(enabled_config(), Box::new(MockLlmClient::new(&llm_response())));
        let set = pipeline.parse_trial(&trial());
        assert_eq!(set.parser_version, ParserVersion::LlmV1);
        assert_eq!(set.rules.len(), 3);
        assert!(set.coverage_stats.ratio > 0.0);
        assert!(set.coverage_stats.ratio <= 1.0);
        assert_eq!(set.coverage_stats.known, 3);
    }

    #[test]
    fn llm_failure_falls_back_to_rule_based() {
        let pipeline = ParserPipeline::with_client(
            enabled_config(),
            Box::new(MockLlmClient::failing("connection refused")),
        );
        let set = pipeline.parse_trial(&trial());
        assert_eq!(set.parser_version, ParserVersion::RuleV1);
        assert!(!set.rules.is_empty());
    }

    /// Delegating handle so tests can keep a view of the mock after it
    /// moves into the pipeline.
    struct SharedClient(std::sync::Arc<MockLlmClient>);

    impl crate::parser::llm::LlmClient for SharedClient {
        fn complete(
            &self,
            model: &str,
            system: &str,
            user: &str,
        ) -> Result<crate::parser::llm::client::LlmCompletion, crate::parser::llm::client::LlmError>
        {
            self.0.complete(model, system, user)
        }
    }

    #[test]
    fn exhausted_budget_skips_the_network_entirely() {
        let mut config = enabled_config();
        config.daily_token_budget = 10;
        let mock = std::sync::Arc::new(MockLlmClient::new(&llm_response()));
        let pipeline = ParserPipeline::with_client(config, Box::new(SharedClient(mock.clone())));

        let set = pipeline.parse_trial(&trial());

        assert_eq!(set.parser_version, ParserVersion::RuleV1);
        assert!(set.criteria_available());
        assert_eq!(mock.call_count(), 0, "budget gate must run before any provider call");
    }

    #[test]
    fn unparseable_text_still_yields_a_criteria_set() {
        let mut t = trial();
        t.eligibility_text = "See protocol document for details.".into();
        let pipeline = ParserPipeline::rule_based_only();
        let set = pipeline.parse_trial(&t);
        assert!(!set.criteria_available());
        assert_eq!(set.coverage_stats.known, 0);
        assert_eq!(set.coverage_stats.total, 1);
    }
}
