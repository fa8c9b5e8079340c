use serde::{Deserialize, Serialize};

use super::enums::{Certainty, ClauseType, Operator, ReasonCode, RequiredAction, RuleField, Verdict};
use super::rule::{EligibilityRule, RuleValue};

/// Echo of the rule a verdict was computed from. Field names here are a
/// stable downstream contract; renames require a version bump.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleMeta {
    #[serde(rename = "type")]
    pub clause_type: ClauseType,
    pub field: RuleField,
    pub operator: Operator,
    pub value: RuleValue,
    pub unit: Option<String>,
    pub time_window: Option<String>,
    pub certainty: Certainty,
}

impl RuleMeta {
    pub fn from_rule(rule: &EligibilityRule) -> Self {
        Self {
            clause_type: rule.clause_type,
            field: rule.field,
            operator: rule.operator,
            value: rule.value.clone(),
            unit: rule.unit.clone(),
            time_window: rule.time_window(),
            certainty: rule.certainty,
        }
    }
}

/// Attached to UNKNOWN verdicts: what was missing, why, and what data
/// would resolve it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMeta {
    pub missing_field: Option<String>,
    pub reason: String,
    pub reason_code: ReasonCode,
    pub required_action: Option<RequiredAction>,
}

/// Outcome of evaluating one rule against one patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleVerdict {
    pub rule_id: String,
    pub verdict: Verdict,
    /// Echo of the rule's evidence_text; evidence is never dropped.
    pub evidence: String,
    pub rule_meta: RuleMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation_meta: Option<EvaluationMeta>,
}

impl RuleVerdict {
    pub fn pass(rule: &EligibilityRule) -> Self {
        Self::resolved(rule, Verdict::Pass)
    }

    pub fn fail(rule: &EligibilityRule) -> Self {
        Self::resolved(rule, Verdict::Fail)
    }

    fn resolved(rule: &EligibilityRule, verdict: Verdict) -> Self {
        Self {
            rule_id: rule.id.clone(),
            verdict,
            evidence: rule.evidence_text.clone(),
            rule_meta: RuleMeta::from_rule(rule),
            evaluation_meta: None,
        }
    }

    pub fn unknown(
        rule: &EligibilityRule,
        reason_code: ReasonCode,
        reason: &str,
        missing_field: Option<&str>,
        required_action: Option<RequiredAction>,
    ) -> Self {
        Self {
            rule_id: rule.id.clone(),
            verdict: Verdict::Unknown,
            evidence: rule.evidence_text.clone(),
            rule_meta: RuleMeta::from_rule(rule),
            evaluation_meta: Some(EvaluationMeta {
                missing_field: missing_field.map(str::to_string),
                reason: reason.to_string(),
                reason_code,
                required_action,
            }),
        }
    }
}
