use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::enums::{Certainty, ClauseType, Operator, RuleField, TimeUnit};

/// Character offsets into the original eligibility text. Used to verify
/// evidence alignment and to reject hallucinated rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
}

/// Rule payload. Loosely-typed JSON from the LLM lands here and is
/// validated against the per-field contract before persistence; we
/// reject rather than coerce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleValue {
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl RuleValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            RuleValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Text terms carried by the value, for IN-style matching.
    pub fn terms(&self) -> Vec<&str> {
        match self {
            RuleValue::Text(t) => vec![t.as_str()],
            RuleValue::List(items) => items.iter().map(|s| s.as_str()).collect(),
            RuleValue::Number(_) => vec![],
        }
    }
}

/// One atomic, testable clause extracted from eligibility criteria.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityRule {
    /// Stable within a (trial, parser_version) pair.
    pub id: String,
    pub clause_type: ClauseType,
    pub field: RuleField,
    pub operator: Operator,
    pub value: RuleValue,
    /// Required for WITHIN_LAST (days|weeks|months|years) and for
    /// numeric lab/age clauses where applicable.
    pub unit: Option<String>,
    pub certainty: Certainty,
    /// Verbatim source sentence/phrase. Non-empty for every rule.
    pub evidence_text: String,
    pub source_span: Option<SourceSpan>,
}

/// Contract violation that makes a rule invalid. Invalid rules are
/// dropped before persistence and counted in coverage stats, never
/// surfaced as request-level errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleContractViolation {
    #[error("empty evidence_text")]
    EmptyEvidence,
    #[error("operator {operator:?} not allowed for field {field:?}")]
    OperatorNotAllowed { field: RuleField, operator: Operator },
    #[error("value does not satisfy the {field:?}/{operator:?} contract: {detail}")]
    BadValue {
        field: RuleField,
        operator: Operator,
        detail: String,
    },
    #[error("WITHIN_LAST requires a time unit (days|weeks|months|years), got {0:?}")]
    BadTimeUnit(Option<String>),
    #[error("source_span start {start} is not before end {end}")]
    InvertedSpan { start: usize, end: usize },
}

/// Placeholder strings the LLM sometimes emits instead of a real value.
const PLACEHOLDER_VALUES: &[&str] = &[
    "", "n/a", "na", "none", "null", "unknown", "value", "<value>", "string", "...", "tbd",
];

impl EligibilityRule {
    /// Validate this rule against the per-field operator/value contract.
    pub fn validate(&self) -> Result<(), RuleContractViolation> {
        if self.evidence_text.trim().is_empty() {
            return Err(RuleContractViolation::EmptyEvidence);
        }

        if !operator_allowed(self.field, self.operator) {
            return Err(RuleContractViolation::OperatorNotAllowed {
                field: self.field,
                operator: self.operator,
            });
        }

        if let Some(span) = self.source_span {
            if span.start >= span.end {
                return Err(RuleContractViolation::InvertedSpan {
                    start: span.start,
                    end: span.end,
                });
            }
        }

        self.validate_value()
    }

    fn validate_value(&self) -> Result<(), RuleContractViolation> {
        let bad = |detail: &str| RuleContractViolation::BadValue {
            field: self.field,
            operator: self.operator,
            detail: detail.to_string(),
        };

        match self.operator {
            Operator::WithinLast => {
                let n = self.value.as_number().ok_or_else(|| bad("expected a numeric window"))?;
                if n <= 0.0 {
                    return Err(bad("window must be positive"));
                }
                match self.unit.as_deref().and_then(TimeUnit::parse) {
                    Some(_) => Ok(()),
                    None => Err(RuleContractViolation::BadTimeUnit(self.unit.clone())),
                }
            }
            Operator::Gte | Operator::Lte => {
                let n = self.value.as_number().ok_or_else(|| bad("expected a number"))?;
                if self.field == RuleField::Age && !(0.0..200.0).contains(&n) {
                    return Err(bad("age bound outside 0..200"));
                }
                Ok(())
            }
            Operator::Eq | Operator::In | Operator::NotIn | Operator::NoHistory | Operator::Exists => {
                let terms = self.value.terms();
                if terms.is_empty() {
                    return Err(bad("expected a phrase or list of phrases"));
                }
                for term in terms {
                    let lower = term.trim().to_lowercase();
                    if PLACEHOLDER_VALUES.contains(&lower.as_str()) {
                        return Err(bad("placeholder value"));
                    }
                }
                Ok(())
            }
        }
    }

    /// Human-readable window ("6 months") for WITHIN_LAST rules.
    pub fn time_window(&self) -> Option<String> {
        if self.operator != Operator::WithinLast {
            return None;
        }
        let n = self.value.as_number()?;
        let unit = self.unit.as_deref().and_then(TimeUnit::parse)?;
        Some(format!("{} {}", n, unit.as_str()))
    }
}

/// Allowed (field, operator) pairs.
fn operator_allowed(field: RuleField, operator: Operator) -> bool {
    use Operator::*;
    use RuleField::*;
    match field {
        Age => matches!(operator, Gte | Lte),
        Sex => matches!(operator, Eq),
        Condition | Medication | Procedure => matches!(operator, In | NotIn | WithinLast),
        History => matches!(operator, In | NoHistory | WithinLast),
        Lab => matches!(operator, Gte | Lte | In),
        Other => matches!(operator, In | Exists),
    }
}

/// Drop rules that fail the contract, logging each drop.
/// Returns the surviving rules and the number dropped.
pub fn retain_valid(rules: Vec<EligibilityRule>) -> (Vec<EligibilityRule>, usize) {
    let total = rules.len();
    let kept: Vec<EligibilityRule> = rules
        .into_iter()
        .filter(|rule| match rule.validate() {
            Ok(()) => true,
            Err(violation) => {
                tracing::warn!(
                    rule_id = %rule.id,
                    field = rule.field.as_str(),
                    %violation,
                    "dropping invalid rule"
                );
                false
            }
        })
        .collect();
    let dropped = total - kept.len();
    (kept, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_rule() -> EligibilityRule {
        EligibilityRule {
            id: "r001".into(),
            clause_type: ClauseType::Inclusion,
            field: RuleField::Age,
            operator: Operator::Gte,
            value: RuleValue::Number(18.0),
            unit: Some("years".into()),
            certainty: Certainty::High,
            evidence_text: "Patients must be 18 years or older.".into(),
            source_span: Some(SourceSpan { start: 0, end: 35 }),
        }
    }

    #[test]
    fn valid_age_rule_passes() {
        assert!(base_rule().validate().is_ok());
    }

    #[test]
    fn empty_evidence_rejected() {
        let mut rule = base_rule();
        rule.evidence_text = "   ".into();
        assert_eq!(rule.validate(), Err(RuleContractViolation::EmptyEvidence));
    }

    #[test]
    fn operator_matrix_enforced() {
        let mut rule = base_rule();
        rule.operator = Operator::In; // age IN is not in the contract
        assert!(matches!(
            rule.validate(),
            Err(RuleContractViolation::OperatorNotAllowed { .. })
        ));

        let mut rule = base_rule();
        rule.field = RuleField::History;
        rule.operator = Operator::NoHistory;
        rule.value = RuleValue::Text("stroke".into());
        rule.unit = None;
        assert!(rule.validate().is_ok());
    }

    #[test]
    fn numeric_operator_rejects_text_value() {
        let mut rule = base_rule();
        rule.value = RuleValue::Text("eighteen".into());
        assert!(matches!(rule.validate(), Err(RuleContractViolation::BadValue { .. })));
    }

    #[test]
    fn placeholder_values_rejected() {
        let mut rule = base_rule();
        rule.field = RuleField::Condition;
        rule.operator = Operator::In;
        rule.unit = None;
        for placeholder in ["<value>", "N/A", "string", ""] {
            rule.value = RuleValue::Text(placeholder.into());
            assert!(
                rule.validate().is_err(),
                "placeholder {placeholder:?} should be rejected"
            );
        }
    }

    #[test]
    fn within_last_requires_unit() {
        let mut rule = base_rule();
        rule.field = RuleField::Procedure;
        rule.operator = Operator::WithinLast;
        rule.value = RuleValue::Number(6.0);
        rule.unit = None;
        assert!(matches!(rule.validate(), Err(RuleContractViolation::BadTimeUnit(None))));

        rule.unit = Some("months".into());
        assert!(rule.validate().is_ok());
        assert_eq!(rule.time_window().as_deref(), Some("6 months"));
    }

    #[test]
    fn within_last_rejects_nonpositive_window() {
        let mut rule = base_rule();
        rule.field = RuleField::Procedure;
        rule.operator = Operator::WithinLast;
        rule.value = RuleValue::Number(0.0);
        rule.unit = Some("months".into());
        assert!(rule.validate().is_err());
    }

    #[test]
    fn inverted_span_rejected() {
        let mut rule = base_rule();
        rule.source_span = Some(SourceSpan { start: 10, end: 10 });
        assert!(matches!(
            rule.validate(),
            Err(RuleContractViolation::InvertedSpan { .. })
        ));
    }

    #[test]
    fn retain_valid_drops_and_counts() {
        let good = base_rule();
        let mut bad = base_rule();
        bad.evidence_text = "".into();

        let (kept, dropped) = retain_valid(vec![good.clone(), bad]);
        assert_eq!(kept, vec![good]);
        assert_eq!(dropped, 1);
    }

    #[test]
    fn rule_value_deserializes_untagged() {
        let n: RuleValue = serde_json::from_str("18").unwrap();
        assert_eq!(n, RuleValue::Number(18.0));
        let t: RuleValue = serde_json::from_str("\"male\"").unwrap();
        assert_eq!(t, RuleValue::Text("male".into()));
        let l: RuleValue = serde_json::from_str("[\"warfarin\",\"heparin\"]").unwrap();
        assert_eq!(l.terms(), vec!["warfarin", "heparin"]);
    }
}
