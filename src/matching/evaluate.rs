//! Per-rule evaluation against a patient profile.
//!
//! A rule is first tested as written (does the condition hold?), then
//! the clause type maps the predicate to a verdict: an exclusion clause
//! that holds is a FAIL. Anything the profile cannot answer is UNKNOWN
//! with a reason code and a suggested action, never a guess.

use chrono::{Duration, NaiveDate};

use crate::models::enums::{
    ClauseType, Operator, ReasonCode, RequiredAction, RuleField, TimeUnit, Verdict,
};
use crate::models::profile::{DatedEntry, PatientProfile};
use crate::models::rule::EligibilityRule;
use crate::models::verdict::RuleVerdict;
use crate::parser::lexicon;

use super::units;

/// Does the rule's condition hold, as written?
enum Predicate {
    Holds,
    Fails,
    Unknown {
        reason_code: ReasonCode,
        reason: String,
        missing_field: Option<String>,
        required_action: Option<RequiredAction>,
    },
}

impl Predicate {
    fn unknown(
        reason_code: ReasonCode,
        reason: impl Into<String>,
        missing_field: Option<&str>,
        required_action: Option<RequiredAction>,
    ) -> Self {
        Predicate::Unknown {
            reason_code,
            reason: reason.into(),
            missing_field: missing_field.map(str::to_string),
            required_action,
        }
    }
}

/// Evaluate one rule. Time windows are measured back from `eval_date`.
pub fn evaluate_rule(
    rule: &EligibilityRule,
    profile: &PatientProfile,
    eval_date: NaiveDate,
) -> RuleVerdict {
    let predicate = match rule.field {
        RuleField::Age => eval_age(rule, profile),
        RuleField::Sex => eval_sex(rule, profile),
        RuleField::Lab => eval_lab(rule, profile),
        RuleField::Condition | RuleField::Medication | RuleField::Procedure => {
            eval_entry_section(rule, profile, eval_date)
        }
        RuleField::History => eval_history(rule, profile, eval_date),
        RuleField::Other => Predicate::unknown(
            ReasonCode::UnsupportedOperator,
            "free-text criterion needs manual review",
            None,
            Some(RequiredAction::ReviewRule),
        ),
    };

    match predicate {
        Predicate::Holds => resolved(rule, true),
        Predicate::Fails => resolved(rule, false),
        Predicate::Unknown {
            reason_code,
            reason,
            missing_field,
            required_action,
        } => RuleVerdict::unknown(
            rule,
            reason_code,
            &reason,
            missing_field.as_deref(),
            required_action,
        ),
    }
}

/// Map a resolved predicate through the clause type. Exclusion clauses
/// invert: a condition that holds disqualifies the patient.
fn resolved(rule: &EligibilityRule, holds: bool) -> RuleVerdict {
    let verdict = match (rule.clause_type, holds) {
        (ClauseType::Inclusion, true) | (ClauseType::Exclusion, false) => Verdict::Pass,
        (ClauseType::Inclusion, false) | (ClauseType::Exclusion, true) => Verdict::Fail,
    };
    match verdict {
        Verdict::Pass => RuleVerdict::pass(rule),
        _ => RuleVerdict::fail(rule),
    }
}

// ── field evaluators ────────────────────────────────────────────────

fn eval_age(rule: &EligibilityRule, profile: &PatientProfile) -> Predicate {
    let age = profile.demographics.as_ref().and_then(|d| d.age);
    let Some(age) = age else {
        return Predicate::unknown(
            ReasonCode::MissingField,
            "age not recorded on the profile",
            Some("age"),
            Some(RequiredAction::AddDemographics),
        );
    };
    // Contract guarantees a numeric bound here
    let Some(bound) = rule.value.as_number() else {
        return invalid_value(rule);
    };
    let age = age as f64;
    let holds = match rule.operator {
        Operator::Gte => age >= bound,
        Operator::Lte => age <= bound,
        _ => return unsupported(rule),
    };
    if holds {
        Predicate::Holds
    } else {
        Predicate::Fails
    }
}

fn eval_sex(rule: &EligibilityRule, profile: &PatientProfile) -> Predicate {
    let sex = profile.demographics.as_ref().and_then(|d| d.sex);
    let Some(sex) = sex else {
        return Predicate::unknown(
            ReasonCode::MissingField,
            "sex not recorded on the profile",
            Some("sex"),
            Some(RequiredAction::AddDemographics),
        );
    };
    let wanted = rule
        .value
        .terms()
        .first()
        .map(|t| t.trim().to_lowercase())
        .unwrap_or_default();
    let wanted = match wanted.as_str() {
        "male" | "m" | "men" => "male",
        "female" | "f" | "women" => "female",
        "other" => "other",
        _ => {
            return Predicate::unknown(
                ReasonCode::InvalidRuleValue,
                format!("unrecognized sex value {wanted:?}"),
                None,
                Some(RequiredAction::ReviewRule),
            )
        }
    };
    if sex.as_str() == wanted {
        Predicate::Holds
    } else {
        Predicate::Fails
    }
}

fn eval_lab(rule: &EligibilityRule, profile: &PatientProfile) -> Predicate {
    if rule.operator == Operator::In {
        // Qualitative lab criteria are not evaluable against numeric labs
        return Predicate::unknown(
            ReasonCode::UnsupportedOperator,
            "qualitative lab criterion needs manual review",
            None,
            Some(RequiredAction::ReviewRule),
        );
    }

    let Some(analyte) = lexicon::find_lab_term(&rule.evidence_text) else {
        return Predicate::unknown(
            ReasonCode::NoEvidence,
            "cannot identify the lab analyte in the criterion",
            None,
            Some(RequiredAction::ReviewRule),
        );
    };

    let Some(labs) = &profile.labs else {
        return Predicate::unknown(
            ReasonCode::MissingField,
            format!("no lab values on the profile (need {analyte})"),
            Some(analyte.as_str()),
            Some(RequiredAction::AddLabValue),
        );
    };

    let Some(lab) = labs.iter().find(|l| names_match(&l.name, &analyte)) else {
        return Predicate::unknown(
            ReasonCode::MissingField,
            format!("no lab value for {analyte} on the profile"),
            Some(analyte.as_str()),
            Some(RequiredAction::AddLabValue),
        );
    };

    let Some(bound) = rule.value.as_number() else {
        return invalid_value(rule);
    };

    // Convert the measured value into the rule's unit when both carry
    // one; a unit only one side carries is assumed shared.
    let measured = match (&lab.unit, &rule.unit) {
        (Some(lab_unit), Some(rule_unit)) => {
            match units::convert(lab.value, lab_unit, rule_unit) {
                Some(v) => v,
                None => {
                    return Predicate::unknown(
                        ReasonCode::UnsupportedOperator,
                        format!(
                            "cannot compare {analyte} in {lab_unit} against a bound in {rule_unit}"
                        ),
                        None,
                        Some(RequiredAction::ReviewRule),
                    )
                }
            }
        }
        _ => lab.value,
    };

    let holds = match rule.operator {
        Operator::Gte => measured >= bound,
        Operator::Lte => measured <= bound,
        _ => return unsupported(rule),
    };
    if holds {
        Predicate::Holds
    } else {
        Predicate::Fails
    }
}

/// condition / medication / procedure sections: IN, NOT_IN, WITHIN_LAST.
fn eval_entry_section(
    rule: &EligibilityRule,
    profile: &PatientProfile,
    eval_date: NaiveDate,
) -> Predicate {
    let (entries, section_name, action) = match rule.field {
        RuleField::Condition => (
            &profile.conditions,
            "conditions",
            RequiredAction::AddConditionHistory,
        ),
        RuleField::Medication => (
            &profile.medications,
            "medications",
            RequiredAction::AddMedicationList,
        ),
        RuleField::Procedure => (
            &profile.procedures,
            "procedures",
            RequiredAction::AddProcedureHistory,
        ),
        _ => return unsupported(rule),
    };
    let Some(entries) = entries else {
        return section_missing(section_name, action);
    };

    match rule.operator {
        Operator::In => bool_predicate(any_term_match(entries, rule)),
        Operator::NotIn => bool_predicate(!any_term_match(entries, rule)),
        Operator::WithinLast => eval_within_last(rule, entries, eval_date),
        _ => unsupported(rule),
    }
}

/// history: IN, NO_HISTORY, WITHIN_LAST against the history section.
fn eval_history(
    rule: &EligibilityRule,
    profile: &PatientProfile,
    eval_date: NaiveDate,
) -> Predicate {
    let Some(entries) = &profile.history else {
        return section_missing("history", RequiredAction::AddConditionHistory);
    };
    match rule.operator {
        Operator::In => bool_predicate(any_term_match(entries, rule)),
        Operator::NoHistory => bool_predicate(!any_term_match(entries, rule)),
        Operator::WithinLast => eval_within_last(rule, entries, eval_date),
        _ => unsupported(rule),
    }
}

/// "X within the last N units": resolve the entity from the evidence
/// sentence, then check the relevant entries' dates against the window.
fn eval_within_last(
    rule: &EligibilityRule,
    entries: &[DatedEntry],
    eval_date: NaiveDate,
) -> Predicate {
    // Validated upstream: numeric window plus a parseable unit
    let (Some(window), Some(unit)) = (
        rule.value.as_number(),
        rule.unit.as_deref().and_then(TimeUnit::parse),
    ) else {
        return invalid_value(rule);
    };
    let cutoff = eval_date - Duration::days(unit.to_days(window).round() as i64);

    // The window number lives in the value; the entity lives in the
    // evidence sentence. No recognizable entity means every entry in
    // the section is in scope.
    let relevant: Vec<&DatedEntry> = match lexicon::find_entity(&rule.evidence_text) {
        Some((_, term)) => entries
            .iter()
            .filter(|e| window_names_match(&e.name, &term))
            .collect(),
        None => entries.iter().collect(),
    };

    if relevant.is_empty() {
        return Predicate::Fails;
    }
    if relevant
        .iter()
        .any(|e| e.date.is_some_and(|d| d >= cutoff))
    {
        return Predicate::Holds;
    }
    if relevant.iter().any(|e| e.date.is_none()) {
        // An undated matching entry can neither satisfy nor clear the window
        return Predicate::unknown(
            ReasonCode::NoEvidence,
            "matching profile entry has no date",
            None,
            Some(RequiredAction::AddEntryDate),
        );
    }
    Predicate::Fails
}

// ── helpers ─────────────────────────────────────────────────────────

fn any_term_match(entries: &[DatedEntry], rule: &EligibilityRule) -> bool {
    rule.value
        .terms()
        .iter()
        .any(|term| entries.iter().any(|e| names_match(&e.name, term)))
}

/// Case-insensitive containment either way, so "knee surgery" matches
/// the term "surgery" and "diabetes" matches "type 2 diabetes".
fn names_match(entry: &str, term: &str) -> bool {
    let entry = entry.trim().to_lowercase();
    let term = term.trim().to_lowercase();
    !entry.is_empty() && !term.is_empty() && (entry.contains(&term) || term.contains(&entry))
}

/// Looser matching for window entity resolution: "knee surgery" is in
/// scope for a criterion about "major surgery". Containment first, then
/// shared words of 4+ characters.
fn window_names_match(entry: &str, term: &str) -> bool {
    if names_match(entry, term) {
        return true;
    }
    let entry = entry.to_lowercase();
    let entry_words: Vec<&str> = entry.split_whitespace().collect();
    term.to_lowercase()
        .split_whitespace()
        .filter(|w| w.len() >= 4)
        .any(|w| entry_words.contains(&w))
}

fn bool_predicate(holds: bool) -> Predicate {
    if holds {
        Predicate::Holds
    } else {
        Predicate::Fails
    }
}

fn section_missing(section: &str, action: RequiredAction) -> Predicate {
    Predicate::unknown(
        ReasonCode::MissingField,
        format!("{section} never filled in on the profile"),
        Some(section),
        Some(action),
    )
}

fn invalid_value(rule: &EligibilityRule) -> Predicate {
    Predicate::unknown(
        ReasonCode::InvalidRuleValue,
        format!("rule value {:?} does not fit the operator", rule.value),
        None,
        Some(RequiredAction::ReviewRule),
    )
}

fn unsupported(rule: &EligibilityRule) -> Predicate {
    Predicate::unknown(
        ReasonCode::UnsupportedOperator,
        format!("operator {:?} not evaluable for {}", rule.operator, rule.field.as_str()),
        None,
        Some(RequiredAction::ReviewRule),
    )
}
