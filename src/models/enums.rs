use serde::{Deserialize, Serialize};

/// Whether a rule must hold (inclusion) or must NOT hold (exclusion)
/// for the patient to be eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClauseType {
    Inclusion,
    Exclusion,
}

/// Patient-profile section a rule evaluates against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleField {
    Age,
    Sex,
    Condition,
    Medication,
    Lab,
    Procedure,
    History,
    Other,
}

impl RuleField {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleField::Age => "age",
            RuleField::Sex => "sex",
            RuleField::Condition => "condition",
            RuleField::Medication => "medication",
            RuleField::Lab => "lab",
            RuleField::Procedure => "procedure",
            RuleField::History => "history",
            RuleField::Other => "other",
        }
    }
}

/// Field-restricted comparison operators. The allowed (field, operator)
/// pairs are enforced by `EligibilityRule::validate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "NOT_IN")]
    NotIn,
    #[serde(rename = "WITHIN_LAST")]
    WithinLast,
    #[serde(rename = "NO_HISTORY")]
    NoHistory,
    #[serde(rename = "EXISTS")]
    Exists,
}

/// Parser confidence that a clause was extracted correctly.
/// Distinct from the evaluation outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Certainty {
    High,
    Medium,
    Low,
}

/// Time unit for WITHIN_LAST windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Days,
    Weeks,
    Months,
    Years,
}

impl TimeUnit {
    /// Parse a unit string as persisted on a rule ("months", "month", "mo").
    pub fn parse(s: &str) -> Option<TimeUnit> {
        match s.trim().to_lowercase().trim_end_matches('s') {
            "day" | "d" => Some(TimeUnit::Days),
            "week" | "wk" | "w" => Some(TimeUnit::Weeks),
            "month" | "mo" => Some(TimeUnit::Months),
            "year" | "yr" | "y" => Some(TimeUnit::Years),
            _ => None,
        }
    }

    /// Window length in days. Months and years use mean calendar lengths.
    pub fn to_days(&self, count: f64) -> f64 {
        match self {
            TimeUnit::Days => count,
            TimeUnit::Weeks => count * 7.0,
            TimeUnit::Months => count * 30.44,
            TimeUnit::Years => count * 365.25,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Days => "days",
            TimeUnit::Weeks => "weeks",
            TimeUnit::Months => "months",
            TimeUnit::Years => "years",
        }
    }
}

/// Outcome of evaluating one rule against one patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Pass,
    Fail,
    Unknown,
}

/// Coarse eligibility classification, derived from verdict counts only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    Eligible,
    Potential,
    Ineligible,
}

/// Why a rule evaluated to UNKNOWN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    MissingField,
    NoEvidence,
    UnsupportedOperator,
    InvalidRuleValue,
}

/// Suggested action to resolve an UNKNOWN verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequiredAction {
    AddDemographics,
    AddLabValue,
    AddConditionHistory,
    AddMedicationList,
    AddProcedureHistory,
    AddEntryDate,
    ReviewRule,
}

/// Patient sex as recorded in the profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
    Other,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
            Sex::Other => "other",
        }
    }
}

/// Which parser produced a criteria set. Recorded on every persisted set
/// for traceability; a new parse produces a new set, never a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParserVersion {
    #[serde(rename = "rule_v1")]
    RuleV1,
    #[serde(rename = "llm_v1")]
    LlmV1,
}
