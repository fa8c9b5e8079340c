//! Keyword lexicons for the rule-based extractors.
//!
//! Deliberately small and high-precision: a term only belongs here if
//! its presence in a criterion sentence almost always means the clause
//! is about that profile section. Coverage gaps surface as UNKNOWN in
//! the coverage stats, never as fabricated rules.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::enums::RuleField;

/// Condition / diagnosis terms (also matched for history clauses).
pub const CONDITION_TERMS: &[&str] = &[
    "type 2 diabetes",
    "type 1 diabetes",
    "diabetes mellitus",
    "diabetes",
    "hypertension",
    "heart failure",
    "myocardial infarction",
    "atrial fibrillation",
    "stroke",
    "transient ischemic attack",
    "chronic kidney disease",
    "renal impairment",
    "hepatitis b",
    "hepatitis c",
    "cirrhosis",
    "hiv",
    "asthma",
    "copd",
    "chronic obstructive pulmonary disease",
    "epilepsy",
    "seizure disorder",
    "depression",
    "cancer",
    "malignancy",
    "pregnancy",
    "pregnant",
    "breastfeeding",
    "obesity",
    "anemia",
    "rheumatoid arthritis",
    "psoriasis",
    "multiple sclerosis",
];

/// Medication / treatment-class terms.
pub const MEDICATION_TERMS: &[&str] = &[
    "warfarin",
    "heparin",
    "anticoagulant",
    "anticoagulation",
    "insulin",
    "metformin",
    "corticosteroid",
    "systemic steroid",
    "chemotherapy",
    "immunosuppressant",
    "immunosuppressive therapy",
    "beta-blocker",
    "statin",
    "ace inhibitor",
    "nsaid",
    "opioid",
    "antidepressant",
    "antipsychotic",
    "biologic therapy",
];

/// Procedure terms.
pub const PROCEDURE_TERMS: &[&str] = &[
    "major surgery",
    "surgery",
    "surgical procedure",
    "organ transplant",
    "transplant",
    "dialysis",
    "radiotherapy",
    "radiation therapy",
    "coronary artery bypass",
    "angioplasty",
    "stent placement",
    "biopsy",
    "blood transfusion",
];

/// Lab analyte names for the lab-threshold extractor, longest first so
/// "hemoglobin a1c" wins over "hemoglobin".
pub const LAB_TERMS: &[&str] = &[
    "hemoglobin a1c",
    "glycated hemoglobin",
    "hba1c",
    "hemoglobin",
    "creatinine clearance",
    "serum creatinine",
    "creatinine",
    "egfr",
    "platelet count",
    "platelets",
    "white blood cell count",
    "wbc",
    "absolute neutrophil count",
    "anc",
    "total bilirubin",
    "bilirubin",
    "ast",
    "alt",
    "albumin",
    "fasting glucose",
    "glucose",
    "ldl cholesterol",
    "triglycerides",
    "bmi",
    "body mass index",
];

fn compile_terms(terms: &[&str]) -> Regex {
    let alternation = terms
        .iter()
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b({alternation})\b")).unwrap()
}

static CONDITION_RE: LazyLock<Regex> = LazyLock::new(|| compile_terms(CONDITION_TERMS));
static MEDICATION_RE: LazyLock<Regex> = LazyLock::new(|| compile_terms(MEDICATION_TERMS));
static PROCEDURE_RE: LazyLock<Regex> = LazyLock::new(|| compile_terms(PROCEDURE_TERMS));
static LAB_RE: LazyLock<Regex> = LazyLock::new(|| compile_terms(LAB_TERMS));

/// First lexicon term found in the sentence, with the section it
/// belongs to. Procedure and medication terms take precedence over the
/// broader condition vocabulary.
pub fn find_entity(sentence: &str) -> Option<(RuleField, String)> {
    if let Some(m) = PROCEDURE_RE.find(sentence) {
        return Some((RuleField::Procedure, m.as_str().to_lowercase()));
    }
    if let Some(m) = MEDICATION_RE.find(sentence) {
        return Some((RuleField::Medication, m.as_str().to_lowercase()));
    }
    if let Some(m) = CONDITION_RE.find(sentence) {
        return Some((RuleField::Condition, m.as_str().to_lowercase()));
    }
    None
}

/// First lab analyte mentioned in the text, lowercased.
pub fn find_lab_term(text: &str) -> Option<String> {
    LAB_RE.find(text).map(|m| m.as_str().to_lowercase())
}

/// First lab analyte with its byte range in `text`. The range indexes
/// the original text, safe to slice and use as a span.
pub fn find_lab_span(text: &str) -> Option<(std::ops::Range<usize>, String)> {
    LAB_RE
        .find(text)
        .map(|m| (m.range(), m.as_str().to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn procedure_takes_precedence_over_condition() {
        let (field, term) = find_entity("No major surgery for cancer treatment").unwrap();
        assert_eq!(field, RuleField::Procedure);
        assert_eq!(term, "major surgery");
    }

    #[test]
    fn longest_lab_term_wins() {
        assert_eq!(
            find_lab_term("Hemoglobin A1c below 8%").as_deref(),
            Some("hemoglobin a1c")
        );
        assert_eq!(find_lab_term("Hemoglobin > 10 g/dL").as_deref(), Some("hemoglobin"));
    }

    #[test]
    fn unknown_vocabulary_matches_nothing() {
        assert!(find_entity("Able to provide informed consent").is_none());
        assert!(find_lab_term("QTc interval prolongation").is_none());
    }

    #[test]
    fn matching_is_case_insensitive() {
        let (field, term) = find_entity("History of STROKE in the family").unwrap();
        assert_eq!(field, RuleField::Condition);
        assert_eq!(term, "stroke");
    }
}
