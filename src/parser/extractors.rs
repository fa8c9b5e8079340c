//! The fixed, ordered extractor battery of the rule-based parser.
//!
//! Each extractor inspects one sentence and returns zero or more
//! clauses; the first extractor that produces anything wins the
//! sentence. Extractors are pure regex + checked parses: a failed
//! numeric parse yields no clause, never an error, so a bad sentence
//! cannot abort the parse of the rest of the document.

use std::sync::LazyLock;

use regex::Regex;

use super::lexicon;
use crate::models::enums::{Certainty, ClauseType, Operator, RuleField, TimeUnit};
use crate::models::rule::RuleValue;

/// One clause extracted from a sentence. `span` is byte offsets within
/// the sentence; the caller widens it to document offsets.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedClause {
    pub field: RuleField,
    pub operator: Operator,
    pub value: RuleValue,
    pub unit: Option<String>,
    pub certainty: Certainty,
    pub span: (usize, usize),
}

/// Run the battery in its fixed order. First non-empty result wins.
pub fn run_battery(sentence: &str, clause_type: ClauseType) -> Vec<ExtractedClause> {
    let extractors: &[fn(&str, ClauseType) -> Vec<ExtractedClause>] = &[
        extract_age_range,
        extract_age_threshold,
        extract_sex_restriction,
        extract_lab_threshold,
        extract_time_window,
        extract_keyword_hit,
    ];
    for extractor in extractors {
        let clauses = extractor(sentence, clause_type);
        if !clauses.is_empty() {
            return clauses;
        }
    }
    vec![]
}

// ── Age ─────────────────────────────────────────────────────────────

static AGE_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:aged?\s+)?(\d{1,3})\s*(?:-|–|—|\bto\b)\s*(\d{1,3})\s*(?:years?|yrs?)(?:\s+of\s+age|\s+old)?\b")
        .unwrap()
});

fn extract_age_range(sentence: &str, _clause_type: ClauseType) -> Vec<ExtractedClause> {
    let Some(caps) = AGE_RANGE.captures(sentence) else {
        return vec![];
    };
    let (Ok(min), Ok(max)) = (caps[1].parse::<f64>(), caps[2].parse::<f64>()) else {
        return vec![];
    };
    if min >= max || max >= 200.0 {
        return vec![];
    }
    let whole = caps.get(0).unwrap();
    let span = (whole.start(), whole.end());
    vec![
        age_clause(Operator::Gte, min, Certainty::High, span),
        age_clause(Operator::Lte, max, Certainty::High, span),
    ]
}

static AGE_GTE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\b(?:aged?\s*)?(?:≥|>=)\s*(\d{1,3})\s*(?:years?|yrs?)?\b").unwrap(),
        Regex::new(r"(?i)\b(\d{1,3})\s*(?:years?|yrs?)\s*(?:of\s+age\s*)?(?:or|and)\s+(?:older|above|over)\b").unwrap(),
        Regex::new(r"(?i)\b(?:at\s+least|older\s+than|over)\s+(\d{1,3})\s*(?:years?|yrs?)(?:\s+of\s+age|\s+old)?\b").unwrap(),
    ]
});

static AGE_LTE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\b(?:aged?\s*)?(?:≤|<=)\s*(\d{1,3})\s*(?:years?|yrs?)\b").unwrap(),
        Regex::new(r"(?i)\b(\d{1,3})\s*(?:years?|yrs?)\s*(?:of\s+age\s*)?or\s+younger\b").unwrap(),
        Regex::new(r"(?i)\b(?:younger\s+than|under|no\s+older\s+than)\s+(\d{1,3})\s*(?:years?|yrs?)\b").unwrap(),
    ]
});

fn extract_age_threshold(sentence: &str, _clause_type: ClauseType) -> Vec<ExtractedClause> {
    for (patterns, operator) in [(&*AGE_GTE, Operator::Gte), (&*AGE_LTE, Operator::Lte)] {
        for re in patterns {
            if let Some(caps) = re.captures(sentence) {
                let Ok(bound) = caps[1].parse::<f64>() else {
                    continue;
                };
                if bound >= 200.0 {
                    continue;
                }
                let whole = caps.get(0).unwrap();
                // "older than 18" is strictly greater; we extract the
                // stated bound and mark the looser reading medium.
                let strict = whole.as_str().to_lowercase();
                let certainty = if strict.contains("older than") || strict.contains("younger than") {
                    Certainty::Medium
                } else {
                    Certainty::High
                };
                return vec![age_clause(operator, bound, certainty, (whole.start(), whole.end()))];
            }
        }
    }
    vec![]
}

fn age_clause(operator: Operator, bound: f64, certainty: Certainty, span: (usize, usize)) -> ExtractedClause {
    ExtractedClause {
        field: RuleField::Age,
        operator,
        value: RuleValue::Number(bound),
        unit: Some("years".into()),
        certainty,
        span,
    }
}

// ── Sex ─────────────────────────────────────────────────────────────

static SEX_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:only\s+(male|female|men|women)s?|(male|female|men|women)s?(?:\s+(?:patients?|participants?|subjects?))?\s+only)\b",
    )
    .unwrap()
});

fn extract_sex_restriction(sentence: &str, _clause_type: ClauseType) -> Vec<ExtractedClause> {
    let Some(caps) = SEX_ONLY.captures(sentence) else {
        return vec![];
    };
    let raw = caps
        .get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_lowercase())
        .unwrap_or_default();
    let sex = match raw.as_str() {
        "male" | "men" => "male",
        "female" | "women" => "female",
        _ => return vec![],
    };
    let whole = caps.get(0).unwrap();
    vec![ExtractedClause {
        field: RuleField::Sex,
        operator: Operator::Eq,
        value: RuleValue::Text(sex.into()),
        unit: None,
        certainty: Certainty::High,
        span: (whole.start(), whole.end()),
    }]
}

// ── Lab thresholds ──────────────────────────────────────────────────

static LAB_COMPARATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^[\s,:]*(?:levels?\s+|values?\s+|of\s+|must\s+be\s+|should\s+be\s+)*(≥|>=|≤|<=|>|<|at\s+least|at\s+most|no\s+more\s+than|no\s+less\s+than|greater\s+than\s+or\s+equal\s+to|less\s+than\s+or\s+equal\s+to|greater\s+than|less\s+than|above|below)\s*(\d+(?:\.\d+)?)\s*(%|[a-zA-Zµμ][\w/^%×\.\-]*)?",
    )
    .unwrap()
});

fn extract_lab_threshold(sentence: &str, _clause_type: ClauseType) -> Vec<ExtractedClause> {
    // Offsets must come from the original sentence; lowercasing can
    // change byte lengths and shift every index after the change.
    let Some((term_range, _term)) = lexicon::find_lab_span(sentence) else {
        return vec![];
    };
    let after = &sentence[term_range.end..];

    let Some(caps) = LAB_COMPARATOR.captures(after) else {
        return vec![];
    };
    let Ok(threshold) = caps[2].parse::<f64>() else {
        return vec![];
    };

    let comparator = caps[1].to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ");
    let (operator, certainty) = match comparator.as_str() {
        "≥" | ">=" | "at least" | "no less than" | "greater than or equal to" => {
            (Operator::Gte, Certainty::High)
        }
        "≤" | "<=" | "at most" | "no more than" | "less than or equal to" => {
            (Operator::Lte, Certainty::High)
        }
        ">" | "greater than" | "above" => (Operator::Gte, Certainty::Medium),
        "<" | "less than" | "below" => (Operator::Lte, Certainty::Medium),
        _ => return vec![],
    };

    let unit = caps
        .get(3)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';']).to_string())
        .filter(|u| !u.is_empty());

    let end = term_range.end + caps.get(0).unwrap().end();
    vec![ExtractedClause {
        field: RuleField::Lab,
        operator,
        value: RuleValue::Number(threshold),
        unit,
        certainty,
        span: (term_range.start, end),
    }]
}

// ── Time windows ────────────────────────────────────────────────────

static TIME_WINDOW: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\b(?:within|in|during)\s+the\s+(?:last|past|previous)\s+(\d{1,3})\s+(days?|weeks?|months?|years?)\b").unwrap(),
        Regex::new(r"(?i)\bwithin\s+(\d{1,3})\s+(days?|weeks?|months?|years?)\b").unwrap(),
        Regex::new(r"(?i)\b(?:less\s+than|<)\s*(\d{1,3})\s+(days?|weeks?|months?|years?)\s+(?:ago|prior|before)\b").unwrap(),
    ]
});

static HISTORY_OF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bhistory\s+of\b").unwrap());

fn extract_time_window(sentence: &str, _clause_type: ClauseType) -> Vec<ExtractedClause> {
    for re in &*TIME_WINDOW {
        let Some(caps) = re.captures(sentence) else {
            continue;
        };
        let Ok(count) = caps[1].parse::<f64>() else {
            continue;
        };
        let Some(unit) = TimeUnit::parse(&caps[2]) else {
            continue;
        };

        // The entity the window applies to stays in the evidence
        // sentence; evaluation filters profile entries against it.
        let (field, certainty) = match lexicon::find_entity(sentence) {
            Some((field, _)) => (field, Certainty::High),
            None if HISTORY_OF.is_match(sentence) => (RuleField::History, Certainty::Medium),
            None => (RuleField::History, Certainty::Low),
        };

        return vec![ExtractedClause {
            field,
            operator: Operator::WithinLast,
            value: RuleValue::Number(count),
            unit: Some(unit.as_str().into()),
            certainty,
            span: (0, sentence.len()),
        }];
    }
    vec![]
}

// ── Keyword hits ────────────────────────────────────────────────────

static NEGATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:no|not|without|never|free\s+of|absence\s+of)\b").unwrap()
});

fn extract_keyword_hit(sentence: &str, clause_type: ClauseType) -> Vec<ExtractedClause> {
    let Some((entity_field, term)) = lexicon::find_entity(sentence) else {
        return vec![];
    };
    let negated = NEGATION.is_match(sentence);
    let historical = HISTORY_OF.is_match(sentence);
    let field = if historical { RuleField::History } else { entity_field };

    let (operator, certainty) = match clause_type {
        // In an exclusion section, having the entity triggers the
        // exclusion; a negated phrasing there reads ambiguously.
        ClauseType::Exclusion => (
            Operator::In,
            if negated { Certainty::Low } else { Certainty::Medium },
        ),
        ClauseType::Inclusion if negated && field == RuleField::History => {
            (Operator::NoHistory, Certainty::Medium)
        }
        ClauseType::Inclusion if negated => (Operator::NotIn, Certainty::Medium),
        ClauseType::Inclusion => (Operator::In, Certainty::Medium),
    };

    vec![ExtractedClause {
        field,
        operator,
        value: RuleValue::Text(term),
        unit: None,
        certainty,
        span: (0, sentence.len()),
    }]
}
