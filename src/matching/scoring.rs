//! Weighted scoring over rule verdicts.
//!
//! The score orders trials for one patient; it is not comparable across
//! patients. FAIL is weighted heavily negative so a single disqualifier
//! drags the trial down even when everything else passes.

use crate::models::enums::{Certainty, ClauseType, RuleField, Verdict};
use crate::models::verdict::RuleVerdict;

#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub pass_value: f64,
    pub unknown_value: f64,
    pub fail_value: f64,
    pub default_weight: f64,
    /// Lab criteria are usually the decisive ones, so they weigh more.
    pub lab_weight: f64,
    /// Certainty assigned when a criteria set has zero rules.
    pub neutral_certainty: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            pass_value: 1.0,
            unknown_value: 0.3,
            fail_value: -2.0,
            default_weight: 1.0,
            lab_weight: 1.2,
            neutral_certainty: 0.1,
        }
    }
}

impl ScoringConfig {
    fn weight(&self, field: RuleField) -> f64 {
        if field == RuleField::Lab {
            self.lab_weight
        } else {
            self.default_weight
        }
    }

    fn value(&self, verdict: Verdict) -> f64 {
        match verdict {
            Verdict::Pass => self.pass_value,
            Verdict::Unknown => self.unknown_value,
            Verdict::Fail => self.fail_value,
        }
    }
}

/// Weighted sum over all verdicts.
pub fn score(verdicts: &[&RuleVerdict], config: &ScoringConfig) -> f64 {
    verdicts
        .iter()
        .map(|v| config.weight(v.rule_meta.field) * config.value(v.verdict))
        .sum()
}

/// Fraction of rules with a definite PASS. Zero rules means nothing is
/// known, which is not the same as zero confidence in a real parse.
pub fn certainty(verdicts: &[&RuleVerdict], config: &ScoringConfig) -> f64 {
    if verdicts.is_empty() {
        return config.neutral_certainty;
    }
    let passes = verdicts.iter().filter(|v| v.verdict == Verdict::Pass).count();
    passes as f64 / verdicts.len() as f64
}

/// A hard-filter failure forces the trial to the bottom of the ranking:
/// a failed demographic bound, or a high-certainty exclusion hit.
pub fn is_hard_filter_fail(verdict: &RuleVerdict) -> bool {
    if verdict.verdict != Verdict::Fail {
        return false;
    }
    matches!(verdict.rule_meta.field, RuleField::Age | RuleField::Sex)
        || (verdict.rule_meta.clause_type == ClauseType::Exclusion
            && verdict.rule_meta.certainty == Certainty::High)
}
