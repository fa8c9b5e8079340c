use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::ParserVersion;
use super::rule::EligibilityRule;

/// Parse coverage accounting, persisted with every criteria set.
///
/// All counts are sentences: `total` examined, `known` converted into
/// at least one valid rule, `unknown` covered by no extractor, `failed`
/// whose extracted rules were all dropped for contract violations.
/// `ratio` = known / total, always within 0..=1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageStats {
    pub total: usize,
    pub known: usize,
    pub unknown: usize,
    pub failed: usize,
    pub ratio: f32,
}

impl CoverageStats {
    pub fn new(total: usize, known: usize, unknown: usize, failed: usize) -> Self {
        let ratio = if total == 0 {
            0.0
        } else {
            known as f32 / total as f32
        };
        Self {
            total,
            known,
            unknown,
            failed,
            ratio,
        }
    }
}

/// Structured rule set for one (trial, parser_version) pair.
/// Immutable once written: a re-parse produces a new set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialCriteriaSet {
    pub trial_id: String,
    pub parser_version: ParserVersion,
    pub rules: Vec<EligibilityRule>,
    pub coverage_stats: CoverageStats,
    pub created_at: DateTime<Utc>,
}

impl TrialCriteriaSet {
    /// A trial whose parse yielded no rules still gets a criteria set;
    /// browsing surfaces it with its raw text and this marker false.
    pub fn criteria_available(&self) -> bool {
        !self.rules.is_empty()
    }
}
