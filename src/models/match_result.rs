use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{ParserVersion, Tier, Verdict};
use super::verdict::RuleVerdict;

/// Per-rule checklist split by clause type, plus the deduplicated
/// missing-information list across UNKNOWN verdicts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Checklist {
    pub inclusion: Vec<RuleVerdict>,
    pub exclusion: Vec<RuleVerdict>,
    pub missing_info: Vec<String>,
}

/// Result of matching one patient against one trial.
///
/// A MatchResult is a snapshot: it freezes the parser version and the
/// profile version it was computed against, plus the evaluation date
/// time windows were measured from. Recomputation is explicit (rerun),
/// never implicit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub patient_profile_id: Uuid,
    pub profile_version: u32,
    pub trial_id: String,
    pub parser_version: ParserVersion,
    pub score: f64,
    pub certainty: f64,
    pub checklist: Checklist,
    pub tier: Tier,
    /// True when a hard-filter rule failed (age, sex, or a
    /// high-certainty exclusion); ranking forces these to the bottom.
    pub hard_excluded: bool,
    pub evaluated_at: NaiveDate,
}

/// Derive the tier from verdict counts alone, so the UI and the engine
/// can never disagree.
pub fn derive_tier(verdicts: &[&RuleVerdict]) -> Tier {
    let fails = verdicts.iter().filter(|v| v.verdict == Verdict::Fail).count();
    let unknowns = verdicts.iter().filter(|v| v.verdict == Verdict::Unknown).count();
    if fails > 0 {
        Tier::Ineligible
    } else if unknowns > 0 || verdicts.is_empty() {
        // Zero parsed rules means everything about eligibility is
        // still missing, so the trial stays POTENTIAL, not ELIGIBLE.
        Tier::Potential
    } else {
        Tier::Eligible
    }
}
