//! Deterministic ordering of match results for one patient.

use chrono::{DateTime, Utc};

use crate::models::match_result::MatchResult;

/// A match result paired with the trial's registry freshness, which is
/// the final ranking tie-break.
#[derive(Debug, Clone)]
pub struct RankedTrial {
    pub result: MatchResult,
    pub trial_updated_at: DateTime<Utc>,
}

/// Sort trials for display: hard-excluded trials always sink to the
/// bottom, then score, then certainty, then registry freshness.
pub fn rank(mut trials: Vec<RankedTrial>) -> Vec<RankedTrial> {
    trials.sort_by(|a, b| {
        a.result
            .hard_excluded
            .cmp(&b.result.hard_excluded)
            .then_with(|| b.result.score.total_cmp(&a.result.score))
            .then_with(|| b.result.certainty.total_cmp(&a.result.certainty))
            .then_with(|| b.trial_updated_at.cmp(&a.trial_updated_at))
    });
    trials
}
