//! Matching engine: evaluates a criteria set against a patient profile
//! and produces an immutable MatchResult snapshot.

use chrono::{NaiveDate, Utc};
use thiserror::Error;

use crate::models::criteria::TrialCriteriaSet;
use crate::models::enums::{ClauseType, Verdict};
use crate::models::match_result::{derive_tier, Checklist, MatchResult};
use crate::models::profile::PatientProfile;
use crate::models::trial::TrialRecord;
use crate::models::verdict::RuleVerdict;

use super::evaluate::evaluate_rule;
use super::ranking::{rank, RankedTrial};
use super::scoring::{self, ScoringConfig};

/// Trial-level pre-filter applied before any rule evaluation. Empty
/// lists mean "any".
#[derive(Debug, Clone, Default)]
pub struct TrialFilter {
    pub statuses: Vec<String>,
    pub phases: Vec<String>,
    pub conditions: Vec<String>,
}

impl TrialFilter {
    pub fn accepts(&self, trial: &TrialRecord) -> bool {
        let status_ok = self.statuses.is_empty()
            || self.statuses.iter().any(|s| s.eq_ignore_ascii_case(&trial.status));
        let phase_ok = self.phases.is_empty()
            || trial
                .phase
                .as_deref()
                .is_some_and(|p| self.phases.iter().any(|f| f.eq_ignore_ascii_case(p)));
        let condition_ok = self.conditions.is_empty()
            || self.conditions.iter().any(|wanted| {
                trial
                    .conditions
                    .iter()
                    .any(|c| c.to_lowercase().contains(&wanted.to_lowercase()))
            });
        status_ok && phase_ok && condition_ok
    }
}

/// Request-level match failures. Per-rule data gaps are UNKNOWN
/// verdicts, never errors; these two mean the inputs themselves are
/// unusable.
#[derive(Error, Debug)]
pub enum MatchError {
    #[error("profile has no demographics section")]
    MissingDemographics,

    #[error("criteria set for {trial_id} is corrupt: rule {rule_id}: {detail}")]
    CorruptCriteria {
        trial_id: String,
        rule_id: String,
        detail: String,
    },
}

pub struct MatchEngine {
    scoring: ScoringConfig,
    /// Pinned evaluation date for time windows. None means "today",
    /// resolved once per match so every rule sees the same date.
    eval_date: Option<NaiveDate>,
}

impl Default for MatchEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchEngine {
    pub fn new() -> Self {
        Self {
            scoring: ScoringConfig::default(),
            eval_date: None,
        }
    }

    pub fn with_eval_date(mut self, date: NaiveDate) -> Self {
        self.eval_date = Some(date);
        self
    }

    pub fn with_scoring(mut self, scoring: ScoringConfig) -> Self {
        self.scoring = scoring;
        self
    }

    /// Evaluate every rule in the criteria set against the profile.
    ///
    /// Deterministic for a fixed (profile, criteria, eval_date) triple.
    /// The result freezes profile and parser versions so it stays
    /// reproducible after later edits.
    pub fn match_trial(
        &self,
        profile: &PatientProfile,
        criteria: &TrialCriteriaSet,
    ) -> Result<MatchResult, MatchError> {
        if profile.demographics.is_none() {
            return Err(MatchError::MissingDemographics);
        }
        for rule in &criteria.rules {
            rule.validate().map_err(|violation| MatchError::CorruptCriteria {
                trial_id: criteria.trial_id.clone(),
                rule_id: rule.id.clone(),
                detail: violation.to_string(),
            })?;
        }

        let eval_date = self.eval_date.unwrap_or_else(|| Utc::now().date_naive());

        let mut inclusion: Vec<RuleVerdict> = Vec::new();
        let mut exclusion: Vec<RuleVerdict> = Vec::new();
        for rule in &criteria.rules {
            let verdict = evaluate_rule(rule, profile, eval_date);
            match rule.clause_type {
                ClauseType::Inclusion => inclusion.push(verdict),
                ClauseType::Exclusion => exclusion.push(verdict),
            }
        }

        let all: Vec<&RuleVerdict> = inclusion.iter().chain(exclusion.iter()).collect();

        let mut missing_info: Vec<String> = Vec::new();
        for verdict in &all {
            if verdict.verdict != Verdict::Unknown {
                continue;
            }
            if let Some(field) = verdict
                .evaluation_meta
                .as_ref()
                .and_then(|m| m.missing_field.clone())
            {
                if !missing_info.contains(&field) {
                    missing_info.push(field);
                }
            }
        }

        let score = scoring::score(&all, &self.scoring);
        let certainty = scoring::certainty(&all, &self.scoring);
        let tier = derive_tier(&all);
        let hard_excluded = all.iter().any(|v| scoring::is_hard_filter_fail(v));

        tracing::debug!(
            trial_id = %criteria.trial_id,
            rules = all.len(),
            score,
            certainty,
            ?tier,
            hard_excluded,
            "match computed"
        );

        Ok(MatchResult {
            patient_profile_id: profile.id,
            profile_version: profile.version,
            trial_id: criteria.trial_id.clone(),
            parser_version: criteria.parser_version,
            score,
            certainty,
            checklist: Checklist {
                inclusion,
                exclusion,
                missing_info,
            },
            tier,
            hard_excluded,
            evaluated_at: eval_date,
        })
    }

    /// Match one patient against a batch of trials, then rank. Trials
    /// rejected by the filter are skipped; a trial whose match fails is
    /// logged and dropped from the ranking rather than aborting the
    /// batch.
    pub fn match_and_rank(
        &self,
        profile: &PatientProfile,
        trials: &[(TrialRecord, TrialCriteriaSet)],
        filter: &TrialFilter,
    ) -> Vec<RankedTrial> {
        let mut results = Vec::new();
        for (trial, criteria) in trials {
            if !filter.accepts(trial) {
                continue;
            }
            match self.match_trial(profile, criteria) {
                Ok(result) => results.push(RankedTrial {
                    result,
                    trial_updated_at: trial.fetched_at,
                }),
                Err(error) => {
                    tracing::warn!(trial_id = %trial.nct_id, %error, "trial cannot be matched");
                }
            }
        }
        rank(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::criteria::CoverageStats;
    use crate::models::enums::{Certainty, Operator, ParserVersion, RuleField, Sex, Tier};
    use crate::models::profile::{DatedEntry, LabValue};
    use crate::models::rule::{EligibilityRule, RuleValue};
    use crate::parser::rule_based::RuleBasedParser;

    const ELIGIBILITY: &str = "Inclusion Criteria:\n\
        - Aged 18 years or older.\n\
        - HbA1c must be <= 8.0%.\n\
        \n\
        Exclusion Criteria:\n\
        - Major surgery within the last 6 months.\n";

    fn eval_day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 1).unwrap()
    }

    fn criteria_from_text() -> TrialCriteriaSet {
        let parse = RuleBasedParser::parse(ELIGIBILITY);
        TrialCriteriaSet {
            trial_id: "NCT01234567".into(),
            parser_version: ParserVersion::RuleV1,
            rules: parse.rules,
            coverage_stats: parse.stats,
            created_at: Utc::now(),
        }
    }

    fn engine() -> MatchEngine {
        MatchEngine::new().with_eval_date(eval_day())
    }

    fn full_profile() -> PatientProfile {
        let mut p = PatientProfile::new(54, Sex::Female);
        p.procedures = Some(vec![]);
        p.labs = Some(vec![LabValue {
            name: "HbA1c".into(),
            value: 7.2,
            unit: Some("%".into()),
            date: None,
        }]);
        p
    }

    #[test]
    fn fully_answerable_profile_is_eligible() {
        let result = engine().match_trial(&full_profile(), &criteria_from_text()).unwrap();
        assert_eq!(result.tier, Tier::Eligible);
        assert!(!result.hard_excluded);
        assert!(result.score > 0.0);
        assert!((result.certainty - 1.0).abs() < 1e-9);
        assert_eq!(result.checklist.inclusion.len(), 2);
        assert_eq!(result.checklist.exclusion.len(), 1);
        assert!(result.checklist.missing_info.is_empty());
    }

    #[test]
    fn underage_patient_is_hard_excluded() {
        let mut p = full_profile();
        p.demographics.as_mut().unwrap().age = Some(16);

        let result = engine().match_trial(&p, &criteria_from_text()).unwrap();
        assert_eq!(result.tier, Tier::Ineligible);
        assert!(result.hard_excluded);
    }

    #[test]
    fn missing_lab_surfaces_in_missing_info() {
        let mut p = full_profile();
        p.labs = None;

        let result = engine().match_trial(&p, &criteria_from_text()).unwrap();
        assert_eq!(result.tier, Tier::Potential);
        assert!(result.checklist.missing_info.contains(&"hba1c".to_string()));
    }

    #[test]
    fn recent_surgery_trips_the_exclusion_window() {
        let mut p = full_profile();
        p.procedures = Some(vec![DatedEntry::dated(
            "knee surgery",
            NaiveDate::from_ymd_opt(2026, 6, 10).unwrap(),
        )]);

        let result = engine().match_trial(&p, &criteria_from_text()).unwrap();
        assert_eq!(result.tier, Tier::Ineligible);
        assert!(result.hard_excluded, "high-certainty exclusion hit");
        let window_verdict = &result.checklist.exclusion[0];
        assert_eq!(window_verdict.verdict, Verdict::Fail);
        assert_eq!(window_verdict.rule_meta.time_window.as_deref(), Some("6 months"));
    }

    #[test]
    fn profile_without_demographics_is_a_request_error() {
        let mut p = full_profile();
        p.demographics = None;
        let err = engine().match_trial(&p, &criteria_from_text()).unwrap_err();
        assert!(matches!(err, MatchError::MissingDemographics));
    }

    #[test]
    fn corrupt_criteria_are_rejected_up_front() {
        let mut criteria = criteria_from_text();
        criteria.rules.push(EligibilityRule {
            id: "r999".into(),
            clause_type: crate::models::enums::ClauseType::Inclusion,
            field: RuleField::Age,
            operator: Operator::Gte,
            value: RuleValue::Text("eighteen".into()),
            unit: None,
            certainty: Certainty::High,
            evidence_text: "Adults only.".into(),
            source_span: None,
        });

        let err = engine().match_trial(&full_profile(), &criteria).unwrap_err();
        assert!(matches!(err, MatchError::CorruptCriteria { .. }));
    }

    #[test]
    fn empty_criteria_set_is_potential_with_neutral_certainty() {
        let criteria = TrialCriteriaSet {
            trial_id: "NCT00000009".into(),
            parser_version: ParserVersion::RuleV1,
            rules: vec![],
            coverage_stats: CoverageStats::new(3, 0, 3, 0),
            created_at: Utc::now(),
        };
        let result = engine().match_trial(&full_profile(), &criteria).unwrap();
        assert_eq!(result.tier, Tier::Potential);
        assert!((result.certainty - 0.1).abs() < 1e-9);
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn match_is_deterministic_for_pinned_date() {
        let p = full_profile();
        let criteria = criteria_from_text();
        let a = engine().match_trial(&p, &criteria).unwrap();
        let b = engine().match_trial(&p, &criteria).unwrap();
        assert_eq!(a.score, b.score);
        assert_eq!(a.certainty, b.certainty);
        assert_eq!(a.tier, b.tier);
        assert_eq!(a.evaluated_at, b.evaluated_at);
    }

    fn trial_record(nct_id: &str, status: &str, phase: Option<&str>) -> TrialRecord {
        TrialRecord {
            nct_id: nct_id.into(),
            eligibility_text: ELIGIBILITY.into(),
            status: status.into(),
            phase: phase.map(str::to_string),
            conditions: vec!["Type 2 Diabetes".into()],
            locations: vec![],
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn filter_screens_status_phase_and_condition() {
        let recruiting = trial_record("NCT1", "Recruiting", Some("Phase 3"));
        let completed = trial_record("NCT2", "Completed", Some("Phase 3"));

        let filter = TrialFilter {
            statuses: vec!["recruiting".into()],
            ..TrialFilter::default()
        };
        assert!(filter.accepts(&recruiting));
        assert!(!filter.accepts(&completed));

        let phase_filter = TrialFilter {
            phases: vec!["Phase 2".into()],
            ..TrialFilter::default()
        };
        assert!(!phase_filter.accepts(&recruiting));

        let condition_filter = TrialFilter {
            conditions: vec!["diabetes".into()],
            ..TrialFilter::default()
        };
        assert!(condition_filter.accepts(&recruiting));

        assert!(TrialFilter::default().accepts(&completed));
    }

    #[test]
    fn batch_match_skips_unmatched_trials_and_ranks_the_rest() {
        let good = (trial_record("NCT1", "Recruiting", None), criteria_from_text());

        let mut corrupt_criteria = criteria_from_text();
        corrupt_criteria.trial_id = "NCT2".into();
        corrupt_criteria.rules[0].evidence_text = String::new();
        let corrupt = (trial_record("NCT2", "Recruiting", None), corrupt_criteria);

        let ranked = engine().match_and_rank(
            &full_profile(),
            &[good, corrupt],
            &TrialFilter::default(),
        );
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].result.trial_id, "NCT01234567");
    }

    #[test]
    fn result_freezes_profile_and_parser_versions() {
        let p = full_profile();
        let result = engine().match_trial(&p, &criteria_from_text()).unwrap();
        assert_eq!(result.profile_version, p.version);
        assert_eq!(result.parser_version, ParserVersion::RuleV1);
        assert_eq!(result.patient_profile_id, p.id);
    }
}
