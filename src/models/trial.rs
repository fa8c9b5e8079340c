use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trial record as delivered by the ingestion collaborator. The core
/// reads `eligibility_text` (and `nct_id` for identity); everything
/// else passes through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialRecord {
    pub nct_id: String,
    pub eligibility_text: String,
    pub status: String,
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub locations: Vec<String>,
    /// When the registry record was last fetched; ranking uses this as
    /// the recency tie-break.
    pub fetched_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_minimal_registry_record() {
        let json = r#"{
            "nct_id": "NCT01234567",
            "eligibility_text": "Inclusion Criteria:\n- Age 18 years or older.",
            "status": "Recruiting",
            "fetched_at": "2026-08-01T12:00:00Z"
        }"#;
        let trial: TrialRecord = serde_json::from_str(json).unwrap();
        assert_eq!(trial.nct_id, "NCT01234567");
        assert!(trial.phase.is_none());
        assert!(trial.conditions.is_empty());
    }
}
