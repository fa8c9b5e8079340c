use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Sex;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    pub age: Option<u32>,
    pub sex: Option<Sex>,
}

/// A named entry in a profile section (condition, medication, procedure,
/// history item), optionally dated. Undated entries can never satisfy a
/// time-window clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatedEntry {
    pub name: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

impl DatedEntry {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            date: None,
        }
    }

    pub fn dated(name: &str, date: NaiveDate) -> Self {
        Self {
            name: name.to_string(),
            date: Some(date),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabValue {
    pub name: String,
    pub value: f64,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

/// Patient profile as supplied by the profile store. The matching engine
/// reads it and never mutates it.
///
/// Sections are `Option<Vec<_>>` so that "section never filled in"
/// (None, evaluates UNKNOWN) is distinguishable from "explicitly empty"
/// (Some(vec![]), evaluates as a definite absence).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientProfile {
    pub id: Uuid,
    /// Monotonic profile version, frozen into each MatchResult so the
    /// result stays reproducible after later profile edits.
    #[serde(default)]
    pub version: u32,
    pub demographics: Option<Demographics>,
    #[serde(default)]
    pub conditions: Option<Vec<DatedEntry>>,
    #[serde(default)]
    pub medications: Option<Vec<DatedEntry>>,
    #[serde(default)]
    pub procedures: Option<Vec<DatedEntry>>,
    #[serde(default)]
    pub history: Option<Vec<DatedEntry>>,
    #[serde(default)]
    pub labs: Option<Vec<LabValue>>,
}

impl PatientProfile {
    /// Empty profile with demographics only.
    pub fn new(age: u32, sex: Sex) -> Self {
        Self {
            id: Uuid::new_v4(),
            version: 1,
            demographics: Some(Demographics {
                age: Some(age),
                sex: Some(sex),
            }),
            conditions: None,
            medications: None,
            procedures: None,
            history: None,
            labs: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_section_deserializes_to_none() {
        let json = r#"{
            "id": "7a4c52a0-3f3a-4b22-9c2e-000000000001",
            "demographics": {"age": 54, "sex": "female"},
            "labs": [{"name": "HbA1c", "value": 7.2, "unit": "%"}]
        }"#;
        let profile: PatientProfile = serde_json::from_str(json).unwrap();
        assert!(profile.conditions.is_none());
        assert_eq!(profile.labs.as_ref().unwrap().len(), 1);
        assert_eq!(profile.demographics.unwrap().sex, Some(Sex::Female));
    }

    #[test]
    fn explicitly_empty_section_stays_empty() {
        let json = r#"{
            "id": "7a4c52a0-3f3a-4b22-9c2e-000000000002",
            "demographics": {"age": 30, "sex": "male"},
            "medications": []
        }"#;
        let profile: PatientProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.medications, Some(vec![]));
    }
}
