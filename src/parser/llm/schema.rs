//! Strict schema validation for LLM output.
//!
//! The fenced JSON block is extracted leniently (models wrap it in
//! prose), but every rule inside is validated against the per-field
//! contract; we reject rather than coerce. Structural failures are
//! schema errors (worth one repair retry); individual bad rules are
//! dropped and counted.

use serde::Deserialize;

use crate::models::enums::{Certainty, ClauseType, Operator, RuleField};
use crate::models::rule::{EligibilityRule, RuleValue};

/// Rule as deserialized from the model, before contract validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawLlmRule {
    pub clause_type: String,
    pub field: String,
    pub operator: String,
    pub value: serde_json::Value,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub certainty: Option<String>,
    #[serde(default)]
    pub evidence_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    rules: Vec<serde_json::Value>,
}

/// Extract the ```json fenced block, falling back to the first brace
/// pair when the model skipped the fence.
pub fn extract_json_block(response: &str) -> Result<String, String> {
    if let Some(fence_start) = response.find("```json") {
        let content_start = fence_start + 7;
        let fence_end = response[content_start..]
            .find("```")
            .ok_or_else(|| "unclosed JSON fence".to_string())?;
        return Ok(response[content_start..content_start + fence_end].trim().to_string());
    }

    let brace_start = response.find('{').ok_or_else(|| "no JSON object found".to_string())?;
    let brace_end = response.rfind('}').ok_or_else(|| "no closing brace found".to_string())?;
    if brace_end <= brace_start {
        return Err("no JSON object found".to_string());
    }
    Ok(response[brace_start..=brace_end].to_string())
}

/// Parse the response into raw rules. Items that are not objects of the
/// expected shape are dropped leniently; a response with no parseable
/// `rules` array is a structural failure.
pub fn parse_llm_rules(response: &str) -> Result<Vec<RawLlmRule>, String> {
    let json = extract_json_block(response)?;
    let raw: RawResponse =
        serde_json::from_str(&json).map_err(|e| format!("JSON does not match schema: {e}"))?;
    Ok(raw
        .rules
        .iter()
        .filter_map(|v| serde_json::from_value(v.clone()).ok())
        .collect())
}

/// Convert one raw rule into a validated EligibilityRule.
/// `id` is assigned by the caller to keep ids stable per parse.
pub fn to_rule(raw: &RawLlmRule, id: &str) -> Result<EligibilityRule, String> {
    let clause_type = parse_enum::<ClauseType>(&raw.clause_type, "clause_type")?;
    let field = parse_enum::<RuleField>(&raw.field, "field")?;
    let operator = parse_enum::<Operator>(&raw.operator, "operator")?;
    let certainty = match &raw.certainty {
        Some(c) => parse_enum::<Certainty>(c, "certainty")?,
        // Unstated extraction confidence is treated as low, never high.
        None => Certainty::Low,
    };

    let value: RuleValue = serde_json::from_value(raw.value.clone())
        .map_err(|_| format!("value {} is neither number, string, nor string list", raw.value))?;

    let rule = EligibilityRule {
        id: id.to_string(),
        clause_type,
        field,
        operator,
        value,
        unit: raw.unit.clone().filter(|u| !u.trim().is_empty()),
        certainty,
        evidence_text: raw.evidence_text.clone().unwrap_or_default(),
        // Assigned by the evidence-alignment gate once located.
        source_span: None,
    };

    rule.validate().map_err(|v| v.to_string())?;
    Ok(rule)
}

fn parse_enum<T: serde::de::DeserializeOwned>(raw: &str, what: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|_| format!("unrecognized {what}: {raw:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = r#"Here are the extracted rules:

```json
{
  "rules": [
    {
      "clause_type": "INCLUSION",
      "field": "age",
      "operator": ">=",
      "value": 18,
      "unit": "years",
      "certainty": "high",
      "evidence_text": "Aged 18 years or older."
    },
    {
      "clause_type": "EXCLUSION",
      "field": "procedure",
      "operator": "WITHIN_LAST",
      "value": 6,
      "unit": "months",
      "certainty": "high",
      "evidence_text": "No surgery within the last 6 months."
    }
  ]
}
```"#;

    #[test]
    fn parses_fenced_response() {
        let raw = parse_llm_rules(RESPONSE).unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0].field, "age");
        assert_eq!(raw[1].operator, "WITHIN_LAST");
    }

    #[test]
    fn falls_back_to_bare_braces() {
        let bare = r#"{"rules": [{"clause_type": "INCLUSION", "field": "sex", "operator": "=", "value": "female", "certainty": "high", "evidence_text": "Women only."}]}"#;
        let raw = parse_llm_rules(bare).unwrap();
        assert_eq!(raw.len(), 1);
    }

    #[test]
    fn missing_rules_array_is_structural_failure() {
        assert!(parse_llm_rules("no json at all").is_err());
        assert!(parse_llm_rules(r#"{"entities": []}"#).is_err());
        assert!(parse_llm_rules("```json\n{broken\n```").is_err());
    }

    #[test]
    fn malformed_items_dropped_leniently() {
        let response = r#"{"rules": [{"bogus": true}, {"clause_type": "INCLUSION", "field": "age", "operator": ">=", "value": 18, "unit": "years", "certainty": "high", "evidence_text": "Age 18+."}]}"#;
        let raw = parse_llm_rules(response).unwrap();
        assert_eq!(raw.len(), 1);
    }

    #[test]
    fn to_rule_validates_contract() {
        let raw = parse_llm_rules(RESPONSE).unwrap();
        let rule = to_rule(&raw[0], "r001").unwrap();
        assert_eq!(rule.id, "r001");
        assert_eq!(rule.operator, Operator::Gte);

        // age with IN operator violates the contract
        let mut bad = raw[0].clone();
        bad.operator = "IN".into();
        assert!(to_rule(&bad, "r002").is_err());
    }

    #[test]
    fn to_rule_rejects_missing_evidence() {
        let mut raw = parse_llm_rules(RESPONSE).unwrap().remove(0);
        raw.evidence_text = None;
        assert!(to_rule(&raw, "r001").is_err());
    }

    #[test]
    fn unstated_certainty_defaults_low() {
        let mut raw = parse_llm_rules(RESPONSE).unwrap().remove(0);
        raw.certainty = None;
        let rule = to_rule(&raw, "r001").unwrap();
        assert_eq!(rule.certainty, Certainty::Low);
    }

    #[test]
    fn unknown_enum_values_rejected() {
        let mut raw = parse_llm_rules(RESPONSE).unwrap().remove(0);
        raw.field = "genotype".into();
        assert!(to_rule(&raw, "r001").is_err());
    }
}
