//! Prompt construction for the LLM eligibility parser.

/// System prompt. The schema mirrors the EligibilityRule contract; the
/// evidence requirement is what the alignment gate verifies afterwards.
pub const ELIGIBILITY_SYSTEM_PROMPT: &str = r#"You extract structured eligibility rules from clinical trial criteria text.

Respond with a single JSON object inside a ```json fenced block, and nothing else:

```json
{
  "rules": [
    {
      "clause_type": "INCLUSION" | "EXCLUSION",
      "field": "age" | "sex" | "condition" | "medication" | "lab" | "procedure" | "history" | "other",
      "operator": ">=" | "<=" | "=" | "IN" | "NOT_IN" | "WITHIN_LAST" | "NO_HISTORY" | "EXISTS",
      "value": <number, string, or array of strings>,
      "unit": <string or null>,
      "certainty": "high" | "medium" | "low",
      "evidence_text": "<verbatim sentence or phrase copied from the source text>"
    }
  ]
}
```

Rules:
- Allowed operators per field: age >=,<= ; sex = ; condition/medication/procedure IN,NOT_IN,WITHIN_LAST ; history IN,NO_HISTORY,WITHIN_LAST ; lab >=,<=,IN ; other IN,EXISTS.
- WITHIN_LAST takes a numeric value and unit days|weeks|months|years.
- evidence_text MUST be copied verbatim from the source text. Never paraphrase it and never invent criteria that are not in the text.
- One rule per atomic clause. An age range becomes two rules.
- If a clause cannot be expressed in this schema, omit it."#;

/// Build the user prompt around (already sanitized) eligibility text.
pub fn build_user_prompt(eligibility_text: &str) -> String {
    format!(
        "Extract the eligibility rules from the following clinical trial criteria.\n\n\
         <criteria>\n{eligibility_text}\n</criteria>"
    )
}

/// Appended to the user prompt on the single repair retry after a
/// schema-validation failure.
pub fn repair_suffix(error: &str) -> String {
    format!(
        "\n\nYour previous response was rejected: {error}. \
         Respond again with ONLY the ```json fenced block matching the schema exactly."
    )
}

/// Light input sanitation before the text is sent to the provider:
/// strip zero-width/bidi control characters and cap the length.
pub fn sanitize_for_llm(text: &str, max_chars: usize) -> String {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, '\u{200B}'..='\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{FEFF}'))
        .collect();
    match cleaned.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => cleaned[..byte_idx].to_string(),
        None => cleaned,
    }
}
