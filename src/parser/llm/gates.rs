//! Quality gates applied to LLM output before it can replace the
//! rule-based parse: evidence alignment (anti-hallucination), rule-count
//! sanity (anti-truncation), and critical-field backfill.

use crate::models::enums::RuleField;
use crate::models::rule::{EligibilityRule, SourceSpan};

/// Case- and whitespace-normalized view of a text, with each normalized
/// char mapped back to its byte span in the original.
fn normalize_chars(s: &str) -> (Vec<char>, Vec<(usize, usize)>) {
    let mut chars = Vec::new();
    let mut spans = Vec::new();
    let mut pending_space = false;
    let mut started = false;

    for (idx, c) in s.char_indices() {
        if c.is_whitespace() {
            if started {
                pending_space = true;
            }
            continue;
        }
        if pending_space {
            chars.push(' ');
            spans.push((idx, idx));
            pending_space = false;
        }
        for lc in c.to_lowercase() {
            chars.push(lc);
            spans.push((idx, idx + c.len_utf8()));
        }
        started = true;
    }
    (chars, spans)
}

fn find_window(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[derive(Debug)]
pub struct AlignmentOutcome {
    /// Rules whose evidence was located, with `source_span` filled in.
    pub aligned: Vec<EligibilityRule>,
    pub unaligned: usize,
    pub total: usize,
}

impl AlignmentOutcome {
    pub fn unaligned_fraction(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            self.unaligned as f32 / self.total as f32
        }
    }
}

/// Locate each rule's evidence_text (case/whitespace-normalized) inside
/// the source eligibility text. Located rules get their span set;
/// unlocatable rules are hallucination candidates.
pub fn align_evidence(rules: Vec<EligibilityRule>, source: &str) -> AlignmentOutcome {
    let (source_chars, source_spans) = normalize_chars(source);
    let total = rules.len();
    let mut aligned = Vec::with_capacity(total);
    let mut unaligned = 0;

    for mut rule in rules {
        let (needle, _) = normalize_chars(&rule.evidence_text);
        match find_window(&source_chars, &needle) {
            Some(pos) => {
                let start = source_spans[pos].0;
                let end = source_spans[pos + needle.len() - 1].1;
                rule.source_span = Some(SourceSpan { start, end });
                aligned.push(rule);
            }
            None => {
                tracing::warn!(
                    rule_id = %rule.id,
                    evidence = %rule.evidence_text,
                    "rule evidence not locatable in source text"
                );
                unaligned += 1;
            }
        }
    }

    AlignmentOutcome {
        aligned,
        unaligned,
        total,
    }
}

/// Reject silently truncated or degenerate output: the LLM must produce
/// at least `min_rules` rules, and at least `min_ratio` of what the
/// rule-based parser found in the same text.
pub fn check_count_sanity(
    llm_count: usize,
    baseline_count: usize,
    min_rules: usize,
    min_ratio: f32,
) -> Result<(), String> {
    if llm_count < min_rules {
        return Err(format!(
            "{llm_count} rules, below absolute minimum {min_rules}"
        ));
    }
    if baseline_count > 0 {
        let ratio = llm_count as f32 / baseline_count as f32;
        if ratio < min_ratio {
            return Err(format!(
                "{llm_count} rules vs rule-based baseline {baseline_count} (ratio {ratio:.2} < {min_ratio})"
            ));
        }
    }
    Ok(())
}

/// Merge in baseline rules for critical fields the LLM omitted
/// entirely, rather than failing the whole parse. Returns how many
/// rules were backfilled.
pub fn backfill_critical_fields(
    rules: &mut Vec<EligibilityRule>,
    baseline: &[EligibilityRule],
    critical_fields: &[RuleField],
) -> usize {
    let mut added = 0;
    for &field in critical_fields {
        if rules.iter().any(|r| r.field == field) {
            continue;
        }
        for rule in baseline.iter().filter(|r| r.field == field) {
            tracing::info!(
                field = field.as_str(),
                rule_id = %rule.id,
                "backfilling critical field from rule-based parse"
            );
            rules.push(rule.clone());
            added += 1;
        }
    }
    added
}
