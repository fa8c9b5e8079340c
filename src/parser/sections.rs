//! Section and sentence segmentation for eligibility prose.
//!
//! Registry eligibility text is typically two headed lists ("Inclusion
//! Criteria:", "Exclusion Criteria:") of bullet points or short
//! sentences. Offsets always index the ORIGINAL text so rule spans stay
//! verifiable against it.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::enums::ClauseType;

/// A contiguous region of the eligibility text under one header.
#[derive(Debug, Clone)]
pub struct Section<'a> {
    pub clause_type: ClauseType,
    pub body: &'a str,
    /// Byte offset of `body` within the original text.
    pub offset: usize,
}

/// A segmented sentence with its byte offset into the original text.
#[derive(Debug, Clone, PartialEq)]
pub struct Sentence<'a> {
    pub text: &'a str,
    pub offset: usize,
}

static INCLUSION_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[\s*#]*(?:key\s+)?inclusion\s+criteria\s*:?\s*$|(?i)\binclusion\s+criteria\s*:").unwrap()
});

static EXCLUSION_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[\s*#]*(?:key\s+)?exclusion\s+criteria\s*:?\s*$|(?i)\bexclusion\s+criteria\s*:").unwrap()
});

/// Split the text into inclusion/exclusion sections on header cues.
/// Text before the first header is treated as inclusion prose, which is
/// how un-headed registry entries usually read.
pub fn split_sections(text: &str) -> Vec<Section<'_>> {
    let mut cuts: Vec<(usize, usize, ClauseType)> = Vec::new();
    for m in INCLUSION_HEADER.find_iter(text) {
        cuts.push((m.start(), m.end(), ClauseType::Inclusion));
    }
    for m in EXCLUSION_HEADER.find_iter(text) {
        cuts.push((m.start(), m.end(), ClauseType::Exclusion));
    }
    cuts.sort_by_key(|&(start, _, _)| start);

    let mut sections = Vec::new();

    let preamble_end = cuts.first().map(|&(start, _, _)| start).unwrap_or(text.len());
    if !text[..preamble_end].trim().is_empty() {
        sections.push(Section {
            clause_type: ClauseType::Inclusion,
            body: &text[..preamble_end],
            offset: 0,
        });
    }

    for (i, &(_, body_start, clause_type)) in cuts.iter().enumerate() {
        let body_end = cuts.get(i + 1).map(|&(next, _, _)| next).unwrap_or(text.len());
        if body_start < body_end && !text[body_start..body_end].trim().is_empty() {
            sections.push(Section {
                clause_type,
                body: &text[body_start..body_end],
                offset: body_start,
            });
        }
    }

    sections
}

/// Common abbreviations that end with a period but are NOT sentence
/// boundaries.
const ABBREVIATIONS: &[&str] = &[
    "Dr.", "Mr.", "Mrs.", "Ms.", "Prof.", "St.", "vs.", "etc.", "e.g.", "i.e.", "approx.",
    "no.", "pt.", "inc.", "excl.", "resp.",
];

fn ends_with_abbreviation(text: &str, period_pos: usize) -> bool {
    // Byte-wise suffix compare: a slice at prefix.len() - abbr.len()
    // could land mid-character when multi-byte text precedes the period
    let prefix = &text.as_bytes()[..=period_pos];
    ABBREVIATIONS.iter().any(|abbr| {
        let abbr = abbr.as_bytes();
        prefix.len() >= abbr.len()
            && prefix[prefix.len() - abbr.len()..].eq_ignore_ascii_case(abbr)
    })
}

/// True for decimal periods like "8.5" (digit on both sides).
fn is_decimal_point(bytes: &[u8], i: usize) -> bool {
    i > 0
        && i + 1 < bytes.len()
        && bytes[i - 1].is_ascii_digit()
        && bytes[i + 1].is_ascii_digit()
}

/// Split a section body into sentences, tracking byte offsets relative
/// to the original document (`base_offset` = section offset).
///
/// Splits on newlines (bullet lists) and on `.`/`!`/`?` boundaries,
/// skipping abbreviations and decimal points. Leading bullet markers
/// and list numbering are trimmed off each sentence, with offsets
/// adjusted to keep spans verbatim.
pub fn split_sentences<'a>(body: &'a str, base_offset: usize) -> Vec<Sentence<'a>> {
    let mut raw: Vec<(usize, usize)> = Vec::new(); // (start, end) within body
    let bytes = body.as_bytes();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if c == b'\n' {
            raw.push((start, i));
            start = i + 1;
            i += 1;
            continue;
        }
        if c == b'.' || c == b'!' || c == b'?' {
            if c == b'.' && (ends_with_abbreviation(body, i) || is_decimal_point(bytes, i)) {
                i += 1;
                continue;
            }
            raw.push((start, i + 1));
            start = i + 1;
            i += 1;
            continue;
        }
        i += 1;
    }
    if start < bytes.len() {
        raw.push((start, bytes.len()));
    }

    raw.into_iter()
        .filter_map(|(s, e)| trim_to_sentence(body, s, e, base_offset))
        .collect()
}

static BULLET_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\s]*(?:[-*•▪–—]|\d{1,2}[.)])\s*").unwrap());

/// Trim whitespace and bullet markers off a raw segment; drop segments
/// that are empty or pure punctuation after trimming.
fn trim_to_sentence<'a>(
    body: &'a str,
    start: usize,
    end: usize,
    base_offset: usize,
) -> Option<Sentence<'a>> {
    let segment = &body[start..end];
    let after_bullet = match BULLET_PREFIX.find(segment) {
        Some(m) => m.end(),
        None => 0,
    };
    let rest = &segment[after_bullet..];

    let leading_ws = rest.len() - rest.trim_start().len();
    let text = rest.trim();
    if text.is_empty() || !text.chars().any(|c| c.is_alphanumeric()) {
        return None;
    }

    let text_start = start + after_bullet + leading_ws;
    Some(Sentence {
        text: &body[text_start..text_start + text.len()],
        offset: base_offset + text_start,
    })
}
