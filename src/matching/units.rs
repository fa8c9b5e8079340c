//! Lab unit normalization and a small exact-factor conversion table.
//!
//! Only dimensionally safe conversions are listed. Analyte-dependent
//! conversions (mmol/L to mg/dL needs the molar mass) are deliberately
//! absent; those comparisons surface as UNKNOWN instead of guessing.

/// Canonical form for unit comparison: trimmed, lowercased, spaces
/// removed, micro signs folded to 'u'.
pub fn normalize_unit(unit: &str) -> String {
    unit.trim()
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            'μ' | 'µ' => 'u',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

/// Multiplicative factors between normalized units, listed one way.
const FACTORS: &[(&str, &str, f64)] = &[
    ("g/dl", "g/l", 10.0),
    ("mg/dl", "mg/l", 10.0),
    ("g/l", "mg/ml", 1.0),
    ("ng/ml", "ug/l", 1.0),
    ("ug/ml", "mg/l", 1.0),
    ("10^9/l", "10^3/ul", 1.0),
    ("10^3/ul", "k/ul", 1.0),
];

/// Convert `value` from one unit to another. Returns None when the
/// units are incompatible or unknown to the table.
pub fn convert(value: f64, from: &str, to: &str) -> Option<f64> {
    let from = normalize_unit(from);
    let to = normalize_unit(to);
    if from == to {
        return Some(value);
    }
    for &(a, b, factor) in FACTORS {
        if from == a && to == b {
            return Some(value * factor);
        }
        if from == b && to == a {
            return Some(value / factor);
        }
    }
    None
}
