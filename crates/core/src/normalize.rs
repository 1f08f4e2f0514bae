//! Identity normalization and grouping-key derivation.
//!
//! Normalization is the precision backbone of the rule-based matcher: two
//! records merge under it only when these strings are exactly equal.

use unicode_normalization::UnicodeNormalization;

use crate::model::RawRecord;

/// Normalize an identity string for exact matching:
/// NFKD fold, drop combining marks (diacritics), lowercase, replace
/// punctuation with spaces, collapse whitespace.
pub fn normalize_identity(s: &str) -> String {
    let folded: String = s
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect();

    let stripped: String = folded
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect();

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Reduce a phone number to its digits (leading `+` kept as `00`).
pub fn normalize_phone(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for (i, c) in s.chars().enumerate() {
        if c.is_ascii_digit() {
            out.push(c);
        } else if c == '+' && i == 0 {
            out.push_str("00");
        }
    }
    out
}

/// Derive the grouping key for a record.
///
/// Precedence: explicit `group_key` → normalized organization name →
/// normalized `province|address` composite → `dataset:id` fallback.
/// The fallback guarantees the key is never empty, so no record can be
/// silently dropped from aggregation.
pub fn grouping_key(record: &RawRecord) -> String {
    if let Some(ref key) = record.group_key {
        let trimmed = key.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    if let Some(ref name) = record.organization_name {
        let norm = normalize_identity(name);
        if !norm.is_empty() {
            return norm;
        }
    }

    let province = record.province.as_deref().map(normalize_identity).unwrap_or_default();
    let address = record.address.as_deref().map(normalize_identity).unwrap_or_default();
    if !province.is_empty() || !address.is_empty() {
        return format!("{province}|{address}");
    }

    record.qualified_id()
}

fn is_combining_mark(c: char) -> bool {
    // Combining Diacritical Marks + supplement/extended blocks.
    matches!(c,
        '\u{0300}'..='\u{036F}'
        | '\u{1AB0}'..='\u{1AFF}'
        | '\u{1DC0}'..='\u{1DFF}'
        | '\u{20D0}'..='\u{20FF}'
        | '\u{FE20}'..='\u{FE2F}')
}
