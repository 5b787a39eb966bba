//! Tolerant parsing of the quasi-JSON fields in the track export.
//!
//! The export writes Python reprs instead of JSON: `{'year': 1997, 'month': 5}`
//! for the album date and `['en', 'es']` for languages. Quote conversion turns
//! most of them into JSON; the rest go through regex fallbacks.

use crate::models::{ParsedTrack, RawRow, RowOutcome, YearSource};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Year key in the original (single-quoted) date blob: `'year': 1997`
pub static YEAR_FALLBACK: Lazy<Regex> = Lazy::new(|| Regex::new(r"'year':\s*(\d+)").unwrap());

/// Quoted token in a language blob: `'en'` or `"en"`
pub static QUOTED_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"'([^']*)'|"([^"]*)""#).unwrap());

/// Runs of characters that cannot appear in a table name fragment
static NON_IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

// ============================================================================
// DATE FIELD
// ============================================================================

/// Extract the release year from an album date blob.
///
/// Returns `None` when the blob is valid JSON without a `year` key. Numeric
/// years are floored (`1e3` → 1000, `2015.7` → 2015). The regex fallback only
/// runs when quote conversion does not yield usable JSON or the year is not a
/// number.
pub fn parse_year(album_date: &str) -> Option<(i64, YearSource)> {
    if album_date.trim().is_empty() {
        return None;
    }

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&album_date.replace('\'', "\"")) {
        match map.get("year") {
            None => return None,
            Some(Value::Number(n)) => {
                if let Some(y) = n.as_i64() {
                    return Some((y, YearSource::Json));
                }
                return n.as_f64().and_then(floor_to_i64).map(|y| (y, YearSource::Json));
            }
            Some(_) => {}
        }
    }

    YEAR_FALLBACK
        .captures(album_date)
        .and_then(|caps| caps[1].parse::<i64>().ok())
        .map(|y| (y, YearSource::Fallback))
}

/// Floor a finite float into the i64 range, `None` outside it.
fn floor_to_i64(value: f64) -> Option<i64> {
    let floored = value.floor();
    // i64::MAX as f64 rounds up to 2^63, which is already out of range
    if floored.is_finite() && floored >= i64::MIN as f64 && floored < i64::MAX as f64 {
        Some(floored as i64)
    } else {
        None
    }
}

/// Floor a year to its decade: 2015 → 2010, -5 → -10.
/// `None` when the decade does not fit in an i64.
pub fn decade_of(year: i64) -> Option<i64> {
    year.checked_sub(year.rem_euclid(10))
}

// ============================================================================
// LANGUAGE FIELD
// ============================================================================

/// Extract normalized language codes from a language blob.
///
/// Codes are trimmed and lowercased, empties dropped, duplicates removed
/// keeping first-seen order.
pub fn parse_languages(blob: &str) -> Vec<String> {
    let trimmed = blob.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let raw: Vec<String> = match serde_json::from_str::<Value>(&trimmed.replace('\'', "\"")) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        Ok(Value::String(s)) => vec![s],
        _ => languages_fallback(trimmed),
    };

    let mut codes: Vec<String> = Vec::with_capacity(raw.len());
    for code in raw {
        let code = code.trim().to_lowercase();
        if !code.is_empty() && !codes.contains(&code) {
            codes.push(code);
        }
    }
    codes
}

fn languages_fallback(blob: &str) -> Vec<String> {
    if blob.contains('\'') || blob.contains('"') {
        return QUOTED_TOKEN
            .captures_iter(blob)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
            .map(|m| m.as_str().to_string())
            .collect();
    }

    blob.trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(|s| s.to_string())
        .collect()
}

/// Turn a free-form code into a table name fragment.
///
/// Examples: "pt-BR" → "pt_br", "  " → "unknown"
pub fn sanitize_identifier(s: &str) -> String {
    let lower = s.to_lowercase();
    let replaced = NON_IDENT.replace_all(&lower, "_");
    let result = replaced.trim_matches('_');
    if result.is_empty() {
        "unknown".to_string()
    } else {
        result.to_string()
    }
}

// ============================================================================
// ROW
// ============================================================================

/// Derive grouping keys for one CSV row.
pub fn parse_row(row: &RawRow) -> RowOutcome {
    let uri = row.uri.trim();
    if uri.is_empty() {
        return RowOutcome::MissingUri;
    }

    let Some((year, year_source)) = parse_year(&row.album_date) else {
        return RowOutcome::NoYear;
    };
    let Some(decade) = decade_of(year) else {
        return RowOutcome::NoYear;
    };

    let languages = row
        .languages
        .as_deref()
        .map(parse_languages)
        .unwrap_or_default();

    RowOutcome::Track(ParsedTrack {
        uri: uri.to_string(),
        year,
        decade,
        languages,
        year_source,
    })
}

// ============================================================================
// TESTS
// ============================================================================
