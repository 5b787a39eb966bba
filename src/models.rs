//! Core data models for the decade database build.
//!
//! This module contains the row, track and bucket types, the grouping mode,
//! and the statistics collected across the pipeline.

use clap::ValueEnum;
use serde::Serialize;
use std::fmt;

// ============================================================================
// Input Models
// ============================================================================

/// Raw CSV row, fields copied verbatim from the export
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawRow {
    pub line: u64, // 1-based line number in the CSV (header is line 1)
    pub uri: String,
    pub album_date: String,
    pub languages: Option<String>, // None when the language column is absent
}

/// Where a release year came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum YearSource {
    /// Blob parsed as JSON after quote conversion
    Json,
    /// JSON parsing failed; year recovered with the `'year': NNNN` regex
    Fallback,
}

/// Track with its grouping keys derived
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedTrack {
    pub uri: String,
    pub year: i64,
    pub decade: i64,
    pub languages: Vec<String>, // normalized codes, first-seen order, no duplicates
    pub year_source: YearSource,
}

/// Outcome of parsing one raw row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RowOutcome {
    Track(ParsedTrack),
    MissingUri,
    NoYear,
}

// ============================================================================
// Grouping Models
// ============================================================================

/// How tracks are partitioned into bucket tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupingMode {
    /// One table per release decade
    Decade,
    /// One table per (release decade, language) pair
    DecadeLanguage,
}

impl GroupingMode {
    pub fn uses_languages(self) -> bool {
        matches!(self, GroupingMode::DecadeLanguage)
    }
}

impl fmt::Display for GroupingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupingMode::Decade => write!(f, "decade"),
            GroupingMode::DecadeLanguage => write!(f, "decade-language"),
        }
    }
}

/// Key of a bucket table.
///
/// `language` is already identifier-safe (see [`crate::fields::sanitize_identifier`]),
/// so two codes that sanitize to the same fragment share one bucket.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketKey {
    pub decade: i64,
    pub language: Option<String>,
}

impl BucketKey {
    pub fn decade(decade: i64) -> Self {
        Self {
            decade,
            language: None,
        }
    }

    pub fn decade_language(decade: i64, language: impl Into<String>) -> Self {
        Self {
            decade,
            language: Some(language.into()),
        }
    }

    /// SQLite table holding this bucket's URIs: `decade_1990`, `decade_1990_en`.
    /// Negative decades use an `m` prefix (`decade_m10`).
    pub fn table_name(&self) -> String {
        let decade = if self.decade < 0 {
            format!("m{}", self.decade.unsigned_abs())
        } else {
            self.decade.to_string()
        };
        match &self.language {
            None => format!("decade_{}", decade),
            Some(lang) => format!("decade_{}_{}", decade, lang),
        }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.language {
            None => write!(f, "{}s", self.decade),
            Some(lang) => write!(f, "{}s/{}", self.decade, lang),
        }
    }
}

/// Bucket of track URIs, sorted
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bucket {
    pub key: BucketKey,
    pub uris: Vec<String>,
}

/// Accumulator output: deduplicated tracks plus the buckets on both sides of
/// the minimum-count cutoff.
#[derive(Clone, Debug, Default)]
pub struct Grouped {
    pub tracks: Vec<ParsedTrack>,        // sorted by uri
    pub kept: Vec<Bucket>,               // key order
    pub dropped: Vec<(BucketKey, usize)>, // key order, with their track counts
}

// ============================================================================
// Output Models
// ============================================================================

/// Row of the `buckets` catalog table
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BucketInfo {
    pub table_name: String,
    pub decade: i64,
    pub language: Option<String>,
    pub track_count: i64,
}

// ============================================================================
// Statistics (Instrumentation)
// ============================================================================

/// Counters collected across the build.
#[derive(Default, Debug, Clone, Serialize)]
pub struct IngestStats {
    // Reading / parsing
    pub rows_read: usize,
    pub rows_missing_uri: usize,
    pub rows_without_year: usize,
    pub years_from_json: usize,
    pub years_from_fallback: usize,

    // Grouping
    pub duplicate_uris: usize,
    pub tracks_without_language: usize,
    pub tracks_kept: usize,

    // Cutoff
    pub buckets_total: usize,
    pub buckets_written: usize,
    pub buckets_below_cutoff: usize,
    pub tracks_below_cutoff: usize, // bucket memberships dropped, not distinct tracks

    // Writing
    pub bucket_rows_written: usize,

    // Timing
    pub elapsed_seconds: f64,
}

impl IngestStats {
    /// Share of read rows that ended up with a decade, as a percentage
    pub fn parse_rate(&self) -> f64 {
        if self.rows_read == 0 {
            0.0
        } else {
            let parsed = self.years_from_json + self.years_from_fallback;
            100.0 * parsed as f64 / self.rows_read as f64
        }
    }

    /// Log stats to stderr in JSON format
    pub fn log_phase(&self, phase: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            eprintln!("[STATS:{}]\n{}", phase, json);
        }
    }

    /// Write stats to a JSON file
    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Tally one parsed row
    pub fn record_outcome(&mut self, outcome: &RowOutcome) {
        self.rows_read += 1;
        match outcome {
            RowOutcome::Track(t) => match t.year_source {
                YearSource::Json => self.years_from_json += 1,
                YearSource::Fallback => self.years_from_fallback += 1,
            },
            RowOutcome::MissingUri => self.rows_missing_uri += 1,
            RowOutcome::NoYear => self.rows_without_year += 1,
        }
    }
}
