//! End-to-end build: CSV → parsed tracks → buckets → SQLite, plus the
//! summary report printed at the end.

use crate::fields::parse_row;
use crate::grouping::Accumulator;
use crate::models::{BucketInfo, BucketKey, GroupingMode, IngestStats, RowOutcome, YearSource};
use crate::progress::{log_only, Phase};
use crate::reader::{read_rows, ColumnNames};
use crate::safety::validate_output_path;
use crate::storage;
use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use std::path::PathBuf;
use std::time::Instant;

/// Everything a build needs, resolved from the command line.
#[derive(Clone, Debug)]
pub struct BuildConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub mode: GroupingMode,
    pub min_count: usize,
    pub columns: ColumnNames,
    pub sample_size: usize,
    pub stats_path: Option<PathBuf>,
}

impl BuildConfig {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            mode: GroupingMode::Decade,
            min_count: 1,
            columns: ColumnNames::default(),
            sample_size: 5,
            stats_path: None,
        }
    }
}

/// What the summary report prints.
#[derive(Clone, Debug)]
pub struct Report {
    pub output: PathBuf,
    pub mode: GroupingMode,
    pub min_count: usize,
    pub stats: IngestStats,
    pub sample: Vec<(String, i64)>,
    pub decade_counts: Vec<(i64, i64)>,
    pub buckets: Vec<BucketInfo>,
    pub dropped: Vec<(BucketKey, usize)>,
    pub file_size: u64,
}

/// Run the whole build and return the data for the summary report.
pub fn run(config: &BuildConfig) -> Result<Report> {
    let start = Instant::now();

    if !config.input.exists() {
        bail!("CSV file '{}' not found", config.input.display());
    }
    validate_output_path(&config.output, &config.input)?;

    println!("Reading CSV: {:?}", config.input);
    let csv = read_rows(&config.input, &config.columns)?;
    if config.mode.uses_languages() && !csv.has_languages {
        bail!(
            "Grouping mode '{}' needs a '{}' column, which the CSV does not have",
            config.mode,
            config.columns.languages
        );
    }

    let mut stats = IngestStats::default();
    let mut acc = Accumulator::new(config.mode);

    let phase = Phase::counted("parse", "Phase 2: Parsing fields", csv.rows.len() as u64);
    let outcomes: Vec<RowOutcome> = csv
        .rows
        .par_iter()
        .map(|row| {
            let outcome = parse_row(row);
            phase.tick();
            outcome
        })
        .collect();

    for (row, outcome) in csv.rows.iter().zip(outcomes) {
        stats.record_outcome(&outcome);
        match outcome {
            RowOutcome::Track(track) => {
                if track.year_source == YearSource::Fallback {
                    tracing::debug!(line = row.line, uri = %track.uri, "year recovered by regex fallback");
                }
                acc.push(track);
            }
            RowOutcome::MissingUri => {
                tracing::debug!(line = row.line, "row without uri skipped");
            }
            RowOutcome::NoYear => {
                tracing::debug!(line = row.line, album_date = %row.album_date, "no year in album_date");
            }
        }
    }
    phase.finish(format!(
        "Phase 2: Parsed {} tracks ({} without year)",
        acc.len(),
        stats.rows_without_year
    ));

    let grouped = acc.finish(config.min_count, &mut stats);
    println!(
        "Found {} buckets, {} below the cutoff of {}",
        stats.buckets_total, stats.buckets_below_cutoff, config.min_count
    );
    if stats.rows_without_year > 0 {
        tracing::warn!(
            rows = stats.rows_without_year,
            "rows skipped because no year could be recovered"
        );
    }

    if config.output.exists() {
        std::fs::remove_file(&config.output).context("Failed to remove existing output file")?;
    }

    println!("Creating output database: {:?}", config.output);
    let mut conn = storage::open_output(&config.output)?;
    stats.bucket_rows_written = storage::write_all(&mut conn, &grouped, config.mode, config.min_count)?;
    storage::create_indexes(&conn)?;
    storage::optimize(&conn)?;

    stats.elapsed_seconds = start.elapsed().as_secs_f64();
    if let Some(path) = &config.stats_path {
        stats
            .write_to_file(path)
            .with_context(|| format!("Failed to write stats to '{}'", path.display()))?;
    }
    if log_only() {
        stats.log_phase("final");
    }

    let report = Report {
        output: config.output.clone(),
        mode: config.mode,
        min_count: config.min_count,
        sample: storage::sample_rows(&conn, config.sample_size)?,
        decade_counts: storage::decade_counts(&conn)?,
        buckets: storage::list_buckets(&conn)?,
        dropped: grouped.dropped,
        file_size: std::fs::metadata(&config.output)?.len(),
        stats,
    };
    Ok(report)
}

/// Print the summary report to stdout.
pub fn print_report(report: &Report) {
    let stats = &report.stats;

    println!("\n{:=<60}", "");
    println!("Database created with {} tracks inserted", stats.tracks_kept);
    println!("  Mode: {} (min {} tracks per bucket)", report.mode, report.min_count);
    println!(
        "  Rows read: {} ({:.1}% with a year, {} via fallback)",
        stats.rows_read,
        stats.parse_rate(),
        stats.years_from_fallback
    );
    if stats.rows_missing_uri > 0 {
        println!("  Rows without uri: {}", stats.rows_missing_uri);
    }
    if stats.duplicate_uris > 0 {
        println!("  Duplicate uris replaced: {}", stats.duplicate_uris);
    }
    if report.mode.uses_languages() {
        println!("  Tracks without language: {}", stats.tracks_without_language);
    }
    println!("  Output size: {:.2} MB", report.file_size as f64 / 1_048_576.0);
    println!("  Elapsed: {:.2}s", stats.elapsed_seconds);
    println!("{:=<60}", "");

    println!("\nSample data:");
    for (uri, decade) in &report.sample {
        println!("URI: {}, Decade: {}", uri, decade);
    }

    println!("\nTracks by decade:");
    for (decade, count) in &report.decade_counts {
        println!("{}s: {} tracks", decade, count);
    }

    println!("\nBucket tables ({}):", report.buckets.len());
    for b in &report.buckets {
        println!("  {:<28} {:>8} tracks", b.table_name, b.track_count);
    }

    if !report.dropped.is_empty() {
        println!(
            "\nBelow cutoff ({} buckets, {} memberships not written):",
            report.dropped.len(),
            stats.tracks_below_cutoff
        );
        for (key, count) in &report.dropped {
            println!("  {:<28} {:>8} tracks", key.to_string(), count);
        }
    }
}
