//! SQLite output: schema, bulk write, indexes, and the read helpers used by
//! the summary report and the sampler.
//!
//! Layout of a built database:
//!
//! - `tracks(uri, decade, year)`: every track with a recoverable year
//! - `track_languages(uri, language)`: language codes, decade-language mode only
//! - `buckets(table_name, decade, language, track_count)`: catalog of bucket tables
//! - `metadata(key, value)`: grouping mode and cutoff used for the build
//! - one `decade_<decade>[_<language>](uri)` table per bucket that met the cutoff

use crate::fields::sanitize_identifier;
use crate::models::{BucketInfo, Grouped, GroupingMode};
use crate::progress::Phase;
use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::Path;

const BASE_SCHEMA: &str = "
    CREATE TABLE tracks (
        uri TEXT PRIMARY KEY,
        decade INTEGER NOT NULL,
        year INTEGER NOT NULL
    );

    CREATE TABLE track_languages (
        uri TEXT NOT NULL,
        language TEXT NOT NULL,
        PRIMARY KEY (uri, language)
    );

    CREATE TABLE buckets (
        table_name TEXT PRIMARY KEY,
        decade INTEGER NOT NULL,
        language TEXT,
        track_count INTEGER NOT NULL
    );

    CREATE TABLE metadata (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );";

/// Open (creating if needed) the output database with bulk-load pragmas.
pub fn open_output(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to create output database '{}'", path.display()))?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA cache_size = -64000;
         PRAGMA temp_store = MEMORY;",
    )?;
    Ok(conn)
}

/// Create the schema and write tracks, languages and bucket tables in one
/// transaction. Nothing is committed if any statement fails.
///
/// Returns the number of rows written to bucket tables.
pub fn write_all(conn: &mut Connection, grouped: &Grouped, mode: GroupingMode, min_count: usize) -> Result<usize> {
    let language_rows: usize = if mode.uses_languages() {
        grouped.tracks.iter().map(|t| t.languages.len()).sum()
    } else {
        0
    };
    let bucket_rows: usize = grouped.kept.iter().map(|b| b.uris.len()).sum();
    let total = (grouped.tracks.len() + language_rows + bucket_rows) as u64;

    let phase = Phase::counted("write", "Phase 3: Writing output", total);

    let tx = conn.transaction()?;
    tx.execute_batch(BASE_SCHEMA)
        .context("Failed to create base schema")?;
    write_metadata(&tx, mode, min_count)?;

    {
        let mut stmt = tx.prepare_cached(
            "INSERT OR REPLACE INTO tracks (uri, decade, year) VALUES (?1, ?2, ?3)",
        )?;
        for t in &grouped.tracks {
            stmt.execute(params![t.uri, t.decade, t.year])?;
            phase.tick();
        }
    }

    if mode.uses_languages() {
        let mut stmt = tx.prepare_cached(
            "INSERT OR REPLACE INTO track_languages (uri, language) VALUES (?1, ?2)",
        )?;
        for t in &grouped.tracks {
            for lang in &t.languages {
                stmt.execute(params![t.uri, lang])?;
                phase.tick();
            }
        }
    }

    for bucket in &grouped.kept {
        let table = bucket.key.table_name();
        tx.execute_batch(&format!("CREATE TABLE \"{}\" (uri TEXT PRIMARY KEY);", table))
            .with_context(|| format!("Failed to create bucket table '{}'", table))?;

        {
            let mut stmt =
                tx.prepare(&format!("INSERT OR REPLACE INTO \"{}\" (uri) VALUES (?1)", table))?;
            for uri in &bucket.uris {
                stmt.execute([uri])?;
                phase.tick();
            }
        }

        tx.execute(
            "INSERT INTO buckets (table_name, decade, language, track_count) VALUES (?1, ?2, ?3, ?4)",
            params![table, bucket.key.decade, bucket.key.language, bucket.uris.len() as i64],
        )?;
    }

    tx.commit().context("Failed to commit output transaction")?;

    phase.finish(format!(
        "Phase 3: Wrote {} tracks into {} bucket tables",
        grouped.tracks.len(),
        grouped.kept.len()
    ));
    Ok(bucket_rows)
}

fn write_metadata(tx: &Transaction<'_>, mode: GroupingMode, min_count: usize) -> Result<()> {
    let mut stmt = tx.prepare("INSERT INTO metadata (key, value) VALUES (?1, ?2)")?;
    stmt.execute(params!["grouping_mode", mode.to_string()])?;
    stmt.execute(params!["min_count", min_count.to_string()])?;
    Ok(())
}

/// Secondary indexes for the queries the sampler and report run.
pub fn create_indexes(conn: &Connection) -> Result<()> {
    let phase = Phase::open_ended("index", "Phase 4: Building indexes");

    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_tracks_decade ON tracks(decade);
         CREATE INDEX IF NOT EXISTS idx_track_languages_language ON track_languages(language);
         CREATE INDEX IF NOT EXISTS idx_buckets_decade_language ON buckets(decade, language);",
    )?;

    phase.finish("Phase 4: Indexes built".to_string());
    Ok(())
}

pub fn optimize(conn: &Connection) -> Result<()> {
    let phase = Phase::open_ended("optimize", "Phase 5: Optimizing database");

    // Back to a rollback journal so the finished file opens read-only without -wal/-shm
    conn.execute_batch("VACUUM; ANALYZE; PRAGMA journal_mode = DELETE;")?;

    phase.finish("Phase 5: Database optimized".to_string());
    Ok(())
}

// ============================================================================
// Read helpers
// ============================================================================

/// First `limit` `(uri, decade)` rows of `tracks`.
pub fn sample_rows(conn: &Connection, limit: usize) -> Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare("SELECT uri, decade FROM tracks LIMIT ?1")?;
    let rows = stmt
        .query_map([limit as i64], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// `(decade, track count)` ordered by decade.
pub fn decade_counts(conn: &Connection) -> Result<Vec<(i64, i64)>> {
    let mut stmt =
        conn.prepare("SELECT decade, COUNT(*) FROM tracks GROUP BY decade ORDER BY decade")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Catalog of bucket tables ordered by decade then language.
pub fn list_buckets(conn: &Connection) -> Result<Vec<BucketInfo>> {
    let mut stmt = conn.prepare(
        "SELECT table_name, decade, language, track_count
         FROM buckets
         ORDER BY decade, language",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(BucketInfo {
                table_name: row.get(0)?,
                decade: row.get(1)?,
                language: row.get(2)?,
                track_count: row.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Value stored in the `metadata` table, if any.
pub fn read_metadata(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row("SELECT value FROM metadata WHERE key = ?1", [key], |row| row.get(0))
        .optional()?;
    Ok(value)
}

/// Table name of the bucket for `decade` (and `language`), if it was written.
///
/// `decade` may be any year in the decade; `language` is sanitized the same
/// way bucket names are.
pub fn resolve_bucket(conn: &Connection, decade: i64, language: Option<&str>) -> Result<Option<String>> {
    let Some(decade) = crate::fields::decade_of(decade) else {
        return Ok(None);
    };
    let language = language.map(sanitize_identifier);
    let name = conn
        .query_row(
            "SELECT table_name FROM buckets WHERE decade = ?1 AND language IS ?2",
            params![decade, language],
            |row| row.get(0),
        )
        .optional()?;
    Ok(name)
}

/// Like [`resolve_bucket`], but a missing bucket is an error naming the
/// likely cause: a language given to a decade-only database, no language
/// given to a decade-language one, or a bucket that fell below the cutoff.
pub fn require_bucket(conn: &Connection, decade: i64, language: Option<&str>) -> Result<String> {
    if let Some(table) = resolve_bucket(conn, decade, language)? {
        return Ok(table);
    }

    let mode = read_metadata(conn, "grouping_mode")?;
    let by_language = mode.as_deref() == Some(GroupingMode::DecadeLanguage.to_string().as_str());
    match (language, by_language) {
        (None, true) => bail!(
            "Database is grouped by decade and language; pass --language (run with --list to see buckets)"
        ),
        (Some(lang), false) => bail!(
            "Database is grouped by decade only; --language '{}' does not apply",
            lang
        ),
        _ => bail!(
            "No bucket for decade {}{} (it may have been below the cutoff); run with --list",
            crate::fields::decade_of(decade).unwrap_or(decade),
            language
                .map(|l| format!(" and language '{}'", l))
                .unwrap_or_default()
        ),
    }
}

/// Grouping mode and bucket catalog, one bucket per line.
pub fn render_bucket_list(conn: &Connection) -> Result<String> {
    let mode = read_metadata(conn, "grouping_mode")?.unwrap_or_else(|| "unknown".to_string());
    let buckets = list_buckets(conn)?;

    let mut out = format!("Grouping mode: {}\n", mode);
    if buckets.is_empty() {
        out.push_str("  (no bucket tables: every bucket was below the cutoff)\n");
    }
    for b in &buckets {
        out.push_str(&format!("  {:<28} {:>8} tracks\n", b.table_name, b.track_count));
    }
    Ok(out)
}

/// Up to `n` random URIs from a bucket table listed in the catalog.
pub fn sample_bucket(conn: &Connection, table_name: &str, n: usize) -> Result<Vec<String>> {
    let known: Option<String> = conn
        .query_row(
            "SELECT table_name FROM buckets WHERE table_name = ?1",
            [table_name],
            |row| row.get(0),
        )
        .optional()?;
    let Some(table) = known else {
        bail!("Unknown bucket table '{}'", table_name);
    };

    let mut stmt = conn.prepare(&format!(
        "SELECT uri FROM \"{}\" ORDER BY RANDOM() LIMIT ?1",
        table
    ))?;
    let uris = stmt
        .query_map([n as i64], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(uris)
}
