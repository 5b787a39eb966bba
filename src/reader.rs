//! CSV reading.
//!
//! Columns are located by header name, so the export may carry any number of
//! extra columns in any order.

use crate::models::RawRow;
use crate::progress::Phase;
use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, StringRecord};
use std::io::Read;
use std::path::Path;

/// Header names of the columns the pipeline reads
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnNames {
    pub uri: String,
    pub album_date: String,
    pub languages: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            uri: "uri".to_string(),
            album_date: "album_date".to_string(),
            languages: "languages".to_string(),
        }
    }
}

/// Rows read from the export, plus whether the language column was present
#[derive(Debug)]
pub struct CsvRows {
    pub rows: Vec<RawRow>,
    pub has_languages: bool,
}

struct ColumnIndexes {
    uri: usize,
    album_date: usize,
    languages: Option<usize>,
}

fn locate_columns(headers: &StringRecord, columns: &ColumnNames) -> Result<ColumnIndexes> {
    let find = |name: &str| headers.iter().position(|h| h.trim() == name);

    let Some(uri) = find(&columns.uri) else {
        bail!("CSV is missing required column '{}'", columns.uri);
    };
    let Some(album_date) = find(&columns.album_date) else {
        bail!("CSV is missing required column '{}'", columns.album_date);
    };

    Ok(ColumnIndexes {
        uri,
        album_date,
        languages: find(&columns.languages),
    })
}

/// Read every row of the CSV at `path`.
pub fn read_rows(path: &Path, columns: &ColumnNames) -> Result<CsvRows> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open CSV file '{}'", path.display()))?;
    read_rows_from(file, columns)
}

/// Read every row from any CSV source.
pub fn read_rows_from<R: Read>(source: R, columns: &ColumnNames) -> Result<CsvRows> {
    let phase = Phase::open_ended("read", "Phase 1: Reading CSV");

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(source);

    let headers = reader.headers().context("Failed to read CSV headers")?.clone();
    let idx = locate_columns(&headers, columns)?;

    let mut rows = Vec::new();
    let mut record = StringRecord::new();
    loop {
        let has_more = reader.read_record(&mut record).with_context(|| {
            let line = record.position().map_or(0, |p| p.line());
            format!("Failed to parse CSV record near line {}", line + 1)
        })?;
        if !has_more {
            break;
        }

        let line = record.position().map_or(0, |p| p.line());
        let field = |i: usize| record.get(i).unwrap_or("").to_string();
        rows.push(RawRow {
            line,
            uri: field(idx.uri),
            album_date: field(idx.album_date),
            languages: idx.languages.map(field),
        });

        phase.tick();
        if rows.len() % 10_000 == 0 {
            phase.set_label(format!("Phase 1: Reading CSV ({} rows)", rows.len()));
        }
    }

    phase.finish(format!("Phase 1: Read {} rows", rows.len()));
    Ok(CsvRows {
        rows,
        has_languages: idx.languages.is_some(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_rows_by_header_name() {
        let data = "name,album_date,uri,languages\n\
                    Song,\"{'year': 1994}\",spotify:track:1,\"['en']\"\n\
                    Other,\"{'year': 2003}\",spotify:track:2,\"[]\"\n";
        let csv = read_rows_from(data.as_bytes(), &ColumnNames::default()).unwrap();
        assert!(csv.has_languages);
        assert_eq!(csv.rows.len(), 2);
        assert_eq!(csv.rows[0].uri, "spotify:track:1");
        assert_eq!(csv.rows[0].album_date, "{'year': 1994}");
        assert_eq!(csv.rows[0].languages.as_deref(), Some("['en']"));
        assert_eq!(csv.rows[0].line, 2);
        assert_eq!(csv.rows[1].line, 3);
    }

    #[test]
    fn test_language_column_optional() {
        let data = "uri,album_date\nspotify:track:1,\"{'year': 1994}\"\n";
        let csv = read_rows_from(data.as_bytes(), &ColumnNames::default()).unwrap();
        assert!(!csv.has_languages);
        assert_eq!(csv.rows[0].languages, None);
    }

    #[test]
    fn test_missing_required_column() {
        let data = "uri,release\nspotify:track:1,1994\n";
        let err = read_rows_from(data.as_bytes(), &ColumnNames::default()).unwrap_err();
        assert!(err.to_string().contains("'album_date'"));
    }

    #[test]
    fn test_short_rows_are_padded() {
        let data = "uri,album_date,languages\nspotify:track:1\n";
        let csv = read_rows_from(data.as_bytes(), &ColumnNames::default()).unwrap();
        assert_eq!(csv.rows[0].album_date, "");
        assert_eq!(csv.rows[0].languages.as_deref(), Some(""));
    }

    #[test]
    fn test_custom_column_names() {
        let columns = ColumnNames {
            uri: "track_uri".to_string(),
            album_date: "release".to_string(),
            languages: "langs".to_string(),
        };
        let data = "track_uri,release,langs\nspotify:track:9,\"{'year': 1977}\",\"['sv']\"\n";
        let csv = read_rows_from(data.as_bytes(), &columns).unwrap();
        assert_eq!(csv.rows[0].uri, "spotify:track:9");
        assert_eq!(csv.rows[0].languages.as_deref(), Some("['sv']"));
    }
}
