//! Safety checks run before the output database is replaced.
//!
//! The build deletes any existing file at the output path, so the path is
//! validated first: it must not be the input CSV and must not point at a file
//! that is not a SQLite database.

use anyhow::{bail, Context, Result};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Extensions accepted for the output database
pub const OUTPUT_EXTENSIONS: &[&str] = &["db", "sqlite", "sqlite3"];

/// First 16 bytes of every SQLite 3 database file
const SQLITE_HEADER: &[u8; 16] = b"SQLite format 3\0";

/// Validates that an output path is safe to overwrite.
///
/// Checks:
/// - Output cannot be the same path as the input CSV
/// - Output extension must be one of [`OUTPUT_EXTENSIONS`]
/// - An existing output must be empty or a SQLite database
pub fn validate_output_path(output: &Path, input: &Path) -> Result<()> {
    let same_file = match (resolve(output), resolve(input)) {
        (Some(o), Some(i)) => o == i,
        _ => false,
    };
    if output == input || same_file {
        bail!(
            "Safety check failed: output '{}' cannot be the same as input '{}'",
            output.display(),
            input.display()
        );
    }

    let ext = output
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if !OUTPUT_EXTENSIONS.contains(&ext.as_str()) {
        bail!(
            "Safety check failed: output file '{}' must end in one of: {}",
            output.display(),
            OUTPUT_EXTENSIONS.join(", ")
        );
    }

    if output.exists() && !is_sqlite_or_empty(output)? {
        bail!(
            "Safety check failed: '{}' exists and is not a SQLite database",
            output.display()
        );
    }

    Ok(())
}

/// Absolute form of `path` with `.`/`..` and symlinks resolved.
///
/// A path that does not exist yet resolves through its parent directory, so
/// `dir/./tracks.db` and `dir/tracks.db` compare equal before either is created.
fn resolve(path: &Path) -> Option<PathBuf> {
    if let Ok(full) = path.canonicalize() {
        return Some(full);
    }
    let name = path.file_name()?;
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    parent.canonicalize().ok().map(|dir| dir.join(name))
}

fn is_sqlite_or_empty(path: &Path) -> Result<bool> {
    let mut file = File::open(path)
        .with_context(|| format!("Failed to open existing output '{}'", path.display()))?;
    let mut header = Vec::with_capacity(SQLITE_HEADER.len());
    file.by_ref()
        .take(SQLITE_HEADER.len() as u64)
        .read_to_end(&mut header)?;
    Ok(header.is_empty() || header == SQLITE_HEADER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_valid_new_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("tracks_by_decade.db");
        let input = PathBuf::from("/data/popular_tracks.csv");
        assert!(validate_output_path(&output, &input).is_ok());
    }

    #[test]
    fn test_output_equals_input() {
        let path = PathBuf::from("/data/tracks.db");
        let result = validate_output_path(&path, &path);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("cannot be the same as input"));
    }

    #[test]
    fn test_output_equals_input_after_resolving() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("tracks.db");
        std::fs::write(&input, b"uri,album_date\n").unwrap();

        let output = dir.path().join(".").join("tracks.db");
        let result = validate_output_path(&output, &input);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("cannot be the same as input"));

        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        let output = sub.join("..").join("tracks.db");
        assert!(validate_output_path(&output, &input).is_err());
    }

    #[test]
    fn test_resolve_missing_file_through_parent() {
        let dir = tempfile::tempdir().unwrap();
        let direct = resolve(&dir.path().join("new.db")).unwrap();
        let dotted = resolve(&dir.path().join(".").join("new.db")).unwrap();
        assert_eq!(direct, dotted);
        assert!(resolve(&dir.path().join("missing").join("new.db")).is_none());
    }

    #[test]
    fn test_bad_extension() {
        let output = PathBuf::from("/tmp/popular_tracks.csv");
        let input = PathBuf::from("/data/popular_tracks.csv");
        let result = validate_output_path(&output, &input);
        assert!(result.unwrap_err().to_string().contains("must end in one of"));
    }

    #[test]
    fn test_existing_sqlite_is_replaceable() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("existing.sqlite3");
        rusqlite::Connection::open(&output)
            .unwrap()
            .execute_batch("CREATE TABLE t (x INTEGER);")
            .unwrap();
        let input = dir.path().join("input.csv");
        assert!(validate_output_path(&output, &input).is_ok());
    }

    #[test]
    fn test_existing_empty_file_is_replaceable() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("empty.db");
        std::fs::write(&output, b"").unwrap();
        let input = dir.path().join("input.csv");
        assert!(validate_output_path(&output, &input).is_ok());
    }

    #[test]
    fn test_existing_non_sqlite_blocked() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("notes.db");
        std::fs::write(&output, b"uri,album_date\n").unwrap();
        let input = dir.path().join("input.csv");
        let result = validate_output_path(&output, &input);
        assert!(result.unwrap_err().to_string().contains("is not a SQLite database"));
    }
}
