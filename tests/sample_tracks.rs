//! The sample-tracks binary against a freshly built database.

use decade_db::models::GroupingMode;
use decade_db::pipeline::{run, BuildConfig};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const CSV: &str = "\
uri,album_date,languages
spotify:track:1,\"{'year': 1991}\",\"['en']\"
spotify:track:2,\"{'year': 1996}\",\"['en', 'fr']\"
spotify:track:3,\"{'year': 2004}\",\"['fr']\"
";

fn build(dir: &TempDir, name: &str, mode: GroupingMode) -> PathBuf {
    let input = dir.path().join("tracks.csv");
    std::fs::write(&input, CSV).unwrap();
    let output = dir.path().join(name);
    let mut config = BuildConfig::new(&input, &output);
    config.mode = mode;
    run(&config).unwrap();
    output
}

fn sample_tracks(db: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sample-tracks"))
        .arg(db)
        .args(args)
        .output()
        .unwrap()
}

#[test]
fn test_list_buckets() {
    let dir = TempDir::new().unwrap();
    let db = build(&dir, "by_language.db", GroupingMode::DecadeLanguage);

    let out = sample_tracks(&db, &["--list"]);
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    assert!(stdout.starts_with("Grouping mode: decade-language"));
    assert!(stdout.contains("decade_1990_en"));
    assert!(stdout.contains("decade_2000_fr"));
}

#[test]
fn test_sample_any_year_in_decade() {
    let dir = TempDir::new().unwrap();
    let db = build(&dir, "by_decade.db", GroupingMode::Decade);

    let out = sample_tracks(&db, &["--decade", "1997", "-n", "5"]);
    assert!(out.status.success());
    let mut uris: Vec<String> = String::from_utf8(out.stdout)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect();
    uris.sort();
    assert_eq!(uris, vec!["spotify:track:1", "spotify:track:2"]);
}

#[test]
fn test_language_on_decade_database_fails() {
    let dir = TempDir::new().unwrap();
    let db = build(&dir, "by_decade.db", GroupingMode::Decade);

    let out = sample_tracks(&db, &["--decade", "1990", "--language", "en"]);
    assert!(!out.status.success());
    let stderr = String::from_utf8(out.stderr).unwrap();
    assert!(stderr.contains("grouped by decade only"));
}

#[test]
fn test_missing_language_on_language_database_fails() {
    let dir = TempDir::new().unwrap();
    let db = build(&dir, "by_language.db", GroupingMode::DecadeLanguage);

    let out = sample_tracks(&db, &["--decade", "1990"]);
    assert!(!out.status.success());
    let stderr = String::from_utf8(out.stderr).unwrap();
    assert!(stderr.contains("pass --language"));
}
