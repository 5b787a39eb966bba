//! In-memory grouping of parsed tracks into decade (or decade × language)
//! buckets, with a minimum-count cutoff.

use crate::fields::sanitize_identifier;
use crate::models::{Bucket, BucketKey, Grouped, GroupingMode, IngestStats, ParsedTrack};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

/// Collects tracks keyed by URI. A later track with the same URI replaces the
/// earlier one.
pub struct Accumulator {
    mode: GroupingMode,
    tracks: FxHashMap<String, ParsedTrack>,
    duplicates: usize,
}

impl Accumulator {
    pub fn new(mode: GroupingMode) -> Self {
        Self {
            mode,
            tracks: FxHashMap::default(),
            duplicates: 0,
        }
    }

    pub fn push(&mut self, track: ParsedTrack) {
        if self.tracks.insert(track.uri.clone(), track).is_some() {
            self.duplicates += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Build buckets and split them at `min_count`.
    ///
    /// Buckets with fewer than `min_count` URIs go to `Grouped::dropped`.
    /// Updates the grouping and cutoff counters in `stats`.
    pub fn finish(self, min_count: usize, stats: &mut IngestStats) -> Grouped {
        let mut buckets: BTreeMap<BucketKey, Vec<String>> = BTreeMap::new();
        let mut without_language = 0;

        for track in self.tracks.values() {
            match self.mode {
                GroupingMode::Decade => {
                    buckets
                        .entry(BucketKey::decade(track.decade))
                        .or_default()
                        .push(track.uri.clone());
                }
                GroupingMode::DecadeLanguage => {
                    if track.languages.is_empty() {
                        without_language += 1;
                        continue;
                    }
                    let mut fragments: Vec<String> =
                        track.languages.iter().map(|l| sanitize_identifier(l)).collect();
                    fragments.sort();
                    fragments.dedup();
                    for lang in fragments {
                        buckets
                            .entry(BucketKey::decade_language(track.decade, lang))
                            .or_default()
                            .push(track.uri.clone());
                    }
                }
            }
        }

        let mut tracks: Vec<ParsedTrack> = self.tracks.into_values().collect();
        tracks.sort_by(|a, b| a.uri.cmp(&b.uri));

        let mut grouped = Grouped {
            tracks,
            ..Grouped::default()
        };

        stats.duplicate_uris = self.duplicates;
        stats.tracks_without_language = without_language;
        stats.tracks_kept = grouped.tracks.len();
        stats.buckets_total = buckets.len();

        for (key, mut uris) in buckets {
            if uris.len() < min_count {
                tracing::debug!(bucket = %key, tracks = uris.len(), min_count, "bucket below cutoff");
                stats.buckets_below_cutoff += 1;
                stats.tracks_below_cutoff += uris.len();
                grouped.dropped.push((key, uris.len()));
            } else {
                uris.sort();
                grouped.kept.push(Bucket { key, uris });
            }
        }
        stats.buckets_written = grouped.kept.len();

        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::decade_of;
    use crate::models::YearSource;

    fn track(uri: &str, year: i64, langs: &[&str]) -> ParsedTrack {
        ParsedTrack {
            uri: uri.to_string(),
            year,
            decade: decade_of(year).unwrap(),
            languages: langs.iter().map(|s| s.to_string()).collect(),
            year_source: YearSource::Json,
        }
    }

    #[test]
    fn test_decade_buckets() {
        let mut acc = Accumulator::new(GroupingMode::Decade);
        acc.push(track("c", 1995, &[]));
        acc.push(track("a", 1991, &[]));
        acc.push(track("b", 2004, &[]));
        let mut stats = IngestStats::default();
        let grouped = acc.finish(1, &mut stats);

        assert_eq!(grouped.kept.len(), 2);
        assert_eq!(grouped.kept[0].key, BucketKey::decade(1990));
        assert_eq!(grouped.kept[0].uris, vec!["a", "c"]);
        assert_eq!(grouped.kept[1].key, BucketKey::decade(2000));
        assert_eq!(stats.tracks_kept, 3);
        assert_eq!(stats.buckets_written, 2);
        let uris: Vec<&str> = grouped.tracks.iter().map(|t| t.uri.as_str()).collect();
        assert_eq!(uris, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_later_duplicate_replaces_earlier() {
        let mut acc = Accumulator::new(GroupingMode::Decade);
        acc.push(track("a", 1975, &[]));
        acc.push(track("a", 1988, &[]));
        assert_eq!(acc.len(), 1);
        assert_eq!(acc.duplicates(), 1);

        let mut stats = IngestStats::default();
        let grouped = acc.finish(0, &mut stats);
        assert_eq!(grouped.kept.len(), 1);
        assert_eq!(grouped.kept[0].key, BucketKey::decade(1980));
        assert_eq!(stats.duplicate_uris, 1);
    }

    #[test]
    fn test_language_buckets() {
        let mut acc = Accumulator::new(GroupingMode::DecadeLanguage);
        acc.push(track("a", 2011, &["en", "es"]));
        acc.push(track("b", 2012, &["en"]));
        acc.push(track("c", 2013, &[]));
        let mut stats = IngestStats::default();
        let grouped = acc.finish(1, &mut stats);

        let names: Vec<String> = grouped.kept.iter().map(|b| b.key.table_name()).collect();
        assert_eq!(names, vec!["decade_2010_en", "decade_2010_es"]);
        assert_eq!(grouped.kept[0].uris, vec!["a", "b"]);
        assert_eq!(grouped.kept[1].uris, vec!["a"]);
        assert_eq!(stats.tracks_without_language, 1);
        // Track without language is still kept in the tracks table
        assert_eq!(grouped.tracks.len(), 3);
    }

    #[test]
    fn test_codes_sharing_a_fragment_share_a_bucket() {
        let mut acc = Accumulator::new(GroupingMode::DecadeLanguage);
        acc.push(track("a", 2001, &["pt-br", "pt_br"]));
        acc.push(track("b", 2001, &["pt_br"]));
        let mut stats = IngestStats::default();
        let grouped = acc.finish(1, &mut stats);
        assert_eq!(grouped.kept.len(), 1);
        assert_eq!(grouped.kept[0].key.table_name(), "decade_2000_pt_br");
        assert_eq!(grouped.kept[0].uris, vec!["a", "b"]);
    }

    #[test]
    fn test_min_count_cutoff() {
        let mut acc = Accumulator::new(GroupingMode::Decade);
        for i in 0..3 {
            acc.push(track(&format!("x{}", i), 1960 + i, &[]));
        }
        acc.push(track("y", 1972, &[]));
        let mut stats = IngestStats::default();
        let grouped = acc.finish(2, &mut stats);

        assert_eq!(grouped.kept.len(), 1);
        assert_eq!(grouped.kept[0].key, BucketKey::decade(1960));
        assert_eq!(grouped.dropped, vec![(BucketKey::decade(1970), 1)]);
        assert_eq!(stats.buckets_total, 2);
        assert_eq!(stats.buckets_below_cutoff, 1);
        assert_eq!(stats.tracks_below_cutoff, 1);
        // Dropped buckets do not remove tracks from the tracks table
        assert_eq!(grouped.tracks.len(), 4);
    }

    #[test]
    fn test_empty() {
        let acc = Accumulator::new(GroupingMode::DecadeLanguage);
        assert!(acc.is_empty());
        let mut stats = IngestStats::default();
        let grouped = acc.finish(10, &mut stats);
        assert!(grouped.kept.is_empty());
        assert!(grouped.dropped.is_empty());
        assert!(grouped.tracks.is_empty());
    }
}
