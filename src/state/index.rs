use std::collections::HashMap;
use std::path::PathBuf;

use super::data::Thumbnail;

/// What the index knows about one encoding identifier
#[derive(Debug, Clone)]
pub struct IndexedEncoding {
    pub thumbnail: Thumbnail,
    pub information_extracted: Option<f64>,
    /// Vibe file the thumbnail came from
    pub source: PathBuf,
}

impl IndexedEncoding {
    /// Zero counts as "not recorded".
    pub fn has_information_extracted(&self) -> bool {
        matches!(self.information_extracted, Some(v) if v != 0.0)
    }
}

/// Pick the mapping to keep for an encoding.
///
/// The candidate replaces the existing mapping only when there is none yet,
/// or when the existing one lacks an information extracted value and the
/// candidate has one.
pub fn merge(existing: Option<IndexedEncoding>, candidate: IndexedEncoding) -> IndexedEncoding {
    match existing {
        None => candidate,
        Some(current) => {
            if !current.has_information_extracted() && candidate.has_information_extracted() {
                candidate
            } else {
                current
            }
        }
    }
}

/// Encoding identifier -> best known thumbnail and metadata.
///
/// Built by the catalog scan and handed to potion resolution read-only.
#[derive(Debug, Clone, Default)]
pub struct EncodingIndex {
    entries: HashMap<String, IndexedEncoding>,
}

impl EncodingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a candidate mapping for `encoding` into the index.
    pub fn insert(&mut self, encoding: &str, candidate: IndexedEncoding) {
        let existing = self.entries.remove(encoding);
        self.entries.insert(encoding.to_string(), merge(existing, candidate));
    }

    pub fn get(&self, encoding: &str) -> Option<&IndexedEncoding> {
        self.entries.get(encoding)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbaImage};

    fn mapping(info: Option<f64>, source: &str) -> IndexedEncoding {
        IndexedEncoding {
            thumbnail: Thumbnail::new(DynamicImage::ImageRgba8(RgbaImage::new(1, 1))),
            information_extracted: info,
            source: PathBuf::from(source),
        }
    }

    #[test]
    fn test_merge_prefers_candidate_with_information() {
        let winner = merge(Some(mapping(None, "old")), mapping(Some(0.4), "new"));
        assert_eq!(winner.source, PathBuf::from("new"));
        assert_eq!(winner.information_extracted, Some(0.4));
    }

    #[test]
    fn test_merge_keeps_existing_with_information() {
        let winner = merge(Some(mapping(Some(0.3), "old")), mapping(Some(0.5), "new"));
        assert_eq!(winner.source, PathBuf::from("old"));
        assert_eq!(winner.information_extracted, Some(0.3));
    }

    #[test]
    fn test_merge_without_existing_takes_candidate() {
        let winner = merge(None, mapping(None, "new"));
        assert_eq!(winner.source, PathBuf::from("new"));
    }

    #[test]
    fn test_merge_neither_has_information_keeps_first() {
        let winner = merge(Some(mapping(None, "old")), mapping(None, "new"));
        assert_eq!(winner.source, PathBuf::from("old"));
    }

    #[test]
    fn test_zero_counts_as_unrecorded() {
        let winner = merge(Some(mapping(Some(0.0), "old")), mapping(Some(0.7), "new"));
        assert_eq!(winner.source, PathBuf::from("new"));
    }

    #[test]
    fn test_insert_replay_is_idempotent() {
        let mut index = EncodingIndex::new();
        for _ in 0..2 {
            index.insert("enc-a", mapping(None, "a1"));
            index.insert("enc-a", mapping(Some(0.6), "a2"));
            index.insert("enc-a", mapping(Some(0.9), "a3"));
            index.insert("enc-b", mapping(Some(1.0), "b1"));
        }
        assert_eq!(index.len(), 2);
        assert_eq!(index.get("enc-a").unwrap().source, PathBuf::from("a2"));
        assert_eq!(index.get("enc-b").unwrap().source, PathBuf::from("b1"));
        assert!(index.get("enc-c").is_none());
    }
}
