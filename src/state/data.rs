//! Shared data structures for the catalog
//!
//! These structs describe the vibe record format on disk and the
//! entries the catalog hands to the presentation layer.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Local};
use image::DynamicImage;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Error;

/// File suffix of vibe records
pub const VIBE_SUFFIX: &str = ".naiv4vibe";

/// File name with the vibe suffix stripped, as shown under a thumbnail.
pub fn display_name(path: &Path) -> String {
    let name = path
        .file_name()
        .unwrap_or_default()
        .to_string_lossy();
    name.strip_suffix(VIBE_SUFFIX).unwrap_or(&name).to_string()
}

/// The four model versions a vibe file can carry encodings for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelVersion {
    V45Full,
    V45Curated,
    V4Full,
    V4Curated,
}

impl ModelVersion {
    pub const ALL: [ModelVersion; 4] = [
        ModelVersion::V45Full,
        ModelVersion::V45Curated,
        ModelVersion::V4Full,
        ModelVersion::V4Curated,
    ];

    /// Resolve a user-facing label (`v4.5`, `v4.5c`, `v4`, `v4c`).
    /// Unknown labels have no match.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.label() == label)
    }

    /// Resolve a model name as stored in `importInfo.model`.
    pub fn from_model_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.model_name() == name)
    }

    pub fn label(self) -> &'static str {
        match self {
            ModelVersion::V45Full => "v4.5",
            ModelVersion::V45Curated => "v4.5c",
            ModelVersion::V4Full => "v4",
            ModelVersion::V4Curated => "v4c",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ModelVersion::V45Full => "V4.5",
            ModelVersion::V45Curated => "V4.5 Curated",
            ModelVersion::V4Full => "V4",
            ModelVersion::V4Curated => "V4 Curated",
        }
    }

    /// Key of this version's sub-record under `encodings`
    pub fn encoding_key(self) -> &'static str {
        match self {
            ModelVersion::V45Full => "v4-5full",
            ModelVersion::V45Curated => "v4-5curated",
            ModelVersion::V4Full => "v4full",
            ModelVersion::V4Curated => "v4curated",
        }
    }

    /// Model name written to `importInfo.model`
    pub fn model_name(self) -> &'static str {
        match self {
            ModelVersion::V45Full => "nai-diffusion-4-5-full",
            ModelVersion::V45Curated => "nai-diffusion-4-5-curated",
            ModelVersion::V4Full => "nai-diffusion-4-full",
            ModelVersion::V4Curated => "nai-diffusion-4-curated-preview",
        }
    }
}

impl FromStr for ModelVersion {
    type Err = Error;

    /// Accepts either a version label or a full model name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::from_label(s)
            .or_else(|| Self::from_model_name(s))
            .ok_or_else(|| Error::UnknownModel(s.to_string()))
    }
}

impl fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.model_name())
    }
}

/// Deserialize a field that may hold anything; values of the wrong shape
/// read as `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// A vibe record as stored on disk. Every field is optional.
///
/// Sub-records under `encodings` stay untyped until a version is asked
/// for, so another version's contents never fail the file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VibeRecord {
    /// Base64 image, optionally prefixed with a data URI header
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// Version key -> sub-record
    #[serde(default)]
    pub encodings: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default, rename = "importInfo", deserialize_with = "lenient")]
    pub import_info: Option<ImportInfo>,
}

impl VibeRecord {
    /// Encoding entries for one model version, if the record has any.
    /// A sub-record of the wrong shape is an error.
    pub fn encodings_for(
        &self,
        version: ModelVersion,
    ) -> crate::error::Result<Option<BTreeMap<String, EncodingEntry>>> {
        let Some(sub_record) = self.encodings.as_ref().and_then(|e| e.get(version.encoding_key())) else {
            return Ok(None);
        };
        Ok(Some(BTreeMap::<String, EncodingEntry>::deserialize(sub_record)?))
    }
}

/// One encoding of a vibe record
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EncodingEntry {
    /// Opaque identifier, compared by equality only
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub params: Option<EncodingParams>,
}

impl EncodingEntry {
    /// The encoding identifier, or `None` when it is missing or empty.
    pub fn identifier(&self) -> Option<&str> {
        self.encoding.as_deref().filter(|e| !e.is_empty())
    }

    /// The `information_extracted` parameter, if it is a number.
    pub fn information_extracted(&self) -> Option<&serde_json::Number> {
        match self.params.as_ref()?.information_extracted.as_ref()? {
            serde_json::Value::Number(n) => Some(n),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EncodingParams {
    #[serde(default)]
    pub information_extracted: Option<serde_json::Value>,
}

/// Import settings stored in a record's `importInfo`.
/// A field holding the wrong type reads as unset.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ImportInfo {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub information_extracted: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub strength: Option<f64>,
}

/// A decoded thumbnail, shared between catalog entries and the encoding index.
#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub image: Arc<DynamicImage>,
    /// True when the record had no thumbnail and `image` is the placeholder
    pub placeholder: bool,
}

impl Thumbnail {
    pub fn new(image: DynamicImage) -> Self {
        Self { image: Arc::new(image), placeholder: false }
    }

    pub fn placeholder(image: DynamicImage) -> Self {
        Self { image: Arc::new(image), placeholder: true }
    }
}

/// Represents a single vibe file in the catalog
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    /// Full path to the vibe file
    pub path: PathBuf,
    /// Creation time, or last modification where creation is unavailable
    pub created_at: DateTime<Local>,
    pub thumbnail: Thumbnail,
    /// Information extracted values for the active version, as written in JSON
    pub extraction_levels: BTreeSet<String>,
    pub import_info: ImportInfo,
}

impl CatalogEntry {
    /// File name without the vibe suffix
    pub fn name(&self) -> String {
        display_name(&self.path)
    }

    pub fn has_thumbnail(&self) -> bool {
        !self.thumbnail.placeholder
    }

    pub fn created_label(&self) -> String {
        self.created_at.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    /// Extraction levels joined for display, e.g. `0.5, 1.0`
    pub fn extraction_label(&self) -> String {
        self.extraction_levels
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_labels_map_to_encoding_keys() {
        assert_eq!(ModelVersion::from_label("v4.5").map(|v| v.encoding_key()), Some("v4-5full"));
        assert_eq!(ModelVersion::from_label("v4.5c").map(|v| v.encoding_key()), Some("v4-5curated"));
        assert_eq!(ModelVersion::from_label("v4").map(|v| v.encoding_key()), Some("v4full"));
        assert_eq!(ModelVersion::from_label("v4c").map(|v| v.encoding_key()), Some("v4curated"));
        assert_eq!(ModelVersion::from_label("v3"), None);
    }

    #[test]
    fn test_model_from_str_accepts_label_or_name() {
        let by_label: ModelVersion = "v4c".parse().unwrap();
        let by_name: ModelVersion = "nai-diffusion-4-curated-preview".parse().unwrap();
        assert_eq!(by_label, by_name);
        assert!(matches!("sdxl".parse::<ModelVersion>(), Err(Error::UnknownModel(_))));
    }

    #[test]
    fn test_display_name_strips_suffix() {
        assert_eq!(display_name(Path::new("/tmp/cat girl.naiv4vibe")), "cat girl");
        assert_eq!(display_name(Path::new("/tmp/notes.txt")), "notes.txt");
    }

    #[test]
    fn test_record_fields_are_optional() {
        let record: VibeRecord = serde_json::from_str("{}").unwrap();
        assert!(record.thumbnail.is_none());
        assert!(record.encodings_for(ModelVersion::V45Full).unwrap().is_none());
        assert_eq!(record.import_info.unwrap_or_default(), ImportInfo::default());
    }

    #[test]
    fn test_information_extracted_keeps_json_spelling() {
        let record: VibeRecord = serde_json::from_str(
            r#"{"encodings": {"v4-5full": {
                "a": {"encoding": "AAA", "params": {"information_extracted": 1.0}},
                "b": {"encoding": "BBB", "params": {"information_extracted": 1}},
                "c": {"encoding": "", "params": {"information_extracted": "high"}}
            }}}"#,
        )
        .unwrap();
        let entries = record.encodings_for(ModelVersion::V45Full).unwrap().unwrap();
        assert_eq!(entries["a"].information_extracted().unwrap().to_string(), "1.0");
        assert_eq!(entries["b"].information_extracted().unwrap().to_string(), "1");
        assert!(entries["c"].information_extracted().is_none());
        assert!(entries["c"].identifier().is_none());
    }

    #[test]
    fn test_only_the_requested_version_is_typed() {
        let record: VibeRecord = serde_json::from_str(
            r#"{"encodings": {
                "v4-5full": {"a": {"encoding": "AAA"}},
                "v4full": []
            }}"#,
        )
        .unwrap();
        assert_eq!(record.encodings_for(ModelVersion::V45Full).unwrap().unwrap().len(), 1);
        assert!(record.encodings_for(ModelVersion::V4Curated).unwrap().is_none());
        assert!(matches!(record.encodings_for(ModelVersion::V4Full), Err(Error::Json(_))));
    }

    #[test]
    fn test_import_info_with_wrong_types_reads_as_unset() {
        let record: VibeRecord = serde_json::from_str(
            r#"{"importInfo": {"model": "nai-diffusion-4-full", "strength": "0.6", "information_extracted": null}}"#,
        )
        .unwrap();
        let info = record.import_info.unwrap();
        assert_eq!(info.model.as_deref(), Some("nai-diffusion-4-full"));
        assert_eq!(info.strength, None);
        assert_eq!(info.information_extracted, None);

        let record: VibeRecord = serde_json::from_str(r#"{"importInfo": "none"}"#).unwrap();
        assert!(record.import_info.is_none());
    }

    #[test]
    fn test_version_display_names() {
        let names: Vec<&str> = ModelVersion::ALL.iter().map(|v| v.display_name()).collect();
        assert_eq!(names, ["V4.5", "V4.5 Curated", "V4", "V4 Curated"]);
        assert_eq!(ModelVersion::V4Curated.to_string(), "nai-diffusion-4-curated-preview");
    }
}
