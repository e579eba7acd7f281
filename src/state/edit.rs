//! Import settings edits for a vibe file
//!
//! An edit replaces the whole `importInfo` object of the record. The rest
//! of the record is left as it was on disk.

use std::fs;
use std::io::Write;
use std::ops::RangeInclusive;
use std::path::Path;

use serde::Serialize;
use tempfile::NamedTempFile;

use super::data::{ImportInfo, ModelVersion};
use crate::error::{Error, Result};

/// Accepted range for `information_extracted`
pub const INFORMATION_EXTRACTED_RANGE: RangeInclusive<f64> = 0.01..=1.0;

/// Values for a record's `importInfo`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImportInfoEdit {
    /// Model version the vibe is imported for
    pub model: ModelVersion,

    /// Reference strength applied on import
    pub strength: f64,

    /// Information extracted (0.01 to 1.0)
    pub information_extracted: f64,
}

/// On-disk shape of `importInfo`, in the key order the tool writes
#[derive(Serialize)]
struct StoredImportInfo<'a> {
    model: &'a str,
    information_extracted: f64,
    strength: f64,
}

impl ImportInfoEdit {
    /// Build an edit from text fields, the way they arrive from a form.
    pub fn parse(model: &str, strength: &str, information_extracted: &str) -> Result<Self> {
        Ok(Self {
            model: model.parse()?,
            strength: parse_number(strength)?,
            information_extracted: parse_number(information_extracted)?,
        })
    }

    /// Start from a record's current import info, if it is complete.
    pub fn from_import_info(info: &ImportInfo) -> Option<Self> {
        Some(Self {
            model: ModelVersion::from_model_name(info.model.as_deref()?)?,
            strength: info.strength?,
            information_extracted: info.information_extracted?,
        })
    }

    /// Check that information extracted is within range
    pub fn validate(&self) -> Result<()> {
        if INFORMATION_EXTRACTED_RANGE.contains(&self.information_extracted) {
            Ok(())
        } else {
            Err(Error::ExtractionOutOfRange(self.information_extracted))
        }
    }

    /// Convert to the JSON value stored under `importInfo`
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(StoredImportInfo {
            model: self.model.model_name(),
            information_extracted: self.information_extracted,
            strength: self.strength,
        })?)
    }

    pub fn to_import_info(&self) -> ImportInfo {
        ImportInfo {
            model: Some(self.model.model_name().to_string()),
            information_extracted: Some(self.information_extracted),
            strength: Some(self.strength),
        }
    }
}

fn parse_number(text: &str) -> Result<f64> {
    text.trim()
        .parse()
        .map_err(|_| Error::InvalidNumber(text.to_string()))
}

/// Validate `edit` and write it into the record at `path`.
///
/// The whole record is read, its `importInfo` replaced, and the whole file
/// rewritten. Nothing is written when validation fails, and the record is
/// swapped in only once the new contents are fully on disk.
pub fn save_import_info(path: &Path, edit: &ImportInfoEdit) -> Result<()> {
    edit.validate()?;

    let text = fs::read_to_string(path)?;
    let mut record: serde_json::Value = serde_json::from_str(&text)?;
    let Some(fields) = record.as_object_mut() else {
        return Err(Error::MalformedRecord {
            path: path.to_path_buf(),
            reason: "top level is not an object".to_string(),
        });
    };
    fields.insert("importInfo".to_string(), edit.to_json()?);

    replace_file(path, serde_json::to_string_pretty(&record)?.as_bytes())?;
    log::info!("Saved import info for {}", path.display());
    Ok(())
}

/// Write `contents` to a sibling temp file and rename it over `path`.
fn replace_file(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let permissions = fs::metadata(path)?.permissions();

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    fs::set_permissions(tmp.path(), permissions)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn edit(information_extracted: f64) -> ImportInfoEdit {
        ImportInfoEdit { model: ModelVersion::V45Full, strength: 0.6, information_extracted }
    }

    #[test]
    fn test_validate_bounds() {
        assert!(edit(0.01).validate().is_ok());
        assert!(edit(1.0).validate().is_ok());
        assert!(edit(0.5).validate().is_ok());
        assert!(matches!(edit(0.0).validate(), Err(Error::ExtractionOutOfRange(_))));
        assert!(edit(1.01).validate().is_err());
        assert!(edit(f64::NAN).validate().is_err());
    }

    #[test]
    fn test_parse_text_fields() {
        let parsed = ImportInfoEdit::parse("v4c", " 0.8 ", "0.25").unwrap();
        assert_eq!(parsed.model, ModelVersion::V4Curated);
        assert_eq!(parsed.strength, 0.8);
        assert_eq!(parsed.information_extracted, 0.25);

        assert!(matches!(ImportInfoEdit::parse("v4", "strong", "0.5"), Err(Error::InvalidNumber(_))));
        assert!(matches!(ImportInfoEdit::parse("v5", "0.5", "0.5"), Err(Error::UnknownModel(_))));
    }

    #[test]
    fn test_round_trip_with_import_info() {
        let e = edit(0.7);
        assert_eq!(ImportInfoEdit::from_import_info(&e.to_import_info()), Some(e));
        assert_eq!(ImportInfoEdit::from_import_info(&ImportInfo::default()), None);
    }

    #[test]
    fn test_save_replaces_only_import_info() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.naiv4vibe");
        fs::write(
            &path,
            r#"{"name": "a", "thumbnail": "QUJD", "importInfo": {"model": "old", "strength": 1}}"#,
        )
        .unwrap();

        save_import_info(&path, &edit(0.4)).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  \"importInfo\""));
        let saved: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(saved["name"], "a");
        assert_eq!(saved["thumbnail"], "QUJD");
        assert_eq!(
            saved["importInfo"],
            serde_json::json!({
                "model": "nai-diffusion-4-5-full",
                "information_extracted": 0.4,
                "strength": 0.6
            })
        );
    }

    #[test]
    fn test_out_of_range_is_not_written() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.naiv4vibe");
        let original = r#"{"importInfo": {"model": "nai-diffusion-4-full", "strength": 1}}"#;
        fs::write(&path, original).unwrap();

        assert!(save_import_info(&path, &edit(1.5)).is_err());
        assert!(save_import_info(&path, &edit(0.001)).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn test_save_leaves_only_the_record_behind() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.naiv4vibe");
        fs::write(&path, r#"{"name": "a"}"#).unwrap();

        save_import_info(&path, &edit(0.5)).unwrap();
        save_import_info(&path, &edit(0.9)).unwrap();

        let files: Vec<_> = fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().path()).collect();
        assert_eq!(files, vec![path.clone()]);
        let saved: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved["importInfo"]["information_extracted"], 0.9);
    }

    #[cfg(unix)]
    #[test]
    fn test_save_keeps_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.naiv4vibe");
        fs::write(&path, "{}").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        save_import_info(&path, &edit(0.5)).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().permissions().mode() & 0o777, 0o644);
    }

    #[test]
    fn test_save_to_missing_record_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.naiv4vibe");
        assert!(matches!(save_import_info(&path, &edit(0.5)), Err(Error::Io(_))));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_save_rejects_non_object_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.naiv4vibe");
        fs::write(&path, "[]").unwrap();
        assert!(matches!(
            save_import_info(&path, &edit(0.5)),
            Err(Error::MalformedRecord { .. })
        ));
    }
}
