//! Potion references embedded in generated images
//!
//! A generated PNG carries a `Comment` text chunk holding JSON. Two parallel
//! arrays in it list the vibe encodings used and their strengths.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::Result;
use crate::state::data::{display_name, Thumbnail};
use crate::state::index::{EncodingIndex, IndexedEncoding};
use crate::thumbnail::{unknown_potion_placeholder, UNKNOWN_POTION_SIZE};

/// Keyword of the PNG text chunk holding generation metadata
pub const COMMENT_KEYWORD: &str = "Comment";

const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// Why an image yields no reference group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataIssue {
    /// No comment, unreadable file, or JSON without usable arrays
    NoMetadata,
    /// Metadata present but no potions were referenced
    NoPotions,
}

impl MetadataIssue {
    pub fn message(self) -> &'static str {
        match self {
            MetadataIssue::NoMetadata => "No metadata",
            MetadataIssue::NoPotions => "No potions",
        }
    }
}

impl fmt::Display for MetadataIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Deserialize)]
struct ReferenceComment {
    #[serde(default)]
    reference_image_multiple: Option<Vec<String>>,
    #[serde(default)]
    reference_strength_multiple: Option<Vec<f64>>,
}

/// One encoding referenced by a generated image
#[derive(Debug, Clone, PartialEq)]
pub struct PotionReference {
    pub encoding: String,
    pub strength: f64,
}

/// Read the `Comment` text chunk of a PNG file.
///
/// Returns `Ok(None)` for files that are not PNGs or have no such chunk.
pub fn read_reference_comment(path: &Path) -> Result<Option<String>> {
    let bytes = fs::read(path)?;
    if !bytes.starts_with(&PNG_SIGNATURE) {
        return Ok(None);
    }

    let decoder = png::Decoder::new(bytes.as_slice());
    let mut reader = decoder.read_info()?;
    if let Some(text) = find_comment(reader.info())? {
        return Ok(Some(text));
    }

    // text chunks after the image data only show up once it is consumed
    let mut buf = vec![0; reader.output_buffer_size()];
    reader.next_frame(&mut buf)?;
    reader.finish()?;
    find_comment(reader.info())
}

fn find_comment(info: &png::Info) -> Result<Option<String>> {
    for t in &info.uncompressed_latin1_text {
        if t.keyword == COMMENT_KEYWORD {
            return Ok(Some(t.text.clone()));
        }
    }
    for t in &info.compressed_latin1_text {
        if t.keyword == COMMENT_KEYWORD {
            return Ok(Some(t.get_text()?));
        }
    }
    for t in &info.utf8_text {
        if t.keyword == COMMENT_KEYWORD {
            return Ok(Some(t.get_text()?));
        }
    }
    Ok(None)
}

/// Parse the reference arrays out of a comment.
pub fn parse_references(comment: &str) -> std::result::Result<Vec<PotionReference>, MetadataIssue> {
    let value: serde_json::Value =
        serde_json::from_str(comment).map_err(|_| MetadataIssue::NoMetadata)?;
    if !value.is_object() {
        return Err(MetadataIssue::NoMetadata);
    }
    let comment: ReferenceComment =
        serde_json::from_value(value).map_err(|_| MetadataIssue::NoMetadata)?;

    let encodings = match comment.reference_image_multiple {
        Some(encodings) if !encodings.is_empty() => encodings,
        _ => return Err(MetadataIssue::NoPotions),
    };
    let strengths = comment
        .reference_strength_multiple
        .ok_or(MetadataIssue::NoMetadata)?;
    if strengths.len() < encodings.len() {
        return Err(MetadataIssue::NoMetadata);
    }

    Ok(encodings
        .into_iter()
        .zip(strengths)
        .map(|(encoding, strength)| PotionReference { encoding, strength })
        .collect())
}

/// Read and parse the references of a generated image. Every failure
/// degrades to a `MetadataIssue`.
pub fn load_references(path: &Path) -> std::result::Result<Vec<PotionReference>, MetadataIssue> {
    match read_reference_comment(path) {
        Ok(Some(comment)) => parse_references(&comment),
        Ok(None) => Err(MetadataIssue::NoMetadata),
        Err(e) => {
            log::warn!("Cannot read metadata from {}: {}", path.display(), e);
            Err(MetadataIssue::NoMetadata)
        }
    }
}

/// What a reference resolved to
#[derive(Debug, Clone)]
pub enum Resolution {
    /// Found in the scanned vibe files
    Known(IndexedEncoding),
    /// Not in any scanned vibe file; carries the placeholder image
    Unknown(Thumbnail),
}

/// One potion of a reference group
#[derive(Debug, Clone)]
pub struct PotionMember {
    pub encoding: String,
    /// Strength as loaded from the image; ratios are taken against this
    pub original_strength: f64,
    /// Strength after the latest edit
    pub strength: f64,
    pub resolution: Resolution,
}

impl PotionMember {
    pub fn thumbnail(&self) -> &Thumbnail {
        match &self.resolution {
            Resolution::Known(hit) => &hit.thumbnail,
            Resolution::Unknown(placeholder) => placeholder,
        }
    }

    pub fn source(&self) -> Option<&Path> {
        match &self.resolution {
            Resolution::Known(hit) => Some(hit.source.as_path()),
            Resolution::Unknown(_) => None,
        }
    }

    pub fn information_extracted(&self) -> Option<f64> {
        match &self.resolution {
            Resolution::Known(hit) => hit.information_extracted,
            Resolution::Unknown(_) => None,
        }
    }

    /// Vibe file name without suffix, or "Unknown File"
    pub fn name(&self) -> String {
        self.source()
            .map(display_name)
            .unwrap_or_else(|| "Unknown File".to_string())
    }
}

/// The potions of one generated image, in reference order
#[derive(Debug, Clone, Default)]
pub struct ReferenceGroup {
    pub(crate) members: Vec<PotionMember>,
}

impl ReferenceGroup {
    /// Look every reference up in `index`.
    pub fn resolve(references: Vec<PotionReference>, index: &EncodingIndex) -> Self {
        let placeholder = Thumbnail::placeholder(unknown_potion_placeholder(UNKNOWN_POTION_SIZE));
        let members = references
            .into_iter()
            .map(|r| {
                let resolution = match index.get(&r.encoding) {
                    Some(hit) => Resolution::Known(hit.clone()),
                    None => Resolution::Unknown(placeholder.clone()),
                };
                PotionMember {
                    encoding: r.encoding,
                    original_strength: r.strength,
                    strength: r.strength,
                    resolution,
                }
            })
            .collect();
        ReferenceGroup { members }
    }

    /// Open a generated image and resolve its potions.
    pub fn from_image(path: &Path, index: &EncodingIndex) -> std::result::Result<Self, MetadataIssue> {
        let references = load_references(path)?;
        Ok(Self::resolve(references, index))
    }

    pub fn members(&self) -> &[PotionMember] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Current strengths in reference order
    pub fn strengths(&self) -> Vec<f64> {
        self.members.iter().map(|m| m.strength).collect()
    }

    pub fn original_strengths(&self) -> Vec<f64> {
        self.members.iter().map(|m| m.original_strength).collect()
    }
}
