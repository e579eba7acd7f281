use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the catalog, import-info and potion layers.
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid base64 thumbnail: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("PNG error: {0}")]
    Png(#[from] png::DecodingError),
    /// Information extracted must stay within `0.01..=1.0`.
    #[error("information extracted must be between 0.01 and 1.0, got {0}")]
    ExtractionOutOfRange(f64),
    #[error("unsupported sort order: {0}")]
    UnsupportedSortOrder(String),
    #[error("unknown model: {0}")]
    UnknownModel(String),
    #[error("not a number: {0:?}")]
    InvalidNumber(String),
    #[error("thumbnail size must be between 50 and 500, got {0}")]
    InvalidThumbnailSize(u32),
    #[error("no reference at position {index} (group has {len})")]
    MemberOutOfRange { index: usize, len: usize },
    #[error("malformed record {}: {reason}", path.display())]
    MalformedRecord { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
