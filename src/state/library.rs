use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Local};
use image::DynamicImage;
use walkdir::WalkDir;

use super::data::{display_name, CatalogEntry, ModelVersion, Thumbnail, VibeRecord, VIBE_SUFFIX};
use super::index::{EncodingIndex, IndexedEncoding};
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::thumbnail::{self, PLACEHOLDER_SIZE};

/// Horizontal room taken by one grid cell besides the thumbnail itself
/// (margins and the filename label).
pub const GRID_CELL_MARGIN: u32 = 30;

/// A vibe file that could not be loaded during a scan
#[derive(Debug, Clone, PartialEq)]
pub struct ScanError {
    pub path: PathBuf,
    pub message: String,
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string());
        write!(f, "[error] {}: {}", name, self.message)
    }
}

/// Result of one full scan
#[derive(Debug, Default)]
pub struct Catalog {
    pub entries: Vec<CatalogEntry>,
    pub index: EncodingIndex,
    pub errors: Vec<ScanError>,
}

/// Scan `directories` for vibe files and build the catalog and encoding index.
///
/// Each directory is listed one level deep. Files that fail to load are
/// recorded in `errors`; the scan always runs to the end.
pub fn build_catalog<P: AsRef<Path>>(directories: &[P], version_label: &str) -> Catalog {
    let mut catalog = Catalog::default();

    let Some(version) = ModelVersion::from_label(version_label) else {
        log::warn!("Unknown version label {:?}, no vibe files will match", version_label);
        return catalog;
    };

    let placeholder = Thumbnail::placeholder(thumbnail::placeholder_thumbnail(PLACEHOLDER_SIZE));
    let mut seen = HashSet::new();

    for directory in directories {
        let directory = directory.as_ref();
        if !seen.insert(directory.to_path_buf()) {
            continue;
        }
        log::debug!("Scanning folder: {}", directory.display());

        for entry in WalkDir::new(directory)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(directory).to_path_buf();
                    log::warn!("Cannot list {}: {}", path.display(), e);
                    catalog.errors.push(ScanError { path, message: e.to_string() });
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }
            if !entry.file_name().to_string_lossy().ends_with(VIBE_SUFFIX) {
                continue;
            }

            let path = entry.path();
            match load_entry(path, version, &placeholder, &mut catalog.index) {
                Ok(Some(item)) => catalog.entries.push(item),
                Ok(None) => log::debug!("Skipped {}", path.display()),
                Err(e) => {
                    let err = ScanError { path: path.to_path_buf(), message: e.to_string() };
                    log::warn!("{}", err);
                    catalog.errors.push(err);
                }
            }
        }
    }

    log::info!(
        "Scan complete: {} vibe files, {} encodings, {} errors",
        catalog.entries.len(),
        catalog.index.len(),
        catalog.errors.len()
    );

    catalog
}

/// Load one vibe file. `Ok(None)` means the file is silently excluded
/// (undecodable thumbnail, or no encodings for the active version).
fn load_entry(
    path: &Path,
    version: ModelVersion,
    placeholder: &Thumbnail,
    index: &mut EncodingIndex,
) -> Result<Option<CatalogEntry>> {
    let record = read_record(path)?;

    let thumbnail = match record.thumbnail.as_deref().filter(|t| !t.is_empty()) {
        Some(payload) => match thumbnail::decode_thumbnail(payload)? {
            Some(img) => Thumbnail::new(img),
            None => return Ok(None),
        },
        None => placeholder.clone(),
    };

    let encodings = match record.encodings_for(version)? {
        Some(encodings) if !encodings.is_empty() => encodings,
        _ => return Ok(None),
    };

    let created_at = created_at(path)?;

    let mut extraction_levels = BTreeSet::new();
    for encoding in encodings.values() {
        let Some(identifier) = encoding.identifier() else {
            continue;
        };
        let information = encoding.information_extracted();
        if let Some(n) = information {
            extraction_levels.insert(n.to_string());
        }
        index.insert(
            identifier,
            IndexedEncoding {
                thumbnail: thumbnail.clone(),
                information_extracted: information.and_then(|n| n.as_f64()),
                source: path.to_path_buf(),
            },
        );
    }

    Ok(Some(CatalogEntry {
        path: path.to_path_buf(),
        created_at,
        thumbnail,
        extraction_levels,
        import_info: record.import_info.unwrap_or_default(),
    }))
}

/// Read a vibe record; the top level must be a JSON object.
pub fn read_record(path: &Path) -> Result<VibeRecord> {
    let text = fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&text)?;
    if !value.is_object() {
        return Err(Error::MalformedRecord {
            path: path.to_path_buf(),
            reason: "top level is not an object".to_string(),
        });
    }
    Ok(serde_json::from_value(value)?)
}

/// Creation time where the platform records it, otherwise last modification.
fn created_at(path: &Path) -> Result<DateTime<Local>> {
    let metadata = fs::metadata(path)?;
    let time = metadata.created().or_else(|_| metadata.modified())?;
    Ok(DateTime::<Local>::from(time))
}

/// Catalog ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    NameAsc,
    NameDesc,
    TimeAsc,
    TimeDesc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::NameAsc => "name_asc",
            SortOrder::NameDesc => "name_desc",
            SortOrder::TimeAsc => "time_asc",
            SortOrder::TimeDesc => "time_desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "name_asc" => Ok(SortOrder::NameAsc),
            "name_desc" => Ok(SortOrder::NameDesc),
            "time_asc" => Ok(SortOrder::TimeAsc),
            "time_desc" => Ok(SortOrder::TimeDesc),
            other => Err(Error::UnsupportedSortOrder(other.to_string())),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable sort. Names compare without the vibe suffix, times at
/// one-second resolution.
pub fn sort_entries(entries: &mut [CatalogEntry], order: SortOrder) {
    match order {
        SortOrder::NameAsc => entries.sort_by_cached_key(|e| e.name()),
        SortOrder::NameDesc => entries.sort_by_cached_key(|e| std::cmp::Reverse(e.name())),
        SortOrder::TimeAsc => entries.sort_by_key(|e| e.created_at.timestamp()),
        SortOrder::TimeDesc => entries.sort_by_key(|e| std::cmp::Reverse(e.created_at.timestamp())),
    }
}

/// Case-insensitive substring search over suffix-stripped file names.
/// A blank query keeps every entry.
pub fn filter_entries<'a>(entries: &'a [CatalogEntry], query: &str) -> Vec<&'a CatalogEntry> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return entries.iter().collect();
    }
    entries
        .iter()
        .filter(|e| display_name(&e.path).to_lowercase().contains(&query))
        .collect()
}

/// Number of thumbnail columns that fit in `available_width`.
pub fn grid_columns(available_width: u32, thumbnail_size: u32, has_items: bool) -> u32 {
    if !has_items {
        return 1;
    }
    (available_width / (thumbnail_size + GRID_CELL_MARGIN)).max(1)
}

/// Position of one entry in the thumbnail grid
#[derive(Debug, Clone, Copy)]
pub struct GridCell<'a> {
    pub row: u32,
    pub col: u32,
    pub entry: &'a CatalogEntry,
}

/// The Library owns the current catalog and the settings it was built from.
/// Every change that affects the scan result rebuilds it from scratch.
#[derive(Debug)]
pub struct Library {
    settings: Settings,
    sort_order: SortOrder,
    catalog: Catalog,
}

impl Library {
    /// Create a library for `settings`. Nothing is scanned until `reload`.
    pub fn new(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let sort_order = settings.sort_order()?;
        Ok(Library { settings, sort_order, catalog: Catalog::default() })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Rescan every directory, replacing the previous catalog and index.
    /// Returns the errors collected during the scan.
    pub fn reload(&mut self) -> &[ScanError] {
        let mut catalog = build_catalog(self.settings.directories.as_slice(), &self.settings.version);
        sort_entries(&mut catalog.entries, self.sort_order);
        self.catalog = catalog;
        &self.catalog.errors
    }

    pub fn set_version(&mut self, label: &str) -> &[ScanError] {
        self.settings.version = label.to_string();
        self.reload()
    }

    pub fn set_directories(&mut self, directories: Vec<PathBuf>) -> &[ScanError] {
        self.settings.directories = directories;
        self.reload()
    }

    pub fn set_sort_order(&mut self, order: SortOrder) {
        self.sort_order = order;
        self.settings.sort_order = order.as_str().to_string();
        sort_entries(&mut self.catalog.entries, order);
    }

    pub fn set_thumbnail_size(&mut self, size: u32) -> Result<()> {
        crate::config::validate_thumbnail_size(size)?;
        self.settings.thumbnail_size = size;
        Ok(())
    }

    pub fn set_show_images_without_thumbnails(&mut self, show: bool) {
        self.settings.show_images_without_thumbnails = show;
    }

    /// All entries of the last scan, in display order
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.catalog.entries
    }

    pub fn index(&self) -> &EncodingIndex {
        &self.catalog.index
    }

    pub fn errors(&self) -> &[ScanError] {
        &self.catalog.errors
    }

    /// Entries matching `query`, without placeholder-only entries unless
    /// those are switched on.
    pub fn visible(&self, query: &str) -> Vec<&CatalogEntry> {
        let show_all = self.settings.show_images_without_thumbnails;
        filter_entries(&self.catalog.entries, query)
            .into_iter()
            .filter(|e| show_all || e.has_thumbnail())
            .collect()
    }

    /// Lay out the visible entries row by row for a view `available_width` wide.
    pub fn layout(&self, query: &str, available_width: u32) -> Vec<GridCell<'_>> {
        let visible = self.visible(query);
        let columns = grid_columns(available_width, self.settings.thumbnail_size, !visible.is_empty());
        visible
            .into_iter()
            .enumerate()
            .map(|(i, entry)| GridCell {
                row: i as u32 / columns,
                col: i as u32 % columns,
                entry,
            })
            .collect()
    }

    /// The entry's thumbnail scaled to the configured display size
    pub fn thumbnail_for(&self, entry: &CatalogEntry) -> DynamicImage {
        thumbnail::fit_to_size(&entry.thumbnail.image, self.settings.thumbnail_size)
    }
}
