//! Catalog index of a library root
//!
//! A scan visits every immediate subfolder of the root one at a time,
//! classifies its files, extracts the product id, optionally consults the
//! thumbnail cache, and rewrites `metadata.json` in the root. Fields a user or
//! a purchase import supplied (`purchase_title`, `purchased_at`) are carried
//! over from the previous index so a rescan never loses them.

use crate::api::BoothClient;
use crate::cache::ThumbnailCache;
use crate::error::{LibraryError, Result};
use crate::models::{CatalogDocument, LibraryItem, ScanSummary};
use crate::product_id::{build_public_item_url, extract_product_id};
use crate::scanner::scan_files_two_level;
use crate::settings::Settings;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Catalog index file name inside the library root
pub const METADATA_FILE: &str = "metadata.json";

/// Default time-to-live for cached public metadata
pub const DEFAULT_PUBLIC_TTL: Duration = Duration::from_secs(3600);

/// Knobs for a single scan
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Carry sticky fields over from the previous index
    pub diff: bool,
    /// Maximum age of cached public metadata before a refresh is attempted
    pub public_ttl: Duration,
    /// Refresh public metadata even when the cache is fresh
    pub force_refresh: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            diff: true,
            public_ttl: DEFAULT_PUBLIC_TTL,
            force_refresh: false,
        }
    }
}

/// Path of the catalog index for a library root
pub fn metadata_path(root: &Path) -> PathBuf {
    root.join(METADATA_FILE)
}

/// Loads the raw records of the persisted index, or `None` when the file is
/// missing, unparsable, or has no items list.
pub fn try_read_raw_catalog(root: &Path) -> Option<Vec<serde_json::Value>> {
    let path = metadata_path(root);
    let content = std::fs::read_to_string(&path).ok()?;
    let mut doc: serde_json::Value = match serde_json::from_str(&content) {
        Ok(doc) => doc,
        Err(e) => {
            log::warn!("Failed to parse {}, treating as empty: {}", path.display(), e);
            return None;
        }
    };
    match doc.get_mut("items").map(serde_json::Value::take) {
        Some(serde_json::Value::Array(items)) => Some(items),
        _ => {
            log::warn!("{} has no items list, treating as empty", path.display());
            None
        }
    }
}

/// Loads the persisted index, or `None` when it is missing or unparsable.
///
/// Bad field values read as defaults; only records that are not JSON objects
/// are skipped.
pub fn try_read_catalog(root: &Path) -> Option<Vec<LibraryItem>> {
    let items = try_read_raw_catalog(root)?
        .into_iter()
        .filter_map(|raw| match serde_json::from_value::<LibraryItem>(raw) {
            Ok(item) => Some(item),
            Err(e) => {
                log::warn!("Skipping malformed catalog record: {}", e);
                None
            }
        })
        .collect();
    Some(items)
}

/// Loads the persisted index, treating a missing or broken file as empty
pub fn read_catalog(root: &Path) -> Vec<LibraryItem> {
    try_read_catalog(root).unwrap_or_default()
}

/// Replaces the persisted index. Failures propagate.
pub fn write_catalog(root: &Path, items: &[LibraryItem]) -> Result<()> {
    let doc = CatalogDocument {
        items: items.to_vec(),
    };
    let json = serde_json::to_string_pretty(&doc)?;
    std::fs::write(metadata_path(root), json)?;
    log::debug!("Wrote catalog index with {} items", items.len());
    Ok(())
}

/// Replaces the persisted index with raw records, written back as given
pub fn write_raw_catalog(root: &Path, items: &[serde_json::Value]) -> Result<()> {
    let json = serde_json::to_string_pretty(&serde_json::json!({ "items": items }))?;
    std::fs::write(metadata_path(root), json)?;
    log::debug!("Wrote catalog index with {} items", items.len());
    Ok(())
}

/// Scans a library root and rewrites its catalog index.
///
/// With `client` set, public title and thumbnail are refreshed through each
/// item's thumbnail cache; without it the scan stays offline.
pub fn scan_library(root: &Path, options: &ScanOptions, client: Option<&BoothClient>) -> Result<ScanSummary> {
    if !root.is_dir() {
        return Err(LibraryError::RootNotFound(root.to_path_buf()));
    }
    log::info!("Scanning library root {}", root.display());

    let previous: HashMap<String, LibraryItem> = if options.diff {
        read_catalog(root)
            .into_iter()
            .filter(|item| !item.path.is_empty())
            .map(|item| (item.path.clone(), item))
            .collect()
    } else {
        HashMap::new()
    };

    let mut folders: Vec<(String, PathBuf)> = std::fs::read_dir(root)?
        .filter_map(|entry| entry.ok())
        .map(|entry| (entry.file_name().to_string_lossy().to_string(), entry.path()))
        .filter(|(_, path)| path.is_dir())
        .collect();
    folders.sort();

    let mut items = Vec::with_capacity(folders.len());
    let mut summary = ScanSummary::default();

    for (name, dir) in folders {
        let key = dir.to_string_lossy().to_string();
        let item = build_item(&name, &dir, previous.get(&key), options, client);

        summary.archives += item.stats.archive_count;
        summary.documents += item.stats.document_count;
        items.push(item);
    }
    summary.count = items.len();

    write_catalog(root, &items)?;
    log::info!(
        "Scan complete: {} items, {} archives, {} documents",
        summary.count,
        summary.archives,
        summary.documents
    );
    Ok(summary)
}

/// Scans the root remembered in the settings store
pub fn scan_last_root(settings: &Settings, options: &ScanOptions, client: Option<&BoothClient>) -> Result<ScanSummary> {
    let root = settings.last_root().ok_or(LibraryError::NoLastRoot)?;
    scan_library(&root, options, client)
}

fn build_item(
    name: &str,
    dir: &Path,
    previous: Option<&LibraryItem>,
    options: &ScanOptions,
    client: Option<&BoothClient>,
) -> LibraryItem {
    let scan = scan_files_two_level(dir);
    let mut item = LibraryItem {
        title: name.to_string(),
        path: dir.to_string_lossy().to_string(),
        stats: scan.stats(),
        files: scan.files,
        ..Default::default()
    };

    if let Some(prev) = previous {
        item.purchase_title = prev.purchase_title.trim().to_string();
        item.purchased_at = prev.purchased_at.trim().to_string();
    }

    if let Some(pid) = extract_product_id(name) {
        item.product_url = build_public_item_url(&pid);
        item.product_id = Some(pid);

        if let Some(client) = client {
            let cached = ThumbnailCache::new(dir).get_or_refresh(client, options.public_ttl, options.force_refresh);
            if let Some(thumbnail) = cached.thumbnail {
                item.thumbnail = thumbnail;
            }
            if let Some(meta) = cached.meta {
                if !meta.official_title.trim().is_empty() {
                    item.official_title = meta.official_title.trim().to_string();
                }
                if !meta.product_url.trim().is_empty() {
                    item.product_url = meta.product_url.trim().to_string();
                }
            }
            log::debug!("{}: thumbnail {:?}", name, cached.outcome);
        }
    }

    if item.thumbnail.is_empty() {
        if let Some(prev) = previous.filter(|p| p.has_thumbnail()) {
            item.thumbnail = prev.thumbnail.trim().to_string();
        }
    }

    item
}
