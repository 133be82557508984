//! Per-item thumbnail cache with a time-to-live
//!
//! Layout inside each item folder:
//!
//! ```text
//! [item]/.thumbnail_cache/booth.<png|jpg|webp>   at most one image
//! [item]/.thumbnail_cache/meta.json              ThumbnailMeta with fetched_at
//! ```
//!
//! A fresh cache answers without touching the network or the disk. When a
//! refresh fails, whatever was cached before is returned instead.

use crate::api::{BoothClient, PublicItemMeta};
use crate::error::Result;
use crate::models::ThumbnailMeta;
use crate::product_id::extract_product_id;
use crate::utils::{format_utc, parse_utc_timestamp};
use chrono::{DateTime, Utc};
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the cache directory inside each item folder
pub const CACHE_DIR_NAME: &str = ".thumbnail_cache";

const META_FILE: &str = "meta.json";
const IMAGE_STEM: &str = "booth";
/// Extensions probed when looking for an existing image, in priority order
const LOOKUP_EXTS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// How a thumbnail lookup was answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailOutcome {
    /// Cache within TTL; no network or disk writes
    Fresh,
    /// New image downloaded and stored
    Downloaded,
    /// Page still points at the cached image; only `fetched_at` was refreshed
    ImageUnchanged,
    /// Page has no image; refreshed meta stored, existing image kept
    MetaOnly,
    /// Refresh failed; previously cached image/meta returned
    StaleFallback,
    /// Nothing cached and nothing fetched
    Absent,
}

/// Thumbnail path (relative to the item folder) and cached meta
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailResult {
    pub thumbnail: Option<String>,
    pub meta: Option<ThumbnailMeta>,
    pub outcome: ThumbnailOutcome,
}

impl ThumbnailResult {
    fn new(thumbnail: Option<String>, meta: Option<ThumbnailMeta>, outcome: ThumbnailOutcome) -> Self {
        Self {
            thumbnail,
            meta,
            outcome,
        }
    }

    /// Returns the pre-refresh state, labelled as a fallback when anything was cached
    fn fallback(existing: Option<ExistingImage>, meta: Option<ThumbnailMeta>) -> Self {
        let outcome = if existing.is_some() || meta.is_some() {
            ThumbnailOutcome::StaleFallback
        } else {
            ThumbnailOutcome::Absent
        };
        Self::new(existing.map(|e| e.rel), meta, outcome)
    }
}

#[derive(Debug, Clone)]
struct ExistingImage {
    rel: String,
    path: PathBuf,
}

/// Thumbnail cache of a single item folder
pub struct ThumbnailCache {
    item_dir: PathBuf,
    cache_dir: PathBuf,
}

impl ThumbnailCache {
    pub fn new(item_dir: &Path) -> Self {
        Self {
            item_dir: item_dir.to_path_buf(),
            cache_dir: item_dir.join(CACHE_DIR_NAME),
        }
    }

    /// Get the cache directory path
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn meta_path(&self) -> PathBuf {
        self.cache_dir.join(META_FILE)
    }

    fn image_file_name(ext: &str) -> String {
        format!("{}.{}", IMAGE_STEM, ext)
    }

    fn image_rel(ext: &str) -> String {
        format!("{}/{}", CACHE_DIR_NAME, Self::image_file_name(ext))
    }

    fn existing_image(&self) -> Option<ExistingImage> {
        LOOKUP_EXTS.iter().find_map(|ext| {
            let path = self.cache_dir.join(Self::image_file_name(ext));
            path.is_file().then(|| ExistingImage {
                rel: Self::image_rel(ext),
                path,
            })
        })
    }

    /// Cached meta record, `None` when missing or unparsable
    pub fn read_meta(&self) -> Option<ThumbnailMeta> {
        let json = std::fs::read_to_string(self.meta_path()).ok()?;
        match serde_json::from_str(&json) {
            Ok(meta) => Some(meta),
            Err(e) => {
                log::warn!(
                    "Failed to parse thumbnail meta in {}: {}",
                    self.cache_dir.display(),
                    e
                );
                None
            }
        }
    }

    fn write_meta(&self, meta: &ThumbnailMeta) -> Result<()> {
        std::fs::create_dir_all(&self.cache_dir)?;
        let json = serde_json::to_string_pretty(meta)?;
        std::fs::write(self.meta_path(), json)?;
        Ok(())
    }

    /// Writes meta, logging instead of failing
    fn store_meta(&self, meta: &ThumbnailMeta) {
        if let Err(e) = self.write_meta(meta) {
            log::warn!(
                "Failed to write thumbnail meta in {}: {}",
                self.cache_dir.display(),
                e
            );
        }
    }

    /// Stores the image under its extension and removes a stale file of another extension
    fn write_image(&self, ext: &str, bytes: &[u8], existing: Option<&ExistingImage>) -> Result<String> {
        std::fs::create_dir_all(&self.cache_dir)?;
        let path = self.cache_dir.join(Self::image_file_name(ext));
        std::fs::write(&path, bytes)?;

        if let Some(old) = existing {
            if old.path != path {
                if let Err(e) = std::fs::remove_file(&old.path) {
                    log::warn!("Failed to remove stale thumbnail {}: {}", old.path.display(), e);
                }
            }
        }
        Ok(Self::image_rel(ext))
    }

    /// Returns the cached thumbnail, refreshing it from the public page when stale.
    ///
    /// Never fails for network conditions: a failed refresh falls back to
    /// whatever was cached before.
    pub fn get_or_refresh(&self, client: &BoothClient, ttl: Duration, force_refresh: bool) -> ThumbnailResult {
        self.get_or_refresh_at(client, ttl, force_refresh, Utc::now())
    }

    pub(crate) fn get_or_refresh_at(
        &self,
        client: &BoothClient,
        ttl: Duration,
        force_refresh: bool,
        now: DateTime<Utc>,
    ) -> ThumbnailResult {
        let folder_name = self
            .item_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let Some(product_id) = extract_product_id(&folder_name) else {
            return ThumbnailResult::new(None, None, ThumbnailOutcome::Absent);
        };

        let existing = self.existing_image();
        let existing_meta = self.read_meta();

        if is_fresh(existing_meta.as_ref(), ttl, force_refresh, now) {
            return ThumbnailResult::new(existing.map(|e| e.rel), existing_meta, ThumbnailOutcome::Fresh);
        }

        let Some(page) = client.fetch_public_item_meta(&product_id) else {
            log::info!("Public page refresh failed for {}, using cached data", product_id);
            return ThumbnailResult::fallback(existing, existing_meta);
        };

        let fetched_at = format_utc(now);
        let mut meta_out = refreshed_meta(&product_id, &page, &fetched_at);

        let Some(og_image_url) = page.og_image_url.clone() else {
            meta_out.image_rel = existing.as_ref().map(|e| e.rel.clone()).unwrap_or_default();
            self.store_meta(&meta_out);
            return ThumbnailResult::new(existing.map(|e| e.rel), Some(meta_out), ThumbnailOutcome::MetaOnly);
        };

        let same_image = existing_meta
            .as_ref()
            .map(|m| m.og_image_url.trim() == og_image_url.trim())
            .unwrap_or(false);
        if let Some(current) = existing.as_ref().filter(|_| same_image && !force_refresh) {
            meta_out.image_rel = current.rel.clone();
            self.store_meta(&meta_out);
            log::debug!("Thumbnail for {} unchanged, skipped download", product_id);
            return ThumbnailResult::new(Some(current.rel.clone()), Some(meta_out), ThumbnailOutcome::ImageUnchanged);
        }

        let stored = client.download_image(&og_image_url).and_then(|image| {
            let ext = image_extension(&og_image_url, image.content_type.as_deref());
            self.write_image(ext, &image.bytes, existing.as_ref())
        });
        match stored {
            Ok(image_rel) => {
                meta_out.image_rel = image_rel.clone();
                self.store_meta(&meta_out);
                log::info!("Cached thumbnail for {} at {}", product_id, image_rel);
                ThumbnailResult::new(Some(image_rel), Some(meta_out), ThumbnailOutcome::Downloaded)
            }
            Err(e) => {
                log::warn!("Thumbnail download failed for {}: {}", product_id, e);
                ThumbnailResult::fallback(existing, existing_meta)
            }
        }
    }
}

fn refreshed_meta(product_id: &str, page: &PublicItemMeta, fetched_at: &str) -> ThumbnailMeta {
    ThumbnailMeta {
        product_id: product_id.to_string(),
        product_url: page.product_url.clone(),
        official_title: page.official_title.clone().unwrap_or_default(),
        og_image_url: page.og_image_url.clone().unwrap_or_default(),
        image_rel: String::new(),
        fetched_at: fetched_at.to_string(),
    }
}

/// A meta record is fresh when refresh isn't forced, the TTL is positive, and
/// `now - fetched_at < ttl`.
pub fn is_fresh(meta: Option<&ThumbnailMeta>, ttl: Duration, force_refresh: bool, now: DateTime<Utc>) -> bool {
    if force_refresh || ttl.is_zero() {
        return false;
    }
    let Some(fetched_at) = meta.and_then(|m| parse_utc_timestamp(&m.fetched_at)) else {
        return false;
    };
    let Ok(ttl) = chrono::Duration::from_std(ttl) else {
        return true;
    };
    now.signed_duration_since(fetched_at) < ttl
}

/// Picks the cache extension from the URL path suffix, else the content type.
///
/// `jpeg` is normalised to `jpg`; anything undeterminable becomes `jpg`.
pub fn image_extension(url: &str, content_type: Option<&str>) -> &'static str {
    let path = Url::parse(url)
        .map(|u| u.path().to_lowercase())
        .unwrap_or_else(|_| url.to_lowercase());
    for (suffix, ext) in [(".png", "png"), (".jpg", "jpg"), (".jpeg", "jpg"), (".webp", "webp")] {
        if path.ends_with(suffix) {
            return ext;
        }
    }

    let content_type = content_type.unwrap_or("").to_lowercase();
    if content_type.contains("png") {
        "png"
    } else if content_type.contains("webp") {
        "webp"
    } else {
        "jpg"
    }
}

#[cfg(test)]
#[path = "thumbnail_cache_tests.rs"]
mod tests;
