//! BOOTH Library - local index of purchased item folders
//!
//! Scans a library root of `[<product id>] <name>` folders into a catalog index,
//! caches public thumbnails and page titles with a time-to-live, merges
//! user-supplied purchase history, and flags items whose public content changed.

pub mod api;
pub mod cache;
pub mod catalog;
pub mod change_db;
pub mod error;
pub mod html_scan;
pub mod models;
pub mod product_id;
pub mod purchase_import;
pub mod query;
pub mod scanner;
pub mod settings;
pub mod utils;

pub use api::{BoothClient, PublicItemMeta};
pub use cache::{ThumbnailCache, ThumbnailOutcome, ThumbnailResult};
pub use catalog::{read_catalog, scan_last_root, scan_library, write_catalog, ScanOptions};
pub use change_db::{ChangeDetectionRecord, ChangeDetectionStore};
pub use error::{LibraryError, Result};
pub use models::{ImportSummary, LibraryItem, PurchaseRecord, ScanSummary};
pub use product_id::{build_public_item_url, extract_product_id};
pub use purchase_import::{
    apply_import, build_purchase_json_from_html_files, build_purchase_json_from_text, extract_urls,
    filter_by_existing_folders, write_purchase_json,
};
pub use settings::Settings;
