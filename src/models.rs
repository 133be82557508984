//! Data model shared by the scanner, the catalog index and the purchase import

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// File names found under an item folder, grouped by kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLists {
    #[serde(deserialize_with = "lenient")]
    pub archives: Vec<String>,
    #[serde(deserialize_with = "lenient")]
    pub documents: Vec<String>,
    #[serde(deserialize_with = "lenient")]
    pub sources: Vec<String>,
}

/// Per-kind file counts for an item folder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStats {
    #[serde(deserialize_with = "lenient")]
    pub archive_count: usize,
    #[serde(deserialize_with = "lenient")]
    pub document_count: usize,
    #[serde(deserialize_with = "lenient")]
    pub source_count: usize,
    #[serde(deserialize_with = "lenient")]
    pub image_count: usize,
}

/// One purchased-item folder in the catalog index.
///
/// Everything is rebuilt on each scan except `purchase_title` and
/// `purchased_at`, which are carried over from the previous record at the
/// same path, and `thumbnail`, which is carried over only when the current
/// scan produced none.
///
/// Every field reads `null` or a value of the wrong type as its default, so a
/// hand-edited record never loses its other fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryItem {
    /// Folder display name
    #[serde(deserialize_with = "lenient")]
    pub title: String,
    /// Folder path; unique within a library root
    #[serde(deserialize_with = "lenient")]
    pub path: String,
    #[serde(with = "empty_string_as_none")]
    pub product_id: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub product_url: String,
    /// Title taken from the public item page
    #[serde(deserialize_with = "lenient")]
    pub official_title: String,
    /// Title supplied by a purchase import (sticky across rescans)
    #[serde(deserialize_with = "lenient")]
    pub purchase_title: String,
    /// Purchase timestamp supplied by a purchase import (sticky across rescans)
    #[serde(deserialize_with = "lenient")]
    pub purchased_at: String,
    #[serde(deserialize_with = "lenient")]
    pub files: FileLists,
    #[serde(deserialize_with = "lenient")]
    pub stats: FileStats,
    /// Thumbnail path relative to the item folder, empty when none
    #[serde(deserialize_with = "lenient")]
    pub thumbnail: String,
}

impl LibraryItem {
    pub fn has_thumbnail(&self) -> bool {
        !self.thumbnail.trim().is_empty()
    }

    pub fn has_purchase_info(&self) -> bool {
        !self.purchase_title.trim().is_empty()
    }
}

/// Persisted catalog index document (`metadata.json` in the library root)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub items: Vec<LibraryItem>,
}

/// Totals reported by a scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub count: usize,
    pub archives: usize,
    pub documents: usize,
}

/// Totals reported by applying a purchase import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Distinct product ids in the import file
    pub total: usize,
    /// Catalog items that had a matching import record
    pub matched: usize,
    /// Matched items where at least one field actually changed
    pub updated: usize,
}

/// Cached public metadata for one item (`.thumbnail_cache/meta.json`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailMeta {
    pub product_id: String,
    pub product_url: String,
    pub official_title: String,
    pub og_image_url: String,
    /// Cached image path relative to the item folder, empty when none
    pub image_rel: String,
    /// UTC ISO-8601 with trailing `Z`
    pub fetched_at: String,
}

/// One record of a purchase import file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub product_id: String,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub product_url: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub purchase_title: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub official_title: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub purchased_at: Option<String>,
}

impl PurchaseRecord {
    pub fn new(product_id: impl Into<String>, product_url: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            product_url: Some(product_url.into()),
            ..Default::default()
        }
    }
}

/// Where a purchase import file came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseSourceType {
    ManualPaste,
    ManualCopyHtml,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseSource {
    #[serde(rename = "type")]
    pub source_type: PurchaseSourceType,
    pub hint: String,
    pub generated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filtered_out: Option<usize>,
}

/// Purchase import file (`purchase_import.json`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseFile {
    pub source: PurchaseSource,
    pub items: Vec<PurchaseRecord>,
}

/// Result of building a purchase import file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildSummary {
    /// Distinct item URLs found before filtering
    pub extracted: usize,
    pub filtered_out: usize,
    pub out_path: String,
}

/// Stores `None` as an empty string, and reads `""`, `"None"` or `null` back as `None`
mod empty_string_as_none {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(value.as_deref().unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let raw = Option::<serde_json::Value>::deserialize(d)?;
        let text = match raw {
            Some(serde_json::Value::String(s)) => s,
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => return Ok(None),
        };
        let text = text.trim();
        if text.is_empty() || text.eq_ignore_ascii_case("none") {
            Ok(None)
        } else {
            Ok(Some(text.to_string()))
        }
    }
}

/// Reads `null` or a value of the wrong type as the field's default
fn lenient<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let raw = serde_json::Value::deserialize(d)?;
    Ok(serde_json::from_value(raw).unwrap_or_default())
}

fn string_or_number<'de, D>(d: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(d)? {
        serde_json::Value::String(s) => Ok(s.trim().to_string()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected product id string, got {}",
            other
        ))),
    }
}
