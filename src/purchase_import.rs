//! Purchase import: item URL extraction and merge into the catalog index
//!
//! Purchase history is supplied by the user as pasted text/HTML or saved HTML
//! pages. Item URLs found there are normalised to the canonical public item
//! URL, deduplicated, optionally filtered down to products that have a local
//! folder, and written to a purchase import file. Applying that file copies
//! `product_url`, `purchase_title` and `purchased_at` onto matching catalog
//! items.

use crate::catalog::{read_catalog, try_read_raw_catalog, write_raw_catalog};
use crate::error::Result;
use crate::html_scan::anchors;
use crate::models::{
    BuildSummary, ImportSummary, PurchaseFile, PurchaseRecord, PurchaseSource, PurchaseSourceType,
};
use crate::product_id::{build_public_item_url, extract_product_id, product_id_from_url, PUBLIC_BASE_URL};
use crate::utils::utc_timestamp;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

lazy_static! {
    static ref TAG: Regex = Regex::new(r"(?s)<[^>]*>").unwrap();
}

/// Rewrites any recognisable item URL to the canonical public item URL.
///
/// Protocol-relative URLs get `https:`, root-relative ones get the public
/// host. Anything that is not http(s) or lacks `/items/<digits>` is rejected.
pub fn normalize_item_url(url: &str) -> Option<String> {
    let mut u = url.trim().to_string();
    if u.is_empty() {
        return None;
    }
    if u.starts_with("//") {
        u = format!("https:{}", u);
    } else if u.starts_with('/') {
        u = format!("{}{}", PUBLIC_BASE_URL, u);
    }
    if !u.starts_with("http://") && !u.starts_with("https://") {
        return None;
    }
    product_id_from_url(&u).map(|pid| build_public_item_url(&pid))
}

/// Item URLs from bare lines of plain text
pub fn extract_urls_from_text(text: &str) -> Vec<String> {
    text.lines().filter_map(normalize_item_url).collect()
}

/// Item URLs from `href`s of anchors that enclose visible text
pub fn extract_urls_from_html(html: &str) -> Vec<String> {
    anchors(html)
        .into_iter()
        .filter(|a| a.href.contains("/items/"))
        .filter(|a| !TAG.replace_all(&a.inner, "").trim().is_empty())
        .filter_map(|a| normalize_item_url(&a.href))
        .collect()
}

/// Drops repeated URLs, keeping first-seen order
pub fn dedupe_urls(urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter().filter(|u| seen.insert(u.clone())).collect()
}

/// Canonical, deduplicated item URLs from pasted text or HTML.
///
/// Plain-text lines come first, then anchors, each in input order.
pub fn extract_urls(input: &str) -> Vec<String> {
    let mut urls = extract_urls_from_text(input);
    urls.extend(extract_urls_from_html(input));
    dedupe_urls(urls)
}

/// Keeps only URLs whose product id has an entry in the root's catalog index.
///
/// Returns the kept URLs and how many were removed.
pub fn filter_by_existing_folders(urls: Vec<String>, root: &Path) -> (Vec<String>, usize) {
    let existing: HashSet<String> = read_catalog(root)
        .into_iter()
        .filter_map(|item| item.product_id)
        .collect();

    let total = urls.len();
    let kept: Vec<String> = urls
        .into_iter()
        .filter(|u| {
            product_id_from_url(u)
                .map(|pid| existing.contains(&pid))
                .unwrap_or(false)
        })
        .collect();
    let removed = total - kept.len();
    if removed > 0 {
        log::info!("Filtered out {} URLs without a local folder", removed);
    }
    (kept, removed)
}

/// Writes a purchase import file
pub fn write_purchase_json(
    items: &[PurchaseRecord],
    out_path: &Path,
    source_type: PurchaseSourceType,
    hint: &str,
    filtered_out: Option<usize>,
) -> Result<()> {
    let file = PurchaseFile {
        source: PurchaseSource {
            source_type,
            hint: hint.to_string(),
            generated_at: utc_timestamp(),
            filtered_out,
        },
        items: items.to_vec(),
    };
    if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(out_path, serde_json::to_string_pretty(&file)?)?;
    log::info!("Wrote {} purchase records to {}", items.len(), out_path.display());
    Ok(())
}

fn records_from_urls(urls: &[String]) -> Vec<PurchaseRecord> {
    urls.iter()
        .filter_map(|u| product_id_from_url(u).map(|pid| PurchaseRecord::new(pid, u.clone())))
        .collect()
}

fn build_from_urls(
    urls: Vec<String>,
    out_path: &Path,
    source_type: PurchaseSourceType,
    hint: &str,
    filter_root: Option<&Path>,
) -> Result<BuildSummary> {
    let urls = dedupe_urls(urls);
    let extracted = urls.len();

    let (urls, filtered_out) = match filter_root {
        Some(root) => {
            let (kept, removed) = filter_by_existing_folders(urls, root);
            (kept, Some(removed))
        }
        None => (urls, None),
    };

    write_purchase_json(&records_from_urls(&urls), out_path, source_type, hint, filtered_out)?;
    Ok(BuildSummary {
        extracted,
        filtered_out: filtered_out.unwrap_or(0),
        out_path: out_path.to_string_lossy().to_string(),
    })
}

/// Builds a purchase import file from pasted text (URLs and/or HTML)
pub fn build_purchase_json_from_text(
    pasted: &str,
    out_path: &Path,
    hint: &str,
    filter_root: Option<&Path>,
) -> Result<BuildSummary> {
    build_from_urls(
        extract_urls(pasted),
        out_path,
        PurchaseSourceType::ManualPaste,
        hint,
        filter_root,
    )
}

/// Builds a purchase import file from saved HTML pages.
///
/// Unreadable files are skipped. Without a hint, the first file name and the
/// number of additional files are recorded.
pub fn build_purchase_json_from_html_files(
    html_files: &[PathBuf],
    out_path: &Path,
    hint: &str,
    filter_root: Option<&Path>,
) -> Result<BuildSummary> {
    let mut urls = Vec::new();
    let mut used = Vec::new();
    for path in html_files {
        match std::fs::read_to_string(path) {
            Ok(html) => {
                urls.extend(extract_urls_from_html(&html));
                used.push(
                    path.file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default(),
                );
            }
            Err(e) => log::warn!("Skipping unreadable HTML file {}: {}", path.display(), e),
        }
    }

    let hint = if !hint.is_empty() {
        hint.to_string()
    } else if let Some(first) = used.first() {
        format!("{} (+{} files)", first, used.len() - 1)
    } else {
        String::new()
    };

    build_from_urls(urls, out_path, PurchaseSourceType::ManualCopyHtml, &hint, filter_root)
}

/// Reads an import file into a product_id → record map.
///
/// A missing or unparsable file, or malformed records, are skipped rather than
/// failing the import.
pub fn load_purchase_records(path: &Path) -> HashMap<String, PurchaseRecord> {
    let mut records = HashMap::new();
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            log::warn!("Failed to read purchase file {}: {}", path.display(), e);
            return records;
        }
    };
    let doc: serde_json::Value = match serde_json::from_str(&content) {
        Ok(doc) => doc,
        Err(e) => {
            log::warn!("Failed to parse purchase file {}: {}", path.display(), e);
            return records;
        }
    };

    let items = doc.get("items").and_then(|i| i.as_array()).cloned().unwrap_or_default();
    for raw in items {
        match serde_json::from_value::<PurchaseRecord>(raw) {
            Ok(record) if !record.product_id.is_empty() => {
                records.insert(record.product_id.clone(), record);
            }
            Ok(_) => {}
            Err(e) => log::debug!("Skipping malformed purchase record: {}", e),
        }
    }
    records
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Product id stored in a raw catalog record; `""` and `"None"` count as missing
fn stored_product_id(record: &Map<String, Value>) -> Option<String> {
    let pid = match record.get("product_id")? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!pid.is_empty() && !pid.eq_ignore_ascii_case("none")).then_some(pid)
}

/// Sets `key` to `value` when it differs; returns whether it changed
fn assign_if_changed(record: &mut Map<String, Value>, key: &str, value: Option<&str>) -> bool {
    match value {
        Some(v) if record.get(key).and_then(Value::as_str) != Some(v) => {
            record.insert(key.to_string(), Value::String(v.to_string()));
            true
        }
        _ => false,
    }
}

/// Merges an import file into the root's catalog index.
///
/// Items are matched by product id, falling back to the id in the folder
/// title. `updated` counts matched items where at least one field changed.
/// Records are merged as raw JSON, so every record and every field the import
/// does not touch is written back unchanged. The index is rewritten even when
/// nothing changed; a missing or unreadable index leaves the disk untouched
/// and reports zero.
pub fn apply_import(root: &Path, purchase_json_path: &Path) -> Result<ImportSummary> {
    let Some(mut items) = try_read_raw_catalog(root) else {
        log::warn!("No catalog index in {}, nothing to apply", root.display());
        return Ok(ImportSummary::default());
    };

    let records = load_purchase_records(purchase_json_path);
    let mut summary = ImportSummary {
        total: records.len(),
        ..Default::default()
    };

    for item in items.iter_mut() {
        let Some(fields) = item.as_object_mut() else {
            continue;
        };
        let pid = stored_product_id(fields).or_else(|| {
            fields
                .get("title")
                .and_then(Value::as_str)
                .and_then(extract_product_id)
        });
        let Some(record) = pid.and_then(|pid| records.get(&pid)) else {
            continue;
        };
        summary.matched += 1;

        let title = non_blank(record.purchase_title.as_deref())
            .or_else(|| non_blank(record.official_title.as_deref()));

        let mut changed = assign_if_changed(fields, "product_url", non_blank(record.product_url.as_deref()));
        changed |= assign_if_changed(fields, "purchase_title", title);
        changed |= assign_if_changed(fields, "purchased_at", non_blank(record.purchased_at.as_deref()));

        if changed {
            summary.updated += 1;
        }
    }

    write_raw_catalog(root, &items)?;
    log::info!(
        "Applied purchase import: {} records, {} matched, {} updated",
        summary.total,
        summary.matched,
        summary.updated
    );
    Ok(summary)
}

#[cfg(test)]
#[path = "purchase_import_tests.rs"]
mod tests;
