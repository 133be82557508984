//! Product id extraction from folder names and item URLs
//!
//! Item folders follow the `[<digits>] <name>` convention; the bracketed digits
//! are the shop's product id and correlate folders, public pages and imports.

use crate::models::LibraryItem;
use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;

/// Host serving the public, unauthenticated item pages
pub const PUBLIC_BASE_URL: &str = "https://booth.pm";

lazy_static! {
    static ref FOLDER_ID: Regex = Regex::new(r"^\[(\d+)\]").unwrap();
    static ref ITEM_PATH_ID: Regex = Regex::new(r"/items/(\d+)").unwrap();
    static ref BRACKETED_LONG_ID: Regex = Regex::new(r"\[(\d{5,})\]").unwrap();
    static ref ITEM_PATH_LONG_ID: Regex = Regex::new(r"/items/(\d{5,})").unwrap();
    static ref LONG_DIGITS: Regex = Regex::new(r"(\d{5,})").unwrap();
    static ref LONG_ID_ONLY: Regex = Regex::new(r"^\d{5,}$").unwrap();
}

/// Returns the leading `[<digits>]` run of a folder name, if any.
pub fn extract_product_id(folder_name: &str) -> Option<String> {
    FOLDER_ID
        .captures(folder_name)
        .map(|caps| caps[1].to_string())
}

/// Canonical public item page for a product id
pub fn build_public_item_url(product_id: &str) -> String {
    item_url_with_base(PUBLIC_BASE_URL, product_id)
}

pub(crate) fn item_url_with_base(base_url: &str, product_id: &str) -> String {
    format!("{}/ja/items/{}", base_url.trim_end_matches('/'), product_id)
}

/// Returns the digits following the first `/items/` segment of a URL.
pub fn product_id_from_url(url: &str) -> Option<String> {
    ITEM_PATH_ID.captures(url).map(|caps| caps[1].to_string())
}

/// Best-effort product id for display and sorting.
///
/// Tries the stored id, then the product URL, then the purchase title and
/// folder title, and finally the folder name itself. Only runs of five or more
/// digits are accepted outside the stored field.
pub fn guess_product_id(item: &LibraryItem) -> Option<String> {
    if let Some(pid) = item.product_id.as_deref() {
        if LONG_ID_ONLY.is_match(pid) {
            return Some(pid.to_string());
        }
    }

    if let Some(caps) = ITEM_PATH_LONG_ID.captures(item.product_url.trim()) {
        return Some(caps[1].to_string());
    }

    for text in [&item.purchase_title, &item.title] {
        if let Some(caps) = BRACKETED_LONG_ID.captures(text) {
            return Some(caps[1].to_string());
        }
        if let Some(caps) = ITEM_PATH_LONG_ID.captures(text) {
            return Some(caps[1].to_string());
        }
    }

    let base = Path::new(item.path.trim())
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    BRACKETED_LONG_ID
        .captures(&base)
        .or_else(|| LONG_DIGITS.captures(&base))
        .map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_product_id() {
        assert_eq!(
            extract_product_id("[123456] Cool Avatar"),
            Some("123456".to_string())
        );
        assert_eq!(extract_product_id("Cool Avatar"), None);
        assert_eq!(extract_product_id("Cool [123456] Avatar"), None);
        assert_eq!(extract_product_id("[abc] Cool Avatar"), None);
        assert_eq!(extract_product_id("[42]NoSpace"), Some("42".to_string()));
    }

    #[test]
    fn test_build_public_item_url() {
        assert_eq!(
            build_public_item_url("123456"),
            "https://booth.pm/ja/items/123456"
        );
        assert_eq!(
            item_url_with_base("http://127.0.0.1:4000/", "7"),
            "http://127.0.0.1:4000/ja/items/7"
        );
    }

    #[test]
    fn test_product_id_from_url() {
        assert_eq!(
            product_id_from_url("https://shop.booth.pm/items/999?x=1"),
            Some("999".to_string())
        );
        assert_eq!(product_id_from_url("https://booth.pm/ja/items/"), None);
    }

    #[test]
    fn test_guess_product_id_prefers_stored_id() {
        let item = LibraryItem {
            title: "[22222] Other".to_string(),
            product_id: Some("11111".to_string()),
            ..Default::default()
        };
        assert_eq!(guess_product_id(&item), Some("11111".to_string()));
    }

    #[test]
    fn test_guess_product_id_fallbacks() {
        let from_url = LibraryItem {
            product_id: Some("12".to_string()),
            product_url: "https://booth.pm/ja/items/33333".to_string(),
            ..Default::default()
        };
        assert_eq!(guess_product_id(&from_url), Some("33333".to_string()));

        let from_title = LibraryItem {
            title: "Something [44444]".to_string(),
            ..Default::default()
        };
        assert_eq!(guess_product_id(&from_title), Some("44444".to_string()));

        let from_path = LibraryItem {
            title: "renamed".to_string(),
            path: "/lib/download_55555_v2".to_string(),
            ..Default::default()
        };
        assert_eq!(guess_product_id(&from_path), Some("55555".to_string()));

        let nothing = LibraryItem {
            title: "Short 123".to_string(),
            path: "/lib/Short 123".to_string(),
            ..Default::default()
        };
        assert_eq!(guess_product_id(&nothing), None);
    }
}
