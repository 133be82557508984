//! Filtering and sorting of catalog items for listing

use crate::models::LibraryItem;
use crate::product_id::guess_product_id;
use crate::utils::parse_utc_timestamp;
use clap::ValueEnum;
use std::cmp::Ordering;

/// Which items to keep in a listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ItemFilter {
    #[default]
    All,
    HasArchives,
    HasDocuments,
    HasSources,
    HasImages,
    NoThumbnail,
    NoPurchaseInfo,
}

impl ItemFilter {
    pub fn matches(self, item: &LibraryItem) -> bool {
        match self {
            ItemFilter::All => true,
            ItemFilter::HasArchives => item.stats.archive_count > 0,
            ItemFilter::HasDocuments => item.stats.document_count > 0,
            ItemFilter::HasSources => item.stats.source_count > 0,
            ItemFilter::HasImages => item.stats.image_count > 0,
            ItemFilter::NoThumbnail => !item.has_thumbnail(),
            ItemFilter::NoPurchaseInfo => !item.has_purchase_info(),
        }
    }
}

/// Listing order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum SortKey {
    #[default]
    Title,
    Id,
    PurchasedAt,
    Archives,
    Documents,
    Images,
}

/// Title shown for an item: purchase title, then folder title, then a placeholder
pub fn display_title(item: &LibraryItem) -> String {
    for title in [&item.purchase_title, &item.title] {
        let title = title.trim();
        if !title.is_empty() {
            return title.to_string();
        }
    }
    match guess_product_id(item) {
        Some(pid) => format!("(untitled) {}", pid),
        None => "(untitled)".to_string(),
    }
}

fn matches_query(item: &LibraryItem, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    let pid = guess_product_id(item).unwrap_or_default();
    [display_title(item), pid, item.path.clone()]
        .iter()
        .any(|field| field.to_lowercase().contains(needle))
}

fn compare(a: &LibraryItem, b: &LibraryItem, key: SortKey) -> Ordering {
    match key {
        SortKey::Title => display_title(a)
            .to_lowercase()
            .cmp(&display_title(b).to_lowercase()),
        SortKey::Id => {
            let id = |item: &LibraryItem| guess_product_id(item).and_then(|pid| pid.parse::<u64>().ok());
            id(a).cmp(&id(b))
        }
        SortKey::PurchasedAt => {
            parse_utc_timestamp(&a.purchased_at).cmp(&parse_utc_timestamp(&b.purchased_at))
        }
        SortKey::Archives => a.stats.archive_count.cmp(&b.stats.archive_count),
        SortKey::Documents => a.stats.document_count.cmp(&b.stats.document_count),
        SortKey::Images => a.stats.image_count.cmp(&b.stats.image_count),
    }
}

/// Items matching a case-insensitive text query and a filter, sorted by `key`.
///
/// Items without an id or purchase date sort first in ascending order. Ties
/// keep catalog order in both directions.
pub fn filter_items<'a>(
    items: &'a [LibraryItem],
    query: &str,
    filter: ItemFilter,
    key: SortKey,
    descending: bool,
) -> Vec<&'a LibraryItem> {
    let needle = query.trim().to_lowercase();
    let mut selected: Vec<&LibraryItem> = items
        .iter()
        .filter(|item| filter.matches(item))
        .filter(|item| matches_query(item, &needle))
        .collect();

    selected.sort_by(|a, b| {
        let ord = compare(a, b, key);
        if descending {
            ord.reverse()
        } else {
            ord
        }
    });
    selected
}
