//! Caching layer for public thumbnails and their page metadata

pub mod thumbnail_cache;

pub use thumbnail_cache::{
    is_fresh, ThumbnailCache, ThumbnailOutcome, ThumbnailResult, CACHE_DIR_NAME,
};
