//! Tests for the per-item thumbnail cache.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::{image_extension, is_fresh, ThumbnailCache, ThumbnailOutcome, CACHE_DIR_NAME};
use crate::api::BoothClient;
use crate::models::ThumbnailMeta;
use crate::utils::{format_utc, utc_timestamp};

const HOUR: Duration = Duration::from_secs(3600);

fn item_page(title: &str, image: Option<&str>) -> String {
    let image_tag = image
        .map(|url| format!(r#"<meta property="og:image" content="{}">"#, url))
        .unwrap_or_default();
    format!(
        r#"<html><head><meta property="og:title" content="{}">{}</head></html>"#,
        title, image_tag
    )
}

fn make_item(temp_dir: &TempDir, name: &str) -> PathBuf {
    let item = temp_dir.path().join(name);
    fs::create_dir_all(&item).unwrap();
    item
}

fn seed_cache(item: &Path, image_name: &str, image: &[u8], meta: &ThumbnailMeta) {
    let cache_dir = item.join(CACHE_DIR_NAME);
    fs::create_dir_all(&cache_dir).unwrap();
    fs::write(cache_dir.join(image_name), image).unwrap();
    fs::write(
        cache_dir.join("meta.json"),
        serde_json::to_string_pretty(meta).unwrap(),
    )
    .unwrap();
}

fn meta_with(og_image_url: &str, image_rel: &str, fetched_at: &str) -> ThumbnailMeta {
    ThumbnailMeta {
        product_id: "123".to_string(),
        product_url: "https://booth.pm/ja/items/123".to_string(),
        official_title: "Old Title".to_string(),
        og_image_url: og_image_url.to_string(),
        image_rel: image_rel.to_string(),
        fetched_at: fetched_at.to_string(),
    }
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.unwrap().len()
}

fn run_refresh(base_url: String, item: PathBuf, ttl: Duration, force: bool) -> super::ThumbnailResult {
    let client = BoothClient::with_base_url(&base_url, Duration::from_secs(5)).unwrap();
    ThumbnailCache::new(&item).get_or_refresh(&client, ttl, force)
}

// ── freshness ────────────────────────────────────────────────────────

#[test]
fn ttl_boundary() {
    let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    let ttl = chrono::Duration::seconds(3600);
    let one = chrono::Duration::seconds(1);

    let expired = meta_with("", "", &format_utc(now - ttl - one));
    let within = meta_with("", "", &format_utc(now - ttl + one));

    assert!(!is_fresh(Some(&expired), HOUR, false, now));
    assert!(is_fresh(Some(&within), HOUR, false, now));
}

#[test]
fn freshness_requires_ttl_meta_and_no_force() {
    let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    let recent = meta_with("", "", &format_utc(now));

    assert!(!is_fresh(Some(&recent), HOUR, true, now));
    assert!(!is_fresh(Some(&recent), Duration::ZERO, false, now));
    assert!(!is_fresh(None, HOUR, false, now));
    assert!(!is_fresh(Some(&meta_with("", "", "garbage")), HOUR, false, now));
    // Records written without the trailing Z are still understood
    assert!(is_fresh(
        Some(&meta_with("", "", "2025-06-01T11:30:00")),
        HOUR,
        false,
        now
    ));
}

#[test]
fn extension_from_url_then_content_type() {
    assert_eq!(image_extension("https://img.example/a/cover.PNG", None), "png");
    assert_eq!(image_extension("https://img.example/a/cover.jpeg?v=2", None), "jpg");
    assert_eq!(image_extension("https://img.example/a/cover.webp", Some("image/png")), "webp");
    assert_eq!(image_extension("https://img.example/a/cover", Some("image/png")), "png");
    assert_eq!(image_extension("https://img.example/a/cover", Some("image/jpeg")), "jpg");
    assert_eq!(image_extension("https://img.example/a/cover", Some("image/webp")), "webp");
    assert_eq!(image_extension("https://img.example/a/cover", None), "jpg");
    assert_eq!(image_extension("https://img.example/a/cover", Some("application/octet-stream")), "jpg");
}

// ── get_or_refresh ───────────────────────────────────────────────────

#[tokio::test]
async fn downloads_image_and_writes_meta() {
    let mock_server = MockServer::start().await;
    let image_url = format!("{}/img/cover.png", mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/ja/items/123"))
        .respond_with(ResponseTemplate::new(200).set_body_string(item_page("New Title", Some(&image_url))))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/cover.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1, 2, 3]))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let item = make_item(&temp_dir, "[123] Thing");
    let result = tokio::task::spawn_blocking({
        let (base, item) = (mock_server.uri(), item.clone());
        move || run_refresh(base, item, HOUR, false)
    })
    .await
    .unwrap();

    assert_eq!(result.outcome, ThumbnailOutcome::Downloaded);
    assert_eq!(result.thumbnail.as_deref(), Some(".thumbnail_cache/booth.png"));
    assert_eq!(fs::read(item.join(".thumbnail_cache/booth.png")).unwrap(), vec![1, 2, 3]);

    let meta = ThumbnailCache::new(&item).read_meta().unwrap();
    assert_eq!(meta.product_id, "123");
    assert_eq!(meta.product_url, "https://booth.pm/ja/items/123");
    assert_eq!(meta.official_title, "New Title");
    assert_eq!(meta.og_image_url, image_url);
    assert_eq!(meta.image_rel, ".thumbnail_cache/booth.png");
    assert!(meta.fetched_at.ends_with('Z'));
    assert_eq!(result.meta, Some(meta));
}

#[tokio::test]
async fn fresh_cache_makes_no_requests() {
    let mock_server = MockServer::start().await;

    let temp_dir = TempDir::new().unwrap();
    let item = make_item(&temp_dir, "[123] Thing");
    let cached = meta_with("https://img.example/c.jpg", ".thumbnail_cache/booth.jpg", &utc_timestamp());
    seed_cache(&item, "booth.jpg", &[9, 9], &cached);
    let meta_before = fs::read_to_string(item.join(".thumbnail_cache/meta.json")).unwrap();

    let result = tokio::task::spawn_blocking({
        let (base, item) = (mock_server.uri(), item.clone());
        move || run_refresh(base, item, HOUR, false)
    })
    .await
    .unwrap();

    assert_eq!(result.outcome, ThumbnailOutcome::Fresh);
    assert_eq!(result.thumbnail.as_deref(), Some(".thumbnail_cache/booth.jpg"));
    assert_eq!(result.meta, Some(cached));
    assert_eq!(request_count(&mock_server).await, 0);
    assert_eq!(
        fs::read_to_string(item.join(".thumbnail_cache/meta.json")).unwrap(),
        meta_before
    );
}

#[tokio::test]
async fn unchanged_image_url_skips_download_but_refreshes_fetched_at() {
    let mock_server = MockServer::start().await;
    let image_url = format!("{}/img/cover.jpg", mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/ja/items/123"))
        .respond_with(ResponseTemplate::new(200).set_body_string(item_page("Renamed", Some(&image_url))))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let item = make_item(&temp_dir, "[123] Thing");
    let old = meta_with(&image_url, ".thumbnail_cache/booth.jpg", "2020-01-01T00:00:00Z");
    seed_cache(&item, "booth.jpg", &[7], &old);

    let result = tokio::task::spawn_blocking({
        let (base, item) = (mock_server.uri(), item.clone());
        move || run_refresh(base, item, HOUR, false)
    })
    .await
    .unwrap();

    assert_eq!(result.outcome, ThumbnailOutcome::ImageUnchanged);
    assert_eq!(result.thumbnail.as_deref(), Some(".thumbnail_cache/booth.jpg"));
    // Only the page was requested
    assert_eq!(request_count(&mock_server).await, 1);

    let meta = ThumbnailCache::new(&item).read_meta().unwrap();
    assert_ne!(meta.fetched_at, "2020-01-01T00:00:00Z");
    assert_eq!(meta.official_title, "Renamed");
    assert_eq!(meta.image_rel, ".thumbnail_cache/booth.jpg");
    assert_eq!(fs::read(item.join(".thumbnail_cache/booth.jpg")).unwrap(), vec![7]);
}

#[tokio::test]
async fn page_failure_falls_back_to_stale_cache() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ja/items/123"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let item = make_item(&temp_dir, "[123] Thing");
    let old = meta_with("https://img.example/c.png", ".thumbnail_cache/booth.png", "2020-01-01T00:00:00Z");
    seed_cache(&item, "booth.png", &[5], &old);

    let result = tokio::task::spawn_blocking({
        let (base, item) = (mock_server.uri(), item.clone());
        move || run_refresh(base, item, HOUR, false)
    })
    .await
    .unwrap();

    assert_eq!(result.outcome, ThumbnailOutcome::StaleFallback);
    assert_eq!(result.thumbnail.as_deref(), Some(".thumbnail_cache/booth.png"));
    assert_eq!(result.meta, Some(old));
}

#[tokio::test]
async fn page_failure_without_cache_is_absent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ja/items/123"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let item = make_item(&temp_dir, "[123] Thing");

    let result = tokio::task::spawn_blocking({
        let (base, item) = (mock_server.uri(), item.clone());
        move || run_refresh(base, item, HOUR, false)
    })
    .await
    .unwrap();

    assert_eq!(result.outcome, ThumbnailOutcome::Absent);
    assert!(result.thumbnail.is_none());
    assert!(result.meta.is_none());
}

#[tokio::test]
async fn download_failure_keeps_pre_attempt_state() {
    let mock_server = MockServer::start().await;
    let new_image = format!("{}/img/new.png", mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/ja/items/123"))
        .respond_with(ResponseTemplate::new(200).set_body_string(item_page("T", Some(&new_image))))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/new.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let item = make_item(&temp_dir, "[123] Thing");
    let old = meta_with("https://img.example/old.jpg", ".thumbnail_cache/booth.jpg", "2020-01-01T00:00:00Z");
    seed_cache(&item, "booth.jpg", &[1], &old);

    let result = tokio::task::spawn_blocking({
        let (base, item) = (mock_server.uri(), item.clone());
        move || run_refresh(base, item, HOUR, false)
    })
    .await
    .unwrap();

    assert_eq!(result.outcome, ThumbnailOutcome::StaleFallback);
    assert_eq!(result.thumbnail.as_deref(), Some(".thumbnail_cache/booth.jpg"));
    assert_eq!(result.meta, Some(old.clone()));
    assert_eq!(ThumbnailCache::new(&item).read_meta(), Some(old));
    assert!(item.join(".thumbnail_cache/booth.jpg").exists());
    assert!(!item.join(".thumbnail_cache/booth.png").exists());
}

#[tokio::test]
async fn extension_change_replaces_stale_file() {
    let mock_server = MockServer::start().await;
    let new_image = format!("{}/img/new.webp", mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/ja/items/123"))
        .respond_with(ResponseTemplate::new(200).set_body_string(item_page("T", Some(&new_image))))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/new.webp"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![4, 4]))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let item = make_item(&temp_dir, "[123] Thing");
    let old = meta_with("https://img.example/old.jpg", ".thumbnail_cache/booth.jpg", "2020-01-01T00:00:00Z");
    seed_cache(&item, "booth.jpg", &[1], &old);

    let result = tokio::task::spawn_blocking({
        let (base, item) = (mock_server.uri(), item.clone());
        move || run_refresh(base, item, HOUR, false)
    })
    .await
    .unwrap();

    assert_eq!(result.outcome, ThumbnailOutcome::Downloaded);
    assert_eq!(result.thumbnail.as_deref(), Some(".thumbnail_cache/booth.webp"));
    assert!(!item.join(".thumbnail_cache/booth.jpg").exists());
    assert_eq!(fs::read(item.join(".thumbnail_cache/booth.webp")).unwrap(), vec![4, 4]);
}

#[tokio::test]
async fn page_without_image_keeps_existing_thumbnail() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ja/items/123"))
        .respond_with(ResponseTemplate::new(200).set_body_string(item_page("Title Only", None)))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let item = make_item(&temp_dir, "[123] Thing");
    let old = meta_with("https://img.example/old.png", ".thumbnail_cache/booth.png", "2020-01-01T00:00:00Z");
    seed_cache(&item, "booth.png", &[3], &old);

    let result = tokio::task::spawn_blocking({
        let (base, item) = (mock_server.uri(), item.clone());
        move || run_refresh(base, item, HOUR, false)
    })
    .await
    .unwrap();

    assert_eq!(result.outcome, ThumbnailOutcome::MetaOnly);
    assert_eq!(result.thumbnail.as_deref(), Some(".thumbnail_cache/booth.png"));
    let meta = ThumbnailCache::new(&item).read_meta().unwrap();
    assert_eq!(meta.official_title, "Title Only");
    assert_eq!(meta.og_image_url, "");
    assert_eq!(meta.image_rel, ".thumbnail_cache/booth.png");
    assert_eq!(fs::read(item.join(".thumbnail_cache/booth.png")).unwrap(), vec![3]);
}

#[tokio::test]
async fn force_refresh_bypasses_fresh_cache() {
    let mock_server = MockServer::start().await;
    let image_url = format!("{}/img/cover.jpg", mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/ja/items/123"))
        .respond_with(ResponseTemplate::new(200).set_body_string(item_page("T", Some(&image_url))))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/cover.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![8]))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let item = make_item(&temp_dir, "[123] Thing");
    let cached = meta_with(&image_url, ".thumbnail_cache/booth.jpg", &utc_timestamp());
    seed_cache(&item, "booth.jpg", &[1], &cached);

    let result = tokio::task::spawn_blocking({
        let (base, item) = (mock_server.uri(), item.clone());
        move || run_refresh(base, item, HOUR, true)
    })
    .await
    .unwrap();

    assert_eq!(result.outcome, ThumbnailOutcome::Downloaded);
    assert_eq!(request_count(&mock_server).await, 2);
    assert_eq!(fs::read(item.join(".thumbnail_cache/booth.jpg")).unwrap(), vec![8]);
}

#[tokio::test]
async fn folder_without_product_id_is_absent() {
    let mock_server = MockServer::start().await;

    let temp_dir = TempDir::new().unwrap();
    let item = make_item(&temp_dir, "Loose Folder");

    let result = tokio::task::spawn_blocking({
        let (base, item) = (mock_server.uri(), item.clone());
        move || run_refresh(base, item, HOUR, false)
    })
    .await
    .unwrap();

    assert_eq!(result.outcome, ThumbnailOutcome::Absent);
    assert_eq!(request_count(&mock_server).await, 0);
    assert!(!item.join(CACHE_DIR_NAME).exists());
}
