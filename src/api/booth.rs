//! Public item page fetcher
//!
//! Only two kinds of GET ever leave this module: the public item page for a
//! product id, and the image its `og:image` points to. Account-scoped hosts are
//! refused before any request is built.

use crate::error::{LibraryError, Result};
use crate::html_scan::meta_properties;
use crate::product_id::{build_public_item_url, item_url_with_base, PUBLIC_BASE_URL};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use std::time::Duration;

const USER_AGENT: &str = "BoothLibrary/0.1";

/// Hosts that require a login; never contacted
const PROHIBITED_HOSTS: &[&str] = &["accounts.booth.pm", "manage.booth.pm"];

const OG_TITLE: &str = "og:title";
const OG_IMAGE: &str = "og:image";

/// Title and image URL declared by a public item page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicItemMeta {
    /// Canonical public URL of the item
    pub product_url: String,
    pub official_title: Option<String>,
    pub og_image_url: Option<String>,
}

/// Raw image bytes plus the response content type
#[derive(Debug, Clone)]
pub struct DownloadedImage {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Blocking HTTP client shared by a whole scan
pub struct BoothClient {
    http: Client,
    base_url: String,
}

impl BoothClient {
    /// Client for the public shop with the given per-request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_base_url(PUBLIC_BASE_URL, timeout)
    }

    /// Client against another base URL (used to point tests at a mock server)
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self> {
        ensure_public_url(base_url)?;
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Item page URL this client actually requests
    pub fn item_page_url(&self, product_id: &str) -> String {
        item_url_with_base(&self.base_url, product_id)
    }

    /// Fetches title and image URL for a product.
    ///
    /// Network failures, non-success statuses and pages declaring neither
    /// attribute all yield `None`.
    pub fn fetch_public_item_meta(&self, product_id: &str) -> Option<PublicItemMeta> {
        let html = match self.fetch_item_page(product_id) {
            Ok(html) => html,
            Err(e) => {
                log::debug!("Public page fetch failed for {}: {}", product_id, e);
                return None;
            }
        };

        let mut found = meta_properties(&html, &[OG_TITLE, OG_IMAGE]);
        let official_title = found
            .remove(OG_TITLE)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        let og_image_url = found
            .remove(OG_IMAGE)
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());

        if official_title.is_none() && og_image_url.is_none() {
            log::debug!("No og:title/og:image on public page for {}", product_id);
            return None;
        }

        Some(PublicItemMeta {
            product_url: build_public_item_url(product_id),
            official_title,
            og_image_url,
        })
    }

    fn fetch_item_page(&self, product_id: &str) -> Result<String> {
        let url = ensure_public_url(&self.item_page_url(product_id))?;
        log::debug!("Fetching public item page: {}", url);

        let response = self
            .http
            .get(url)
            .header("User-Agent", USER_AGENT)
            .send()?;

        if response.status().is_success() {
            Ok(response.text()?)
        } else {
            Err(LibraryError::HttpStatus(response.status()))
        }
    }

    /// Downloads image bytes from a public URL
    pub fn download_image(&self, url: &str) -> Result<DownloadedImage> {
        let url = ensure_public_url(url)?;
        log::debug!("Fetching image: {}", url);

        let response = self
            .http
            .get(url)
            .header("User-Agent", USER_AGENT)
            .send()?;

        if !response.status().is_success() {
            return Err(LibraryError::HttpStatus(response.status()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let bytes = response.bytes()?.to_vec();

        Ok(DownloadedImage {
            bytes,
            content_type,
        })
    }
}

/// Parses a URL and rejects anything that is not plain http(s), or that targets
/// a login-only host. Other hosts pass so `og:image` may point at the image CDN.
pub fn ensure_public_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url.trim()).map_err(|_| LibraryError::InvalidUrl(url.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(LibraryError::InvalidUrl(url.to_string()));
    }
    let host = parsed
        .host_str()
        .ok_or_else(|| LibraryError::InvalidUrl(url.to_string()))?
        .to_ascii_lowercase();
    if PROHIBITED_HOSTS.contains(&host.as_str()) {
        return Err(LibraryError::ProhibitedHost(host));
    }
    Ok(parsed)
}

#[cfg(test)]
#[path = "booth_tests.rs"]
mod tests;
