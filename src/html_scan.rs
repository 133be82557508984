//! Minimal tag scanning over raw HTML
//!
//! Only `<meta>` and `<a>` tags are looked at. This is a regex-driven scan of
//! start tags, not a document parse; malformed markup simply yields fewer
//! matches.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

lazy_static! {
    // Start-tag attributes may hold `>` inside quoted values
    static ref META_TAG: Regex = Regex::new(r#"(?is)<meta\b((?:[^>"']|"[^"]*"|'[^']*')*)>"#).unwrap();
    static ref ANCHOR: Regex =
        Regex::new(r#"(?is)<a\b((?:[^>"']|"[^"]*"|'[^']*')*)>(.*?)</a\s*>"#).unwrap();
    static ref ATTRIBUTE: Regex =
        Regex::new(r#"(?s)([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#)
            .unwrap();
    static ref ENTITY: Regex = Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[A-Za-z]+);").unwrap();
}

/// Parses the attribute section of a start tag into lowercase-name → unescaped value
pub fn parse_attributes(raw: &str) -> HashMap<String, String> {
    ATTRIBUTE
        .captures_iter(raw)
        .map(|caps| {
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| m.as_str())
                .unwrap_or("");
            (caps[1].to_ascii_lowercase(), unescape(value))
        })
        .collect()
}

/// Returns the `content` of the first `<meta property=...>` tag for each wanted property.
///
/// Scanning stops as soon as every wanted property has been seen.
pub fn meta_properties(html: &str, wanted: &[&str]) -> HashMap<String, String> {
    let mut found = HashMap::new();
    for caps in META_TAG.captures_iter(html) {
        let attrs = parse_attributes(&caps[1]);
        let Some(property) = attrs.get("property") else {
            continue;
        };
        if !wanted.contains(&property.as_str()) || found.contains_key(property) {
            continue;
        }
        if let Some(content) = attrs.get("content") {
            found.insert(property.clone(), content.clone());
        }
        if found.len() == wanted.len() {
            break;
        }
    }
    found
}

/// An `<a href=...>` tag together with the markup it encloses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub href: String,
    pub inner: String,
}

/// All anchors carrying a non-empty `href`, in document order
pub fn anchors(html: &str) -> Vec<Anchor> {
    ANCHOR
        .captures_iter(html)
        .filter_map(|caps| {
            let attrs = parse_attributes(&caps[1]);
            let href = attrs.get("href")?.trim().to_string();
            if href.is_empty() {
                return None;
            }
            Some(Anchor {
                href,
                inner: caps[2].to_string(),
            })
        })
        .collect()
}

/// Decodes the handful of character references that show up in attribute values
pub fn unescape(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    ENTITY
        .replace_all(value, |caps: &regex::Captures| {
            let entity = &caps[1];
            let decoded = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ if entity.starts_with("#x") || entity.starts_with("#X") => {
                    u32::from_str_radix(&entity[2..], 16).ok().and_then(char::from_u32)
                }
                _ if entity.starts_with('#') => {
                    entity[1..].parse::<u32>().ok().and_then(char::from_u32)
                }
                _ => None,
            };
            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
