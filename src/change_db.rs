//! SQLite store flagging content changes per item id.
//!
//! Each upsert hashes `title|url|thumb_url`; a row is flagged `has_update`
//! when a re-upsert produces a different hash than the one stored. The flag is
//! never set on first insert and can be cleared independently of the row.

use crate::error::Result;
use crate::models::LibraryItem;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// One row of the change-detection store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeDetectionRecord {
    pub item_id: String,
    pub title: String,
    pub url: String,
    pub thumb_url: Option<String>,
    pub folder: String,
    /// Unix seconds of the last upsert
    pub last_seen_ts: i64,
    pub content_hash: String,
    pub has_update: bool,
}

impl ChangeDetectionRecord {
    /// `last_seen_ts` as a UTC timestamp
    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.last_seen_ts, 0)
    }
}

/// Statistics from syncing catalog items into the store
#[derive(Debug, Default)]
pub struct ChangeSyncStats {
    /// Items written to the store
    pub upserted: usize,
    /// Item ids whose content hash changed since the last sync
    pub updated: Vec<String>,
}

/// SHA-256 over `title|url|thumb_url`, hex encoded. A missing thumbnail hashes as empty.
pub fn compute_hash(title: &str, url: &str, thumb_url: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}|{}|{}", title, url, thumb_url.unwrap_or("")).as_bytes());
    hex::encode(hasher.finalize())
}

pub struct ChangeDetectionStore {
    conn: Connection,
}

impl ChangeDetectionStore {
    /// Default database file: `<data dir>/booth_library/changes.db`
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("booth_library")
            .join("changes.db")
    }

    /// Opens (or creates) the store and initialises the schema
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        log::info!("Change DB: {}", path.display());
        Self::from_connection(Connection::open(path)?)
    }

    /// In-memory store, mostly for tests
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Inserts or replaces the row for `item_id` and returns its `has_update` flag.
    pub fn upsert(&self, item_id: &str, title: &str, url: &str, thumb_url: Option<&str>, folder: &str) -> Result<bool> {
        self.upsert_at(item_id, title, url, thumb_url, folder, Utc::now().timestamp())
    }

    fn upsert_at(
        &self,
        item_id: &str,
        title: &str,
        url: &str,
        thumb_url: Option<&str>,
        folder: &str,
        now: i64,
    ) -> Result<bool> {
        upsert_row(&self.conn, item_id, title, url, thumb_url, folder, now)
    }

    /// Resets only the `has_update` flag of one row
    pub fn clear_update_flag(&self, item_id: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE items SET has_update = 0 WHERE item_id = ?1",
            params![item_id],
        )?;
        Ok(())
    }

    /// All rows, most recently seen first
    pub fn list_items(&self) -> Result<Vec<ChangeDetectionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT item_id, title, url, thumb_url, local_folder, last_seen_ts, content_hash, has_update
             FROM items ORDER BY last_seen_ts DESC, item_id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ChangeDetectionRecord {
                item_id: row.get(0)?,
                title: row.get(1)?,
                url: row.get(2)?,
                thumb_url: row.get(3)?,
                folder: row.get(4)?,
                last_seen_ts: row.get(5)?,
                content_hash: row.get(6)?,
                has_update: row.get(7)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Feeds every catalog item with a product id into the store.
    ///
    /// Title prefers the public page title over the folder name; the thumbnail
    /// is the cached image path, so a changed cover image flags the item.
    pub fn sync_catalog(&mut self, items: &[LibraryItem]) -> Result<ChangeSyncStats> {
        let tx = self.conn.transaction()?;
        let mut stats = ChangeSyncStats::default();
        let now = Utc::now().timestamp();
        for item in items {
            let Some(pid) = item.product_id.as_deref() else {
                continue;
            };
            let title = if item.official_title.is_empty() {
                &item.title
            } else {
                &item.official_title
            };
            let thumb = (!item.thumbnail.is_empty()).then_some(item.thumbnail.as_str());
            if upsert_row(&tx, pid, title, &item.product_url, thumb, &item.path, now)? {
                stats.updated.push(pid.to_string());
            }
            stats.upserted += 1;
        }
        tx.commit()?;
        log::info!(
            "Synced {} items into change DB ({} changed)",
            stats.upserted,
            stats.updated.len()
        );
        Ok(stats)
    }
}

fn upsert_row(
    conn: &Connection,
    item_id: &str,
    title: &str,
    url: &str,
    thumb_url: Option<&str>,
    folder: &str,
    now: i64,
) -> Result<bool> {
    let new_hash = compute_hash(title, url, thumb_url);

    let previous: Option<String> = conn
        .query_row(
            "SELECT content_hash FROM items WHERE item_id = ?1",
            params![item_id],
            |row| row.get(0),
        )
        .optional()?;
    let has_update = matches!(previous, Some(ref old) if *old != new_hash);

    // The row is always overwritten, whatever the flag
    conn.execute(
        "INSERT OR REPLACE INTO items
         (item_id, title, url, thumb_url, local_folder, last_seen_ts, content_hash, has_update)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![item_id, title, url, thumb_url, folder, now, new_hash, has_update],
    )?;

    if has_update {
        log::info!("Item {} changed since last seen", item_id);
    }
    Ok(has_update)
}

/// Creates the `items` table if it does not already exist.
fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS items (
            item_id       TEXT PRIMARY KEY,
            title         TEXT NOT NULL,
            url           TEXT NOT NULL,
            thumb_url     TEXT,
            local_folder  TEXT NOT NULL,
            last_seen_ts  INTEGER NOT NULL,
            content_hash  TEXT NOT NULL,
            has_update    INTEGER NOT NULL
        );",
    )
}
