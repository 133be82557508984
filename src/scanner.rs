//! Two-level file classification for a single item folder
//!
//! Files directly inside the item folder and files inside each immediate
//! subfolder are classified by extension. Deeper nesting is never visited and
//! unknown extensions are dropped.

use crate::cache::CACHE_DIR_NAME;
use crate::models::{FileLists, FileStats};
use std::fs;
use std::path::Path;

const ARCHIVE_EXTS: &[&str] = &["zip", "unitypackage"];
const DOCUMENT_EXTS: &[&str] = &["pdf", "txt", "md"];
const SOURCE_EXTS: &[&str] = &["psd"];
const IMAGE_EXTS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// Kind of a file found under an item folder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Archive,
    Document,
    Source,
    Image,
}

impl FileKind {
    /// Classifies a file name by its (case-insensitive) extension
    pub fn from_name(name: &str) -> Option<Self> {
        let ext = Path::new(name)
            .extension()?
            .to_string_lossy()
            .to_lowercase();
        let ext = ext.as_str();
        if ARCHIVE_EXTS.contains(&ext) {
            Some(FileKind::Archive)
        } else if DOCUMENT_EXTS.contains(&ext) {
            Some(FileKind::Document)
        } else if SOURCE_EXTS.contains(&ext) {
            Some(FileKind::Source)
        } else if IMAGE_EXTS.contains(&ext) {
            Some(FileKind::Image)
        } else {
            None
        }
    }
}

/// Classified files of one item folder
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderScan {
    pub files: FileLists,
    pub images: Vec<String>,
}

impl FolderScan {
    pub fn stats(&self) -> FileStats {
        FileStats {
            archive_count: self.files.archives.len(),
            document_count: self.files.documents.len(),
            source_count: self.files.sources.len(),
            image_count: self.images.len(),
        }
    }

    fn push(&mut self, kind: FileKind, name: String) {
        match kind {
            FileKind::Archive => self.files.archives.push(name),
            FileKind::Document => self.files.documents.push(name),
            FileKind::Source => self.files.sources.push(name),
            FileKind::Image => self.images.push(name),
        }
    }
}

/// Scans the item folder itself plus each of its immediate subfolders.
///
/// The thumbnail cache directory is skipped so a cached image never shows up
/// as an item image. Unreadable directories contribute nothing.
pub fn scan_files_two_level(item_dir: &Path) -> FolderScan {
    let mut scan = FolderScan::default();
    scan_single_dir(item_dir, &mut scan);

    for sub in sorted_entries(item_dir) {
        let is_dir = sub.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if !is_dir || sub.file_name() == CACHE_DIR_NAME {
            continue;
        }
        scan_single_dir(&sub.path(), &mut scan);
    }

    scan
}

fn scan_single_dir(dir: &Path, scan: &mut FolderScan) {
    for entry in sorted_entries(dir) {
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        if !is_file {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some(kind) = FileKind::from_name(&name) {
            scan.push(kind, name);
        }
    }
}

/// Directory entries sorted by file name; empty when the directory can't be read
pub(crate) fn sorted_entries(dir: &Path) -> Vec<fs::DirEntry> {
    let read = match fs::read_dir(dir) {
        Ok(read) => read,
        Err(e) => {
            log::debug!("Skipping unreadable directory {}: {}", dir.display(), e);
            return Vec::new();
        }
    };
    let mut entries: Vec<fs::DirEntry> = read.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.file_name());
    entries
}
