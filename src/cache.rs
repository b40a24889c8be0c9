//! Small on-disk cache: the last narrated position per novel, and the
//! directory holding synthesized chunk audio.
//!
//! Per-novel files live under `<cache>/<sha256 of novel key>/` to avoid
//! filesystem issues with arbitrary keys. Bookmarks are tiny TOML files.

use crate::content::NovelKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub chapter: u32,
    pub paragraph: usize,
}

pub fn hash_dir(cache_root: &Path, novel: &NovelKey) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(novel.as_str().as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    cache_root.join(hash)
}

fn bookmark_path(cache_root: &Path, novel: &NovelKey) -> PathBuf {
    hash_dir(cache_root, novel).join("bookmark.toml")
}

/// Shared across novels: identical text at identical settings sounds the same.
pub fn tts_dir(cache_root: &Path) -> PathBuf {
    cache_root.join("tts")
}

pub fn load_bookmark(cache_root: &Path, novel: &NovelKey) -> Option<Bookmark> {
    let data = fs::read_to_string(bookmark_path(cache_root, novel)).ok()?;
    match toml::from_str(&data) {
        Ok(bookmark) => Some(bookmark),
        Err(err) => {
            warn!(novel = %novel, "Ignoring unreadable bookmark: {err}");
            None
        }
    }
}

/// Persist the position for a novel. Failures are logged and otherwise
/// ignored so playback is never interrupted by the cache.
pub fn save_bookmark(cache_root: &Path, novel: &NovelKey, bookmark: Bookmark) {
    let path = bookmark_path(cache_root, novel);
    if let Some(parent) = path.parent() {
        if let Err(err) = fs::create_dir_all(parent) {
            warn!(path = %parent.display(), "Failed to create cache dir: {err}");
            return;
        }
    }
    match toml::to_string(&bookmark) {
        Ok(contents) => {
            if let Err(err) = fs::write(&path, contents) {
                warn!(path = %path.display(), "Failed to write bookmark: {err}");
            } else {
                debug!(
                    novel = %novel,
                    chapter = bookmark.chapter,
                    paragraph = bookmark.paragraph,
                    "Saved bookmark"
                );
            }
        }
        Err(err) => warn!("Failed to serialize bookmark: {err}"),
    }
}
