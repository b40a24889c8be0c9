//! Chapter text sources.
//!
//! A store hands out immutable chapters (ordered, cleaned paragraphs) and
//! sibling pointers for navigation. Stores are read-only; nothing here
//! writes back to the library.

mod directory;
mod epub;
mod paragraphs;

pub use directory::DirectoryStore;
pub use epub::EpubStore;
pub use paragraphs::split_paragraphs;

use anyhow::Result;
use std::path::Path;

/// Identifies a novel inside a store: a directory name or an EPUB path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NovelKey(pub String);

impl NovelKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NovelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub novel: NovelKey,
    pub number: u32,
    pub title: String,
    pub paragraphs: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Adjacent {
    pub prev: Option<u32>,
    pub next: Option<u32>,
}

impl Adjacent {
    /// Neighbours of `number` within a sorted list of chapter numbers.
    pub fn within(numbers: &[u32], number: u32) -> Self {
        let pos = numbers.partition_point(|n| *n < number);
        let prev = pos.checked_sub(1).map(|idx| numbers[idx]);
        let next_pos = if numbers.get(pos) == Some(&number) {
            pos + 1
        } else {
            pos
        };
        Self {
            prev,
            next: numbers.get(next_pos).copied(),
        }
    }
}

pub trait ContentStore {
    fn chapter(&self, novel: &NovelKey, number: u32) -> Result<Chapter>;
    fn adjacent(&self, novel: &NovelKey, number: u32) -> Result<Adjacent>;
    /// Sorted chapter numbers available for `novel`.
    fn chapters(&self, novel: &NovelKey) -> Result<Vec<u32>>;
}

/// EPUB files are read directly; anything else is looked up under the
/// library root.
pub fn open_store(library_root: &Path, novel: &str) -> Box<dyn ContentStore> {
    if Path::new(novel)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("epub"))
    {
        Box::new(EpubStore::new())
    } else {
        Box::new(DirectoryStore::new(library_root))
    }
}
