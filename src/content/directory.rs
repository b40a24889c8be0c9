//! Plain-text library layout: `<root>/<novel>/<number>.txt`.

use super::{Adjacent, Chapter, ContentStore, NovelKey, split_paragraphs};
use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn novel_dir(&self, novel: &NovelKey) -> PathBuf {
        self.root.join(novel.as_str())
    }

    fn chapter_files(&self, novel: &NovelKey) -> Result<Vec<(u32, PathBuf)>> {
        let dir = self.novel_dir(novel);
        let entries = fs::read_dir(&dir)
            .with_context(|| format!("Failed to list chapters in {}", dir.display()))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry
                .with_context(|| format!("Failed to read entry in {}", dir.display()))?
                .path();
            if let Some(number) = chapter_number(&path) {
                files.push((number, path));
            }
        }
        files.sort_by_key(|(number, _)| *number);
        files.dedup_by_key(|(number, _)| *number);
        debug!(novel = %novel, chapters = files.len(), "Indexed chapter files");
        Ok(files)
    }
}

impl ContentStore for DirectoryStore {
    fn chapter(&self, novel: &NovelKey, number: u32) -> Result<Chapter> {
        let path = self
            .chapter_files(novel)?
            .into_iter()
            .find(|(n, _)| *n == number)
            .map(|(_, path)| path)
            .ok_or_else(|| anyhow!("Chapter {number} not found for {novel}"))?;

        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let (title, body) = split_title(&data, number);
        let paragraphs = split_paragraphs(body);
        info!(
            novel = %novel,
            number,
            paragraphs = paragraphs.len(),
            "Loaded chapter from directory"
        );
        Ok(Chapter {
            novel: novel.clone(),
            number,
            title,
            paragraphs,
        })
    }

    fn adjacent(&self, novel: &NovelKey, number: u32) -> Result<Adjacent> {
        Ok(Adjacent::within(&self.chapters(novel)?, number))
    }

    fn chapters(&self, novel: &NovelKey) -> Result<Vec<u32>> {
        Ok(self
            .chapter_files(novel)?
            .into_iter()
            .map(|(number, _)| number)
            .collect())
    }
}

fn chapter_number(path: &Path) -> Option<u32> {
    let is_txt = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));
    if !is_txt {
        return None;
    }
    path.file_stem()?.to_str()?.parse().ok()
}

/// A leading `# ` line names the chapter; otherwise it is "Chapter N".
fn split_title(data: &str, number: u32) -> (String, &str) {
    let trimmed = data.trim_start();
    if let Some(rest) = trimmed.strip_prefix("# ") {
        let (line, body) = rest.split_once('\n').unwrap_or((rest, ""));
        let title = line.trim();
        if !title.is_empty() {
            return (title.to_string(), body);
        }
    }
    (format!("Chapter {number}"), data)
}
