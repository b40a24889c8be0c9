//! EPUB-backed store: each spine document with text is one chapter,
//! numbered from 1 in reading order.

use super::{Adjacent, Chapter, ContentStore, NovelKey, split_paragraphs};
use anyhow::{Context, Result, anyhow};
use epub::doc::EpubDoc;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;
use tracing::{debug, info, warn};

const MAX_TITLE_CHARS: usize = 80;

#[derive(Default)]
pub struct EpubStore {
    books: RefCell<HashMap<NovelKey, Rc<Vec<Chapter>>>>,
}

impl EpubStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn book(&self, novel: &NovelKey) -> Result<Rc<Vec<Chapter>>> {
        if let Some(book) = self.books.borrow().get(novel) {
            return Ok(Rc::clone(book));
        }
        let book = Rc::new(load_chapters(novel)?);
        self.books
            .borrow_mut()
            .insert(novel.clone(), Rc::clone(&book));
        Ok(book)
    }
}

impl ContentStore for EpubStore {
    fn chapter(&self, novel: &NovelKey, number: u32) -> Result<Chapter> {
        let book = self.book(novel)?;
        book.iter()
            .find(|chapter| chapter.number == number)
            .cloned()
            .ok_or_else(|| anyhow!("Chapter {number} not found in {novel}"))
    }

    fn adjacent(&self, novel: &NovelKey, number: u32) -> Result<Adjacent> {
        Ok(Adjacent::within(&self.chapters(novel)?, number))
    }

    fn chapters(&self, novel: &NovelKey) -> Result<Vec<u32>> {
        Ok(self.book(novel)?.iter().map(|c| c.number).collect())
    }
}

fn load_chapters(novel: &NovelKey) -> Result<Vec<Chapter>> {
    let path = Path::new(novel.as_str());
    info!(path = %path.display(), "Loading EPUB content");
    let mut doc =
        EpubDoc::new(path).with_context(|| format!("Failed to open EPUB at {}", path.display()))?;

    let mut chapters = Vec::new();
    let mut spine_idx = 0usize;
    loop {
        if let Some((html, _mime)) = doc.get_current_str() {
            spine_idx += 1;
            // Very wide lines so html2text does not bake in hard wraps.
            let plain = match html2text::from_read(html.as_bytes(), 10_000) {
                Ok(clean) => clean,
                Err(err) => {
                    warn!(spine_idx, "html2text failed: {err}");
                    html
                }
            };
            let paragraphs = split_paragraphs(&plain);
            if paragraphs.is_empty() {
                debug!(spine_idx, "Skipping spine item without text");
            } else {
                let number = chapters.len() as u32 + 1;
                chapters.push(Chapter {
                    novel: novel.clone(),
                    number,
                    title: title_from(&paragraphs[0], number),
                    paragraphs,
                });
            }
        }

        if !doc.go_next() {
            break;
        }
    }

    info!(chapters = chapters.len(), "Finished loading EPUB content");
    Ok(chapters)
}

fn title_from(first: &str, number: u32) -> String {
    let title = first.trim_start_matches('#').trim();
    if title.is_empty() {
        return format!("Chapter {number}");
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        let cut: String = title.chars().take(MAX_TITLE_CHARS).collect();
        return format!("{}…", cut.trim_end());
    }
    title.to_string()
}
