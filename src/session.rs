//! Chapter-level lifecycle around the playback controller: which chapter is
//! loaded, how to reach its neighbours, and where the listener left off.

use crate::cache::{self, Bookmark};
use crate::content::{Adjacent, Chapter, ContentStore, NovelKey};
use crate::playback::{PlaybackController, SpeechEngine};
use anyhow::{Context, Result, anyhow};
use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::{info, warn};

pub struct ChapterSession<E: SpeechEngine> {
    store: Box<dyn ContentStore>,
    controller: PlaybackController<E>,
    cache_root: PathBuf,
    current: Option<Chapter>,
    adjacent: Adjacent,
    entered: Rc<Cell<Option<usize>>>,
}

impl<E: SpeechEngine> ChapterSession<E> {
    pub fn new(
        store: Box<dyn ContentStore>,
        mut controller: PlaybackController<E>,
        cache_root: impl Into<PathBuf>,
    ) -> Self {
        let entered = Rc::new(Cell::new(None));
        let sink = Rc::clone(&entered);
        controller.set_paragraph_listener(move |paragraph| sink.set(Some(paragraph)));
        Self {
            store,
            controller,
            cache_root: cache_root.into(),
            current: None,
            adjacent: Adjacent::default(),
            entered,
        }
    }

    pub fn controller(&self) -> &PlaybackController<E> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut PlaybackController<E> {
        &mut self.controller
    }

    pub fn chapter(&self) -> Option<&Chapter> {
        self.current.as_ref()
    }

    pub fn adjacent(&self) -> Adjacent {
        self.adjacent
    }

    /// Open a chapter of `novel`. Without an explicit number the saved
    /// bookmark is used, then the first chapter. The cursor is placed at the
    /// bookmarked paragraph when the bookmark points into this chapter.
    pub fn open(&mut self, novel: &NovelKey, number: Option<u32>) -> Result<()> {
        self.close();
        let bookmark = cache::load_bookmark(&self.cache_root, novel);
        let number = match number {
            Some(number) => number,
            None => {
                let chapters = self.store.chapters(novel)?;
                let first = chapters
                    .first()
                    .copied()
                    .ok_or_else(|| anyhow!("{novel} has no chapters"))?;
                match bookmark {
                    Some(saved) if chapters.contains(&saved.chapter) => saved.chapter,
                    Some(saved) => {
                        warn!(
                            novel = %novel,
                            chapter = saved.chapter,
                            fallback = first,
                            "Bookmarked chapter no longer exists"
                        );
                        first
                    }
                    None => first,
                }
            }
        };
        let cursor = bookmark
            .filter(|b| b.chapter == number)
            .map(|b| b.paragraph);
        self.load(novel, number, cursor)
    }

    /// Move to the following chapter, continuing playback if it was running.
    /// Returns `false` at the last chapter.
    pub fn next_chapter(&mut self) -> Result<bool> {
        self.step(self.adjacent.next)
    }

    pub fn prev_chapter(&mut self) -> Result<bool> {
        self.step(self.adjacent.prev)
    }

    /// Persist the paragraph most recently reached, if it changed.
    pub fn sync_bookmark(&mut self) {
        if let Some(paragraph) = self.entered.take() {
            self.save(paragraph);
        }
    }

    /// Record the current position and unload the chapter.
    pub fn close(&mut self) {
        if self.current.is_none() {
            return;
        }
        self.entered.set(None);
        let paragraph = self
            .controller
            .highlighted_paragraph()
            .unwrap_or_else(|| self.controller.cursor());
        self.save(paragraph);
        self.controller.reset();
        self.current = None;
    }

    fn step(&mut self, target: Option<u32>) -> Result<bool> {
        let (Some(number), Some(chapter)) = (target, self.current.as_ref()) else {
            return Ok(false);
        };
        let novel = chapter.novel.clone();
        let was_playing = self.controller.is_playing();
        self.close();
        self.load(&novel, number, None)?;
        if was_playing && self.controller.paragraph_count() > 0 {
            self.controller.start(0);
        }
        Ok(true)
    }

    fn load(&mut self, novel: &NovelKey, number: u32, cursor: Option<usize>) -> Result<()> {
        let chapter = self
            .store
            .chapter(novel, number)
            .with_context(|| format!("Opening chapter {number} of {novel}"))?;
        let adjacent = self.store.adjacent(novel, number)?;
        info!(
            novel = %novel,
            number,
            title = %chapter.title,
            prev = ?adjacent.prev,
            next = ?adjacent.next,
            "Opened chapter"
        );
        self.controller.load(chapter.paragraphs.clone());
        if let Some(paragraph) = cursor {
            self.controller.set_cursor(paragraph);
        }
        self.entered.set(None);
        self.current = Some(chapter);
        self.adjacent = adjacent;
        Ok(())
    }

    fn save(&self, paragraph: usize) {
        if let Some(chapter) = &self.current {
            cache::save_bookmark(
                &self.cache_root,
                &chapter.novel,
                Bookmark {
                    chapter: chapter.number,
                    paragraph,
                },
            );
        }
    }
}
