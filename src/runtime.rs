//! Terminal host: one event loop on the main thread that owns the session.
//! Engine callbacks, keyboard commands and Ctrl-C all arrive as messages on
//! a single channel; the loop also drives the controller's timer.

use crate::playback::{PlaybackIssue, ScrollTarget, SpeechEngine, SpeechEvent};
use crate::session::ChapterSession;
use anyhow::{Context, Result};
use std::cell::RefCell;
use std::io::{self, BufRead};
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const TICK_INTERVAL: Duration = Duration::from_millis(50);
const RATE_STEP: f32 = 0.1;

pub const HELP: &str =
    "keys: p play/pause, s stop, j N jump to paragraph N, n/b next/previous chapter, +/- rate, i status, q quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Toggle,
    Stop,
    /// Zero-based paragraph index.
    Jump(usize),
    NextChapter,
    PrevChapter,
    Faster,
    Slower,
    Status,
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    Speech(SpeechEvent),
    Command(Command),
}

/// Parse one line of keyboard input. Paragraph numbers are one-based.
pub fn parse_command(line: &str) -> Option<Command> {
    let mut parts = line.split_whitespace();
    let command = match parts.next()? {
        "p" | "space" => Command::Toggle,
        "s" => Command::Stop,
        "j" => {
            let number: usize = parts.next()?.parse().ok()?;
            Command::Jump(number.checked_sub(1)?)
        }
        "n" => Command::NextChapter,
        "b" => Command::PrevChapter,
        "+" => Command::Faster,
        "-" => Command::Slower,
        "i" => Command::Status,
        "q" => Command::Quit,
        _ => return None,
    };
    Some(command)
}

/// Read commands from stdin on a background thread. End of input quits.
pub fn spawn_input(tx: Sender<HostEvent>) -> Result<()> {
    thread::Builder::new()
        .name("stdin-commands".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_command(&line) {
                    Some(command) => {
                        if tx.send(HostEvent::Command(command)).is_err() {
                            return;
                        }
                    }
                    None => println!("{HELP}"),
                }
            }
            let _ = tx.send(HostEvent::Command(Command::Quit));
        })
        .context("Spawning stdin reader")?;
    Ok(())
}

pub fn install_interrupt(tx: Sender<HostEvent>) -> Result<()> {
    ctrlc::set_handler(move || {
        let _ = tx.send(HostEvent::Command(Command::Quit));
    })
    .context("Installing Ctrl-C handler")
}

/// Prints each paragraph as narration reaches it.
#[derive(Default)]
struct TerminalView {
    paragraphs: Rc<RefCell<Vec<String>>>,
}

impl ScrollTarget for TerminalView {
    fn bring_into_view(&mut self, paragraph: usize, _centered: bool) {
        let paragraphs = self.paragraphs.borrow();
        if let Some(text) = paragraphs.get(paragraph) {
            println!("\n[{}/{}] {text}", paragraph + 1, paragraphs.len());
        }
    }
}

pub fn run<E: SpeechEngine>(session: &mut ChapterSession<E>, events: Receiver<HostEvent>) {
    let view = TerminalView::default();
    let paragraphs = Rc::clone(&view.paragraphs);
    session.controller_mut().set_scroll_target(Box::new(view));
    show_chapter(session, &paragraphs);

    loop {
        match events.recv_timeout(TICK_INTERVAL) {
            Ok(HostEvent::Speech(event)) => session.controller_mut().on_engine_event(event),
            Ok(HostEvent::Command(Command::Quit)) => {
                info!("Quit requested");
                break;
            }
            Ok(HostEvent::Command(command)) => {
                if apply(session, command) {
                    show_chapter(session, &paragraphs);
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        session.controller_mut().tick(Instant::now());
        session.sync_bookmark();
    }

    session.close();
}

/// Returns `true` when the chapter changed.
fn apply<E: SpeechEngine>(session: &mut ChapterSession<E>, command: Command) -> bool {
    debug!(?command, "Handling command");
    let controller = session.controller_mut();
    match command {
        Command::Toggle => controller.toggle(),
        Command::Stop => controller.stop(),
        Command::Jump(paragraph) => controller.jump_to(paragraph),
        Command::Faster | Command::Slower => {
            let delta = if command == Command::Faster {
                RATE_STEP
            } else {
                -RATE_STEP
            };
            controller.update_settings(|settings| settings.rate += delta);
            println!("rate {:.1}", controller.settings().rate);
        }
        Command::Status => {
            println!(
                "{:?} paragraph {}/{} rate {:.1}",
                controller.state(),
                controller
                    .highlighted_paragraph()
                    .unwrap_or_else(|| controller.cursor())
                    + 1,
                controller.paragraph_count(),
                controller.settings().rate,
            );
            match controller.last_issue() {
                Some(PlaybackIssue::EngineUnavailable) => {
                    println!("no voice available; check [tts] models in the config")
                }
                Some(issue) => println!("last issue: {issue}"),
                None => {}
            }
            let adjacent = session.adjacent();
            println!(
                "previous chapter {:?}, next chapter {:?}",
                adjacent.prev, adjacent.next
            );
        }
        Command::NextChapter | Command::PrevChapter => {
            let moved = if command == Command::NextChapter {
                session.next_chapter()
            } else {
                session.prev_chapter()
            };
            return match moved {
                Ok(moved) => {
                    if !moved {
                        println!("no further chapter in that direction");
                    }
                    moved
                }
                Err(err) => {
                    warn!("Chapter navigation failed: {err:#}");
                    false
                }
            };
        }
        Command::Quit => {}
    }
    false
}

fn show_chapter<E: SpeechEngine>(session: &ChapterSession<E>, view: &Rc<RefCell<Vec<String>>>) {
    let Some(chapter) = session.chapter() else {
        return;
    };
    *view.borrow_mut() = chapter.paragraphs.clone();
    println!(
        "\n== {} (chapter {}, {} paragraphs) ==",
        chapter.title,
        chapter.number,
        chapter.paragraphs.len()
    );
}

/// Channel shared by every producer of host events.
pub fn channel() -> (Sender<HostEvent>, Receiver<HostEvent>) {
    mpsc::channel()
}
