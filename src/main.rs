//! Entry point for the terminal narrator.
//!
//! Responsibilities here are intentionally minimal:
//! - Parse command-line arguments.
//! - Load user configuration from `conf/config.toml`.
//! - Wire the speech engine, wake lock and chapter store together.
//! - Hand control to the event loop in `runtime`.

mod cache;
mod config;
mod content;
mod playback;
mod runtime;
mod session;
mod text_utils;
mod tts;

use crate::config::{AppConfig, load_config, serialize_config};
use crate::content::{NovelKey, open_store};
use crate::playback::{PlaybackController, SpeechEngine, TtsSettings, system_wake_lock};
use crate::runtime::HostEvent;
use crate::session::ChapterSession;
use crate::tts::PiperEngine;
use anyhow::{Context, Result, anyhow};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

struct Args {
    novel: String,
    chapter: Option<u32>,
    paragraph: Option<usize>,
}

fn main() {
    let reload_handle = init_tracing();
    if let Err(err) = run(&reload_handle) {
        error!("{err:?}");
        std::process::exit(1);
    }
}

fn run(reload_handle: &ReloadHandle) -> Result<()> {
    let config = load_config(Path::new("conf/config.toml"));
    set_log_level(reload_handle, config.log_level.as_filter_str());
    if env::args().nth(1).as_deref() == Some("--print-config") {
        print!("{}", serialize_config(&config)?);
        return Ok(());
    }
    let args = parse_args()?;
    info!(
        novel = %args.novel,
        level = %config.log_level,
        "Starting narrator"
    );
    info!(
        models = ?config.tts_models,
        espeak = %config.tts_espeak_path,
        rate = config.tts_rate,
        pitch = config.tts_pitch,
        wake_lock = %config.wake_lock,
        "Active TTS configuration"
    );

    let (tx, rx) = runtime::channel();
    let engine = build_engine(&config, tx.clone())?;
    let controller = PlaybackController::new(
        engine,
        system_wake_lock(config.wake_lock),
        TtsSettings::from_config(&config),
    )
    .with_wake_lock_retry_delay(Duration::from_millis(config.wake_lock_retry_delay_ms));

    let library_root = PathBuf::from(&config.library_root);
    let store = open_store(&library_root, &args.novel);
    let mut session = ChapterSession::new(store, controller, &config.cache_dir);
    let novel = NovelKey::new(args.novel.as_str());
    session
        .open(&novel, args.chapter)
        .with_context(|| format!("Failed to open {novel}"))?;
    if let Some(paragraph) = args.paragraph {
        session.controller_mut().set_cursor(paragraph);
    }
    if !session.controller().engine().is_available() {
        warn!("No usable voice model found; playback requests will be ignored");
    }

    runtime::install_interrupt(tx.clone())?;
    runtime::spawn_input(tx)?;
    println!("{}", runtime::HELP);
    runtime::run(&mut session, rx);
    info!("Narrator stopped");
    Ok(())
}

fn build_engine(config: &AppConfig, tx: std::sync::mpsc::Sender<HostEvent>) -> Result<PiperEngine> {
    let models: Vec<PathBuf> = config.tts_models.iter().map(PathBuf::from).collect();
    let cache_root = cache::tts_dir(Path::new(&config.cache_dir));
    PiperEngine::new(
        &models,
        PathBuf::from(&config.tts_espeak_path),
        cache_root,
        config.tts_volume,
        Box::new(move |event| {
            let _ = tx.send(HostEvent::Speech(event));
        }),
    )
    .context("Failed to start the speech engine")
}

fn parse_args() -> Result<Args> {
    const USAGE: &str = "Usage: novel-narrator <novel-or-epub> [chapter] [paragraph] | --print-config";
    let mut args = env::args().skip(1);
    let novel = args.next().ok_or_else(|| anyhow!(USAGE))?;
    let chapter = args
        .next()
        .map(|raw| raw.parse::<u32>())
        .transpose()
        .map_err(|err| anyhow!("Invalid chapter number: {err}. {USAGE}"))?;
    let paragraph = args
        .next()
        .map(|raw| raw.parse::<usize>())
        .transpose()
        .map_err(|err| anyhow!("Invalid paragraph number: {err}. {USAGE}"))?
        .map(|n| n.saturating_sub(1));

    if novel.to_ascii_lowercase().ends_with(".epub") && !Path::new(&novel).exists() {
        return Err(anyhow!("File not found: {novel}"));
    }
    Ok(Args {
        novel,
        chapter,
        paragraph,
    })
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(filter_layer),
        )
        .init();
    warn!("Logging initialized; override level with config.log_level or RUST_LOG");
    handle
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("debug"));
    if let Err(err) = handle.modify(|filter| *filter = parsed.clone()) {
        warn!(%level, "Failed to update log level from config: {err}");
    } else {
        info!(%level, "Applied log level from config");
    }
}
