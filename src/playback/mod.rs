//! Paragraph-by-paragraph speech playback for a single chapter.
//!
//! The controller owns the state machine; engines, wake locks and scroll
//! targets are reached through the traits in this module so the platform
//! backends can be swapped.

mod controller;
mod engine;
mod error;
mod state;
mod voice;
mod wake_lock;

pub use controller::PlaybackController;
pub use engine::{
    ScrollTarget, SpeechEngine, SpeechEvent, SpeechEventKind, Utterance, UtteranceId,
    VoiceDescriptor,
};
pub use error::PlaybackIssue;
pub use state::{PlaybackState, TtsSettings};
pub use wake_lock::{NoopWakeLock, system_wake_lock};
