//! Contracts for the speech backend and the view being narrated.

/// Identifies one submitted chunk. `session` changes on every start, jump or
/// stop, so events tagged with an older session are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UtteranceId {
    pub session: u64,
    pub paragraph: usize,
    pub chunk: usize,
}

/// One unit of text handed to a [`SpeechEngine`].
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub id: UtteranceId,
    pub text: String,
    /// `None` means the engine default voice.
    pub voice: Option<String>,
    pub rate: f32,
    pub pitch: f32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEventKind {
    Start,
    End,
    Pause,
    Resume,
    Error(String),
}

/// Lifecycle notification emitted by an engine for a specific utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechEvent {
    pub utterance: UtteranceId,
    pub kind: SpeechEventKind,
}

impl SpeechEvent {
    pub fn new(utterance: UtteranceId, kind: SpeechEventKind) -> Self {
        Self { utterance, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceDescriptor {
    pub id: String,
    pub name: String,
    /// BCP 47 style tag, `en-US` and `en_US` are both accepted.
    pub lang: String,
    pub is_default: bool,
}

/// A speech backend with at most one active utterance.
///
/// Calls never block on synthesis. Progress is reported asynchronously as
/// [`SpeechEvent`]s which the host feeds back into the controller. After
/// `cancel` the engine must not emit further events for the cancelled
/// utterance.
pub trait SpeechEngine {
    fn is_available(&self) -> bool {
        true
    }

    /// Whether `resume` continues mid-utterance. When false the controller
    /// re-submits the paused chunk instead.
    fn supports_resume(&self) -> bool {
        true
    }

    fn speak(&mut self, utterance: Utterance);
    fn cancel(&mut self);
    fn pause(&mut self);
    fn resume(&mut self);
    fn voices(&self) -> Vec<VoiceDescriptor>;
}

/// The view that shows the chapter; asked to reveal the spoken paragraph.
pub trait ScrollTarget {
    fn bring_into_view(&mut self, paragraph: usize, centered: bool);
}
