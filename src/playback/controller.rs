//! Text-to-speech playback state machine.
//!
//! Every transition is driven either by a transport command (`start`,
//! `pause`, `resume`, `stop`, `jump_to`) or by a [`SpeechEvent`] that the host
//! forwards from the engine. Each submitted chunk carries the current session
//! token; events from an older session, or for a chunk that is no longer in
//! flight, are dropped.

use super::engine::{ScrollTarget, SpeechEngine, SpeechEvent, SpeechEventKind, Utterance, UtteranceId};
use super::error::PlaybackIssue;
use super::state::{PlaybackState, TtsSettings};
use super::voice::select_voice;
use super::wake_lock::{WakeLock, WakeLockHandle};
use crate::text_utils::split_into_chunks;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_WAKE_LOCK_RETRY_DELAY: Duration = Duration::from_millis(1500);

type ParagraphListener = Box<dyn FnMut(usize)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InFlight {
    id: UtteranceId,
    started: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WakeRetry {
    None,
    Scheduled(Instant),
    Exhausted,
}

pub struct PlaybackController<E: SpeechEngine> {
    engine: E,
    wake_lock: Box<dyn WakeLock>,
    wake_handle: Option<Box<dyn WakeLockHandle>>,
    wake_retry: WakeRetry,
    wake_retry_delay: Duration,
    settings: TtsSettings,
    paragraphs: Vec<String>,
    state: PlaybackState,
    cursor: usize,
    session: u64,
    in_flight: Option<InFlight>,
    chunks: Vec<String>,
    announced: Option<usize>,
    pause_requested: bool,
    last_issue: Option<PlaybackIssue>,
    on_paragraph_change: Option<ParagraphListener>,
    scroll_target: Option<Box<dyn ScrollTarget>>,
}

impl<E: SpeechEngine> PlaybackController<E> {
    pub fn new(engine: E, wake_lock: Box<dyn WakeLock>, settings: TtsSettings) -> Self {
        Self {
            engine,
            wake_lock,
            wake_handle: None,
            wake_retry: WakeRetry::None,
            wake_retry_delay: DEFAULT_WAKE_LOCK_RETRY_DELAY,
            settings: settings.clamped(),
            paragraphs: Vec::new(),
            state: PlaybackState::Idle,
            cursor: 0,
            session: 0,
            in_flight: None,
            chunks: Vec::new(),
            announced: None,
            pause_requested: false,
            last_issue: None,
            on_paragraph_change: None,
            scroll_target: None,
        }
    }

    pub fn with_wake_lock_retry_delay(mut self, delay: Duration) -> Self {
        self.wake_retry_delay = delay;
        self
    }

    pub fn set_paragraph_listener(&mut self, listener: impl FnMut(usize) + 'static) {
        self.on_paragraph_change = Some(Box::new(listener));
    }

    pub fn set_scroll_target(&mut self, target: Box<dyn ScrollTarget>) {
        self.scroll_target = Some(target);
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Paragraph to highlight, if any.
    pub fn highlighted_paragraph(&self) -> Option<usize> {
        self.state.paragraph()
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_speaking() || (self.in_flight.is_some() && !self.state.is_paused())
    }

    pub fn last_issue(&self) -> Option<&PlaybackIssue> {
        self.last_issue.as_ref()
    }

    pub fn settings(&self) -> &TtsSettings {
        &self.settings
    }

    /// Mutate settings in place. Rate, pitch and voice apply from the next
    /// submitted chunk.
    pub fn update_settings(&mut self, apply: impl FnOnce(&mut TtsSettings)) {
        apply(&mut self.settings);
        self.settings = self.settings.clone().clamped();
        debug!(
            rate = self.settings.rate,
            pitch = self.settings.pitch,
            voice = ?self.settings.voice,
            "Updated speech settings"
        );
    }

    pub fn paragraph_count(&self) -> usize {
        self.paragraphs.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Replace the chapter being narrated. Any playback of the previous
    /// chapter is stopped first.
    pub fn load(&mut self, paragraphs: Vec<String>) {
        self.stop();
        info!(paragraphs = paragraphs.len(), "Loaded chapter for playback");
        self.paragraphs = paragraphs;
        self.last_issue = None;
    }

    /// Stop playback and forget the chapter.
    pub fn reset(&mut self) {
        self.stop();
        self.paragraphs.clear();
    }

    /// Choose where `toggle` starts from while idle.
    pub fn set_cursor(&mut self, paragraph: usize) {
        if paragraph < self.paragraphs.len() && self.state == PlaybackState::Idle {
            self.cursor = paragraph;
        }
    }

    pub fn start(&mut self, paragraph: usize) {
        if !self.validate(paragraph) {
            return;
        }
        info!(paragraph, "Starting playback");
        self.begin(paragraph);
    }

    /// Restart from another paragraph without passing through `Idle`. The
    /// current highlight stays until the new paragraph starts speaking.
    pub fn jump_to(&mut self, paragraph: usize) {
        if !self.validate(paragraph) {
            return;
        }
        info!(
            paragraph,
            from = ?self.state.paragraph(),
            "Jumping to paragraph"
        );
        self.begin(paragraph);
    }

    pub fn pause(&mut self) {
        if !self.state.is_speaking() || self.in_flight.is_none() {
            debug!(state = ?self.state, "Pause ignored; not speaking");
            return;
        }
        info!(paragraph = ?self.state.paragraph(), "Pausing playback");
        self.pause_requested = true;
        self.engine.pause();
    }

    pub fn resume(&mut self) {
        let PlaybackState::Paused { paragraph, chunk } = self.state else {
            debug!(state = ?self.state, "Resume ignored; not paused");
            return;
        };
        info!(paragraph, chunk, "Resuming playback");
        self.ensure_wake_lock();
        let resumable = self.in_flight.is_some_and(|in_flight| in_flight.started);
        if self.engine.supports_resume() && resumable {
            self.engine.resume();
        } else {
            self.engine.cancel();
            self.session = self.session.wrapping_add(1);
            self.submit(paragraph, chunk);
        }
        self.state = PlaybackState::Speaking { paragraph, chunk };
    }

    /// Safe from any state. Events already queued for the stopped session are
    /// ignored when they arrive.
    pub fn stop(&mut self) {
        if self.state != PlaybackState::Idle || self.in_flight.is_some() {
            info!(paragraph = ?self.state.paragraph(), "Stopping playback");
        }
        self.engine.cancel();
        self.session = self.session.wrapping_add(1);
        self.in_flight = None;
        self.chunks.clear();
        self.announced = None;
        self.pause_requested = false;
        self.state = PlaybackState::Idle;
        self.cursor = 0;
        self.release_wake_lock();
    }

    /// Play/pause key: start from the cursor, pause, or resume.
    pub fn toggle(&mut self) {
        match self.state {
            PlaybackState::Speaking { .. } => self.pause(),
            PlaybackState::Paused { .. } => self.resume(),
            PlaybackState::Idle if self.in_flight.is_some() => self.stop(),
            PlaybackState::Idle => self.start(self.cursor),
        }
    }

    pub fn on_engine_event(&mut self, event: SpeechEvent) {
        let current = match self.in_flight {
            Some(in_flight) if in_flight.id == event.utterance => in_flight,
            _ => {
                debug!(
                    event = ?event.kind,
                    session = event.utterance.session,
                    current = self.session,
                    "Ignoring stale speech event"
                );
                return;
            }
        };
        let UtteranceId {
            paragraph, chunk, ..
        } = current.id;

        match event.kind {
            SpeechEventKind::Start => {
                self.in_flight = Some(InFlight {
                    started: true,
                    ..current
                });
                self.state = PlaybackState::Speaking { paragraph, chunk };
                if self.announced != Some(paragraph) {
                    self.announced = Some(paragraph);
                    self.cursor = paragraph;
                    self.notify_paragraph(paragraph);
                }
            }
            SpeechEventKind::End => {
                self.in_flight = None;
                if self.pause_requested {
                    self.pause_between_chunks(paragraph, chunk);
                } else {
                    self.advance(paragraph, chunk);
                }
            }
            SpeechEventKind::Pause => {
                if self.pause_requested || self.state.is_speaking() {
                    self.pause_requested = false;
                    self.state = PlaybackState::Paused { paragraph, chunk };
                    self.release_wake_lock();
                    debug!(paragraph, chunk, "Engine paused");
                }
            }
            SpeechEventKind::Resume => {
                if !self.state.is_speaking() {
                    self.ensure_wake_lock();
                }
                self.state = PlaybackState::Speaking { paragraph, chunk };
            }
            SpeechEventKind::Error(message) => {
                warn!(paragraph, chunk, "Speech engine failed: {message}");
                self.stop();
                self.last_issue = Some(PlaybackIssue::EngineError(message));
            }
        }
    }

    /// Housekeeping for time-based work: the delayed wake-lock retry and
    /// reacquiring a lock the platform revoked.
    pub fn tick(&mut self, now: Instant) {
        if !self.is_playing() {
            return;
        }

        if let Some(handle) = self.wake_handle.as_mut() {
            if handle.is_active() {
                return;
            }
            if let Some(handle) = self.wake_handle.take() {
                handle.release();
            }
            if self.wake_retry == WakeRetry::Exhausted {
                warn!("Wake lock revoked again; continuing without it");
                self.last_issue = Some(PlaybackIssue::WakeLockDenied(
                    "wake lock revoked by the system".into(),
                ));
            } else {
                info!(
                    retry_in_ms = self.wake_retry_delay.as_millis() as u64,
                    "Wake lock revoked; scheduling reacquire"
                );
                self.wake_retry = WakeRetry::Scheduled(now + self.wake_retry_delay);
            }
            return;
        }

        if let WakeRetry::Scheduled(due) = self.wake_retry {
            if now >= due {
                self.wake_retry = WakeRetry::Exhausted;
                match self.wake_lock.acquire() {
                    Ok(handle) => {
                        info!("Wake lock acquired on retry");
                        self.wake_handle = Some(handle);
                    }
                    Err(err) => {
                        warn!("Wake lock retry failed; continuing without it: {err:#}");
                        self.last_issue = Some(PlaybackIssue::WakeLockDenied(err.to_string()));
                    }
                }
            }
        }
    }

    fn validate(&mut self, paragraph: usize) -> bool {
        if paragraph >= self.paragraphs.len() {
            warn!(
                paragraph,
                len = self.paragraphs.len(),
                "Rejected playback request for missing paragraph"
            );
            self.last_issue = Some(PlaybackIssue::InvalidIndex {
                index: paragraph,
                len: self.paragraphs.len(),
            });
            return false;
        }
        if !self.engine.is_available() {
            warn!("Speech engine unavailable; ignoring playback request");
            self.last_issue = Some(PlaybackIssue::EngineUnavailable);
            return false;
        }
        true
    }

    fn begin(&mut self, paragraph: usize) {
        self.engine.cancel();
        self.session = self.session.wrapping_add(1);
        self.in_flight = None;
        self.announced = None;
        self.pause_requested = false;
        self.last_issue = None;
        if self.state.is_paused() {
            self.state = PlaybackState::Idle;
        }
        self.ensure_wake_lock();
        self.enter_paragraph(paragraph);
    }

    fn enter_paragraph(&mut self, mut paragraph: usize) {
        loop {
            self.chunks = split_into_chunks(&self.paragraphs[paragraph], self.settings.chunk_max_chars);
            if !self.chunks.is_empty() {
                break;
            }
            debug!(paragraph, "Skipping paragraph without speakable text");
            if paragraph + 1 >= self.paragraphs.len() {
                self.finish();
                return;
            }
            paragraph += 1;
        }
        debug!(paragraph, chunks = self.chunks.len(), "Entering paragraph");
        self.submit(paragraph, 0);
    }

    fn advance(&mut self, paragraph: usize, chunk: usize) {
        match self.next_position(paragraph, chunk) {
            Some((paragraph, chunk)) => self.submit(paragraph, chunk),
            None => self.finish(),
        }
    }

    /// The chunk after `(paragraph, chunk)`, loading the chunks of the next
    /// speakable paragraph when the current one is done.
    fn next_position(&mut self, paragraph: usize, chunk: usize) -> Option<(usize, usize)> {
        if chunk + 1 < self.chunks.len() {
            return Some((paragraph, chunk + 1));
        }
        for next in paragraph + 1..self.paragraphs.len() {
            let chunks = split_into_chunks(&self.paragraphs[next], self.settings.chunk_max_chars);
            if chunks.is_empty() {
                debug!(paragraph = next, "Skipping paragraph without speakable text");
                continue;
            }
            debug!(paragraph = next, chunks = chunks.len(), "Entering paragraph");
            self.chunks = chunks;
            return Some((next, 0));
        }
        None
    }

    /// The engine finished a chunk before it saw the pause request. Park on
    /// the following chunk; `resume` submits it.
    fn pause_between_chunks(&mut self, paragraph: usize, chunk: usize) {
        self.pause_requested = false;
        match self.next_position(paragraph, chunk) {
            Some((paragraph, chunk)) => {
                debug!(paragraph, chunk, "Paused between chunks");
                self.state = PlaybackState::Paused { paragraph, chunk };
                self.release_wake_lock();
            }
            None => self.finish(),
        }
    }

    fn finish(&mut self) {
        info!("Reached end of chapter");
        self.in_flight = None;
        self.chunks.clear();
        self.announced = None;
        self.state = PlaybackState::Idle;
        self.cursor = 0;
        self.release_wake_lock();
    }

    fn submit(&mut self, paragraph: usize, chunk: usize) {
        let id = UtteranceId {
            session: self.session,
            paragraph,
            chunk,
        };
        let voices = self.engine.voices();
        let voice = select_voice(
            &voices,
            self.settings.voice.as_deref(),
            &self.settings.language,
        )
        .map(|v| v.id.clone());
        let utterance = Utterance {
            id,
            text: self.chunks[chunk].clone(),
            voice,
            rate: self.settings.rate,
            pitch: self.settings.pitch,
        };
        debug!(
            session = id.session,
            paragraph,
            chunk,
            chars = utterance.text.chars().count(),
            "Submitting chunk"
        );
        self.in_flight = Some(InFlight { id, started: false });
        self.engine.speak(utterance);
    }

    fn notify_paragraph(&mut self, paragraph: usize) {
        if let Some(listener) = self.on_paragraph_change.as_mut() {
            listener(paragraph);
        }
        if self.settings.auto_scroll {
            if let Some(target) = self.scroll_target.as_mut() {
                target.bring_into_view(paragraph, self.settings.center_spoken_paragraph);
            }
        }
    }

    fn ensure_wake_lock(&mut self) {
        if self.wake_handle.is_some() {
            return;
        }
        match self.wake_lock.acquire() {
            Ok(handle) => {
                self.wake_handle = Some(handle);
                self.wake_retry = WakeRetry::None;
            }
            Err(err) => {
                self.last_issue = Some(PlaybackIssue::WakeLockDenied(err.to_string()));
                if self.wake_retry == WakeRetry::None {
                    warn!(
                        retry_in_ms = self.wake_retry_delay.as_millis() as u64,
                        "Wake lock denied; will retry once: {err:#}"
                    );
                    self.wake_retry = WakeRetry::Scheduled(Instant::now() + self.wake_retry_delay);
                } else {
                    debug!("Wake lock still denied: {err:#}");
                }
            }
        }
    }

    fn release_wake_lock(&mut self) {
        self.wake_retry = WakeRetry::None;
        if let Some(handle) = self.wake_handle.take() {
            handle.release();
            debug!("Released wake lock");
        }
    }
}

impl<E: SpeechEngine> Drop for PlaybackController<E> {
    fn drop(&mut self) {
        self.engine.cancel();
        self.release_wake_lock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::VoiceDescriptor;
    use anyhow::{Result, anyhow};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct FakeEngine {
        spoken: Vec<Utterance>,
        cancels: usize,
        pauses: usize,
        resumes: usize,
        unavailable: bool,
        no_resume: bool,
        voices: Vec<VoiceDescriptor>,
    }

    impl SpeechEngine for FakeEngine {
        fn is_available(&self) -> bool {
            !self.unavailable
        }

        fn supports_resume(&self) -> bool {
            !self.no_resume
        }

        fn speak(&mut self, utterance: Utterance) {
            self.spoken.push(utterance);
        }

        fn cancel(&mut self) {
            self.cancels += 1;
        }

        fn pause(&mut self) {
            self.pauses += 1;
        }

        fn resume(&mut self) {
            self.resumes += 1;
        }

        fn voices(&self) -> Vec<VoiceDescriptor> {
            self.voices.clone()
        }
    }

    #[derive(Default)]
    struct LockStats {
        acquired: usize,
        released: usize,
        failures_left: usize,
        attempts: usize,
        revoked: bool,
        flaky: bool,
    }

    #[derive(Clone, Default)]
    struct FakeWakeLock(Rc<RefCell<LockStats>>);

    struct FakeHandle(Rc<RefCell<LockStats>>);

    impl WakeLock for FakeWakeLock {
        fn acquire(&mut self) -> Result<Box<dyn WakeLockHandle>> {
            let mut stats = self.0.borrow_mut();
            stats.attempts += 1;
            if stats.failures_left > 0 {
                stats.failures_left -= 1;
                return Err(anyhow!("denied"));
            }
            stats.acquired += 1;
            stats.revoked = stats.flaky;
            Ok(Box::new(FakeHandle(Rc::clone(&self.0))))
        }
    }

    impl WakeLockHandle for FakeHandle {
        fn is_active(&mut self) -> bool {
            !self.0.borrow().revoked
        }

        fn release(self: Box<Self>) {
            self.0.borrow_mut().released += 1;
        }
    }

    struct RecordingScroll(Rc<RefCell<Vec<(usize, bool)>>>);

    impl ScrollTarget for RecordingScroll {
        fn bring_into_view(&mut self, paragraph: usize, centered: bool) {
            self.0.borrow_mut().push((paragraph, centered));
        }
    }

    struct Harness {
        controller: PlaybackController<FakeEngine>,
        lock: FakeWakeLock,
        changes: Rc<RefCell<Vec<usize>>>,
    }

    impl Harness {
        fn new(paragraphs: &[&str]) -> Self {
            Self::with_engine(paragraphs, FakeEngine::default())
        }

        fn with_engine(paragraphs: &[&str], engine: FakeEngine) -> Self {
            let lock = FakeWakeLock::default();
            let mut controller =
                PlaybackController::new(engine, Box::new(lock.clone()), TtsSettings::default())
                    .with_wake_lock_retry_delay(Duration::from_secs(30));
            let changes = Rc::new(RefCell::new(Vec::new()));
            let sink = Rc::clone(&changes);
            controller.set_paragraph_listener(move |idx| sink.borrow_mut().push(idx));
            controller.load(paragraphs.iter().map(|p| p.to_string()).collect());
            Self {
                controller,
                lock,
                changes,
            }
        }

        fn spoken(&self) -> &[Utterance] {
            &self.controller.engine().spoken
        }

        fn last_id(&self) -> UtteranceId {
            self.spoken().last().expect("nothing submitted").id
        }

        fn send(&mut self, kind: SpeechEventKind) {
            let id = self.last_id();
            self.controller.on_engine_event(SpeechEvent::new(id, kind));
        }

        /// Start then end the in-flight chunk.
        fn speak_current(&mut self) {
            self.send(SpeechEventKind::Start);
            self.send(SpeechEventKind::End);
        }

        fn changes(&self) -> Vec<usize> {
            self.changes.borrow().clone()
        }

        fn lock_held(&self) -> bool {
            let stats = self.lock.0.borrow();
            stats.acquired > stats.released
        }
    }

    #[test]
    fn start_announces_paragraph_on_engine_start() {
        let mut h = Harness::new(&["First.", "Second."]);
        h.controller.start(1);

        assert_eq!(h.spoken().len(), 1);
        assert_eq!(h.spoken()[0].text, "Second.");
        assert_eq!(h.controller.state(), PlaybackState::Idle);
        assert!(h.changes().is_empty());
        assert!(h.lock_held());

        h.send(SpeechEventKind::Start);
        assert_eq!(
            h.controller.state(),
            PlaybackState::Speaking {
                paragraph: 1,
                chunk: 0
            }
        );
        assert_eq!(h.changes(), vec![1]);
    }

    #[test]
    fn each_paragraph_is_announced_once_in_order() {
        let long = "A. ".repeat(100);
        let mut h = Harness::new(&[&long, "Short.", "Last one."]);
        h.controller.start(0);

        while h.controller.is_playing() {
            h.speak_current();
        }

        assert_eq!(h.changes(), vec![0, 1, 2]);
        let chunks_of_first = h.spoken().iter().filter(|u| u.id.paragraph == 0).count();
        assert!(chunks_of_first >= 2);
        assert_eq!(h.spoken().len(), chunks_of_first + 2);
    }

    #[test]
    fn long_paragraph_is_spoken_in_several_chunks_before_moving_on() {
        let long = "A. ".repeat(100);
        let mut h = Harness::new(&[&long, "Short."]);
        h.controller.start(0);

        let mut submissions_before_next = 0;
        while !h.changes().contains(&1) {
            submissions_before_next += 1;
            let id = h.last_id();
            assert_eq!(id.paragraph, 0);
            assert_eq!(id.chunk, submissions_before_next - 1);
            h.speak_current();
            h.send(SpeechEventKind::Start);
        }
        assert!(submissions_before_next >= 2);

        let rebuilt: Vec<&str> = h
            .spoken()
            .iter()
            .filter(|u| u.id.paragraph == 0)
            .map(|u| u.text.as_str())
            .collect();
        assert_eq!(rebuilt.join(" "), long.trim());
    }

    #[test]
    fn next_chunk_waits_for_end_event() {
        let long = "word ".repeat(120);
        let mut h = Harness::new(&[&long]);
        h.controller.start(0);
        h.send(SpeechEventKind::Start);
        assert_eq!(h.spoken().len(), 1);
        h.send(SpeechEventKind::End);
        assert_eq!(h.spoken().len(), 2);
        assert_eq!(h.last_id().chunk, 1);
    }

    #[test]
    fn stop_before_start_event_suppresses_announcement() {
        let mut h = Harness::new(&["Only."]);
        h.controller.start(0);
        let stale = h.last_id();
        h.controller.stop();

        h.controller
            .on_engine_event(SpeechEvent::new(stale, SpeechEventKind::Start));
        h.controller
            .on_engine_event(SpeechEvent::new(stale, SpeechEventKind::End));

        assert!(h.changes().is_empty());
        assert_eq!(h.controller.state(), PlaybackState::Idle);
        assert_eq!(h.spoken().len(), 1);
        assert!(!h.lock_held());
    }

    #[test]
    fn stop_mid_playback_silences_old_session() {
        let mut h = Harness::new(&["One.", "Two."]);
        h.controller.start(0);
        h.send(SpeechEventKind::Start);
        let stale = h.last_id();
        h.controller.stop();

        h.controller
            .on_engine_event(SpeechEvent::new(stale, SpeechEventKind::End));
        assert_eq!(h.changes(), vec![0]);
        assert_eq!(h.spoken().len(), 1);
        assert_eq!(h.controller.state(), PlaybackState::Idle);
        assert_eq!(h.controller.cursor(), 0);
    }

    #[test]
    fn engine_error_stops_and_releases() {
        let long = "word ".repeat(120);
        let mut h = Harness::new(&[&long, "Next."]);
        h.controller.start(0);
        h.send(SpeechEventKind::Start);
        h.send(SpeechEventKind::Error("synthesis failed".into()));

        assert_eq!(h.controller.state(), PlaybackState::Idle);
        assert!(!h.lock_held());
        assert_eq!(h.spoken().len(), 1);
        assert_eq!(
            h.controller.last_issue(),
            Some(&PlaybackIssue::EngineError("synthesis failed".into()))
        );

        h.send(SpeechEventKind::End);
        assert_eq!(h.spoken().len(), 1);
    }

    #[test]
    fn end_of_last_paragraph_returns_to_idle() {
        let mut h = Harness::new(&["One.", "Two."]);
        h.controller.start(1);
        h.speak_current();

        assert_eq!(h.controller.state(), PlaybackState::Idle);
        assert_eq!(h.controller.cursor(), 0);
        assert!(!h.lock_held());
        assert!(!h.controller.is_playing());
    }

    #[test]
    fn pause_then_resume_keeps_position() {
        let long = "word ".repeat(120);
        let mut h = Harness::new(&["Intro.", &long]);
        h.controller.start(1);
        h.speak_current();
        h.send(SpeechEventKind::Start);

        h.controller.pause();
        assert_eq!(h.controller.engine().pauses, 1);
        assert!(h.controller.state().is_speaking());
        h.send(SpeechEventKind::Pause);
        assert_eq!(
            h.controller.state(),
            PlaybackState::Paused {
                paragraph: 1,
                chunk: 1
            }
        );
        assert!(!h.lock_held());

        h.controller.resume();
        assert_eq!(h.controller.engine().resumes, 1);
        assert_eq!(
            h.controller.state(),
            PlaybackState::Speaking {
                paragraph: 1,
                chunk: 1
            }
        );
        assert!(h.lock_held());
        h.send(SpeechEventKind::Resume);
        assert_eq!(h.changes(), vec![1]);
    }

    #[test]
    fn resume_resubmits_chunk_when_engine_cannot_resume() {
        let long = "word ".repeat(120);
        let engine = FakeEngine {
            no_resume: true,
            ..FakeEngine::default()
        };
        let mut h = Harness::with_engine(&[&long], engine);
        h.controller.start(0);
        h.speak_current();
        h.send(SpeechEventKind::Start);
        h.controller.pause();
        h.send(SpeechEventKind::Pause);
        let paused_text = h.spoken().last().map(|u| u.text.clone());

        h.controller.resume();
        assert_eq!(h.controller.engine().resumes, 0);
        assert_eq!(h.spoken().len(), 3);
        assert_eq!(h.last_id().chunk, 1);
        assert_eq!(h.spoken().last().map(|u| u.text.clone()), paused_text);

        h.send(SpeechEventKind::Start);
        assert_eq!(
            h.controller.state(),
            PlaybackState::Speaking {
                paragraph: 0,
                chunk: 1
            }
        );
        assert_eq!(h.changes(), vec![0]);
    }

    #[test]
    fn pause_is_noop_when_not_speaking() {
        let mut h = Harness::new(&["One."]);
        h.controller.pause();
        h.controller.resume();
        assert_eq!(h.controller.engine().pauses, 0);
        assert_eq!(h.controller.engine().resumes, 0);
        assert_eq!(h.controller.state(), PlaybackState::Idle);
    }

    #[test]
    fn jump_keeps_highlight_until_new_paragraph_starts() {
        let mut h = Harness::new(&["One.", "Two.", "Three."]);
        h.controller.start(0);
        h.send(SpeechEventKind::Start);
        let old = h.last_id();

        h.controller.jump_to(2);
        assert_eq!(h.controller.highlighted_paragraph(), Some(0));
        h.controller
            .on_engine_event(SpeechEvent::new(old, SpeechEventKind::End));
        assert_eq!(h.controller.highlighted_paragraph(), Some(0));

        h.send(SpeechEventKind::Start);
        assert_eq!(h.controller.highlighted_paragraph(), Some(2));
        assert_eq!(h.changes(), vec![0, 2]);
        assert_eq!(h.spoken().len(), 2);
    }

    #[test]
    fn invalid_index_has_no_side_effects() {
        let mut h = Harness::new(&["One."]);
        h.controller.start(5);
        assert!(h.spoken().is_empty());
        assert_eq!(h.lock.0.borrow().attempts, 0);
        assert_eq!(
            h.controller.last_issue(),
            Some(&PlaybackIssue::InvalidIndex { index: 5, len: 1 })
        );
    }

    #[test]
    fn unavailable_engine_makes_start_a_noop() {
        let engine = FakeEngine {
            unavailable: true,
            ..FakeEngine::default()
        };
        let mut h = Harness::with_engine(&["One."], engine);
        h.controller.start(0);
        assert!(h.spoken().is_empty());
        assert!(!h.lock_held());
        assert_eq!(
            h.controller.last_issue(),
            Some(&PlaybackIssue::EngineUnavailable)
        );
    }

    #[test]
    fn wake_lock_is_retried_once_after_delay() {
        let mut h = Harness::new(&["One.", "Two."]);
        h.lock.0.borrow_mut().failures_left = 1;
        h.controller.start(0);
        assert_eq!(h.spoken().len(), 1);
        assert!(!h.lock_held());

        h.controller.tick(Instant::now());
        assert_eq!(h.lock.0.borrow().attempts, 1);

        h.controller.tick(Instant::now() + Duration::from_secs(60));
        assert_eq!(h.lock.0.borrow().attempts, 2);
        assert!(h.lock_held());
    }

    #[test]
    fn repeated_wake_lock_failure_is_tolerated() {
        let mut h = Harness::new(&["One.", "Two."]);
        h.lock.0.borrow_mut().failures_left = 10;
        h.controller.start(0);
        let later = Instant::now() + Duration::from_secs(60);
        h.controller.tick(later);
        h.controller.tick(later + Duration::from_secs(1));
        assert_eq!(h.lock.0.borrow().attempts, 2);

        h.speak_current();
        h.send(SpeechEventKind::Start);
        assert_eq!(h.changes(), vec![0, 1]);
        assert!(matches!(
            h.controller.last_issue(),
            Some(PlaybackIssue::WakeLockDenied(_))
        ));
    }

    #[test]
    fn revoked_wake_lock_is_reacquired_after_delay() {
        let mut h = Harness::new(&["One."]);
        h.controller.start(0);
        h.send(SpeechEventKind::Start);
        h.lock.0.borrow_mut().revoked = true;

        let now = Instant::now();
        h.controller.tick(now);
        assert_eq!(h.lock.0.borrow().attempts, 1);
        assert_eq!(h.lock.0.borrow().released, 1);

        h.controller.tick(now + Duration::from_secs(60));
        assert_eq!(h.lock.0.borrow().acquired, 2);
        assert!(!h.lock.0.borrow().revoked);
        assert!(h.lock_held());
    }

    #[test]
    fn constantly_revoked_wake_lock_is_given_up() {
        let mut h = Harness::new(&["One."]);
        h.lock.0.borrow_mut().flaky = true;
        h.controller.start(0);
        h.send(SpeechEventKind::Start);

        let base = Instant::now();
        for step in 0..200u64 {
            h.controller.tick(base + Duration::from_millis(step * 500));
        }
        assert_eq!(h.lock.0.borrow().attempts, 2);
        assert!(h.controller.is_playing());
        assert!(matches!(
            h.controller.last_issue(),
            Some(PlaybackIssue::WakeLockDenied(_))
        ));
    }

    #[test]
    fn pause_arriving_after_chunk_end_parks_on_next_chunk() {
        let mut h = Harness::new(&["One.", "Two."]);
        h.controller.start(0);
        h.send(SpeechEventKind::Start);
        h.controller.pause();
        h.send(SpeechEventKind::End);

        assert_eq!(h.spoken().len(), 1);
        assert_eq!(
            h.controller.state(),
            PlaybackState::Paused {
                paragraph: 1,
                chunk: 0
            }
        );
        assert!(!h.lock_held());
        assert!(!h.controller.is_playing());

        h.controller.resume();
        assert_eq!(h.spoken().len(), 2);
        assert_eq!(h.spoken()[1].text, "Two.");
        assert_eq!(h.controller.engine().resumes, 0);
        h.send(SpeechEventKind::Start);
        assert_eq!(
            h.controller.state(),
            PlaybackState::Speaking {
                paragraph: 1,
                chunk: 0
            }
        );
        assert_eq!(h.changes(), vec![0, 1]);

        h.send(SpeechEventKind::End);
        assert_eq!(h.controller.state(), PlaybackState::Idle);
    }

    #[test]
    fn pause_after_final_chunk_end_finishes() {
        let mut h = Harness::new(&["Only."]);
        h.controller.start(0);
        h.send(SpeechEventKind::Start);
        h.controller.pause();
        h.send(SpeechEventKind::End);

        assert_eq!(h.controller.state(), PlaybackState::Idle);
        assert_eq!(h.spoken().len(), 1);
        h.controller.toggle();
        assert_eq!(h.spoken().len(), 2);
        assert_eq!(h.spoken()[1].text, "Only.");
    }

    #[test]
    fn rate_changes_apply_from_next_chunk() {
        let long = "word ".repeat(120);
        let mut h = Harness::new(&[&long]);
        h.controller.start(0);
        h.send(SpeechEventKind::Start);
        h.controller.update_settings(|s| s.rate = 1.5);
        assert_eq!(h.spoken()[0].rate, 1.0);

        h.send(SpeechEventKind::End);
        assert_eq!(h.spoken()[1].rate, 1.5);
    }

    #[test]
    fn utterances_use_selected_voice() {
        let engine = FakeEngine {
            voices: vec![
                VoiceDescriptor {
                    id: "siwis".into(),
                    name: "Siwis".into(),
                    lang: "fr_FR".into(),
                    is_default: true,
                },
                VoiceDescriptor {
                    id: "ryan".into(),
                    name: "Ryan".into(),
                    lang: "en_US".into(),
                    is_default: false,
                },
            ],
            ..FakeEngine::default()
        };
        let mut h = Harness::with_engine(&["One.", "Two."], engine);
        h.controller.start(0);
        assert_eq!(h.spoken()[0].voice.as_deref(), Some("ryan"));

        h.controller
            .update_settings(|s| s.voice = Some("siwis".into()));
        h.speak_current();
        assert_eq!(h.spoken()[1].voice.as_deref(), Some("siwis"));
    }

    #[test]
    fn auto_scroll_follows_announcements() {
        let scrolled = Rc::new(RefCell::new(Vec::new()));
        let mut h = Harness::new(&["One.", "Two."]);
        h.controller
            .set_scroll_target(Box::new(RecordingScroll(Rc::clone(&scrolled))));
        h.controller.start(0);
        h.speak_current();
        h.send(SpeechEventKind::Start);
        assert_eq!(*scrolled.borrow(), vec![(0, true), (1, true)]);

        h.controller.update_settings(|s| s.auto_scroll = false);
        h.controller.jump_to(0);
        h.send(SpeechEventKind::Start);
        assert_eq!(scrolled.borrow().len(), 2);
    }

    #[test]
    fn toggle_cycles_through_transport_states() {
        let mut h = Harness::new(&["One.", "Two."]);
        h.controller.set_cursor(1);
        h.controller.toggle();
        assert_eq!(h.last_id().paragraph, 1);
        h.send(SpeechEventKind::Start);

        h.controller.toggle();
        h.send(SpeechEventKind::Pause);
        assert!(h.controller.state().is_paused());

        h.controller.toggle();
        assert!(h.controller.state().is_speaking());
    }

    #[test]
    fn loading_a_new_chapter_resets_playback() {
        let mut h = Harness::new(&["One.", "Two."]);
        h.controller.start(0);
        h.send(SpeechEventKind::Start);
        let stale = h.last_id();

        h.controller.load(vec!["Fresh.".into()]);
        assert_eq!(h.controller.state(), PlaybackState::Idle);
        assert!(!h.lock_held());
        h.controller
            .on_engine_event(SpeechEvent::new(stale, SpeechEventKind::End));
        assert_eq!(h.spoken().len(), 1);
        assert_eq!(h.controller.paragraph_count(), 1);
    }

    #[test]
    fn dropping_controller_releases_resources() {
        let h = Harness::new(&["One."]);
        let lock = h.lock.clone();
        let mut controller = h.controller;
        controller.start(0);
        drop(controller);
        let stats = lock.0.borrow();
        assert_eq!(stats.acquired, stats.released);
    }
}
