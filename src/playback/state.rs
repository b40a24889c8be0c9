use crate::config::AppConfig;
use crate::text_utils::DEFAULT_CHUNK_MAX_CHARS;

pub const MIN_TTS_RATE: f32 = 0.5;
pub const MAX_TTS_RATE: f32 = 3.0;
pub const MIN_TTS_PITCH: f32 = 0.5;
pub const MAX_TTS_PITCH: f32 = 2.0;
const MIN_CHUNK_CHARS: usize = 40;

/// Observable playback position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Speaking {
        paragraph: usize,
        chunk: usize,
    },
    Paused {
        paragraph: usize,
        chunk: usize,
    },
}

impl PlaybackState {
    pub fn paragraph(&self) -> Option<usize> {
        match *self {
            PlaybackState::Idle => None,
            PlaybackState::Speaking { paragraph, .. } | PlaybackState::Paused { paragraph, .. } => {
                Some(paragraph)
            }
        }
    }

    pub fn is_speaking(&self) -> bool {
        matches!(self, PlaybackState::Speaking { .. })
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, PlaybackState::Paused { .. })
    }
}

/// Voice and pacing settings, read each time a chunk is submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct TtsSettings {
    pub voice: Option<String>,
    pub language: String,
    pub rate: f32,
    pub pitch: f32,
    pub chunk_max_chars: usize,
    pub auto_scroll: bool,
    pub center_spoken_paragraph: bool,
}

impl Default for TtsSettings {
    fn default() -> Self {
        Self {
            voice: None,
            language: "en".to_string(),
            rate: 1.0,
            pitch: 1.0,
            chunk_max_chars: DEFAULT_CHUNK_MAX_CHARS,
            auto_scroll: true,
            center_spoken_paragraph: true,
        }
    }
}

impl TtsSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            voice: config.tts_voice.clone(),
            language: config.tts_language.clone(),
            rate: config.tts_rate,
            pitch: config.tts_pitch,
            chunk_max_chars: config.chunk_max_chars,
            auto_scroll: config.auto_scroll,
            center_spoken_paragraph: config.center_spoken_paragraph,
        }
        .clamped()
    }

    pub fn clamped(mut self) -> Self {
        self.rate = self.rate.clamp(MIN_TTS_RATE, MAX_TTS_RATE);
        self.pitch = self.pitch.clamp(MIN_TTS_PITCH, MAX_TTS_PITCH);
        self.chunk_max_chars = self.chunk_max_chars.max(MIN_CHUNK_CHARS);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_has_no_paragraph() {
        assert_eq!(PlaybackState::Idle.paragraph(), None);
        let paused = PlaybackState::Paused {
            paragraph: 3,
            chunk: 1,
        };
        assert_eq!(paused.paragraph(), Some(3));
        assert!(paused.is_paused());
        assert!(!paused.is_speaking());
    }

    #[test]
    fn settings_from_config_are_clamped() {
        let mut config = AppConfig::default();
        config.tts_rate = 9.0;
        config.tts_pitch = 0.1;
        config.chunk_max_chars = 3;
        let settings = TtsSettings::from_config(&config);
        assert_eq!(settings.rate, MAX_TTS_RATE);
        assert_eq!(settings.pitch, MIN_TTS_PITCH);
        assert_eq!(settings.chunk_max_chars, MIN_CHUNK_CHARS);
    }
}
