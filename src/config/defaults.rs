pub(crate) fn default_tts_models() -> Vec<String> {
    vec!["/usr/share/piper-voices/en/en_US/ryan/high/en_US-ryan-high.onnx".to_string()]
}

pub(crate) fn default_tts_espeak_path() -> String {
    "/usr/share".to_string()
}

pub(crate) fn default_tts_language() -> String {
    "en".to_string()
}

pub(crate) fn default_tts_rate() -> f32 {
    1.0
}

pub(crate) fn default_tts_pitch() -> f32 {
    1.0
}

pub(crate) fn default_tts_volume() -> f32 {
    1.0
}

pub(crate) fn default_chunk_max_chars() -> usize {
    200
}

pub(crate) fn default_auto_scroll() -> bool {
    true
}

pub(crate) fn default_center_spoken_paragraph() -> bool {
    true
}

pub(crate) fn default_wake_lock_mode() -> crate::config::WakeLockMode {
    crate::config::WakeLockMode::SystemdInhibit
}

pub(crate) fn default_wake_lock_retry_delay_ms() -> u64 {
    1500
}

pub(crate) fn default_library_root() -> String {
    "library".to_string()
}

pub(crate) fn default_cache_dir() -> String {
    ".cache".to_string()
}

pub(crate) fn default_log_level() -> crate::config::LogLevel {
    crate::config::LogLevel::Debug
}
