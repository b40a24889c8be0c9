use serde::Deserialize;

/// High-level app configuration, flattened from the TOML tables.
#[derive(Debug, Clone, PartialEq, Deserialize, serde::Serialize)]
pub struct AppConfig {
    #[serde(default = "crate::config::defaults::default_tts_models")]
    pub tts_models: Vec<String>,
    #[serde(default = "crate::config::defaults::default_tts_espeak_path")]
    pub tts_espeak_path: String,
    #[serde(default)]
    pub tts_voice: Option<String>,
    #[serde(default = "crate::config::defaults::default_tts_language")]
    pub tts_language: String,
    #[serde(default = "crate::config::defaults::default_tts_rate")]
    pub tts_rate: f32,
    #[serde(default = "crate::config::defaults::default_tts_pitch")]
    pub tts_pitch: f32,
    #[serde(default = "crate::config::defaults::default_tts_volume")]
    pub tts_volume: f32,
    #[serde(default = "crate::config::defaults::default_chunk_max_chars")]
    pub chunk_max_chars: usize,
    #[serde(default = "crate::config::defaults::default_auto_scroll")]
    pub auto_scroll: bool,
    #[serde(default = "crate::config::defaults::default_center_spoken_paragraph")]
    pub center_spoken_paragraph: bool,
    #[serde(default = "crate::config::defaults::default_wake_lock_mode")]
    pub wake_lock: WakeLockMode,
    #[serde(default = "crate::config::defaults::default_wake_lock_retry_delay_ms")]
    pub wake_lock_retry_delay_ms: u64,
    #[serde(default = "crate::config::defaults::default_library_root")]
    pub library_root: String,
    #[serde(default = "crate::config::defaults::default_cache_dir")]
    pub cache_dir: String,
    #[serde(default = "crate::config::defaults::default_log_level")]
    pub log_level: LogLevel,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            tts_models: crate::config::defaults::default_tts_models(),
            tts_espeak_path: crate::config::defaults::default_tts_espeak_path(),
            tts_voice: None,
            tts_language: crate::config::defaults::default_tts_language(),
            tts_rate: crate::config::defaults::default_tts_rate(),
            tts_pitch: crate::config::defaults::default_tts_pitch(),
            tts_volume: crate::config::defaults::default_tts_volume(),
            chunk_max_chars: crate::config::defaults::default_chunk_max_chars(),
            auto_scroll: crate::config::defaults::default_auto_scroll(),
            center_spoken_paragraph: crate::config::defaults::default_center_spoken_paragraph(),
            wake_lock: crate::config::defaults::default_wake_lock_mode(),
            wake_lock_retry_delay_ms: crate::config::defaults::default_wake_lock_retry_delay_ms(),
            library_root: crate::config::defaults::default_library_root(),
            cache_dir: crate::config::defaults::default_cache_dir(),
            log_level: crate::config::defaults::default_log_level(),
        }
    }
}

/// How the device is kept awake while narrating.
#[derive(Debug, Clone, Copy, Deserialize, serde::Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum WakeLockMode {
    Disabled,
    SystemdInhibit,
}

impl Default for WakeLockMode {
    fn default() -> Self {
        WakeLockMode::SystemdInhibit
    }
}

impl std::fmt::Display for WakeLockMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            WakeLockMode::Disabled => "disabled",
            WakeLockMode::SystemdInhibit => "systemd-inhibit",
        };
        write!(f, "{}", label)
    }
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Deserialize, serde::Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Debug
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
