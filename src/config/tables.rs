use super::defaults;
use super::models::{AppConfig, LogLevel, WakeLockMode};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize, serde::Serialize)]
pub(super) struct ConfigTables {
    #[serde(default)]
    tts: TtsConfig,
    #[serde(default)]
    reading: ReadingConfig,
    #[serde(default)]
    wake_lock: WakeLockConfig,
    #[serde(default)]
    library: LibraryConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

impl From<ConfigTables> for AppConfig {
    fn from(tables: ConfigTables) -> Self {
        AppConfig {
            tts_models: tables.tts.models,
            tts_espeak_path: tables.tts.espeak_path,
            tts_voice: tables.tts.voice,
            tts_language: tables.tts.language,
            tts_rate: tables.tts.rate,
            tts_pitch: tables.tts.pitch,
            tts_volume: tables.tts.volume,
            chunk_max_chars: tables.tts.chunk_max_chars,
            auto_scroll: tables.reading.auto_scroll,
            center_spoken_paragraph: tables.reading.center_spoken_paragraph,
            wake_lock: tables.wake_lock.mode,
            wake_lock_retry_delay_ms: tables.wake_lock.retry_delay_ms,
            library_root: tables.library.root,
            cache_dir: tables.library.cache_dir,
            log_level: tables.logging.log_level,
        }
    }
}

impl From<&AppConfig> for ConfigTables {
    fn from(config: &AppConfig) -> Self {
        ConfigTables {
            tts: TtsConfig {
                models: config.tts_models.clone(),
                espeak_path: config.tts_espeak_path.clone(),
                voice: config.tts_voice.clone(),
                language: config.tts_language.clone(),
                rate: config.tts_rate,
                pitch: config.tts_pitch,
                volume: config.tts_volume,
                chunk_max_chars: config.chunk_max_chars,
            },
            reading: ReadingConfig {
                auto_scroll: config.auto_scroll,
                center_spoken_paragraph: config.center_spoken_paragraph,
            },
            wake_lock: WakeLockConfig {
                mode: config.wake_lock,
                retry_delay_ms: config.wake_lock_retry_delay_ms,
            },
            library: LibraryConfig {
                root: config.library_root.clone(),
                cache_dir: config.cache_dir.clone(),
            },
            logging: LoggingConfig {
                log_level: config.log_level,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct TtsConfig {
    #[serde(default = "defaults::default_tts_models")]
    models: Vec<String>,
    #[serde(default = "defaults::default_tts_espeak_path")]
    espeak_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    voice: Option<String>,
    #[serde(default = "defaults::default_tts_language")]
    language: String,
    #[serde(default = "defaults::default_tts_rate")]
    rate: f32,
    #[serde(default = "defaults::default_tts_pitch")]
    pitch: f32,
    #[serde(default = "defaults::default_tts_volume")]
    volume: f32,
    #[serde(default = "defaults::default_chunk_max_chars")]
    chunk_max_chars: usize,
}

impl Default for TtsConfig {
    fn default() -> Self {
        TtsConfig {
            models: defaults::default_tts_models(),
            espeak_path: defaults::default_tts_espeak_path(),
            voice: None,
            language: defaults::default_tts_language(),
            rate: defaults::default_tts_rate(),
            pitch: defaults::default_tts_pitch(),
            volume: defaults::default_tts_volume(),
            chunk_max_chars: defaults::default_chunk_max_chars(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct ReadingConfig {
    #[serde(default = "defaults::default_auto_scroll")]
    auto_scroll: bool,
    #[serde(default = "defaults::default_center_spoken_paragraph")]
    center_spoken_paragraph: bool,
}

impl Default for ReadingConfig {
    fn default() -> Self {
        ReadingConfig {
            auto_scroll: defaults::default_auto_scroll(),
            center_spoken_paragraph: defaults::default_center_spoken_paragraph(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct WakeLockConfig {
    #[serde(default = "defaults::default_wake_lock_mode")]
    mode: WakeLockMode,
    #[serde(default = "defaults::default_wake_lock_retry_delay_ms")]
    retry_delay_ms: u64,
}

impl Default for WakeLockConfig {
    fn default() -> Self {
        WakeLockConfig {
            mode: defaults::default_wake_lock_mode(),
            retry_delay_ms: defaults::default_wake_lock_retry_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct LibraryConfig {
    #[serde(default = "defaults::default_library_root")]
    root: String,
    #[serde(default = "defaults::default_cache_dir")]
    cache_dir: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        LibraryConfig {
            root: defaults::default_library_root(),
            cache_dir: defaults::default_cache_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct LoggingConfig {
    #[serde(default = "defaults::default_log_level")]
    log_level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_level: defaults::default_log_level(),
        }
    }
}
