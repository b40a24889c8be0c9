//! Native speech backend using `piper-rs` for synthesis and `rodio` for
//! output. Audio is synthesized per chunk, cached as WAV under the cache
//! directory, and played on a dedicated worker thread that reports lifecycle
//! events back to the host.

use crate::playback::{SpeechEngine, SpeechEvent, SpeechEventKind, Utterance, UtteranceId, VoiceDescriptor};
use anyhow::{Context, Result, anyhow};
use hound::WavSpec;
use piper_rs::from_config_path;
use piper_rs::synth::{AudioOutputConfig, PiperSpeechSynthesizer};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::env;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Receives engine events on the worker thread.
pub type EventSink = Box<dyn Fn(SpeechEvent) + Send>;

#[derive(Clone, Debug, Default)]
struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

enum WorkerCommand {
    Speak {
        utterance: Utterance,
        cancel: CancelFlag,
    },
    Pause,
    Resume,
    Cancel,
    Shutdown,
}

pub struct PiperEngine {
    commands: mpsc::Sender<WorkerCommand>,
    voices: Vec<VoiceDescriptor>,
    current: Option<CancelFlag>,
    worker: Option<JoinHandle<()>>,
}

impl PiperEngine {
    pub fn new(
        model_paths: &[PathBuf],
        espeak_path: PathBuf,
        cache_root: PathBuf,
        volume: f32,
        emit: EventSink,
    ) -> Result<Self> {
        let espeak_path = sanitize_espeak_root(espeak_path);
        if env::var_os("PIPER_ESPEAKNG_DATA_DIRECTORY").is_none() {
            // Safe because the engine is built during startup before other threads exist.
            unsafe {
                env::set_var("PIPER_ESPEAKNG_DATA_DIRECTORY", &espeak_path);
            }
        }

        let mut voices = Vec::new();
        let mut models = HashMap::new();
        for path in model_paths {
            match describe_model(path) {
                Ok(mut voice) => {
                    voice.is_default = voices.is_empty();
                    models.insert(voice.id.clone(), path.clone());
                    voices.push(voice);
                }
                Err(err) => warn!(model = %path.display(), "Skipping unusable voice model: {err:#}"),
            }
        }
        info!(
            voices = voices.len(),
            espeak_root = %espeak_path.display(),
            cache = %cache_root.display(),
            "Initializing Piper speech engine"
        );

        let default_voice = voices.first().map(|v| v.id.clone());
        let (commands, rx) = mpsc::channel();
        let worker = Worker {
            models,
            default_voice,
            cache_root,
            volume,
            emit,
            synthesizers: HashMap::new(),
        };
        let handle = thread::Builder::new()
            .name("piper-speech".into())
            .spawn(move || worker.run(rx))
            .context("Spawning speech worker")?;

        Ok(Self {
            commands,
            voices,
            current: None,
            worker: Some(handle),
        })
    }

    fn send(&self, command: WorkerCommand) {
        if self.commands.send(command).is_err() {
            warn!("Speech worker has exited; dropping command");
        }
    }
}

impl SpeechEngine for PiperEngine {
    fn is_available(&self) -> bool {
        !self.voices.is_empty() && self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    fn speak(&mut self, utterance: Utterance) {
        let cancel = CancelFlag::default();
        self.current = Some(cancel.clone());
        self.send(WorkerCommand::Speak { utterance, cancel });
    }

    fn cancel(&mut self) {
        if let Some(flag) = self.current.take() {
            flag.cancel();
        }
        self.send(WorkerCommand::Cancel);
    }

    fn pause(&mut self) {
        self.send(WorkerCommand::Pause);
    }

    fn resume(&mut self) {
        self.send(WorkerCommand::Resume);
    }

    fn voices(&self) -> Vec<VoiceDescriptor> {
        self.voices.clone()
    }
}

impl Drop for PiperEngine {
    fn drop(&mut self) {
        if let Some(flag) = self.current.take() {
            flag.cancel();
        }
        let _ = self.commands.send(WorkerCommand::Shutdown);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("Speech worker panicked");
            }
        }
    }
}

struct Playing {
    id: UtteranceId,
    sink: Sink,
    paused: bool,
}

struct Worker {
    models: HashMap<String, PathBuf>,
    default_voice: Option<String>,
    cache_root: PathBuf,
    volume: f32,
    emit: EventSink,
    synthesizers: HashMap<String, PiperSpeechSynthesizer>,
}

impl Worker {
    fn run(mut self, rx: mpsc::Receiver<WorkerCommand>) {
        // The output stream is not Send, so it is opened on this thread.
        let output = match OutputStream::try_default() {
            Ok(output) => Some(output),
            Err(err) => {
                warn!("No audio output available: {err}");
                None
            }
        };
        let mut current: Option<Playing> = None;

        loop {
            let command = if current.is_some() {
                match rx.recv_timeout(POLL_INTERVAL) {
                    Ok(command) => Some(command),
                    Err(mpsc::RecvTimeoutError::Timeout) => None,
                    Err(mpsc::RecvTimeoutError::Disconnected) => break,
                }
            } else {
                match rx.recv() {
                    Ok(command) => Some(command),
                    Err(_) => break,
                }
            };

            match command {
                Some(WorkerCommand::Speak { utterance, cancel }) => {
                    if let Some(old) = current.take() {
                        old.sink.stop();
                    }
                    let id = utterance.id;
                    match self.play(&utterance, &cancel, output.as_ref().map(|(_, h)| h)) {
                        Ok(Some(sink)) => {
                            (self.emit)(SpeechEvent::new(id, SpeechEventKind::Start));
                            current = Some(Playing {
                                id,
                                sink,
                                paused: false,
                            });
                        }
                        Ok(None) => debug!(?id, "Utterance cancelled before playback"),
                        Err(err) => {
                            warn!(?id, "Failed to speak chunk: {err:#}");
                            if !cancel.is_cancelled() {
                                (self.emit)(SpeechEvent::new(
                                    id,
                                    SpeechEventKind::Error(format!("{err:#}")),
                                ));
                            }
                        }
                    }
                }
                Some(WorkerCommand::Pause) => {
                    if let Some(playing) = current.as_mut() {
                        playing.sink.pause();
                        playing.paused = true;
                        (self.emit)(SpeechEvent::new(playing.id, SpeechEventKind::Pause));
                    }
                }
                Some(WorkerCommand::Resume) => {
                    if let Some(playing) = current.as_mut() {
                        playing.sink.play();
                        playing.paused = false;
                        (self.emit)(SpeechEvent::new(playing.id, SpeechEventKind::Resume));
                    }
                }
                Some(WorkerCommand::Cancel) => {
                    if let Some(playing) = current.take() {
                        debug!(id = ?playing.id, "Cancelling playback");
                        playing.sink.stop();
                    }
                }
                Some(WorkerCommand::Shutdown) => break,
                None => {}
            }

            let finished = current
                .as_ref()
                .is_some_and(|playing| !playing.paused && playing.sink.empty());
            if finished {
                if let Some(playing) = current.take() {
                    (self.emit)(SpeechEvent::new(playing.id, SpeechEventKind::End));
                }
            }
        }
        debug!("Speech worker stopped");
    }

    /// Synthesize (or reuse) the chunk audio and queue it on a fresh sink.
    /// Returns `None` when the utterance was cancelled meanwhile.
    fn play(
        &mut self,
        utterance: &Utterance,
        cancel: &CancelFlag,
        output: Option<&OutputStreamHandle>,
    ) -> Result<Option<Sink>> {
        let output = output.ok_or_else(|| anyhow!("audio output unavailable"))?;
        let voice = utterance
            .voice
            .clone()
            .or_else(|| self.default_voice.clone())
            .ok_or_else(|| anyhow!("no voice models configured"))?;
        let model_path = self
            .models
            .get(&voice)
            .cloned()
            .ok_or_else(|| anyhow!("unknown voice {voice}"))?;

        let path = cache_path(
            &self.cache_root,
            &model_path,
            &utterance.text,
            utterance.rate,
            utterance.pitch,
        );
        if !path.exists() {
            let piper = self.synthesizer(&voice, &model_path)?;
            synth_with_piper(piper, &path, &utterance.text, utterance.rate, utterance.pitch)?;
        } else {
            debug!(path = %path.display(), "Reusing cached chunk audio");
        }
        if cancel.is_cancelled() {
            return Ok(None);
        }

        let reader = BufReader::new(
            File::open(&path).with_context(|| format!("Opening {}", path.display()))?,
        );
        let source = Decoder::new(reader).context("Decoding chunk audio")?;
        let sink = Sink::try_new(output).context("Creating sink")?;
        sink.set_volume(self.volume);
        sink.append(source);
        sink.play();
        Ok(Some(sink))
    }

    fn synthesizer(&mut self, voice: &str, model_path: &Path) -> Result<&PiperSpeechSynthesizer> {
        if !self.synthesizers.contains_key(voice) {
            let config_path = resolve_piper_config(model_path);
            info!(voice, config = %config_path.display(), "Loading Piper voice");
            let model = from_config_path(&config_path).context("Loading Piper model")?;
            let piper =
                PiperSpeechSynthesizer::new(model).context("Preparing Piper synthesizer")?;
            self.synthesizers.insert(voice.to_string(), piper);
        }
        self.synthesizers
            .get(voice)
            .ok_or_else(|| anyhow!("voice {voice} failed to load"))
    }
}

#[derive(Deserialize)]
struct PiperModelConfig {
    #[serde(default)]
    dataset: Option<String>,
    #[serde(default)]
    language: Option<PiperLanguage>,
    #[serde(default)]
    espeak: Option<PiperEspeak>,
}

#[derive(Deserialize)]
struct PiperLanguage {
    code: String,
}

#[derive(Deserialize)]
struct PiperEspeak {
    voice: String,
}

/// Build a voice entry from the model's `.onnx.json`.
fn describe_model(model_path: &Path) -> Result<VoiceDescriptor> {
    let config_path = resolve_piper_config(model_path);
    let data = fs::read_to_string(&config_path)
        .with_context(|| format!("Reading Piper config {}", config_path.display()))?;
    let config: PiperModelConfig =
        serde_json::from_str(&data).context("Parsing Piper config JSON")?;
    let id = voice_id(model_path);
    let lang = config
        .language
        .map(|l| l.code)
        .or_else(|| config.espeak.map(|e| e.voice))
        .unwrap_or_default();
    Ok(VoiceDescriptor {
        name: config.dataset.unwrap_or_else(|| id.clone()),
        id,
        lang,
        is_default: false,
    })
}

fn voice_id(model_path: &Path) -> String {
    let name = model_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.trim_end_matches(".json")
        .trim_end_matches(".onnx")
        .to_string()
}

fn cache_path(base: &Path, model_path: &Path, text: &str, rate: f32, pitch: f32) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(model_path.as_os_str().to_string_lossy().as_bytes());
    hasher.update(text.as_bytes());
    hasher.update(rate.to_le_bytes());
    hasher.update(pitch.to_le_bytes());
    let hash = format!("{:x}", hasher.finalize());
    base.join(format!("tts-{hash}.wav"))
}

/// Piper expects the parent directory that contains `espeak-ng-data/phonindex`.
/// Users often point directly at `.../espeak-ng-data`; trim that to avoid
/// duplicated segments like `/espeak-ng-data/espeak-ng-data/phonindex`.
fn sanitize_espeak_root(path: PathBuf) -> PathBuf {
    if path.file_name().is_some_and(|n| n == "espeak-ng-data") {
        if let Some(parent) = path.parent() {
            debug!(
                original = %path.display(),
                sanitized = %parent.display(),
                "Trimming espeak-ng-data suffix"
            );
            return parent.to_path_buf();
        }
    }
    path
}

fn resolve_piper_config(model_path: &Path) -> PathBuf {
    if model_path.extension().is_some_and(|ext| ext == "onnx") {
        return model_path.with_extension("onnx.json");
    }
    model_path.to_path_buf()
}

fn synth_with_piper(
    piper: &PiperSpeechSynthesizer,
    path: &Path,
    text: &str,
    rate: f32,
    pitch: f32,
) -> Result<()> {
    debug!(
        path = %path.display(),
        rate,
        pitch,
        chars = text.len(),
        "Synthesizing chunk with Piper"
    );
    let neutral = (rate - 1.0).abs() <= f32::EPSILON && (pitch - 1.0).abs() <= f32::EPSILON;
    let output_config = if neutral {
        None
    } else {
        Some(AudioOutputConfig {
            rate: Some(rate_to_percent(rate)),
            volume: None,
            pitch: Some(pitch_to_percent(pitch)),
            appended_silence_ms: None,
        })
    };

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_rate: Option<u32> = None;
    let mut channels: Option<u16> = None;
    for chunk in piper
        .synthesize_lazy(text.to_string(), output_config)
        .context("Starting synthesis")?
    {
        let chunk = chunk.context("Synthesizing audio")?;
        if sample_rate.is_none() {
            sample_rate = Some(chunk.info.sample_rate as u32);
            channels = Some(chunk.info.num_channels as u16);
        }
        samples.extend_from_slice(chunk.samples.as_slice());
    }
    if samples.is_empty() {
        anyhow::bail!("No speech data produced");
    }

    write_wav(
        path,
        sample_rate.unwrap_or(22_050),
        channels.unwrap_or(1),
        &samples,
    )
}

fn write_wav(path: &Path, sample_rate: u32, channels: u16, samples: &[f32]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Creating TTS cache directory")?;
    }
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let temp_path = path.with_extension("wav.partial");
    let mut writer = hound::WavWriter::create(&temp_path, spec).context("Creating WAV file")?;
    for &s in samples {
        let clamped = (s * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        writer.write_sample(clamped).context("Writing WAV sample")?;
    }
    writer.finalize().context("Finalizing WAV file")?;
    fs::rename(&temp_path, path).context("Moving synthesized chunk into cache")?;
    Ok(())
}

fn rate_to_percent(rate: f32) -> u8 {
    let clamped = rate.clamp(0.5, 3.0);
    (((clamped - 0.5) / 2.5) * 100.0).round().clamp(0.0, 100.0) as u8
}

fn pitch_to_percent(pitch: f32) -> u8 {
    let clamped = pitch.clamp(0.5, 2.0);
    (((clamped - 0.5) / 1.5) * 100.0).round().clamp(0.0, 100.0) as u8
}
