//! Text-to-speech through an external engine.
//!
//! Herald treats synthesis as opaque: an engine is given text and an output
//! path and either writes an audio file there or fails. [`CommandSynthesizer`]
//! runs `espeak`, `say` or a configured program as a subprocess.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::config::{TtsConfig, TtsEngineKind};
use crate::error::{HeraldError, HeraldResult};

/// Errors from speech synthesis.
#[derive(Debug, Error)]
pub enum TtsError {
    #[error("Nothing to say")]
    EmptyText,

    #[error("Failed to start speech engine: {0}")]
    Spawn(String),

    #[error("Speech engine failed: {0}")]
    EngineFailed(String),

    #[error("Speech engine produced no file at {0}")]
    MissingOutput(String),

    #[error("Speech synthesis cancelled")]
    Cancelled,

    #[error("Speech engine did not finish within {0:?}")]
    TimedOut(std::time::Duration),
}

/// What to say and where to write it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest {
    pub text: String,
    /// Engine voice; the engine default when `None`.
    pub voice: Option<String>,
    /// Words per minute; the engine default when `None`.
    pub speed: Option<u32>,
    pub output_path: PathBuf,
}

/// Produces a speech file on disk.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesizes `request` and returns the written file.
    ///
    /// Returns [`TtsError::Cancelled`] once `cancel` fires; the engine is
    /// killed.
    async fn synthesize(
        &self,
        request: &SpeechRequest,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, TtsError>;
}

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
    pub program: String,
    pub args: Vec<String>,
}

/// Runs a speech engine as a subprocess.
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    engine: TtsEngineKind,
    program: Option<String>,
    args: Vec<String>,
}

impl CommandSynthesizer {
    /// Builds the synthesizer for `config`, resolving `auto` for this platform.
    pub fn from_config(config: &TtsConfig) -> HeraldResult<Self> {
        let engine = match config.engine {
            TtsEngineKind::Auto if cfg!(target_os = "macos") => TtsEngineKind::Say,
            TtsEngineKind::Auto => TtsEngineKind::Espeak,
            other => other,
        };

        if engine == TtsEngineKind::Command && config.command.is_none() {
            return Err(HeraldError::Configuration(
                "tts.engine is `command` but tts.command is not set".to_string(),
            ));
        }

        Ok(Self {
            engine,
            program: config.command.clone(),
            args: config.args.clone(),
        })
    }

    #[must_use]
    pub fn engine(&self) -> TtsEngineKind {
        self.engine
    }

    /// The command line that synthesizes `request`.
    #[must_use]
    pub fn command_for(&self, request: &SpeechRequest) -> EngineCommand {
        let output = request.output_path.to_string_lossy().into_owned();

        match self.engine {
            TtsEngineKind::Say => {
                let mut args = Vec::new();
                if let Some(voice) = &request.voice {
                    args.extend(["-v".to_string(), voice.clone()]);
                }
                if let Some(speed) = request.speed {
                    args.extend(["-r".to_string(), speed.to_string()]);
                }
                args.extend([
                    "--file-format=WAVE".to_string(),
                    "--data-format=LEI16@22050".to_string(),
                    "-o".to_string(),
                    output,
                    request.text.clone(),
                ]);
                EngineCommand {
                    program: "say".to_string(),
                    args,
                }
            }
            TtsEngineKind::Command => {
                let args = self
                    .args
                    .iter()
                    .map(|arg| {
                        arg.replace("{text}", &request.text)
                            .replace("{voice}", request.voice.as_deref().unwrap_or_default())
                            .replace(
                                "{speed}",
                                &request.speed.map(|s| s.to_string()).unwrap_or_default(),
                            )
                            .replace("{output}", &output)
                    })
                    .collect();
                EngineCommand {
                    program: self.program.clone().unwrap_or_default(),
                    args,
                }
            }
            TtsEngineKind::Espeak | TtsEngineKind::Auto => {
                let mut args = Vec::new();
                if let Some(voice) = &request.voice {
                    args.extend(["-v".to_string(), voice.clone()]);
                }
                if let Some(speed) = request.speed {
                    args.extend(["-s".to_string(), speed.to_string()]);
                }
                args.extend(["-w".to_string(), output, request.text.clone()]);
                EngineCommand {
                    program: "espeak".to_string(),
                    args,
                }
            }
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for CommandSynthesizer {
    async fn synthesize(
        &self,
        request: &SpeechRequest,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, TtsError> {
        if request.text.trim().is_empty() {
            return Err(TtsError::EmptyText);
        }
        if cancel.is_cancelled() {
            return Err(TtsError::Cancelled);
        }

        let path = &request.output_path;
        if let Some(folder) = path.parent() {
            tokio::fs::create_dir_all(folder).await.map_err(|e| {
                TtsError::EngineFailed(format!("cannot create {}: {}", folder.display(), e))
            })?;
        }
        // A stale file would pass for fresh output.
        let _ = tokio::fs::remove_file(path).await;

        let EngineCommand { program, args } = self.command_for(request);
        log::debug!("[TTS] Running {} {:?}", program, args);

        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TtsError::Spawn(format!("{}: {}", program, e)))?;

        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::info!("[TTS] Cancelled, stopping {}", program);
                return Err(TtsError::Cancelled);
            }
            status = child.wait() => status
                .map_err(|e| TtsError::EngineFailed(format!("{}: {}", program, e)))?,
        };

        if !status.success() {
            return Err(TtsError::EngineFailed(format!("{} exited with {}", program, status)));
        }

        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.len() > 0 => Ok(path.clone()),
            _ => Err(TtsError::MissingOutput(path.display().to_string())),
        }
    }
}
