//! Speech recognition via an external whisper.cpp-style CLI.
//!
//! The CLI is asked for JSON output; its `transcription` array is parsed
//! once and handed to the caller as a lazy, single-pass [`SegmentIter`] so
//! formatting never needs the whole transcript in a second buffer.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{info, warn};

use crate::error::{PipelineError, PipelineResult};

/// One recognized span of speech.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Span start, in seconds from the beginning of the audio.
    pub start_secs: f64,
    /// Span end, in seconds from the beginning of the audio.
    pub end_secs: f64,
    /// Recognized text, unnormalized.
    pub text: String,
}

/// Lazy, finite, non-restartable stream of recognized segments.
#[derive(Debug)]
pub struct SegmentIter {
    inner: std::vec::IntoIter<Segment>,
}

impl SegmentIter {
    /// Wrap an already-decoded segment list.
    #[must_use]
    pub fn new(segments: Vec<Segment>) -> Self {
        Self {
            inner: segments.into_iter(),
        }
    }
}

impl Iterator for SegmentIter {
    type Item = Segment;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Speech-recognition backend seam.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe the audio file at `audio` into timed segments.
    ///
    /// # Errors
    ///
    /// Returns an error when the recognizer cannot run or its output cannot
    /// be decoded.
    async fn transcribe(&self, audio: &Path) -> PipelineResult<SegmentIter>;
}

/// Recognizer invocation options derived from configuration.
#[derive(Debug, Clone)]
pub struct TranscriberOptions {
    /// Executable name or path of the transcription CLI.
    pub command: String,
    /// Path to the speech model weights.
    pub model: PathBuf,
    /// Language hint.
    pub language: String,
    /// Beam search width.
    pub beam_size: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Probability threshold above which a segment counts as non-speech.
    pub no_speech_threshold: f32,
    /// Whether decoding conditions on previously emitted text.
    pub condition_on_previous_text: bool,
}

/// Production [`Transcriber`] shelling out to a whisper.cpp-style CLI.
#[derive(Debug)]
pub struct WhisperCommand {
    binary: PathBuf,
    options: TranscriberOptions,
}

#[derive(Debug, Deserialize)]
struct TranscriptionDoc {
    transcription: Vec<RawSegment>,
}

#[derive(Debug, Deserialize)]
struct RawSegment {
    offsets: RawOffsets,
    text: String,
}

/// Millisecond offsets as emitted by `--output-json`.
#[derive(Debug, Deserialize)]
struct RawOffsets {
    from: u64,
    to: u64,
}

impl WhisperCommand {
    /// Resolve the configured CLI binary.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::CommandMissing`] when the binary cannot be
    /// found on `PATH`.
    pub fn resolve(options: TranscriberOptions) -> PipelineResult<Self> {
        let binary =
            which::which(&options.command).map_err(|source| PipelineError::CommandMissing {
                command: options.command.clone(),
                source,
            })?;
        Ok(Self { binary, options })
    }

    /// Bind an already-located binary, bypassing `PATH` lookup.
    #[must_use]
    pub const fn with_binary(binary: PathBuf, options: TranscriberOptions) -> Self {
        Self { binary, options }
    }

    fn output_json_path(audio: &Path) -> PathBuf {
        let mut path = audio.as_os_str().to_owned();
        path.push(".json");
        PathBuf::from(path)
    }
}

#[async_trait]
impl Transcriber for WhisperCommand {
    async fn transcribe(&self, audio: &Path) -> PipelineResult<SegmentIter> {
        let json_path = Self::output_json_path(audio);
        let mut command = Command::new(&self.binary);
        command
            .arg("-m")
            .arg(&self.options.model)
            .args(["-l", &self.options.language])
            .args(["--beam-size", &self.options.beam_size.to_string()])
            .args(["--temperature", &self.options.temperature.to_string()])
            .args([
                "--no-speech-thold",
                &self.options.no_speech_threshold.to_string(),
            ])
            .args(["--output-json", "--output-file"])
            .arg(audio)
            .arg("-f")
            .arg(audio);
        if !self.options.condition_on_previous_text {
            command.arg("--no-context");
        }

        let output = command.output().await.map_err(|source| PipelineError::Io {
            operation: "spawn_transcriber",
            path: self.binary.clone(),
            source,
        })?;
        if !output.status.success() {
            return Err(PipelineError::CommandFailed {
                command: self.options.command.clone(),
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let raw = tokio::fs::read_to_string(&json_path)
            .await
            .map_err(|source| PipelineError::Io {
                operation: "read_transcription",
                path: json_path.clone(),
                source,
            })?;
        if let Err(err) = tokio::fs::remove_file(&json_path).await {
            warn!(path = %json_path.display(), error = %err, "could not remove transcription document");
        }

        let doc: TranscriptionDoc =
            serde_json::from_str(&raw).map_err(|source| PipelineError::OutputParse {
                path: json_path,
                source,
            })?;
        let segments: Vec<Segment> = doc
            .transcription
            .into_iter()
            .map(|raw| Segment {
                start_secs: millis_to_secs(raw.offsets.from),
                end_secs: millis_to_secs(raw.offsets.to),
                text: raw.text,
            })
            .collect();
        info!(segments = segments.len(), "speech recognition finished");
        Ok(SegmentIter::new(segments))
    }
}

#[allow(clippy::cast_precision_loss)]
const fn millis_to_secs(millis: u64) -> f64 {
    millis as f64 / 1_000.0
}
