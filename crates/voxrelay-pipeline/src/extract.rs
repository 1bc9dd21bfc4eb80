//! Audio extraction via an `ffmpeg` child process.
//!
//! The output is tuned for speech recognition: mono 16 kHz 16-bit PCM with a
//! band-pass keeping the voice range (80 Hz – 8 kHz).

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{PipelineError, PipelineResult};

/// Extraction options derived from configuration.
#[derive(Debug, Clone, Default)]
pub struct ExtractorOptions {
    /// Explicit path to the `ffmpeg` executable; resolved from `PATH`
    /// when absent.
    pub command: Option<PathBuf>,
    /// Directory receiving the intermediate WAV artifacts.
    pub temp_audio_dir: PathBuf,
}

/// Spawns `ffmpeg` to pull a recognition-ready audio track out of a video.
#[derive(Debug, Clone)]
pub struct AudioExtractor {
    command: PathBuf,
    temp_audio_dir: PathBuf,
}

impl AudioExtractor {
    /// Resolve the `ffmpeg` binary and bind the artifact directory.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::CommandMissing`] when no explicit command is
    /// configured and `ffmpeg` is not on `PATH`.
    pub fn resolve(options: &ExtractorOptions) -> PipelineResult<Self> {
        let command = if let Some(path) = &options.command {
            path.clone()
        } else {
            which::which("ffmpeg").map_err(|source| PipelineError::CommandMissing {
                command: "ffmpeg".to_string(),
                source,
            })?
        };
        debug!(command = %command.display(), "audio extractor resolved");
        Ok(Self {
            command,
            temp_audio_dir: options.temp_audio_dir.clone(),
        })
    }

    /// Extract `video`'s audio track into `<temp_audio_dir>/<stem>.wav`.
    ///
    /// # Errors
    ///
    /// Returns an error when `ffmpeg` cannot be spawned, exits unsuccessfully,
    /// or leaves a missing/empty artifact behind.
    pub async fn extract(&self, video: &Path) -> PipelineResult<PathBuf> {
        let stem = video
            .file_stem()
            .map_or_else(|| "audio".to_string(), |s| s.to_string_lossy().into_owned());
        let artifact = self.temp_audio_dir.join(format!("{stem}.wav"));

        let output = Command::new(&self.command)
            .arg("-i")
            .arg(video)
            .args([
                "-vn",
                "-acodec",
                "pcm_s16le",
                "-ac",
                "1",
                "-ar",
                "16000",
                "-af",
                "highpass=f=80,lowpass=f=8000",
                "-b:a",
                "256k",
                "-y",
            ])
            .arg(&artifact)
            .output()
            .await
            .map_err(|source| PipelineError::Io {
                operation: "spawn_extractor",
                path: self.command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(PipelineError::CommandFailed {
                command: "ffmpeg".to_string(),
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let metadata =
            tokio::fs::metadata(&artifact)
                .await
                .map_err(|_| PipelineError::EmptyArtifact {
                    path: artifact.clone(),
                })?;
        if metadata.len() == 0 {
            return Err(PipelineError::EmptyArtifact { path: artifact });
        }

        info!(
            artifact = %artifact.display(),
            size_bytes = metadata.len(),
            "audio extracted"
        );
        Ok(artifact)
    }
}
