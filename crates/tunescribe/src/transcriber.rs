//! Audio to MIDI transcription through an external tool.

use crate::error::ConvertError;
use async_trait::async_trait;
use scribeconf::TranscriptionConfig;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

/// Suffix the transcription tool appends to the audio file stem.
pub const MIDI_SUFFIX: &str = "_basic_pitch.mid";

/// Lines of tool stderr kept in error messages.
const STDERR_TAIL_LINES: usize = 20;

/// Turns an audio file into a MIDI file inside `out_dir`.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Returns the path of the MIDI file written into `out_dir`.
    async fn transcribe(&self, audio: &Path, out_dir: &Path) -> Result<PathBuf, ConvertError>;
}

/// Where the tool writes its MIDI for a given audio file.
pub fn midi_output_path(audio: &Path, out_dir: &Path) -> PathBuf {
    let stem = audio
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    out_dir.join(format!("{stem}{MIDI_SUFFIX}"))
}

/// Runs `<command> <out_dir> <audio> --save-midi` with a hard timeout.
#[derive(Debug, Clone)]
pub struct BasicPitch {
    command: String,
    timeout: Duration,
}

impl BasicPitch {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }

    pub fn from_config(config: &TranscriptionConfig) -> Self {
        Self::new(&config.command, Duration::from_secs(config.timeout_secs))
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

#[async_trait]
impl Transcriber for BasicPitch {
    #[tracing::instrument(skip(self), fields(command = %self.command))]
    async fn transcribe(&self, audio: &Path, out_dir: &Path) -> Result<PathBuf, ConvertError> {
        let mut cmd = Command::new(&self.command);
        cmd.arg(out_dir)
            .arg(audio)
            .arg("--save-midi")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            ConvertError::Transcription(format!("failed to start {}: {e}", self.command))
        })?;

        // Dropping the wait future on timeout drops the child, which kills it
        let output = match timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| {
                ConvertError::Transcription(format!("waiting for {}: {e}", self.command))
            })?,
            Err(_) => {
                return Err(ConvertError::Transcription(format!(
                    "{} timed out after {}s",
                    self.command,
                    self.timeout.as_secs_f64()
                )));
            }
        };

        if !output.status.success() {
            return Err(ConvertError::Transcription(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr_tail(&output.stderr)
            )));
        }
        debug!(stdout = %String::from_utf8_lossy(&output.stdout).trim(), "transcription tool output");

        let midi = midi_output_path(audio, out_dir);
        if !tokio::fs::try_exists(&midi).await.unwrap_or(false) {
            return Err(ConvertError::Transcription(format!(
                "{} did not write {}",
                self.command,
                midi.display()
            )));
        }

        info!(midi = %midi.display(), "transcription complete");
        Ok(midi)
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.trim().lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
