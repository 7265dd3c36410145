//! The two conversion pipelines and the transcription step they share.

use crate::error::ConvertError;
use crate::generator::{ElevenLabs, MusicGenerator};
use crate::scratch::{ScratchDir, ScratchSpace};
use crate::transcriber::{BasicPitch, Transcriber};
use bytes::Bytes;
use midi_json::MidiDocument;
use scribeconf::ScribeConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{field, info, Span};

pub const DEFAULT_MUSIC_LENGTH_MS: u64 = 30_000;
pub const INSTRUMENTAL_SUFFIX: &str = " (instrumental version)";
pub const DEFAULT_AUDIO_EXT: &str = ".mp3";

pub const PROMPT_REQUIRED: &str = "Prompt is required";
pub const NO_AUDIO_FILE: &str = "No audio file provided";
pub const MISSING_API_KEY: &str = "Music API key is not configured on the server";

/// Body of a prompt conversion request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub music_length_ms: Option<f64>,
    #[serde(default)]
    pub force_instrumental: Option<bool>,
}

impl ConversionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            ..Self::default()
        }
    }

    /// The prompt as given, if it holds anything besides whitespace.
    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref().filter(|p| !p.trim().is_empty())
    }

    /// Prompt sent to the generator, qualified unless instrumental is turned off.
    pub fn upstream_prompt(&self) -> Option<String> {
        let prompt = self.prompt()?;
        if self.force_instrumental.unwrap_or(true) {
            Some(format!("{prompt}{INSTRUMENTAL_SUFFIX}"))
        } else {
            Some(prompt.to_string())
        }
    }

    /// Requested length, falling back to the default when absent or not positive.
    pub fn music_length_ms(&self) -> u64 {
        match self.music_length_ms {
            Some(ms) if ms.is_finite() && ms > 0.0 => ms.ceil() as u64,
            _ => DEFAULT_MUSIC_LENGTH_MS,
        }
    }
}

/// An uploaded audio file.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub filename: String,
    pub bytes: Bytes,
}

impl UploadRequest {
    /// On-disk extension for the upload: the client's, if it is a plain
    /// alphanumeric one, else `.mp3`.
    pub fn extension(&self) -> String {
        Path::new(&self.filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty() && ext.len() <= 8)
            .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|ext| format!(".{ext}"))
            .unwrap_or_else(|| DEFAULT_AUDIO_EXT.to_string())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PromptConversion {
    pub success: bool,
    pub prompt: String,
    pub midi: MidiDocument,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadConversion {
    pub success: bool,
    pub filename: String,
    pub midi: MidiDocument,
}

/// Runs conversions. Cheap to clone; holds no per-request state.
#[derive(Clone)]
pub struct Converter {
    scratch: ScratchSpace,
    transcriber: Arc<dyn Transcriber>,
    generator: Option<Arc<dyn MusicGenerator>>,
}

impl Converter {
    pub fn new(scratch: ScratchSpace, transcriber: Arc<dyn Transcriber>) -> Self {
        Self {
            scratch,
            transcriber,
            generator: None,
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn MusicGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Wire up the production transcriber and, if a credential is set, the
    /// generation service.
    pub fn from_config(config: &ScribeConfig) -> Result<Self, ConvertError> {
        let converter = Self::new(
            ScratchSpace::new(&config.paths.scratch_dir),
            Arc::new(BasicPitch::from_config(&config.transcription)),
        );

        Ok(match ElevenLabs::from_config(&config.generation)? {
            Some(client) => converter.with_generator(Arc::new(client)),
            None => converter,
        })
    }

    pub fn generation_configured(&self) -> bool {
        self.generator.is_some()
    }

    pub fn scratch(&self) -> &ScratchSpace {
        &self.scratch
    }

    /// Generate audio for a prompt and transcribe it.
    #[tracing::instrument(
        skip_all,
        fields(scratch = field::Empty, audio_bytes = field::Empty, tracks = field::Empty, notes = field::Empty)
    )]
    pub async fn convert_prompt(
        &self,
        request: &ConversionRequest,
    ) -> Result<PromptConversion, ConvertError> {
        let (Some(prompt), Some(upstream_prompt)) = (request.prompt(), request.upstream_prompt())
        else {
            return Err(ConvertError::Validation(PROMPT_REQUIRED.to_string()));
        };
        let generator = self
            .generator
            .as_ref()
            .ok_or_else(|| ConvertError::Configuration(MISSING_API_KEY.to_string()))?;

        let scratch = self.scratch.acquire().await?;
        Span::current().record("scratch", scratch.token());

        let music_length_ms = request.music_length_ms();
        info!(music_length_ms, "requesting generated audio");
        let audio = generator.compose(&upstream_prompt, music_length_ms).await?;
        Span::current().record("audio_bytes", audio.len());

        let audio_path = scratch.write("audio", DEFAULT_AUDIO_EXT, &audio).await?;
        let midi = self.transcribe(&scratch, &audio_path).await?;

        Ok(PromptConversion {
            success: true,
            prompt: prompt.to_string(),
            midi,
        })
    }

    /// Transcribe an uploaded audio file.
    #[tracing::instrument(
        skip_all,
        fields(scratch = field::Empty, audio_bytes = field::Empty, tracks = field::Empty, notes = field::Empty)
    )]
    pub async fn convert_upload(
        &self,
        upload: Option<UploadRequest>,
    ) -> Result<UploadConversion, ConvertError> {
        let upload = upload
            .filter(|u| !u.bytes.is_empty())
            .ok_or_else(|| ConvertError::Validation(NO_AUDIO_FILE.to_string()))?;
        Span::current().record("audio_bytes", upload.bytes.len());

        let scratch = self.scratch.acquire().await?;
        Span::current().record("scratch", scratch.token());

        let audio_path = scratch
            .write("upload", &upload.extension(), &upload.bytes)
            .await?;
        let midi = self.transcribe(&scratch, &audio_path).await?;

        Ok(UploadConversion {
            success: true,
            filename: upload.filename,
            midi,
        })
    }

    async fn transcribe(
        &self,
        scratch: &ScratchDir,
        audio: &Path,
    ) -> Result<MidiDocument, ConvertError> {
        let midi_path = self.transcriber.transcribe(audio, scratch.path()).await?;
        let bytes = tokio::fs::read(&midi_path).await.map_err(|e| {
            ConvertError::Transcription(format!("reading {}: {e}", midi_path.display()))
        })?;

        let midi = midi_json::normalize(&bytes)?;
        let span = Span::current();
        span.record("tracks", midi.tracks.len());
        span.record("notes", midi.note_count());
        info!(tracks = midi.tracks.len(), notes = midi.note_count(), "normalized MIDI");
        Ok(midi)
    }
}
