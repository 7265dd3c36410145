//! External collaborator configuration - the music generation service and
//! the audio-to-MIDI transcription tool.

use serde::{Deserialize, Serialize};

/// Music generation service (ElevenLabs music API).
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Service credential. Absent by default; without it prompt
    /// conversion is refused before any outbound call.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL of the service.
    /// Default: https://api.elevenlabs.io
    #[serde(default = "GenerationConfig::default_base_url")]
    pub base_url: String,

    /// Model identifier sent with each compose request.
    /// Default: music_v1
    #[serde(default = "GenerationConfig::default_model_id")]
    pub model_id: String,

    /// Audio encoding requested from the service.
    /// Default: mp3_44100_128
    #[serde(default = "GenerationConfig::default_output_format")]
    pub output_format: String,

    /// Upper bound for one compose call, including the audio download.
    /// Default: 300
    #[serde(default = "GenerationConfig::default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl GenerationConfig {
    fn default_base_url() -> String {
        "https://api.elevenlabs.io".to_string()
    }

    fn default_model_id() -> String {
        "music_v1".to_string()
    }

    fn default_output_format() -> String {
        "mp3_44100_128".to_string()
    }

    fn default_request_timeout_secs() -> u64 {
        300
    }

    /// The credential, treating an empty string as absent.
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: Self::default_base_url(),
            model_id: Self::default_model_id(),
            output_format: Self::default_output_format(),
            request_timeout_secs: Self::default_request_timeout_secs(),
        }
    }
}

// Hand-written so the credential never lands in logs.
impl std::fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model_id", &self.model_id)
            .field("output_format", &self.output_format)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Audio-to-MIDI transcription subprocess.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// Program to execute. Invoked as `<command> <outdir> <audio> --save-midi`.
    /// Default: basic-pitch
    #[serde(default = "TranscriptionConfig::default_command")]
    pub command: String,

    /// Hard limit on one transcription run.
    /// Default: 120
    #[serde(default = "TranscriptionConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl TranscriptionConfig {
    fn default_command() -> String {
        "basic-pitch".to_string()
    }

    fn default_timeout_secs() -> u64 {
        120
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            command: Self::default_command(),
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_defaults() {
        let generation = GenerationConfig::default();
        assert!(generation.api_key.is_none());
        assert_eq!(generation.credential(), None);
        assert_eq!(generation.base_url, "https://api.elevenlabs.io");
        assert_eq!(generation.model_id, "music_v1");
    }

    #[test]
    fn test_blank_credential_is_absent() {
        let generation = GenerationConfig {
            api_key: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(generation.credential(), None);
    }

    #[test]
    fn test_debug_redacts_credential() {
        let generation = GenerationConfig {
            api_key: Some("sk-secret".to_string()),
            ..Default::default()
        };
        let rendered = format!("{:?}", generation);
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_transcription_defaults() {
        let transcription = TranscriptionConfig::default();
        assert_eq!(transcription.command, "basic-pitch");
        assert_eq!(transcription.timeout_secs, 120);
    }
}
