//! Failure kinds of a conversion request.
//!
//! Variants carry what went wrong, not how to report it. The web layer decides
//! HTTP status and envelope wording.

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    /// The caller sent something unusable. Raised before any external call.
    #[error("{0}")]
    Validation(String),

    /// The server is missing something it needs, such as a credential.
    #[error("{0}")]
    Configuration(String),

    /// The music generation service failed or answered with an error.
    #[error("{message}")]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    /// The transcription tool failed, timed out, or produced unusable MIDI.
    #[error("{0}")]
    Transcription(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl ConvertError {
    /// Adapter for `map_err` on filesystem calls.
    pub fn io(context: impl Into<String>) -> impl FnOnce(io::Error) -> Self {
        let context = context.into();
        move |source| ConvertError::Io { context, source }
    }

    /// HTTP status reported by the generation service, when one was received.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            ConvertError::Upstream { status, .. } => *status,
            _ => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ConvertError::Validation(_))
    }
}

impl From<midi_json::Error> for ConvertError {
    fn from(e: midi_json::Error) -> Self {
        ConvertError::Transcription(format!("transcribed MIDI is unreadable: {e}"))
    }
}
