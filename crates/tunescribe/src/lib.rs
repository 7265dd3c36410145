//! Convert songs to MIDI JSON.
//!
//! Two pipelines share one transcription step. A prompt goes to a music
//! generation service and comes back as audio; an upload is audio already.
//! Either way the audio lands in a per-request scratch directory, an external
//! pitch-detection tool writes MIDI next to it, and [`midi_json`] turns that
//! MIDI into the response document.

pub mod error;
pub mod generator;
pub mod pipeline;
pub mod scratch;
pub mod telemetry;
pub mod transcriber;
pub mod web;

pub use error::ConvertError;
pub use generator::{ElevenLabs, MusicGenerator};
pub use pipeline::{ConversionRequest, Converter, UploadRequest};
pub use scratch::{ScratchDir, ScratchSpace};
pub use transcriber::{BasicPitch, Transcriber};
pub use web::{router, AppState};
