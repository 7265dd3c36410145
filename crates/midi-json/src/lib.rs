//! Structural conversion of Standard MIDI Files into a JSON-friendly document.
//!
//! [`normalize`] takes raw bytes and returns a [`MidiDocument`] carrying the
//! header (name, PPQ, tempo and time-signature maps), the overall duration,
//! and every track's notes with times in seconds. Nothing is quantized,
//! merged or filtered.

pub mod document;
pub mod gm;
pub mod normalize;
pub mod parse;

pub use document::{MidiDocument, MidiHeader, MidiNote, MidiTrack, TempoEvent, TimeSignatureEvent};
pub use normalize::{normalize, normalize_parsed};
pub use parse::{parse, ParsedMidi, ParsedTrack, TickNote};

/// Errors from MIDI normalization.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("MIDI parse error: {0}")]
    MidiParse(String),
}

pub type Result<T> = std::result::Result<T, Error>;
