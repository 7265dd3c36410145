//! The JSON shape handed back to callers.
//!
//! Field names are camelCase on the wire to match what browser clients of
//! the conversion endpoints already consume.

use serde::{Deserialize, Serialize};

/// A complete normalized MIDI document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MidiDocument {
    pub header: MidiHeader,
    /// Seconds from the start to the last event in any track.
    pub duration: f64,
    pub tracks: Vec<MidiTrack>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MidiHeader {
    pub name: String,
    pub ppq: u16,
    pub tempos: Vec<TempoEvent>,
    pub time_signatures: Vec<TimeSignatureEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoEvent {
    pub bpm: f64,
    /// Seconds from the start of the file.
    pub time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSignatureEvent {
    /// `[numerator, denominator]`, e.g. `[6, 8]`.
    pub time_signature: [u32; 2],
    /// Measures elapsed before this signature takes effect.
    pub measures: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MidiTrack {
    pub name: String,
    pub instrument: String,
    pub notes: Vec<MidiNote>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MidiNote {
    /// MIDI key number (60 = middle C).
    pub midi: u8,
    /// Onset in seconds.
    pub time: f64,
    /// Length in seconds.
    pub duration: f64,
    /// Note-on velocity scaled to 0.0–1.0.
    pub velocity: f64,
    /// Scientific pitch name, e.g. `C4`, `F#2`.
    pub name: String,
}

impl MidiDocument {
    /// Total notes across all tracks.
    pub fn note_count(&self) -> usize {
        self.tracks.iter().map(|t| t.notes.len()).sum()
    }
}
