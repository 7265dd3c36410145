//! Second stage: tick-level structure to the JSON document.

use crate::document::{MidiDocument, MidiHeader, MidiNote, MidiTrack, TempoEvent, TimeSignatureEvent};
use crate::gm;
use crate::parse::{parse, ParsedMidi, ParsedTrack};
use crate::Result;

/// Parse raw MIDI bytes and convert them to a [`MidiDocument`].
pub fn normalize(bytes: &[u8]) -> Result<MidiDocument> {
    let parsed = parse(bytes)?;
    Ok(normalize_parsed(&parsed))
}

/// Convert an already parsed file. Every track, note, tempo and time
/// signature carries over one to one and in order. Tempo times and measure
/// counts that were never resolved become 0.
pub fn normalize_parsed(parsed: &ParsedMidi) -> MidiDocument {
    let header = MidiHeader {
        name: parsed.name.clone(),
        ppq: parsed.ppq,
        tempos: parsed
            .tempos
            .iter()
            .map(|t| TempoEvent {
                bpm: t.bpm,
                time: t.time.unwrap_or(0.0),
            })
            .collect(),
        time_signatures: parsed
            .time_signatures
            .iter()
            .map(|ts| TimeSignatureEvent {
                time_signature: [ts.numerator, ts.denominator],
                measures: ts.measures.unwrap_or(0.0),
            })
            .collect(),
    };

    MidiDocument {
        header,
        duration: parsed.seconds_at(parsed.end_tick),
        tracks: parsed
            .tracks
            .iter()
            .map(|track| normalize_track(parsed, track))
            .collect(),
    }
}

fn normalize_track(parsed: &ParsedMidi, track: &ParsedTrack) -> MidiTrack {
    let instrument = gm::instrument_name(track.program, track.channel.unwrap_or(0));

    let notes = track
        .notes
        .iter()
        .map(|note| {
            let time = parsed.seconds_at(note.start);
            MidiNote {
                midi: note.key,
                time,
                duration: parsed.seconds_at(note.end) - time,
                velocity: f64::from(note.velocity) / 127.0,
                name: gm::pitch_name(note.key),
            }
        })
        .collect();

    MidiTrack {
        name: track.name.clone(),
        instrument,
        notes,
    }
}
