//! Shared fixtures: MIDI bytes, stand-in transcriber and generator, and
//! request body builders.
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tunescribe::transcriber::midi_output_path;
use tunescribe::{ConvertError, Converter, MusicGenerator, ScratchSpace, Transcriber};

fn event(delta: u32, kind: TrackEventKind<'static>) -> TrackEvent<'static> {
    TrackEvent {
        delta: u28::from(delta),
        kind,
    }
}

fn note(on: bool, key: u8, vel: u8) -> TrackEventKind<'static> {
    let key = u7::from(key);
    let vel = u7::from(vel);
    TrackEventKind::Midi {
        channel: u4::from(0),
        message: if on {
            MidiMessage::NoteOn { key, vel }
        } else {
            MidiMessage::NoteOff { key, vel }
        },
    }
}

/// Format 1, 220 PPQ, 120 BPM: a conductor track and a piano track holding
/// C4, E4, G4 as quarter notes from 0.5s.
pub fn piano_midi() -> Vec<u8> {
    let mut smf = Smf::new(Header::new(Format::Parallel, Timing::Metrical(u15::from(220))));
    smf.tracks.push(vec![
        event(0, TrackEventKind::Meta(MetaMessage::Tempo(u24::from(500_000)))),
        event(0, TrackEventKind::Meta(MetaMessage::TimeSignature(4, 2, 24, 8))),
        event(0, TrackEventKind::Meta(MetaMessage::EndOfTrack)),
    ]);
    smf.tracks.push(vec![
        event(
            0,
            TrackEventKind::Midi {
                channel: u4::from(0),
                message: MidiMessage::ProgramChange {
                    program: u7::from(0),
                },
            },
        ),
        event(220, note(true, 60, 100)),
        event(110, note(false, 60, 0)),
        event(0, note(true, 64, 100)),
        event(110, note(false, 64, 0)),
        event(0, note(true, 67, 100)),
        event(110, note(false, 67, 0)),
        event(0, TrackEventKind::Meta(MetaMessage::EndOfTrack)),
    ]);

    let mut buf = Vec::new();
    smf.write_std(&mut buf).unwrap();
    buf
}

/// Writes fixed MIDI bytes where the real tool would, and remembers each
/// audio path it was given.
pub struct FixtureTranscriber {
    midi: Vec<u8>,
    pub seen: Mutex<Vec<PathBuf>>,
}

impl FixtureTranscriber {
    pub fn new(midi: Vec<u8>) -> Self {
        Self {
            midi,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl Transcriber for FixtureTranscriber {
    async fn transcribe(&self, audio: &Path, out_dir: &Path) -> Result<PathBuf, ConvertError> {
        assert!(audio.exists(), "audio must be on disk before transcription");
        self.seen.lock().unwrap().push(audio.to_path_buf());
        let midi = midi_output_path(audio, out_dir);
        std::fs::write(&midi, &self.midi).unwrap();
        Ok(midi)
    }
}

pub struct FailingTranscriber;

#[async_trait]
impl Transcriber for FailingTranscriber {
    async fn transcribe(&self, _audio: &Path, _out_dir: &Path) -> Result<PathBuf, ConvertError> {
        Err(ConvertError::Transcription("basic-pitch exited with exit status: 1".into()))
    }
}

/// Returns canned audio, or a canned upstream failure, and records calls.
pub struct StubGenerator {
    outcome: Result<Bytes, u16>,
    calls: AtomicUsize,
    pub requests: Mutex<Vec<(String, u64)>>,
}

impl StubGenerator {
    pub fn audio(bytes: &'static [u8]) -> Self {
        Self::with_outcome(Ok(Bytes::from_static(bytes)))
    }

    pub fn failing(status: u16) -> Self {
        Self::with_outcome(Err(status))
    }

    fn with_outcome(outcome: Result<Bytes, u16>) -> Self {
        Self {
            outcome,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MusicGenerator for StubGenerator {
    async fn compose(&self, prompt: &str, music_length_ms: u64) -> Result<Bytes, ConvertError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap()
            .push((prompt.to_string(), music_length_ms));
        match &self.outcome {
            Ok(bytes) => Ok(bytes.clone()),
            Err(status) => Err(ConvertError::Upstream {
                status: Some(*status),
                message: format!("music service error ({status}): quota exceeded"),
            }),
        }
    }
}

/// A converter over a fresh scratch root. Keep the `TempDir` alive for the test.
pub fn converter(
    transcriber: Arc<dyn Transcriber>,
    generator: Option<Arc<dyn MusicGenerator>>,
) -> (Converter, TempDir) {
    let root = TempDir::new().unwrap();
    let converter = Converter::new(ScratchSpace::new(root.path().join("scratch")), transcriber);
    let converter = match generator {
        Some(generator) => converter.with_generator(generator),
        None => converter,
    };
    (converter, root)
}

/// Number of entries left in a scratch root (0 if it was never created).
pub fn leftovers(root: &Path) -> usize {
    std::fs::read_dir(root.join("scratch"))
        .map(|d| d.count())
        .unwrap_or(0)
}

pub const BOUNDARY: &str = "tunescribe-test-boundary";

/// A multipart/form-data body with one file field.
pub fn multipart_body(field: &str, filename: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}
