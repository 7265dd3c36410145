//! First stage: raw bytes to tick-level structure plus a tempo map.

use crate::{Error, Result};
use midly::{Format, MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::collections::{HashMap, VecDeque};

/// Beats per minute assumed before the first tempo event.
///
/// This also times a first tempo event placed after tick 0: a 60 BPM mark at
/// beat one lands at 0.5s. Some JavaScript MIDI readers time that first mark
/// at its own BPM instead, so their `time` differs for such files.
pub const DEFAULT_BPM: f64 = 120.0;

/// Ticks per quarter reported for SMPTE timecode files.
pub const TIMECODE_PPQ: u16 = 480;

/// A MIDI file reduced to what the JSON document needs, still in ticks.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMidi {
    pub name: String,
    pub ppq: u16,
    /// True when the header declared SMPTE timecode rather than metrical ticks.
    pub timecode: bool,
    pub tempos: Vec<TempoMark>,
    pub time_signatures: Vec<MeterMark>,
    pub tracks: Vec<ParsedTrack>,
    /// Latest event tick in any track, conductor included.
    pub end_tick: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TempoMark {
    pub tick: u64,
    pub bpm: f64,
    /// Seconds from the start, once the tempo map has been resolved.
    pub time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeterMark {
    pub tick: u64,
    pub numerator: u32,
    pub denominator: u32,
    /// Measures elapsed before this mark. Unresolved without metrical timing.
    pub measures: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTrack {
    pub name: String,
    /// First program change in the track, 0 if there is none.
    pub program: u8,
    /// Channel of the first channel message, if the track has any.
    pub channel: Option<u8>,
    /// Notes in onset order.
    pub notes: Vec<TickNote>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickNote {
    pub key: u8,
    pub start: u64,
    pub end: u64,
    pub velocity: u8,
}

impl ParsedMidi {
    /// Seconds elapsed at `tick`, using the last tempo at or before it.
    pub fn seconds_at(&self, tick: u64) -> f64 {
        seconds_at(tick, self.ppq, &self.tempos)
    }

    pub fn note_count(&self) -> usize {
        self.tracks.iter().map(|t| t.notes.len()).sum()
    }
}

/// Parse a Standard MIDI File.
pub fn parse(bytes: &[u8]) -> Result<ParsedMidi> {
    let smf = Smf::parse(bytes).map_err(|e| Error::MidiParse(e.to_string()))?;

    let (ppq, timecode) = match smf.header.timing {
        Timing::Metrical(ticks) => (ticks.as_int(), false),
        Timing::Timecode(_, _) => (TIMECODE_PPQ, true),
    };

    let mut name = String::new();
    let mut tempos = Vec::new();
    let mut time_signatures = Vec::new();
    let mut tracks = Vec::with_capacity(smf.tracks.len());
    let mut end_tick: u64 = 0;

    for (index, events) in smf.tracks.iter().enumerate() {
        let mut current_tick: u64 = 0;
        let mut track_name: Option<String> = None;
        let mut program: Option<u8> = None;
        let mut channel: Option<u8> = None;
        let mut open: HashMap<(u8, u8), VecDeque<(usize, u64, u8)>> = HashMap::new();
        let mut closed: Vec<(usize, TickNote)> = Vec::new();
        let mut next_seq = 0usize;

        for event in events {
            current_tick += u64::from(event.delta.as_int());

            match event.kind {
                TrackEventKind::Meta(MetaMessage::TrackName(raw)) => {
                    let text = String::from_utf8_lossy(raw).into_owned();
                    if index == 0 {
                        name = text.clone();
                    }
                    track_name.get_or_insert(text);
                }
                TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => {
                    tempos.push(TempoMark {
                        tick: current_tick,
                        bpm: 60_000_000.0 / f64::from(tempo.as_int().max(1)),
                        time: None,
                    });
                }
                TrackEventKind::Meta(MetaMessage::TimeSignature(num, denom_pow, _, _)) => {
                    time_signatures.push(MeterMark {
                        tick: current_tick,
                        numerator: u32::from(num),
                        denominator: 2u32.saturating_pow(u32::from(denom_pow)),
                        measures: None,
                    });
                }
                TrackEventKind::Midi { channel: ch, message } => {
                    let ch = ch.as_int();
                    channel.get_or_insert(ch);
                    match message {
                        MidiMessage::ProgramChange { program: p } => {
                            program.get_or_insert(p.as_int());
                        }
                        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                            open.entry((ch, key.as_int())).or_default().push_back((
                                next_seq,
                                current_tick,
                                vel.as_int(),
                            ));
                            next_seq += 1;
                        }
                        // NoteOn with velocity 0 is a NoteOff
                        MidiMessage::NoteOff { key, .. } | MidiMessage::NoteOn { key, .. } => {
                            let key = key.as_int();
                            if let Some((seq, start, velocity)) =
                                open.get_mut(&(ch, key)).and_then(VecDeque::pop_front)
                            {
                                closed.push((
                                    seq,
                                    TickNote {
                                        key,
                                        start,
                                        end: current_tick,
                                        velocity,
                                    },
                                ));
                            }
                        }
                        _ => {}
                    }
                }
                _ => {}
            }
        }

        // Close any unclosed notes at the track's final tick
        for ((_, key), pending) in open {
            for (seq, start, velocity) in pending {
                closed.push((
                    seq,
                    TickNote {
                        key,
                        start,
                        end: current_tick,
                        velocity,
                    },
                ));
            }
        }
        closed.sort_by_key(|(seq, _)| *seq);

        end_tick = end_tick.max(current_tick);
        tracks.push(ParsedTrack {
            name: track_name.unwrap_or_default(),
            program: program.unwrap_or(0),
            channel,
            notes: closed.into_iter().map(|(_, note)| note).collect(),
        });
    }

    // Format 1 puts tempo and meter in a leading conductor track
    if smf.header.format == Format::Parallel
        && tracks.len() > 1
        && tracks.first().is_some_and(|t| t.notes.is_empty())
    {
        tracks.remove(0);
    }

    tempos.sort_by_key(|t| t.tick);
    time_signatures.sort_by_key(|t| t.tick);

    resolve_tempo_times(&mut tempos, ppq);
    if !timecode {
        resolve_measures(&mut time_signatures, ppq);
    }

    Ok(ParsedMidi {
        name,
        ppq,
        timecode,
        tempos,
        time_signatures,
        tracks,
        end_tick,
    })
}

fn resolve_tempo_times(tempos: &mut [TempoMark], ppq: u16) {
    for i in 0..tempos.len() {
        let time = seconds_at(tempos[i].tick, ppq, &tempos[..i]);
        tempos[i].time = Some(time);
    }
}

fn resolve_measures(signatures: &mut [MeterMark], ppq: u16) {
    let mut previous: Option<(u64, u32, u32, f64)> = None;
    for mark in signatures.iter_mut() {
        let measures = match previous {
            None => 0.0,
            Some((tick, numerator, denominator, measures)) => {
                let beats = (mark.tick - tick) as f64 / f64::from(ppq.max(1));
                // Beats are quarter notes: a 6/8 bar holds three of them and a
                // 2/2 bar four. This counts real bars; readers that scale by
                // d/4 instead of 4/d report other values off a /4 meter.
                let beats_per_measure = f64::from(numerator) * 4.0 / f64::from(denominator);
                if beats_per_measure > 0.0 {
                    measures + beats / beats_per_measure
                } else {
                    measures
                }
            }
        };
        mark.measures = Some(measures);
        previous = Some((mark.tick, mark.numerator, mark.denominator, measures));
    }
}

/// Tick to seconds over a tick-sorted tempo list whose times are resolved.
fn seconds_at(tick: u64, ppq: u16, tempos: &[TempoMark]) -> f64 {
    let beats = |ticks: u64| ticks as f64 / f64::from(ppq.max(1));
    let Some(index) = tempos.iter().rposition(|t| t.tick <= tick) else {
        return beats(tick) * (60.0 / DEFAULT_BPM);
    };
    let anchor = &tempos[index];
    let anchor_time = anchor
        .time
        .unwrap_or_else(|| seconds_at(anchor.tick, ppq, &tempos[..index]));
    anchor_time + beats(tick - anchor.tick) * (60.0 / anchor.bpm)
}
