//! Event merging and note pairing.

use std::collections::{HashMap, VecDeque};

use melody::{beats_per_measure, Decoded, DecodeError, Feedback, Melody, Note};
use midly::{MetaMessage, MidiMessage, Smf, TrackEventKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::container::check_container;

/// File-level facts reported beside the melody.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MidiSummary {
    pub format: u16,
    pub ticks_per_quarter: u16,
    pub track_count: usize,
    /// Track name meta events in track order
    pub track_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MidiTune {
    pub summary: MidiSummary,
    pub melody: Melody,
}

/// One event of interest at its absolute tick.
#[derive(Debug, Clone, Copy)]
enum Event {
    On { channel: u8, key: u8, velocity: u8 },
    Off { channel: u8, key: u8 },
    Tempo(u32),
    TimeSignature { numerator: u8, denominator_pow: u8 },
}

struct Pending {
    tick: u64,
    velocity: u8,
    order: usize,
}

/// Decode a standard MIDI file.
///
/// Tracks are merged by absolute tick, keeping file order for events on
/// the same tick. Each note-on pairs with the next note-off on the same
/// channel and key. Note-ons left open at the end, and notes with no
/// length, are dropped with a warning.
pub fn decode(bytes: &[u8]) -> Result<Decoded<MidiTune>, DecodeError> {
    let container = check_container(bytes)?;
    let smf = Smf::parse(bytes).map_err(|e| DecodeError::Format(e.to_string()))?;
    let ticks_per_quarter = f64::from(container.ticks_per_quarter);

    let mut track_names = Vec::new();
    let mut events = Vec::new();
    for track in &smf.tracks {
        let mut tick: u64 = 0;
        for event in track {
            tick += u64::from(event.delta.as_int());
            match event.kind {
                TrackEventKind::Midi { channel, message } => {
                    let channel = channel.as_int();
                    match message {
                        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                            events.push((
                                tick,
                                Event::On {
                                    channel,
                                    key: key.as_int(),
                                    velocity: vel.as_int(),
                                },
                            ));
                        }
                        // A note-on with velocity 0 is a note-off
                        MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                            events.push((
                                tick,
                                Event::Off {
                                    channel,
                                    key: key.as_int(),
                                },
                            ));
                        }
                        _ => {}
                    }
                }
                TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => {
                    events.push((tick, Event::Tempo(tempo.as_int())));
                }
                TrackEventKind::Meta(MetaMessage::TimeSignature(numerator, denominator_pow, _, _)) => {
                    events.push((
                        tick,
                        Event::TimeSignature {
                            numerator,
                            denominator_pow,
                        },
                    ));
                }
                TrackEventKind::Meta(MetaMessage::TrackName(name)) => {
                    track_names.push(String::from_utf8_lossy(name).trim().to_string());
                }
                _ => {}
            }
        }
    }
    events.sort_by_key(|(tick, _)| *tick);

    let mut feedback = Vec::new();
    let mut pending: HashMap<(u8, u8), VecDeque<Pending>> = HashMap::new();
    let mut notes: Vec<(usize, Note)> = Vec::new();
    let mut meter = None;
    let mut tempo = None;
    let mut zero_length = 0;

    for (order, (tick, event)) in events.iter().enumerate() {
        match *event {
            Event::On {
                channel,
                key,
                velocity,
            } => {
                pending.entry((channel, key)).or_default().push_back(Pending {
                    tick: *tick,
                    velocity,
                    order,
                });
            }
            Event::Off { channel, key } => {
                let Some(on) = pending.get_mut(&(channel, key)).and_then(|q| q.pop_front()) else {
                    debug!(channel, key, tick, "note-off without a note-on");
                    continue;
                };
                if *tick == on.tick {
                    zero_length += 1;
                    continue;
                }
                let start = on.tick as f64 / ticks_per_quarter;
                let duration = (*tick - on.tick) as f64 / ticks_per_quarter;
                let note = Note::new(key, start, duration)
                    .with_velocity(on.velocity)
                    .on_channel(channel);
                notes.push((on.order, note));
            }
            Event::Tempo(micros) => {
                if tempo.is_none() && micros > 0 {
                    tempo = Some(60_000_000.0 / f64::from(micros));
                }
            }
            Event::TimeSignature {
                numerator,
                denominator_pow,
            } => {
                if meter.is_none() {
                    let denominator = 1u32.checked_shl(u32::from(denominator_pow)).unwrap_or(4);
                    meter = Some(beats_per_measure(u32::from(numerator), denominator));
                }
            }
        }
    }

    if zero_length > 0 {
        warn!(count = zero_length, "dropped zero-length notes");
        feedback.push(Feedback::warning(
            format!("Dropped {} zero-length notes", zero_length),
            0,
            0,
        ));
    }
    let unmatched: usize = pending.values().map(VecDeque::len).sum();
    if unmatched > 0 {
        warn!(count = unmatched, "dropped note-ons without a note-off");
        feedback.push(Feedback::warning(
            format!("Dropped {} note-ons with no matching note-off", unmatched),
            0,
            0,
        ));
    }

    notes.sort_by_key(|(order, _)| *order);
    let mut melody = Melody::new(
        notes.into_iter().map(|(_, note)| note).collect(),
        meter.unwrap_or(4),
    );
    if let Some(bpm) = tempo {
        melody = melody.with_initial_tempo(bpm);
    }

    let summary = MidiSummary {
        format: container.format,
        ticks_per_quarter: container.ticks_per_quarter,
        track_count: smf.tracks.len(),
        track_names,
    };
    info!(
        format = summary.format,
        tracks = summary.track_count,
        notes = melody.len(),
        measures = melody.total_measures(),
        "decoded MIDI file"
    );

    Ok(Decoded::new(MidiTune { summary, melody }, feedback))
}
