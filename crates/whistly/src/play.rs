//! `whistly play`: drive the sequencer and print the cursor.

use std::time::Duration;

use anyhow::{Context, Result};
use melody::Melody;
use sequencer::{PlayState, Sequencer, SequencerConfig, Snapshot};
use tracing::{info, warn};
use whistle_theory::{pitch_to_fingering, InstrumentProfile};
use whistleconf::PlaybackConfig;

use crate::report::note_label;

pub struct PlayOptions {
    pub tempo: Option<f64>,
    pub transpose: i32,
    pub seconds: Option<f64>,
    pub region: Option<(u32, u32)>,
    pub looping: bool,
}

pub fn sequencer_config(playback: &PlaybackConfig) -> SequencerConfig {
    SequencerConfig {
        tick_interval: playback.tick_interval(),
        min_tempo: playback.min_tempo,
        max_tempo: playback.max_tempo,
        default_tempo: playback.default_tempo,
        looping: playback.looping,
    }
}

/// Play until the region ends, the time limit passes, or Ctrl-C.
pub async fn run(
    melody: Melody,
    profile: &InstrumentProfile,
    config: SequencerConfig,
    options: PlayOptions,
) -> Result<()> {
    let initial_tempo = melody.initial_tempo();
    let seq = Sequencer::new(melody, config).context("sequencer settings")?;

    if let Some((start, end)) = options.region {
        if !seq.set_region(start, end) {
            warn!(start, end, "ignoring region, playing the whole tune");
        }
    }
    seq.set_looping(options.looping);
    seq.set_transpose(options.transpose);
    if let Some(bpm) = options.tempo.or(initial_tempo) {
        let applied = seq.set_tempo(bpm);
        if applied != bpm {
            warn!(requested = bpm, applied, "tempo clamped");
        }
    }

    let mut updates = seq.subscribe();
    seq.play();

    let limit = options.seconds.map(Duration::from_secs_f64);
    let deadline = tokio::time::sleep(limit.unwrap_or(Duration::ZERO));
    tokio::pin!(deadline);

    let mut printer = CursorPrinter::default();
    loop {
        tokio::select! {
            _ = &mut deadline, if limit.is_some() => {
                info!("time limit reached");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = *updates.borrow_and_update();
                printer.show(&seq, &snapshot, profile);
                if snapshot.state == PlayState::Stopped {
                    break;
                }
            }
        }
    }

    seq.stop();
    Ok(())
}

/// Prints a line whenever the measure or the sounding notes change.
#[derive(Default)]
struct CursorPrinter {
    last: Option<(u32, Vec<u8>)>,
}

impl CursorPrinter {
    fn show(&mut self, seq: &Sequencer, snapshot: &Snapshot, profile: &InstrumentProfile) {
        let sounding = seq.sounding_notes();
        let pitches: Vec<u8> = sounding.iter().map(|n| n.pitch).collect();
        let key = (snapshot.measure, pitches);
        if self.last.as_ref() == Some(&key) {
            return;
        }
        let labels: Vec<String> = key
            .1
            .iter()
            .map(|&p| note_label(p, pitch_to_fingering(p, profile)))
            .collect();
        let notes = if labels.is_empty() {
            "rest".to_string()
        } else {
            labels.join("  ")
        };
        println!(
            "m{:<3} {:>5.2}  {notes}",
            snapshot.measure, snapshot.beat_in_measure
        );
        self.last = Some(key);
    }
}
