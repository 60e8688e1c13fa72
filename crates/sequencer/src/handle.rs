//! Shared sequencer handle with a live ticker.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use melody::{Melody, Note};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::transport::{Advance, ConfigError, PlayState, SequencerConfig, Snapshot, Transport};

/// Playback cursor over one melody.
///
/// Cloning gives another handle to the same sequencer. All state sits
/// behind one mutex shared by the ticker task and every transport call.
/// At most one ticker runs at a time; `pause`, `stop` and `load` retire
/// it before they return, so the cursor never moves after they do.
///
/// Reads fold in the time elapsed since the last tick, so the reported
/// position is current even between ticks.
#[derive(Clone)]
pub struct Sequencer {
    shared: Arc<Mutex<Shared>>,
    tick_interval: Duration,
}

struct Shared {
    transport: Transport,
    /// Instant up to which elapsed time has been applied, while playing
    last_tick: Option<Instant>,
    /// Bumped whenever a ticker is retired; a ticker only advances while
    /// its own generation is current
    generation: u64,
    cancel: Option<CancellationToken>,
    updates: watch::Sender<Snapshot>,
}

impl Shared {
    fn catch_up(&mut self, now: Instant) -> Advance {
        let Some(last) = self.last_tick else {
            return Advance::Idle;
        };
        self.last_tick = Some(now);
        let outcome = self.transport.advance(now.saturating_duration_since(last));
        if outcome == Advance::Finished {
            info!(beat = self.transport.beat(), "playback finished");
            self.retire_ticker();
        }
        outcome
    }

    fn retire_ticker(&mut self) {
        self.generation += 1;
        self.last_tick = None;
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
    }

    fn publish(&self) {
        self.updates.send_replace(self.transport.snapshot());
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Sequencer {
    /// Fails when the config's tempo bounds or tick interval are unusable.
    pub fn new(melody: Melody, config: SequencerConfig) -> Result<Self, ConfigError> {
        let tick_interval = config.tick_interval;
        let transport = Transport::new(Arc::new(melody), config)?;
        let (updates, _) = watch::channel(transport.snapshot());
        Ok(Self {
            shared: Arc::new(Mutex::new(Shared {
                transport,
                last_tick: None,
                generation: 0,
                cancel: None,
                updates,
            })),
            tick_interval,
        })
    }

    /// Replace the melody. Stops playback and resets position, region and
    /// transposition.
    pub fn load(&self, melody: Melody) {
        let mut shared = lock(&self.shared);
        shared.retire_ticker();
        shared.transport.load(Arc::new(melody));
        info!(
            notes = shared.transport.melody().len(),
            measures = shared.transport.melody().total_measures(),
            "melody loaded"
        );
        shared.publish();
    }

    /// Start or resume playback and spawn the ticker. A no-op returning
    /// `false` when already playing.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn play(&self) -> bool {
        let mut shared = lock(&self.shared);
        if !shared.transport.play() {
            return false;
        }
        shared.retire_ticker();
        shared.last_tick = Some(Instant::now());

        let token = CancellationToken::new();
        shared.cancel = Some(token.clone());
        let generation = shared.generation;
        info!(
            beat = shared.transport.beat(),
            tempo = shared.transport.tempo(),
            "playback started"
        );
        shared.publish();
        drop(shared);

        tokio::spawn(run_ticker(
            Arc::clone(&self.shared),
            generation,
            token,
            self.tick_interval,
        ));
        true
    }

    /// Freeze the cursor where it is now. Returns `false` unless playing.
    pub fn pause(&self) -> bool {
        let mut shared = lock(&self.shared);
        shared.catch_up(Instant::now());
        if !shared.transport.pause() {
            return false;
        }
        shared.retire_ticker();
        info!(beat = shared.transport.beat(), "playback paused");
        shared.publish();
        true
    }

    /// Stop and return to the start of the region.
    pub fn stop(&self) {
        let mut shared = lock(&self.shared);
        shared.retire_ticker();
        shared.transport.stop();
        info!("playback stopped");
        shared.publish();
    }

    /// Return to the start of the region, keeping the play state.
    pub fn rewind(&self) {
        self.mutate(|t| t.rewind());
    }

    pub fn set_position(&self, beat: f64) -> f64 {
        self.mutate(|t| t.set_position(beat))
    }

    /// Returns `false`, keeping the old region, when the request is invalid.
    pub fn set_region(&self, start_measure: u32, end_measure: u32) -> bool {
        self.mutate(|t| t.set_region(start_measure, end_measure))
    }

    /// Returns the tempo actually applied after clamping.
    pub fn set_tempo(&self, bpm: f64) -> f64 {
        self.mutate(|t| t.set_tempo(bpm))
    }

    pub fn set_looping(&self, looping: bool) {
        self.mutate(|t| t.set_looping(looping));
    }

    pub fn set_transpose(&self, semitones: i32) {
        self.mutate(|t| t.set_transpose(semitones));
    }

    /// Apply a change at the current instant: elapsed time is credited at
    /// the old settings first.
    fn mutate<T>(&self, change: impl FnOnce(&mut Transport) -> T) -> T {
        let mut shared = lock(&self.shared);
        shared.catch_up(Instant::now());
        let result = change(&mut shared.transport);
        shared.publish();
        result
    }

    fn read<T>(&self, view: impl FnOnce(&Transport) -> T) -> T {
        let mut shared = lock(&self.shared);
        shared.catch_up(Instant::now());
        view(&shared.transport)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.read(Transport::snapshot)
    }

    pub fn is_playing(&self) -> bool {
        self.read(|t| t.state() == PlayState::Playing)
    }

    /// Notes under the cursor, transposed.
    pub fn sounding_notes(&self) -> Vec<Note> {
        self.read(Transport::sounding_notes)
    }

    /// Notes overlapping `[start, end)`, transposed.
    pub fn notes_between(&self, start: f64, end: f64) -> Vec<Note> {
        self.read(|t| t.notes_between(start, end))
    }

    pub fn melody(&self) -> Arc<Melody> {
        self.read(|t| Arc::clone(t.melody()))
    }

    /// Snapshots published on every tick and every transport change.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        lock(&self.shared).updates.subscribe()
    }
}

async fn run_ticker(
    shared: Arc<Mutex<Shared>>,
    generation: u64,
    token: CancellationToken,
    period: Duration,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately
    ticker.tick().await;
    debug!(generation, ?period, "ticker started");

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                if !tick(&shared, generation) {
                    break;
                }
            }
        }
    }
    debug!(generation, "ticker stopped");
}

/// One tick. Returns `false` once this ticker should exit.
fn tick(shared: &Mutex<Shared>, generation: u64) -> bool {
    let mut shared = lock(shared);
    if shared.generation != generation {
        return false;
    }
    let outcome = shared.catch_up(Instant::now());
    shared.publish();
    outcome != Advance::Finished
}
