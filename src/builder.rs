//! Event stream → transition matrix.
//!
//! Both modes fold the events of one channel into a 48×48 table of raw
//! transition counts, then normalize rows into probabilities.
//!
//! Monophonic: each sounding note in the window follows the previous one. A
//! sounding note outside the window breaks the chain.
//!
//! Polyphonic: a new note counts as a mutual transition with every note still
//! sounding, plus a one-way transition from each note of the previous chord.
//! The previous chord is snapshotted from the sounding set at the first
//! release and then kept for the rest of the stream.

use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

use crate::events::{Mode, NoteEvent};
use crate::matrix::{TransitionMatrix, pitch_to_index};
use crate::midi::{self, DecodeError};
use crate::{MAX_CHANNEL, NUM_NOTES};

/// Entries below this probability are zeroed after normalization.
pub const NOISE_THRESHOLD: f64 = 0.01;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Target channel must be between 0 and 15, got {0}")]
    InvalidChannel(i32),
    #[error("Decode failed: {0}")]
    Decode(#[from] DecodeError),
}

/// Raw transition counts, indexed `[from * NUM_NOTES + to]`.
struct Counts {
    cells: Vec<u64>,
    total: u64,
}

impl Counts {
    fn new() -> Self {
        Self {
            cells: vec![0; NUM_NOTES * NUM_NOTES],
            total: 0,
        }
    }

    fn bump(&mut self, from: usize, to: usize) {
        self.cells[from * NUM_NOTES + to] += 1;
        self.total += 1;
    }
}

#[derive(Default)]
struct MonoState {
    prev: Option<usize>,
}

impl MonoState {
    fn step(mut self, counts: &mut Counts, event: &NoteEvent) -> Self {
        if !event.is_sounding() {
            return self;
        }
        match pitch_to_index(event.note) {
            Some(current) => {
                if let Some(prev) = self.prev {
                    counts.bump(prev, current);
                }
                self.prev = Some(current);
            }
            None => self.prev = None,
        }
        self
    }
}

#[derive(Default)]
struct PolyState {
    active: BTreeSet<usize>,
    prev_chord: BTreeSet<usize>,
}

impl PolyState {
    fn step(mut self, counts: &mut Counts, event: &NoteEvent) -> Self {
        let Some(index) = pitch_to_index(event.note) else {
            return self;
        };

        if event.is_sounding() {
            for &held in &self.active {
                counts.bump(held, index);
                counts.bump(index, held);
            }
            for &prior in &self.prev_chord {
                counts.bump(prior, index);
            }
            self.active.insert(index);
        } else {
            if self.prev_chord.is_empty() && !self.active.is_empty() {
                self.prev_chord = self.active.clone();
            }
            self.active.remove(&index);
        }
        self
    }
}

fn validate_channel(target_channel: i32) -> Result<u8, BuildError> {
    if (0..=MAX_CHANNEL as i32).contains(&target_channel) {
        Ok(target_channel as u8)
    } else {
        Err(BuildError::InvalidChannel(target_channel))
    }
}

/// Build a row-normalized transition matrix from the events of one channel.
///
/// Events on other channels are ignored. Fails only if `target_channel` is
/// outside 0–15.
pub fn build_transition_matrix(
    events: &[NoteEvent],
    target_channel: i32,
    mode: Mode,
) -> Result<TransitionMatrix, BuildError> {
    let channel = validate_channel(target_channel)?;

    let mut counts = Counts::new();
    let on_channel = events.iter().filter(|e| e.channel == channel);
    let participating = on_channel.clone().count();

    match mode {
        Mode::Monophonic => {
            on_channel.fold(MonoState::default(), |state, e| state.step(&mut counts, e));
        }
        Mode::Polyphonic => {
            on_channel.fold(PolyState::default(), |state, e| state.step(&mut counts, e));
        }
    }

    log::debug!(
        "Channel {} ({}): {} events, {} transitions counted",
        channel,
        mode,
        participating,
        counts.total
    );

    Ok(TransitionMatrix::from_counts(
        NUM_NOTES,
        &counts.cells,
        NOISE_THRESHOLD,
    ))
}

/// Decode SMF bytes and build the transition matrix for one channel.
pub fn build_from_smf(
    bytes: &[u8],
    target_channel: i32,
    mode: Mode,
) -> Result<TransitionMatrix, BuildError> {
    validate_channel(target_channel)?;
    let events = midi::decode_smf(bytes)?;
    build_transition_matrix(&events, target_channel, mode)
}

/// Read a MIDI file and build the transition matrix for one channel.
pub fn build_from_file(
    path: &Path,
    target_channel: i32,
    mode: Mode,
) -> Result<TransitionMatrix, BuildError> {
    validate_channel(target_channel)?;
    let events = midi::decode_file(path)?;
    log::info!("Loaded {} note events from {}", events.len(), path.display());
    build_transition_matrix(&events, target_channel, mode)
}
