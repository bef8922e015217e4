use serde::{Deserialize, Serialize};

/// Kind of a decoded channel message. Only note messages reach the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    NoteOn,
    NoteOff,
}

/// One decoded note event, in temporal order within the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub kind: EventKind,
    pub channel: u8,
    /// Absolute MIDI pitch.
    pub note: u8,
    pub velocity: u8,
}

impl NoteEvent {
    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Self {
            kind: EventKind::NoteOn,
            channel,
            note,
            velocity,
        }
    }

    pub fn note_off(channel: u8, note: u8) -> Self {
        Self {
            kind: EventKind::NoteOff,
            channel,
            note,
            velocity: 0,
        }
    }

    /// A note-on with nonzero velocity.
    pub fn is_sounding(&self) -> bool {
        self.kind == EventKind::NoteOn && self.velocity > 0
    }

    /// A note-off, or a note-on with velocity 0.
    pub fn is_release(&self) -> bool {
        !self.is_sounding()
    }
}

/// How note pairs are counted as transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// One note at a time: each sounding note follows the previous one.
    #[default]
    Monophonic,
    /// Chord-aware: overlapping notes count as mutual transitions.
    Polyphonic,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Monophonic => write!(f, "monophonic"),
            Mode::Polyphonic => write!(f, "polyphonic"),
        }
    }
}
