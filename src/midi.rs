//! Standard MIDI File decoding into an ordered note-event stream.
//!
//! Single-track and parallel (format 0 and 1) files are supported. All tracks
//! are merged into one stream ordered by absolute tick. The merge is
//! stable: simultaneous events keep track order, then in-track order. Only
//! note-on/note-off channel messages are emitted; everything else (meta,
//! sysex, controllers, program changes) is dropped here.

use midly::{Format, MidiMessage, Smf, TrackEventKind};
use std::path::Path;
use thiserror::Error;

use crate::events::NoteEvent;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed MIDI file: {0}")]
    Malformed(#[from] midly::Error),
    #[error("Sequential (format 2) MIDI files hold independent sequences and cannot be merged")]
    Sequential,
}

/// Decode SMF bytes into note events across all channels.
pub fn decode_smf(bytes: &[u8]) -> Result<Vec<NoteEvent>, DecodeError> {
    let smf = Smf::parse(bytes)?;
    if smf.header.format == Format::Sequential {
        return Err(DecodeError::Sequential);
    }

    let mut timed: Vec<(u64, NoteEvent)> = Vec::new();
    for track in &smf.tracks {
        let mut tick = 0u64;
        for event in track {
            tick += event.delta.as_int() as u64;
            if let TrackEventKind::Midi { channel, message } = event.kind {
                let channel = channel.as_int();
                let note = match message {
                    MidiMessage::NoteOn { key, vel } => {
                        NoteEvent::note_on(channel, key.as_int(), vel.as_int())
                    }
                    MidiMessage::NoteOff { key, .. } => NoteEvent::note_off(channel, key.as_int()),
                    _ => continue,
                };
                timed.push((tick, note));
            }
        }
    }

    // sort_by_key is stable, which preserves track order on equal ticks
    timed.sort_by_key(|(tick, _)| *tick);

    log::debug!(
        "Decoded {} note events from {} track(s)",
        timed.len(),
        smf.tracks.len()
    );
    Ok(timed.into_iter().map(|(_, e)| e).collect())
}

/// Read and decode a MIDI file from disk.
pub fn decode_file(path: &Path) -> Result<Vec<NoteEvent>, DecodeError> {
    let bytes = std::fs::read(path)?;
    decode_smf(&bytes)
}
