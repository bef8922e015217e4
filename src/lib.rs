pub mod builder;
pub mod centrality;
pub mod config;
pub mod events;
pub mod graph;
pub mod matrix;
pub mod midi;
pub mod report;
pub mod stats;

/// Size of the note window (C2 through B5).
pub const NUM_NOTES: usize = 48;

/// MIDI pitch of note index 0 (C2).
pub const MIN_PITCH: u8 = 36;

/// Highest valid MIDI channel number.
pub const MAX_CHANNEL: u8 = 15;

/// MIDI file extensions picked up by directory scans
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mid", "midi", "smf"];

/// Application name for XDG paths
pub const APP_NAME: &str = "tonnetz";
