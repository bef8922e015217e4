//! Transition matrix value type and the note-index ↔ pitch mapping.
//!
//! Index `i` corresponds to MIDI pitch `i + 36`, so index 0 is C2 and index 47
//! is B5. Matrices built from events are always 48×48; hand-built matrices may
//! be any square size so the graph engines can run on small fixtures.

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::{MIN_PITCH, NUM_NOTES};

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

#[derive(Error, Debug, PartialEq)]
pub enum MatrixError {
    #[error("Matrix is not square: row {row} has {len} entries, expected {expected}")]
    NotSquare { row: usize, len: usize, expected: usize },
    #[error("Invalid entry {value} at ({row}, {col}): entries must be finite and non-negative")]
    InvalidEntry { row: usize, col: usize, value: f64 },
}

/// Map a MIDI pitch into the 48-note window, or `None` if it falls outside C2–B5.
pub fn pitch_to_index(pitch: u8) -> Option<usize> {
    let pitch = pitch as usize;
    let min = MIN_PITCH as usize;
    if (min..min + NUM_NOTES).contains(&pitch) {
        Some(pitch - min)
    } else {
        None
    }
}

pub fn index_to_pitch(index: usize) -> u8 {
    MIN_PITCH + index as u8
}

/// Display label for a note index: `0 → "C2"`, `13 → "C#3"`, `47 → "B5"`.
pub fn note_label(index: usize) -> String {
    format!("{}{}", NOTE_NAMES[index % 12], index / 12 + 2)
}

/// Labels for every index in the 48-note window.
pub fn note_labels() -> Vec<(usize, String)> {
    (0..NUM_NOTES).map(|i| (i, note_label(i))).collect()
}

/// Square matrix of non-negative transition weights, stored row-major.
///
/// Immutable once built; every analysis takes it by shared reference.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionMatrix {
    size: usize,
    data: Vec<f64>,
}

impl TransitionMatrix {
    /// All-zero matrix of the given size.
    pub fn zeros(size: usize) -> Self {
        Self {
            size,
            data: vec![0.0; size * size],
        }
    }

    /// Build from caller-supplied rows, validating shape and entries.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, MatrixError> {
        let size = rows.len();
        let mut data = Vec::with_capacity(size * size);
        for (row, values) in rows.iter().enumerate() {
            if values.len() != size {
                return Err(MatrixError::NotSquare {
                    row,
                    len: values.len(),
                    expected: size,
                });
            }
            for (col, &value) in values.iter().enumerate() {
                if !value.is_finite() || value < 0.0 {
                    return Err(MatrixError::InvalidEntry { row, col, value });
                }
                data.push(value);
            }
        }
        Ok(Self { size, data })
    }

    /// Normalize raw transition counts into probabilities.
    ///
    /// Each row with a nonzero sum is divided by that sum, then every entry
    /// below `threshold` is set to exactly zero. Rows are not renormalized
    /// after thresholding.
    pub(crate) fn from_counts(size: usize, counts: &[u64], threshold: f64) -> Self {
        let mut data: Vec<f64> = counts.iter().map(|&c| c as f64).collect();
        for row in data.chunks_mut(size) {
            let sum: f64 = row.iter().sum();
            if sum != 0.0 {
                for v in row.iter_mut() {
                    *v /= sum;
                }
            }
            for v in row.iter_mut() {
                if *v < threshold {
                    *v = 0.0;
                }
            }
        }
        Self { size, data }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.size + col]
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.size..(row + 1) * self.size]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks(self.size.max(1)).take(self.size)
    }

    pub fn row_sum(&self, row: usize) -> f64 {
        self.row(row).iter().sum()
    }

    /// Number of nonzero entries, i.e. directed edges including self-loops.
    pub fn edge_count(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0.0).count()
    }

    /// `A[i][j] = 1` iff `M[i][j] != 0`.
    pub(crate) fn binarized(&self) -> Vec<Vec<u32>> {
        self.rows()
            .map(|r| r.iter().map(|&v| u32::from(v != 0.0)).collect())
            .collect()
    }

    /// Symmetrized binary adjacency with an empty diagonal:
    /// `U[i][j] = 1` iff `i != j` and `M[i][j] != 0 || M[j][i] != 0`.
    pub(crate) fn undirected(&self) -> Vec<Vec<u32>> {
        let n = self.size;
        let mut u = vec![vec![0u32; n]; n];
        for i in 0..n {
            for j in 0..n {
                if i != j && (self.get(i, j) != 0.0 || self.get(j, i) != 0.0) {
                    u[i][j] = 1;
                }
            }
        }
        u
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.rows().map(|r| r.to_vec()).collect()
    }
}

impl Serialize for TransitionMatrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_rows().serialize(serializer)
    }
}
