//! Sequence Storage
//!
//! Fixed 32-slot note storage with an active length. Slots past the
//! length keep their notes, so lengthening the sequence brings back what
//! was there before.

use crate::note::Note;
use serde::{Deserialize, Serialize};

/// Slot capacity
pub const MAX_STEPS: usize = 32;
/// Shortest active length
pub const MIN_STEPS: usize = 3;
/// Steps per encoder page
pub const STEPS_PER_PAGE: usize = 8;
/// Encoder pages covering the full capacity
pub const NUM_PAGES: usize = MAX_STEPS / STEPS_PER_PAGE;
/// Active length at power-up
pub const DEFAULT_LENGTH: usize = 8;

/// Fixed-capacity note array with an active length
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    notes: [Note; MAX_STEPS],
    length: usize,
}

impl Sequence {
    /// Every slot middle C, default length
    pub fn new() -> Self {
        Self {
            notes: [Note::default(); MAX_STEPS],
            length: DEFAULT_LENGTH,
        }
    }

    /// Active length
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Set the active length, clamped to `MIN_STEPS..=MAX_STEPS`
    pub fn set_length(&mut self, length: usize) {
        self.length = length.clamp(MIN_STEPS, MAX_STEPS);
    }

    /// Move the active length by `delta`, saturating at the bounds
    pub fn adjust_length(&mut self, delta: i32) -> usize {
        let length = (self.length as i64 + delta as i64).clamp(MIN_STEPS as i64, MAX_STEPS as i64);
        self.length = length as usize;
        self.length
    }

    /// Note at `slot`. Slots wrap at capacity.
    pub fn get(&self, slot: usize) -> Note {
        self.notes[slot % MAX_STEPS]
    }

    pub fn get_mut(&mut self, slot: usize) -> &mut Note {
        &mut self.notes[slot % MAX_STEPS]
    }

    pub fn set(&mut self, slot: usize, note: Note) {
        self.notes[slot % MAX_STEPS] = note;
    }

    /// The playing slots
    pub fn active(&self) -> &[Note] {
        &self.notes[..self.length]
    }

    /// All 32 slots, including those past the active length
    pub fn all(&self) -> &[Note; MAX_STEPS] {
        &self.notes
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new()
    }
}

/// Play head position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cursor {
    step: usize,
}

impl Cursor {
    pub fn new() -> Self {
        Self { step: 0 }
    }

    pub fn step(&self) -> usize {
        self.step
    }

    /// Encoder page the play head is on
    pub fn page(&self) -> usize {
        self.step / STEPS_PER_PAGE
    }

    /// Position within the page
    pub fn place(&self) -> usize {
        self.step % STEPS_PER_PAGE
    }

    /// Move forward one step, wrapping at `length`. Returns true on wrap.
    pub fn advance(&mut self, length: usize) -> bool {
        self.step += 1;
        if self.step >= length {
            self.step = 0;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.step = 0;
    }
}
