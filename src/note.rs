//! Notes and Pitch Encoding
//!
//! A [`Note`] carries both an absolute MIDI number and its tone/octave
//! split; every constructor and mutator recomputes one from the other so
//! they never disagree. Pitch voltage follows the 1V/octave standard with
//! the lowest playable note (MIDI 36, C2) at 0V.

use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

/// Lowest MIDI number a step may hold
pub const MIDI_MIN: i32 = 36;
/// Highest MIDI number a step may hold
pub const MIDI_MAX: i32 = 84;
/// Lowest octave reachable by quantized editing
pub const MIN_OCTAVE: i32 = 2;
/// Highest octave reachable by quantized editing
pub const MAX_OCTAVE: i32 = 5;
/// 1V/octave
pub const VOLTS_PER_SEMITONE: f32 = 1.0 / 12.0;
/// Velocity output floor, in volts
pub const MIN_VELOCITY: f32 = 0.0;
/// Velocity output ceiling, in volts
pub const MAX_VELOCITY: f32 = 5.0;

/// Pitch class names, numbered 1 (C) to 12 (B)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoteName {
    C,
    CSharp,
    D,
    EFlat,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    BFlat,
    B,
}

impl NoteName {
    const ALL: [NoteName; 12] = [
        NoteName::C,
        NoteName::CSharp,
        NoteName::D,
        NoteName::EFlat,
        NoteName::E,
        NoteName::F,
        NoteName::FSharp,
        NoteName::G,
        NoteName::GSharp,
        NoteName::A,
        NoteName::BFlat,
        NoteName::B,
    ];

    /// Tone number, 1-12
    pub fn tone(self) -> u8 {
        self as u8 + 1
    }

    /// Name for a tone number; `None` outside 1..=12
    pub fn from_tone(tone: u8) -> Option<Self> {
        Self::ALL.get((tone as usize).checked_sub(1)?).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NoteName::C => "C",
            NoteName::CSharp => "C#",
            NoteName::D => "D",
            NoteName::EFlat => "Eb",
            NoteName::E => "E",
            NoteName::F => "F",
            NoteName::FSharp => "F#",
            NoteName::G => "G",
            NoteName::GSharp => "G#",
            NoteName::A => "A",
            NoteName::BFlat => "Bb",
            NoteName::B => "B",
        }
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown note name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownNoteName;

impl fmt::Display for UnknownNoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown note name")
    }
}

impl FromStr for NoteName {
    type Err = UnknownNoteName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = match s {
            "C" => NoteName::C,
            "C#" | "Db" => NoteName::CSharp,
            "D" => NoteName::D,
            "D#" | "Eb" => NoteName::EFlat,
            "E" => NoteName::E,
            "F" => NoteName::F,
            "F#" | "Gb" => NoteName::FSharp,
            "G" => NoteName::G,
            "G#" | "Ab" => NoteName::GSharp,
            "A" => NoteName::A,
            "A#" | "Bb" => NoteName::BFlat,
            "B" => NoteName::B,
            _ => return Err(UnknownNoteName),
        };
        Ok(name)
    }
}

/// One sequencer step: a pitch plus its performance flags
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Note {
    tone: u8,
    octave: i32,
    midi: i32,
    voltage: f32,
    /// Suppresses the gate for this step
    pub muted: bool,
    /// Fires the accent gate for this step
    pub accent: bool,
    /// Secondary CV output level, volts
    pub velocity: f32,
}

impl Note {
    /// Build a note from a pitch class and octave
    pub fn from_name(name: NoteName, octave: i32) -> Self {
        Self::from_tone(name.tone(), octave)
    }

    /// Build a note from a tone number (1-12) and octave.
    ///
    /// Tones outside 1..=12 are folded into the octave, so `from_tone(13, 3)`
    /// is C4.
    pub fn from_tone(tone: u8, octave: i32) -> Self {
        Self::from_midi((octave + 1) * 12 + tone as i32 - 1)
    }

    /// Build a note at an absolute MIDI number
    pub fn from_midi(midi: i32) -> Self {
        let mut note = Self {
            tone: 1,
            octave: 0,
            midi: 0,
            voltage: 0.0,
            muted: false,
            accent: false,
            velocity: MAX_VELOCITY,
        };
        note.change_midi_number(midi);
        note
    }

    /// Move the note to a new MIDI number, recomputing tone, octave and
    /// voltage. Callers clamp to [`MIDI_MIN`]..=[`MIDI_MAX`] first.
    pub fn change_midi_number(&mut self, midi: i32) {
        self.midi = midi;
        self.tone = (midi.rem_euclid(12) + 1) as u8;
        self.octave = midi.div_euclid(12) - 1;
        self.voltage = midi_to_voltage(midi);
    }

    pub fn tone(&self) -> u8 {
        self.tone
    }

    pub fn octave(&self) -> i32 {
        self.octave
    }

    pub fn midi(&self) -> i32 {
        self.midi
    }

    /// Pitch CV in volts
    pub fn voltage(&self) -> f32 {
        self.voltage
    }

    pub fn name(&self) -> NoteName {
        // tone is always 1..=12
        NoteName::ALL[(self.tone - 1) as usize]
    }

    /// Copy the pitch of `other`, keeping this note's flags and velocity
    pub fn with_pitch_of(mut self, other: &Note) -> Self {
        self.change_midi_number(other.midi);
        self
    }
}

impl Default for Note {
    /// Middle C
    fn default() -> Self {
        Self::from_midi(60)
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name(), self.octave)
    }
}

/// Pitch CV for a MIDI number
#[inline]
pub fn midi_to_voltage(midi: i32) -> f32 {
    (midi - MIDI_MIN) as f32 * VOLTS_PER_SEMITONE
}

/// Clamp a MIDI number into the playable range
#[inline]
pub fn clamp_midi(midi: i32) -> i32 {
    midi.clamp(MIDI_MIN, MIDI_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_middle_c() {
        let note = Note::from_name(NoteName::C, 4);
        assert_eq!(note.midi(), 60);
        assert_eq!(note.tone(), 1);
        assert_eq!(note.octave(), 4);
        assert_abs_diff_eq!(note.voltage(), 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_range_endpoints() {
        let low = Note::from_name(NoteName::C, 2);
        assert_eq!(low.midi(), MIDI_MIN);
        assert_abs_diff_eq!(low.voltage(), 0.0);

        let high = Note::from_midi(MIDI_MAX);
        assert_eq!(high.name(), NoteName::C);
        assert_eq!(high.octave(), 6);
        assert_abs_diff_eq!(high.voltage(), 4.0, epsilon = 1e-6);
    }

    #[test]
    fn test_tone_and_midi_agree() {
        for midi in MIDI_MIN..=MIDI_MAX {
            let note = Note::from_midi(midi);
            let rebuilt = Note::from_tone(note.tone(), note.octave());
            assert_eq!(rebuilt.midi(), midi);
        }
    }

    #[test]
    fn test_change_midi_number_idempotent() {
        for start in MIDI_MIN..=MIDI_MAX {
            for target in [MIDI_MIN, 47, 60, 71, MIDI_MAX] {
                let mut once = Note::from_midi(start);
                once.change_midi_number(target);
                let mut twice = once;
                twice.change_midi_number(once.midi());
                assert_eq!(once, twice);
            }
        }
    }

    #[test]
    fn test_octave_is_one_volt() {
        for midi in MIDI_MIN..=MIDI_MAX - 12 {
            assert_abs_diff_eq!(
                midi_to_voltage(midi + 12),
                midi_to_voltage(midi) + 1.0,
                epsilon = 1e-5
            );
        }
    }

    #[test]
    fn test_change_keeps_flags() {
        let mut note = Note::from_midi(50);
        note.muted = true;
        note.accent = true;
        note.velocity = 2.5;
        note.change_midi_number(62);
        assert!(note.muted && note.accent);
        assert_abs_diff_eq!(note.velocity, 2.5);
        assert_eq!(note.name(), NoteName::D);
    }

    #[test]
    fn test_tone_overflow_folds_into_octave() {
        assert_eq!(Note::from_tone(13, 3).midi(), 60);
    }

    #[test]
    fn test_name_parsing() {
        assert_eq!("Eb".parse::<NoteName>(), Ok(NoteName::EFlat));
        assert_eq!("D#".parse::<NoteName>(), Ok(NoteName::EFlat));
        assert_eq!("Bb".parse::<NoteName>(), Ok(NoteName::BFlat));
        assert!("H".parse::<NoteName>().is_err());
        for tone in 1..=12 {
            let name = NoteName::from_tone(tone).unwrap();
            assert_eq!(name.as_str().parse::<NoteName>(), Ok(name));
            assert_eq!(name.tone(), tone);
        }
        assert_eq!(NoteName::from_tone(0), None);
        assert_eq!(NoteName::from_tone(13), None);
    }

    #[test]
    fn test_display() {
        use alloc::string::ToString;
        assert_eq!(Note::from_name(NoteName::FSharp, 3).to_string(), "F#3");
    }
}
