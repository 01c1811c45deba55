//! Error types
//!
//! Runtime range problems never surface here: lengths, octaves, MIDI
//! numbers and probabilities saturate. These variants cover data that is
//! checked once, at the boundary (scale tables, LED wiring, persisted
//! settings), so that the real-time paths can trust what they are given.

use core::fmt;

/// Errors raised while validating tables, wiring or persisted state
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A scale has no tones
    EmptyScale { name: &'static str },
    /// Tone and weight lists differ in length
    MismatchedWeights {
        name: &'static str,
        tones: usize,
        weights: usize,
    },
    /// Every weight in a weighted draw is zero
    ZeroWeightSum { name: &'static str },
    /// A tone number outside 1..=12
    ToneOutOfRange { name: &'static str, tone: u8 },
    /// Tones are not strictly ascending
    UnsortedTones { name: &'static str },
    /// A scale table needs the reserved slot plus at least one selectable scale
    ScaleTableTooSmall { len: usize },
    /// Scale index outside the selectable range
    ScaleIndexOutOfRange { index: usize, len: usize },
    /// An LED maps to a driver channel the driver does not have
    LedChannelOutOfRange { channel: u8 },
    /// Two LEDs map to the same driver channel
    LedChannelReused { channel: u8 },
    /// Sample rate that is not a positive finite number
    InvalidSampleRate { rate: f32 },
    /// A settings buffer of the wrong size
    SettingsLength { expected: usize, actual: usize },
    /// Settings decoded but failed validation
    InvalidSettings(SettingsFault),
}

/// Why a settings record was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsFault {
    Length(i32),
    ScaleIndex(i32),
    AccentProbability(i32),
    MidiNumber { slot: usize, midi: i32 },
    Brightness,
    GateLength,
    Velocity { slot: usize },
    Checksum { stored: i32, computed: i32 },
}

impl fmt::Display for SettingsFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsFault::Length(len) => write!(f, "sequence length {} out of range", len),
            SettingsFault::ScaleIndex(idx) => write!(f, "scale index {} out of range", idx),
            SettingsFault::AccentProbability(p) => {
                write!(f, "accent probability {} out of range", p)
            }
            SettingsFault::MidiNumber { slot, midi } => {
                write!(f, "step {} has MIDI number {} out of range", slot, midi)
            }
            SettingsFault::Brightness => write!(f, "brightness out of range"),
            SettingsFault::GateLength => write!(f, "gate length out of range"),
            SettingsFault::Velocity { slot } => write!(f, "step {} velocity out of range", slot),
            SettingsFault::Checksum { stored, computed } => write!(
                f,
                "checksum mismatch (stored {}, computed {})",
                stored, computed
            ),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyScale { name } => write!(f, "Scale '{}' has no tones", name),
            Error::MismatchedWeights {
                name,
                tones,
                weights,
            } => write!(
                f,
                "Scale '{}' has {} tones but {} weights",
                name, tones, weights
            ),
            Error::ZeroWeightSum { name } => write!(f, "Weights of '{}' sum to zero", name),
            Error::ToneOutOfRange { name, tone } => {
                write!(f, "Scale '{}' contains tone {} outside 1-12", name, tone)
            }
            Error::UnsortedTones { name } => {
                write!(f, "Scale '{}' tones are not strictly ascending", name)
            }
            Error::ScaleTableTooSmall { len } => {
                write!(f, "Scale table has {} entries, need at least 2", len)
            }
            Error::ScaleIndexOutOfRange { index, len } => {
                write!(f, "Scale index {} out of range 1..{}", index, len)
            }
            Error::LedChannelOutOfRange { channel } => {
                write!(f, "LED driver channel {} does not exist", channel)
            }
            Error::LedChannelReused { channel } => {
                write!(f, "LED driver channel {} mapped twice", channel)
            }
            Error::InvalidSampleRate { rate } => {
                write!(f, "Sample rate {} must be positive", rate)
            }
            Error::SettingsLength { expected, actual } => write!(
                f,
                "Settings record is {} bytes, expected {}",
                actual, expected
            ),
            Error::InvalidSettings(fault) => write!(f, "Invalid settings: {}", fault),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

impl From<SettingsFault> for Error {
    fn from(fault: SettingsFault) -> Self {
        Error::InvalidSettings(fault)
    }
}
