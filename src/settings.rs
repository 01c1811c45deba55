//! Persisted Settings
//!
//! The record the panel writes to flash when the channel button is
//! pressed and reads back on a long reset press. The byte layout is
//! fixed and little-endian so records survive firmware updates:
//!
//! | field              | type      | bytes |
//! |--------------------|-----------|-------|
//! | length             | i32       | 4     |
//! | brightness         | f32       | 4     |
//! | follow             | u8        | 1     |
//! | preview            | u8        | 1     |
//! | gate length        | f32       | 4     |
//! | scale index        | i32       | 4     |
//! | accent probability | i32       | 4     |
//! | MIDI numbers       | 32 x i32  | 128   |
//! | mutes              | 32 x u8   | 32    |
//! | accents            | 32 x u8   | 32    |
//! | velocities         | 32 x f32  | 128   |
//! | checksum           | i32       | 4     |
//!
//! Decoding only checks the size. [`Settings::validate`] decides whether
//! the contents are usable; the sequencer falls back to defaults when
//! they are not.

use crate::error::{Error, SettingsFault};
use crate::gate::{MAX_GATE_LENGTH, MIN_GATE_LENGTH};
use crate::note::{MAX_VELOCITY, MIDI_MAX, MIDI_MIN, MIN_VELOCITY};
use crate::scale::DEFAULT_SCALE_INDEX;
use crate::sequence::{DEFAULT_LENGTH, MAX_STEPS, MIN_STEPS};
use serde::{Deserialize, Serialize};

#[cfg(feature = "alloc")]
use alloc::string::String;

/// Encoded record size, bytes
pub const SETTINGS_LEN: usize = 4 * 5 + 2 + MAX_STEPS * (4 + 1 + 1 + 4) + 4;

pub const DEFAULT_BRIGHTNESS: f32 = 0.5;
pub const DEFAULT_GATE_LENGTH: f32 = 0.01;
pub const DEFAULT_ACCENT_PROBABILITY: i32 = 10;
const DEFAULT_MIDI: i32 = 60;

/// Everything the panel persists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub length: i32,
    pub brightness: f32,
    pub follow: bool,
    pub preview: bool,
    pub gate_length: f32,
    pub scale_index: i32,
    pub accent_probability: i32,
    pub midi: [i32; MAX_STEPS],
    pub muted: [bool; MAX_STEPS],
    pub accents: [bool; MAX_STEPS],
    pub velocities: [f32; MAX_STEPS],
    pub checksum: i32,
}

impl Settings {
    /// Sum of the stored MIDI numbers
    pub fn compute_checksum(&self) -> i32 {
        self.midi.iter().fold(0i32, |sum, &m| sum.wrapping_add(m))
    }

    /// Refresh the stored checksum after editing fields by hand
    pub fn seal(&mut self) {
        self.checksum = self.compute_checksum();
    }

    /// Check every field against its legal range. `num_scales` counts the
    /// reserved entry at index 0.
    pub fn validate(&self, num_scales: usize) -> Result<(), SettingsFault> {
        if !(MIN_STEPS as i32..=MAX_STEPS as i32).contains(&self.length) {
            return Err(SettingsFault::Length(self.length));
        }
        if self.scale_index < 1 || self.scale_index as i64 >= num_scales as i64 {
            return Err(SettingsFault::ScaleIndex(self.scale_index));
        }
        if !(0..=100).contains(&self.accent_probability) {
            return Err(SettingsFault::AccentProbability(self.accent_probability));
        }
        if !(0.0..=1.0).contains(&self.brightness) {
            return Err(SettingsFault::Brightness);
        }
        if !(MIN_GATE_LENGTH..=MAX_GATE_LENGTH).contains(&self.gate_length) {
            return Err(SettingsFault::GateLength);
        }
        for (slot, &midi) in self.midi.iter().enumerate() {
            if !(MIDI_MIN..=MIDI_MAX).contains(&midi) {
                return Err(SettingsFault::MidiNumber { slot, midi });
            }
        }
        for (slot, velocity) in self.velocities.iter().enumerate() {
            if !(MIN_VELOCITY..=MAX_VELOCITY).contains(velocity) {
                return Err(SettingsFault::Velocity { slot });
            }
        }

        let computed = self.compute_checksum();
        if computed != self.checksum {
            return Err(SettingsFault::Checksum {
                stored: self.checksum,
                computed,
            });
        }
        Ok(())
    }

    /// Serialize to the fixed binary layout
    pub fn encode(&self) -> [u8; SETTINGS_LEN] {
        let mut out = Writer {
            buf: [0; SETTINGS_LEN],
            pos: 0,
        };
        out.put(&self.length.to_le_bytes());
        out.put(&self.brightness.to_le_bytes());
        out.put(&[self.follow as u8, self.preview as u8]);
        out.put(&self.gate_length.to_le_bytes());
        out.put(&self.scale_index.to_le_bytes());
        out.put(&self.accent_probability.to_le_bytes());
        for midi in &self.midi {
            out.put(&midi.to_le_bytes());
        }
        for &muted in &self.muted {
            out.put(&[muted as u8]);
        }
        for &accent in &self.accents {
            out.put(&[accent as u8]);
        }
        for velocity in &self.velocities {
            out.put(&velocity.to_le_bytes());
        }
        out.put(&self.checksum.to_le_bytes());
        out.buf
    }

    /// Parse the fixed binary layout. Any non-zero flag byte reads as set.
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != SETTINGS_LEN {
            return Err(Error::SettingsLength {
                expected: SETTINGS_LEN,
                actual: bytes.len(),
            });
        }

        let mut input = Reader { bytes, pos: 0 };
        let length = input.i32();
        let brightness = input.f32();
        let follow = input.flag();
        let preview = input.flag();
        let gate_length = input.f32();
        let scale_index = input.i32();
        let accent_probability = input.i32();

        let mut settings = Settings {
            length,
            brightness,
            follow,
            preview,
            gate_length,
            scale_index,
            accent_probability,
            midi: [0; MAX_STEPS],
            muted: [false; MAX_STEPS],
            accents: [false; MAX_STEPS],
            velocities: [0.0; MAX_STEPS],
            checksum: 0,
        };
        for midi in settings.midi.iter_mut() {
            *midi = input.i32();
        }
        for muted in settings.muted.iter_mut() {
            *muted = input.flag();
        }
        for accent in settings.accents.iter_mut() {
            *accent = input.flag();
        }
        for velocity in settings.velocities.iter_mut() {
            *velocity = input.f32();
        }
        settings.checksum = input.i32();
        Ok(settings)
    }

    /// Serialize to pretty-printed JSON
    #[cfg(feature = "alloc")]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from a JSON string
    #[cfg(feature = "alloc")]
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for Settings {
    fn default() -> Self {
        let mut settings = Self {
            length: DEFAULT_LENGTH as i32,
            brightness: DEFAULT_BRIGHTNESS,
            follow: false,
            preview: true,
            gate_length: DEFAULT_GATE_LENGTH,
            scale_index: DEFAULT_SCALE_INDEX as i32,
            accent_probability: DEFAULT_ACCENT_PROBABILITY,
            midi: [DEFAULT_MIDI; MAX_STEPS],
            muted: [false; MAX_STEPS],
            accents: [false; MAX_STEPS],
            velocities: [MAX_VELOCITY; MAX_STEPS],
            checksum: 0,
        };
        settings.seal();
        settings
    }
}

struct Writer {
    buf: [u8; SETTINGS_LEN],
    pos: usize,
}

impl Writer {
    fn put(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }
}

/// Cursor over a buffer whose length was checked up front
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn word(&mut self) -> [u8; 4] {
        let mut word = [0; 4];
        word.copy_from_slice(&self.bytes[self.pos..self.pos + 4]);
        self.pos += 4;
        word
    }

    fn i32(&mut self) -> i32 {
        i32::from_le_bytes(self.word())
    }

    fn f32(&mut self) -> f32 {
        f32::from_le_bytes(self.word())
    }

    fn flag(&mut self) -> bool {
        let byte = self.bytes[self.pos];
        self.pos += 1;
        byte != 0
    }
}

/// Where settings records live between power cycles
pub trait SettingsStore {
    type Error: core::fmt::Debug + core::fmt::Display;

    /// The stored record, or `None` if nothing has been saved yet
    fn load(&mut self) -> Result<Option<Settings>, Self::Error>;

    fn save(&mut self, settings: &Settings) -> Result<(), Self::Error>;
}

/// Store that keeps the encoded record in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    record: Option<[u8; SETTINGS_LEN]>,
    saves: u32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encoded bytes of the last save
    pub fn bytes(&self) -> Option<&[u8; SETTINGS_LEN]> {
        self.record.as_ref()
    }

    /// Overwrite the stored bytes, e.g. to simulate corrupted flash
    pub fn write_bytes(&mut self, bytes: [u8; SETTINGS_LEN]) {
        self.record = Some(bytes);
    }

    /// How many times `save` has been called
    pub fn saves(&self) -> u32 {
        self.saves
    }
}

impl SettingsStore for MemoryStore {
    type Error = Error;

    fn load(&mut self) -> Result<Option<Settings>, Error> {
        self.record.as_ref().map(|bytes| Settings::decode(bytes)).transpose()
    }

    fn save(&mut self, settings: &Settings) -> Result<(), Error> {
        self.record = Some(settings.encode());
        self.saves += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale::BUILTIN_SCALES;

    fn edited() -> Settings {
        let mut settings = Settings::default();
        settings.length = 13;
        settings.follow = true;
        settings.preview = false;
        settings.gate_length = 0.05;
        settings.scale_index = 6;
        settings.midi[3] = 84;
        settings.midi[31] = 36;
        settings.muted[4] = true;
        settings.accents[0] = true;
        settings.velocities[7] = 2.5;
        settings.seal();
        settings
    }

    #[test]
    fn test_record_size() {
        assert_eq!(SETTINGS_LEN, 346);
        assert_eq!(Settings::default().encode().len(), SETTINGS_LEN);
    }

    #[test]
    fn test_binary_round_trip() {
        let settings = edited();
        let decoded = Settings::decode(&settings.encode()).unwrap();
        assert_eq!(decoded, settings);
        assert!(decoded.validate(BUILTIN_SCALES.len()).is_ok());
    }

    #[test]
    fn test_layout_is_little_endian() {
        let bytes = edited().encode();
        assert_eq!(&bytes[0..4], &13i32.to_le_bytes());
        assert_eq!(bytes[8], 1);
        assert_eq!(bytes[9], 0);
        // First MIDI number sits after the 22-byte header
        assert_eq!(&bytes[22..26], &60i32.to_le_bytes());
    }

    #[test]
    fn test_wrong_size_rejected() {
        let err = Settings::decode(&[0u8; 10]).unwrap_err();
        assert_eq!(
            err,
            Error::SettingsLength {
                expected: SETTINGS_LEN,
                actual: 10
            }
        );
    }

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert_eq!(settings.checksum, 60 * 32);
        assert!(settings.validate(BUILTIN_SCALES.len()).is_ok());
    }

    #[test]
    fn test_validation_faults() {
        let n = BUILTIN_SCALES.len();

        let mut s = Settings::default();
        s.length = 2;
        assert_eq!(s.validate(n), Err(SettingsFault::Length(2)));

        let mut s = Settings::default();
        s.scale_index = 0;
        assert_eq!(s.validate(n), Err(SettingsFault::ScaleIndex(0)));
        s.scale_index = n as i32;
        assert_eq!(s.validate(n), Err(SettingsFault::ScaleIndex(n as i32)));

        let mut s = Settings::default();
        s.accent_probability = 101;
        assert_eq!(s.validate(n), Err(SettingsFault::AccentProbability(101)));

        let mut s = Settings::default();
        s.midi[5] = 85;
        s.seal();
        assert_eq!(
            s.validate(n),
            Err(SettingsFault::MidiNumber { slot: 5, midi: 85 })
        );

        let mut s = Settings::default();
        s.brightness = f32::NAN;
        assert_eq!(s.validate(n), Err(SettingsFault::Brightness));

        let mut s = Settings::default();
        s.velocities[9] = -1.0;
        assert_eq!(s.validate(n), Err(SettingsFault::Velocity { slot: 9 }));
    }

    #[test]
    fn test_checksum_detects_edit() {
        let mut s = Settings::default();
        s.midi[0] = 61;
        assert_eq!(
            s.validate(BUILTIN_SCALES.len()),
            Err(SettingsFault::Checksum {
                stored: 1920,
                computed: 1921
            })
        );
    }

    #[test]
    fn test_memory_store() {
        let mut store = MemoryStore::new();
        assert_eq!(store.load().unwrap(), None);

        store.save(&edited()).unwrap();
        assert_eq!(store.saves(), 1);
        assert_eq!(store.load().unwrap(), Some(edited()));
    }

    #[test]
    fn test_erased_flash_fails_validation() {
        let mut store = MemoryStore::new();
        store.write_bytes([0xff; SETTINGS_LEN]);
        let settings = store.load().unwrap().unwrap();
        assert!(settings.validate(BUILTIN_SCALES.len()).is_err());
    }

    #[cfg(feature = "alloc")]
    #[test]
    fn test_json_round_trip() {
        let settings = edited();
        let json = settings.to_json().unwrap();
        assert!(json.contains("\"scale_index\": 6"));
        assert_eq!(Settings::from_json(&json).unwrap(), settings);
    }
}
