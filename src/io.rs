//! External I/O
//!
//! Narrow capability traits the engine talks to instead of hardware: a
//! clock edge source and an output sink for CVs and gates. The panel
//! driver implements them for real jacks; tests implement them with
//! plain structs.
//!
//! Also here: single-word atomics for hosts where the sample tick runs in
//! a preemptive context and reads state the control loop writes.

use crate::input::EdgeDebouncer;
use crate::note::Note;
#[cfg(target_has_atomic = "64")]
use core::sync::atomic::AtomicU64;
use core::sync::atomic::{AtomicU32, Ordering};

/// Analog outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CvOut {
    /// 1V/octave pitch plus transpose
    Pitch,
    /// Step velocity, 0-5V
    Velocity,
}

/// Gate/trigger outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateOut {
    Primary,
    Accent,
    Clock,
}

/// Everything the sample tick writes, for one sample
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OutputFrame {
    pub pitch: f32,
    pub velocity: f32,
    pub gate: bool,
    pub accent: bool,
    pub clock: bool,
}

/// Destination for CV and gate levels
pub trait OutputSink {
    fn write_cv(&mut self, output: CvOut, volts: f32);

    fn write_gate(&mut self, output: GateOut, high: bool);

    /// Write every output of a frame
    fn write_frame(&mut self, frame: &OutputFrame) {
        self.write_cv(CvOut::Pitch, frame.pitch);
        self.write_cv(CvOut::Velocity, frame.velocity);
        self.write_gate(GateOut::Primary, frame.gate);
        self.write_gate(GateOut::Accent, frame.accent);
        self.write_gate(GateOut::Clock, frame.clock);
    }
}

/// Something that can report a rising clock edge when polled
pub trait ClockSource {
    /// True once per rising edge
    fn rising_edge(&mut self) -> bool;
}

/// A jack input debounced through an [`EdgeDebouncer`]
#[derive(Debug, Clone, Copy, Default)]
pub struct DebouncedJack {
    line: EdgeDebouncer,
    edge_pending: bool,
}

impl DebouncedJack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shift in one sample of the jack level
    pub fn feed(&mut self, level: bool) {
        self.line.update(level);
        self.edge_pending |= self.line.rising_edge();
    }

    pub fn is_high(&self) -> bool {
        self.line.pressed()
    }
}

impl ClockSource for DebouncedJack {
    fn rising_edge(&mut self) -> bool {
        core::mem::take(&mut self.edge_pending)
    }
}

/// Atomic f32 for lock-free communication between contexts
///
/// Uses AtomicU32 internally since there's no native AtomicF32.
#[derive(Debug)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

impl Default for AtomicF32 {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// A note packed into one atomic word.
///
/// The control loop stores, the sample tick loads; a reader never sees a
/// half-written note. Layout: bits 0-15 MIDI number (i16), bit 16 muted,
/// bit 17 accent, bits 32-63 velocity (f32 bits).
#[cfg(target_has_atomic = "64")]
#[derive(Debug, Default)]
pub struct SharedNote(AtomicU64);

#[cfg(target_has_atomic = "64")]
impl SharedNote {
    pub fn new(note: &Note) -> Self {
        Self(AtomicU64::new(Self::pack(note)))
    }

    pub fn store(&self, note: &Note) {
        self.0.store(Self::pack(note), Ordering::Release);
    }

    pub fn load(&self) -> Note {
        Self::unpack(self.0.load(Ordering::Acquire))
    }

    fn pack(note: &Note) -> u64 {
        let midi = note.midi().clamp(i16::MIN as i32, i16::MAX as i32) as i16 as u16 as u64;
        let flags = (note.muted as u64) << 16 | (note.accent as u64) << 17;
        midi | flags | (note.velocity.to_bits() as u64) << 32
    }

    fn unpack(word: u64) -> Note {
        let mut note = Note::from_midi(word as u16 as i16 as i32);
        note.muted = word & (1 << 16) != 0;
        note.accent = word & (1 << 17) != 0;
        note.velocity = f32::from_bits((word >> 32) as u32);
        note
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        cv: [f32; 2],
        gates: [bool; 3],
    }

    impl OutputSink for Recorder {
        fn write_cv(&mut self, output: CvOut, volts: f32) {
            self.cv[output as usize] = volts;
        }

        fn write_gate(&mut self, output: GateOut, high: bool) {
            self.gates[output as usize] = high;
        }
    }

    #[test]
    fn test_write_frame_routes_outputs() {
        let mut sink = Recorder::default();
        sink.write_frame(&OutputFrame {
            pitch: 1.5,
            velocity: 3.0,
            gate: true,
            accent: false,
            clock: true,
        });
        assert_eq!(sink.cv, [1.5, 3.0]);
        assert_eq!(sink.gates, [true, false, true]);
    }

    #[cfg(target_has_atomic = "64")]
    #[test]
    fn test_shared_note_round_trip() {
        let mut note = Note::from_midi(67);
        note.accent = true;
        note.velocity = 3.25;
        let shared = SharedNote::new(&note);
        assert_eq!(shared.load(), note);

        note.change_midi_number(-5);
        note.muted = true;
        shared.store(&note);
        assert_eq!(shared.load(), note);
    }

    #[test]
    fn test_atomic_f32() {
        let value = AtomicF32::new(0.5);
        assert_eq!(value.get(), 0.5);
        value.set(-2.75);
        assert_eq!(value.get(), -2.75);
    }

    #[test]
    fn test_debounced_jack_reports_edge_once() {
        let mut jack = DebouncedJack::new();
        let mut edges = 0;
        for level in [false, true, true, true, true, true, true, true, true, true] {
            jack.feed(level);
            edges += jack.rising_edge() as u32;
        }
        assert_eq!(edges, 1);
        assert!(jack.is_high());

        // An edge fed without polling stays pending until read
        let mut jack = DebouncedJack::new();
        jack.feed(false);
        for _ in 0..9 {
            jack.feed(true);
        }
        assert!(jack.rising_edge());
        assert!(!jack.rising_edge());
    }
}
