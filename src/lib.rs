//! # Blossom: Generative Melody Sequencer Core
//!
//! `blossom` is the control core of a generative Eurorack sequencer. It
//! keeps a 32-step melody in a chosen scale, advances through it on
//! external clock pulses, mutates it now and then, and turns the current
//! step into pitch, velocity, gate and accent levels.
//!
//! ## Architecture
//!
//! The crate runs at two rates:
//!
//! - **Sample tick** - [`SequencerContext::tick`] advances the gate
//!   envelopes once per sample and returns an [`OutputFrame`]
//! - **Control loop** - [`Controller::poll`] debounces the panel,
//!   reads gestures and encoder turns, and calls the sequencer's step and
//!   edit operations
//!
//! Hardware stays behind narrow traits: [`OutputSink`] for CV/gate
//! outputs, [`ClockSource`] for clock edges, [`SettingsStore`] for
//! persistence and [`DisplaySink`] for the LEDs.
//!
//! ## Quick Start
//!
//! ```rust
//! use blossom::prelude::*;
//!
//! let mut seq = SequencerContext::new(SequencerConfig::new(48_000.0), Rng::from_seed(7)).unwrap();
//! seq.set_mutation_probability(25.0);
//!
//! // A clock edge arrives
//! let outcome = seq.step();
//! assert_eq!(outcome.step, 1);
//!
//! // The sample tick renders the current step
//! let frame = seq.tick();
//! assert_eq!(frame.gate, !seq.current_note().muted);
//! ```
//!
//! ## Features
//!
//! - `std` (default): `std::error::Error`, entropy seeding via `rand`
//! - `alloc`: JSON import/export of [`Settings`]
//!
//! Without either the crate is `no_std` and never allocates.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

pub mod control;
pub mod display;
pub mod error;
pub mod gate;
pub mod gesture;
pub mod input;
pub mod io;
pub mod melody;
pub mod note;
pub mod rng;
pub mod scale;
pub mod sequence;
pub mod sequencer;
pub mod settings;

/// Prelude module for convenient imports
pub mod prelude {
    // Pitch and scales
    pub use crate::note::{Note, NoteName, MIDI_MAX, MIDI_MIN};
    pub use crate::scale::{Scale, ScaleTable, BUILTIN_SCALES};

    // Timing
    pub use crate::gate::{Gate, GateStage};
    pub use crate::gesture::{GestureDetector, GestureEvent, GestureTiming};

    // Generation and playback
    pub use crate::melody::{MelodyGenerator, NoteKind, NoteKindWeights};
    pub use crate::rng::{RandomSource, Rng};
    pub use crate::sequence::{Cursor, Sequence, MAX_STEPS, MIN_STEPS};
    pub use crate::sequencer::{Restored, SequencerConfig, SequencerContext, StepOutcome};

    // Panel
    pub use crate::control::{ControlConfig, ControlFrame, Controller, PollOutcome};
    pub use crate::display::{Color, DisplaySink, Led, LedMap, PanelView, Renderer};
    pub use crate::input::{EdgeDebouncer, QuadratureEncoder};

    // External I/O
    pub use crate::io::{AtomicF32, ClockSource, CvOut, GateOut, OutputFrame, OutputSink};
    #[cfg(target_has_atomic = "64")]
    pub use crate::io::SharedNote;

    // Persistence
    pub use crate::settings::{MemoryStore, Settings, SettingsStore};

    pub use crate::error::{Error, SettingsFault};
}

// Re-export key types at crate root for convenience
pub use prelude::*;
