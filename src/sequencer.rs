//! Sequencer Engine
//!
//! [`SequencerContext`] owns everything the sequencer touches: the
//! sequence, the play head, the active scale, the melody generator and
//! its random source, the gate envelopes and the panel parameters. There
//! is no global state; the control loop and the sample tick borrow the
//! one context.
//!
//! Two rates drive it. The control loop calls [`SequencerContext::step`]
//! on clock edges and the edit operations on panel gestures; the sample
//! tick calls [`SequencerContext::tick`] at the audio rate so gate timing
//! is sample-accurate however slowly the panel is polled.

use crate::error::Error;
use crate::gate::{Gate, MAX_GATE_LENGTH, MAX_RATCHETS, MIN_GATE_LENGTH};
use crate::io::{ClockSource, OutputFrame, OutputSink};
use crate::melody::{MelodyGenerator, NoteKindWeights};
use crate::note::{clamp_midi, Note};
use crate::rng::RandomSource;
use crate::scale::{Scale, ScaleTable, DEFAULT_SCALE_INDEX};
use crate::sequence::{Cursor, Sequence, DEFAULT_LENGTH, NUM_PAGES, STEPS_PER_PAGE};
use crate::settings::{Settings, SettingsStore, DEFAULT_BRIGHTNESS, DEFAULT_GATE_LENGTH};
use serde::{Deserialize, Serialize};

#[cfg(target_has_atomic = "64")]
use crate::io::SharedNote;

/// Construction-time parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencerConfig {
    pub sample_rate: f32,
    /// Clock-through pulse length, seconds
    pub clock_duration: f32,
    /// Primary gate length, seconds
    pub gate_duration: f32,
    /// Accent gate length, seconds
    pub accent_duration: f32,
    /// How long an edited note is auditioned, seconds
    pub preview_duration: f32,
    pub base_octave: i32,
    pub note_kinds: NoteKindWeights,
    pub scale_index: usize,
    pub length: usize,
    /// Percent
    pub accent_probability: f32,
    /// Percent
    pub rest_probability: f32,
}

impl SequencerConfig {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    pub fn with_scale_index(mut self, index: usize) -> Self {
        self.scale_index = index;
        self
    }

    pub fn with_length(mut self, length: usize) -> Self {
        self.length = length;
        self
    }

    pub fn with_note_kinds(mut self, weights: NoteKindWeights) -> Self {
        self.note_kinds = weights;
        self
    }

    pub fn with_base_octave(mut self, octave: i32) -> Self {
        self.base_octave = octave;
        self
    }

    pub fn with_accent_probability(mut self, percent: f32) -> Self {
        self.accent_probability = percent;
        self
    }

    pub fn with_rest_probability(mut self, percent: f32) -> Self {
        self.rest_probability = percent;
        self
    }
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            clock_duration: 0.1,
            gate_duration: DEFAULT_GATE_LENGTH,
            accent_duration: DEFAULT_GATE_LENGTH,
            preview_duration: 0.25,
            base_octave: 4,
            note_kinds: NoteKindWeights::default(),
            scale_index: DEFAULT_SCALE_INDEX,
            length: DEFAULT_LENGTH,
            accent_probability: 10.0,
            rest_probability: 0.0,
        }
    }
}

/// What a clock step did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    /// Play head after the step
    pub step: usize,
    /// The play head wrapped back to the first step
    pub wrapped: bool,
    /// The end-of-sequence mutation roll was made
    pub mutation_rolled: bool,
    /// Slot replaced by the mutation, if the roll succeeded
    pub mutated: Option<usize>,
}

/// Where [`SequencerContext::apply_settings`] took its values from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Restored {
    Stored,
    /// The record was rejected and defaults were applied instead
    Defaults,
}

/// The single owner of sequencer state
#[derive(Debug, Clone)]
pub struct SequencerContext<R: RandomSource> {
    sequence: Sequence,
    cursor: Cursor,
    current_note: Note,
    scales: ScaleTable,
    scale_index: usize,
    melody: MelodyGenerator,
    rng: R,

    primary: Gate,
    accent: Gate,
    clock_out: Gate,
    preview: Gate,
    preview_note: Note,
    preview_enabled: bool,

    transpose: f32,
    mutation_probability: f32,
    held_pitch: f32,
    gate_length: f32,

    follow: bool,
    selected_page: usize,
    brightness: f32,
}

impl<R: RandomSource> SequencerContext<R> {
    /// Build a context over the built-in scales and generate the first
    /// melody
    pub fn new(config: SequencerConfig, rng: R) -> Result<Self, Error> {
        Self::with_scales(config, ScaleTable::builtin(), rng)
    }

    /// Build a context over a custom scale table
    pub fn with_scales(config: SequencerConfig, scales: ScaleTable, rng: R) -> Result<Self, Error> {
        if !(config.sample_rate.is_finite() && config.sample_rate > 0.0) {
            return Err(Error::InvalidSampleRate {
                rate: config.sample_rate,
            });
        }
        scales.selectable(config.scale_index)?;

        let mut melody = MelodyGenerator::new()
            .with_note_kinds(config.note_kinds)
            .with_base_octave(config.base_octave);
        melody.set_accent_probability(config.accent_probability);
        melody.set_rest_probability(config.rest_probability);

        let mut sequence = Sequence::new();
        sequence.set_length(config.length);

        let sr = config.sample_rate;
        let mut ctx = Self {
            sequence,
            cursor: Cursor::new(),
            current_note: Note::default(),
            scales,
            scale_index: config.scale_index,
            melody,
            rng,
            primary: Gate::new(sr).with_duration(config.gate_duration),
            accent: Gate::new(sr).with_duration(config.accent_duration),
            clock_out: Gate::new(sr).with_duration(config.clock_duration),
            preview: Gate::new(sr).with_duration(config.preview_duration),
            preview_note: Note::default(),
            preview_enabled: true,
            transpose: 0.0,
            mutation_probability: 0.0,
            held_pitch: 0.0,
            gate_length: config.gate_duration,
            follow: false,
            selected_page: 0,
            brightness: DEFAULT_BRIGHTNESS,
        };
        ctx.new_melody();
        Ok(ctx)
    }

    // ---- playback ----

    /// Advance the play head on a clock edge.
    ///
    /// Fires the clock-through gate, rolls for a mutation when the head
    /// wraps, then fires the primary and accent gates for the new step
    /// unless it is muted.
    pub fn step(&mut self) -> StepOutcome {
        self.clock_out.retrigger();

        let wrapped = self.cursor.advance(self.sequence.len());
        let mut mutated = None;
        if wrapped && self.rng.chance_percent(self.mutation_probability) {
            mutated = Some(self.mutate_one_note());
        }

        self.current_note = self.sequence.get(self.cursor.step());
        if !self.current_note.muted {
            self.primary.retrigger();
            if self.current_note.accent {
                self.accent.retrigger();
            }
        }

        StepOutcome {
            step: self.cursor.step(),
            wrapped,
            mutation_rolled: wrapped,
            mutated,
        }
    }

    /// Step if `clock` reports a rising edge
    pub fn run_clock<C: ClockSource + ?Sized>(&mut self, clock: &mut C) -> Option<StepOutcome> {
        if clock.rising_edge() {
            Some(self.step())
        } else {
            None
        }
    }

    /// Send the play head back to the first step. Gates are left running.
    pub fn reset(&mut self) {
        self.cursor.reset();
    }

    /// Advance every envelope one sample and compute the outputs
    pub fn tick(&mut self) -> OutputFrame {
        let previewing = self.preview.process();
        let gate = self.primary.process();
        let accent = self.accent.process();
        let clock = self.clock_out.process();

        let (gate, velocity) = if previewing {
            self.held_pitch = self.preview_note.voltage() + self.transpose;
            (true, self.preview_note.velocity)
        } else {
            if !self.current_note.muted {
                self.held_pitch = self.current_note.voltage() + self.transpose;
            }
            (gate, self.current_note.velocity)
        };

        OutputFrame {
            pitch: self.held_pitch,
            velocity,
            gate,
            accent,
            clock,
        }
    }

    /// [`tick`](Self::tick) and write the frame to `sink`
    pub fn render<S: OutputSink + ?Sized>(&mut self, sink: &mut S) -> OutputFrame {
        let frame = self.tick();
        sink.write_frame(&frame);
        frame
    }

    /// Publish the current note for a sample tick running in another
    /// context
    #[cfg(target_has_atomic = "64")]
    pub fn publish(&self, shared: &SharedNote) {
        shared.store(&self.current_note);
    }

    // ---- melody ----

    /// Regenerate all 32 slots in the current scale
    pub fn new_melody(&mut self) {
        let scale = self.scale();
        self.melody
            .generate_full(&mut self.sequence, scale, &mut self.rng);
    }

    /// Replace one slot within the active length. Returns the slot.
    pub fn mutate_one_note(&mut self) -> usize {
        let scale = self.scale();
        self.melody
            .mutate_one(&mut self.sequence, scale, &mut self.rng)
    }

    // ---- editing ----

    /// Move the note at `slot` by `delta`.
    ///
    /// Quantized edits move by scale degrees, saturating at the lowest
    /// tone of octave 2 and the highest tone of octave 5. Unquantized
    /// edits move by semitones within the MIDI range. Flags and velocity
    /// are kept either way.
    pub fn edit_step(&mut self, slot: usize, delta: i32, quantized: bool) -> Note {
        let existing = self.sequence.get(slot);
        let midi = if quantized {
            let (tone, octave) =
                self.scale()
                    .step_degrees_bounded(existing.tone(), existing.octave(), delta);
            Note::from_tone(tone, octave).midi()
        } else {
            clamp_midi(existing.midi().saturating_add(delta))
        };

        let edited = existing.with_pitch_of(&Note::from_midi(midi));
        self.sequence.set(slot, edited);

        if self.preview_enabled {
            self.preview_note = edited;
            self.preview.retrigger();
        }
        edited
    }

    /// Move the active length by `delta`. Returns the new length.
    pub fn set_length(&mut self, delta: i32) -> usize {
        self.sequence.adjust_length(delta)
    }

    /// Move the scale selection by `delta`, clamped to the selectable
    /// range. Returns the new index.
    pub fn set_scale(&mut self, delta: i32) -> usize {
        let index = (self.scale_index as i32).saturating_add(delta);
        self.scale_index = self.scales.clamp_index(index);
        log::debug!("scale {} ({})", self.scale_index, self.scale().name());
        self.scale_index
    }

    /// Flip the mute flag of `slot`. Returns the new flag.
    pub fn toggle_mute(&mut self, slot: usize) -> bool {
        let note = self.sequence.get_mut(slot);
        note.muted = !note.muted;
        note.muted
    }

    // ---- parameters ----

    /// Ratchets for the primary gate, clamped to `0..=7`
    pub fn set_ratchets(&mut self, ratchets: u8) {
        self.primary.set_ratchets(ratchets);
    }

    /// Move the ratchet count by `delta`. Returns the new count.
    pub fn adjust_ratchets(&mut self, delta: i32) -> u8 {
        let ratchets = (self.primary.ratchets() as i32)
            .saturating_add(delta)
            .clamp(0, MAX_RATCHETS as i32);
        self.set_ratchets(ratchets as u8);
        self.primary.ratchets()
    }

    /// Primary and accent gate length, seconds
    pub fn set_gate_length(&mut self, seconds: f32) {
        let seconds = if seconds.is_nan() {
            DEFAULT_GATE_LENGTH
        } else {
            seconds.clamp(MIN_GATE_LENGTH, MAX_GATE_LENGTH)
        };
        self.gate_length = seconds;
        self.primary.set_duration(seconds);
        self.accent.set_duration(seconds);
    }

    pub fn adjust_gate_length(&mut self, delta: f32) -> f32 {
        self.set_gate_length(self.gate_length + delta);
        self.gate_length
    }

    pub fn set_accent_probability(&mut self, percent: f32) {
        self.melody.set_accent_probability(percent);
    }

    pub fn adjust_accent_probability(&mut self, delta: f32) -> f32 {
        self.melody
            .set_accent_probability(self.melody.accent_probability + delta);
        self.melody.accent_probability
    }

    pub fn set_rest_probability(&mut self, percent: f32) {
        self.melody.set_rest_probability(percent);
    }

    /// Chance of a mutation each time the play head wraps, percent.
    ///
    /// The roll is a plain uniform draw against `percent`, so 50 means one
    /// wrap in two. Presets tuned on a halved roll need doubling.
    pub fn set_mutation_probability(&mut self, percent: f32) {
        self.mutation_probability = percent.clamp(0.0, 100.0);
    }

    /// Octave spread of freshly drawn notes
    pub fn set_range(&mut self, range: u8) {
        self.melody.range = range;
    }

    /// Offset added to the pitch output, volts
    pub fn set_transpose(&mut self, volts: f32) {
        self.transpose = volts;
    }

    pub fn set_follow(&mut self, follow: bool) {
        self.follow = follow;
    }

    pub fn toggle_follow(&mut self) -> bool {
        self.follow = !self.follow;
        self.follow
    }

    pub fn set_preview(&mut self, enabled: bool) {
        self.preview_enabled = enabled;
    }

    pub fn toggle_preview(&mut self) -> bool {
        self.preview_enabled = !self.preview_enabled;
        self.preview_enabled
    }

    /// Page shown on the encoders when follow mode is off
    pub fn select_page(&mut self, page: usize) {
        self.selected_page = page.min(NUM_PAGES - 1);
    }

    pub fn set_brightness(&mut self, brightness: f32) {
        self.brightness = if brightness.is_nan() {
            DEFAULT_BRIGHTNESS
        } else {
            brightness.clamp(0.0, 1.0)
        };
    }

    pub fn adjust_brightness(&mut self, delta: f32) -> f32 {
        self.set_brightness(self.brightness + delta);
        self.brightness
    }

    // ---- persistence ----

    /// Snapshot of everything the panel persists
    pub fn settings(&self) -> Settings {
        let mut settings = Settings {
            length: self.sequence.len() as i32,
            brightness: self.brightness,
            follow: self.follow,
            preview: self.preview_enabled,
            gate_length: self.gate_length,
            scale_index: self.scale_index as i32,
            accent_probability: libm::roundf(self.melody.accent_probability) as i32,
            ..Settings::default()
        };
        for (slot, note) in self.sequence.all().iter().enumerate() {
            settings.midi[slot] = note.midi();
            settings.muted[slot] = note.muted;
            settings.accents[slot] = note.accent;
            settings.velocities[slot] = note.velocity;
        }
        settings.seal();
        settings
    }

    /// Load a persisted record. A record that fails validation is
    /// replaced wholesale by [`Settings::default`].
    pub fn apply_settings(&mut self, settings: &Settings) -> Restored {
        match settings.validate(self.scales.len()) {
            Ok(()) => {
                self.load_settings(settings);
                log::debug!("settings restored");
                Restored::Stored
            }
            Err(fault) => {
                log::warn!("stored settings rejected ({}), using defaults", fault);
                self.load_settings(&Settings::default());
                Restored::Defaults
            }
        }
    }

    /// Power-up restore: apply the stored record, or the defaults when
    /// the store is empty, unreadable or holds a record that fails
    /// validation (erased flash included).
    pub fn restore<S: SettingsStore + ?Sized>(&mut self, store: &mut S) -> Restored {
        match store.load() {
            Ok(Some(settings)) => self.apply_settings(&settings),
            Ok(None) => {
                log::info!("no stored settings, using defaults");
                self.load_settings(&Settings::default());
                Restored::Defaults
            }
            Err(e) => {
                log::warn!("settings load failed ({}), using defaults", e);
                self.load_settings(&Settings::default());
                Restored::Defaults
            }
        }
    }

    fn load_settings(&mut self, settings: &Settings) {
        self.sequence.set_length(settings.length as usize);
        self.set_brightness(settings.brightness);
        self.follow = settings.follow;
        self.preview_enabled = settings.preview;
        self.set_gate_length(settings.gate_length);
        self.scale_index = self.scales.clamp_index(settings.scale_index);
        self.melody
            .set_accent_probability(settings.accent_probability as f32);

        for slot in 0..settings.midi.len() {
            let note = self.sequence.get_mut(slot);
            note.change_midi_number(clamp_midi(settings.midi[slot]));
            note.muted = settings.muted[slot];
            note.accent = settings.accents[slot];
            note.velocity = settings.velocities[slot];
        }
        self.current_note = self.sequence.get(self.cursor.step());
    }

    // ---- accessors ----

    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn current_note(&self) -> &Note {
        &self.current_note
    }

    pub fn current_step(&self) -> usize {
        self.cursor.step()
    }

    pub fn current_page(&self) -> usize {
        self.cursor.page()
    }

    pub fn current_place(&self) -> usize {
        self.cursor.place()
    }

    /// The active scale
    pub fn scale(&self) -> &'static Scale {
        // scale_index is kept within the selectable range of a validated
        // table
        self.scales
            .get(self.scale_index)
            .unwrap_or(&crate::scale::BUILTIN_SCALES[DEFAULT_SCALE_INDEX])
    }

    pub fn scale_index(&self) -> usize {
        self.scale_index
    }

    pub fn scales(&self) -> &ScaleTable {
        &self.scales
    }

    pub fn melody(&self) -> &MelodyGenerator {
        &self.melody
    }

    pub fn rng(&self) -> &R {
        &self.rng
    }

    pub fn ratchets(&self) -> u8 {
        self.primary.ratchets()
    }

    pub fn gate_length(&self) -> f32 {
        self.gate_length
    }

    pub fn transpose(&self) -> f32 {
        self.transpose
    }

    pub fn mutation_probability(&self) -> f32 {
        self.mutation_probability
    }

    pub fn follow(&self) -> bool {
        self.follow
    }

    pub fn preview_enabled(&self) -> bool {
        self.preview_enabled
    }

    pub fn brightness(&self) -> f32 {
        self.brightness
    }

    /// Page the encoders edit: the playing page in follow mode, otherwise
    /// the knob-selected one
    pub fn display_page(&self) -> usize {
        if self.follow {
            self.cursor.page()
        } else {
            self.selected_page
        }
    }

    /// Slot under encoder `encoder` on the visible page
    pub fn visible_slot(&self, encoder: usize) -> usize {
        self.display_page() * STEPS_PER_PAGE + encoder % STEPS_PER_PAGE
    }

    /// Last output level of the primary, accent and clock gates
    pub fn gate_states(&self) -> (bool, bool, bool) {
        (
            self.primary.current_state(),
            self.accent.current_state(),
            self.clock_out.current_state(),
        )
    }

    /// Pitch output level from the last tick, volts
    pub fn held_pitch(&self) -> f32 {
        self.held_pitch
    }
}
