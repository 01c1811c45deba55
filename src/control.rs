//! Control Loop
//!
//! [`Controller::poll`] is the panel's best-effort loop body. It turns one
//! [`ControlFrame`] of raw readings into sequencer calls: knobs and CVs
//! set parameters, buttons become gestures, encoder turns edit steps,
//! and the clock and reset jacks drive playback.
//!
//! Jack lines are debounced on every call. Everything else runs at most
//! once per debounce interval.

use crate::display::{Overlay, PanelView};
use crate::gesture::{GestureDetector, GestureTiming};
use crate::input::{EdgeDebouncer, QuadratureEncoder};
use crate::io::{ClockSource, DebouncedJack};
use crate::rng::RandomSource;
use crate::sequence::{NUM_PAGES, STEPS_PER_PAGE};
use crate::sequencer::{Restored, SequencerContext, StepOutcome};
use crate::settings::SettingsStore;
use serde::{Deserialize, Serialize};

/// Knobs (and matching CV inputs) on the panel
pub const NUM_KNOBS: usize = 5;
/// Step encoders, one per step of a page
pub const NUM_ENCODERS: usize = STEPS_PER_PAGE;

const ENC_LENGTH: usize = 0;
const ENC_SCALE: usize = 1;
const ENC_RATCHETS: usize = 2;
const ENC_ACCENT: usize = 3;
const ENC_GATE: usize = 4;
const ENC_PREVIEW: usize = 6;
const ENC_BRIGHTNESS: usize = 7;
const ENC_FOLLOW: usize = 7;

/// Control loop tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlConfig {
    pub gestures: GestureTiming,
    /// Accent probability change per shifted detent, percent
    pub accent_step: f32,
    /// Gate length change per shifted detent, seconds
    pub gate_step: f32,
    /// Brightness change per shifted detent
    pub brightness_step: f32,
}

impl ControlConfig {
    pub fn with_long_press(mut self, ms: u32) -> Self {
        self.gestures.long_press_ms = ms;
        self
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            gestures: GestureTiming::default(),
            accent_step: 5.0,
            gate_step: 0.005,
            brightness_step: 0.05,
        }
    }
}

/// One snapshot of every panel input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlFrame {
    /// Monotonic milliseconds; wraps
    pub now_ms: u32,
    /// Knob positions, 0.0-1.0
    pub knobs: [f32; NUM_KNOBS],
    /// CV inputs, normalized to the knob range
    pub cvs: [f32; NUM_KNOBS],
    /// Encoder A/B pin levels
    pub encoder_pins: [(bool, bool); NUM_ENCODERS],
    pub encoder_clicks: [bool; NUM_ENCODERS],
    pub channel: bool,
    pub reset: bool,
    pub shift: bool,
    pub clock_jack: bool,
    pub reset_jack: bool,
}

impl ControlFrame {
    /// Everything at rest: knobs down, buttons up, encoder pins high
    pub fn at(now_ms: u32) -> Self {
        Self {
            now_ms,
            knobs: [0.0; NUM_KNOBS],
            cvs: [0.0; NUM_KNOBS],
            encoder_pins: [(true, true); NUM_ENCODERS],
            encoder_clicks: [false; NUM_ENCODERS],
            channel: false,
            reset: false,
            shift: false,
            clock_jack: false,
            reset_jack: false,
        }
    }

    /// Knob `index` plus its CV, clamped to 0.0-1.0
    pub fn control(&self, index: usize) -> f32 {
        (self.knobs[index] + self.cvs[index]).clamp(0.0, 1.0)
    }
}

impl Default for ControlFrame {
    fn default() -> Self {
        Self::at(0)
    }
}

/// What one poll did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PollOutcome {
    /// The debounced part of the loop ran
    pub ticked: bool,
    pub step: Option<StepOutcome>,
    pub reset: bool,
    pub new_melody: bool,
    pub saved: bool,
    pub loaded: Option<Restored>,
    /// Steps edited by encoder turns
    pub edits: u8,
    /// Mute flags flipped by encoder clicks
    pub mutes: u8,
}

/// Input state carried between polls
#[derive(Debug, Clone)]
pub struct Controller {
    config: ControlConfig,
    channel: GestureDetector,
    reset: GestureDetector,
    shift: GestureDetector,
    encoders: [QuadratureEncoder; NUM_ENCODERS],
    clicks: [EdgeDebouncer; NUM_ENCODERS],
    clock_jack: DebouncedJack,
    reset_jack: DebouncedJack,
    last_tick: Option<u32>,
    overlay: Overlay,
    swallow_release: bool,
}

impl Controller {
    pub fn new(config: ControlConfig) -> Self {
        Self {
            config,
            channel: GestureDetector::new(config.gestures),
            reset: GestureDetector::new(config.gestures),
            shift: GestureDetector::new(config.gestures),
            encoders: [QuadratureEncoder::new(); NUM_ENCODERS],
            clicks: [EdgeDebouncer::new(); NUM_ENCODERS],
            clock_jack: DebouncedJack::new(),
            reset_jack: DebouncedJack::new(),
            last_tick: None,
            overlay: Overlay::None,
            swallow_release: false,
        }
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    /// Run one pass of the control loop
    pub fn poll<R, S>(
        &mut self,
        ctx: &mut SequencerContext<R>,
        frame: &ControlFrame,
        store: &mut S,
    ) -> PollOutcome
    where
        R: RandomSource,
        S: SettingsStore + ?Sized,
    {
        let mut outcome = PollOutcome::default();

        self.clock_jack.feed(frame.clock_jack);
        self.reset_jack.feed(frame.reset_jack);

        let due = self.last_tick.map_or(true, |last| {
            frame.now_ms.wrapping_sub(last) >= self.config.gestures.debounce_interval_ms
        });
        if due {
            self.last_tick = Some(frame.now_ms);
            outcome.ticked = true;
            self.apply_knobs(ctx, frame);
            self.handle_buttons(ctx, frame, store, &mut outcome);
            self.handle_encoders(ctx, frame, &mut outcome);
        }

        if self.reset_jack.rising_edge() {
            ctx.reset();
            outcome.reset = true;
        }
        outcome.step = ctx.run_clock(&mut self.clock_jack);
        outcome
    }

    /// Map knob + CV sums onto sequencer parameters
    pub fn apply_knobs<R: RandomSource>(&self, ctx: &mut SequencerContext<R>, frame: &ControlFrame) {
        ctx.set_transpose(frame.control(0) * 2.0 - 1.0);
        ctx.set_rest_probability((frame.control(1) * 100.0 - 10.0).clamp(0.0, 90.0));
        ctx.set_range((frame.control(2) > 0.5) as u8);
        ctx.set_mutation_probability(frame.control(3) * 100.0);
        let page = libm::floorf(frame.control(4) * NUM_PAGES as f32) as usize;
        ctx.select_page(page.min(NUM_PAGES - 1));
    }

    fn handle_buttons<R, S>(
        &mut self,
        ctx: &mut SequencerContext<R>,
        frame: &ControlFrame,
        store: &mut S,
        outcome: &mut PollOutcome,
    ) where
        R: RandomSource,
        S: SettingsStore + ?Sized,
    {
        let now = frame.now_ms;
        self.channel.update(frame.channel, now);
        self.reset.update(frame.reset, now);
        self.shift.update(frame.shift, now);

        if !self.shift.pressed() {
            self.overlay = Overlay::None;
        }

        if self.channel.rising_edge() {
            match store.save(&ctx.settings()) {
                Ok(()) => {
                    log::info!("settings saved");
                    outcome.saved = true;
                }
                Err(e) => log::warn!("settings save failed: {}", e),
            }
        }

        if self.reset.is_pressed_long() {
            match store.load() {
                Ok(Some(settings)) => {
                    log::info!("settings loaded");
                    outcome.loaded = Some(ctx.apply_settings(&settings));
                }
                Ok(None) => log::info!("no stored settings"),
                Err(e) => log::warn!("settings load failed: {}", e),
            }
        }

        if self.reset.is_double_clicked() {
            ctx.reset();
            outcome.reset = true;
            // The release that ends a double-click is not a new-melody press
            self.swallow_release = true;
        } else if self.reset.falling_edge() {
            // Whichever release ends a double-click, short or long, is
            // not a new-melody press
            let swallowed = core::mem::take(&mut self.swallow_release);
            if self.reset.is_released_short() && !swallowed {
                ctx.new_melody();
                log::info!("new melody");
                outcome.new_melody = true;
            }
        }
    }

    fn handle_encoders<R: RandomSource>(
        &mut self,
        ctx: &mut SequencerContext<R>,
        frame: &ControlFrame,
        outcome: &mut PollOutcome,
    ) {
        let shifted = self.shift.pressed();

        for i in 0..NUM_ENCODERS {
            self.clicks[i].update(frame.encoder_clicks[i]);
            if self.clicks[i].rising_edge() {
                if shifted {
                    self.shift_click(ctx, i);
                } else {
                    ctx.toggle_mute(ctx.visible_slot(i));
                    outcome.mutes += 1;
                }
            }

            let (a, b) = frame.encoder_pins[i];
            let delta = self.encoders[i].update(a, b);
            if delta == 0 {
                continue;
            }
            if shifted {
                self.shift_turn(ctx, i, delta);
            } else {
                let quantized = !self.clicks[i].pressed();
                let note = ctx.edit_step(ctx.visible_slot(i), delta, quantized);
                log::debug!("encoder {} -> {}", i, note);
                outcome.edits += 1;
            }
        }
    }

    fn shift_click<R: RandomSource>(&mut self, ctx: &mut SequencerContext<R>, encoder: usize) {
        match encoder {
            ENC_FOLLOW => log::debug!("follow {}", ctx.toggle_follow()),
            ENC_PREVIEW => log::debug!("preview {}", ctx.toggle_preview()),
            _ => {}
        }
    }

    fn shift_turn<R: RandomSource>(&mut self, ctx: &mut SequencerContext<R>, encoder: usize, delta: i32) {
        let d = delta as f32;
        match encoder {
            ENC_LENGTH => {
                ctx.set_length(delta);
                self.overlay = Overlay::Length;
            }
            ENC_SCALE => {
                ctx.set_scale(delta);
                self.overlay = Overlay::Scale;
            }
            ENC_RATCHETS => {
                ctx.adjust_ratchets(delta);
            }
            ENC_ACCENT => {
                ctx.adjust_accent_probability(d * self.config.accent_step);
            }
            ENC_GATE => {
                ctx.adjust_gate_length(d * self.config.gate_step);
            }
            ENC_BRIGHTNESS => {
                ctx.adjust_brightness(d * self.config.brightness_step);
            }
            _ => {}
        }
    }

    /// Panel state for the display
    pub fn view(&self) -> PanelView {
        PanelView {
            shift_held: self.shift.pressed(),
            reset_held: self.reset.pressed(),
            channel_held: self.channel.pressed(),
            clock_high: self.clock_jack.is_high(),
            overlay: self.overlay,
        }
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(ControlConfig::default())
    }
}
