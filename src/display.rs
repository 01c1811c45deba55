//! Panel Display
//!
//! LEDs are named by what they show ([`Led`]) and routed to the RGB
//! driver's channels by a validated [`LedMap`]. [`Renderer::render`]
//! draws one frame of panel state through a [`DisplaySink`]; the driver
//! transfer itself belongs to the host.

use crate::error::Error;
use crate::note::{MIDI_MAX, MIDI_MIN};
use crate::rng::RandomSource;
use crate::sequence::{NUM_PAGES, STEPS_PER_PAGE};
use crate::sequencer::SequencerContext;
use serde::{Deserialize, Serialize};

/// Channels on the LED driver chain (four 16-channel drivers)
pub const DRIVER_CHANNELS: u8 = 64;

/// One RGB LED on the panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Led {
    /// Step LED under encoder `n` (0-7)
    Step(u8),
    /// Page LED `n` (0-3)
    Page(u8),
    Channel,
    Reset,
    Shift,
    Gate1,
    Gate2,
    Clock,
    Out1,
    Out2,
}

impl Led {
    pub const COUNT: usize = STEPS_PER_PAGE + NUM_PAGES + 8;

    /// Position in [`LedMap`] order, `None` for an out-of-range step or
    /// page number
    pub fn index(self) -> Option<usize> {
        let steps = STEPS_PER_PAGE;
        let pages = steps + NUM_PAGES;
        match self {
            Led::Step(n) if (n as usize) < STEPS_PER_PAGE => Some(n as usize),
            Led::Page(n) if (n as usize) < NUM_PAGES => Some(steps + n as usize),
            Led::Step(_) | Led::Page(_) => None,
            Led::Channel => Some(pages),
            Led::Reset => Some(pages + 1),
            Led::Shift => Some(pages + 2),
            Led::Gate1 => Some(pages + 3),
            Led::Gate2 => Some(pages + 4),
            Led::Clock => Some(pages + 5),
            Led::Out1 => Some(pages + 6),
            Led::Out2 => Some(pages + 7),
        }
    }
}

/// Linear RGB, each component 0.0-1.0
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Blend toward `other`; `t` = 0 is `self`, 1 is `other`
    pub fn lerp(self, other: Color, t: f32) -> Color {
        let mix = |a: f32, b: f32| a * (1.0 - t) + b * t;
        Color::new(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b))
    }

    pub fn scaled(self, brightness: f32) -> Color {
        Color::new(self.r * brightness, self.g * brightness, self.b * brightness)
    }
}

/// Colours used for overlays and page markers
pub mod palette {
    use super::Color;

    pub const ORANGE: Color = Color::new(1.0, 0.5, 0.0);
    pub const GREEN: Color = Color::new(0.0, 1.0, 0.0);
    pub const BLUE: Color = Color::new(0.0, 0.0, 1.0);
    pub const TEAL: Color = Color::new(0.0, 1.0, 1.0);
    pub const MAGENTA: Color = Color::new(1.0, 0.0, 1.0);
    pub const VIOLET: Color = Color::new(0.33, 0.0, 1.0);
    pub const RED: Color = Color::new(1.0, 0.0, 0.0);
    pub const YELLOW: Color = Color::new(1.0, 1.0, 0.0);

    /// Low to high notes
    pub const NOTE_GRADIENT: [Color; 5] = [BLUE, GREEN, YELLOW, RED, VIOLET];
}

const NOTE_COUNT: usize = (MIDI_MAX - MIDI_MIN + 1) as usize;

/// One colour per playable MIDI number, blended across
/// [`palette::NOTE_GRADIENT`]
#[derive(Debug, Clone, PartialEq)]
pub struct NoteColormap {
    colors: [Color; NOTE_COUNT],
}

impl NoteColormap {
    pub fn new() -> Self {
        let stops = palette::NOTE_GRADIENT;
        let segments = stops.len() - 1;
        let per_segment = (NOTE_COUNT - 1) / segments;

        let mut colors = [Color::BLACK; NOTE_COUNT];
        for (i, color) in colors.iter_mut().enumerate() {
            let segment = (i / per_segment).min(segments - 1);
            let t = (i - segment * per_segment) as f32 / per_segment as f32;
            *color = stops[segment].lerp(stops[segment + 1], t);
        }
        Self { colors }
    }

    /// Colour for `midi`, clamped to the playable range
    pub fn color(&self, midi: i32) -> Color {
        self.colors[(midi.clamp(MIDI_MIN, MIDI_MAX) - MIDI_MIN) as usize]
    }
}

impl Default for NoteColormap {
    fn default() -> Self {
        Self::new()
    }
}

/// Driver channels for the three components of one LED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RgbChannels {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

const fn rgb(r: u8, g: u8, b: u8) -> RgbChannels {
    RgbChannels { r, g, b }
}

/// Routing from [`Led`] to driver channels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedMap {
    channels: [RgbChannels; Led::COUNT],
}

/// Wiring of the Bloom panel, in [`Led::index`] order
const BLOOM_WIRING: [RgbChannels; Led::COUNT] = [
    rgb(0, 1, 2),
    rgb(3, 4, 5),
    rgb(6, 7, 8),
    rgb(25, 26, 27),
    rgb(19, 20, 21),
    rgb(22, 23, 24),
    rgb(38, 39, 40),
    rgb(35, 36, 37),
    rgb(28, 29, 30),
    rgb(16, 17, 18),
    rgb(44, 45, 46),
    rgb(41, 42, 43),
    rgb(9, 10, 11),
    rgb(12, 13, 14),
    rgb(32, 33, 34),
    rgb(48, 49, 50),
    rgb(51, 52, 53),
    rgb(54, 55, 56),
    rgb(57, 58, 59),
    rgb(60, 61, 62),
];

impl LedMap {
    /// Check that every channel exists and none is shared
    pub fn new(channels: [RgbChannels; Led::COUNT]) -> Result<Self, Error> {
        let mut used = 0u64;
        for led in &channels {
            for channel in [led.r, led.g, led.b] {
                if channel >= DRIVER_CHANNELS {
                    return Err(Error::LedChannelOutOfRange { channel });
                }
                let bit = 1u64 << channel;
                if used & bit != 0 {
                    return Err(Error::LedChannelReused { channel });
                }
                used |= bit;
            }
        }
        Ok(Self { channels })
    }

    pub fn bloom() -> Self {
        Self {
            channels: BLOOM_WIRING,
        }
    }

    pub fn channels(&self, led: Led) -> Option<RgbChannels> {
        led.index().map(|i| self.channels[i])
    }
}

impl Default for LedMap {
    fn default() -> Self {
        Self::bloom()
    }
}

/// Anything that can show an LED colour
pub trait DisplaySink {
    fn set_led(&mut self, led: Led, color: Color);

    /// Push the frame out. Called once per render.
    fn flush(&mut self) {}
}

/// Raw channel-level driver
pub trait LedDriver {
    fn set_channel(&mut self, channel: u8, level: f32);

    fn transmit(&mut self);
}

/// [`DisplaySink`] that routes through an [`LedMap`] to an [`LedDriver`]
#[derive(Debug)]
pub struct MappedDisplay<D> {
    map: LedMap,
    driver: D,
}

impl<D: LedDriver> MappedDisplay<D> {
    pub fn new(map: LedMap, driver: D) -> Self {
        Self { map, driver }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }
}

impl<D: LedDriver> DisplaySink for MappedDisplay<D> {
    fn set_led(&mut self, led: Led, color: Color) {
        if let Some(ch) = self.map.channels(led) {
            self.driver.set_channel(ch.r, color.r);
            self.driver.set_channel(ch.g, color.g);
            self.driver.set_channel(ch.b, color.b);
        }
    }

    fn flush(&mut self) {
        self.driver.transmit();
    }
}

/// What a shift turn asked to be shown in place of the step view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Overlay {
    #[default]
    None,
    Length,
    Scale,
}

/// Panel state that lives outside the sequencer
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PanelView {
    pub shift_held: bool,
    pub reset_held: bool,
    pub channel_held: bool,
    pub clock_high: bool,
    pub overlay: Overlay,
}

/// Split a count across the step and page LEDs: `(steps lit, last page
/// lit)`. 8 shows as eight steps on page 0, 9 as one step on page 1.
pub fn count_lights(count: usize) -> (usize, usize) {
    let pages = count / STEPS_PER_PAGE;
    match count % STEPS_PER_PAGE {
        0 => (STEPS_PER_PAGE, pages.saturating_sub(1)),
        lights => (lights, pages),
    }
}

/// Draws panel frames
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    colormap: NoteColormap,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn colormap(&self) -> &NoteColormap {
        &self.colormap
    }

    /// Draw every LED for the current state and flush
    pub fn render<R, S>(&self, ctx: &SequencerContext<R>, view: &PanelView, sink: &mut S)
    where
        R: RandomSource,
        S: DisplaySink + ?Sized,
    {
        let level = ctx.brightness();
        let lit = |on: bool, color: Color| if on { color.scaled(level) } else { Color::BLACK };

        match (view.shift_held, view.overlay) {
            (true, Overlay::Length) => {
                self.render_count(ctx.sequence().len(), palette::ORANGE, level, sink)
            }
            (true, Overlay::Scale) => {
                self.render_count(ctx.scale_index(), palette::GREEN, level, sink)
            }
            _ => self.render_steps(ctx, level, sink),
        }

        sink.set_led(Led::Shift, lit(view.shift_held, Color::WHITE));
        sink.set_led(Led::Reset, lit(view.reset_held, Color::WHITE));
        sink.set_led(Led::Channel, lit(view.channel_held, palette::MAGENTA));
        sink.set_led(Led::Clock, lit(view.clock_high, palette::TEAL));

        let (gate, accent, _) = ctx.gate_states();
        let note = ctx.current_note();
        sink.set_led(Led::Gate1, lit(gate, palette::BLUE));
        sink.set_led(Led::Gate2, lit(accent, palette::BLUE));
        sink.set_led(Led::Out1, lit(gate, self.colormap.color(note.midi())));
        sink.set_led(
            Led::Out2,
            Color::WHITE.scaled(level * note.velocity / crate::note::MAX_VELOCITY),
        );

        sink.flush();
    }

    fn render_steps<R, S>(&self, ctx: &SequencerContext<R>, level: f32, sink: &mut S)
    where
        R: RandomSource,
        S: DisplaySink + ?Sized,
    {
        let page = ctx.display_page();
        let cursor = ctx.cursor();

        for i in 0..STEPS_PER_PAGE {
            let note = ctx.sequence().get(page * STEPS_PER_PAGE + i);
            let color = if cursor.page() == page && cursor.place() == i {
                Color::WHITE
            } else if note.muted {
                Color::BLACK
            } else {
                self.colormap.color(note.midi())
            };
            sink.set_led(Led::Step(i as u8), color.scaled(level));
        }

        for p in 0..NUM_PAGES {
            let color = if p == page {
                palette::VIOLET
            } else if p == cursor.page() {
                palette::BLUE
            } else {
                Color::BLACK
            };
            sink.set_led(Led::Page(p as u8), color.scaled(level));
        }
    }

    fn render_count<S: DisplaySink + ?Sized>(
        &self,
        count: usize,
        color: Color,
        level: f32,
        sink: &mut S,
    ) {
        let (lights, last_page) = count_lights(count);
        for i in 0..STEPS_PER_PAGE {
            let on = if i < lights { color.scaled(level) } else { Color::BLACK };
            sink.set_led(Led::Step(i as u8), on);
        }
        for p in 0..NUM_PAGES {
            let on = if p <= last_page { color.scaled(level) } else { Color::BLACK };
            sink.set_led(Led::Page(p as u8), on);
        }
    }
}
