//! Raw Input Decoding
//!
//! Decoders for the lines the panel reads once per control tick: the
//! switchless step encoders, and the shift-register inputs (encoder
//! clicks, clock and reset jacks) that are debounced by keeping a byte
//! of history.

/// Quadrature decoder for an encoder whose push switch is read elsewhere.
///
/// Both pins idle high through pull-ups. A detent clockwise pulls A low
/// while B is already low; counter-clockwise pulls B low while A is low.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuadratureEncoder {
    a: u8,
    b: u8,
    increment: i32,
}

impl QuadratureEncoder {
    pub fn new() -> Self {
        Self {
            a: 0xff,
            b: 0xff,
            increment: 0,
        }
    }

    /// Shift in one sample of each pin and return the detent seen, if any:
    /// +1 clockwise, -1 counter-clockwise, 0 otherwise.
    pub fn update(&mut self, a: bool, b: bool) -> i32 {
        self.a = (self.a << 1) | a as u8;
        self.b = (self.b << 1) | b as u8;

        self.increment = if (self.a & 0x03) == 0x02 && (self.b & 0x03) == 0x00 {
            1
        } else if (self.b & 0x03) == 0x02 && (self.a & 0x03) == 0x00 {
            -1
        } else {
            0
        };
        self.increment
    }

    /// Detent seen by the last update
    pub fn increment(&self) -> i32 {
        self.increment
    }
}

impl Default for QuadratureEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Eight-sample history debouncer.
///
/// A line counts as held after eight consecutive high samples. The rising
/// edge is reported once, on the seventh high sample following a low one;
/// the falling edge likewise on the seventh low sample following a high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EdgeDebouncer {
    history: u8,
}

impl EdgeDebouncer {
    pub fn new() -> Self {
        Self { history: 0 }
    }

    /// Shift in one sample (true = high / pressed)
    pub fn update(&mut self, level: bool) {
        self.history = (self.history << 1) | level as u8;
    }

    pub fn pressed(&self) -> bool {
        self.history == 0xff
    }

    pub fn rising_edge(&self) -> bool {
        self.history == 0x7f
    }

    pub fn falling_edge(&self) -> bool {
        self.history == 0x80
    }

    /// Raw sample history, newest sample in bit 0
    pub fn history(&self) -> u8 {
        self.history
    }
}

/// Pin levels for one clockwise detent, starting and ending at rest
pub const CLOCKWISE_DETENT: [(bool, bool); 4] =
    [(true, false), (false, false), (false, true), (true, true)];
/// Pin levels for one counter-clockwise detent, starting and ending at rest
pub const COUNTER_CLOCKWISE_DETENT: [(bool, bool); 4] =
    [(false, true), (false, false), (true, false), (true, true)];
