//! Gate Envelope
//!
//! A per-output timed pulse. [`Gate::retrigger`] arms it; every
//! [`Gate::process`] call advances one sample. With ratchets enabled the
//! pulse window is cut into equal on/off sections, computed purely from
//! elapsed time, so no extra timer is needed.

use serde::{Deserialize, Serialize};

/// Default pulse length, seconds
pub const DEFAULT_DURATION: f32 = 0.25;
/// Ratchet counts above this are clamped
pub const MAX_RATCHETS: u8 = 7;
/// Shortest user-settable gate length, seconds
pub const MIN_GATE_LENGTH: f32 = 0.005;
/// Longest user-settable gate length, seconds
pub const MAX_GATE_LENGTH: f32 = 1.0;

/// Where the envelope currently sits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateStage {
    /// Not triggered, or the pulse has run out
    Idle,
    /// Plain pulse, high
    High,
    /// Ratcheted pulse, inside an "on" section
    RatchetHigh,
    /// Ratcheted pulse, inside an "off" section
    RatchetLow,
}

impl GateStage {
    pub fn is_high(self) -> bool {
        matches!(self, GateStage::High | GateStage::RatchetHigh)
    }
}

/// Gate envelope with re-settable duration and ratcheting
#[derive(Debug, Clone)]
pub struct Gate {
    sample_rate: f32,
    current_sample: u32,
    duration: f32,
    elapsed: f32,
    ratchets: u8,
    num_sections: u32,
    part_duration: f32,
    armed: bool,
    stage: GateStage,
}

impl Gate {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            current_sample: 0,
            duration: DEFAULT_DURATION,
            elapsed: 0.0,
            ratchets: 0,
            num_sections: 1,
            part_duration: DEFAULT_DURATION,
            armed: false,
            stage: GateStage::Idle,
        }
    }

    /// Builder form of [`Gate::set_duration`]
    pub fn with_duration(mut self, duration: f32) -> Self {
        self.set_duration(duration);
        self
    }

    /// Restart the pulse from zero, forcing the output high
    pub fn retrigger(&mut self) {
        self.current_sample = 0;
        self.elapsed = 0.0;
        self.armed = true;
        self.stage = if self.ratchets > 0 {
            GateStage::RatchetHigh
        } else {
            GateStage::High
        };
    }

    /// Pulse length in seconds. Takes effect on the next `process`.
    pub fn set_duration(&mut self, duration: f32) {
        self.duration = duration.max(0.0);
        self.part_duration = self.duration / self.num_sections as f32;
    }

    /// Number of extra pulses inside one gate. Zero gives a plain gate;
    /// `n` splits the window into `(n + 1) * 2` alternating sections.
    pub fn set_ratchets(&mut self, ratchets: u8) {
        self.ratchets = ratchets.min(MAX_RATCHETS);
        self.num_sections = if self.ratchets == 0 {
            1
        } else {
            (self.ratchets as u32 + 1) * 2
        };
        self.part_duration = self.duration / self.num_sections as f32;
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
    }

    /// Advance one sample and return the output level
    pub fn process(&mut self) -> bool {
        if !self.armed {
            return false;
        }

        self.current_sample = self.current_sample.saturating_add(1);
        self.elapsed = self.current_sample as f32 / self.sample_rate;

        self.stage = if self.elapsed >= self.duration {
            self.armed = false;
            GateStage::Idle
        } else if self.ratchets > 0 {
            let section = libm::floorf(self.elapsed / self.part_duration) as u32;
            if section % 2 == 0 {
                GateStage::RatchetHigh
            } else {
                GateStage::RatchetLow
            }
        } else {
            GateStage::High
        };

        self.stage.is_high()
    }

    /// Last computed output level
    pub fn current_state(&self) -> bool {
        self.stage.is_high()
    }

    pub fn stage(&self) -> GateStage {
        self.stage
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Seconds since the last retrigger
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn current_sample(&self) -> u32 {
        self.current_sample
    }

    pub fn ratchets(&self) -> u8 {
        self.ratchets
    }

    /// Length of one ratchet section, seconds
    pub fn part_duration(&self) -> f32 {
        self.part_duration
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new(48000.0)
    }
}
