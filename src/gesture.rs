//! Button Gestures
//!
//! Turns one debounced binary line into press, release, long-press and
//! double-click events. Updates are rate-limited to the debounce
//! interval; every event is visible for exactly one update, so the
//! caller must poll each tick or miss it. There is no queue.

use serde::{Deserialize, Serialize};

/// Minimum spacing between updates, milliseconds
pub const DEBOUNCE_INTERVAL_MS: u32 = 1;
/// Two presses closer than this count as a double-click, milliseconds
pub const DOUBLE_CLICK_MS: u32 = 300;
/// Hold time that turns a press into a long press, milliseconds
pub const LONG_PRESS_MS: u32 = 1500;

/// Timing thresholds for a [`GestureDetector`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GestureTiming {
    pub long_press_ms: u32,
    pub double_click_ms: u32,
    pub debounce_interval_ms: u32,
}

impl Default for GestureTiming {
    fn default() -> Self {
        Self {
            long_press_ms: LONG_PRESS_MS,
            double_click_ms: DOUBLE_CLICK_MS,
            debounce_interval_ms: DEBOUNCE_INTERVAL_MS,
        }
    }
}

/// The latched one-tick event. Only one can be live at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GestureEvent {
    PressedShort,
    PressedLong,
    ReleasedShort,
    ReleasedLong,
}

/// Press/release/long-press/double-click detector for one input line
#[derive(Debug, Clone)]
pub struct GestureDetector {
    timing: GestureTiming,
    last_update: Option<u32>,
    state: bool,
    prev_state: bool,
    rising_edge_time: u32,
    falling_edge_time: Option<u32>,
    press_duration: u32,
    event: Option<GestureEvent>,
    double_clicked: bool,
    rising_edge: bool,
    falling_edge: bool,
}

impl GestureDetector {
    pub fn new(timing: GestureTiming) -> Self {
        Self {
            timing,
            last_update: None,
            state: false,
            prev_state: false,
            rising_edge_time: 0,
            falling_edge_time: None,
            press_duration: 0,
            event: None,
            double_clicked: false,
            rising_edge: false,
            falling_edge: false,
        }
    }

    /// Detector with the default thresholds and a custom long-press time
    pub fn with_long_press(long_press_ms: u32) -> Self {
        Self::new(GestureTiming {
            long_press_ms,
            ..GestureTiming::default()
        })
    }

    /// Sample `level` (true = pressed) at `now_ms`.
    ///
    /// Returns `false` without touching any state when less than the
    /// debounce interval has passed since the last accepted update.
    pub fn update(&mut self, level: bool, now_ms: u32) -> bool {
        if let Some(last) = self.last_update {
            if now_ms.wrapping_sub(last) < self.timing.debounce_interval_ms {
                return false;
            }
        }
        self.last_update = Some(now_ms);

        self.prev_state = self.state;
        self.state = level;
        self.event = None;
        self.rising_edge = false;
        self.falling_edge = false;
        self.double_clicked = false;

        let long = self.timing.long_press_ms;
        match (self.prev_state, self.state) {
            (false, true) => {
                self.rising_edge = true;
                self.rising_edge_time = now_ms;
                self.press_duration = 0;
                self.event = Some(GestureEvent::PressedShort);
                self.double_clicked = self
                    .falling_edge_time
                    .map_or(false, |t| now_ms.wrapping_sub(t) < self.timing.double_click_ms);
            }
            (true, true) => {
                let previous = self.press_duration;
                self.press_duration = now_ms.wrapping_sub(self.rising_edge_time);
                if self.press_duration >= long && previous < long {
                    self.event = Some(GestureEvent::PressedLong);
                }
            }
            (true, false) => {
                self.falling_edge = true;
                self.falling_edge_time = Some(now_ms);
                // Classified on the last held tick, so a long release
                // always follows a long press
                let held = self.press_duration;
                self.press_duration = 0;
                self.event = Some(if held >= long {
                    GestureEvent::ReleasedLong
                } else {
                    GestureEvent::ReleasedShort
                });
            }
            (false, false) => {}
        }

        true
    }

    /// The event latched by the last update, if any
    pub fn event(&self) -> Option<GestureEvent> {
        self.event
    }

    pub fn is_pressed_short(&self) -> bool {
        self.event == Some(GestureEvent::PressedShort)
    }

    pub fn is_pressed_long(&self) -> bool {
        self.event == Some(GestureEvent::PressedLong)
    }

    pub fn is_released_short(&self) -> bool {
        self.event == Some(GestureEvent::ReleasedShort)
    }

    pub fn is_released_long(&self) -> bool {
        self.event == Some(GestureEvent::ReleasedLong)
    }

    pub fn is_double_clicked(&self) -> bool {
        self.double_clicked
    }

    /// Debounced level
    pub fn pressed(&self) -> bool {
        self.state
    }

    pub fn rising_edge(&self) -> bool {
        self.rising_edge
    }

    pub fn falling_edge(&self) -> bool {
        self.falling_edge
    }

    /// How long the current press has lasted, or 0 when released
    pub fn time_held_ms(&self, now_ms: u32) -> u32 {
        if self.state {
            now_ms.wrapping_sub(self.rising_edge_time)
        } else {
            0
        }
    }

    pub fn timing(&self) -> GestureTiming {
        self.timing
    }
}

impl Default for GestureDetector {
    fn default() -> Self {
        Self::new(GestureTiming::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    /// Feed `levels` one millisecond apart starting at `start`, collecting
    /// the event and double-click flag seen on each tick
    fn run(
        detector: &mut GestureDetector,
        start: u32,
        levels: &[bool],
    ) -> Vec<(Option<GestureEvent>, bool)> {
        levels
            .iter()
            .enumerate()
            .map(|(i, &level)| {
                assert!(detector.update(level, start.wrapping_add(i as u32)));
                (detector.event(), detector.is_double_clicked())
            })
            .collect()
    }

    fn press(k: usize) -> Vec<bool> {
        let mut levels = alloc::vec![false; 3];
        levels.extend(core::iter::repeat(true).take(k));
        levels.extend(core::iter::repeat(false).take(3));
        levels
    }

    #[test]
    fn test_short_press_and_release() {
        let mut detector = GestureDetector::with_long_press(100);
        let ticks = run(&mut detector, 0, &press(10));
        let events: Vec<_> = ticks.iter().filter_map(|(e, _)| *e).collect();
        assert_eq!(
            events,
            [GestureEvent::PressedShort, GestureEvent::ReleasedShort]
        );
        // Pressed on the rising tick, released on the first low tick
        assert_eq!(ticks[3].0, Some(GestureEvent::PressedShort));
        assert_eq!(ticks[13].0, Some(GestureEvent::ReleasedShort));
    }

    #[test]
    fn test_long_press_and_release() {
        let mut detector = GestureDetector::with_long_press(100);
        let ticks = run(&mut detector, 0, &press(150));
        let events: Vec<_> = ticks.iter().filter_map(|(e, _)| *e).collect();
        assert_eq!(
            events,
            [
                GestureEvent::PressedShort,
                GestureEvent::PressedLong,
                GestureEvent::ReleasedLong
            ]
        );
        // Long press fires exactly when 100ms have been held
        assert_eq!(ticks[103].0, Some(GestureEvent::PressedLong));
    }

    #[test]
    fn test_boundary_press_length() {
        // 20 high ticks are held for 19ms: short, with no long press
        let mut detector = GestureDetector::with_long_press(20);
        let ticks = run(&mut detector, 0, &press(20));
        let events: Vec<_> = ticks.iter().filter_map(|(e, _)| *e).collect();
        assert_eq!(
            events,
            [GestureEvent::PressedShort, GestureEvent::ReleasedShort]
        );

        // One more tick crosses the threshold
        let mut detector = GestureDetector::with_long_press(20);
        let ticks = run(&mut detector, 0, &press(21));
        let events: Vec<_> = ticks.iter().filter_map(|(e, _)| *e).collect();
        assert_eq!(
            events,
            [
                GestureEvent::PressedShort,
                GestureEvent::PressedLong,
                GestureEvent::ReleasedLong
            ]
        );
    }

    #[test]
    fn test_double_click() {
        let mut detector = GestureDetector::default();
        let mut levels = press(50);
        levels.extend(press(50));
        let ticks = run(&mut detector, 0, &levels);

        let doubles: Vec<usize> = ticks
            .iter()
            .enumerate()
            .filter(|(_, (_, d))| *d)
            .map(|(i, _)| i)
            .collect();
        // Only the second rising edge, at index 56 + 3
        assert_eq!(doubles, [59]);
        assert_eq!(ticks[59].0, Some(GestureEvent::PressedShort));
    }

    #[test]
    fn test_slow_second_press_is_not_double() {
        let mut detector = GestureDetector::default();
        run(&mut detector, 0, &press(20));
        let ticks = run(&mut detector, 1000, &press(20));
        assert!(ticks.iter().all(|(_, d)| !d));
    }

    #[test]
    fn test_first_press_is_not_double() {
        let mut detector = GestureDetector::default();
        // A press right after power-up has no previous release to pair with
        let ticks = run(&mut detector, 0, &press(5));
        assert!(ticks.iter().all(|(_, d)| !d));
    }

    #[test]
    fn test_rate_limited() {
        let mut detector = GestureDetector::default();
        assert!(detector.update(true, 10));
        assert!(detector.rising_edge());
        // Same millisecond: ignored, edge stays latched
        assert!(!detector.update(false, 10));
        assert!(detector.rising_edge());
        assert!(detector.update(true, 11));
        assert!(!detector.rising_edge());
        assert!(detector.pressed());
    }

    #[test]
    fn test_edges_and_hold_time() {
        let mut detector = GestureDetector::default();
        detector.update(false, 0);
        detector.update(true, 1);
        assert!(detector.rising_edge());
        detector.update(true, 2);
        assert_eq!(detector.time_held_ms(40), 39);
        detector.update(false, 3);
        assert!(detector.falling_edge());
        assert_eq!(detector.time_held_ms(40), 0);
    }

    #[test]
    fn test_timer_wraparound() {
        let mut detector = GestureDetector::with_long_press(5);
        let start = u32::MAX - 3;
        let ticks = run(&mut detector, start, &press(8));
        let events: Vec<_> = ticks.iter().filter_map(|(e, _)| *e).collect();
        assert_eq!(
            events,
            [
                GestureEvent::PressedShort,
                GestureEvent::PressedLong,
                GestureEvent::ReleasedLong
            ]
        );
    }
}
