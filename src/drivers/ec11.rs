//! EC11 Rotary Encoder Driver
//!
//! Two ways to read the front-panel knob:
//! - [`Ec11Counter`] reads a timer running in encoder mode through the
//!   [`QuadratureCounter`] trait
//! - [`Ec11`] decodes the A/B phases from GPIO polling, with acceleration
//!   and a debounced push switch that reports long presses

use embedded_hal::digital::InputPin;

use crate::config::timing::ENCODER_LONG_PRESS_MS;
use crate::drivers::{Error, Result};
use crate::hal::gpio::{ButtonState, DebouncedButton};

/// Encoder rotation direction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Clockwise rotation (increment)
    Clockwise,
    /// Counter-clockwise rotation (decrement)
    CounterClockwise,
}

#[cfg(feature = "embedded")]
impl defmt::Format for Direction {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Clockwise => defmt::write!(f, "CW"),
            Self::CounterClockwise => defmt::write!(f, "CCW"),
        }
    }
}

// ============================================================================
// Hardware counter mode
// ============================================================================

/// A timer configured as a quadrature counter
pub trait QuadratureCounter {
    /// Current 16-bit count
    fn count(&mut self) -> u16;

    /// Whether the timer is counting down
    fn counting_down(&mut self) -> bool;
}

/// Snapshot of a hardware counter
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncoderReading {
    /// Direction reported by the timer
    pub direction: Direction,
    /// Raw count
    pub count: u16,
}

#[cfg(feature = "embedded")]
impl defmt::Format for EncoderReading {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{} @ {}", self.direction, self.count);
    }
}

/// Encoder read through a hardware counter
pub struct Ec11Counter<C> {
    counter: C,
    last_count: u16,
}

impl<C: QuadratureCounter> Ec11Counter<C> {
    /// Wrap a counter, taking its current value as the reference
    pub fn new(mut counter: C) -> Self {
        let last_count = counter.count();
        Self { counter, last_count }
    }

    /// Direction and raw count
    pub fn read(&mut self) -> EncoderReading {
        let direction = if self.counter.counting_down() {
            Direction::CounterClockwise
        } else {
            Direction::Clockwise
        };
        EncoderReading {
            direction,
            count: self.counter.count(),
        }
    }

    /// Signed steps since the previous call, across 16-bit wrap
    #[allow(clippy::cast_possible_wrap)]
    pub fn delta(&mut self) -> i16 {
        let count = self.counter.count();
        let delta = count.wrapping_sub(self.last_count) as i16;
        self.last_count = count;
        delta
    }

    /// Give the counter back
    pub fn release(self) -> C {
        self.counter
    }
}

// ============================================================================
// GPIO mode
// ============================================================================

/// Encoder event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncoderEvent {
    /// Knob turned one detent
    Rotate {
        /// Direction of rotation
        direction: Direction,
        /// Effective steps after acceleration
        steps: u32,
    },
    /// Switch pressed
    ButtonPress,
    /// Switch released before the long-press threshold
    ButtonRelease,
    /// Switch held past the long-press threshold
    LongPress,
}

#[cfg(feature = "embedded")]
impl defmt::Format for EncoderEvent {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Rotate { direction, steps } => defmt::write!(f, "Rotate({}, {})", direction, steps),
            Self::ButtonPress => defmt::write!(f, "Press"),
            Self::ButtonRelease => defmt::write!(f, "Release"),
            Self::LongPress => defmt::write!(f, "LongPress"),
        }
    }
}

/// Position within one detent cycle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Phase {
    #[default]
    Rest,
    Cw1,
    Cw2,
    Cw3,
    Ccw1,
    Ccw2,
    Ccw3,
}

/// Quadrature state machine
///
/// A detent is only reported after the full Gray sequence back to 00;
/// any out-of-sequence edge drops back to rest.
#[derive(Clone, Copy, Debug, Default)]
pub struct QuadratureDecoder {
    phase: Phase,
    last: (bool, bool),
}

impl QuadratureDecoder {
    /// Decoder at rest with both phases low
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: Phase::Rest,
            last: (false, false),
        }
    }

    /// Feed the A/B levels, returns a direction when a detent completes
    pub fn update(&mut self, a: bool, b: bool) -> Option<Direction> {
        if (a, b) == self.last {
            return None;
        }
        self.last = (a, b);

        // CW: 00 -> 01 -> 11 -> 10 -> 00, CCW: 00 -> 10 -> 11 -> 01 -> 00
        let (phase, detent) = match (self.phase, a, b) {
            (Phase::Rest, false, true) => (Phase::Cw1, None),
            (Phase::Cw1, true, true) => (Phase::Cw2, None),
            (Phase::Cw2, true, false) => (Phase::Cw3, None),
            (Phase::Cw3, false, false) => (Phase::Rest, Some(Direction::Clockwise)),
            (Phase::Rest, true, false) => (Phase::Ccw1, None),
            (Phase::Ccw1, true, true) => (Phase::Ccw2, None),
            (Phase::Ccw2, false, true) => (Phase::Ccw3, None),
            (Phase::Ccw3, false, false) => (Phase::Rest, Some(Direction::CounterClockwise)),
            _ => (Phase::Rest, None),
        };
        self.phase = phase;
        detent
    }

    /// Drop any partial sequence
    pub fn reset(&mut self) {
        self.phase = Phase::Rest;
    }
}

/// Step multiplier for fast turning
#[derive(Clone, Copy, Debug)]
pub struct AccelerationCurve {
    threshold_ms: u32,
    multiplier: u32,
    last_ms: u32,
    streak: u32,
}

impl AccelerationCurve {
    /// Longest streak counted
    const MAX_STREAK: u32 = 10;

    /// Accelerate when detents arrive less than `threshold_ms` apart,
    /// up to `1 + multiplier` steps each
    #[must_use]
    pub const fn new(threshold_ms: u32, multiplier: u32) -> Self {
        Self {
            threshold_ms,
            multiplier,
            last_ms: 0,
            streak: 0,
        }
    }

    /// Effective steps for a detent at `now_ms`
    pub fn process(&mut self, now_ms: u32) -> u32 {
        let elapsed = now_ms.wrapping_sub(self.last_ms);
        self.last_ms = now_ms;

        if elapsed < self.threshold_ms {
            self.streak = (self.streak + 1).min(Self::MAX_STREAK);
            1 + self.streak * self.multiplier / Self::MAX_STREAK
        } else {
            self.streak = 0;
            1
        }
    }

    /// Forget the current streak
    pub fn reset(&mut self) {
        self.streak = 0;
    }
}

impl Default for AccelerationCurve {
    /// 50 ms threshold, up to 6 steps per detent
    fn default() -> Self {
        Self::new(50, 5)
    }
}

/// Encoder decoded from GPIO, with push switch
pub struct Ec11<A, B, SW> {
    a: A,
    b: B,
    switch: DebouncedButton<SW>,
    decoder: QuadratureDecoder,
    acceleration: AccelerationCurve,
    pressed_at_ms: Option<u32>,
    long_press_ms: u32,
    long_press_sent: bool,
}

impl<A, B, SW> Ec11<A, B, SW>
where
    A: InputPin,
    B: InputPin<Error = A::Error>,
    SW: InputPin<Error = A::Error>,
{
    /// Create the driver; the switch is active low with a pull-up
    pub fn new(a: A, b: B, switch: SW) -> Self {
        Self {
            a,
            b,
            switch: DebouncedButton::new(switch),
            decoder: QuadratureDecoder::new(),
            acceleration: AccelerationCurve::default(),
            pressed_at_ms: None,
            long_press_ms: ENCODER_LONG_PRESS_MS,
            long_press_sent: false,
        }
    }

    /// Sample the pins, call every millisecond or so
    ///
    /// Rotation takes priority; at most one event is returned per call.
    pub fn poll(&mut self, now_ms: u32) -> Result<Option<EncoderEvent>, A::Error> {
        let a = self.a.is_high().map_err(Error::Bus)?;
        let b = self.b.is_high().map_err(Error::Bus)?;

        if let Some(direction) = self.decoder.update(a, b) {
            let steps = self.acceleration.process(now_ms);
            trace!("ec11: {} x{=u32}", direction, steps);
            return Ok(Some(EncoderEvent::Rotate { direction, steps }));
        }

        if self.switch.update().map_err(Error::Bus)? {
            match self.switch.state() {
                ButtonState::Pressed => {
                    self.pressed_at_ms = Some(now_ms);
                    self.long_press_sent = false;
                    return Ok(Some(EncoderEvent::ButtonPress));
                }
                ButtonState::Released => {
                    self.pressed_at_ms = None;
                    if !self.long_press_sent {
                        return Ok(Some(EncoderEvent::ButtonRelease));
                    }
                }
            }
        }

        if let Some(start) = self.pressed_at_ms {
            if !self.long_press_sent && now_ms.wrapping_sub(start) >= self.long_press_ms {
                self.long_press_sent = true;
                return Ok(Some(EncoderEvent::LongPress));
            }
        }

        Ok(None)
    }

    /// Whether the switch is held
    #[must_use]
    pub const fn is_pressed(&self) -> bool {
        self.switch.is_pressed()
    }

    /// Change the long-press threshold
    pub fn set_long_press_ms(&mut self, ms: u32) {
        self.long_press_ms = ms;
    }

    /// Change the acceleration curve
    pub fn set_acceleration(&mut self, threshold_ms: u32, multiplier: u32) {
        self.acceleration = AccelerationCurve::new(threshold_ms, multiplier);
    }
}

/// Value clamped to `[min, max]`, stepped by the encoder
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundedValue<T> {
    value: T,
    min: T,
    max: T,
}

impl<T: Copy + Ord> BoundedValue<T> {
    /// Create a bounded value; the start value is clamped
    #[must_use]
    pub fn new(value: T, min: T, max: T) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            value: value.clamp(min, max),
            min,
            max,
        }
    }

    /// Current value
    #[must_use]
    pub const fn get(&self) -> T {
        self.value
    }

    /// Set, clamped to the bounds
    pub fn set(&mut self, value: T) {
        self.value = value.clamp(self.min, self.max);
    }
}

impl BoundedValue<i32> {
    /// Apply a rotation event
    #[allow(clippy::cast_possible_wrap)]
    pub fn handle_rotation(&mut self, direction: Direction, steps: u32) {
        let steps = steps.min(i32::MAX as u32) as i32;
        match direction {
            Direction::Clockwise => self.set(self.value.saturating_add(steps)),
            Direction::CounterClockwise => self.set(self.value.saturating_sub(steps)),
        }
    }
}

impl BoundedValue<u32> {
    /// Apply a rotation event
    pub fn handle_rotation(&mut self, direction: Direction, steps: u32) {
        match direction {
            Direction::Clockwise => self.set(self.value.saturating_add(steps)),
            Direction::CounterClockwise => self.set(self.value.saturating_sub(steps)),
        }
    }
}
