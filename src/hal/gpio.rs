//! GPIO Abstractions
//!
//! Type-safe GPIO pin wrappers for the instrument front panel and the
//! switch/mux select lines. Generic over embedded-hal pins so the same
//! logic runs against embassy `Output`/`Input` and host fakes.

use embedded_hal::digital::{InputPin, OutputPin};

use crate::bitbang::drive;

/// Status LED state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LedState {
    /// LED is off
    #[default]
    Off,
    /// LED is on
    On,
}

impl LedState {
    /// Toggle the LED state
    #[must_use]
    pub const fn toggle(self) -> Self {
        match self {
            Self::Off => Self::On,
            Self::On => Self::Off,
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for LedState {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Off => defmt::write!(f, "OFF"),
            Self::On => defmt::write!(f, "ON"),
        }
    }
}

/// Status LED driver
pub struct StatusLed<P> {
    pin: P,
    state: LedState,
}

impl<P: OutputPin> StatusLed<P> {
    /// Create a new status LED (initially off)
    pub fn new(mut pin: P) -> Result<Self, P::Error> {
        pin.set_low()?;
        Ok(Self {
            pin,
            state: LedState::Off,
        })
    }

    /// Turn LED on
    pub fn on(&mut self) -> Result<(), P::Error> {
        self.pin.set_high()?;
        self.state = LedState::On;
        Ok(())
    }

    /// Turn LED off
    pub fn off(&mut self) -> Result<(), P::Error> {
        self.pin.set_low()?;
        self.state = LedState::Off;
        Ok(())
    }

    /// Toggle LED state
    pub fn toggle(&mut self) -> Result<(), P::Error> {
        match self.state {
            LedState::Off => self.on(),
            LedState::On => self.off(),
        }
    }

    /// Get current state
    #[must_use]
    pub const fn state(&self) -> LedState {
        self.state
    }
}

/// Binary-coded select lines
///
/// Drives `N` GPIOs with the bits of a code, line 0 carrying the LSB.
/// Analog multiplexers and RF switches are addressed this way.
pub struct SelectLines<P, const N: usize> {
    lines: [P; N],
    code: u8,
}

impl<P: OutputPin, const N: usize> SelectLines<P, N> {
    /// Number of distinct codes the lines can express
    pub const CODES: usize = 1 << N;

    /// Take ownership of the lines without touching them
    #[must_use]
    pub const fn new(lines: [P; N]) -> Self {
        Self { lines, code: 0 }
    }

    /// Drive the lines to `code`
    ///
    /// Bits above `N` are ignored.
    pub fn select(&mut self, code: u8) -> Result<(), P::Error> {
        for (bit, line) in self.lines.iter_mut().enumerate() {
            drive(line, code & (1 << bit) != 0)?;
        }
        self.code = code & Self::mask();
        Ok(())
    }

    /// Last code written
    #[must_use]
    pub const fn code(&self) -> u8 {
        self.code
    }

    /// Give the pins back
    pub fn release(self) -> [P; N] {
        self.lines
    }

    #[allow(clippy::cast_possible_truncation)]
    const fn mask() -> u8 {
        ((1u16 << N) - 1) as u8
    }
}

/// Button state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonState {
    /// Button is released
    Released,
    /// Button is pressed
    Pressed,
}

#[cfg(feature = "embedded")]
impl defmt::Format for ButtonState {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Released => defmt::write!(f, "Released"),
            Self::Pressed => defmt::write!(f, "Pressed"),
        }
    }
}

/// Active-low push button with debouncing
pub struct DebouncedButton<P> {
    pin: P,
    state: ButtonState,
    last_raw: bool,
    debounce_count: u8,
}

impl<P: InputPin> DebouncedButton<P> {
    /// Required consecutive reads for debounce
    const DEBOUNCE_THRESHOLD: u8 = 3;

    /// Create button (active low with pull-up)
    #[must_use]
    pub fn new(pin: P) -> Self {
        Self {
            pin,
            state: ButtonState::Released,
            last_raw: false,
            debounce_count: 0,
        }
    }

    /// Update button state (call periodically)
    /// Returns true if state changed
    pub fn update(&mut self) -> Result<bool, P::Error> {
        let current = self.pin.is_low()?;

        if current == self.last_raw {
            if self.debounce_count < Self::DEBOUNCE_THRESHOLD {
                self.debounce_count += 1;
            }
        } else {
            self.debounce_count = 0;
            self.last_raw = current;
        }

        if self.debounce_count >= Self::DEBOUNCE_THRESHOLD {
            let new_state = if current {
                ButtonState::Pressed
            } else {
                ButtonState::Released
            };

            if new_state != self.state {
                self.state = new_state;
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Get current state
    #[must_use]
    pub const fn state(&self) -> ButtonState {
        self.state
    }

    /// Check if pressed
    #[must_use]
    pub const fn is_pressed(&self) -> bool {
        matches!(self.state, ButtonState::Pressed)
    }
}
