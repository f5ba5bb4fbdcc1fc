//! CD4051 8:1 Analog Multiplexer
//!
//! Three select lines (A = LSB, B, C) route one of eight inputs to the
//! common pin. The inhibit pin is tied low on the board.

use embedded_hal::digital::OutputPin;

use crate::drivers::{Error, Result};
use crate::hal::gpio::SelectLines;

/// Number of multiplexer channels
pub const CHANNELS: u8 = 8;

/// CD4051 driver
pub struct Cd4051<P> {
    select: SelectLines<P, 3>,
}

impl<P: OutputPin> Cd4051<P> {
    /// Take the A, B and C select lines
    #[must_use]
    pub const fn new(a: P, b: P, c: P) -> Self {
        Self {
            select: SelectLines::new([a, b, c]),
        }
    }

    /// Drive all select lines low (channel 0)
    pub fn init(&mut self) -> Result<(), P::Error> {
        self.select.select(0).map_err(Error::Bus)
    }

    /// Route channel `0..=7` to the common pin
    pub fn set_channel(&mut self, channel: u8) -> Result<(), P::Error> {
        if channel >= CHANNELS {
            return Err(Error::InvalidChannel(channel));
        }
        self.select.select(channel).map_err(Error::Bus)?;
        trace!("cd4051: channel {=u8}", channel);
        Ok(())
    }

    /// Channel selected last
    #[must_use]
    pub const fn channel(&self) -> u8 {
        self.select.code()
    }

    /// Give the select lines back as `[A, B, C]`
    pub fn release(self) -> [P; 3] {
        self.select.release()
    }
}
