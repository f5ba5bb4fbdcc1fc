//! HMC241 SP4T RF Switch
//!
//! Two control lines pick one of four RF ports:
//!
//! | Port | A | B |
//! |------|---|---|
//! | RF1  | L | L |
//! | RF2  | H | L |
//! | RF3  | L | H |
//! | RF4  | H | H |

use embedded_hal::digital::OutputPin;

use crate::drivers::{Error, Result};
use crate::hal::gpio::SelectLines;

/// RF port of the switch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RfPort {
    /// RF1 (A low, B low)
    #[default]
    Rf1,
    /// RF2 (A high, B low)
    Rf2,
    /// RF3 (A low, B high)
    Rf3,
    /// RF4 (A high, B high)
    Rf4,
}

impl RfPort {
    /// Port for a 1-based channel number as printed on the part
    #[must_use]
    pub const fn from_channel(channel: u8) -> Option<Self> {
        match channel {
            1 => Some(Self::Rf1),
            2 => Some(Self::Rf2),
            3 => Some(Self::Rf3),
            4 => Some(Self::Rf4),
            _ => None,
        }
    }

    /// 1-based channel number
    #[must_use]
    pub const fn channel(self) -> u8 {
        self.code() + 1
    }

    /// Select-line code, bit 0 = A, bit 1 = B
    const fn code(self) -> u8 {
        match self {
            Self::Rf1 => 0b00,
            Self::Rf2 => 0b01,
            Self::Rf3 => 0b10,
            Self::Rf4 => 0b11,
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for RfPort {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "RF{=u8}", self.channel());
    }
}

/// HMC241 driver
pub struct Hmc241<P> {
    select: SelectLines<P, 2>,
    port: RfPort,
}

impl<P: OutputPin> Hmc241<P> {
    /// Take the A and B control lines
    #[must_use]
    pub const fn new(a: P, b: P) -> Self {
        Self {
            select: SelectLines::new([a, b]),
            port: RfPort::Rf1,
        }
    }

    /// Both lines low (RF1)
    pub fn init(&mut self) -> Result<(), P::Error> {
        self.set_port(RfPort::Rf1)
    }

    /// Switch to `port`
    pub fn set_port(&mut self, port: RfPort) -> Result<(), P::Error> {
        self.select.select(port.code()).map_err(Error::Bus)?;
        self.port = port;
        Ok(())
    }

    /// Switch to a 1-based channel (1..=4)
    pub fn set_channel(&mut self, channel: u8) -> Result<(), P::Error> {
        let port = RfPort::from_channel(channel).ok_or(Error::InvalidChannel(channel))?;
        self.set_port(port)
    }

    /// Port selected last
    #[must_use]
    pub const fn port(&self) -> RfPort {
        self.port
    }

    /// 1-based channel selected last
    #[must_use]
    pub const fn channel(&self) -> u8 {
        self.port.channel()
    }

    /// Give the control lines back as `[A, B]`
    pub fn release(self) -> [P; 2] {
        self.select.release()
    }
}
