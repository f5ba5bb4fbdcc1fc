//! Bit-Banged Serial Bus
//!
//! Most of the synthesizers and the step attenuator on the board take
//! their configuration over a write-only synchronous link: a data line
//! that must be stable before a clock edge, with a chip-select or latch
//! line around the whole frame. None of them sits on a hardware SPI
//! peripheral, so the bits are clocked out on plain GPIO.
//!
//! [`SerialBus`] owns the clock and data pins. Framing (FSYNC, LE, CS,
//! IO_UPDATE) differs per device and stays with the driver, which uses
//! [`pulse`] for strobes.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

/// Order in which the bits of a word leave the bus
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BitOrder {
    /// Most significant bit first
    #[default]
    MsbFirst,
    /// Least significant bit first
    LsbFirst,
}

/// Level the clock line rests at between bits
///
/// Each bit is clocked by driving the line to the opposite level and back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ClockIdle {
    /// Clock rests low, bits are strobed by a high pulse
    #[default]
    Low,
    /// Clock rests high, bits are strobed by a low pulse
    High,
}

impl ClockIdle {
    /// Whether the idle level is high
    #[must_use]
    pub const fn is_high(self) -> bool {
        matches!(self, Self::High)
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for ClockIdle {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Low => defmt::write!(f, "idle-low"),
            Self::High => defmt::write!(f, "idle-high"),
        }
    }
}

/// Timing and framing of a bit-banged link
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BusConfig {
    /// Bit order on the wire
    pub order: BitOrder,
    /// Clock idle level
    pub idle: ClockIdle,
    /// Settle time around every edge in nanoseconds
    pub settle_ns: u32,
}

impl BusConfig {
    /// MSB-first, clock idles low, data latched on the rising edge
    #[must_use]
    pub const fn rising_edge(settle_ns: u32) -> Self {
        Self {
            order: BitOrder::MsbFirst,
            idle: ClockIdle::Low,
            settle_ns,
        }
    }

    /// MSB-first, clock idles high, data latched on the falling edge
    #[must_use]
    pub const fn falling_edge(settle_ns: u32) -> Self {
        Self {
            order: BitOrder::MsbFirst,
            idle: ClockIdle::High,
            settle_ns,
        }
    }

    /// Same timing with a different bit order
    #[must_use]
    pub const fn with_order(self, order: BitOrder) -> Self {
        Self { order, ..self }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self::rising_edge(0)
    }
}

/// Clock + data pair driven by software
pub struct SerialBus<P, D> {
    clock: P,
    data: P,
    delay: D,
    config: BusConfig,
}

impl<P, D> SerialBus<P, D>
where
    P: OutputPin,
    D: DelayNs,
{
    /// Largest word accepted by [`Self::write_bits`]
    pub const MAX_WIDTH: u8 = 64;

    /// Take ownership of the pins and park the lines (clock idle, data low)
    pub fn new(clock: P, data: P, delay: D, config: BusConfig) -> Result<Self, P::Error> {
        let mut bus = Self {
            clock,
            data,
            delay,
            config,
        };
        bus.idle_clock()?;
        bus.data.set_low()?;
        Ok(bus)
    }

    /// Bus configuration
    #[must_use]
    pub const fn config(&self) -> BusConfig {
        self.config
    }

    /// Clock out the low `width` bits of `word`
    ///
    /// Widths above 64 are clamped.
    pub fn write_bits(&mut self, word: u64, width: u8) -> Result<(), P::Error> {
        let width = width.min(Self::MAX_WIDTH);
        for i in 0..width {
            let shift = match self.config.order {
                BitOrder::MsbFirst => width - 1 - i,
                BitOrder::LsbFirst => i,
            };
            self.write_bit((word >> shift) & 1 != 0)?;
        }
        Ok(())
    }

    /// Clock out one byte
    pub fn write_byte(&mut self, byte: u8) -> Result<(), P::Error> {
        self.write_bits(u64::from(byte), 8)
    }

    /// Clock out a byte sequence, each byte in the configured order
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), P::Error> {
        for &byte in bytes {
            self.write_byte(byte)?;
        }
        Ok(())
    }

    /// Clock out a 16-bit word
    pub fn write_word16(&mut self, word: u16) -> Result<(), P::Error> {
        self.write_bits(u64::from(word), 16)
    }

    /// Clock out a 32-bit word
    pub fn write_word32(&mut self, word: u32) -> Result<(), P::Error> {
        self.write_bits(u64::from(word), 32)
    }

    /// Park the data line low
    pub fn idle_data_low(&mut self) -> Result<(), P::Error> {
        self.data.set_low()
    }

    /// Return the clock line to its idle level
    pub fn idle_clock(&mut self) -> Result<(), P::Error> {
        drive(&mut self.clock, self.config.idle.is_high())
    }

    /// Delay provider shared with the owning driver
    pub fn delay(&mut self) -> &mut D {
        &mut self.delay
    }

    /// Give the pins and delay back
    pub fn release(self) -> (P, P, D) {
        (self.clock, self.data, self.delay)
    }

    fn write_bit(&mut self, bit: bool) -> Result<(), P::Error> {
        let idle_high = self.config.idle.is_high();
        let settle = self.config.settle_ns;

        drive(&mut self.data, bit)?;
        self.settle(settle);
        drive(&mut self.clock, !idle_high)?;
        self.settle(settle);
        drive(&mut self.clock, idle_high)?;
        self.settle(settle);
        Ok(())
    }

    fn settle(&mut self, ns: u32) {
        if ns > 0 {
            self.delay.delay_ns(ns);
        }
    }
}

/// Drive a pin to a level
pub fn drive<P: OutputPin>(pin: &mut P, high: bool) -> Result<(), P::Error> {
    if high {
        pin.set_high()
    } else {
        pin.set_low()
    }
}

/// Strobe a pin to its active level for `hold_ns`, then back
pub fn pulse<P, D>(pin: &mut P, delay: &mut D, active_high: bool, hold_ns: u32) -> Result<(), P::Error>
where
    P: OutputPin,
    D: DelayNs,
{
    drive(pin, active_high)?;
    delay.delay_ns(hold_ns);
    drive(pin, !active_high)
}
