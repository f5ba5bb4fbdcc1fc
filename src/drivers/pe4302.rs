//! PE4302 Digital Step Attenuator
//!
//! 0 to 31.5 dB in 0.5 dB steps, programmed as a 6-bit word shifted in
//! MSB first while LE is low and latched by LE going high.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::bitbang::{BusConfig, SerialBus};
use crate::drivers::{Error, Result};
use crate::tuning::LinearScale;

/// Attenuation step
pub const STEP_DB: f32 = 0.5;

/// Largest attenuation code
pub const MAX_CODE: u32 = 63;

/// Attenuation word width
const WORD_BITS: u8 = 6;

/// Setup/hold time around every edge
const SETTLE_NS: u32 = 1_000;

/// PE4302 driver
pub struct Pe4302<P, D> {
    bus: SerialBus<P, D>,
    le: P,
    scale: LinearScale,
    attenuation_db: f32,
}

impl<P, D> Pe4302<P, D>
where
    P: OutputPin,
    D: DelayNs,
{
    /// Take LE, CLK and DATA
    pub fn new(le: P, clk: P, data: P, delay: D) -> Result<Self, P::Error> {
        let bus = SerialBus::new(clk, data, delay, BusConfig::rising_edge(SETTLE_NS)).map_err(Error::Bus)?;
        Ok(Self {
            bus,
            le,
            scale: LinearScale::new(0.0, STEP_DB, MAX_CODE),
            attenuation_db: 0.0,
        })
    }

    /// Park the lines: LE high, CLK low, DATA low
    pub fn init(&mut self) -> Result<(), P::Error> {
        self.le.set_high().map_err(Error::Bus)?;
        self.bus.idle_clock().map_err(Error::Bus)?;
        self.bus.idle_data_low().map_err(Error::Bus)?;
        self.attenuation_db = self.scale.min_value();
        Ok(())
    }

    /// Attenuation code for `db` (rounded to 0.5 dB and clamped)
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn code(&self, db: f32) -> u8 {
        self.scale.encode(db) as u8
    }

    /// Program the attenuation and return the value actually set
    pub fn set_attenuation(&mut self, db: f32) -> Result<f32, P::Error> {
        let code = self.scale.encode(db);

        self.le.set_low().map_err(Error::Bus)?;
        self.bus.delay().delay_ns(SETTLE_NS);
        self.bus.write_bits(u64::from(code), WORD_BITS).map_err(Error::Bus)?;
        self.bus.idle_data_low().map_err(Error::Bus)?;
        self.bus.delay().delay_ns(SETTLE_NS);
        self.le.set_high().map_err(Error::Bus)?;
        self.bus.delay().delay_ns(SETTLE_NS);

        self.attenuation_db = self.scale.decode(code);
        Ok(self.attenuation_db)
    }

    /// Attenuation set last
    #[must_use]
    pub const fn attenuation(&self) -> f32 {
        self.attenuation_db
    }

    /// Give the pins and delay back as `(le, clk, data, delay)`
    pub fn release(self) -> (P, P, P, D) {
        let (clk, data, delay) = self.bus.release();
        (self.le, clk, data, delay)
    }
}
