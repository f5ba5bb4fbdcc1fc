//! ADF4351 Wideband PLL Synthesizer Driver
//!
//! 35 MHz to 4.4 GHz fractional-N synthesizer. Six 32-bit registers are
//! shifted in MSB first (CLK idles low, data sampled on the rising edge)
//! and latched by a rising LE edge. The register address sits in the low
//! three bits of every word.
//!
//! Two ways to tune:
//! - [`Adf4351::init`] replays the board's fixed start-up sequence with an
//!   integer N value (R = 125, divided feedback)
//! - [`Adf4351::set_frequency`] runs [`plan`] and writes all six registers

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::bitbang::{BusConfig, SerialBus};
use crate::config::{ADF4351_REFIN_HZ, ADF4351_R_COUNTER};
use crate::drivers::{Error, Result};

/// Lowest output frequency
pub const MIN_OUTPUT_HZ: u64 = 35_000_000;

/// Highest output frequency
pub const MAX_OUTPUT_HZ: u64 = 4_400_000_000;

/// VCO range
pub const VCO_MIN_HZ: u64 = 2_200_000_000;

/// VCO range
pub const VCO_MAX_HZ: u64 = 4_400_000_000;

/// Above this VCO frequency the 8/9 prescaler is required
const PRESCALER_89_ABOVE_HZ: u64 = 3_600_000_000;

/// Band-select clock must stay at or below this
const BAND_SELECT_MAX_HZ: u64 = 125_000;

/// Fixed start-up words, R5 down to R1
mod startup {
    pub const R5: u32 = 0x0058_0005;
    pub const R4: u32 = 0x0060_A43C;
    pub const R3: u32 = 0x0060_04B3;
    pub const R2: u32 = 0x0D00_3FC2;
    pub const R1: u32 = 0x0800_8011;
}

/// Register bits used by the planner
mod bits {
    /// R1: 8/9 prescaler
    pub const PRESCALER_89: u32 = 1 << 27;
    /// R1: phase word 1 (recommended)
    pub const PHASE_ONE: u32 = 1 << 15;
    /// R2: MUXOUT digital lock detect, charge pump 5 mA, double buffer
    pub const R2_BASE: u32 = 0x1800_3E42;
    /// R2: lock detect function for integer-N
    pub const LDF_INT_N: u32 = 1 << 8;
    /// R4: fundamental feedback
    pub const FEEDBACK_FUNDAMENTAL: u32 = 1 << 23;
    /// R4: mute till lock, RF out enabled at +5 dBm
    pub const R4_OUTPUT: u32 = 0x0000_043C;
}

/// Pin settle time per edge
const SETTLE_NS: u32 = 50;

/// Chip-enable power-up time
const ENABLE_DELAY_US: u32 = 5;

/// Reference path and modulus for [`plan`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PllConfig {
    /// Reference input frequency
    pub reference_hz: u64,
    /// Reference divider R (1..=1023)
    pub r_counter: u16,
    /// Fractional modulus MOD (2..=4095)
    pub modulus: u16,
}

impl PllConfig {
    /// Phase detector frequency
    #[must_use]
    pub const fn pfd_hz(&self) -> u64 {
        self.reference_hz / self.r_counter as u64
    }
}

impl Default for PllConfig {
    /// 25 MHz reference, R = 1, MOD = 4000 (6.25 kHz steps)
    fn default() -> Self {
        Self {
            reference_hz: ADF4351_REFIN_HZ,
            r_counter: 1,
            modulus: 4000,
        }
    }
}

/// Divider settings for one output frequency
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Plan {
    /// Integer part of N
    pub int: u16,
    /// Fractional part of N, over `modulus`
    pub frac: u16,
    /// Fractional modulus
    pub modulus: u16,
    /// Reference divider
    pub r_counter: u16,
    /// RF output divider select (divide by `1 << rf_divider`)
    pub rf_divider: u8,
    /// 8/9 prescaler selected
    pub prescaler_89: bool,
    /// Band-select clock divider
    pub band_select: u8,
    /// Phase detector frequency
    pub pfd_hz: u64,
}

impl Plan {
    /// VCO frequency
    #[must_use]
    pub const fn vco_hz(&self) -> u64 {
        self.pfd_hz * self.int as u64 + self.pfd_hz * self.frac as u64 / self.modulus as u64
    }

    /// Output frequency after the RF divider
    #[must_use]
    pub const fn output_hz(&self) -> u64 {
        self.vco_hz() >> self.rf_divider
    }

    /// Register words, R0 first
    #[must_use]
    pub fn registers(&self) -> [u32; 6] {
        let r0 = (u32::from(self.int) << 15) | (u32::from(self.frac & 0x0FFF) << 3);

        let mut r1 = bits::PHASE_ONE | (u32::from(self.modulus & 0x0FFF) << 3) | 1;
        if self.prescaler_89 {
            r1 |= bits::PRESCALER_89;
        }

        let mut r2 = bits::R2_BASE | (u32::from(self.r_counter & 0x03FF) << 14);
        if self.frac == 0 {
            r2 |= bits::LDF_INT_N;
        }

        let r4 = bits::FEEDBACK_FUNDAMENTAL
            | (u32::from(self.rf_divider & 0x07) << 20)
            | (u32::from(self.band_select) << 12)
            | bits::R4_OUTPUT;

        [r0, r1, r2, startup::R3, r4, startup::R5]
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Plan {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "INT={} FRAC={}/{} R={} div=/{}",
            self.int,
            self.frac,
            self.modulus,
            self.r_counter,
            1u8 << self.rf_divider
        );
    }
}

/// Work out dividers for `target_hz`
///
/// Picks the smallest RF divider that puts the VCO in 2.2 to 4.4 GHz,
/// then splits N into INT + FRAC/MOD with FRAC rounded to nearest.
/// Returns `None` when the target or the resulting INT is out of range.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn plan(config: &PllConfig, target_hz: u64) -> Option<Plan> {
    if !(MIN_OUTPUT_HZ..=MAX_OUTPUT_HZ).contains(&target_hz) {
        return None;
    }
    if config.r_counter == 0 || config.modulus < 2 {
        return None;
    }
    let pfd_hz = config.pfd_hz();
    if pfd_hz == 0 {
        return None;
    }

    let rf_divider = (0u8..=6).find(|&d| (target_hz << d) >= VCO_MIN_HZ)?;
    let vco_hz = target_hz << rf_divider;
    if vco_hz > VCO_MAX_HZ {
        return None;
    }

    let modulus = u64::from(config.modulus);
    let mut int = vco_hz / pfd_hz;
    let remainder = vco_hz - int * pfd_hz;
    let mut frac = (remainder * modulus + pfd_hz / 2) / pfd_hz;
    if frac >= modulus {
        int += 1;
        frac = 0;
    }

    let prescaler_89 = vco_hz > PRESCALER_89_ABOVE_HZ;
    let min_int = if prescaler_89 { 75 } else { 23 };
    if int < min_int || int > u64::from(u16::MAX) {
        return None;
    }

    let band_select = pfd_hz.div_ceil(BAND_SELECT_MAX_HZ).clamp(1, 255) as u8;

    Some(Plan {
        int: int as u16,
        frac: frac as u16,
        modulus: config.modulus,
        r_counter: config.r_counter,
        rf_divider,
        prescaler_89,
        band_select,
        pfd_hz,
    })
}

/// ADF4351 driver
pub struct Adf4351<P, D> {
    bus: SerialBus<P, D>,
    le: P,
    ce: P,
    config: PllConfig,
    plan: Option<Plan>,
}

impl<P, D> Adf4351<P, D>
where
    P: OutputPin,
    D: DelayNs,
{
    /// Create a driver with the default 25 MHz reference plan
    pub fn new(clk: P, data: P, le: P, ce: P, delay: D) -> Result<Self, P::Error> {
        Self::with_config(clk, data, le, ce, delay, PllConfig::default())
    }

    /// Create a driver with a custom reference path
    pub fn with_config(clk: P, data: P, mut le: P, ce: P, delay: D, config: PllConfig) -> Result<Self, P::Error> {
        le.set_high().map_err(Error::Bus)?;
        let bus = SerialBus::new(clk, data, delay, BusConfig::rising_edge(SETTLE_NS)).map_err(Error::Bus)?;
        Ok(Self {
            bus,
            le,
            ce,
            config,
            plan: None,
        })
    }

    /// Power the chip up: CE high, then wait for the bias to settle
    pub fn enable(&mut self) -> Result<(), P::Error> {
        self.ce.set_high().map_err(Error::Bus)?;
        self.bus.delay().delay_us(ENABLE_DELAY_US);
        Ok(())
    }

    /// Power the chip down
    pub fn disable(&mut self) -> Result<(), P::Error> {
        self.ce.set_low().map_err(Error::Bus)
    }

    /// Fixed start-up sequence with integer N = `int_value`
    pub fn init(&mut self, int_value: u32) -> Result<(), P::Error> {
        self.enable()?;
        self.bus.idle_clock().map_err(Error::Bus)?;
        self.le.set_high().map_err(Error::Bus)?;
        self.bus.idle_data_low().map_err(Error::Bus)?;

        self.write_register(startup::R5)?;
        self.write_register(startup::R4)?;
        self.write_register(startup::R3)?;
        self.write_register(startup::R2 | (u32::from(ADF4351_R_COUNTER) << 14))?;
        self.write_register(startup::R1)?;
        self.write_register(int_value << 15)?;
        self.plan = None;
        debug!("adf4351: init INT={=u32}", int_value);
        Ok(())
    }

    /// Plan and program `hz`, returning the frequency actually produced
    pub fn set_frequency(&mut self, hz: u64) -> Result<u64, P::Error> {
        let Some(plan) = plan(&self.config, hz) else {
            warn!("adf4351: {=u64} Hz out of range", hz);
            return Err(Error::OutOfRange);
        };

        let words = plan.registers();
        for &word in words.iter().rev() {
            self.write_register(word)?;
        }
        self.plan = Some(plan);
        Ok(plan.output_hz())
    }

    /// Plan written by the last [`Self::set_frequency`]
    #[must_use]
    pub const fn plan(&self) -> Option<Plan> {
        self.plan
    }

    /// Reference path used for planning
    #[must_use]
    pub const fn config(&self) -> PllConfig {
        self.config
    }

    /// Shift one 32-bit word in and latch it
    pub fn write_register(&mut self, word: u32) -> Result<(), P::Error> {
        self.bus.idle_clock().map_err(Error::Bus)?;
        self.le.set_low().map_err(Error::Bus)?;
        self.bus.write_word32(word).map_err(Error::Bus)?;
        self.le.set_high().map_err(Error::Bus)
    }

    /// Give the pins and delay back
    pub fn release(self) -> (P, P, P, P, D) {
        let (clk, data, delay) = self.bus.release();
        (clk, data, self.le, self.ce, delay)
    }
}
