//! AD9854 Quadrature DDS Driver
//!
//! 48-bit DDS with I/Q outputs, used in serial mode. Every transfer is an
//! instruction byte carrying the register address followed by the
//! register's bytes, MSB first, clocked on the WR/SCLK pin. New register
//! contents take effect on an UDCLK pulse.
//!
//! The 30 MHz reference is multiplied by 9 in the on-chip PLL, giving a
//! 270 MHz system clock.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::bitbang::{drive, pulse, BusConfig, SerialBus};
use crate::config::{AD9854_PLL_MULTIPLIER, AD9854_REFCLK_HZ};
use crate::drivers::{Error, Result};
use crate::tuning::{FrequencyScale, PhaseScale};

/// Serial register addresses
pub mod reg {
    /// Phase adjust register #1
    pub const PHASE1: u8 = 0x00;
    /// Phase adjust register #2
    pub const PHASE2: u8 = 0x01;
    /// Frequency tuning word 1
    pub const FREQ1: u8 = 0x02;
    /// Frequency tuning word 2
    pub const FREQ2: u8 = 0x03;
    /// Delta frequency word
    pub const DELTA_FREQ: u8 = 0x04;
    /// Internal update clock
    pub const UPDATE_CLOCK: u8 = 0x05;
    /// Ramp rate clock
    pub const RAMP_RATE: u8 = 0x06;
    /// Control register
    pub const CONTROL: u8 = 0x07;
    /// I-path output shape key multiplier
    pub const SHAPE_I: u8 = 0x08;
    /// Q-path output shape key multiplier
    pub const SHAPE_Q: u8 = 0x09;
    /// Output shape key ramp rate
    pub const OSK_RAMP: u8 = 0x0A;
    /// Control DAC
    pub const QDAC: u8 = 0x0B;
}

/// Frequency tuning word width
pub const FREQ_BITS: u8 = 48;

/// Phase offset width
pub const PHASE_BITS: u8 = 14;

/// Largest I/Q multiplier code
pub const MAX_SHAPE: u16 = 0x0FFF;

/// Multiplier used by the keyed modes
pub const DEFAULT_SHAPE: u16 = 4000;

/// Multiplier used by ramped FSK
pub const RFSK_SHAPE: u16 = 3600;

/// Carrier loaded when entering AM mode
pub const DEFAULT_CARRIER_HZ: f64 = 60_000.0;

/// Largest ramp-rate clock divider (20 bits)
pub const MAX_RAMP_RATE: u32 = 0x000F_FFFF;

/// Control register byte 0: comparator power-down
const COMPARATOR_OFF: u8 = 0x10;

/// WR/SCLK settle time per edge
const SETTLE_NS: u32 = 50;

/// UDCLK / reset strobe width
const STROBE_NS: u32 = 100;

/// Operating mode selected by the control register
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Single tone from FREQ1
    SingleTone,
    /// FREQ1/FREQ2 keyed by the FDATA pin
    Fsk,
    /// PHASE1/PHASE2 keyed by the FDATA pin
    Bpsk,
    /// Output amplitude ramped by the OSK pin
    Osk,
    /// Amplitude set through the shape multipliers
    Am,
    /// FREQ1 to FREQ2 ramp on FDATA
    RampedFsk,
}

impl Mode {
    /// Control register bytes `[comparator, pll, mode, flags]`
    #[must_use]
    pub const fn control_bytes(self) -> [u8; 4] {
        let (comparator, mode, flags) = match self {
            Self::SingleTone => (0x00, 0x00, 0x60),
            Self::Fsk => (COMPARATOR_OFF, 0x02, 0x60),
            Self::Bpsk => (COMPARATOR_OFF, 0x08, 0x60),
            Self::Osk => (COMPARATOR_OFF, 0x00, 0x70),
            Self::Am => (COMPARATOR_OFF, 0x00, 0x60),
            Self::RampedFsk => (COMPARATOR_OFF, 0x24, 0x20),
        };
        [comparator, AD9854_PLL_MULTIPLIER, mode, flags]
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Mode {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::SingleTone => defmt::write!(f, "single-tone"),
            Self::Fsk => defmt::write!(f, "FSK"),
            Self::Bpsk => defmt::write!(f, "BPSK"),
            Self::Osk => defmt::write!(f, "OSK"),
            Self::Am => defmt::write!(f, "AM"),
            Self::RampedFsk => defmt::write!(f, "RFSK"),
        }
    }
}

/// Pins of an AD9854 wired for serial mode
pub struct Ad9854Pins<P> {
    /// SDIO (serial data in)
    pub sdio: P,
    /// WR, used as SCLK in serial mode
    pub sclk: P,
    /// I/O update clock
    pub udclk: P,
    /// Master reset
    pub reset: P,
    /// Serial/parallel select (low = serial)
    pub sp_select: P,
    /// Serial I/O reset
    pub io_reset: P,
    /// RD, unused in serial mode and held low
    pub rd: P,
    /// FSK/BPSK/HOLD data
    pub fdata: P,
    /// Output shape keying
    pub osk: P,
}

/// AD9854 driver
pub struct Ad9854<P, D> {
    bus: SerialBus<P, D>,
    udclk: P,
    reset: P,
    sp_select: P,
    io_reset: P,
    rd: P,
    fdata: P,
    osk: P,
    frequency: FrequencyScale,
    phase: PhaseScale,
    mode: Option<Mode>,
}

impl<P, D> Ad9854<P, D>
where
    P: OutputPin,
    D: DelayNs,
{
    /// Create a driver; the part stays untouched until [`Self::init`]
    pub fn new(pins: Ad9854Pins<P>, delay: D) -> Result<Self, P::Error> {
        let bus = SerialBus::new(pins.sclk, pins.sdio, delay, BusConfig::falling_edge(SETTLE_NS)).map_err(Error::Bus)?;
        let system_clock = AD9854_REFCLK_HZ * f64::from(AD9854_PLL_MULTIPLIER);
        Ok(Self {
            bus,
            udclk: pins.udclk,
            reset: pins.reset,
            sp_select: pins.sp_select,
            io_reset: pins.io_reset,
            rd: pins.rd,
            fdata: pins.fdata,
            osk: pins.osk,
            frequency: FrequencyScale::new(system_clock, FREQ_BITS),
            phase: PhaseScale::new(PHASE_BITS),
            mode: None,
        })
    }

    /// Reset the part and program the control register for `mode`
    pub fn init(&mut self, mode: Mode) -> Result<(), P::Error> {
        self.sp_select.set_low().map_err(Error::Bus)?;
        self.udclk.set_low().map_err(Error::Bus)?;
        if mode == Mode::RampedFsk {
            self.fdata.set_low().map_err(Error::Bus)?;
        }

        self.reset.set_high().map_err(Error::Bus)?;
        self.bus.delay().delay_ms(1);
        self.reset.set_low().map_err(Error::Bus)?;
        self.io_reset.set_low().map_err(Error::Bus)?;
        self.rd.set_low().map_err(Error::Bus)?;

        self.write_register(reg::CONTROL, &mode.control_bytes())?;
        if mode == Mode::Am {
            self.write_frequency(reg::FREQ1, DEFAULT_CARRIER_HZ)?;
        }
        self.update()?;

        self.mode = Some(mode);
        info!("ad9854: mode {}", mode);
        Ok(())
    }

    /// Mode programmed by the last [`Self::init`]
    #[must_use]
    pub const fn mode(&self) -> Option<Mode> {
        self.mode
    }

    /// 48-bit frequency word for `hz`
    #[must_use]
    pub fn frequency_word(&self, hz: f64) -> u64 {
        self.frequency.encode(hz).value()
    }

    /// Frequency step of one LSB
    #[must_use]
    pub fn resolution_hz(&self) -> f64 {
        self.frequency.resolution_hz()
    }

    /// Single tone at `hz` with I/Q amplitude `shape`
    pub fn set_sine(&mut self, hz: f64, shape: u16) -> Result<(), P::Error> {
        self.require(Mode::SingleTone)?;
        self.write_frequency(reg::FREQ1, hz)?;
        self.write_shape(shape)?;
        self.update()
    }

    /// FSK between `f1` (FDATA low) and `f2` (FDATA high)
    pub fn set_fsk(&mut self, f1: f64, f2: f64) -> Result<(), P::Error> {
        self.require(Mode::Fsk)?;
        self.write_frequency(reg::FREQ1, f1)?;
        self.write_frequency(reg::FREQ2, f2)?;
        self.write_shape(DEFAULT_SHAPE)?;
        self.update()
    }

    /// BPSK on `carrier_hz` between two phase offsets in degrees
    pub fn set_bpsk(&mut self, carrier_hz: f64, phase1: f64, phase2: f64) -> Result<(), P::Error> {
        self.require(Mode::Bpsk)?;
        let p1 = self.phase.encode(phase1).to_be_bytes::<2>();
        let p2 = self.phase.encode(phase2).to_be_bytes::<2>();
        self.write_register(reg::PHASE1, &p1)?;
        self.write_register(reg::PHASE2, &p2)?;
        self.write_frequency(reg::FREQ1, carrier_hz)?;
        self.write_shape(DEFAULT_SHAPE)?;
        self.update()
    }

    /// Shaped on/off keying of `carrier_hz` with the given ramp rate
    pub fn set_osk(&mut self, carrier_hz: f64, ramp_rate: u8) -> Result<(), P::Error> {
        self.require(Mode::Osk)?;
        self.write_frequency(reg::FREQ1, carrier_hz)?;
        self.write_shape(DEFAULT_SHAPE)?;
        self.write_register(reg::OSK_RAMP, &[ramp_rate])?;
        self.update()
    }

    /// New AM envelope value on the carrier loaded at init
    pub fn set_am(&mut self, shape: u16) -> Result<(), P::Error> {
        self.require(Mode::Am)?;
        self.write_shape(shape)?;
        self.update()
    }

    /// Ramped FSK from `low_hz` to `high_hz` in `step_hz` increments
    ///
    /// `ramp_rate` is the 20-bit ramp clock divider and is clamped.
    pub fn set_rfsk(&mut self, low_hz: f64, high_hz: f64, step_hz: f64, ramp_rate: u32) -> Result<(), P::Error> {
        self.require(Mode::RampedFsk)?;
        self.write_frequency(reg::FREQ1, low_hz)?;
        self.write_frequency(reg::FREQ2, high_hz)?;
        self.write_frequency(reg::DELTA_FREQ, step_hz)?;
        let [_, hi, mid, lo] = ramp_rate.min(MAX_RAMP_RATE).to_be_bytes();
        self.write_register(reg::RAMP_RATE, &[hi, mid, lo])?;
        self.write_shape(RFSK_SHAPE)?;
        self.update()
    }

    /// Drive the FSK/BPSK keying pin
    pub fn set_fsk_data(&mut self, high: bool) -> Result<(), P::Error> {
        drive(&mut self.fdata, high).map_err(Error::Bus)
    }

    /// Drive the OSK pin (ramps the output up when high)
    pub fn set_osk_keying(&mut self, on: bool) -> Result<(), P::Error> {
        drive(&mut self.osk, on).map_err(Error::Bus)
    }

    /// Pulse UDCLK to transfer the buffered registers
    pub fn update(&mut self) -> Result<(), P::Error> {
        pulse(&mut self.udclk, self.bus.delay(), true, STROBE_NS).map_err(Error::Bus)
    }

    /// Write an instruction byte followed by register data
    pub fn write_register(&mut self, address: u8, data: &[u8]) -> Result<(), P::Error> {
        self.bus.write_byte(address & 0x0F).map_err(Error::Bus)?;
        self.bus.write_bytes(data).map_err(Error::Bus)
    }

    fn write_frequency(&mut self, address: u8, hz: f64) -> Result<(), P::Error> {
        let word = self.frequency.encode(hz).to_be_bytes::<6>();
        self.write_register(address, &word)
    }

    fn write_shape(&mut self, shape: u16) -> Result<(), P::Error> {
        let bytes = shape.min(MAX_SHAPE).to_be_bytes();
        self.write_register(reg::SHAPE_I, &bytes)?;
        self.write_register(reg::SHAPE_Q, &bytes)
    }

    fn require(&self, mode: Mode) -> Result<(), P::Error> {
        if self.mode == Some(mode) {
            Ok(())
        } else {
            warn!("ad9854: operation needs mode {}", mode);
            Err(Error::ModeMismatch)
        }
    }
}
