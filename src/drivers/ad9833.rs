//! AD9833 Programmable Waveform Generator Driver
//!
//! Single-channel 28-bit DDS with sine, triangle and square outputs.
//! Configured through 16-bit words on a write-only three-wire link
//! (SCLK, SDATA, FSYNC). Data is latched on the falling SCLK edge, so
//! the clock idles high.
//!
//! The part has two frequency and two phase registers; the control word
//! selects which pair drives the output.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::bitbang::{BusConfig, SerialBus};
use crate::config::AD9833_MCLK_HZ;
use crate::drivers::{Error, Result};
use crate::tuning::{FrequencyScale, PhaseScale};

/// Control and register-select bits
mod ctrl {
    pub const B28: u16 = 1 << 13;
    pub const FSELECT: u16 = 1 << 11;
    pub const PSELECT: u16 = 1 << 10;
    pub const RESET: u16 = 1 << 8;
    pub const SLEEP1: u16 = 1 << 7;
    pub const SLEEP12: u16 = 1 << 6;
    pub const OPBITEN: u16 = 1 << 5;
    pub const DIV2: u16 = 1 << 3;
    pub const MODE: u16 = 1 << 1;

    pub const FREQ0: u16 = 0x4000;
    pub const FREQ1: u16 = 0x8000;
    pub const PHASE0: u16 = 0xC000;
    pub const PHASE1: u16 = 0xE000;

    /// 14 data bits per frequency half-word
    pub const FREQ_HALF_MASK: u32 = 0x3FFF;
}

/// Frequency accumulator width
pub const FREQ_BITS: u8 = 28;

/// Phase register width
pub const PHASE_BITS: u8 = 12;

/// Clock/data settle time per edge
const SETTLE_NS: u32 = 25;

/// Output waveform
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Waveform {
    /// Sinusoid
    #[default]
    Sine,
    /// Triangle
    Triangle,
    /// Square at the DDS frequency (MSB / 2)
    Square,
    /// Square at half the DDS frequency (MSB)
    HalfSquare,
}

impl Waveform {
    /// Control-word bits selecting this waveform
    #[must_use]
    pub const fn control_bits(self) -> u16 {
        match self {
            Self::Sine => 0,
            Self::Triangle => ctrl::MODE,
            Self::Square => ctrl::OPBITEN | ctrl::DIV2,
            Self::HalfSquare => ctrl::OPBITEN,
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Waveform {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Sine => defmt::write!(f, "SIN"),
            Self::Triangle => defmt::write!(f, "TRI"),
            Self::Square => defmt::write!(f, "SQR"),
            Self::HalfSquare => defmt::write!(f, "SQR/2"),
        }
    }
}

/// Frequency or phase register bank
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Bank {
    /// FREQ0 / PHASE0
    #[default]
    Zero,
    /// FREQ1 / PHASE1
    One,
}

/// Power-down options
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SleepMode {
    /// Everything running
    #[default]
    Awake,
    /// DAC powered down
    DacOff,
    /// Internal MCLK disabled
    ClockOff,
    /// DAC and clock both off
    Both,
}

impl SleepMode {
    const fn control_bits(self) -> u16 {
        match self {
            Self::Awake => 0,
            Self::DacOff => ctrl::SLEEP12,
            Self::ClockOff => ctrl::SLEEP1,
            Self::Both => ctrl::SLEEP1 | ctrl::SLEEP12,
        }
    }
}

/// AD9833 driver
pub struct Ad9833<P, D> {
    bus: SerialBus<P, D>,
    fsync: P,
    frequency: FrequencyScale,
    phase: PhaseScale,
    waveform: Waveform,
    freq_bank: Bank,
    phase_bank: Bank,
    sleep: SleepMode,
}

impl<P, D> Ad9833<P, D>
where
    P: OutputPin,
    D: DelayNs,
{
    /// Create a driver on a part clocked at the board's 25 MHz MCLK
    pub fn new(sclk: P, sdata: P, fsync: P, delay: D) -> Result<Self, P::Error> {
        Self::with_mclk(sclk, sdata, fsync, delay, AD9833_MCLK_HZ)
    }

    /// Create a driver for a custom master clock
    pub fn with_mclk(sclk: P, sdata: P, mut fsync: P, delay: D, mclk_hz: f64) -> Result<Self, P::Error> {
        fsync.set_high().map_err(Error::Bus)?;
        let bus = SerialBus::new(sclk, sdata, delay, BusConfig::falling_edge(SETTLE_NS)).map_err(Error::Bus)?;
        Ok(Self {
            bus,
            fsync,
            frequency: FrequencyScale::new(mclk_hz, FREQ_BITS),
            phase: PhaseScale::new(PHASE_BITS),
            waveform: Waveform::Sine,
            freq_bank: Bank::Zero,
            phase_bank: Bank::Zero,
            sleep: SleepMode::Awake,
        })
    }

    /// Select a waveform and load FREQ0/PHASE0
    pub fn init(&mut self, waveform: Waveform, hz: f64, degrees: f64) -> Result<(), P::Error> {
        self.set_waveform(waveform)?;
        self.set_output(hz, degrees)?;
        debug!("ad9833: init done");
        Ok(())
    }

    /// 28-bit frequency word for `hz`
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn frequency_word(&self, hz: f64) -> u32 {
        self.frequency.encode(hz).value() as u32
    }

    /// 12-bit phase word for `degrees` (wrapped into one turn)
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn phase_word(&self, degrees: f64) -> u16 {
        self.phase.encode(degrees).value() as u16
    }

    /// Output frequency actually produced for `hz`
    #[must_use]
    pub fn actual_frequency(&self, hz: f64) -> f64 {
        self.frequency.decode(self.frequency.encode(hz))
    }

    /// Current waveform
    #[must_use]
    pub const fn waveform(&self) -> Waveform {
        self.waveform
    }

    /// Change the waveform, keeping frequency and phase
    pub fn set_waveform(&mut self, waveform: Waveform) -> Result<(), P::Error> {
        self.waveform = waveform;
        let word = self.control_word();
        self.write_frame(&[word])
    }

    /// Load FREQ0 and PHASE0 under reset, then release
    pub fn set_output(&mut self, hz: f64, degrees: f64) -> Result<(), P::Error> {
        let (lsw, msw) = self.frequency_halves(hz, Bank::Zero);
        let phase = ctrl::PHASE0 | self.phase_word(degrees);

        self.write_frame(&[ctrl::B28 | ctrl::RESET, lsw, msw, phase, ctrl::B28])?;
        self.freq_bank = Bank::Zero;
        self.phase_bank = Bank::Zero;
        let word = self.control_word();
        self.write_frame(&[word])
    }

    /// Load one frequency register without touching the output selection
    pub fn set_frequency_register(&mut self, bank: Bank, hz: f64) -> Result<(), P::Error> {
        let (lsw, msw) = self.frequency_halves(hz, bank);
        let word = self.control_word();
        self.write_frame(&[word, lsw, msw])
    }

    /// Load one phase register
    pub fn set_phase_register(&mut self, bank: Bank, degrees: f64) -> Result<(), P::Error> {
        let select = match bank {
            Bank::Zero => ctrl::PHASE0,
            Bank::One => ctrl::PHASE1,
        };
        let word = select | self.phase_word(degrees);
        self.write_frame(&[word])
    }

    /// Route a frequency and a phase register to the output
    pub fn select(&mut self, freq_bank: Bank, phase_bank: Bank) -> Result<(), P::Error> {
        self.freq_bank = freq_bank;
        self.phase_bank = phase_bank;
        let word = self.control_word();
        self.write_frame(&[word])
    }

    /// Power down parts of the chip
    pub fn sleep(&mut self, mode: SleepMode) -> Result<(), P::Error> {
        self.sleep = mode;
        let word = self.control_word();
        self.write_frame(&[word])
    }

    /// Pulse the internal reset (phase accumulators to zero)
    pub fn reset(&mut self) -> Result<(), P::Error> {
        let word = self.control_word();
        self.write_frame(&[word | ctrl::RESET, word])
    }

    /// Give the pins and delay back
    pub fn release(self) -> (P, P, P, D) {
        let (sclk, sdata, delay) = self.bus.release();
        (sclk, sdata, self.fsync, delay)
    }

    fn control_word(&self) -> u16 {
        let mut word = ctrl::B28 | self.waveform.control_bits() | self.sleep.control_bits();
        if self.freq_bank == Bank::One {
            word |= ctrl::FSELECT;
        }
        if self.phase_bank == Bank::One {
            word |= ctrl::PSELECT;
        }
        word
    }

    /// Split a frequency word into the LSB and MSB writes for `bank`
    #[allow(clippy::cast_possible_truncation)]
    fn frequency_halves(&self, hz: f64, bank: Bank) -> (u16, u16) {
        let select = match bank {
            Bank::Zero => ctrl::FREQ0,
            Bank::One => ctrl::FREQ1,
        };
        let word = self.frequency_word(hz);
        let lsw = (word & ctrl::FREQ_HALF_MASK) as u16;
        let msw = ((word >> 14) & ctrl::FREQ_HALF_MASK) as u16;
        (select | lsw, select | msw)
    }

    fn write_frame(&mut self, words: &[u16]) -> Result<(), P::Error> {
        self.fsync.set_low().map_err(Error::Bus)?;
        for &word in words {
            self.bus.write_word16(word).map_err(Error::Bus)?;
            self.bus.idle_data_low().map_err(Error::Bus)?;
        }
        self.fsync.set_high().map_err(Error::Bus)
    }
}
