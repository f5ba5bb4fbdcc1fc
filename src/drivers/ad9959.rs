//! AD9959 Four-Channel DDS Driver
//!
//! 500 MHz system clock (25 MHz reference x 20), 32-bit frequency,
//! 14-bit phase and 10-bit amplitude per channel. Registers are written
//! MSB first on SDIO0 with SCLK idling low; CS frames each register
//! write and IO_UPDATE transfers the buffered values to the core.
//!
//! Channel registers (CFR, CFTW0, CPOW0, ACR, sweep and profile words)
//! apply to every channel enabled in CSR, so select the channels first.
//!
//! Modulation uses profiles: profile 0 lives in CFTW0/CPOW0/ACR, profiles
//! 1..15 in the channel words CW1..CW15 with the value MSB-aligned. The
//! P0..P3 pins pick the active profile.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::bitbang::{drive, pulse, BusConfig, SerialBus};
use crate::config::AD9959_SYSCLK_HZ;
use crate::drivers::{Error, Result};
use crate::hal::gpio::SelectLines;
use crate::tuning::{FrequencyScale, PhaseScale, TuningWord};

/// Register addresses
pub mod reg {
    /// Channel select register
    pub const CSR: u8 = 0x00;
    /// Function register 1 (PLL, modulation levels, profile pins)
    pub const FR1: u8 = 0x01;
    /// Function register 2
    pub const FR2: u8 = 0x02;
    /// Channel function register
    pub const CFR: u8 = 0x03;
    /// Channel frequency tuning word 0
    pub const CFTW0: u8 = 0x04;
    /// Channel phase offset word 0
    pub const CPOW0: u8 = 0x05;
    /// Amplitude control register
    pub const ACR: u8 = 0x06;
    /// Linear sweep ramp rate
    pub const LSRR: u8 = 0x07;
    /// Rising delta word
    pub const RDW: u8 = 0x08;
    /// Falling delta word
    pub const FDW: u8 = 0x09;
    /// Channel word 1; CW2..CW15 follow at consecutive addresses
    pub const CW1: u8 = 0x0A;
}

/// Frequency tuning word width
pub const FREQ_BITS: u8 = 32;

/// Phase offset width
pub const PHASE_BITS: u8 = 14;

/// Amplitude scale width
pub const AMPLITUDE_BITS: u8 = 10;

/// Largest amplitude scale factor
pub const MAX_AMPLITUDE: u16 = 1023;

/// FR1 byte 0: VCO gain high, PLL divider 20
const FR1_PLL: u8 = 0xD0;

/// ACR amplitude multiplier enable
const ACR_MULTIPLIER_ENABLE: u16 = 1 << 12;

/// CFR bytes for single-tone output
const CFR_SINGLE_TONE: [u8; 3] = [0x00, 0x23, 0x35];

/// CFR byte 1 with linear sweep enabled
const CFR_SWEEP: u8 = 0x43;

/// CFR byte 2 with linear sweep enabled
const CFR_SWEEP_FLAGS: u8 = 0x20;

/// SCLK settle time per edge
const SETTLE_NS: u32 = 20;

/// IO_UPDATE pulse width
const STROBE_NS: u32 = 100;

/// Set of output channels
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelMask(u8);

impl ChannelMask {
    /// Channel 0
    pub const CH0: Self = Self(0x1);
    /// Channel 1
    pub const CH1: Self = Self(0x2);
    /// Channel 2
    pub const CH2: Self = Self(0x4);
    /// Channel 3
    pub const CH3: Self = Self(0x8);
    /// All four channels
    pub const ALL: Self = Self(0xF);

    /// Mask for a channel number; `None` above 3
    #[must_use]
    pub const fn channel(n: u8) -> Option<Self> {
        if n < 4 {
            Some(Self(1 << n))
        } else {
            None
        }
    }

    /// Raw 4-bit mask
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// CSR value enabling these channels
    #[must_use]
    pub const fn csr(self) -> u8 {
        self.0 << 4
    }
}

impl core::ops::BitOr for ChannelMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for ChannelMask {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "CH{=u8:04b}", self.0);
    }
}

/// Parameter being modulated or swept
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModulationKind {
    /// Frequency (values in Hz)
    Frequency,
    /// Phase (values in degrees)
    Phase,
    /// Amplitude (values in scale counts, 0..=1023)
    Amplitude,
}

impl ModulationKind {
    /// CFR byte 0 modulation select bits
    const fn cfr_select(self) -> u8 {
        match self {
            Self::Frequency => 0x80,
            Self::Phase => 0xC0,
            Self::Amplitude => 0x40,
        }
    }

    /// CFR bytes for profile modulation
    const fn modulation_cfr(self) -> [u8; 3] {
        match self {
            Self::Frequency => [0x80, 0x23, 0x30],
            Self::Phase => [0xC0, 0x03, 0x30],
            Self::Amplitude => [0x40, 0x03, 0x30],
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for ModulationKind {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Frequency => defmt::write!(f, "FM"),
            Self::Phase => defmt::write!(f, "PM"),
            Self::Amplitude => defmt::write!(f, "AM"),
        }
    }
}

/// Number of modulation levels
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Levels {
    /// 2-level (one profile pin)
    Two,
    /// 4-level (two profile pins)
    Four,
    /// 8-level (three profile pins)
    Eight,
    /// 16-level (four profile pins)
    Sixteen,
}

impl Levels {
    /// Number of profiles
    #[must_use]
    pub const fn count(self) -> usize {
        match self {
            Self::Two => 2,
            Self::Four => 4,
            Self::Eight => 8,
            Self::Sixteen => 16,
        }
    }

    /// FR1 modulation level field
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Two => 0,
            Self::Four => 1,
            Self::Eight => 2,
            Self::Sixteen => 3,
        }
    }
}

/// Linear sweep parameters
///
/// `start` and `end` are in the unit of the swept parameter, as are the
/// rising and falling step sizes. The ramp rates count SYNC_CLK periods
/// per step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sweep {
    /// What is swept
    pub kind: ModulationKind,
    /// Start value (profile 0 register)
    pub start: f64,
    /// End value (CW1)
    pub end: f64,
    /// Step size while rising
    pub rise_step: f64,
    /// Step size while falling
    pub fall_step: f64,
    /// Rising ramp rate
    pub rise_rate: u8,
    /// Falling ramp rate
    pub fall_rate: u8,
    /// Output frequency for phase and amplitude sweeps
    pub carrier_hz: f64,
}

impl Sweep {
    /// Frequency sweep with the slowest ramp rate
    #[must_use]
    pub const fn frequency(start_hz: f64, end_hz: f64, rise_hz: f64, fall_hz: f64) -> Self {
        Self {
            kind: ModulationKind::Frequency,
            start: start_hz,
            end: end_hz,
            rise_step: rise_hz,
            fall_step: fall_hz,
            rise_rate: 0xFF,
            fall_rate: 0xFF,
            carrier_hz: 0.0,
        }
    }
}

/// Pins of an AD9959
pub struct Ad9959Pins<P> {
    /// Serial clock
    pub sclk: P,
    /// Chip select (active low)
    pub cs: P,
    /// I/O update strobe
    pub io_update: P,
    /// Serial data (SDIO0)
    pub sdio0: P,
    /// Profile pins P0..P3
    pub profile: [P; 4],
    /// SDIO1..SDIO3, unused in single-bit mode and parked low
    pub sdio_unused: [P; 3],
    /// Power-down control
    pub pwr_dwn: P,
    /// Master reset
    pub reset: P,
}

/// AD9959 driver
pub struct Ad9959<P, D> {
    bus: SerialBus<P, D>,
    cs: P,
    io_update: P,
    profile: SelectLines<P, 4>,
    sdio_unused: [P; 3],
    pwr_dwn: P,
    reset: P,
    frequency: FrequencyScale,
    phase: PhaseScale,
}

impl<P, D> Ad9959<P, D>
where
    P: OutputPin,
    D: DelayNs,
{
    /// Create a driver; call [`Self::init`] before use
    pub fn new(pins: Ad9959Pins<P>, delay: D) -> Result<Self, P::Error> {
        let bus = SerialBus::new(pins.sclk, pins.sdio0, delay, BusConfig::rising_edge(SETTLE_NS)).map_err(Error::Bus)?;
        Ok(Self {
            bus,
            cs: pins.cs,
            io_update: pins.io_update,
            profile: SelectLines::new(pins.profile),
            sdio_unused: pins.sdio_unused,
            pwr_dwn: pins.pwr_dwn,
            reset: pins.reset,
            frequency: FrequencyScale::new(AD9959_SYSCLK_HZ, FREQ_BITS),
            phase: PhaseScale::new(PHASE_BITS),
        })
    }

    /// Park every control line and reset the part
    pub fn init(&mut self) -> Result<(), P::Error> {
        self.cs.set_high().map_err(Error::Bus)?;
        self.bus.idle_clock().map_err(Error::Bus)?;
        self.bus.idle_data_low().map_err(Error::Bus)?;
        self.io_update.set_low().map_err(Error::Bus)?;
        self.profile.select(0).map_err(Error::Bus)?;
        for pin in &mut self.sdio_unused {
            pin.set_low().map_err(Error::Bus)?;
        }
        self.pwr_dwn.set_low().map_err(Error::Bus)?;

        self.reset.set_low().map_err(Error::Bus)?;
        self.bus.delay().delay_ms(6);
        self.reset.set_high().map_err(Error::Bus)?;
        self.bus.delay().delay_ms(100);
        self.reset.set_low().map_err(Error::Bus)?;
        info!("ad9959: reset done");
        Ok(())
    }

    /// 32-bit frequency word for `hz`
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn frequency_word(&self, hz: f64) -> u32 {
        self.frequency.encode(hz).value() as u32
    }

    /// 14-bit phase word for `degrees`
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn phase_word(&self, degrees: f64) -> u16 {
        self.phase.encode(degrees).value() as u16
    }

    /// Write a register: CS low, address, data, optional IO_UPDATE, CS high
    pub fn write_register(&mut self, address: u8, data: &[u8], io_update: bool) -> Result<(), P::Error> {
        self.bus.idle_clock().map_err(Error::Bus)?;
        self.cs.set_low().map_err(Error::Bus)?;
        self.bus.write_byte(address).map_err(Error::Bus)?;
        self.bus.write_bytes(data).map_err(Error::Bus)?;
        if io_update {
            self.io_update()?;
        }
        self.cs.set_high().map_err(Error::Bus)
    }

    /// Pulse IO_UPDATE
    pub fn io_update(&mut self) -> Result<(), P::Error> {
        pulse(&mut self.io_update, self.bus.delay(), true, STROBE_NS).map_err(Error::Bus)
    }

    /// Route subsequent channel-register writes to `channels`
    pub fn select_channels(&mut self, channels: ChannelMask) -> Result<(), P::Error> {
        self.write_register(reg::CSR, &[channels.csr()], false)
    }

    /// Single tone at `hz`
    pub fn set_frequency(&mut self, hz: f64) -> Result<(), P::Error> {
        self.single_tone()?;
        self.write_frequency(reg::CFTW0, hz, true)
    }

    /// Single tone at `hz` with a phase offset
    pub fn set_phase(&mut self, hz: f64, degrees: f64) -> Result<(), P::Error> {
        self.single_tone()?;
        let phase = self.phase_word(degrees).to_be_bytes();
        self.write_register(reg::CPOW0, &phase, false)?;
        self.write_frequency(reg::CFTW0, hz, true)
    }

    /// Single tone at `hz` with the amplitude multiplier set to `counts`
    ///
    /// Counts are clamped to 1023 (full scale).
    pub fn set_amplitude(&mut self, hz: f64, counts: u16) -> Result<(), P::Error> {
        self.single_tone()?;
        let acr = ACR_MULTIPLIER_ENABLE | counts.min(MAX_AMPLITUDE);
        let [hi, lo] = acr.to_be_bytes();
        self.write_register(reg::ACR, &[0x00, hi, lo], false)?;
        self.write_frequency(reg::CFTW0, hz, true)
    }

    /// Profile-pin modulation
    ///
    /// `profile_config` is the FR1 profile pin configuration nibble, which
    /// decides how P0..P3 map onto the channels. `values` holds one entry
    /// per level in the unit of `kind`; `carrier_hz` is the output
    /// frequency for phase and amplitude modulation and is ignored for
    /// frequency modulation.
    pub fn set_modulation(
        &mut self,
        kind: ModulationKind,
        levels: Levels,
        profile_config: u8,
        carrier_hz: f64,
        values: &[f64],
    ) -> Result<(), P::Error> {
        if values.len() != levels.count() {
            warn!("ad9959: {=usize} values for {=usize} levels", values.len(), levels.count());
            return Err(Error::InvalidLength);
        }

        let fr1 = [FR1_PLL, ((profile_config & 0x0F) << 4) | levels.code(), 0x00];
        self.write_register(reg::FR1, &fr1, false)?;
        self.write_register(reg::CFR, &kind.modulation_cfr(), false)?;

        let mut address = reg::CW1;
        for (profile, &value) in values.iter().enumerate() {
            if profile == 0 {
                self.write_profile_zero(kind, value)?;
            } else {
                let word = self.channel_word(kind, value);
                self.write_register(address, &word, false)?;
                address += 1;
            }
        }

        match kind {
            ModulationKind::Frequency => self.io_update(),
            ModulationKind::Phase | ModulationKind::Amplitude => {
                self.write_frequency(reg::CFTW0, carrier_hz, true)
            }
        }
    }

    /// Linear sweep from `start` to `end`
    pub fn sweep(&mut self, sweep: &Sweep) -> Result<(), P::Error> {
        self.write_register(reg::FR1, &[FR1_PLL, 0x00, 0x00], false)?;
        let cfr = [sweep.kind.cfr_select(), CFR_SWEEP, CFR_SWEEP_FLAGS];
        self.write_register(reg::CFR, &cfr, false)?;

        self.write_profile_zero(sweep.kind, sweep.start)?;
        let end = self.channel_word(sweep.kind, sweep.end);
        self.write_register(reg::CW1, &end, false)?;
        let rise = self.channel_word(sweep.kind, sweep.rise_step);
        self.write_register(reg::RDW, &rise, false)?;
        let fall = self.channel_word(sweep.kind, sweep.fall_step);
        self.write_register(reg::FDW, &fall, false)?;
        self.write_register(reg::LSRR, &[sweep.fall_rate, sweep.rise_rate], false)?;

        match sweep.kind {
            ModulationKind::Frequency => self.io_update(),
            ModulationKind::Phase | ModulationKind::Amplitude => {
                self.write_frequency(reg::CFTW0, sweep.carrier_hz, true)
            }
        }
    }

    /// Drive P0..P3 to select a profile (0..=15)
    pub fn set_profile(&mut self, profile: u8) -> Result<(), P::Error> {
        if profile > 15 {
            return Err(Error::InvalidChannel(profile));
        }
        self.profile.select(profile).map_err(Error::Bus)
    }

    /// Currently selected profile
    #[must_use]
    pub const fn profile(&self) -> u8 {
        self.profile.code()
    }

    /// Enter or leave external power-down
    pub fn power_down(&mut self, down: bool) -> Result<(), P::Error> {
        drive(&mut self.pwr_dwn, down).map_err(Error::Bus)
    }

    fn single_tone(&mut self) -> Result<(), P::Error> {
        self.write_register(reg::FR1, &[FR1_PLL, 0x00, 0x00], false)?;
        self.write_register(reg::CFR, &CFR_SINGLE_TONE, false)
    }

    fn write_frequency(&mut self, address: u8, hz: f64, io_update: bool) -> Result<(), P::Error> {
        let word = self.frequency_word(hz).to_be_bytes();
        self.write_register(address, &word, io_update)
    }

    /// Profile 0 lives in the native register of each parameter
    fn write_profile_zero(&mut self, kind: ModulationKind, value: f64) -> Result<(), P::Error> {
        match kind {
            ModulationKind::Frequency => self.write_frequency(reg::CFTW0, value, false),
            ModulationKind::Phase => {
                let word = self.phase_word(value).to_be_bytes();
                self.write_register(reg::CPOW0, &word, false)
            }
            ModulationKind::Amplitude => {
                let [hi, lo] = amplitude_counts(value).to_be_bytes();
                self.write_register(reg::ACR, &[0x00, hi, lo], false)
            }
        }
    }

    /// 32-bit channel word with the value MSB-aligned
    #[allow(clippy::cast_possible_truncation)]
    fn channel_word(&self, kind: ModulationKind, value: f64) -> [u8; 4] {
        let word = match kind {
            ModulationKind::Frequency => self.frequency.encode(value).value(),
            ModulationKind::Phase => self.phase.encode(value).msb_aligned(32),
            ModulationKind::Amplitude => {
                TuningWord::new(u64::from(amplitude_counts(value)), AMPLITUDE_BITS).msb_aligned(32)
            }
        };
        (word as u32).to_be_bytes()
    }
}

/// Round an amplitude to a 10-bit count
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn amplitude_counts(value: f64) -> u16 {
    if value.is_nan() || value <= 0.0 {
        0
    } else if value >= f64::from(MAX_AMPLITUDE) {
        MAX_AMPLITUDE
    } else {
        (value + 0.5) as u16
    }
}
