//! RDA5820 FM Transceiver Driver
//!
//! 16-bit registers over I2C (address byte, then big-endian data). The
//! part cannot read back a single write-only field, so every register
//! written is mirrored in a [`RegisterMap`] and bit-field updates are
//! done read-modify-write on the shadow copy.
//!
//! Frequencies are in kHz. The channel index in R03 counts spacing steps
//! from the band bottom.

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

use crate::config::timing::{RDA5820_POLL_LIMIT, RDA5820_POLL_MS};
use crate::drivers::{Error, Result};
use crate::hal::i2c::{I2cAddress, I2cBus, RegisterMap};

/// Register addresses
pub mod reg {
    /// Chip ID (read-only)
    pub const CHIP_ID: u8 = 0x00;
    /// Power, mute, seek control
    pub const R02: u8 = 0x02;
    /// Channel, band, spacing, tune
    pub const R03: u8 = 0x03;
    /// Control 2
    pub const R04: u8 = 0x04;
    /// Seek threshold, LNA, volume
    pub const R05: u8 = 0x05;
    /// Status 1: STC, SF, stereo, read channel
    pub const R0A: u8 = 0x0A;
    /// Status 2: RSSI, FM_TRUE, FM_READY
    pub const R0B: u8 = 0x0B;
    /// Work mode (RX / TX)
    pub const R40: u8 = 0x40;
    /// TX PA and PGA gain
    pub const R42: u8 = 0x42;
    /// User band bottom, 100 kHz units
    pub const R53: u8 = 0x53;
    /// User band top, 100 kHz units
    pub const R54: u8 = 0x54;
}

/// Register bit fields
pub mod bits {
    /// R02: audio output enabled (not high-Z)
    pub const DHIZ: u16 = 1 << 15;
    /// R02: mute disabled
    pub const DMUTE: u16 = 1 << 14;
    /// R02: seek upwards
    pub const SEEKUP: u16 = 1 << 9;
    /// R02: start seek
    pub const SEEK: u16 = 1 << 8;
    /// R02: soft reset
    pub const SOFT_RESET: u16 = 1 << 1;
    /// R02: power up
    pub const ENABLE: u16 = 1 << 0;
    /// R03: start tune
    pub const TUNE: u16 = 1 << 4;
    /// R0A: seek/tune complete
    pub const STC: u16 = 1 << 14;
    /// R0A: seek failed
    pub const SF: u16 = 1 << 13;
    /// R0A: stereo
    pub const STEREO: u16 = 1 << 10;
    /// R0B: station found
    pub const FM_TRUE: u16 = 1 << 8;
    /// R0B: tuned and ready
    pub const FM_READY: u16 = 1 << 7;
}

/// Chip IDs accepted by [`Rda5820::init`]
pub const CHIP_IDS: [u16; 2] = [0x5820, 0x5805];

/// Shadow register count (covers 0x00..=0x67)
const SHADOW_REGS: usize = 0x68;

/// Registers read back into the shadow after power-up
const SYNC_REGS: [u8; 8] = [0x02, 0x03, 0x04, 0x05, 0x06, 0x07, reg::R40, reg::R42];

/// Receive band (R03 bits 3:2)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Band {
    /// 87 to 108 MHz
    #[default]
    Standard,
    /// 76 to 91 MHz
    Japan,
    /// 76 to 108 MHz
    World,
    /// Bottom and top from R53/R54
    Custom,
}

impl Band {
    const fn from_bits(bits: u16) -> Self {
        match bits & 0x03 {
            0 => Self::Standard,
            1 => Self::Japan,
            2 => Self::World,
            _ => Self::Custom,
        }
    }

    const fn bits(self) -> u16 {
        match self {
            Self::Standard => 0,
            Self::Japan => 1,
            Self::World => 2,
            Self::Custom => 3,
        }
    }

    /// Fixed bottom of the band in kHz, `None` for [`Band::Custom`]
    #[must_use]
    pub const fn bottom_khz(self) -> Option<u32> {
        match self {
            Self::Standard => Some(87_000),
            Self::Japan | Self::World => Some(76_000),
            Self::Custom => None,
        }
    }
}

/// Channel spacing (R03 bits 1:0)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Spacing {
    /// 100 kHz
    #[default]
    Khz100,
    /// 200 kHz
    Khz200,
    /// 50 kHz
    Khz50,
    /// 25 kHz
    Khz25,
}

impl Spacing {
    const fn from_bits(bits: u16) -> Self {
        match bits & 0x03 {
            0 => Self::Khz100,
            1 => Self::Khz200,
            2 => Self::Khz50,
            _ => Self::Khz25,
        }
    }

    const fn bits(self) -> u16 {
        match self {
            Self::Khz100 => 0,
            Self::Khz200 => 1,
            Self::Khz50 => 2,
            Self::Khz25 => 3,
        }
    }

    /// Step in kHz
    #[must_use]
    pub const fn khz(self) -> u32 {
        match self {
            Self::Khz100 => 100,
            Self::Khz200 => 200,
            Self::Khz50 => 50,
            Self::Khz25 => 25,
        }
    }
}

/// Transceiver direction (R40 bits 3:0)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkMode {
    /// FM receiver
    Receive,
    /// FM transmitter
    Transmit,
}

#[cfg(feature = "embedded")]
impl defmt::Format for WorkMode {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Receive => defmt::write!(f, "RX"),
            Self::Transmit => defmt::write!(f, "TX"),
        }
    }
}

/// RDA5820 driver
pub struct Rda5820<I, D> {
    bus: I2cBus<I>,
    delay: D,
    address: I2cAddress,
    regs: RegisterMap<u16, SHADOW_REGS>,
}

impl<I, D> Rda5820<I, D>
where
    I: I2c,
    D: DelayNs,
{
    /// Create a driver at the default address
    #[must_use]
    pub fn new(i2c: I, delay: D) -> Self {
        Self {
            bus: I2cBus::new(i2c),
            delay,
            address: I2cAddress::RDA5820,
            regs: RegisterMap::new(),
        }
    }

    /// Check the chip ID, reset, power up and load the shadow registers
    ///
    /// Returns the chip ID.
    pub async fn init(&mut self) -> Result<u16, I::Error> {
        let id = self.read_register(reg::CHIP_ID).await?;
        info!("rda5820: chip id 0x{=u16:04X}", id);
        if !CHIP_IDS.contains(&id) {
            return Err(Error::UnknownChip(id));
        }

        self.write_register(reg::R02, bits::SOFT_RESET).await?;
        self.delay.delay_ms(50).await;
        self.write_register(reg::R02, bits::DHIZ | bits::DMUTE | bits::ENABLE).await?;
        self.delay.delay_ms(600).await;

        self.sync().await?;
        Ok(id)
    }

    /// Re-read the control registers into the shadow copy
    pub async fn sync(&mut self) -> Result<(), I::Error> {
        for addr in SYNC_REGS {
            let value = self.read_register(addr).await?;
            self.regs.store(usize::from(addr), value);
        }
        Ok(())
    }

    /// Shadow value of a register
    #[must_use]
    pub fn cached(&self, addr: u8) -> u16 {
        self.regs.get(usize::from(addr))
    }

    /// Switch to receive
    pub async fn set_rx_mode(&mut self) -> Result<(), I::Error> {
        self.set_work_mode(WorkMode::Receive).await
    }

    /// Switch to transmit
    pub async fn set_tx_mode(&mut self) -> Result<(), I::Error> {
        self.set_work_mode(WorkMode::Transmit).await
    }

    /// Select receive or transmit
    pub async fn set_work_mode(&mut self, mode: WorkMode) -> Result<(), I::Error> {
        let bits = match mode {
            WorkMode::Receive => 0x0,
            WorkMode::Transmit => 0x1,
        };
        self.update(reg::R40, 0x000F, bits).await?;
        debug!("rda5820: {}", mode);
        Ok(())
    }

    /// Volume 0..=15 (clamped)
    pub async fn set_volume(&mut self, volume: u8) -> Result<(), I::Error> {
        self.update(reg::R05, 0x000F, u16::from(volume.min(15))).await
    }

    /// Mute or unmute the audio output
    pub async fn set_mute(&mut self, mute: bool) -> Result<(), I::Error> {
        let bits = if mute { 0 } else { bits::DMUTE };
        self.update(reg::R02, bits::DMUTE, bits).await
    }

    /// Seek SNR threshold (7 bits)
    pub async fn set_seek_threshold(&mut self, threshold: u8) -> Result<(), I::Error> {
        self.update(reg::R05, 0x7F00, u16::from(threshold & 0x7F) << 8).await
    }

    /// Transmit PA gain (6 bits)
    pub async fn set_tx_pa_gain(&mut self, gain: u8) -> Result<(), I::Error> {
        self.update(reg::R42, 0x003F, u16::from(gain & 0x3F)).await
    }

    /// Transmit input PGA gain (3 bits)
    pub async fn set_tx_pga_gain(&mut self, gain: u8) -> Result<(), I::Error> {
        self.update(reg::R42, 0x0700, u16::from(gain & 0x07) << 8).await
    }

    /// Select the band
    pub async fn set_band(&mut self, band: Band) -> Result<(), I::Error> {
        self.update(reg::R03, 0x000C, band.bits() << 2).await
    }

    /// Select the channel spacing
    pub async fn set_spacing(&mut self, spacing: Spacing) -> Result<(), I::Error> {
        self.update(reg::R03, 0x0003, spacing.bits()).await
    }

    /// Band selected in the shadow copy of R03
    #[must_use]
    pub fn band(&self) -> Band {
        Band::from_bits(self.cached(reg::R03) >> 2)
    }

    /// Spacing selected in the shadow copy of R03
    #[must_use]
    pub fn spacing(&self) -> Spacing {
        Spacing::from_bits(self.cached(reg::R03))
    }

    /// Tune to `khz` and wait for FM_READY
    ///
    /// The frequency is rounded down to the channel grid. Frequencies
    /// below the band bottom are rejected.
    pub async fn set_frequency(&mut self, khz: u32) -> Result<(), I::Error> {
        let bottom = self.band_bottom_khz().await?;
        if khz < bottom {
            warn!("rda5820: {=u32} kHz below band bottom {=u32}", khz, bottom);
            return Err(Error::OutOfRange);
        }
        #[allow(clippy::cast_possible_truncation)]
        let channel = (((khz - bottom) / self.spacing().khz()) & 0x03FF) as u16;

        let r03 = (self.cached(reg::R03) & 0x003F) | (channel << 6) | bits::TUNE;
        self.write_register(reg::R03, r03).await?;

        for _ in 0..RDA5820_POLL_LIMIT {
            if self.read_register(reg::R0B).await? & bits::FM_READY != 0 {
                // TUNE clears itself once the tune completes
                self.regs.store(usize::from(reg::R03), r03 & !bits::TUNE);
                return Ok(());
            }
            self.delay.delay_ms(RDA5820_POLL_MS).await;
        }
        warn!("rda5820: tune to {=u32} kHz timed out", khz);
        Err(Error::Timeout)
    }

    /// Frequency the receiver is on, from the R0A channel readout
    pub async fn frequency(&mut self) -> Result<u32, I::Error> {
        let bottom = self.band_bottom_khz().await?;
        let channel = u32::from(self.read_register(reg::R0A).await? & 0x03FF);
        Ok(bottom + channel * self.spacing().khz())
    }

    /// Received signal strength (7 bits)
    #[allow(clippy::cast_possible_truncation)]
    pub async fn rssi(&mut self) -> Result<u8, I::Error> {
        Ok((self.read_register(reg::R0B).await? >> 9) as u8)
    }

    /// Whether the receiver decodes stereo
    pub async fn is_stereo(&mut self) -> Result<bool, I::Error> {
        Ok(self.read_register(reg::R0A).await? & bits::STEREO != 0)
    }

    /// Seek to the next station
    ///
    /// Returns the station frequency, or `None` when the seek wrapped
    /// around the band without finding one.
    pub async fn seek(&mut self, up: bool) -> Result<Option<u32>, I::Error> {
        let direction = if up { bits::SEEKUP } else { 0 };
        self.update(reg::R02, bits::SEEKUP | bits::SEEK, direction | bits::SEEK).await?;

        let mut status = None;
        for _ in 0..RDA5820_POLL_LIMIT {
            let r0a = self.read_register(reg::R0A).await?;
            if r0a & bits::STC != 0 {
                status = Some(r0a);
                break;
            }
            self.delay.delay_ms(RDA5820_POLL_MS).await;
        }
        self.update(reg::R02, bits::SEEK, 0).await?;

        let Some(r0a) = status else {
            warn!("rda5820: seek timed out");
            return Err(Error::Timeout);
        };
        if r0a & bits::SF != 0 {
            return Ok(None);
        }
        let bottom = self.band_bottom_khz().await?;
        Ok(Some(bottom + u32::from(r0a & 0x03FF) * self.spacing().khz()))
    }

    /// Write a register and mirror it in the shadow copy
    pub async fn write_register(&mut self, addr: u8, value: u16) -> Result<(), I::Error> {
        self.bus.write_reg16(self.address, addr, value).await.map_err(Error::Bus)?;
        self.regs.store(usize::from(addr), value);
        Ok(())
    }

    /// Read a register from the chip
    pub async fn read_register(&mut self, addr: u8) -> Result<u16, I::Error> {
        self.bus.read_reg16(self.address, addr).await.map_err(Error::Bus)
    }

    /// Give the bus and delay back
    pub fn release(self) -> (I, D) {
        (self.bus.release(), self.delay)
    }

    /// Replace `mask` bits of a shadowed register with `value`
    async fn update(&mut self, addr: u8, mask: u16, value: u16) -> Result<(), I::Error> {
        let current = self.cached(addr);
        self.write_register(addr, (current & !mask) | (value & mask)).await
    }

    async fn band_bottom_khz(&mut self) -> Result<u32, I::Error> {
        match self.band().bottom_khz() {
            Some(khz) => Ok(khz),
            None => Ok(u32::from(self.read_register(reg::R53).await?) * 100),
        }
    }
}
