//! QN8025 FM Receiver Driver
//!
//! 8-bit registers over I2C. Channels are 10-bit indices in 50 kHz steps
//! from 61.75 MHz; the low byte lives in CH (and CH_START / CH_STOP for
//! seeks) and the two high bits are packed into CH_STEP.
//!
//! All frequencies are integer kHz.

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

use crate::config::timing::{
    QN8025_MONITOR_INTERVAL_MS, QN8025_POLL_LIMIT, QN8025_POLL_MS, QN8025_RSSI_THRESHOLD,
};
use crate::drivers::{Error, Result};
use crate::hal::i2c::{I2cAddress, I2cBus};

/// Register addresses
pub mod reg {
    /// System control: RX request, channel scan
    pub const SYSTEM1: u8 = 0x00;
    /// CCA threshold for seeks
    pub const CCA: u8 = 0x01;
    /// In-band signal RSSI
    pub const RSSISIG: u8 = 0x03;
    /// Status 1: seek result
    pub const STATUS1: u8 = 0x04;
    /// Chip ID 1
    pub const CID1: u8 = 0x05;
    /// Chip ID 2
    pub const CID2: u8 = 0x06;
    /// Channel index low byte
    pub const CH: u8 = 0x07;
    /// Seek start index low byte
    pub const CH_START: u8 = 0x08;
    /// Seek stop index low byte
    pub const CH_STOP: u8 = 0x09;
    /// Seek step and channel index high bits
    pub const CH_STEP: u8 = 0x0A;
    /// Volume control
    pub const VOL_CTL: u8 = 0x14;
}

/// SYSTEM1: receive with manual tuning (RXREQ, CCA disabled)
const SYSTEM1_TUNE: u8 = 0x11;

/// SYSTEM1: receive with channel scan (RXREQ, CHSC)
const SYSTEM1_SEEK: u8 = 0x12;

/// SYSTEM1: channel scan still running
const SYSTEM1_CHSC: u8 = 0x02;

/// STATUS1: seek found nothing
const STATUS1_SEEK_FAIL: u8 = 0x08;

/// CCA threshold used for seeks
const SEEK_CCA_THRESHOLD: u8 = 0x10;

/// Lowest tunable frequency
pub const MIN_KHZ: u32 = 61_750;

/// Highest tunable frequency
pub const MAX_KHZ: u32 = 108_000;

/// Channel index step
pub const CHANNEL_STEP_KHZ: u32 = 50;

/// Default scan range
pub const SCAN_START_KHZ: u32 = 87_000;

/// Default scan range
pub const SCAN_STOP_KHZ: u32 = 108_000;

/// Seek step size
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SeekStep {
    /// 50 kHz
    Khz50,
    /// 100 kHz
    #[default]
    Khz100,
    /// 200 kHz
    Khz200,
}

impl SeekStep {
    /// CH_STEP bits 7:6
    const fn bits(self) -> u8 {
        match self {
            Self::Khz50 => 0x00,
            Self::Khz100 => 0x40,
            Self::Khz200 => 0x80,
        }
    }

    /// Step in kHz
    #[must_use]
    pub const fn khz(self) -> u32 {
        match self {
            Self::Khz50 => 50,
            Self::Khz100 => 100,
            Self::Khz200 => 200,
        }
    }
}

/// Chip identification bytes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChipId {
    /// CID1
    pub cid1: u8,
    /// CID2
    pub cid2: u8,
}

/// Outcome of [`Qn8025::poll_signal`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignalCheck {
    /// Interval not yet elapsed, nothing measured
    Skipped,
    /// Signal at or above the threshold
    Good(u8),
    /// No station tuned
    NoStation,
    /// Signal dropped below the threshold and the band was rescanned
    Rescanned(Option<u32>),
}

/// Channel index for `khz`, `None` outside 61.75..=108 MHz
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn channel_index(khz: u32) -> Option<u16> {
    if khz < MIN_KHZ || khz > MAX_KHZ {
        None
    } else {
        Some(((khz - MIN_KHZ) / CHANNEL_STEP_KHZ) as u16)
    }
}

/// Frequency of a channel index
#[must_use]
pub const fn index_khz(index: u16) -> u32 {
    MIN_KHZ + (index & 0x03FF) as u32 * CHANNEL_STEP_KHZ
}

/// QN8025 driver
pub struct Qn8025<I, D> {
    bus: I2cBus<I>,
    delay: D,
    address: I2cAddress,
    frequency_khz: Option<u32>,
    threshold: u8,
    interval_ms: u64,
    last_check_ms: Option<u64>,
}

impl<I, D> Qn8025<I, D>
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
            address: I2cAddress::QN8025,
            frequency_khz: None,
            threshold: QN8025_RSSI_THRESHOLD,
            interval_ms: u64::from(QN8025_MONITOR_INTERVAL_MS),
            last_check_ms: None,
        }
    }

    /// Probe the chip and read its ID
    ///
    /// A device that does not answer yields [`Error::NotConnected`].
    pub async fn begin(&mut self) -> Result<ChipId, I::Error> {
        let Ok(cid1) = self.bus.read_reg(self.address, reg::CID1).await else {
            error!("qn8025: no answer at 0x{=u8:02X}", self.address.addr());
            return Err(Error::NotConnected);
        };
        let cid2 = self.read_register(reg::CID2).await?;
        info!("qn8025: id 0x{=u8:02X} 0x{=u8:02X}", cid1, cid2);
        Ok(ChipId { cid1, cid2 })
    }

    /// Tune to `khz` (rounded down to the 50 kHz grid)
    pub async fn set_frequency(&mut self, khz: u32) -> Result<(), I::Error> {
        let index = channel_index(khz).ok_or(Error::OutOfRange)?;
        let [high, low] = index.to_be_bytes();

        self.write_register(reg::CH, low).await?;
        let step = self.read_register(reg::CH_STEP).await?;
        self.write_register(reg::CH_STEP, (step & 0xFC) | (high & 0x03)).await?;
        self.write_register(reg::SYSTEM1, SYSTEM1_TUNE).await?;

        self.frequency_khz = Some(khz);
        debug!("qn8025: tuned {=u32} kHz", khz);
        Ok(())
    }

    /// Frequency set last, `None` before the first tune
    #[must_use]
    pub const fn frequency(&self) -> Option<u32> {
        self.frequency_khz
    }

    /// Received signal strength
    pub async fn rssi(&mut self) -> Result<u8, I::Error> {
        self.read_register(reg::RSSISIG).await
    }

    /// Hardware seek between `start_khz` and `stop_khz`
    ///
    /// Returns the station found, or `None` when the scan found nothing.
    pub async fn auto_seek(&mut self, start_khz: u32, stop_khz: u32, step: SeekStep) -> Result<Option<u32>, I::Error> {
        let start = channel_index(start_khz).ok_or(Error::OutOfRange)?;
        let stop = channel_index(stop_khz).ok_or(Error::OutOfRange)?;
        let [start_high, start_low] = start.to_be_bytes();
        let [stop_high, stop_low] = stop.to_be_bytes();

        self.write_register(reg::CH_START, start_low).await?;
        self.write_register(reg::CH_STOP, stop_low).await?;
        let ch_step = step.bits() | ((stop_high & 0x03) << 4) | ((start_high & 0x03) << 2);
        self.write_register(reg::CH_STEP, ch_step).await?;
        self.write_register(reg::CCA, SEEK_CCA_THRESHOLD).await?;
        self.write_register(reg::SYSTEM1, SYSTEM1_SEEK).await?;

        let mut done = false;
        for _ in 0..QN8025_POLL_LIMIT {
            if self.read_register(reg::SYSTEM1).await? & SYSTEM1_CHSC == 0 {
                done = true;
                break;
            }
            self.delay.delay_ms(QN8025_POLL_MS).await;
        }
        if !done {
            warn!("qn8025: seek timed out");
            return Err(Error::Timeout);
        }

        if self.read_register(reg::STATUS1).await? & STATUS1_SEEK_FAIL != 0 {
            return Ok(None);
        }
        let low = self.read_register(reg::CH).await?;
        let high = self.read_register(reg::CH_STEP).await? & 0x03;
        let found = index_khz(u16::from_be_bytes([high, low]));
        self.frequency_khz = Some(found);
        Ok(Some(found))
    }

    /// Seek through the whole range, then tune to the strongest station
    pub async fn scan_and_lock_best(&mut self, start_khz: u32, stop_khz: u32) -> Result<Option<u32>, I::Error> {
        let mut cursor = start_khz;
        let mut best: Option<(u32, u8)> = None;

        while cursor < stop_khz {
            let Some(found) = self.auto_seek(cursor, stop_khz, SeekStep::Khz100).await? else {
                break;
            };
            let rssi = self.rssi().await?;
            debug!("qn8025: station {=u32} kHz rssi {=u8}", found, rssi);
            if best.map_or(true, |(_, level)| rssi > level) {
                best = Some((found, rssi));
            }
            // a seek that wraps below the cursor would loop forever
            if found < cursor {
                break;
            }
            cursor = found + SeekStep::Khz100.khz();
        }

        match best {
            Some((khz, rssi)) => {
                info!("qn8025: locked {=u32} kHz rssi {=u8}", khz, rssi);
                self.set_frequency(khz).await?;
                Ok(Some(khz))
            }
            None => {
                info!("qn8025: no station found");
                Ok(None)
            }
        }
    }

    /// Change the weak-signal threshold and check interval
    pub fn set_monitor(&mut self, threshold: u8, interval_ms: u64) {
        self.threshold = threshold;
        self.interval_ms = interval_ms;
    }

    /// Periodic signal check, call from the main loop with a millisecond clock
    ///
    /// Rescans the default range when the RSSI drops below the threshold.
    pub async fn poll_signal(&mut self, now_ms: u64) -> Result<SignalCheck, I::Error> {
        if let Some(last) = self.last_check_ms {
            if now_ms.saturating_sub(last) < self.interval_ms {
                return Ok(SignalCheck::Skipped);
            }
        }
        self.last_check_ms = Some(now_ms);

        if self.frequency_khz.is_none() {
            return Ok(SignalCheck::NoStation);
        }
        let rssi = self.rssi().await?;
        if rssi >= self.threshold {
            return Ok(SignalCheck::Good(rssi));
        }

        warn!("qn8025: weak signal rssi {=u8}, rescanning", rssi);
        let found = self.scan_and_lock_best(SCAN_START_KHZ, SCAN_STOP_KHZ).await?;
        Ok(SignalCheck::Rescanned(found))
    }

    /// Write one register
    pub async fn write_register(&mut self, addr: u8, value: u8) -> Result<(), I::Error> {
        self.bus.write_reg(self.address, addr, value).await.map_err(Error::Bus)
    }

    /// Read one register
    pub async fn read_register(&mut self, addr: u8) -> Result<u8, I::Error> {
        self.bus.read_reg(self.address, addr).await.map_err(Error::Bus)
    }

    /// Give the bus and delay back
    pub fn release(self) -> (I, D) {
        (self.bus.release(), self.delay)
    }
}
