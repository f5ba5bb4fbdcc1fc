//! I2C Bus Abstractions
//!
//! Async register access for the FM radio front ends. Works on any
//! `embedded-hal-async` I2C implementation (embassy-stm32 with DMA on the
//! board, fakes in host tests).

use embedded_hal_async::i2c::I2c;

/// I2C device address wrapper
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct I2cAddress(u8);

impl I2cAddress {
    /// RDA5820 FM transceiver address
    pub const RDA5820: Self = Self(crate::config::RDA5820_I2C_ADDR);

    /// QN8025 FM receiver address
    pub const QN8025: Self = Self(crate::config::QN8025_I2C_ADDR);

    /// Create from 7-bit address
    #[must_use]
    pub const fn new(addr: u8) -> Self {
        Self(addr & 0x7F)
    }

    /// Create from an 8-bit (write) address as printed in datasheets
    #[must_use]
    pub const fn from_8bit(addr: u8) -> Self {
        Self(addr >> 1)
    }

    /// Get the 7-bit address
    #[must_use]
    pub const fn addr(self) -> u8 {
        self.0
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for I2cAddress {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "0x{:02X}", self.0);
    }
}

/// Register-oriented wrapper around an async I2C bus
pub struct I2cBus<I> {
    i2c: I,
}

impl<I: I2c> I2cBus<I> {
    /// Create a new I2C bus wrapper
    #[must_use]
    pub fn new(i2c: I) -> Self {
        Self { i2c }
    }

    /// Give the bus back
    pub fn release(self) -> I {
        self.i2c
    }

    /// Write bytes to a device
    pub async fn write(&mut self, addr: I2cAddress, data: &[u8]) -> Result<(), I::Error> {
        self.i2c.write(addr.addr(), data).await
    }

    /// Read bytes from a device
    pub async fn read(&mut self, addr: I2cAddress, buffer: &mut [u8]) -> Result<(), I::Error> {
        self.i2c.read(addr.addr(), buffer).await
    }

    /// Write a single 8-bit register
    pub async fn write_reg(&mut self, addr: I2cAddress, reg: u8, value: u8) -> Result<(), I::Error> {
        self.i2c.write(addr.addr(), &[reg, value]).await
    }

    /// Read a single 8-bit register
    pub async fn read_reg(&mut self, addr: I2cAddress, reg: u8) -> Result<u8, I::Error> {
        let mut buf = [0u8];
        self.i2c.write_read(addr.addr(), &[reg], &mut buf).await?;
        Ok(buf[0])
    }

    /// Write a 16-bit register, big-endian on the wire
    pub async fn write_reg16(&mut self, addr: I2cAddress, reg: u8, value: u16) -> Result<(), I::Error> {
        let [hi, lo] = value.to_be_bytes();
        self.i2c.write(addr.addr(), &[reg, hi, lo]).await
    }

    /// Read a 16-bit big-endian register
    pub async fn read_reg16(&mut self, addr: I2cAddress, reg: u8) -> Result<u16, I::Error> {
        let mut buf = [0u8; 2];
        self.i2c.write_read(addr.addr(), &[reg], &mut buf).await?;
        Ok(u16::from_be_bytes(buf))
    }

    /// Read multiple registers starting at base address
    pub async fn read_regs(
        &mut self,
        addr: I2cAddress,
        base_reg: u8,
        buffer: &mut [u8],
    ) -> Result<(), I::Error> {
        self.i2c.write_read(addr.addr(), &[base_reg], buffer).await
    }

    /// Scan the I2C bus for devices
    pub async fn scan(&mut self) -> heapless::Vec<I2cAddress, 16> {
        let mut devices = heapless::Vec::new();

        for addr in 0x08..0x78 {
            let mut buf = [0u8; 1];
            if self.i2c.read(addr, &mut buf).await.is_ok() {
                let _ = devices.push(I2cAddress::new(addr));
            }
        }

        devices
    }
}

/// Shadow copy of a device's registers
///
/// Holds the last value written (or read back) per address so bit fields
/// can be updated without a bus read.
pub struct RegisterMap<T, const N: usize> {
    /// Shadow copy of register values
    values: [T; N],
    /// Track which registers are dirty
    dirty: [bool; N],
}

impl<T: Copy + Default + PartialEq, const N: usize> RegisterMap<T, N> {
    /// Create a new register map initialized to zeros
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: [T::default(); N],
            dirty: [false; N],
        }
    }

    /// Set a register value (marks dirty)
    pub fn set(&mut self, reg: usize, value: T) {
        if reg < N && self.values[reg] != value {
            self.values[reg] = value;
            self.dirty[reg] = true;
        }
    }

    /// Store a value known to match the device (stays clean)
    pub fn store(&mut self, reg: usize, value: T) {
        if reg < N {
            self.values[reg] = value;
            self.dirty[reg] = false;
        }
    }

    /// Get a register value
    #[must_use]
    pub fn get(&self, reg: usize) -> T {
        if reg < N {
            self.values[reg]
        } else {
            T::default()
        }
    }

    /// Check if any registers are dirty
    #[must_use]
    pub fn any_dirty(&self) -> bool {
        self.dirty.iter().any(|&d| d)
    }

    /// Check a single register
    #[must_use]
    pub fn is_dirty(&self, reg: usize) -> bool {
        reg < N && self.dirty[reg]
    }

    /// Mark a register as clean
    pub fn mark_clean(&mut self, reg: usize) {
        if reg < N {
            self.dirty[reg] = false;
        }
    }

    /// Mark all registers as clean
    pub fn mark_all_clean(&mut self) {
        self.dirty.fill(false);
    }

    /// Get iterator over dirty registers
    pub fn dirty_regs(&self) -> impl Iterator<Item = (usize, T)> + '_ {
        self.dirty
            .iter()
            .enumerate()
            .filter(|(_, &d)| d)
            .map(|(i, _)| (i, self.values[i]))
    }
}

impl<T: Copy + Default + PartialEq, const N: usize> Default for RegisterMap<T, N> {
    fn default() -> Self {
        Self::new()
    }
}
