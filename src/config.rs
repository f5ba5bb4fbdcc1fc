//! System configuration and hardware constants
//!
//! This module defines compile-time constants for the instrument hardware.
//! Reference clocks, bus addresses, timing limits and pin mappings are
//! centralized here.

/// System clock frequency (STM32F407 @ 168MHz)
pub const SYSTEM_CLOCK_HZ: u32 = 168_000_000;

/// I2C bus frequency for the FM radio front ends
pub const I2C_FREQUENCY_HZ: u32 = 100_000;

/// Console UART baud rate
pub const CONSOLE_BAUD: u32 = 115_200;

/// AD9833 master clock (25 MHz crystal oscillator)
pub const AD9833_MCLK_HZ: f64 = 25_000_000.0;

/// AD9854 reference clock before the internal PLL
pub const AD9854_REFCLK_HZ: f64 = 30_000_000.0;

/// AD9854 reference clock multiplier
pub const AD9854_PLL_MULTIPLIER: u8 = 9;

/// AD9959 system clock (25 MHz reference x 20)
pub const AD9959_SYSCLK_HZ: f64 = 500_000_000.0;

/// ADF4351 reference input
pub const ADF4351_REFIN_HZ: u64 = 25_000_000;

/// ADF4351 reference divider used by the fixed start-up sequence
pub const ADF4351_R_COUNTER: u16 = 125;

/// RDA5820 7-bit I2C address
pub const RDA5820_I2C_ADDR: u8 = 0x11;

/// QN8025 7-bit I2C address
pub const QN8025_I2C_ADDR: u8 = 0x10;

/// NRF24L01 default RF channel
pub const NRF24_DEFAULT_CHANNEL: u8 = 40;

/// NRF24L01 default pipe 0 / TX address
pub const NRF24_DEFAULT_ADDRESS: [u8; 5] = [0x34, 0x43, 0x10, 0x10, 0x01];

/// Serial console line buffer size
pub const SERIAL_BUFFER_SIZE: usize = 256;

/// Timing limits for polled operations
pub mod timing {
    //! Poll counts and intervals for operations that wait on hardware

    /// RDA5820 tune-complete poll interval
    pub const RDA5820_POLL_MS: u32 = 5;

    /// RDA5820 tune-complete poll attempts (1 s total)
    pub const RDA5820_POLL_LIMIT: u32 = 200;

    /// QN8025 seek poll interval
    pub const QN8025_POLL_MS: u32 = 10;

    /// QN8025 seek poll attempts (5 s total)
    pub const QN8025_POLL_LIMIT: u32 = 500;

    /// QN8025 default weak-signal threshold (RSSI units)
    pub const QN8025_RSSI_THRESHOLD: u8 = 40;

    /// QN8025 default signal check interval
    pub const QN8025_MONITOR_INTERVAL_MS: u32 = 1_000;

    /// NRF24L01 IRQ poll interval while transmitting
    pub const NRF24_IRQ_POLL_US: u32 = 10;

    /// NRF24L01 IRQ poll attempts (50 ms total)
    pub const NRF24_IRQ_POLL_LIMIT: u32 = 5_000;

    /// Encoder long-press threshold
    pub const ENCODER_LONG_PRESS_MS: u32 = 500;
}

/// Pin assignments for GPIO
pub mod pins {
    //! GPIO pin assignments matching the instrument board

    /// Status LED
    pub const LED_STATUS: &str = "PC13";

    /// AD9833 SCLK
    pub const AD9833_SCLK: &str = "PB13";

    /// AD9833 SDATA
    pub const AD9833_SDATA: &str = "PB15";

    /// AD9833 FSYNC
    pub const AD9833_FSYNC: &str = "PB12";

    /// ADF4351 CLK
    pub const ADF4351_CLK: &str = "PE2";

    /// ADF4351 DATA
    pub const ADF4351_DATA: &str = "PE3";

    /// ADF4351 LE
    pub const ADF4351_LE: &str = "PE4";

    /// ADF4351 CE
    pub const ADF4351_CE: &str = "PE5";

    /// PE4302 LE
    pub const PE4302_LE: &str = "PD0";

    /// PE4302 CLK
    pub const PE4302_CLK: &str = "PD1";

    /// PE4302 DATA
    pub const PE4302_DATA: &str = "PD2";

    /// CD4051 select A
    pub const CD4051_A: &str = "PD3";

    /// CD4051 select B
    pub const CD4051_B: &str = "PD4";

    /// CD4051 select C
    pub const CD4051_C: &str = "PD5";

    /// HMC241 select A
    pub const HMC241_A: &str = "PD6";

    /// HMC241 select B
    pub const HMC241_B: &str = "PD7";

    /// Encoder A input
    pub const ENCODER_A: &str = "PA6";

    /// Encoder B input
    pub const ENCODER_B: &str = "PA7";

    /// Encoder push button
    pub const ENCODER_SW: &str = "PA5";

    /// I2C1 SCL (RDA5820, QN8025)
    pub const I2C1_SCL: &str = "PB8";

    /// I2C1 SDA (RDA5820, QN8025)
    pub const I2C1_SDA: &str = "PB9";

    /// Console UART TX
    pub const USART1_TX: &str = "PA9";

    /// Console UART RX
    pub const USART1_RX: &str = "PA10";
}
