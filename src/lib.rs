//! Instrument Firmware Library
//!
//! Peripheral drivers for an STM32F407-based signal instrument: DDS
//! generators, a fractional-N PLL, RF switching and attenuation, FM
//! radio front ends, a 2.4 GHz packet radio, the front-panel encoder
//! and a UART console.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       DRIVERS                               │
//! │  AD9833 │ AD9854 │ AD9959 │ ADF4351 │ PE4302 │ CD4051 │ ... │
//! │  RDA5820 │ QN8025 │ NRF24L01 │ EC11                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │                 SHARED BUILDING BLOCKS                      │
//! │  Bit-serial bus  │  Tuning words  │  Register shadow cache  │
//! ├─────────────────────────────────────────────────────────────┤
//! │                  embedded-hal 1.0 traits                    │
//! │   OutputPin / InputPin │ DelayNs │ SpiDevice │ I2c │ io     │
//! ├─────────────────────────────────────────────────────────────┤
//! │           embassy-stm32 (firmware) │ fakes (host tests)     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every driver is generic over the embedded-hal traits, so the same code
//! runs on the STM32 and in host tests.

#![cfg_attr(feature = "embedded", no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Must come first so the logging macros are visible to every module.
#[macro_use]
mod fmt;

// Re-export dependencies needed by applications (only in embedded mode)
#[cfg(feature = "embedded")]
pub use embassy_executor;
#[cfg(feature = "embedded")]
pub use embassy_stm32;
#[cfg(feature = "embedded")]
pub use embassy_time;

/// Bit-banged synchronous serial transport
pub mod bitbang;

/// Tuning-word encoders (frequency, phase, linear codes)
pub mod tuning;

/// Hardware Abstraction Layer
///
/// GPIO helpers, I2C register access and the UART console.
pub mod hal;

/// Peripheral Drivers
///
/// One module per external IC.
pub mod drivers;

/// System configuration and constants
pub mod config;

/// Prelude module for common imports
pub mod prelude {
    //! Convenient re-exports for common types and traits.

    pub use crate::bitbang::{BitOrder, BusConfig, ClockIdle, SerialBus};
    pub use crate::config::*;
    pub use crate::drivers::Error;
    pub use crate::tuning::{FrequencyScale, LinearScale, PhaseScale, TuningWord};

    // Common traits
    pub use embedded_hal::delay::DelayNs;
    pub use embedded_hal::digital::{InputPin, OutputPin};

    // Error handling
    pub use core::result::Result;

    // Embassy
    #[cfg(feature = "embedded")]
    pub use embassy_time::{Duration, Instant, Timer};

    // Logging
    #[cfg(feature = "embedded")]
    pub use defmt::{debug, error, info, trace, warn};
}
