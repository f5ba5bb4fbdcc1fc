//! Hardware Abstraction Layer
//!
//! Board-level building blocks shared by the drivers and the firmware:
//! GPIO helpers, async I2C register access and the UART console. All of
//! it is written against embedded-hal / embedded-io traits.

pub mod gpio;
pub mod i2c;
pub mod serial;
