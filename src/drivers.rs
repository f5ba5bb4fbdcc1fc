//! Peripheral Drivers
//!
//! High-level drivers for the external ICs on the instrument board.
//! Each driver owns its pins or bus handle and exposes setters in
//! physical units (Hz, degrees, dB, kHz).

pub mod ad9833;
pub mod ad9854;
pub mod ad9959;
pub mod adf4351;
pub mod cd4051;
pub mod ec11;
pub mod hmc241;
pub mod nrf24l01;
pub mod pe4302;
pub mod qn8025;
pub mod rda5820;

/// Driver error, generic over the transport's error type
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error<E> {
    /// Pin, SPI or I2C transfer failed
    Bus(E),
    /// Channel or switch position does not exist on the part
    InvalidChannel(u8),
    /// Requested value is outside what the part can do
    OutOfRange,
    /// Chip identification did not match
    UnknownChip(u16),
    /// Polled status never became ready
    Timeout,
    /// Device did not answer, or a register readback did not match
    NotConnected,
    /// Packet was not acknowledged after all retransmits
    MaxRetransmits,
    /// Operation needs the device in another mode
    ModeMismatch,
    /// Wrong number of values for the selected configuration
    InvalidLength,
}

#[cfg(feature = "embedded")]
impl<E> defmt::Format for Error<E> {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Bus(_) => defmt::write!(f, "Bus"),
            Self::InvalidChannel(ch) => defmt::write!(f, "InvalidChannel({})", ch),
            Self::OutOfRange => defmt::write!(f, "OutOfRange"),
            Self::UnknownChip(id) => defmt::write!(f, "UnknownChip(0x{:04X})", id),
            Self::Timeout => defmt::write!(f, "Timeout"),
            Self::NotConnected => defmt::write!(f, "NotConnected"),
            Self::MaxRetransmits => defmt::write!(f, "MaxRetransmits"),
            Self::ModeMismatch => defmt::write!(f, "ModeMismatch"),
            Self::InvalidLength => defmt::write!(f, "InvalidLength"),
        }
    }
}

/// Driver result
pub type Result<T, E> = core::result::Result<T, Error<E>>;
