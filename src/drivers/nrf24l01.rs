//! NRF24L01 2.4 GHz Transceiver Driver
//!
//! Command/register protocol over SPI (mode 0, CSN handled by the
//! `SpiDevice`). Every command returns the STATUS register in its first
//! byte. CE starts RX listening or a TX burst; the active-low IRQ line
//! signals RX_DR, TX_DS and MAX_RT.
//!
//! Interrupt flags are cleared by writing them back to STATUS.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiDevice;

use crate::config::timing::{NRF24_IRQ_POLL_LIMIT, NRF24_IRQ_POLL_US};
use crate::config::{NRF24_DEFAULT_ADDRESS, NRF24_DEFAULT_CHANNEL};
use crate::drivers::Error;

/// SPI commands
pub mod cmd {
    /// Read register (OR with the address)
    pub const R_REGISTER: u8 = 0x00;
    /// Write register (OR with the address)
    pub const W_REGISTER: u8 = 0x20;
    /// Read RX payload
    pub const R_RX_PAYLOAD: u8 = 0x61;
    /// Write TX payload
    pub const W_TX_PAYLOAD: u8 = 0xA0;
    /// Flush TX FIFO
    pub const FLUSH_TX: u8 = 0xE1;
    /// Flush RX FIFO
    pub const FLUSH_RX: u8 = 0xE2;
    /// Reuse last TX payload
    pub const REUSE_TX_PL: u8 = 0xE3;
    /// No operation, returns STATUS
    pub const NOP: u8 = 0xFF;
}

/// Register addresses
pub mod reg {
    /// Configuration
    pub const CONFIG: u8 = 0x00;
    /// Auto acknowledgment per pipe
    pub const EN_AA: u8 = 0x01;
    /// Enabled RX pipes
    pub const EN_RXADDR: u8 = 0x02;
    /// Address width
    pub const SETUP_AW: u8 = 0x03;
    /// Auto retransmit delay and count
    pub const SETUP_RETR: u8 = 0x04;
    /// RF channel
    pub const RF_CH: u8 = 0x05;
    /// Data rate, power, LNA
    pub const RF_SETUP: u8 = 0x06;
    /// Status and interrupt flags
    pub const STATUS: u8 = 0x07;
    /// Lost and retransmitted packet counters
    pub const OBSERVE_TX: u8 = 0x08;
    /// Carrier detect
    pub const CD: u8 = 0x09;
    /// Pipe 0 RX address
    pub const RX_ADDR_P0: u8 = 0x0A;
    /// TX address
    pub const TX_ADDR: u8 = 0x10;
    /// Pipe 0 payload width
    pub const RX_PW_P0: u8 = 0x11;
    /// FIFO status
    pub const FIFO_STATUS: u8 = 0x17;
    /// Dynamic payload per pipe
    pub const DYNPD: u8 = 0x1C;
    /// Feature register
    pub const FEATURE: u8 = 0x1D;
}

/// CONFIG bits
mod config_bits {
    pub const PRIM_RX: u8 = 0x01;
    pub const PWR_UP: u8 = 0x02;
    pub const CRCO: u8 = 0x04;
    pub const EN_CRC: u8 = 0x08;
}

/// STATUS bits
pub mod status {
    /// Data ready in RX FIFO
    pub const RX_DR: u8 = 0x40;
    /// Packet sent (and acknowledged)
    pub const TX_DS: u8 = 0x20;
    /// Maximum retransmits reached
    pub const MAX_RT: u8 = 0x10;
    /// TX FIFO full
    pub const TX_FULL: u8 = 0x01;
    /// All interrupt flags
    pub const IRQ_MASK: u8 = RX_DR | TX_DS | MAX_RT;
}

/// RF_SETUP: high LNA gain
const LNA_HCURR: u8 = 0x01;

/// Pipe 0 enable, for EN_AA and EN_RXADDR
const PIPE0: u8 = 0x01;

/// Address and payload limits
pub const ADDRESS_WIDTH: usize = 5;

/// Largest payload
pub const MAX_PAYLOAD: usize = 32;

/// Pattern written to TX_ADDR by [`Nrf24l01::check_connection`]
const PROBE_PATTERN: [u8; ADDRESS_WIDTH] = [0xA5; ADDRESS_WIDTH];

/// Transport failure: either the SPI bus or one of the pins
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusError<S, P> {
    /// SPI transfer failed
    Spi(S),
    /// CE or IRQ pin failed
    Pin(P),
}

type Fault<SPI, CE> = Error<
    BusError<<SPI as embedded_hal::spi::ErrorType>::Error, <CE as embedded_hal::digital::ErrorType>::Error>,
>;

/// Operating direction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Primary transmitter
    Tx,
    /// Primary receiver
    Rx,
}

#[cfg(feature = "embedded")]
impl defmt::Format for Mode {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Tx => defmt::write!(f, "TX"),
            Self::Rx => defmt::write!(f, "RX"),
        }
    }
}

/// Air data rate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DataRate {
    /// 250 kbps
    Kbps250,
    /// 1 Mbps
    Mbps1,
    /// 2 Mbps
    #[default]
    Mbps2,
}

impl DataRate {
    const fn bits(self) -> u8 {
        match self {
            Self::Kbps250 => 0x20,
            Self::Mbps1 => 0x00,
            Self::Mbps2 => 0x08,
        }
    }
}

/// Output power
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PowerLevel {
    /// -18 dBm
    Minus18Dbm,
    /// -12 dBm
    Minus12Dbm,
    /// -6 dBm
    Minus6Dbm,
    /// 0 dBm
    #[default]
    ZeroDbm,
}

impl PowerLevel {
    const fn bits(self) -> u8 {
        match self {
            Self::Minus18Dbm => 0x00,
            Self::Minus12Dbm => 0x02,
            Self::Minus6Dbm => 0x04,
            Self::ZeroDbm => 0x06,
        }
    }
}

/// Link settings applied by [`Nrf24l01::set_mode`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RadioConfig {
    /// TX address and pipe 0 RX address
    pub address: [u8; ADDRESS_WIDTH],
    /// RF channel (2400 + n MHz), 0..=125
    pub channel: u8,
    /// Static payload width, 1..=32
    pub payload_width: u8,
    /// Air data rate
    pub data_rate: DataRate,
    /// Output power
    pub power: PowerLevel,
    /// Retransmit delay in 250 us units minus one (0..=15)
    pub retransmit_delay: u8,
    /// Retransmit count (0..=15)
    pub retransmit_count: u8,
}

impl RadioConfig {
    /// SETUP_RETR value
    #[must_use]
    pub const fn setup_retr(&self) -> u8 {
        ((self.retransmit_delay & 0x0F) << 4) | (self.retransmit_count & 0x0F)
    }

    /// RF_SETUP value
    #[must_use]
    pub const fn rf_setup(&self) -> u8 {
        self.power.bits() | self.data_rate.bits() | LNA_HCURR
    }
}

impl Default for RadioConfig {
    /// Channel 40, 32-byte payloads, 2 Mbps, 0 dBm, 500 us x 10 retransmits
    fn default() -> Self {
        Self {
            address: NRF24_DEFAULT_ADDRESS,
            channel: NRF24_DEFAULT_CHANNEL,
            payload_width: 32,
            data_rate: DataRate::Mbps2,
            power: PowerLevel::ZeroDbm,
            retransmit_delay: 1,
            retransmit_count: 10,
        }
    }
}

/// Interrupt sources seen by [`Nrf24l01::handle_irq`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct IrqEvents {
    /// A payload is waiting in the RX FIFO
    pub rx_ready: bool,
    /// A payload was sent
    pub tx_sent: bool,
    /// A payload was dropped after all retransmits (TX FIFO flushed)
    pub max_retransmits: bool,
}

impl IrqEvents {
    /// Decode the interrupt flags of a STATUS value
    #[must_use]
    pub const fn from_status(flags: u8) -> Self {
        Self {
            rx_ready: flags & status::RX_DR != 0,
            tx_sent: flags & status::TX_DS != 0,
            max_retransmits: flags & status::MAX_RT != 0,
        }
    }

    /// Whether any flag is set
    #[must_use]
    pub const fn any(&self) -> bool {
        self.rx_ready || self.tx_sent || self.max_retransmits
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for IrqEvents {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "rx={} tx={} max_rt={}",
            self.rx_ready,
            self.tx_sent,
            self.max_retransmits
        );
    }
}

/// NRF24L01 driver
pub struct Nrf24l01<SPI, CE, IRQ, D> {
    spi: SPI,
    ce: CE,
    irq: IRQ,
    delay: D,
    config: RadioConfig,
    mode: Option<Mode>,
}

impl<SPI, CE, IRQ, D> Nrf24l01<SPI, CE, IRQ, D>
where
    SPI: SpiDevice,
    CE: OutputPin,
    IRQ: InputPin<Error = CE::Error>,
    D: DelayNs,
{
    /// Create a driver with the default link settings
    pub fn new(spi: SPI, ce: CE, irq: IRQ, delay: D) -> Self {
        Self::with_config(spi, ce, irq, delay, RadioConfig::default())
    }

    /// Create a driver with custom link settings
    pub fn with_config(spi: SPI, ce: CE, irq: IRQ, delay: D, config: RadioConfig) -> Self {
        Self {
            spi,
            ce,
            irq,
            delay,
            config,
            mode: None,
        }
    }

    /// Put the radio in standby (CE low)
    pub fn init(&mut self) -> Result<(), Fault<SPI, CE>> {
        self.ce_low()?;
        self.mode = None;
        Ok(())
    }

    /// Write a test pattern to TX_ADDR and read it back
    pub fn check_connection(&mut self) -> Result<(), Fault<SPI, CE>> {
        self.write_buffer(cmd::W_REGISTER | reg::TX_ADDR, &PROBE_PATTERN)?;
        let mut readback = [0u8; ADDRESS_WIDTH];
        self.read_buffer(cmd::R_REGISTER | reg::TX_ADDR, &mut readback)?;
        if readback == PROBE_PATTERN {
            Ok(())
        } else {
            error!("nrf24: TX_ADDR readback mismatch");
            Err(Error::NotConnected)
        }
    }

    /// Link settings in use
    #[must_use]
    pub const fn config(&self) -> &RadioConfig {
        &self.config
    }

    /// Change the link settings; takes effect on the next [`Self::set_mode`]
    pub fn set_config(&mut self, config: RadioConfig) -> Result<(), Fault<SPI, CE>> {
        if config.payload_width == 0 || usize::from(config.payload_width) > MAX_PAYLOAD || config.channel > 125 {
            return Err(Error::OutOfRange);
        }
        self.config = config;
        Ok(())
    }

    /// Current direction, `None` in standby
    #[must_use]
    pub const fn mode(&self) -> Option<Mode> {
        self.mode
    }

    /// Program the link for `mode` and raise CE
    pub fn set_mode(&mut self, mode: Mode) -> Result<(), Fault<SPI, CE>> {
        let config = self.config;
        self.ce_low()?;

        if mode == Mode::Tx {
            self.write_buffer(cmd::W_REGISTER | reg::TX_ADDR, &config.address)?;
        }
        self.write_buffer(cmd::W_REGISTER | reg::RX_ADDR_P0, &config.address)?;
        self.write_register(reg::EN_AA, PIPE0)?;
        self.write_register(reg::EN_RXADDR, PIPE0)?;

        let mut config_reg = config_bits::PWR_UP | config_bits::EN_CRC | config_bits::CRCO;
        match mode {
            Mode::Tx => {
                self.write_register(reg::SETUP_RETR, config.setup_retr())?;
                self.write_register(reg::RF_CH, config.channel)?;
            }
            Mode::Rx => {
                self.write_register(reg::RF_CH, config.channel)?;
                self.write_register(reg::RX_PW_P0, config.payload_width)?;
                config_reg |= config_bits::PRIM_RX;
            }
        }
        self.write_register(reg::RF_SETUP, config.rf_setup())?;
        self.write_register(reg::CONFIG, config_reg)?;

        self.ce_high()?;
        self.mode = Some(mode);
        info!("nrf24: {} on channel {=u8}", mode, config.channel);
        Ok(())
    }

    /// Send one payload and wait for the outcome
    ///
    /// The payload must be exactly the configured width. Fails with
    /// [`Error::MaxRetransmits`] when no acknowledgment arrived and
    /// [`Error::Timeout`] when IRQ never fired.
    pub fn transmit(&mut self, payload: &[u8]) -> Result<(), Fault<SPI, CE>> {
        if self.mode != Some(Mode::Tx) {
            return Err(Error::ModeMismatch);
        }
        if payload.len() != usize::from(self.config.payload_width) {
            return Err(Error::InvalidLength);
        }

        self.ce_low()?;
        self.write_buffer(cmd::W_TX_PAYLOAD, payload)?;
        self.ce_high()?;

        self.wait_irq()?;
        let flags = self.clear_interrupts()?;
        if flags & status::MAX_RT != 0 {
            self.flush_tx()?;
            warn!("nrf24: max retransmits");
            return Err(Error::MaxRetransmits);
        }
        if flags & status::TX_DS != 0 {
            return Ok(());
        }
        Err(Error::Timeout)
    }

    /// Read a payload if one arrived
    ///
    /// Returns the payload length, or `None` when RX_DR was not set.
    /// `buffer` must hold at least the configured payload width.
    pub fn receive(&mut self, buffer: &mut [u8]) -> Result<Option<usize>, Fault<SPI, CE>> {
        let width = usize::from(self.config.payload_width);
        if buffer.len() < width {
            return Err(Error::InvalidLength);
        }

        let flags = self.clear_interrupts()?;
        if flags & status::RX_DR == 0 {
            return Ok(None);
        }
        self.read_buffer(cmd::R_RX_PAYLOAD, &mut buffer[..width])?;
        self.flush_rx()?;
        Ok(Some(width))
    }

    /// Service the IRQ line: clear the flags and report what happened
    pub fn handle_irq(&mut self) -> Result<IrqEvents, Fault<SPI, CE>> {
        let events = IrqEvents::from_status(self.clear_interrupts()?);
        if events.max_retransmits {
            self.flush_tx()?;
        }
        trace!("nrf24: irq {}", events);
        Ok(events)
    }

    /// Whether the IRQ line is asserted
    pub fn irq_pending(&mut self) -> Result<bool, Fault<SPI, CE>> {
        self.irq.is_low().map_err(|e| Error::Bus(BusError::Pin(e)))
    }

    /// Read STATUS with a NOP
    pub fn status(&mut self) -> Result<u8, Fault<SPI, CE>> {
        self.command(cmd::NOP)
    }

    /// Drop everything in the TX FIFO
    pub fn flush_tx(&mut self) -> Result<(), Fault<SPI, CE>> {
        self.command(cmd::FLUSH_TX).map(|_| ())
    }

    /// Drop everything in the RX FIFO
    pub fn flush_rx(&mut self) -> Result<(), Fault<SPI, CE>> {
        self.command(cmd::FLUSH_RX).map(|_| ())
    }

    /// Read a single-byte register
    pub fn read_register(&mut self, addr: u8) -> Result<u8, Fault<SPI, CE>> {
        let mut frame = [cmd::R_REGISTER | (addr & 0x1F), cmd::NOP];
        self.transfer(&mut frame)?;
        Ok(frame[1])
    }

    /// Write a single-byte register, returning STATUS
    pub fn write_register(&mut self, addr: u8, value: u8) -> Result<u8, Fault<SPI, CE>> {
        let mut frame = [cmd::W_REGISTER | (addr & 0x1F), value];
        self.transfer(&mut frame)?;
        Ok(frame[0])
    }

    /// Give the peripherals back
    pub fn release(self) -> (SPI, CE, IRQ, D) {
        (self.spi, self.ce, self.irq, self.delay)
    }

    /// Read STATUS and write the interrupt flags back to clear them
    fn clear_interrupts(&mut self) -> Result<u8, Fault<SPI, CE>> {
        let flags = self.read_register(reg::STATUS)?;
        self.write_register(reg::STATUS, flags & status::IRQ_MASK)?;
        Ok(flags)
    }

    fn wait_irq(&mut self) -> Result<(), Fault<SPI, CE>> {
        for _ in 0..NRF24_IRQ_POLL_LIMIT {
            if self.irq_pending()? {
                return Ok(());
            }
            self.delay.delay_us(NRF24_IRQ_POLL_US);
        }
        warn!("nrf24: IRQ wait timed out");
        Err(Error::Timeout)
    }

    fn command(&mut self, command: u8) -> Result<u8, Fault<SPI, CE>> {
        let mut frame = [command];
        self.transfer(&mut frame)?;
        Ok(frame[0])
    }

    fn write_buffer(&mut self, command: u8, data: &[u8]) -> Result<u8, Fault<SPI, CE>> {
        let len = data.len().min(MAX_PAYLOAD);
        let mut frame = [0u8; MAX_PAYLOAD + 1];
        frame[0] = command;
        frame[1..=len].copy_from_slice(&data[..len]);
        self.transfer(&mut frame[..=len])?;
        Ok(frame[0])
    }

    fn read_buffer(&mut self, command: u8, out: &mut [u8]) -> Result<u8, Fault<SPI, CE>> {
        let len = out.len().min(MAX_PAYLOAD);
        let mut frame = [cmd::NOP; MAX_PAYLOAD + 1];
        frame[0] = command;
        self.transfer(&mut frame[..=len])?;
        out[..len].copy_from_slice(&frame[1..=len]);
        Ok(frame[0])
    }

    fn transfer(&mut self, frame: &mut [u8]) -> Result<(), Fault<SPI, CE>> {
        self.spi.transfer_in_place(frame).map_err(|e| Error::Bus(BusError::Spi(e)))
    }

    fn ce_high(&mut self) -> Result<(), Fault<SPI, CE>> {
        self.ce.set_high().map_err(|e| Error::Bus(BusError::Pin(e)))
    }

    fn ce_low(&mut self) -> Result<(), Fault<SPI, CE>> {
        self.ce.set_low().map_err(|e| Error::Bus(BusError::Pin(e)))
    }
}
