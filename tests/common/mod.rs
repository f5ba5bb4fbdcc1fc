//! Host-side fakes shared by the integration tests
//!
//! - [`Wire`] hands out [`FakePin`]s that log every level change into one
//!   shared trace, so a test can decode what a bit-banged driver clocked out
//! - [`FakeI2c`] is an async I2C bus backed by a register file
//! - [`FakeUart`] is an in-memory `embedded-io` UART
//! - [`FakeDelay`] counts requested delay time

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::rc::Rc;

// =============================================================================
// GPIO
// =============================================================================

/// Shared trace of `(pin id, level)` events
pub type Trace = Rc<RefCell<Vec<(u8, bool)>>>;

/// Factory for pins that share one trace
#[derive(Clone, Default)]
pub struct Wire {
    trace: Trace,
}

impl Wire {
    pub fn new() -> Self {
        Self::default()
    }

    /// New pin starting low
    pub fn pin(&self, id: u8) -> FakePin {
        FakePin {
            id,
            trace: Rc::clone(&self.trace),
            level: Rc::new(Cell::new(false)),
        }
    }

    /// Copy of every event so far
    pub fn events(&self) -> Vec<(u8, bool)> {
        self.trace.borrow().clone()
    }

    /// Forget everything logged so far
    pub fn clear(&self) {
        self.trace.borrow_mut().clear();
    }

    /// Last level driven on `id`, `None` if never driven
    pub fn level(&self, id: u8) -> Option<bool> {
        self.trace
            .borrow()
            .iter()
            .rev()
            .find(|(pin, _)| *pin == id)
            .map(|&(_, level)| level)
    }

    /// Levels driven on `id`, in order
    pub fn history(&self, id: u8) -> Vec<bool> {
        self.trace
            .borrow()
            .iter()
            .filter(|(pin, _)| *pin == id)
            .map(|&(_, level)| level)
            .collect()
    }

    /// Number of times `id` went from low to high
    pub fn rising_edges(&self, id: u8) -> usize {
        let mut last = None;
        let mut count = 0;
        for level in self.history(id) {
            if level && last == Some(false) {
                count += 1;
            }
            last = Some(level);
        }
        count
    }

    /// Every data bit sampled as the clock left its idle level
    pub fn bits(&self, clock: u8, data: u8, clock_idle_high: bool) -> Vec<bool> {
        self.frames(clock, data, clock_idle_high, None)
            .into_iter()
            .flatten()
            .collect()
    }

    /// Data bits grouped into frames
    ///
    /// A frame ends each time `frame_end` `(pin, level)` is driven to
    /// that level; empty frames are dropped.
    pub fn frames(
        &self,
        clock: u8,
        data: u8,
        clock_idle_high: bool,
        frame_end: Option<(u8, bool)>,
    ) -> Vec<Vec<bool>> {
        let mut frames = Vec::new();
        let mut current = Vec::new();
        let mut clock_level = clock_idle_high;
        let mut data_level = false;

        for &(pin, level) in self.trace.borrow().iter() {
            if pin == data {
                data_level = level;
            }
            if pin == clock {
                if clock_level == clock_idle_high && level != clock_idle_high {
                    current.push(data_level);
                }
                clock_level = level;
            }
            if let Some((end_pin, end_level)) = frame_end {
                if pin == end_pin && level == end_level && !current.is_empty() {
                    frames.push(std::mem::take(&mut current));
                }
            }
        }
        if !current.is_empty() {
            frames.push(current);
        }
        frames
    }
}

/// Pack bits MSB first
pub fn to_word(bits: &[bool]) -> u64 {
    bits.iter().fold(0, |acc, &bit| (acc << 1) | u64::from(bit))
}

/// Pack bits MSB first into bytes; trailing partial bytes are dropped
pub fn to_bytes(bits: &[bool]) -> Vec<u8> {
    bits.chunks_exact(8).map(|chunk| to_word(chunk) as u8).collect()
}

/// Pin that records every level it is driven to
///
/// As an input it reads back the level shared through [`FakePin::handle`].
pub struct FakePin {
    id: u8,
    trace: Trace,
    level: Rc<Cell<bool>>,
}

impl FakePin {
    /// Handle for steering the level seen by `is_high`/`is_low`
    pub fn handle(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.level)
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    fn drive(&mut self, level: bool) {
        self.level.set(level);
        self.trace.borrow_mut().push((self.id, level));
    }
}

impl embedded_hal::digital::ErrorType for FakePin {
    type Error = Infallible;
}

impl embedded_hal::digital::OutputPin for FakePin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.drive(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.drive(true);
        Ok(())
    }
}

impl embedded_hal::digital::InputPin for FakePin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.level.get())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.level.get())
    }
}

// =============================================================================
// Delay
// =============================================================================

/// Delay that returns at once and adds up the requested time
#[derive(Clone, Default)]
pub struct FakeDelay {
    elapsed_ns: Rc<Cell<u64>>,
}

impl FakeDelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total requested delay in nanoseconds
    pub fn elapsed_ns(&self) -> u64 {
        self.elapsed_ns.get()
    }
}

impl embedded_hal::delay::DelayNs for FakeDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns.set(self.elapsed_ns.get() + u64::from(ns));
    }
}

impl embedded_hal_async::delay::DelayNs for FakeDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns.set(self.elapsed_ns.get() + u64::from(ns));
    }
}

// =============================================================================
// I2C
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FakeI2cError;

impl embedded_hal::i2c::Error for FakeI2cError {
    fn kind(&self) -> embedded_hal::i2c::ErrorKind {
        embedded_hal::i2c::ErrorKind::NoAcknowledge(embedded_hal::i2c::NoAcknowledgeSource::Address)
    }
}

/// State behind a [`FakeI2c`], shared with the test
#[derive(Default)]
pub struct I2cState {
    /// Register values
    pub regs: HashMap<u8, u16>,
    /// Values returned by the next reads of a register, before `regs`
    pub scripted: HashMap<u8, VecDeque<u16>>,
    /// Bits the device clears right after they are written
    pub self_clearing: HashMap<u8, u16>,
    /// Every register write, in order
    pub writes: Vec<(u8, u16)>,
    /// Every register read, in order
    pub reads: Vec<u8>,
    /// Fail every transaction
    pub fail: bool,
}

/// Async I2C device with 8- or 16-bit big-endian registers
#[derive(Clone)]
pub struct FakeI2c {
    address: u8,
    width: usize,
    pointer: u8,
    state: Rc<RefCell<I2cState>>,
}

impl FakeI2c {
    /// Device at `address` with 8-bit registers
    pub fn byte_registers(address: u8) -> Self {
        Self::with_width(address, 1)
    }

    /// Device at `address` with 16-bit registers
    pub fn word_registers(address: u8) -> Self {
        Self::with_width(address, 2)
    }

    fn with_width(address: u8, width: usize) -> Self {
        Self {
            address,
            width,
            pointer: 0,
            state: Rc::new(RefCell::new(I2cState::default())),
        }
    }

    pub fn state(&self) -> Rc<RefCell<I2cState>> {
        Rc::clone(&self.state)
    }

    pub fn set(&self, reg: u8, value: u16) {
        self.state.borrow_mut().regs.insert(reg, value);
    }

    pub fn get(&self, reg: u8) -> u16 {
        self.state.borrow().regs.get(&reg).copied().unwrap_or(0)
    }

    pub fn script(&self, reg: u8, values: &[u16]) {
        self.state
            .borrow_mut()
            .scripted
            .entry(reg)
            .or_default()
            .extend(values.iter().copied());
    }

    pub fn self_clearing(&self, reg: u8, mask: u16) {
        self.state.borrow_mut().self_clearing.insert(reg, mask);
    }

    pub fn writes(&self) -> Vec<(u8, u16)> {
        self.state.borrow().writes.clone()
    }

    pub fn writes_to(&self, reg: u8) -> Vec<u16> {
        self.state
            .borrow()
            .writes
            .iter()
            .filter(|(r, _)| *r == reg)
            .map(|&(_, v)| v)
            .collect()
    }

    pub fn fail(&self, fail: bool) {
        self.state.borrow_mut().fail = fail;
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        let Some((&reg, data)) = bytes.split_first() else {
            return;
        };
        self.pointer = reg;
        let mut state = self.state.borrow_mut();
        for (offset, chunk) in data.chunks(self.width).enumerate() {
            let value = chunk.iter().fold(0u16, |acc, &b| (acc << 8) | u16::from(b));
            let addr = reg.wrapping_add(offset as u8);
            state.writes.push((addr, value));
            let clear = state.self_clearing.get(&addr).copied().unwrap_or(0);
            state.regs.insert(addr, value & !clear);
        }
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) {
        let mut state = self.state.borrow_mut();
        for (offset, chunk) in buffer.chunks_mut(self.width).enumerate() {
            let addr = self.pointer.wrapping_add(offset as u8);
            state.reads.push(addr);
            let scripted = state.scripted.get_mut(&addr).and_then(VecDeque::pop_front);
            let value = scripted.unwrap_or_else(|| state.regs.get(&addr).copied().unwrap_or(0));
            let bytes = value.to_be_bytes();
            let src = &bytes[2 - chunk.len()..];
            chunk.copy_from_slice(src);
        }
    }
}

impl embedded_hal_async::i2c::ErrorType for FakeI2c {
    type Error = FakeI2cError;
}

impl embedded_hal_async::i2c::I2c for FakeI2c {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [embedded_hal_async::i2c::Operation<'_>],
    ) -> Result<(), Self::Error> {
        if self.state.borrow().fail || address != self.address {
            return Err(FakeI2cError);
        }
        for op in operations {
            match op {
                embedded_hal_async::i2c::Operation::Write(bytes) => self.write_bytes(bytes),
                embedded_hal_async::i2c::Operation::Read(buffer) => self.read_bytes(buffer),
            }
        }
        Ok(())
    }
}

// =============================================================================
// UART
// =============================================================================

/// In-memory UART: reads drain `rx`, writes append to `tx`
#[derive(Default)]
pub struct FakeUart {
    pub rx: VecDeque<u8>,
    pub tx: Vec<u8>,
    pub flushes: usize,
}

impl FakeUart {
    pub fn with_input(input: &[u8]) -> Self {
        Self {
            rx: input.iter().copied().collect(),
            ..Self::default()
        }
    }

    fn take(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.rx.len());
        for slot in buf.iter_mut().take(n) {
            *slot = self.rx.pop_front().unwrap_or(0);
        }
        n
    }
}

impl embedded_io::ErrorType for FakeUart {
    type Error = embedded_io::ErrorKind;
}

impl embedded_io::Read for FakeUart {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        Ok(self.take(buf))
    }
}

impl embedded_io::Write for FakeUart {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.tx.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.flushes += 1;
        Ok(())
    }
}

impl embedded_io_async::Read for FakeUart {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        Ok(self.take(buf))
    }
}

impl embedded_io_async::Write for FakeUart {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.tx.extend_from_slice(buf);
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.flushes += 1;
        Ok(())
    }
}
