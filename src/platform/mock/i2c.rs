//! Mock I2C implementation for testing
//!
//! Besides recording transactions, the mock behaves like a register-addressed
//! device set: the first byte of a write selects the register offset, the rest
//! lands in a per-slave register map with auto-increment.

use crate::platform::{
    error::{I2cError, PlatformError},
    traits::{i2c::MAX_FREQUENCY, I2cConfig, I2cInterface},
    Result,
};
use core::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;
use std::vec::Vec;

/// I2C transaction type for logging
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum I2cTransaction {
    /// Write transaction
    Write { addr: u8, data: Vec<u8> },
    /// Read transaction
    Read { addr: u8, len: usize },
    /// Write-Read transaction
    WriteRead {
        addr: u8,
        write_data: Vec<u8>,
        read_len: usize,
    },
}

impl I2cTransaction {
    /// Target slave address
    pub fn addr(&self) -> u8 {
        match self {
            I2cTransaction::Write { addr, .. }
            | I2cTransaction::Read { addr, .. }
            | I2cTransaction::WriteRead { addr, .. } => *addr,
        }
    }

    /// Register offset selected by the transaction, if any
    pub fn offset(&self) -> Option<u8> {
        match self {
            I2cTransaction::Write { data, .. } => data.first().copied(),
            I2cTransaction::WriteRead { write_data, .. } => write_data.first().copied(),
            I2cTransaction::Read { .. } => None,
        }
    }
}

#[derive(Debug, Default)]
struct MockI2cState {
    frequency: u32,
    transactions: Vec<I2cTransaction>,
    registers: BTreeMap<(u8, u8), u8>,
    queued: BTreeMap<(u8, u8), VecDeque<Vec<u8>>>,
    self_clearing: BTreeMap<(u8, u8), u8>,
    fifo: Option<(u8, u8)>,
    fifo_data: Vec<u8>,
    read_data: Vec<u8>,
    failing: Vec<(u8, Option<u8>)>,
    fail_after: Option<usize>,
    completed: usize,
}

impl MockI2cState {
    fn should_fail(&self, addr: u8, offset: Option<u8>) -> bool {
        if let Some(limit) = self.fail_after {
            if self.completed >= limit {
                return true;
            }
        }
        self.failing.iter().any(|&(a, o)| {
            a == addr
                && match o {
                    None => true,
                    Some(o) => Some(o) == offset,
                }
        })
    }

    fn store(&mut self, addr: u8, offset: u8, values: &[u8]) {
        if self.fifo == Some((addr, offset)) {
            self.fifo_data.extend_from_slice(values);
            return;
        }
        for (i, &value) in values.iter().enumerate() {
            let reg = offset.wrapping_add(i as u8);
            let mask = self.self_clearing.get(&(addr, reg)).copied().unwrap_or(0);
            self.registers.insert((addr, reg), value & !mask);
        }
    }

    fn load(&mut self, addr: u8, offset: u8, buffer: &mut [u8]) {
        buffer.fill(0);
        if let Some(chunk) = self
            .queued
            .get_mut(&(addr, offset))
            .and_then(|queue| queue.pop_front())
        {
            let n = core::cmp::min(buffer.len(), chunk.len());
            buffer[..n].copy_from_slice(&chunk[..n]);
            return;
        }
        for (i, byte) in buffer.iter_mut().enumerate() {
            let reg = offset.wrapping_add(i as u8);
            *byte = self.registers.get(&(addr, reg)).copied().unwrap_or(0);
        }
    }
}

/// Mock I2C implementation
///
/// Records all transactions for test verification and allows
/// pre-programming register contents, queued reads and bus failures.
/// Clones share state, so a test can keep a clone after handing the bus to a driver.
#[derive(Debug, Clone)]
pub struct MockI2c {
    state: Rc<RefCell<MockI2cState>>,
}

impl MockI2c {
    /// Create a new mock I2C
    pub fn new(config: I2cConfig) -> Self {
        let state = MockI2cState {
            frequency: config.frequency,
            ..Default::default()
        };
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    /// Get transaction log (for test verification)
    pub fn transactions(&self) -> Vec<I2cTransaction> {
        self.state.borrow().transactions.clone()
    }

    /// Number of transactions attempted so far
    pub fn transaction_count(&self) -> usize {
        self.state.borrow().transactions.len()
    }

    /// Clear transaction log
    pub fn clear_transactions(&self) {
        self.state.borrow_mut().transactions.clear();
    }

    /// Current register value
    pub fn register(&self, addr: u8, offset: u8) -> u8 {
        self.state
            .borrow()
            .registers
            .get(&(addr, offset))
            .copied()
            .unwrap_or(0)
    }

    /// Preload a register value
    pub fn set_register(&self, addr: u8, offset: u8, value: u8) {
        self.state
            .borrow_mut()
            .registers
            .insert((addr, offset), value);
    }

    /// Queue a one-shot response for the next register read at `offset`
    ///
    /// Queued responses take precedence over the register map and are consumed in order.
    pub fn queue_read(&self, addr: u8, offset: u8, data: &[u8]) {
        self.state
            .borrow_mut()
            .queued
            .entry((addr, offset))
            .or_default()
            .push_back(data.to_vec());
    }

    /// Bits in `mask` clear themselves right after being written (hardware "go" bits)
    pub fn set_self_clearing(&self, addr: u8, offset: u8, mask: u8) {
        self.state
            .borrow_mut()
            .self_clearing
            .insert((addr, offset), mask);
    }

    /// Route writes at `offset` into a FIFO sink instead of the register map
    pub fn set_fifo(&self, addr: u8, offset: u8) {
        self.state.borrow_mut().fifo = Some((addr, offset));
    }

    /// Bytes collected by the FIFO sink
    pub fn fifo_data(&self) -> Vec<u8> {
        self.state.borrow().fifo_data.clone()
    }

    /// Number of bytes collected by the FIFO sink
    pub fn fifo_len(&self) -> usize {
        self.state.borrow().fifo_data.len()
    }

    /// Clear the FIFO sink
    pub fn clear_fifo(&self) {
        self.state.borrow_mut().fifo_data.clear();
    }

    /// Set data to return for plain read operations
    pub fn set_read_data(&self, data: &[u8]) {
        self.state.borrow_mut().read_data = data.to_vec();
    }

    /// Fail every transaction that selects `offset` on `addr`
    pub fn fail_register(&self, addr: u8, offset: u8) {
        self.state.borrow_mut().failing.push((addr, Some(offset)));
    }

    /// Fail every transaction addressed to `addr`
    pub fn fail_address(&self, addr: u8) {
        self.state.borrow_mut().failing.push((addr, None));
    }

    /// Fail every transaction once `count` transactions have succeeded
    pub fn fail_after(&self, count: usize) {
        let mut state = self.state.borrow_mut();
        state.fail_after = Some(state.completed + count);
    }

    /// Remove all failure injections
    pub fn clear_failures(&self) {
        let mut state = self.state.borrow_mut();
        state.failing.clear();
        state.fail_after = None;
    }

    /// Get current frequency
    pub fn frequency(&self) -> u32 {
        self.state.borrow().frequency
    }
}

impl Default for MockI2c {
    fn default() -> Self {
        Self::new(I2cConfig::default())
    }
}

impl I2cInterface for MockI2c {
    fn write(&mut self, addr: u8, data: &[u8]) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.transactions.push(I2cTransaction::Write {
            addr,
            data: data.to_vec(),
        });

        let offset = data.first().copied();
        if state.should_fail(addr, offset) {
            return Err(PlatformError::I2c(I2cError::Nack));
        }
        if let Some((&offset, values)) = data.split_first() {
            state.store(addr, offset, values);
        }
        state.completed += 1;
        Ok(())
    }

    fn read(&mut self, addr: u8, buffer: &mut [u8]) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.transactions.push(I2cTransaction::Read {
            addr,
            len: buffer.len(),
        });

        if state.should_fail(addr, None) {
            return Err(PlatformError::I2c(I2cError::Nack));
        }
        let to_read = core::cmp::min(buffer.len(), state.read_data.len());
        buffer[..to_read].copy_from_slice(&state.read_data[..to_read]);
        state.read_data.drain(..to_read);
        state.completed += 1;
        Ok(())
    }

    fn write_read(
        &mut self,
        addr: u8,
        write_data: &[u8],
        read_buffer: &mut [u8],
    ) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.transactions.push(I2cTransaction::WriteRead {
            addr,
            write_data: write_data.to_vec(),
            read_len: read_buffer.len(),
        });

        let offset = write_data.first().copied();
        if state.should_fail(addr, offset) {
            return Err(PlatformError::I2c(I2cError::Nack));
        }
        state.load(addr, offset.unwrap_or(0), read_buffer);
        state.completed += 1;
        Ok(())
    }

    fn set_frequency(&mut self, frequency: u32) -> Result<()> {
        if frequency == 0 || frequency > MAX_FREQUENCY {
            return Err(PlatformError::InvalidConfig);
        }
        self.state.borrow_mut().frequency = frequency;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_i2c_write_updates_register_map() {
        let mut i2c = MockI2c::default();
        i2c.write(0x3F, &[0x10, 0xAA, 0xBB]).unwrap();

        assert_eq!(i2c.register(0x3F, 0x10), 0xAA);
        assert_eq!(i2c.register(0x3F, 0x11), 0xBB);
        assert_eq!(
            i2c.transactions()[0],
            I2cTransaction::Write {
                addr: 0x3F,
                data: vec![0x10, 0xAA, 0xBB]
            }
        );
    }

    #[test]
    fn test_mock_i2c_queued_read_precedes_register_map() {
        let mut i2c = MockI2c::default();
        i2c.set_register(0x3F, 0x05, 0x11);
        i2c.queue_read(0x3F, 0x05, &[0x80]);

        let mut buf = [0u8; 1];
        i2c.write_read(0x3F, &[0x05], &mut buf).unwrap();
        assert_eq!(buf, [0x80]);

        // Queue drained, falls back to the register map
        i2c.write_read(0x3F, &[0x05], &mut buf).unwrap();
        assert_eq!(buf, [0x11]);
    }

    #[test]
    fn test_mock_i2c_read() {
        let mut i2c = MockI2c::default();
        i2c.set_read_data(&[0xAA, 0xBB, 0xCC]);

        let mut buffer = [0u8; 3];
        i2c.read(0x51, &mut buffer).unwrap();

        assert_eq!(buffer, [0xAA, 0xBB, 0xCC]);
        assert_eq!(i2c.transactions()[0], I2cTransaction::Read { addr: 0x51, len: 3 });
    }

    #[test]
    fn test_mock_i2c_self_clearing_bits() {
        let mut i2c = MockI2c::default();
        i2c.set_self_clearing(0x3F, 0x22, 0x10);
        i2c.write(0x3F, &[0x22, 0x13]).unwrap();
        assert_eq!(i2c.register(0x3F, 0x22), 0x03);
    }

    #[test]
    fn test_mock_i2c_fifo_sink() {
        let mut i2c = MockI2c::default();
        i2c.set_fifo(0x2A, 0x63);
        i2c.write(0x2A, &[0x63, 1, 2, 3]).unwrap();
        i2c.write(0x2A, &[0x63, 4]).unwrap();

        assert_eq!(i2c.fifo_data(), vec![1, 2, 3, 4]);
        assert_eq!(i2c.register(0x2A, 0x64), 0);
    }

    #[test]
    fn test_mock_i2c_failure_injection() {
        let mut i2c = MockI2c::default();
        let observer = i2c.clone();
        observer.fail_register(0x3F, 0x05);

        let mut buf = [0u8; 1];
        assert_eq!(
            i2c.write_read(0x3F, &[0x05], &mut buf),
            Err(PlatformError::I2c(I2cError::Nack))
        );
        assert!(i2c.write_read(0x3F, &[0x06], &mut buf).is_ok());
        assert_eq!(observer.transaction_count(), 2);

        observer.clear_failures();
        observer.fail_after(1);
        assert!(i2c.write(0x3F, &[0x00, 0x00]).is_ok());
        assert!(i2c.write(0x3F, &[0x00, 0x00]).is_err());
    }

    #[test]
    fn test_mock_i2c_set_frequency() {
        let mut i2c = MockI2c::new(I2cConfig::default());
        assert_eq!(i2c.frequency(), 200_000);

        i2c.set_frequency(400_000).unwrap();
        assert_eq!(i2c.frequency(), 400_000);

        assert_eq!(i2c.set_frequency(1_000_000), Err(PlatformError::InvalidConfig));
        assert_eq!(i2c.frequency(), 400_000);
    }
}
