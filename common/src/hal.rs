use std::{cell::Cell, rc::Rc};

pub use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
};

use crate::{
    error::{SensorFault, StorageError},
    types::Brightness,
};

pub const DISPLAY_CELLS: usize = 4;

/// Monotonic millisecond counter. Wraps at `u32::MAX`, so callers must
/// compare timestamps with `wrapping_sub`.
pub trait Clock {
    fn now_ms(&self) -> u32;
}

#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u32>>,
}

impl ManualClock {
    pub fn new(start_ms: u32) -> Self {
        Self {
            now: Rc::new(Cell::new(start_ms)),
        }
    }

    pub fn advance(&self, ms: u32) {
        self.now.set(self.now.get().wrapping_add(ms));
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u32 {
        self.now.get()
    }
}

pub trait TemperatureSensor {
    fn read_celsius(&mut self) -> Result<i32, SensorFault>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Glyph {
    Blank,
    Degree,
    Char(char),
}

pub trait SegmentDisplay {
    fn set_glyph(&mut self, cell: usize, glyph: Glyph);

    fn show_number(&mut self, value: i32, leading_zero: bool, width: usize, start: usize);

    fn set_brightness(&mut self, level: Brightness, on: bool);

    fn clear(&mut self);

    fn show_text(&mut self, text: &str, start: usize) {
        let mut chars = text.chars();
        for cell in start..DISPLAY_CELLS {
            let glyph = match chars.next() {
                Some(' ') | None => Glyph::Blank,
                Some(c) => Glyph::Char(c),
            };
            self.set_glyph(cell, glyph);
        }
    }
}

pub trait ByteStore {
    fn read(&mut self, address: usize, buf: &mut [u8]) -> Result<(), StorageError>;

    fn write(&mut self, address: usize, bytes: &[u8]) -> Result<(), StorageError>;
}

#[derive(Debug, Clone)]
pub struct MemoryStore {
    bytes: Vec<u8>,
    writes: usize,
}

impl MemoryStore {
    /// Blank storage reads as `0xFF`, like erased EEPROM.
    pub fn new(capacity: usize) -> Self {
        Self::from_bytes(vec![0xFF; capacity])
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes, writes: 0 }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn write_count(&self) -> usize {
        self.writes
    }

    fn range(&self, address: usize, len: usize) -> Result<std::ops::Range<usize>, StorageError> {
        let end = address.saturating_add(len);
        if end > self.bytes.len() {
            return Err(StorageError::OutOfRange {
                address,
                end,
                capacity: self.bytes.len(),
            });
        }
        Ok(address..end)
    }
}

impl ByteStore for MemoryStore {
    fn read(&mut self, address: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        let range = self.range(address, buf.len())?;
        buf.copy_from_slice(&self.bytes[range]);
        Ok(())
    }

    fn write(&mut self, address: usize, bytes: &[u8]) -> Result<(), StorageError> {
        let range = self.range(address, bytes.len())?;
        self.bytes[range].copy_from_slice(bytes);
        self.writes += 1;
        Ok(())
    }
}
