//! Byte-addressable memory.
//!
//! A flat, zero-initialised buffer with a capacity fixed at creation.
//! 16-bit values are stored big-endian.

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Largest memory the 16-bit address space can reach.
pub const MAX_MEMORY_SIZE: usize = 0x1_0000;

/// The capability the CPU needs from memory.
///
/// Every access is bounds-checked and reports [`MemoryError`] instead of
/// panicking.
pub trait AddressSpace {
    /// Number of addressable bytes.
    fn capacity(&self) -> usize;

    fn get_u8(&self, addr: u16) -> Result<u8, MemoryError>;

    fn set_u8(&mut self, addr: u16, value: u8) -> Result<(), MemoryError>;

    /// Read a big-endian 16-bit value. A word never wraps from 0xFFFF to 0.
    fn get_u16(&self, addr: u16) -> Result<u16, MemoryError> {
        let hi = self.get_u8(addr)?;
        let lo = self.get_u8(second_byte(addr)?)?;
        Ok(u16::from_be_bytes([hi, lo]))
    }

    /// Write a big-endian 16-bit value.
    fn set_u16(&mut self, addr: u16, value: u16) -> Result<(), MemoryError> {
        let [hi, lo] = value.to_be_bytes();
        let next = second_byte(addr)?;
        // Check both bytes first so a failing write leaves memory untouched.
        self.get_u8(next)?;
        self.set_u8(addr, hi)?;
        self.set_u8(next, lo)
    }
}

fn second_byte(addr: u16) -> Result<u16, MemoryError> {
    addr.checked_add(1).ok_or(MemoryError::WordOverflow { addr })
}

/// Flat byte memory.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memory {
    bytes: Vec<u8>,
}

impl Memory {
    /// Create a zeroed memory of `size` bytes.
    ///
    /// # Panics
    /// Panics if `size` exceeds the 16-bit address space.
    pub fn new(size: usize) -> Self {
        assert!(
            size <= MAX_MEMORY_SIZE,
            "Memory size {} exceeds the 16-bit address space ({})",
            size, MAX_MEMORY_SIZE
        );
        Self { bytes: vec![0; size] }
    }

    /// Number of bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Read a byte by offset.
    ///
    /// # Panics
    /// Panics if offset is out of range.
    #[inline]
    pub fn read_u8(&self, offset: usize) -> u8 {
        assert!(offset < self.bytes.len(), "Memory offset {} out of range (0-{})", offset, self.bytes.len().saturating_sub(1));
        self.bytes[offset]
    }

    /// Write a byte by offset.
    ///
    /// # Panics
    /// Panics if offset is out of range.
    #[inline]
    pub fn write_u8(&mut self, offset: usize, value: u8) {
        assert!(offset < self.bytes.len(), "Memory offset {} out of range (0-{})", offset, self.bytes.len().saturating_sub(1));
        self.bytes[offset] = value;
    }

    /// Read a big-endian word by offset.
    ///
    /// # Panics
    /// Panics if either byte is out of range.
    #[inline]
    pub fn read_u16(&self, offset: usize) -> u16 {
        u16::from_be_bytes([self.read_u8(offset), self.read_u8(offset + 1)])
    }

    /// Write a big-endian word by offset.
    ///
    /// # Panics
    /// Panics if either byte is out of range.
    #[inline]
    pub fn write_u16(&mut self, offset: usize, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        self.write_u8(offset, hi);
        self.write_u8(offset + 1, lo);
    }

    /// Zero every byte.
    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    /// Copy a program image into memory starting at `start`.
    pub fn load(&mut self, start: u16, image: &[u8]) -> Result<(), MemoryError> {
        let start = start as usize;
        let available = self.bytes.len().saturating_sub(start);
        if image.len() > available {
            return Err(MemoryError::ImageTooLarge {
                size: image.len(),
                available,
            });
        }

        self.bytes[start..start + image.len()].copy_from_slice(image);
        log::debug!("loaded {} bytes at 0x{:04X}", image.len(), start);
        Ok(())
    }

    /// A window of bytes for inspection, clipped to capacity.
    pub fn dump(&self, start: usize, count: usize) -> &[u8] {
        let start = start.min(self.bytes.len());
        let end = start.saturating_add(count).min(self.bytes.len());
        &self.bytes[start..end]
    }

    /// Format a window as hex-dump lines of 16 bytes.
    pub fn hex_dump(&self, start: usize, count: usize) -> Vec<String> {
        let start = start.min(self.bytes.len());
        self.dump(start, count)
            .chunks(16)
            .enumerate()
            .map(|(row, chunk)| {
                let bytes: Vec<String> = chunk.iter().map(|b| format!("{:02X}", b)).collect();
                format!("{:04X}: {}", start + row * 16, bytes.join(" "))
            })
            .collect()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl AddressSpace for Memory {
    fn capacity(&self) -> usize {
        self.bytes.len()
    }

    fn get_u8(&self, addr: u16) -> Result<u8, MemoryError> {
        self.bytes
            .get(addr as usize)
            .copied()
            .ok_or(MemoryError::AddressOutOfRange { addr, capacity: self.bytes.len() })
    }

    fn set_u8(&mut self, addr: u16, value: u8) -> Result<(), MemoryError> {
        let capacity = self.bytes.len();
        let cell = self.bytes
            .get_mut(addr as usize)
            .ok_or(MemoryError::AddressOutOfRange { addr, capacity })?;
        *cell = value;
        Ok(())
    }
}

/// Lend memory to a CPU without giving up ownership.
impl<M: AddressSpace + ?Sized> AddressSpace for &mut M {
    fn capacity(&self) -> usize {
        (**self).capacity()
    }

    fn get_u8(&self, addr: u16) -> Result<u8, MemoryError> {
        (**self).get_u8(addr)
    }

    fn set_u8(&mut self, addr: u16, value: u8) -> Result<(), MemoryError> {
        (**self).set_u8(addr, value)
    }

    fn get_u16(&self, addr: u16) -> Result<u16, MemoryError> {
        (**self).get_u16(addr)
    }

    fn set_u16(&mut self, addr: u16, value: u16) -> Result<(), MemoryError> {
        (**self).set_u16(addr, value)
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Only count non-zero bytes
        let non_zero = self.bytes.iter().filter(|b| **b != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_bytes", &non_zero)
            .field("capacity", &self.bytes.len())
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("memory address 0x{addr:04X} out of range (capacity {capacity} bytes)")]
    AddressOutOfRange { addr: u16, capacity: usize },

    #[error("word at 0x{addr:04X} runs past the end of the 16-bit address space")]
    WordOverflow { addr: u16 },

    #[error("image size {size} exceeds available space {available}")]
    ImageTooLarge { size: usize, available: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_read_write() {
        let mut mem = Memory::new(256);
        mem.set_u8(10, 0x42).unwrap();
        assert_eq!(mem.get_u8(10).unwrap(), 0x42);
        assert_eq!(mem.read_u8(10), 0x42);
    }

    #[test]
    fn test_u16_is_big_endian() {
        let mut mem = Memory::new(256);
        mem.set_u16(0x10, 0x1234).unwrap();
        assert_eq!(mem.read_u8(0x10), 0x12);
        assert_eq!(mem.read_u8(0x11), 0x34);
        assert_eq!(mem.get_u16(0x10).unwrap(), 0x1234);

        mem.write_u16(0x20, 0xABCD);
        assert_eq!(mem.get_u16(0x20).unwrap(), 0xABCD);
    }

    #[test]
    fn test_memory_bounds() {
        let mut mem = Memory::new(16);

        assert!(mem.get_u8(15).is_ok());
        assert_eq!(
            mem.get_u8(16),
            Err(MemoryError::AddressOutOfRange { addr: 16, capacity: 16 })
        );
        // Second byte of the word is past the end
        assert!(mem.get_u16(15).is_err());
        assert!(mem.set_u16(15, 0xFFFF).is_err());
        assert_eq!(mem.read_u8(15), 0, "failed write must not touch memory");
    }

    #[test]
    fn test_word_at_top_of_address_space() {
        let mut mem = Memory::new(MAX_MEMORY_SIZE);
        mem.write_u8(0, 0x77);
        mem.write_u8(0xFFFF, 0x11);

        assert_eq!(mem.get_u8(0xFFFF).unwrap(), 0x11);
        assert_eq!(mem.get_u16(0xFFFF), Err(MemoryError::WordOverflow { addr: 0xFFFF }));
        assert_eq!(mem.set_u16(0xFFFF, 0xABCD), Err(MemoryError::WordOverflow { addr: 0xFFFF }));
        assert_eq!(mem.read_u8(0xFFFF), 0x11);
        assert_eq!(mem.read_u8(0), 0x77);

        assert!(mem.set_u16(0xFFFE, 0xABCD).is_ok());
        assert_eq!(mem.get_u16(0xFFFE).unwrap(), 0xABCD);
    }

    #[test]
    fn test_load_image() {
        let mut mem = Memory::new(8);
        mem.load(2, &[1, 2, 3]).unwrap();
        assert_eq!(mem.dump(0, 8), &[0, 0, 1, 2, 3, 0, 0, 0]);

        assert_eq!(
            mem.load(6, &[1, 2, 3]),
            Err(MemoryError::ImageTooLarge { size: 3, available: 2 })
        );
    }

    #[test]
    fn test_hex_dump() {
        let mut mem = Memory::new(32);
        mem.write_u8(0x11, 0xFF);
        let lines = mem.hex_dump(0x10, 4);
        assert_eq!(lines, vec!["0010: 00 FF 00 00".to_string()]);
    }

    #[test]
    fn test_borrowed_memory_is_an_address_space() {
        fn poke<A: AddressSpace>(mut space: A) {
            space.set_u16(0, 0xBEEF).unwrap();
        }

        let mut mem = Memory::new(4);
        poke(&mut mem);
        assert_eq!(mem.read_u16(0), 0xBEEF);
    }
}
