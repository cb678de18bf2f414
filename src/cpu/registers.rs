//! The register file.
//!
//! Ten 16-bit registers, in declared order:
//! - ip: instruction pointer (byte address of the next fetch)
//! - acc: accumulator (destination of arithmetic)
//! - r1..r8: general purpose
//!
//! Registers are reachable by name or by a numeric index. Indices taken from
//! instruction operands wrap modulo the register count, so any byte selects
//! a valid register.

use std::collections::HashMap;
use crate::cpu::memory::Memory;
use serde::Serialize;
use thiserror::Error;

/// Register names in declared (index) order.
pub const REGISTER_NAMES: [&str; 10] = [
    "ip", "acc",
    "r1", "r2", "r3", "r4",
    "r5", "r6", "r7", "r8",
];

/// Number of registers.
pub const REGISTER_COUNT: usize = REGISTER_NAMES.len();

/// Instruction pointer.
pub const IP: &str = "ip";
/// Accumulator.
pub const ACC: &str = "acc";

/// Index of `ip` in declared order.
pub const IP_INDEX: u8 = 0;
/// Index of `acc` in declared order.
pub const ACC_INDEX: u8 = 1;

/// A snapshot of one register, for dumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegisterValue {
    pub name: &'static str,
    pub value: u16,
}

/// The register file, backed by a small byte memory of two bytes per slot.
#[derive(Clone)]
pub struct Registers {
    storage: Memory,
    /// name -> byte offset into `storage`
    offsets: HashMap<&'static str, usize>,
}

impl Registers {
    /// Create a register file with every register zeroed.
    pub fn new() -> Self {
        let offsets = REGISTER_NAMES
            .iter()
            .enumerate()
            .map(|(i, name)| (*name, i * 2))
            .collect();

        Self {
            storage: Memory::new(REGISTER_COUNT * 2),
            offsets,
        }
    }

    /// Number of registers.
    pub fn len(&self) -> usize {
        REGISTER_COUNT
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Register names in index order.
    pub fn names(&self) -> &'static [&'static str] {
        &REGISTER_NAMES
    }

    /// Read a register by name.
    pub fn get(&self, name: &str) -> Result<u16, RegisterError> {
        let offset = self.offset_of(name)?;
        Ok(self.storage.read_u16(offset))
    }

    /// Write a register by name. Nothing changes if the name is unknown.
    pub fn set(&mut self, name: &str, value: u16) -> Result<(), RegisterError> {
        let offset = self.offset_of(name)?;
        self.storage.write_u16(offset, value);
        Ok(())
    }

    /// Read a register by index, wrapping modulo the register count.
    pub fn get_by_index(&self, index: u8) -> u16 {
        self.storage.read_u16(Self::wrap(index) * 2)
    }

    /// Write a register by index, wrapping modulo the register count.
    pub fn set_by_index(&mut self, index: u8, value: u16) {
        self.storage.write_u16(Self::wrap(index) * 2, value);
    }

    /// Name of the register an index resolves to.
    pub fn name_of(index: u8) -> &'static str {
        REGISTER_NAMES[Self::wrap(index)]
    }

    /// All registers as (name, value) pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = RegisterValue> + '_ {
        (0..REGISTER_COUNT).map(move |i| RegisterValue {
            name: REGISTER_NAMES[i],
            value: self.storage.read_u16(i * 2),
        })
    }

    /// Reset all registers to zero.
    pub fn reset(&mut self) {
        self.storage.clear();
    }

    #[inline]
    fn wrap(index: u8) -> usize {
        index as usize % REGISTER_COUNT
    }

    fn offset_of(&self, name: &str) -> Result<usize, RegisterError> {
        self.offsets
            .get(name)
            .copied()
            .ok_or_else(|| RegisterError::UnknownRegister(name.to_string()))
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for reg in self.iter() {
            map.entry(&reg.name, &format_args!("0x{:04X}", reg.value));
        }
        map.finish()
    }
}

/// Errors from named register access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegisterError {
    #[error("no such register '{0}'")]
    UnknownRegister(String),
}
