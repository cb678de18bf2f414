//! CPU emulation.
//!
//! This module implements the virtual machine:
//! - a flat byte memory with big-endian 16-bit access
//! - 10 registers: ip, acc, r1..r8
//! - a 6-instruction set with register, literal and memory operands

pub mod memory;
pub mod registers;
pub mod decode;
pub mod execute;

pub use memory::{AddressSpace, Memory, MemoryError};
pub use registers::{Registers, RegisterError, RegisterValue};
pub use decode::{Instruction, Opcode, DecodeError};
pub use execute::{Cpu, CpuError, Step};
