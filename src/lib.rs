//! # vcpu
//!
//! A minimal 16-bit virtual CPU.
//!
//! Ten 16-bit registers, byte-addressed memory and a six-instruction set,
//! driven one fetch-decode-execute step at a time. Small enough to read in
//! one sitting, shaped like the engines inside real emulators and bytecode
//! interpreters.

pub mod cpu;
pub mod asm;
pub mod config;

#[cfg(feature = "tui")]
pub mod tui;

// Re-export commonly used types
pub use cpu::{Cpu, CpuError, Step, Memory, AddressSpace, Registers, RegisterError, Instruction, Opcode};
pub use asm::{assemble, disassemble, AssemblerError, ProgramImage, load_image, save_image};
pub use config::{MachineConfig, ConfigError};

#[cfg(feature = "tui")]
pub use tui::run_debugger;
