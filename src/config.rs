//! Machine configuration.
//!
//! Settings come from built-in defaults, optionally replaced by a JSON file,
//! then overridden by command line flags. Missing keys in the file keep
//! their default.
//!
//! ```json
//! { "memory_size": 256, "entry": 0, "max_steps": 10000, "strict_opcodes": false }
//! ```

use std::path::Path;
use crate::cpu::memory::MAX_MEMORY_SIZE;
use crate::cpu::{Cpu, Memory};
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// How to build and drive a machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MachineConfig {
    /// Memory capacity in bytes.
    pub memory_size: usize,
    /// Load address of the program image and initial `ip`.
    pub entry: u16,
    /// Step budget for `run`.
    pub max_steps: u64,
    /// Fault on unrecognised opcodes instead of skipping them.
    pub strict_opcodes: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            memory_size: 256,
            entry: 0,
            max_steps: 10_000,
            strict_opcodes: false,
        }
    }
}

impl MachineConfig {
    /// Load from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_json(&text)
    }

    /// Parse and validate a JSON document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory_size == 0 || self.memory_size > MAX_MEMORY_SIZE {
            return Err(ConfigError::InvalidMemorySize(self.memory_size));
        }
        if self.entry as usize >= self.memory_size {
            return Err(ConfigError::EntryOutOfRange {
                entry: self.entry,
                memory_size: self.memory_size,
            });
        }
        Ok(())
    }

    /// Build a CPU with `image` loaded at the entry point and `ip` set to it.
    pub fn build(&self, image: &[u8]) -> Result<Cpu, ConfigError> {
        self.validate()?;

        let mut mem = Memory::new(self.memory_size);
        mem.load(self.entry, image)
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        let mut cpu = Cpu::new(mem).with_strict_opcodes(self.strict_opcodes);
        cpu.set_register("ip", self.entry)
            .map_err(|e| ConfigError::Load(e.to_string()))?;
        Ok(cpu)
    }

    /// True once `ip` has left an image of `image_len` bytes loaded at the
    /// entry point. Drivers treat this as the end of the program.
    pub fn left_image(&self, image_len: usize, ip: u16) -> bool {
        let ip = ip as usize;
        let entry = self.entry as usize;
        ip < entry || ip >= entry + image_len
    }
}

/// Errors from loading or applying a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("invalid config: {0}")]
    ParseError(String),

    #[error("memory size {0} must be between 1 and 65536")]
    InvalidMemorySize(usize),

    #[error("entry point 0x{entry:04X} is outside memory of {memory_size} bytes")]
    EntryOutOfRange { entry: u16, memory_size: usize },

    #[error("failed to load program: {0}")]
    Load(String),
}
