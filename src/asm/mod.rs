//! Assembler, disassembler and program images.
//!
//! This module provides:
//! - A two-pass assembler (text → byte image)
//! - A disassembler (byte image → readable listing)
//! - Loading and saving images as raw binary or hex text

pub mod assembler;
pub mod disasm;
pub mod image;

pub use assembler::{assemble, AssemblerError};
pub use disasm::disassemble;
pub use image::{ProgramImage, ImageError, load_image, save_image};
