//! Program image files.
//!
//! A program image is positional machine code: no header, no relocation,
//! no symbols. Three on-disk forms are understood, chosen by extension:
//! - `.asm`: assembler source, assembled on load
//! - `.hex`: text, whitespace-separated hex bytes, `;` starts a comment
//! - anything else: raw binary

use std::path::Path;
use crate::asm::assembler::{assemble, AssemblerError};
use thiserror::Error;

/// A loaded program image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramImage {
    /// The machine code, addressed from the load point.
    pub bytes: Vec<u8>,
}

impl ProgramImage {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Number of bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Parse the hex text form.
    pub fn from_hex(text: &str) -> Result<Self, ImageError> {
        let mut bytes = Vec::new();

        for (line_num, line) in text.lines().enumerate() {
            let line = match line.find(';') {
                Some(idx) => &line[..idx],
                None => line,
            };

            for token in line.split_whitespace() {
                let digits = token.strip_prefix("0x").unwrap_or(token);
                let byte = u8::from_str_radix(digits, 16).map_err(|_| ImageError::ParseError {
                    line: line_num + 1,
                    message: format!("'{}' is not a hex byte", token),
                })?;
                bytes.push(byte);
            }
        }

        Ok(Self { bytes })
    }

    /// Render the hex text form, 16 bytes per line with an address comment.
    pub fn to_hex(&self) -> String {
        let mut out = String::new();
        out.push_str("; vcpu program image\n");
        out.push_str(&format!("; {} bytes\n\n", self.bytes.len()));

        for (row, chunk) in self.bytes.chunks(16).enumerate() {
            let line: Vec<String> = chunk.iter().map(|b| format!("{:02X}", b)).collect();
            out.push_str(&format!("{} ; {:04X}\n", line.join(" "), row * 16));
        }

        out
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Load a program image from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<ProgramImage, ImageError> {
    let path = path.as_ref();

    let image = match extension(path).as_deref() {
        Some("asm") => {
            let source = std::fs::read_to_string(path)
                .map_err(|e| ImageError::IoError(e.to_string()))?;
            ProgramImage::new(assemble(&source)?)
        }
        Some("hex") => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| ImageError::IoError(e.to_string()))?;
            ProgramImage::from_hex(&text)?
        }
        _ => {
            let bytes = std::fs::read(path)
                .map_err(|e| ImageError::IoError(e.to_string()))?;
            ProgramImage::new(bytes)
        }
    };

    log::debug!("loaded {} byte image from {}", image.len(), path.display());
    Ok(image)
}

/// Save a program image to disk. `.hex` writes text, anything else raw bytes.
pub fn save_image<P: AsRef<Path>>(path: P, image: &ProgramImage) -> Result<(), ImageError> {
    let path = path.as_ref();

    let result = match extension(path).as_deref() {
        Some("hex") => std::fs::write(path, image.to_hex()),
        Some("asm") => return Err(ImageError::UnsupportedFormat(path.display().to_string())),
        _ => std::fs::write(path, &image.bytes),
    };

    result.map_err(|e| ImageError::IoError(e.to_string()))
}

/// Errors that can occur while loading or saving images.
#[derive(Debug, Clone, Error)]
pub enum ImageError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("parse error on line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("assembly error: {0}")]
    Assembly(#[from] AssemblerError),

    #[error("cannot write an image as assembler source: {0}")]
    UnsupportedFormat(String),
}
