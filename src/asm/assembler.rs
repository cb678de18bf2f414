//! Two-pass assembler.
//!
//! Syntax:
//! ```text
//! ; Comment
//! loop:                       ; Define a label
//!     MOV_LIT_REG 0x0001, r2  ; literal into register
//!     MOV_MEM_REG $0100, r1   ; $ marks a hex number
//!     ADD_REG_REG r1, r2
//!     MOV_REG_MEM acc, $0100
//!     JMP_NOT_EQ 3, loop      ; labels work wherever a number does
//!
//!     ORG 0x80                ; Set origin address
//!     DB 1, 2, 0xFF           ; Define bytes
//!     DW 0x1234               ; Define big-endian words
//! ```
//!
//! Registers are written by name (`ip`, `acc`, `r1`..`r8`) or as a raw
//! index byte (`#12`), which the CPU wraps modulo the register count.

use std::collections::HashMap;
use crate::cpu::decode::{encode, Instruction, Opcode};
use crate::cpu::memory::MAX_MEMORY_SIZE;
use crate::cpu::registers::REGISTER_NAMES;
use thiserror::Error;

/// Assemble source code to a byte image starting at address 0.
///
/// Gaps left by `ORG` are zero-filled.
pub fn assemble(source: &str) -> Result<Vec<u8>, AssemblerError> {
    let mut asm = Assembler::new();
    asm.assemble(source)
}

/// A parsed source statement waiting for pass 2.
#[derive(Debug)]
enum Statement {
    Instr { op: Opcode, operands: Vec<String> },
    Bytes(Vec<String>),
    Words(Vec<String>),
}

#[derive(Debug)]
struct Item {
    line: usize,
    addr: u16,
    stmt: Statement,
}

/// The assembler state.
struct Assembler {
    /// Current address (origin).
    current_addr: usize,
    /// Symbol table (label -> address).
    symbols: HashMap<String, u16>,
    /// Statements collected in pass 1.
    items: Vec<Item>,
    /// One past the highest byte emitted.
    end: usize,
}

impl Assembler {
    fn new() -> Self {
        Self {
            current_addr: 0,
            symbols: HashMap::new(),
            items: Vec::new(),
            end: 0,
        }
    }

    fn assemble(&mut self, source: &str) -> Result<Vec<u8>, AssemblerError> {
        // Pass 1: collect labels and lay out addresses
        for (line_num, line) in source.lines().enumerate() {
            self.process_line(line, line_num + 1)?;
        }

        // Pass 2: resolve operands and emit
        let mut output = vec![0u8; self.end];
        for item in &self.items {
            let bytes = self.emit(item)?;
            let start = item.addr as usize;
            output[start..start + bytes.len()].copy_from_slice(&bytes);
        }

        Ok(output)
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        // Remove comments
        let line = match line.find(';') {
            Some(idx) => &line[..idx],
            None => line,
        };
        let mut line = line.trim();

        if line.is_empty() {
            return Ok(());
        }

        // Label definition
        if let Some(colon_idx) = line.find(':') {
            let label = line[..colon_idx].trim().to_uppercase();
            if label.is_empty() || label.contains(char::is_whitespace) {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("invalid label '{}'", &line[..colon_idx]),
                });
            }
            if self.current_addr >= MAX_MEMORY_SIZE {
                return Err(AssemblerError::ProgramTooLarge { line: line_num });
            }
            if self.symbols.contains_key(&label) {
                return Err(AssemblerError::DuplicateLabel { line: line_num, label });
            }
            self.symbols.insert(label, self.current_addr as u16);

            line = line[colon_idx + 1..].trim();
            if line.is_empty() {
                return Ok(());
            }
        }

        self.process_statement(line, line_num)
    }

    fn process_statement(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        let (mnemonic, rest) = match line.split_once(char::is_whitespace) {
            Some((m, r)) => (m, r.trim()),
            None => (line, ""),
        };
        let mnemonic = mnemonic.to_uppercase();
        let operands: Vec<String> = rest
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let (stmt, size) = match mnemonic.as_str() {
            // Directives
            "ORG" => {
                let [value] = operands.as_slice() else {
                    return Err(AssemblerError::SyntaxError {
                        line: line_num,
                        message: "ORG requires one address".into(),
                    });
                };
                let addr = parse_number(value).ok_or_else(|| AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("ORG needs a numeric address, got '{}'", value),
                })?;
                if addr < 0 || addr as usize >= MAX_MEMORY_SIZE {
                    return Err(AssemblerError::ValueOutOfRange { line: line_num, value: addr });
                }
                self.current_addr = addr as usize;
                return Ok(());
            }

            "DB" => {
                let size = operands.len();
                (Statement::Bytes(operands), size)
            }

            "DW" => {
                let size = operands.len() * 2;
                (Statement::Words(operands), size)
            }

            // Instructions
            _ => {
                let op = Opcode::from_mnemonic(&mnemonic).ok_or_else(|| {
                    AssemblerError::UnknownMnemonic { line: line_num, mnemonic: mnemonic.clone() }
                })?;
                if operands.len() != 2 {
                    return Err(AssemblerError::SyntaxError {
                        line: line_num,
                        message: format!("{} takes 2 operands, found {}", op.mnemonic(), operands.len()),
                    });
                }
                (Statement::Instr { op, operands }, op.encoded_len())
            }
        };

        if matches!(stmt, Statement::Bytes(_) | Statement::Words(_)) && size == 0 {
            return Err(AssemblerError::SyntaxError {
                line: line_num,
                message: format!("{} requires at least one value", mnemonic),
            });
        }

        let end = self.current_addr + size;
        if end > MAX_MEMORY_SIZE {
            return Err(AssemblerError::ProgramTooLarge { line: line_num });
        }

        self.items.push(Item { line: line_num, addr: self.current_addr as u16, stmt });
        self.current_addr = end;
        self.end = self.end.max(end);
        Ok(())
    }

    fn emit(&self, item: &Item) -> Result<Vec<u8>, AssemblerError> {
        let line = item.line;
        match &item.stmt {
            Statement::Instr { op, operands } => {
                let instr = match op {
                    Opcode::MovLitReg => Instruction::MovLitReg {
                        literal: self.parse_word(&operands[0], line)?,
                        reg: parse_register(&operands[1], line)?,
                    },
                    Opcode::MovRegReg => Instruction::MovRegReg {
                        src: parse_register(&operands[0], line)?,
                        dst: parse_register(&operands[1], line)?,
                    },
                    Opcode::MovRegMem => Instruction::MovRegMem {
                        src: parse_register(&operands[0], line)?,
                        addr: self.parse_word(&operands[1], line)?,
                    },
                    Opcode::MovMemReg => Instruction::MovMemReg {
                        addr: self.parse_word(&operands[0], line)?,
                        dst: parse_register(&operands[1], line)?,
                    },
                    Opcode::AddRegReg => Instruction::AddRegReg {
                        a: parse_register(&operands[0], line)?,
                        b: parse_register(&operands[1], line)?,
                    },
                    Opcode::JmpNotEq => Instruction::JmpNotEq {
                        literal: self.parse_word(&operands[0], line)?,
                        addr: self.parse_word(&operands[1], line)?,
                    },
                };
                Ok(encode(&instr))
            }

            Statement::Bytes(values) => values
                .iter()
                .map(|v| {
                    let value = self.parse_value(v, line)?;
                    u8::try_from(value).map_err(|_| AssemblerError::ValueOutOfRange { line, value })
                })
                .collect(),

            Statement::Words(values) => {
                let mut out = Vec::with_capacity(values.len() * 2);
                for v in values {
                    out.extend_from_slice(&self.parse_word(v, line)?.to_be_bytes());
                }
                Ok(out)
            }
        }
    }

    fn parse_word(&self, operand: &str, line: usize) -> Result<u16, AssemblerError> {
        let value = self.parse_value(operand, line)?;
        u16::try_from(value).map_err(|_| AssemblerError::ValueOutOfRange { line, value })
    }

    /// A number or a label.
    fn parse_value(&self, operand: &str, line: usize) -> Result<i64, AssemblerError> {
        if let Some(num) = parse_number(operand) {
            return Ok(num);
        }

        let label = operand.to_uppercase();
        self.symbols
            .get(&label)
            .map(|&addr| addr as i64)
            .ok_or(AssemblerError::UndefinedLabel { line, label })
    }
}

/// Decimal, `0x` hex or `$` hex.
fn parse_number(text: &str) -> Option<i64> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok();
    }
    if let Some(hex) = text.strip_prefix('$') {
        return i64::from_str_radix(hex, 16).ok();
    }
    text.parse::<i64>().ok()
}

/// A register name or a raw `#index`.
fn parse_register(operand: &str, line: usize) -> Result<u8, AssemblerError> {
    if let Some(raw) = operand.strip_prefix('#') {
        let value = parse_number(raw).ok_or_else(|| AssemblerError::SyntaxError {
            line,
            message: format!("invalid register index '{}'", operand),
        })?;
        return u8::try_from(value).map_err(|_| AssemblerError::ValueOutOfRange { line, value });
    }

    REGISTER_NAMES
        .iter()
        .position(|name| name.eq_ignore_ascii_case(operand))
        .map(|idx| idx as u8)
        .ok_or_else(|| AssemblerError::UnknownRegister { line, name: operand.to_string() })
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("unknown register on line {line}: {name}")]
    UnknownRegister { line: usize, name: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("duplicate label on line {line}: {label}")]
    DuplicateLabel { line: usize, label: String },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: i64 },

    #[error("program runs past the end of the address space on line {line}")]
    ProgramTooLarge { line: usize },
}
