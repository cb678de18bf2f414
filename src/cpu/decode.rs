//! The instruction set.
//!
//! Every instruction is one opcode byte followed by a fixed operand shape.
//! Register operands are one byte (an index, wrapped by the register file),
//! literals and addresses are two bytes, big-endian.
//!
//! | Opcode        | Byte | Operands        | Length |
//! |---------------|------|-----------------|--------|
//! | `MOV_LIT_REG` | 0x10 | lit16, reg8     | 4      |
//! | `MOV_REG_REG` | 0x11 | src8, dst8      | 3      |
//! | `MOV_REG_MEM` | 0x12 | src8, addr16    | 4      |
//! | `MOV_MEM_REG` | 0x13 | addr16, dst8    | 4      |
//! | `ADD_REG_REG` | 0x14 | a8, b8          | 3      |
//! | `JMP_NOT_EQ`  | 0x15 | lit16, addr16   | 5      |

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// The closed set of opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    MovLitReg = 0x10,
    MovRegReg = 0x11,
    MovRegMem = 0x12,
    MovMemReg = 0x13,
    AddRegReg = 0x14,
    JmpNotEq = 0x15,
}

impl Opcode {
    /// All opcodes in encoding order.
    pub const ALL: [Opcode; 6] = [
        Opcode::MovLitReg,
        Opcode::MovRegReg,
        Opcode::MovRegMem,
        Opcode::MovMemReg,
        Opcode::AddRegReg,
        Opcode::JmpNotEq,
    ];

    /// Look up an opcode byte. `None` for anything outside the set.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x10 => Some(Opcode::MovLitReg),
            0x11 => Some(Opcode::MovRegReg),
            0x12 => Some(Opcode::MovRegMem),
            0x13 => Some(Opcode::MovMemReg),
            0x14 => Some(Opcode::AddRegReg),
            0x15 => Some(Opcode::JmpNotEq),
            _ => None,
        }
    }

    /// The encoded byte.
    pub fn byte(self) -> u8 {
        self as u8
    }

    /// Total encoded length in bytes, opcode included.
    pub fn encoded_len(self) -> usize {
        match self {
            Opcode::MovRegReg | Opcode::AddRegReg => 3,
            Opcode::MovLitReg | Opcode::MovRegMem | Opcode::MovMemReg => 4,
            Opcode::JmpNotEq => 5,
        }
    }

    /// Assembly mnemonic.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::MovLitReg => "MOV_LIT_REG",
            Opcode::MovRegReg => "MOV_REG_REG",
            Opcode::MovRegMem => "MOV_REG_MEM",
            Opcode::MovMemReg => "MOV_MEM_REG",
            Opcode::AddRegReg => "ADD_REG_REG",
            Opcode::JmpNotEq => "JMP_NOT_EQ",
        }
    }

    /// Parse a mnemonic, case-insensitively.
    pub fn from_mnemonic(text: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.mnemonic().eq_ignore_ascii_case(text))
    }
}

/// A decoded instruction.
///
/// Register fields hold the raw operand byte; the register file applies the
/// modulo wrap when the instruction executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// reg[reg] := literal
    MovLitReg { literal: u16, reg: u8 },

    /// reg[dst] := reg[src]
    MovRegReg { src: u8, dst: u8 },

    /// mem16[addr] := reg[src]
    MovRegMem { src: u8, addr: u16 },

    /// reg[dst] := mem16[addr]
    MovMemReg { addr: u16, dst: u8 },

    /// acc := reg[a] + reg[b] (wrapping)
    AddRegReg { a: u8, b: u8 },

    /// if literal != acc then ip := addr
    JmpNotEq { literal: u16, addr: u16 },
}

impl Instruction {
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::MovLitReg { .. } => Opcode::MovLitReg,
            Instruction::MovRegReg { .. } => Opcode::MovRegReg,
            Instruction::MovRegMem { .. } => Opcode::MovRegMem,
            Instruction::MovMemReg { .. } => Opcode::MovMemReg,
            Instruction::AddRegReg { .. } => Opcode::AddRegReg,
            Instruction::JmpNotEq { .. } => Opcode::JmpNotEq,
        }
    }

    /// Encoded length in bytes.
    pub fn encoded_len(&self) -> usize {
        self.opcode().encoded_len()
    }
}

/// Encode an instruction into its byte form.
pub fn encode(instr: &Instruction) -> Vec<u8> {
    let mut out = Vec::with_capacity(instr.encoded_len());
    out.push(instr.opcode().byte());

    match *instr {
        Instruction::MovLitReg { literal, reg } => {
            out.extend_from_slice(&literal.to_be_bytes());
            out.push(reg);
        }
        Instruction::MovRegReg { src, dst } => {
            out.push(src);
            out.push(dst);
        }
        Instruction::MovRegMem { src, addr } => {
            out.push(src);
            out.extend_from_slice(&addr.to_be_bytes());
        }
        Instruction::MovMemReg { addr, dst } => {
            out.extend_from_slice(&addr.to_be_bytes());
            out.push(dst);
        }
        Instruction::AddRegReg { a, b } => {
            out.push(a);
            out.push(b);
        }
        Instruction::JmpNotEq { literal, addr } => {
            out.extend_from_slice(&literal.to_be_bytes());
            out.extend_from_slice(&addr.to_be_bytes());
        }
    }

    out
}

/// Encode a whole program.
pub fn encode_all(program: &[Instruction]) -> Vec<u8> {
    program.iter().flat_map(encode).collect()
}

/// Decode the instruction at `offset` in a byte image.
///
/// This is the offline counterpart of the CPU's fetch path, used by the
/// disassembler and debugger.
pub fn decode(bytes: &[u8], offset: usize) -> Result<Instruction, DecodeError> {
    let byte = *bytes.get(offset).ok_or(DecodeError::Truncated { offset })?;
    let opcode = Opcode::from_byte(byte).ok_or(DecodeError::InvalidOpcode(byte))?;

    let operands = bytes
        .get(offset + 1..offset + opcode.encoded_len())
        .ok_or(DecodeError::Truncated { offset })?;
    let word = |i: usize| u16::from_be_bytes([operands[i], operands[i + 1]]);

    let instr = match opcode {
        Opcode::MovLitReg => Instruction::MovLitReg { literal: word(0), reg: operands[2] },
        Opcode::MovRegReg => Instruction::MovRegReg { src: operands[0], dst: operands[1] },
        Opcode::MovRegMem => Instruction::MovRegMem { src: operands[0], addr: word(1) },
        Opcode::MovMemReg => Instruction::MovMemReg { addr: word(0), dst: operands[2] },
        Opcode::AddRegReg => Instruction::AddRegReg { a: operands[0], b: operands[1] },
        Opcode::JmpNotEq => Instruction::JmpNotEq { literal: word(0), addr: word(2) },
    };

    Ok(instr)
}

/// Errors that can occur during offline decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid opcode: 0x{0:02X}")]
    InvalidOpcode(u8),

    #[error("instruction at 0x{offset:04X} runs past the end of the image")]
    Truncated { offset: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_bytes() {
        for op in Opcode::ALL {
            assert_eq!(Opcode::from_byte(op.byte()), Some(op));
        }
        assert_eq!(Opcode::from_byte(0x00), None);
        assert_eq!(Opcode::from_byte(0xFF), None);
    }

    #[test]
    fn test_encoded_layout() {
        let bytes = encode(&Instruction::MovLitReg { literal: 0x1234, reg: 2 });
        assert_eq!(bytes, vec![0x10, 0x12, 0x34, 0x02]);

        let bytes = encode(&Instruction::MovRegMem { src: 1, addr: 0x0100 });
        assert_eq!(bytes, vec![0x12, 0x01, 0x01, 0x00]);

        let bytes = encode(&Instruction::JmpNotEq { literal: 3, addr: 0x0004 });
        assert_eq!(bytes, vec![0x15, 0x00, 0x03, 0x00, 0x04]);
    }

    #[test]
    fn test_lengths_match_encoding() {
        let samples = [
            Instruction::MovLitReg { literal: 1, reg: 2 },
            Instruction::MovRegReg { src: 1, dst: 2 },
            Instruction::MovRegMem { src: 1, addr: 2 },
            Instruction::MovMemReg { addr: 1, dst: 2 },
            Instruction::AddRegReg { a: 1, b: 2 },
            Instruction::JmpNotEq { literal: 1, addr: 2 },
        ];

        for instr in samples {
            assert_eq!(encode(&instr).len(), instr.encoded_len(), "{:?}", instr);
            assert_eq!(decode(&encode(&instr), 0).unwrap(), instr);
        }
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(decode(&[0x00], 0), Err(DecodeError::InvalidOpcode(0x00)));
        assert_eq!(decode(&[0x14, 0x02], 0), Err(DecodeError::Truncated { offset: 0 }));
        assert_eq!(decode(&[], 0), Err(DecodeError::Truncated { offset: 0 }));
    }

    #[test]
    fn test_mnemonic_lookup() {
        assert_eq!(Opcode::from_mnemonic("add_reg_reg"), Some(Opcode::AddRegReg));
        assert_eq!(Opcode::from_mnemonic("HLT"), None);
    }
}
