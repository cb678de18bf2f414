//! Disassembler.
//!
//! Converts byte images back to assembler syntax. Bytes that do not start a
//! valid instruction are listed as `DB`.

use crate::cpu::decode::{decode, Instruction};
use crate::cpu::registers::{Registers, REGISTER_COUNT};

/// Disassemble the instruction at `offset`.
///
/// Returns the text and the number of bytes it covers.
pub fn disassemble_at(bytes: &[u8], offset: usize) -> (String, usize) {
    match decode(bytes, offset) {
        Ok(instr) => (format_instruction(&instr), instr.encoded_len()),
        Err(_) => match bytes.get(offset) {
            Some(byte) => (format!("DB 0x{:02X}", byte), 1),
            None => (String::new(), 0),
        },
    }
}

/// Disassemble an image loaded at `origin`.
pub fn disassemble(bytes: &[u8], origin: u16) -> String {
    let mut output = String::new();
    output.push_str("; vcpu disassembly\n");
    output.push_str("; ----------------\n\n");

    let mut offset = 0;
    while offset < bytes.len() {
        let (text, len) = disassemble_at(bytes, offset);
        let raw: Vec<String> = bytes[offset..offset + len]
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect();
        output.push_str(&format!(
            "{:04X}: {:<24} ; {}\n",
            origin as usize + offset,
            text,
            raw.join(" ")
        ));
        offset += len;
    }

    output
}

/// Format a decoded instruction as assembly text.
pub fn format_instruction(instr: &Instruction) -> String {
    let mnemonic = instr.opcode().mnemonic();
    match *instr {
        Instruction::MovLitReg { literal, reg } => {
            format!("{} 0x{:04X}, {}", mnemonic, literal, format_register(reg))
        }
        Instruction::MovRegReg { src, dst } => {
            format!("{} {}, {}", mnemonic, format_register(src), format_register(dst))
        }
        Instruction::MovRegMem { src, addr } => {
            format!("{} {}, ${:04X}", mnemonic, format_register(src), addr)
        }
        Instruction::MovMemReg { addr, dst } => {
            format!("{} ${:04X}, {}", mnemonic, addr, format_register(dst))
        }
        Instruction::AddRegReg { a, b } => {
            format!("{} {}, {}", mnemonic, format_register(a), format_register(b))
        }
        Instruction::JmpNotEq { literal, addr } => {
            format!("{} 0x{:04X}, ${:04X}", mnemonic, literal, addr)
        }
    }
}

/// Register operands in range print by name; wrapping ones keep their raw
/// index so the listing re-assembles to the same bytes.
fn format_register(index: u8) -> String {
    if (index as usize) < REGISTER_COUNT {
        Registers::name_of(index).to_string()
    } else {
        format!("#{}", index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assemble;
    use crate::cpu::decode::encode;

    #[test]
    fn test_disassemble_add() {
        let bytes = encode(&Instruction::AddRegReg { a: 2, b: 3 });
        let (text, len) = disassemble_at(&bytes, 0);
        assert_eq!(text, "ADD_REG_REG r1, r2");
        assert_eq!(len, 3);
    }

    #[test]
    fn test_disassemble_wrapping_register() {
        let bytes = encode(&Instruction::MovRegReg { src: 12, dst: 1 });
        let (text, _) = disassemble_at(&bytes, 0);
        assert_eq!(text, "MOV_REG_REG #12, acc");
    }

    #[test]
    fn test_disassemble_invalid_byte() {
        let (text, len) = disassemble_at(&[0xEE, 0x14], 0);
        assert_eq!(text, "DB 0xEE");
        assert_eq!(len, 1);

        // Truncated instruction at the end of the image
        let (text, len) = disassemble_at(&[0x14, 0x02], 0);
        assert_eq!(text, "DB 0x14");
        assert_eq!(len, 1);
    }

    #[test]
    fn test_listing_reassembles() {
        let source = "MOV_LIT_REG 0x0001, r2\nMOV_MEM_REG $0100, #13\nJMP_NOT_EQ 3, 0\n";
        let image = assemble(source).unwrap();

        let listing = disassemble(&image, 0);
        let text: String = listing
            .lines()
            .filter_map(|l| l.split_once(": ").map(|(_, rest)| rest.to_string()))
            .collect::<Vec<_>>()
            .join("\n");

        assert_eq!(assemble(&text).unwrap(), image);
    }
}
